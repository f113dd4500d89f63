//! Startup dataset preloader.
//!
//! Parses a delimited text file into a [`Table`] and publishes it into the
//! environment under the configured binding. Every failure here is logged
//! and swallowed: the kernel reaches `ready` with or without the dataset.

use std::path::Path;
use std::sync::Arc;

use csv::ReaderBuilder;
use tracing::{error, info, warn};

use crate::engine::{Environment, Table, Value};
use crate::{AppError, KernelConfig, Result};

/// Parse the file at `path` into a table.
///
/// The first record names the columns. Each cell becomes a number when it
/// parses as one, `none` when empty, and a string otherwise.
///
/// # Errors
///
/// Returns [`AppError::Dataset`] if the file cannot be opened, is not valid
/// delimited text, or has rows whose width differs from the header.
pub fn load_dataset(path: &Path, delimiter: u8) -> Result<Table> {
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|err| AppError::Dataset(format!("failed to open {}: {err}", path.display())))?;

    let columns: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_owned())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(infer_cell).collect());
    }

    Table::new(columns, rows).map_err(AppError::Dataset)
}

/// Load `path` (if any) into `env` under `config.dataset_binding`.
///
/// Returns whether the binding was published. Never fails.
pub fn preload(env: &mut Environment, path: Option<&Path>, config: &KernelConfig) -> bool {
    let Some(path) = path else {
        info!("no dataset given, starting without one");
        return false;
    };

    if !path.is_file() {
        warn!(path = %path.display(), "dataset file not found, starting without it");
        return false;
    }

    let loaded = load_dataset(path, config.delimiter_byte()).and_then(|table| {
        let (rows, columns) = (table.n_rows(), table.columns().len());
        env.insert(&config.dataset_binding, Value::Table(Arc::new(table)))?;
        Ok((rows, columns))
    });
    match loaded {
        Ok((rows, columns)) => {
            info!(
                path = %path.display(),
                binding = config.dataset_binding.as_str(),
                rows,
                columns,
                "dataset loaded"
            );
            true
        }
        Err(err) => {
            error!(path = %path.display(), %err, "failed to load dataset");
            false
        }
    }
}

fn infer_cell(raw: &str) -> Value {
    let cell = raw.trim();
    if cell.is_empty() {
        return Value::None;
    }
    cell.parse::<f64>()
        .map_or_else(|_| Value::Str(cell.to_owned()), Value::Number)
}
