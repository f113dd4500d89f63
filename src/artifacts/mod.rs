//! Pending visual artifacts and the post-execution drain.
//!
//! Executed code registers [`Figure`]s in the [`ArtifactRegistry`]. After a
//! successful run, [`drain`] renders each pending figure to PNG in creation
//! order and closes it, so a figure is emitted at most once.

pub mod render;

use std::fmt::{self, Display, Formatter};

use tracing::{debug, error};

use crate::config::ArtifactConfig;
use crate::protocol::ImageFormat;
use crate::Result;

/// Identifier assigned to a figure at registration.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct FigureId(u64);

impl Display for FigureId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "fig-{}", self.0)
    }
}

/// Chart style of a figure.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FigureKind {
    /// Connected points.
    Line,
    /// One filled bar per value.
    Bar,
}

/// A drawable registered by executed code.
#[derive(Debug, Clone, PartialEq)]
pub struct Figure {
    /// Registration identifier.
    pub id: FigureId,
    /// Chart style.
    pub kind: FigureKind,
    /// Optional title, embedded as PNG text metadata.
    pub title: Option<String>,
    /// Plotted values in x order.
    pub series: Vec<f64>,
}

/// Ordered registry of figures not yet drained.
#[derive(Debug, Default)]
pub struct ArtifactRegistry {
    figures: Vec<Figure>,
    next_id: u64,
}

impl ArtifactRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new figure; it stays pending until closed.
    pub fn register(&mut self, kind: FigureKind, title: Option<String>, series: Vec<f64>) -> FigureId {
        self.next_id += 1;
        let id = FigureId(self.next_id);
        self.figures.push(Figure {
            id,
            kind,
            title,
            series,
        });
        debug!(figure = %id, "artifact registered");
        id
    }

    /// Pending figure ids in creation order.
    #[must_use]
    pub fn pending_ids(&self) -> Vec<FigureId> {
        self.figures.iter().map(|fig| fig.id).collect()
    }

    /// Look up a pending figure.
    #[must_use]
    pub fn get(&self, id: FigureId) -> Option<&Figure> {
        self.figures.iter().find(|fig| fig.id == id)
    }

    /// Render a pending figure to PNG bytes.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Artifact`](crate::AppError::Artifact) if `id` is not
    /// pending or the figure cannot be drawn or encoded.
    pub fn render(&self, id: FigureId, size: ArtifactConfig) -> Result<Vec<u8>> {
        let figure = self
            .get(id)
            .ok_or_else(|| crate::AppError::Artifact(format!("{id} is not pending")))?;
        render::render_png(figure, size)
    }

    /// Release a figure so it can never be drained again.
    pub fn close(&mut self, id: FigureId) -> bool {
        let before = self.figures.len();
        self.figures.retain(|fig| fig.id != id);
        before != self.figures.len()
    }

    /// Release every pending figure without rendering; returns how many.
    pub fn discard_all(&mut self) -> usize {
        let count = self.figures.len();
        self.figures.clear();
        count
    }

    /// Number of pending figures.
    #[must_use]
    pub fn len(&self) -> usize {
        self.figures.len()
    }

    /// Whether nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.figures.is_empty()
    }
}

/// Render and release every pending figure, in creation order.
///
/// A figure that fails to render is logged and skipped; it is still closed.
/// An empty registry yields an empty list.
pub fn drain(registry: &mut ArtifactRegistry, size: ArtifactConfig) -> Vec<(ImageFormat, Vec<u8>)> {
    let mut drained = Vec::with_capacity(registry.len());

    for id in registry.pending_ids() {
        match registry.render(id, size) {
            Ok(bytes) => drained.push((ImageFormat::Png, bytes)),
            Err(err) => error!(figure = %id, %err, "artifact drain: render failed, skipping"),
        }
        registry.close(id);
    }

    drained
}
