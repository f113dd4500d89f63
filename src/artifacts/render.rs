//! Minimal chart rasterizer and PNG encoder.

use super::{Figure, FigureKind};
use crate::config::ArtifactConfig;
use crate::{AppError, Result};

const MARGIN: usize = 24;
const BACKGROUND: [u8; 3] = [255, 255, 255];
const AXIS: [u8; 3] = [40, 40, 40];
const SERIES: [u8; 3] = [31, 119, 180];

/// RGB8 pixel buffer.
struct Canvas {
    width: usize,
    height: usize,
    pixels: Vec<u8>,
}

impl Canvas {
    fn new(width: usize, height: usize) -> Self {
        let mut pixels = Vec::with_capacity(width * height * 3);
        for _ in 0..width * height {
            pixels.extend_from_slice(&BACKGROUND);
        }
        Self {
            width,
            height,
            pixels,
        }
    }

    fn set(&mut self, x: i64, y: i64, color: [u8; 3]) {
        let (Ok(x), Ok(y)) = (usize::try_from(x), usize::try_from(y)) else {
            return;
        };
        if x >= self.width || y >= self.height {
            return;
        }
        let offset = (y * self.width + x) * 3;
        self.pixels[offset..offset + 3].copy_from_slice(&color);
    }

    fn fill_rect(&mut self, x0: i64, y0: i64, x1: i64, y1: i64, color: [u8; 3]) {
        for y in y0.min(y1)..=y0.max(y1) {
            for x in x0.min(x1)..=x0.max(x1) {
                self.set(x, y, color);
            }
        }
    }

    /// Bresenham line.
    fn line(&mut self, (mut x0, mut y0): (i64, i64), (x1, y1): (i64, i64), color: [u8; 3]) {
        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;
        loop {
            self.set(x0, y0, color);
            self.set(x0, y0 + 1, color);
            if x0 == x1 && y0 == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x0 += sx;
            }
            if e2 <= dx {
                err += dx;
                y0 += sy;
            }
        }
    }
}

/// Plot area in pixel coordinates.
struct Frame {
    left: i64,
    right: i64,
    top: i64,
    bottom: i64,
    lo: f64,
    hi: f64,
}

impl Frame {
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    fn y(&self, value: f64) -> i64 {
        let span = (self.bottom - self.top) as f64;
        let t = (value - self.lo) / (self.hi - self.lo);
        self.bottom - (t * span).round() as i64
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    fn x(&self, index: usize, count: usize) -> i64 {
        if count <= 1 {
            return (self.left + self.right) / 2;
        }
        let span = (self.right - self.left) as f64;
        self.left + (span * index as f64 / (count - 1) as f64).round() as i64
    }
}

/// Draw `figure` and encode it as PNG.
///
/// # Errors
///
/// Returns [`AppError::Artifact`] for an empty series, a non-finite value, or
/// an encoder failure.
pub fn render_png(figure: &Figure, size: ArtifactConfig) -> Result<Vec<u8>> {
    if figure.series.is_empty() {
        return Err(AppError::Artifact(format!("{} has no data", figure.id)));
    }
    if let Some(bad) = figure.series.iter().find(|v| !v.is_finite()) {
        return Err(AppError::Artifact(format!(
            "{} contains non-finite value {bad}",
            figure.id
        )));
    }

    let canvas = draw(figure, size);
    encode(&canvas, figure.title.as_deref(), size)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss, clippy::cast_possible_wrap)]
fn draw(figure: &Figure, size: ArtifactConfig) -> Canvas {
    let width = size.width as usize;
    let height = size.height as usize;
    let mut canvas = Canvas::new(width, height);

    let margin = MARGIN.min(width / 4).min(height / 4) as i64;
    let mut lo = figure.series.iter().copied().fold(f64::INFINITY, f64::min);
    let mut hi = figure.series.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if figure.kind == FigureKind::Bar {
        lo = lo.min(0.0);
        hi = hi.max(0.0);
    }
    if (hi - lo).abs() < f64::EPSILON {
        lo -= 1.0;
        hi += 1.0;
    }

    let frame = Frame {
        left: margin,
        right: width as i64 - 1 - margin,
        top: margin,
        bottom: height as i64 - 1 - margin,
        lo,
        hi,
    };

    // Axes.
    canvas.line((frame.left, frame.top), (frame.left, frame.bottom), AXIS);
    canvas.line((frame.left, frame.bottom), (frame.right, frame.bottom), AXIS);

    let count = figure.series.len();
    match figure.kind {
        FigureKind::Line => {
            let points: Vec<(i64, i64)> = figure
                .series
                .iter()
                .enumerate()
                .map(|(i, v)| (frame.x(i, count), frame.y(*v)))
                .collect();
            if let [only] = points.as_slice() {
                canvas.fill_rect(only.0 - 2, only.1 - 2, only.0 + 2, only.1 + 2, SERIES);
            }
            for pair in points.windows(2) {
                canvas.line(pair[0], pair[1], SERIES);
            }
        }
        FigureKind::Bar => {
            let slot = (frame.right - frame.left) as f64 / count as f64;
            let baseline = frame.y(0.0);
            for (i, v) in figure.series.iter().enumerate() {
                let x0 = frame.left + (slot * (i as f64 + 0.1)).round() as i64;
                let x1 = frame.left + (slot * (i as f64 + 0.9)).round() as i64;
                canvas.fill_rect(x0, baseline, x1.max(x0), frame.y(*v), SERIES);
            }
        }
    }

    canvas
}

fn encode(canvas: &Canvas, title: Option<&str>, size: ArtifactConfig) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, size.width, size.height);
        encoder.set_color(png::ColorType::Rgb);
        encoder.set_depth(png::BitDepth::Eight);
        if let Some(title) = title {
            encoder
                .add_text_chunk("Title".into(), title.to_owned())
                .map_err(|e| AppError::Artifact(format!("png text chunk: {e}")))?;
        }
        let mut writer = encoder
            .write_header()
            .map_err(|e| AppError::Artifact(format!("png header: {e}")))?;
        writer
            .write_image_data(&canvas.pixels)
            .map_err(|e| AppError::Artifact(format!("png data: {e}")))?;
        writer
            .finish()
            .map_err(|e| AppError::Artifact(format!("png finish: {e}")))?;
    }
    Ok(out)
}
