//! Drawing surface
//!
//! Couples stroke capture with canvas painting so that geometry and bitmap
//! always describe the same drawing.

use crate::canvas::RasterCanvas;
use crate::capture::StrokeCapture;
use crate::types::{Point, SurfaceSize};

/// A drawing surface receiving pointer events
#[derive(Debug, Clone)]
pub struct DrawingSurface {
    capture: StrokeCapture,
    canvas: RasterCanvas,
}

impl DrawingSurface {
    pub fn new(size: SurfaceSize, brush_width: f64) -> Self {
        Self {
            capture: StrokeCapture::new(size),
            canvas: RasterCanvas::new(size, brush_width),
        }
    }

    /// Pointer pressed. Starts a stroke and stamps a dot when on the surface.
    pub fn pointer_down(&mut self, p: Point) -> bool {
        let accepted = self.capture.begin(p);
        if accepted {
            self.canvas.stamp(p);
        }
        accepted
    }

    /// Pointer dragged. Extends the stroke and paints the new segment.
    pub fn pointer_move(&mut self, p: Point) -> bool {
        let previous = self
            .capture
            .active_points()
            .and_then(|points| points.last().copied());
        let accepted = self.capture.extend(p);
        if let (true, Some(from)) = (accepted, previous) {
            self.canvas.segment(from, p);
        }
        accepted
    }

    /// Pointer released. Seals the active stroke, if any.
    pub fn pointer_up(&mut self) -> bool {
        self.capture.end().is_some()
    }

    pub fn capture(&self) -> &StrokeCapture {
        &self.capture
    }

    pub fn canvas(&self) -> &RasterCanvas {
        &self.canvas
    }

    pub fn size(&self) -> SurfaceSize {
        self.capture.surface()
    }

    /// Wipe strokes and ink
    pub fn clear(&mut self) {
        self.capture.clear();
        self.canvas.clear();
    }
}
