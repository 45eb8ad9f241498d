//! Stroke capture
//!
//! Turns pointer-down/move/up events into ordered stroke geometry and keeps a
//! running bounding box over every accepted point. Points outside the surface
//! are ignored rather than reported.

use tracing::trace;

use crate::types::{BoundingBox, Point, Stroke, SurfaceSize};

/// Accumulates strokes for one drawing round
#[derive(Debug, Clone)]
pub struct StrokeCapture {
    surface: SurfaceSize,
    strokes: Vec<Stroke>,
    active: Option<Vec<Point>>,
    bounds: Option<BoundingBox>,
}

impl StrokeCapture {
    pub fn new(surface: SurfaceSize) -> Self {
        Self {
            surface,
            strokes: Vec::new(),
            active: None,
            bounds: None,
        }
    }

    /// Start a new stroke at `p`. Returns false when `p` is off the surface.
    ///
    /// A stroke still open from a lost pointer-up is sealed first.
    pub fn begin(&mut self, p: Point) -> bool {
        if !self.accepts(&p) {
            trace!(x = p.x, y = p.y, "pointer-down outside surface ignored");
            return false;
        }
        self.end();
        self.active = Some(vec![p]);
        self.observe(p);
        true
    }

    /// Append `p` to the active stroke. No-op without an active stroke or
    /// when `p` is off the surface.
    pub fn extend(&mut self, p: Point) -> bool {
        if !self.accepts(&p) {
            trace!(x = p.x, y = p.y, "pointer-move outside surface ignored");
            return false;
        }
        match self.active.as_mut() {
            Some(points) => points.push(p),
            None => return false,
        }
        self.observe(p);
        true
    }

    /// Seal the active stroke, if any. Returns the sealed stroke.
    pub fn end(&mut self) -> Option<&Stroke> {
        let points = self.active.take()?;
        // begin() always seeds the first point
        let stroke = Stroke::new(points).ok()?;
        self.strokes.push(stroke);
        self.strokes.last()
    }

    /// Sealed strokes, oldest first
    pub fn strokes(&self) -> &[Stroke] {
        &self.strokes
    }

    /// Points of the stroke being drawn, if a pointer is down
    pub fn active_points(&self) -> Option<&[Point]> {
        self.active.as_deref()
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Sealed strokes plus the one in progress
    pub fn snapshot(&self) -> Vec<Stroke> {
        let mut strokes = self.strokes.clone();
        if let Some(points) = &self.active {
            if let Ok(stroke) = Stroke::new(points.clone()) {
                strokes.push(stroke);
            }
        }
        strokes
    }

    /// Running bounding box; `None` until the first point is accepted
    pub fn bounds(&self) -> Option<BoundingBox> {
        self.bounds
    }

    pub fn surface(&self) -> SurfaceSize {
        self.surface
    }

    /// Number of accepted points, in-progress stroke included
    pub fn point_count(&self) -> usize {
        let sealed: usize = self.strokes.iter().map(Stroke::len).sum();
        sealed + self.active.as_ref().map_or(0, Vec::len)
    }

    /// True when no point has been accepted
    pub fn is_empty(&self) -> bool {
        self.bounds.is_none()
    }

    /// Forget every stroke and the bounding box
    pub fn clear(&mut self) {
        self.strokes.clear();
        self.active = None;
        self.bounds = None;
    }

    fn accepts(&self, p: &Point) -> bool {
        p.is_finite() && self.surface.contains(p)
    }

    fn observe(&mut self, p: Point) {
        match self.bounds.as_mut() {
            Some(bounds) => bounds.include(p),
            None => self.bounds = Some(BoundingBox::from_point(p)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn capture() -> StrokeCapture {
        StrokeCapture::new(SurfaceSize::new(100, 100))
    }

    #[test]
    fn test_begin_extend_end() {
        let mut capture = capture();
        assert!(capture.begin(Point::new(10.0, 10.0)));
        assert!(capture.extend(Point::new(20.0, 15.0)));
        assert!(capture.extend(Point::new(30.0, 5.0)));
        let sealed = capture.end().unwrap();
        assert_eq!(sealed.len(), 3);

        assert!(!capture.is_active());
        assert_eq!(capture.strokes().len(), 1);
        let bounds = capture.bounds().unwrap();
        assert_eq!(
            bounds,
            BoundingBox {
                min_x: 10.0,
                min_y: 5.0,
                max_x: 30.0,
                max_y: 15.0
            }
        );
    }

    #[test]
    fn test_extend_without_begin_is_noop() {
        let mut capture = capture();
        assert!(!capture.extend(Point::new(10.0, 10.0)));
        assert!(capture.end().is_none());
        assert!(capture.is_empty());
        assert!(capture.strokes().is_empty());
    }

    #[test]
    fn test_out_of_bounds_points_ignored() {
        let mut capture = capture();
        assert!(!capture.begin(Point::new(-1.0, 10.0)));
        assert!(!capture.is_active());

        assert!(capture.begin(Point::new(50.0, 50.0)));
        assert!(!capture.extend(Point::new(150.0, 50.0)));
        assert!(!capture.extend(Point::new(f64::NAN, 50.0)));
        assert!(capture.extend(Point::new(60.0, 50.0)));
        capture.end();

        assert_eq!(capture.point_count(), 2);
        assert_eq!(capture.bounds().unwrap().max_x, 60.0);
    }

    #[test]
    fn test_single_point_stroke_is_valid() {
        let mut capture = capture();
        capture.begin(Point::new(42.0, 42.0));
        capture.end();

        assert_eq!(capture.strokes()[0].len(), 1);
        let bounds = capture.bounds().unwrap();
        assert_eq!(bounds.width(), 0.0);
    }

    #[test]
    fn test_begin_seals_open_stroke() {
        let mut capture = capture();
        capture.begin(Point::new(1.0, 1.0));
        capture.extend(Point::new(2.0, 2.0));
        capture.begin(Point::new(50.0, 50.0));

        assert_eq!(capture.strokes().len(), 1);
        assert_eq!(capture.active_points().unwrap(), &[Point::new(50.0, 50.0)]);
    }

    #[test]
    fn test_snapshot_includes_active_stroke() {
        let mut capture = capture();
        capture.begin(Point::new(1.0, 1.0));
        capture.end();
        capture.begin(Point::new(5.0, 5.0));
        capture.extend(Point::new(6.0, 6.0));

        let snapshot = capture.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[1].len(), 2);
        assert_eq!(capture.strokes().len(), 1);
    }

    #[test]
    fn test_clear_resets_bounds() {
        let mut capture = capture();
        capture.begin(Point::new(1.0, 1.0));
        capture.end();
        capture.clear();

        assert!(capture.is_empty());
        assert_eq!(capture.point_count(), 0);
    }
}
