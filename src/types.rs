//! Core types for the Sketch Prep pipeline
//!
//! This module defines the data structures that flow through each stage of the
//! pipeline: captured points and strokes, bounding boxes, the normalized raster
//! tensor, and the delta-encoded stroke sequence.

use serde::{Deserialize, Serialize};

use crate::error::SketchError;

/// Side length of the square raster tensor
pub const TENSOR_SIDE: usize = 28;

/// Number of values in a raster tensor (28 x 28)
pub const TENSOR_LEN: usize = TENSOR_SIDE * TENSOR_SIDE;

/// Largest magnitude a single encoded delta may take
pub const DELTA_LIMIT: i32 = 255;

/// A point in surface coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point
    pub fn distance_to(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

/// Extents of the drawing surface in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

impl SurfaceSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Whether a point lies on the surface (edges inclusive)
    pub fn contains(&self, p: &Point) -> bool {
        p.x >= 0.0 && p.x <= self.width as f64 && p.y >= 0.0 && p.y <= self.height as f64
    }
}

/// Axis-aligned bounding box.
///
/// A box always covers at least one observed point, so `min <= max` holds on
/// both axes. The "nothing observed yet" state is `Option::<BoundingBox>::None`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    /// Zero-area box around a single point
    pub fn from_point(p: Point) -> Self {
        Self {
            min_x: p.x,
            min_y: p.y,
            max_x: p.x,
            max_y: p.y,
        }
    }

    /// Box covering every point, or `None` when there are no points
    pub fn from_points<'a, I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Point>,
    {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut bbox = Self::from_point(*first);
        for p in iter {
            bbox.include(*p);
        }
        Some(bbox)
    }

    /// Grow the box to cover `p`. Never shrinks.
    pub fn include(&mut self, p: Point) {
        self.min_x = self.min_x.min(p.x);
        self.min_y = self.min_y.min(p.y);
        self.max_x = self.max_x.max(p.x);
        self.max_y = self.max_y.max(p.y);
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Midpoint of the box
    pub fn center(&self) -> Point {
        Point::new(
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }

    /// Box grown by `pad` on every side, clamped to the surface extents
    pub fn expanded(&self, pad: f64, surface: SurfaceSize) -> Self {
        let width = surface.width as f64;
        let height = surface.height as f64;
        Self {
            min_x: (self.min_x - pad).max(0.0),
            min_y: (self.min_y - pad).max(0.0),
            max_x: (self.max_x + pad).min(width),
            max_y: (self.max_y + pad).min(height),
        }
    }
}

/// Columnar wire form of a stroke: `{ "x": [..], "y": [..] }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrokeColumns {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

/// An ordered, non-empty sequence of points drawn in one pointer gesture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StrokeColumns", into = "StrokeColumns")]
pub struct Stroke {
    points: Vec<Point>,
}

impl Stroke {
    /// Seal a list of points into a stroke. Empty input is rejected.
    pub fn new(points: Vec<Point>) -> Result<Self, SketchError> {
        if points.is_empty() {
            return Err(SketchError::InvalidStroke(
                "a stroke needs at least one point".to_string(),
            ));
        }
        Ok(Self { points })
    }

    /// A stroke consisting of a single tap
    pub fn single(p: Point) -> Self {
        Self { points: vec![p] }
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Always false; kept for API symmetry with `len`
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first(&self) -> Point {
        self.points[0]
    }

    pub fn last(&self) -> Point {
        self.points[self.points.len() - 1]
    }
}

impl TryFrom<StrokeColumns> for Stroke {
    type Error = SketchError;

    fn try_from(columns: StrokeColumns) -> Result<Self, Self::Error> {
        if columns.x.len() != columns.y.len() {
            return Err(SketchError::InvalidStroke(format!(
                "column length mismatch: {} x values, {} y values",
                columns.x.len(),
                columns.y.len()
            )));
        }
        let points: Vec<Point> = columns
            .x
            .into_iter()
            .zip(columns.y)
            .map(Point::from)
            .collect();
        if let Some(bad) = points.iter().find(|p| !p.is_finite()) {
            return Err(SketchError::InvalidStroke(format!(
                "non-finite coordinate ({}, {})",
                bad.x, bad.y
            )));
        }
        Stroke::new(points)
    }
}

impl From<Stroke> for StrokeColumns {
    fn from(stroke: Stroke) -> Self {
        let (x, y) = stroke.points.iter().map(|p| (p.x, p.y)).unzip();
        StrokeColumns { x, y }
    }
}

/// Pen state of an encoded step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PenState {
    /// Pen down, the step contributes a visible segment
    Draw,
    /// Pen lifted, marks the end of a stroke
    Lift,
}

impl PenState {
    pub fn as_flag(&self) -> i32 {
        match self {
            PenState::Draw => 0,
            PenState::Lift => 1,
        }
    }
}

/// One `[dx, dy, pen]` step of a stroke sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "[i32; 3]", into = "[i32; 3]")]
pub struct EncodedStep {
    pub dx: i16,
    pub dy: i16,
    pub pen: PenState,
}

impl EncodedStep {
    /// A pen-down step. Deltas are clamped into `[-255, 255]`.
    pub fn draw(dx: i32, dy: i32) -> Self {
        Self {
            dx: dx.clamp(-DELTA_LIMIT, DELTA_LIMIT) as i16,
            dy: dy.clamp(-DELTA_LIMIT, DELTA_LIMIT) as i16,
            pen: PenState::Draw,
        }
    }

    /// The pen-lift marker closing a stroke
    pub fn lift() -> Self {
        Self {
            dx: 0,
            dy: 0,
            pen: PenState::Lift,
        }
    }
}

impl TryFrom<[i32; 3]> for EncodedStep {
    type Error = SketchError;

    fn try_from([dx, dy, pen]: [i32; 3]) -> Result<Self, Self::Error> {
        let in_range = |v: i32| (-DELTA_LIMIT..=DELTA_LIMIT).contains(&v);
        if !in_range(dx) || !in_range(dy) {
            return Err(SketchError::InvalidRequest(format!(
                "step delta ({dx}, {dy}) outside [-{DELTA_LIMIT}, {DELTA_LIMIT}]"
            )));
        }
        let pen = match pen {
            0 => PenState::Draw,
            1 => PenState::Lift,
            other => {
                return Err(SketchError::InvalidRequest(format!(
                    "pen flag must be 0 or 1, got {other}"
                )))
            }
        };
        Ok(Self {
            dx: dx as i16,
            dy: dy as i16,
            pen,
        })
    }
}

impl From<EncodedStep> for [i32; 3] {
    fn from(step: EncodedStep) -> Self {
        [step.dx as i32, step.dy as i32, step.pen.as_flag()]
    }
}

/// Delta/pen encoded drawing, ready for a sequence classifier
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StrokeSequence {
    steps: Vec<EncodedStep>,
}

impl StrokeSequence {
    pub fn new(steps: Vec<EncodedStep>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[EncodedStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Number of pen-lift markers, one per encoded stroke
    pub fn pen_lifts(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.pen == PenState::Lift)
            .count()
    }

    /// Rebuild the normalized path by summing draw steps.
    ///
    /// Returns one polyline per stroke, in the order the strokes were encoded.
    pub fn reconstruct(&self) -> Vec<Vec<(i32, i32)>> {
        let mut paths = Vec::new();
        let mut current = Vec::new();
        let (mut x, mut y) = (0i32, 0i32);
        for step in &self.steps {
            match step.pen {
                PenState::Draw => {
                    x += step.dx as i32;
                    y += step.dy as i32;
                    current.push((x, y));
                }
                PenState::Lift => paths.push(std::mem::take(&mut current)),
            }
        }
        if !current.is_empty() {
            paths.push(current);
        }
        paths
    }
}

/// Fixed-size 28x28 grayscale tensor, row-major, values in `[0, 1]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f32>", into = "Vec<f32>")]
pub struct NormalizedTensor {
    values: Vec<f32>,
}

impl NormalizedTensor {
    /// The tensor of an empty drawing
    pub fn blank() -> Self {
        Self {
            values: vec![0.0; TENSOR_LEN],
        }
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Value at `(row, col)`
    pub fn get(&self, row: usize, col: usize) -> Option<f32> {
        if row >= TENSOR_SIDE || col >= TENSOR_SIDE {
            return None;
        }
        Some(self.values[row * TENSOR_SIDE + col])
    }

    /// True when no pixel carries ink
    pub fn is_blank(&self) -> bool {
        self.values.iter().all(|v| *v == 0.0)
    }

    /// Total ink, the sum of all values
    pub fn ink(&self) -> f32 {
        self.values.iter().sum()
    }

    /// Render back into an 8-bit grayscale image (ink dark, background white)
    pub fn to_image(&self) -> image::GrayImage {
        let side = TENSOR_SIDE as u32;
        image::GrayImage::from_fn(side, side, |x, y| {
            let v = self.values[y as usize * TENSOR_SIDE + x as usize];
            image::Luma([255 - (v * 255.0).round() as u8])
        })
    }
}

impl TryFrom<Vec<f32>> for NormalizedTensor {
    type Error = SketchError;

    fn try_from(values: Vec<f32>) -> Result<Self, Self::Error> {
        if values.len() != TENSOR_LEN {
            return Err(SketchError::InvalidRequest(format!(
                "expected {TENSOR_LEN} pixel values, got {}",
                values.len()
            )));
        }
        if let Some(v) = values.iter().find(|v| !(0.0..=1.0).contains(*v)) {
            return Err(SketchError::InvalidRequest(format!(
                "pixel value {v} outside [0, 1]"
            )));
        }
        Ok(Self { values })
    }
}

impl From<NormalizedTensor> for Vec<f32> {
    fn from(tensor: NormalizedTensor) -> Self {
        tensor.values
    }
}
