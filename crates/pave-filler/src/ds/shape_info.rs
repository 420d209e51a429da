use bop_kernel::{BoundingBox, ShapeKind, ShapeRef};
use serde::Serialize;

/// DS entry of one shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShapeInfo {
    pub shape: ShapeRef,
    pub kind: ShapeKind,
    /// Box enlarged by the shape tolerance and half the fuzzy value.
    pub bbox: BoundingBox,
    /// DS indices of the direct sub-shapes.
    pub sub_shapes: Vec<usize>,
    /// Argument the shape came from; `None` for shapes the filler created.
    pub rank: Option<usize>,
    /// Working tolerance. Grows during the run; the input shape keeps its own.
    pub tolerance: f64,
}

impl ShapeInfo {
    pub fn new(shape: ShapeRef, rank: Option<usize>, tolerance: f64) -> Self {
        Self {
            shape,
            kind: shape.kind(),
            bbox: BoundingBox::empty(),
            sub_shapes: Vec::new(),
            rank,
            tolerance,
        }
    }
}
