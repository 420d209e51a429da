use std::fmt;

use bop_kernel::geometry::intersection::{CommonPart, CurveSurfaceContact};
use serde::Serialize;

use super::curve::{SectionCurve, SectionPoint};

/// Interference categories, one table each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum InterfKind {
    VertexVertex,
    VertexEdge,
    VertexFace,
    EdgeEdge,
    EdgeFace,
    FaceFace,
    VertexSolid,
    EdgeSolid,
    FaceSolid,
    SolidSolid,
}

impl InterfKind {
    pub const ALL: [InterfKind; 10] = [
        InterfKind::VertexVertex,
        InterfKind::VertexEdge,
        InterfKind::VertexFace,
        InterfKind::EdgeEdge,
        InterfKind::EdgeFace,
        InterfKind::FaceFace,
        InterfKind::VertexSolid,
        InterfKind::EdgeSolid,
        InterfKind::FaceSolid,
        InterfKind::SolidSolid,
    ];
}

impl fmt::Display for InterfKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InterfKind::VertexVertex => "VV",
            InterfKind::VertexEdge => "VE",
            InterfKind::VertexFace => "VF",
            InterfKind::EdgeEdge => "EE",
            InterfKind::EdgeFace => "EF",
            InterfKind::FaceFace => "FF",
            InterfKind::VertexSolid => "VZ",
            InterfKind::EdgeSolid => "EZ",
            InterfKind::FaceSolid => "FZ",
            InterfKind::SolidSolid => "ZZ",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VertexVertex {
    pub index1: usize,
    pub index2: usize,
    /// Vertex that replaces both.
    pub new_vertex: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VertexEdge {
    pub vertex: usize,
    pub edge: usize,
    pub parameter: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VertexFace {
    pub vertex: usize,
    pub face: usize,
    pub uv: (f64, f64),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeEdge {
    pub edge1: usize,
    pub edge2: usize,
    pub common: CommonPart,
    /// Vertex standing for a point-like common part.
    pub vertex: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeFace {
    pub edge: usize,
    pub face: usize,
    pub common: CurveSurfaceContact,
    pub vertex: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FaceFace {
    pub face1: usize,
    pub face2: usize,
    /// The faces lie on the same surface; no section is computed.
    pub coincident: bool,
    pub tolerance: f64,
    pub curves: Vec<SectionCurve>,
    pub points: Vec<SectionPoint>,
}

/// A sub-shape of one argument strictly inside a solid of another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ShapeSolid {
    pub shape: usize,
    pub solid: usize,
}

/// All interference tables of a DS.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Interferences {
    pub vv: Vec<VertexVertex>,
    pub ve: Vec<VertexEdge>,
    pub vf: Vec<VertexFace>,
    pub ee: Vec<EdgeEdge>,
    pub ef: Vec<EdgeFace>,
    pub ff: Vec<FaceFace>,
    pub vz: Vec<ShapeSolid>,
    pub ez: Vec<ShapeSolid>,
    pub fz: Vec<ShapeSolid>,
    pub zz: Vec<ShapeSolid>,
}

impl Interferences {
    pub fn count(&self, kind: InterfKind) -> usize {
        match kind {
            InterfKind::VertexVertex => self.vv.len(),
            InterfKind::VertexEdge => self.ve.len(),
            InterfKind::VertexFace => self.vf.len(),
            InterfKind::EdgeEdge => self.ee.len(),
            InterfKind::EdgeFace => self.ef.len(),
            InterfKind::FaceFace => self.ff.len(),
            InterfKind::VertexSolid => self.vz.len(),
            InterfKind::EdgeSolid => self.ez.len(),
            InterfKind::FaceSolid => self.fz.len(),
            InterfKind::SolidSolid => self.zz.len(),
        }
    }

    pub fn total(&self) -> usize {
        InterfKind::ALL.iter().map(|&k| self.count(k)).sum()
    }
}
