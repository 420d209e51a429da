use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::FillerError;

/// Shared cancellation flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    pub fn check(&self) -> Result<(), FillerError> {
        if self.is_cancelled() {
            Err(FillerError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Init,
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
    MakeSplitEdges,
    MakeBlocks,
    MakePCurves,
    ProcessDegenerated,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Init => "init",
            Stage::VertexVertex => "VV",
            Stage::VertexEdge => "VE",
            Stage::VertexFace => "VF",
            Stage::EdgeEdge => "EE",
            Stage::EdgeFace => "EF",
            Stage::FaceFace => "FF",
            Stage::VertexSolid => "VZ",
            Stage::EdgeSolid => "EZ",
            Stage::FaceSolid => "FZ",
            Stage::SolidSolid => "ZZ",
            Stage::MakeSplitEdges => "make split edges",
            Stage::MakeBlocks => "make blocks",
            Stage::MakePCurves => "make pcurves",
            Stage::ProcessDegenerated => "process degenerated",
        };
        f.write_str(name)
    }
}

/// Callback notified when a stage starts.
pub type StageObserver = Box<dyn Fn(Stage) + Send + Sync>;
