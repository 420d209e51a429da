use std::fmt;

use bop_kernel::GeometryError;
use serde::Serialize;
use thiserror::Error;

/// Fatal failures: the run stops and its results must not be used.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FillerError {
    #[error("no arguments to intersect")]
    NoArguments,

    #[error("invalid argument {index}: {reason}")]
    InvalidArgument { index: usize, reason: String },

    #[error("fuzzy value must be finite and non-negative, got {0}")]
    InvalidFuzzyValue(f64),

    #[error("index {index} out of range (size {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("operation cancelled")]
    Cancelled,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("geometry failure: {0}")]
    Geometry(#[from] GeometryError),
}

/// Kinds of recoverable findings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum WarningCode {
    EdgeEdgeIntersectionFailed,
    EdgeFaceIntersectionFailed,
    FaceFaceIntersectionFailed,
    PCurveNotBuilt,
    SectionEdgeRejected,
}

impl fmt::Display for WarningCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            WarningCode::EdgeEdgeIntersectionFailed => "edge-edge intersection failed",
            WarningCode::EdgeFaceIntersectionFailed => "edge-face intersection failed",
            WarningCode::FaceFaceIntersectionFailed => "face-face intersection failed",
            WarningCode::PCurveNotBuilt => "could not build 2D curve of edge on face",
            WarningCode::SectionEdgeRejected => "section edge rejected",
        };
        f.write_str(text)
    }
}

/// A recoverable finding on the DS indices it names.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Warning {
    pub code: WarningCode,
    pub indices: Vec<usize>,
    pub message: String,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} for {:?}: {}", self.code, self.indices, self.message)
    }
}

/// Errors and warnings accumulated over one run.
#[derive(Debug, Clone, Default)]
pub struct Report {
    errors: Vec<FillerError>,
    warnings: Vec<Warning>,
}

impl Report {
    pub fn add_error(&mut self, error: FillerError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, code: WarningCode, indices: Vec<usize>, message: impl Into<String>) {
        let warning = Warning {
            code,
            indices,
            message: message.into(),
        };
        tracing::warn!(%warning, "recoverable failure");
        self.warnings.push(warning);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn errors(&self) -> &[FillerError] {
        &self.errors
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn warning_codes(&self) -> impl Iterator<Item = WarningCode> + '_ {
        self.warnings.iter().map(|w| w.code)
    }

    pub fn clear(&mut self) {
        self.errors.clear();
        self.warnings.clear();
    }
}
