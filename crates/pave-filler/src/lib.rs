//! Intersection stage of Boolean operations on boundary representations.
//!
//! [`PaveFiller`] indexes every sub-shape of its arguments, runs the
//! pairwise interference stages (VV, VE, VF, EE, EF, FF, then the solid
//! stages), splits edges at the paves found and builds section edges from
//! face/face curves. The resulting [`DataStructure`] is what Boolean
//! builders consume.

pub mod config;
pub mod context;
pub mod ds;
pub mod error;
pub mod filler;
pub mod history;
pub mod iterator;
pub mod progress;

pub use config::FillerConfig;
pub use context::{Context, PointState};
pub use ds::DataStructure;
pub use error::{FillerError, Report, Warning, WarningCode};
pub use filler::{IntersectionFiller, PaveFiller};
pub use history::History;
pub use progress::{CancelToken, Stage};
