use tracing::{debug, info, instrument};

use super::PaveFiller;
use crate::error::FillerError;

impl PaveFiller {
    /// Tag new split and section edges too short to survive their own
    /// vertex tolerances. They stay in the DS; the builder decides.
    #[instrument(skip(self))]
    pub(super) fn process_degenerated(&mut self) -> Result<(), FillerError> {
        let mut tagged = Vec::new();
        for pb in 0..self.ds.n_pave_blocks() {
            if !self.ds.is_current(pb) {
                continue;
            }
            let block = self.ds.pave_block(pb)?;
            let Some(edge) = block.edge else {
                continue;
            };
            if block.micro && self.ds.is_new_shape(edge) && !self.ds.is_degenerated(edge) {
                tagged.push(edge);
            }
        }
        tagged.sort_unstable();
        tagged.dedup();
        for &edge in &tagged {
            debug!(edge, "micro edge tagged degenerated");
            self.ds.mark_degenerated(edge);
        }
        info!(
            n_tagged = tagged.len(),
            n_degenerated = self.ds.degenerated_edges().len(),
            "degenerated edges processed"
        );
        Ok(())
    }
}
