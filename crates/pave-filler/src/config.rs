use serde::{Deserialize, Serialize};

use crate::error::FillerError;

/// Tuning parameters of one intersection run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillerConfig {
    /// Extra tolerance blended into every proximity test.
    pub fuzzy_value: f64,
    /// Compute edge/edge, edge/face and face/face pairs on the rayon pool.
    pub run_parallel: bool,
    /// Interior samples compared when matching a section block against an
    /// existing pave block. Odd, at least 3.
    pub post_treat_samples: usize,
    /// Let vertices created on tangential contacts reach the ends of their
    /// common range when pulled onto section curves.
    pub extended_tolerance: bool,
    /// Outward steps used to bracket the common range of a contact.
    pub tangent_range_samples: usize,
    /// Samples of a polyline pcurve on a curved face.
    pub pcurve_samples: usize,
    /// Never write into the input shapes; tolerance growth lives in the DS.
    pub non_destructive: bool,
}

impl Default for FillerConfig {
    fn default() -> Self {
        Self {
            fuzzy_value: 0.0,
            run_parallel: false,
            post_treat_samples: 5,
            extended_tolerance: true,
            tangent_range_samples: 16,
            pcurve_samples: 16,
            non_destructive: true,
        }
    }
}

impl FillerConfig {
    pub fn with_fuzzy_value(mut self, fuzzy_value: f64) -> Self {
        self.fuzzy_value = fuzzy_value;
        self
    }

    pub fn with_run_parallel(mut self, run_parallel: bool) -> Self {
        self.run_parallel = run_parallel;
        self
    }

    pub fn with_post_treat_samples(mut self, samples: usize) -> Self {
        self.post_treat_samples = samples;
        self
    }

    pub fn with_extended_tolerance(mut self, enabled: bool) -> Self {
        self.extended_tolerance = enabled;
        self
    }

    pub fn with_tangent_range_samples(mut self, samples: usize) -> Self {
        self.tangent_range_samples = samples;
        self
    }

    pub fn with_pcurve_samples(mut self, samples: usize) -> Self {
        self.pcurve_samples = samples;
        self
    }

    pub fn validate(&self) -> Result<(), FillerError> {
        if !self.fuzzy_value.is_finite() || self.fuzzy_value < 0.0 {
            return Err(FillerError::InvalidFuzzyValue(self.fuzzy_value));
        }
        if self.post_treat_samples < 3 || self.post_treat_samples % 2 == 0 {
            return Err(FillerError::InvalidConfig(format!(
                "post_treat_samples must be odd and at least 3, got {}",
                self.post_treat_samples
            )));
        }
        if self.tangent_range_samples == 0 {
            return Err(FillerError::InvalidConfig(
                "tangent_range_samples must be positive".into(),
            ));
        }
        if self.pcurve_samples < 2 {
            return Err(FillerError::InvalidConfig(format!(
                "pcurve_samples must be at least 2, got {}",
                self.pcurve_samples
            )));
        }
        Ok(())
    }
}
