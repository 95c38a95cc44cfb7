use crate::bloom::BloomConfig;
use crate::error::{FilterError, Result};
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Longest accepted rotation period, 30 years.
pub const MAX_TTL: Duration = Duration::from_secs(30 * 365 * 24 * 60 * 60);

#[derive(Clone, Debug, PartialEq, Builder, Serialize, Deserialize)]
#[builder(pattern = "owned")]
pub struct RotatingConfig {
    /// Config shared by every generation
    #[builder(default)]
    pub bloom: BloomConfig,

    /// Rotation period
    #[builder(default = "Duration::from_secs(60)")]
    pub ttl: Duration,
}

impl RotatingConfig {
    pub fn validate(&self) -> Result<()> {
        self.bloom.validate()?;
        if self.ttl.is_zero() {
            return Err(FilterError::InvalidConfig(
                "Rotation ttl must be greater than 0".into(),
            ));
        }
        if self.ttl > MAX_TTL {
            return Err(FilterError::InvalidConfig(format!(
                "Rotation ttl must be at most {MAX_TTL:?}, got {:?}",
                self.ttl
            )));
        }
        Ok(())
    }
}
