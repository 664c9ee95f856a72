//! Engine configuration.
//!
//! All calendar interpretation happens in one explicit IANA zone; nothing in
//! the engine reads the host's zone or clock.

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::dst::DstPolicy;
use crate::error::{RepeatError, Result};

/// Candidates examined by the generic RRULE path before giving up.
pub const DEFAULT_SEARCH_LIMIT: u16 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RepeatConfig {
    /// IANA zone used for day boundaries and wall-clock times (e.g. "Europe/Berlin").
    pub timezone: String,
    pub dst_policy: DstPolicy,
    pub search_limit: u16,
}

impl Default for RepeatConfig {
    fn default() -> Self {
        Self {
            timezone: "UTC".to_string(),
            dst_policy: DstPolicy::default(),
            search_limit: DEFAULT_SEARCH_LIMIT,
        }
    }
}

impl RepeatConfig {
    pub fn with_timezone(timezone: &str) -> Self {
        Self {
            timezone: timezone.to_string(),
            ..Self::default()
        }
    }

    /// Parse a JSON configuration document. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| RepeatError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.zone()?;
        if self.search_limit == 0 {
            return Err(RepeatError::InvalidConfig(
                "search_limit must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// The configured zone.
    ///
    /// # Errors
    /// Returns `RepeatError::InvalidTimezone` if the name is not a valid IANA identifier.
    pub fn zone(&self) -> Result<Tz> {
        self.timezone
            .parse()
            .map_err(|_| RepeatError::InvalidTimezone(self.timezone.clone()))
    }
}
