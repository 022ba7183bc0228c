//! Fee-schedule configuration files (JSON).

use std::fs;
use std::path::Path;
use thiserror::Error;
use crate::core::fee::{OperationKind, TieredFeeSchedule};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read fee schedule: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid fee schedule JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid fee rule for {kind}: {bps} bps exceeds 100%")]
    InvalidRule { kind: OperationKind, bps: u32 },
}

/// Parses and validates a schedule from JSON text. Missing operations and components default to zero.
pub fn parse_fee_schedule(json: &str) -> Result<TieredFeeSchedule, ConfigError> {
    let schedule: TieredFeeSchedule = serde_json::from_str(json)?;
    if let Some((kind, bps)) = schedule.find_invalid_bps() {
        return Err(ConfigError::InvalidRule { kind, bps });
    }
    Ok(schedule)
}

pub fn load_fee_schedule(path: &Path) -> Result<TieredFeeSchedule, ConfigError> {
    let text = fs::read_to_string(path)?;
    parse_fee_schedule(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_roundtrips_through_json() {
        let json = serde_json::to_string_pretty(&TieredFeeSchedule::canonical()).unwrap();
        assert_eq!(parse_fee_schedule(&json).unwrap(), TieredFeeSchedule::canonical());
    }

    #[test]
    fn test_rejects_bps_over_100_percent() {
        let json = r#"{ "sale": { "royalty": { "bps": 20000 } } }"#;
        match parse_fee_schedule(json) {
            Err(ConfigError::InvalidRule { kind, bps }) => {
                assert_eq!(kind, OperationKind::Sale);
                assert_eq!(bps, 20_000);
            }
            other => panic!("expected InvalidRule, got {:?}", other),
        }
    }

    #[test]
    fn test_rejects_malformed_json() {
        assert!(matches!(parse_fee_schedule("{ not json"), Err(ConfigError::Json(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = load_fee_schedule(Path::new("/nonexistent/fees.json"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
