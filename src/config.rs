use serde::{Deserialize, Serialize};

/// Batch sizing and retry behaviour for the coordinator and applier
/// (spec §6).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BatchConfig {
    pub batch_size: u64,
    pub max_retry_passes: u32,
}

impl Default for BatchConfig {
    fn default() -> Self {
        BatchConfig {
            batch_size: 1000,
            max_retry_passes: 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = BatchConfig::default();
        assert_eq!(cfg.batch_size, 1000);
        assert_eq!(cfg.max_retry_passes, 3);
    }

    #[test]
    fn unknown_fields_are_ignored_on_deserialize() {
        let json = r#"{"batch_size": 50, "max_retry_passes": 2, "unused": true}"#;
        let cfg: BatchConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.batch_size, 50);
        assert_eq!(cfg.max_retry_passes, 2);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let cfg: BatchConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, BatchConfig::default());
    }
}
