// src/config/validate.rs

use crate::config::model::{RawRunnerConfig, RunnerConfig};
use crate::errors::{BatchflowError, Result};

impl TryFrom<RawRunnerConfig> for RunnerConfig {
    type Error = BatchflowError;

    fn try_from(raw: RawRunnerConfig) -> std::result::Result<Self, Self::Error> {
        validate_config(&raw)?;
        Ok(RunnerConfig::new_unchecked(raw.executor, raw.runtime))
    }
}

/// Check semantic invariants serde cannot express.
pub fn validate_config(cfg: &RawRunnerConfig) -> Result<()> {
    validate_workers(cfg)?;
    validate_working_dir(cfg)?;
    Ok(())
}

fn validate_workers(cfg: &RawRunnerConfig) -> Result<()> {
    if cfg.executor.workers == 0 {
        return Err(BatchflowError::ConfigError(
            "[executor].workers must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_working_dir(cfg: &RawRunnerConfig) -> Result<()> {
    let Some(dir) = &cfg.executor.working_dir else {
        return Ok(());
    };
    if !dir.is_dir() {
        return Err(BatchflowError::ConfigError(format!(
            "[executor].working_dir '{}' is not an existing directory",
            dir.display()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_workers_is_rejected() {
        let mut raw = RawRunnerConfig::default();
        raw.executor.workers = 0;
        let err = RunnerConfig::try_from(raw).unwrap_err();
        assert!(err.to_string().contains("workers"));
    }

    #[test]
    fn missing_working_dir_is_rejected() {
        let mut raw = RawRunnerConfig::default();
        raw.executor.working_dir = Some("/definitely/not/here/batchflow".into());
        assert!(matches!(
            RunnerConfig::try_from(raw),
            Err(BatchflowError::ConfigError(_))
        ));
    }

    #[test]
    fn defaults_are_valid() {
        let cfg = RunnerConfig::try_from(RawRunnerConfig::default()).unwrap();
        assert!(cfg.executor().workers >= 1);
        assert!(!cfg.runtime_options().retire_finished);
    }
}
