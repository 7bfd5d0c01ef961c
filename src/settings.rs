use std::path::PathBuf;

use anyhow::Context;
use serde::Deserialize;

use crate::library::validate::{DEFAULT_LOAN_DAYS, MAX_LOAN_DAYS};

const CONFIG_DIR_ENV: &str = "CAMPUSD_CONFIG_DIR";
const CONFIG_FILE: &str = "campusd.toml";

#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Process configuration layered from `campusd.toml` and `CAMPUSD_*` variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Workspace opened before the first request is read.
    #[serde(default)]
    pub workspace: Option<PathBuf>,
    #[serde(default = "Settings::default_loan_period_days")]
    pub loan_period_days: i64,
    #[serde(default = "Settings::default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
}

impl Settings {
    pub fn load() -> anyhow::Result<Self> {
        // A missing `.env` is fine.
        let _ = dotenvy::dotenv();

        let config_dir = match std::env::var(CONFIG_DIR_ENV) {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => std::env::current_dir()
                .context("unable to resolve current directory")?
                .join("config"),
        };

        let cfg = config::Config::builder()
            .add_source(config::File::from(config_dir.join(CONFIG_FILE)).required(false))
            .add_source(config::Environment::with_prefix("CAMPUSD").try_parsing(true))
            .build()
            .context("failed to build configuration")?;

        let settings: Settings = cfg
            .try_deserialize()
            .context("failed to deserialize configuration")?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if !(1..=MAX_LOAN_DAYS).contains(&self.loan_period_days) {
            anyhow::bail!(
                "loan_period_days must be within 1..={MAX_LOAN_DAYS}, got {}",
                self.loan_period_days
            );
        }
        Ok(())
    }

    fn default_loan_period_days() -> i64 {
        DEFAULT_LOAN_DAYS
    }

    fn default_log_level() -> String {
        "info".to_string()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            workspace: None,
            loan_period_days: Self::default_loan_period_days(),
            log_level: Self::default_log_level(),
            log_format: LogFormat::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_use_two_week_loans() {
        let settings = Settings::default();
        assert_eq!(settings.loan_period_days, 14);
        assert_eq!(settings.log_format, LogFormat::Pretty);
        assert!(settings.workspace.is_none());
    }

    #[test]
    fn loan_period_outside_bounds_is_rejected() {
        for days in [-1, 0, MAX_LOAN_DAYS + 1, 100_000_000] {
            let settings = Settings {
                loan_period_days: days,
                ..Settings::default()
            };
            assert!(settings.validate().is_err(), "{days}");
        }
        let longest = Settings {
            loan_period_days: MAX_LOAN_DAYS,
            ..Settings::default()
        };
        assert!(longest.validate().is_ok());
    }
}
