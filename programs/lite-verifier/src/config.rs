//! TOML configuration for the trust options.

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;
use serde_with::{serde_as, DisplayFromStr};
use tendermint_lite_client::{verifier::Options, TrustLevel};

use crate::cli::command::TrustOptions;

/// Trust options read from a config file, e.g.
///
/// ```toml
/// trust_level = "1/3"
/// trusting_period_secs = 1209600
/// clock_drift_secs = 15
/// ```
#[serde_as]
#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Trust level as `numerator/denominator`
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub trust_level: Option<TrustLevel>,
    /// Trusting period in seconds
    pub trusting_period_secs: Option<u64>,
    /// Maximum clock drift in seconds
    pub clock_drift_secs: Option<u64>,
}

/// Errors while loading a config file
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file cannot be read
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        /// Config path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },
    /// The file is not valid TOML for [`Config`]
    #[error("failed to parse config file {}: {source}", path.display())]
    Parse {
        /// Config path
        path: PathBuf,
        /// Underlying error
        source: toml::de::Error,
    },
}

impl Config {
    /// Loads the config file at `path`.
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Resolves the verification options: flags first, then this config, then the defaults.
    #[must_use]
    pub fn options(&self, flags: &TrustOptions) -> Options {
        let defaults = Options::default();
        Options {
            trust_level: flags
                .trust_level
                .or(self.trust_level)
                .unwrap_or(defaults.trust_level),
            trusting_period: flags
                .trusting_period
                .or(self.trusting_period_secs)
                .map_or(defaults.trusting_period, Duration::from_secs),
            clock_drift: flags
                .clock_drift
                .or(self.clock_drift_secs)
                .map_or(defaults.clock_drift, Duration::from_secs),
        }
    }
}

#[cfg(test)]
mod test {
    use std::{io::Write, time::Duration};

    use tendermint_lite_client::{verifier::Options, TrustLevel};

    use super::{Config, ConfigError};
    use crate::cli::command::TrustOptions;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load() {
        let file = write_config(
            r#"
            trust_level = "2/3"
            trusting_period_secs = 3600
            "#,
        );
        let config = Config::load(file.path()).unwrap();
        assert_eq!(
            config,
            Config {
                trust_level: Some(TrustLevel::TWO_THIRDS),
                trusting_period_secs: Some(3600),
                clock_drift_secs: None,
            }
        );
    }

    #[test]
    fn test_load_rejects_invalid_trust_level() {
        let file = write_config(r#"trust_level = "0/3""#);
        let err = Config::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_load_rejects_unknown_keys() {
        let file = write_config("trust = 1");
        assert!(matches!(
            Config::load(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
        assert!(err.to_string().contains("missing.toml"));
    }

    #[test]
    fn test_options_precedence() {
        let config = Config {
            trust_level: Some(TrustLevel::TWO_THIRDS),
            trusting_period_secs: Some(3600),
            clock_drift_secs: None,
        };
        let flags = TrustOptions {
            trusting_period: Some(60),
            ..TrustOptions::default()
        };

        let options = config.options(&flags);
        assert_eq!(options.trust_level, TrustLevel::TWO_THIRDS);
        assert_eq!(options.trusting_period, Duration::from_secs(60));
        assert_eq!(options.clock_drift, Options::default().clock_drift);
    }

    #[test]
    fn test_options_default() {
        assert_eq!(
            Config::default().options(&TrustOptions::default()),
            Options::default()
        );
    }
}
