use rand::RngCore;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Server configuration, loaded from the environment with sane defaults.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub upload_dir: PathBuf,

    /// Room lifespan cap; `create` rejects anything longer.
    pub max_room_lifespan: Duration,
    /// How long an issued session stays valid.
    pub session_ttl: Duration,
    /// How often the expiry sweep runs.
    pub sweep_interval: Duration,

    pub max_files_per_room: usize,
    /// Sessions issuable per room; `None` disables quotas.
    pub room_token_quota: Option<i64>,
    /// How long a relay receiver waits for a sender by default.
    pub relay_wait: Duration,

    pub jwt_secret: Vec<u8>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            upload_dir: PathBuf::from("./uploads"),
            max_room_lifespan: Duration::from_secs(60 * 60),
            session_ttl: Duration::from_secs(10 * 60),
            sweep_interval: Duration::from_secs(30),
            max_files_per_room: 30,
            room_token_quota: None,
            relay_wait: Duration::from_secs(5 * 60),
            jwt_secret: generate_secret(),
        }
    }
}

impl Config {
    /// Loads configuration from environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut cfg = Self::default();

        if let Some(port) = parse_env("PORT")? {
            cfg.port = port;
        }
        if let Ok(dir) = std::env::var("UPLOAD_DIR") {
            if !dir.trim().is_empty() {
                cfg.upload_dir = PathBuf::from(dir);
            }
        }

        if let Some(secs) = parse_env::<u64>("MAX_ROOM_LIFESPAN_SECS")? {
            cfg.max_room_lifespan = positive_secs("MAX_ROOM_LIFESPAN_SECS", secs)?;
        }
        if let Some(secs) = parse_env::<u64>("SESSION_TTL_SECS")? {
            cfg.session_ttl = positive_secs("SESSION_TTL_SECS", secs)?;
        }
        if let Some(secs) = parse_env::<u64>("SWEEP_INTERVAL_SECS")? {
            cfg.sweep_interval = positive_secs("SWEEP_INTERVAL_SECS", secs)?;
        }
        if let Some(secs) = parse_env::<u64>("RELAY_WAIT_SECS")? {
            cfg.relay_wait = positive_secs("RELAY_WAIT_SECS", secs)?;
        }

        if let Some(max_files) = parse_env::<usize>("MAX_FILES")? {
            if max_files == 0 {
                return Err(ConfigError::Invalid {
                    key: "MAX_FILES",
                    reason: "must be positive".to_string(),
                });
            }
            cfg.max_files_per_room = max_files;
        }

        // A quota of 0 would mean "no sessions ever"; the variable must be
        // unset or positive.
        if let Some(quota) = parse_env::<i64>("ROOM_TOKEN_QUOTA")? {
            if quota <= 0 {
                return Err(ConfigError::Invalid {
                    key: "ROOM_TOKEN_QUOTA",
                    reason: "must be positive".to_string(),
                });
            }
            cfg.room_token_quota = Some(quota);
        }

        if let Ok(secret) = std::env::var("JWT_SECRET") {
            if !secret.trim().is_empty() {
                cfg.jwt_secret = secret.into_bytes();
            }
        }

        Ok(cfg)
    }
}

/// Fresh random secret per boot; sessions do not survive a restart anyway.
fn generate_secret() -> Vec<u8> {
    let mut secret = vec![0u8; 32];
    rand::rng().fill_bytes(&mut secret);
    secret
}

fn parse_env<T: std::str::FromStr>(key: &'static str) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => {
            raw.trim().parse().map(Some).map_err(|e| ConfigError::Invalid {
                key,
                reason: format!("{}", e),
            })
        }
        _ => Ok(None),
    }
}

fn positive_secs(key: &'static str, secs: u64) -> Result<Duration, ConfigError> {
    if secs == 0 {
        return Err(ConfigError::Invalid {
            key,
            reason: "must be positive".to_string(),
        });
    }
    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.max_files_per_room, 30);
        assert!(cfg.room_token_quota.is_none());
        assert_eq!(cfg.jwt_secret.len(), 32);
    }

    #[test]
    fn test_secret_is_random_per_boot() {
        assert_ne!(generate_secret(), generate_secret());
    }

    #[rstest]
    #[case("ZERO_SECS", 0, true)]
    #[case("SOME_SECS", 30, false)]
    fn test_positive_secs(#[case] key: &'static str, #[case] secs: u64, #[case] is_err: bool) {
        assert_eq!(positive_secs(key, secs).is_err(), is_err);
    }
}
