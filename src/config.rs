use std::{env, fmt::Display, str::FromStr};

use crate::{constants::PAGE_SIZE, cryptography::generate_token, error::ConfigError};

/// What to do with `is_favorited` / `is_in_shopping_cart` when the caller is anonymous.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AnonymousFilterPolicy {
    /// Drop the predicate and list as if it was never given.
    #[default]
    Ignore,
    /// Answer with 401.
    Reject,
}

impl FromStr for AnonymousFilterPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ignore" => Ok(Self::Ignore),
            "reject" => Ok(Self::Reject),
            other => Err(ConfigError::new(format!(
                "unknown anonymous filter policy '{other}'"
            ))),
        }
    }
}

impl Display for AnonymousFilterPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ignore => write!(f, "ignore"),
            Self::Reject => write!(f, "reject"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub redis_url: Option<String>,
    pub jwt_secret: String,
    pub session_lifetime_hours: i64,
    pub page_size: i64,
    pub max_connections: u32,
    pub auto_migrate: bool,
    pub anonymous_filter_policy: AnonymousFilterPolicy,
}

impl Config {
    /// Reads the environment, after loading `.env` when one exists.
    pub fn load() -> Result<Self, ConfigError> {
        if let Err(e) = dotenvy::dotenv() {
            log::debug!("No .env file loaded: {e}");
        }

        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|url| !url.is_empty())
            .ok_or_else(|| ConfigError::new(String::from("DATABASE_URL is not set")))?;

        let redis_url = lookup("REDIS_URL").filter(|url| !url.is_empty());
        if redis_url.is_none() {
            log::warn!("REDIS_URL not set, reference data will not be cached");
        }

        let jwt_secret = match lookup("JWT_SECRET").filter(|secret| !secret.is_empty()) {
            Some(secret) => secret,
            None => {
                log::warn!("JWT_SECRET not set, sessions will not survive a restart");
                generate_token(64)
            }
        };

        let config = Self {
            port: try_load(&lookup, "PORT", "8000")?,
            database_url,
            redis_url,
            jwt_secret,
            session_lifetime_hours: try_load(&lookup, "SESSION_LIFETIME_HOURS", "24")?,
            page_size: try_load(&lookup, "PAGE_SIZE", &PAGE_SIZE.to_string())?,
            max_connections: try_load(&lookup, "DATABASE_MAX_CONNECTIONS", "5")?,
            auto_migrate: try_load(&lookup, "AUTO_MIGRATE", "true")?,
            anonymous_filter_policy: try_load(&lookup, "ANONYMOUS_FILTER_POLICY", "ignore")?,
        };

        if config.page_size < 1 {
            return Err(ConfigError::new(String::from("PAGE_SIZE must be positive")));
        }
        if config.session_lifetime_hours < 1 {
            return Err(ConfigError::new(String::from(
                "SESSION_LIFETIME_HOURS must be positive",
            )));
        }

        Ok(config)
    }

    pub fn session_lifetime(&self) -> chrono::Duration {
        chrono::Duration::hours(self.session_lifetime_hours)
    }
}

fn try_load<T, F>(lookup: &F, key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .unwrap_or_else(|| {
            log::info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| ConfigError::new(format!("invalid {key} value: {e}")))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let Ok(config) = load(&[("DATABASE_URL", "postgres://localhost/foodgram")]) else {
            panic!("config should load");
        };
        assert_eq!(config.port, 8000);
        assert_eq!(config.page_size, PAGE_SIZE);
        assert_eq!(config.redis_url, None);
        assert_eq!(config.jwt_secret.len(), 64);
        assert!(config.auto_migrate);
        assert_eq!(config.anonymous_filter_policy, AnonymousFilterPolicy::Ignore);
    }

    #[test]
    fn overrides() {
        let Ok(config) = load(&[
            ("DATABASE_URL", "postgres://db/foodgram"),
            ("REDIS_URL", "redis://cache"),
            ("PORT", "9000"),
            ("JWT_SECRET", "shh"),
            ("ANONYMOUS_FILTER_POLICY", "Reject"),
            ("AUTO_MIGRATE", "false"),
        ]) else {
            panic!("config should load");
        };
        assert_eq!(config.port, 9000);
        assert_eq!(config.redis_url.as_deref(), Some("redis://cache"));
        assert_eq!(config.jwt_secret, "shh");
        assert!(!config.auto_migrate);
        assert_eq!(config.anonymous_filter_policy, AnonymousFilterPolicy::Reject);
    }

    #[test]
    fn missing_database_and_bad_values() {
        assert!(load(&[]).is_err());
        assert!(load(&[("DATABASE_URL", "postgres://db"), ("PORT", "eighty")]).is_err());
        assert!(load(&[("DATABASE_URL", "postgres://db"), ("PAGE_SIZE", "0")]).is_err());
        assert!(load(&[
            ("DATABASE_URL", "postgres://db"),
            ("ANONYMOUS_FILTER_POLICY", "sometimes")
        ])
        .is_err());
    }
}
