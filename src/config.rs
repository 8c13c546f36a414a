use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required database configuration fields: {}", .0.join(", "))]
    Missing(Vec<&'static str>),
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Schema the `users` table lives in when `DB_NAME` is unset.
pub const DEFAULT_DATABASE: &str = "group_project";

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: Option<String>,
    pub connection_limit: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    /// Lets `POST /api/database/test` run the caller supplied `query`.
    pub allow_raw_query: bool,
    pub app_host: String,
    pub app_port: u16,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let host = get("DB_HOST");
        let user = get("DB_USER");
        let password = get("DB_PASSWORD");

        let mut missing = Vec::new();
        if host.is_none() {
            missing.push("host");
        }
        if user.is_none() {
            missing.push("user");
        }
        if password.is_none() {
            missing.push("password");
        }
        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }

        let port = parse_or("DB_PORT", get("DB_PORT"), 3306u16)?;
        if port == 0 {
            return Err(ConfigError::Invalid {
                key: "DB_PORT",
                value: port.to_string(),
            });
        }

        let connection_limit = parse_or("DB_CONNECTION_LIMIT", get("DB_CONNECTION_LIMIT"), 10u32)?;
        if connection_limit == 0 {
            return Err(ConfigError::Invalid {
                key: "DB_CONNECTION_LIMIT",
                value: connection_limit.to_string(),
            });
        }

        let allow_raw_query = match get("DB_ALLOW_RAW_QUERY").as_deref() {
            None => false,
            Some(v) if v.eq_ignore_ascii_case("true") || v == "1" => true,
            Some(v) if v.eq_ignore_ascii_case("false") || v == "0" => false,
            Some(v) => {
                return Err(ConfigError::Invalid {
                    key: "DB_ALLOW_RAW_QUERY",
                    value: v.to_string(),
                })
            }
        };

        Ok(Self {
            database: DatabaseConfig {
                host: host.unwrap_or_default(),
                port,
                user: user.unwrap_or_default(),
                password: password.unwrap_or_default(),
                database: Some(get("DB_NAME").unwrap_or_else(|| DEFAULT_DATABASE.into())),
                connection_limit,
            },
            allow_raw_query,
            app_host: get("APP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            app_port: parse_or("APP_PORT", get("APP_PORT"), 8080u16)?,
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    key: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(v) => v
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { key, value: v }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const BASE: [(&str, &str); 3] = [
        ("DB_HOST", "db.local"),
        ("DB_USER", "app"),
        ("DB_PASSWORD", "secret"),
    ];

    #[test]
    fn applies_defaults() {
        let cfg = AppConfig::from_lookup(lookup(&BASE)).unwrap();
        assert_eq!(cfg.database.port, 3306);
        assert_eq!(cfg.database.connection_limit, 10);
        assert_eq!(cfg.database.database.as_deref(), Some("group_project"));
        assert!(!cfg.allow_raw_query);
        assert_eq!(cfg.app_port, 8080);
    }

    #[test]
    fn reports_all_missing_fields() {
        let err = AppConfig::from_lookup(lookup(&[("DB_PASSWORD", "x"), ("DB_HOST", "  ")])).unwrap_err();
        assert_eq!(err, ConfigError::Missing(vec!["host", "user"]));
        assert_eq!(
            err.to_string(),
            "missing required database configuration fields: host, user"
        );
    }

    #[test]
    fn rejects_bad_port() {
        for port in ["0", "70000", "abc"] {
            let mut pairs = BASE.to_vec();
            pairs.push(("DB_PORT", port));
            let err = AppConfig::from_lookup(lookup(&pairs)).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid { key: "DB_PORT", .. }));
        }
    }

    #[test]
    fn reads_optional_values() {
        let mut pairs = BASE.to_vec();
        pairs.extend([
            ("DB_NAME", "inventory"),
            ("DB_CONNECTION_LIMIT", "4"),
            ("DB_ALLOW_RAW_QUERY", "TRUE"),
        ]);
        let cfg = AppConfig::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(cfg.database.database.as_deref(), Some("inventory"));
        assert_eq!(cfg.database.connection_limit, 4);
        assert!(cfg.allow_raw_query);
    }

    #[test]
    fn rejects_zero_connection_limit() {
        let mut pairs = BASE.to_vec();
        pairs.push(("DB_CONNECTION_LIMIT", "0"));
        let err = AppConfig::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "DB_CONNECTION_LIMIT", .. }));
    }

    #[test]
    fn blank_database_name_uses_default_schema() {
        let mut pairs = BASE.to_vec();
        pairs.push(("DB_NAME", " "));
        let cfg = AppConfig::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(cfg.database.database.as_deref(), Some(DEFAULT_DATABASE));
    }
}
