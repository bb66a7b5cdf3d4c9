//! Environment-driven configuration.

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::error::AdminError;

const DATABASE_URL: &str = "DATABASE_URL";
const MAX_CONNECTIONS: &str = "CHRONICLE_MAX_CONNECTIONS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminConfig {
    pub database_url: String,
    pub max_connections: u32,
}

impl AdminConfig {
    pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

    /// Reads configuration from the process environment.
    ///
    /// # Errors
    ///
    /// See [`AdminConfig::from_lookup`].
    pub fn from_env() -> Result<Self, AdminError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads configuration through `lookup`, which returns a variable's
    /// value or `None` when unset.
    ///
    /// # Errors
    ///
    /// - `AdminError::MissingVariable` if `DATABASE_URL` is unset or blank.
    /// - `AdminError::InvalidVariable` if `CHRONICLE_MAX_CONNECTIONS` is not
    ///   a positive integer.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AdminError> {
        let database_url = lookup(DATABASE_URL)
            .filter(|url| !url.trim().is_empty())
            .ok_or(AdminError::MissingVariable(DATABASE_URL))?;

        let max_connections = match lookup(MAX_CONNECTIONS) {
            None => Self::DEFAULT_MAX_CONNECTIONS,
            Some(raw) => match raw.trim().parse::<u32>() {
                Ok(0) => {
                    return Err(AdminError::InvalidVariable {
                        name: MAX_CONNECTIONS,
                        value: raw,
                        reason: "must be at least 1".to_owned(),
                    });
                }
                Ok(n) => n,
                Err(e) => {
                    return Err(AdminError::InvalidVariable {
                        name: MAX_CONNECTIONS,
                        value: raw,
                        reason: e.to_string(),
                    });
                }
            },
        };

        Ok(Self {
            database_url,
            max_connections,
        })
    }

    /// Opens a connection pool to `database_url`.
    ///
    /// # Errors
    ///
    /// Returns `AdminError::Database` if the URL is malformed or the
    /// database cannot be reached.
    pub async fn connect(&self) -> Result<PgPool, AdminError> {
        let pool = PgPoolOptions::new()
            .max_connections(self.max_connections)
            .connect(&self.database_url)
            .await?;
        Ok(pool)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::AdminConfig;
    use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::error::AdminError;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults_max_connections() {
        let config =
            AdminConfig::from_lookup(lookup_from(&[("DATABASE_URL", "postgres://localhost/c")]))
                .unwrap();

        assert_eq!(config.database_url, "postgres://localhost/c");
        assert_eq!(config.max_connections, AdminConfig::DEFAULT_MAX_CONNECTIONS);
    }

    #[test]
    fn test_reads_max_connections() {
        let config = AdminConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/c"),
            ("CHRONICLE_MAX_CONNECTIONS", " 12 "),
        ]))
        .unwrap();

        assert_eq!(config.max_connections, 12);
    }

    #[test]
    fn test_missing_database_url_is_rejected() {
        let result = AdminConfig::from_lookup(lookup_from(&[("DATABASE_URL", "  ")]));

        assert!(matches!(
            result,
            Err(AdminError::MissingVariable("DATABASE_URL"))
        ));
    }

    #[test]
    fn test_invalid_max_connections_is_rejected() {
        for raw in ["0", "many", "-3"] {
            let result = AdminConfig::from_lookup(lookup_from(&[
                ("DATABASE_URL", "postgres://localhost/c"),
                ("CHRONICLE_MAX_CONNECTIONS", raw),
            ]));

            match result {
                Err(AdminError::InvalidVariable { name, value, .. }) => {
                    assert_eq!(name, "CHRONICLE_MAX_CONNECTIONS");
                    assert_eq!(value, raw);
                }
                other => panic!("expected InvalidVariable for {raw:?}, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_connect_with_malformed_url_returns_database_error() {
        let config = AdminConfig {
            database_url: "not a database url".to_owned(),
            max_connections: 1,
        };

        let result = config.connect().await;

        assert!(matches!(result, Err(AdminError::Database(_))));
    }
}
