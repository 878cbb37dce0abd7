//! Connection configuration and pool construction.

use migcheck_core::MigcheckError;

/// Parameters for connecting to the target database.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// The database name.
    pub name: String,
    /// The database host.
    pub host: String,
    /// The database port.
    pub port: u16,
    /// The database user.
    pub user: Option<String>,
    /// The database password.
    pub password: Option<String>,
}

impl DatabaseConfig {
    /// Creates a configuration for a PostgreSQL database.
    pub fn postgres(name: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port,
            user: None,
            password: None,
        }
    }

    /// Sets the user to connect as.
    #[must_use]
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Sets the password to authenticate with.
    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Builds a `deadpool-postgres` pool from this configuration.
    pub fn create_pool(&self) -> Result<deadpool_postgres::Pool, MigcheckError> {
        let mut pg_config = deadpool_postgres::Config::new();
        pg_config.dbname = Some(self.name.clone());
        pg_config.host = Some(self.host.clone());
        pg_config.port = Some(self.port);
        pg_config.user = self.user.clone();
        pg_config.password = self.password.clone();

        pg_config
            .create_pool(
                Some(deadpool_postgres::Runtime::Tokio1),
                tokio_postgres::NoTls,
            )
            .map_err(|e| MigcheckError::Configuration(format!("Failed to create pool: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_postgres() {
        let cfg = DatabaseConfig::postgres("appdb", "localhost", 5432);
        assert_eq!(cfg.name, "appdb");
        assert_eq!(cfg.host, "localhost");
        assert_eq!(cfg.port, 5432);
        assert!(cfg.user.is_none());
    }

    #[test]
    fn test_config_builder() {
        let cfg = DatabaseConfig::postgres("appdb", "db.internal", 5432)
            .user("migcheck")
            .password("secret");
        assert_eq!(cfg.user.as_deref(), Some("migcheck"));
        assert_eq!(cfg.password.as_deref(), Some("secret"));
    }
}
