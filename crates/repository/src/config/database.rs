//! Settings for the PostgreSQL organization store.
//!
//! Read from `POSTGRES_*` variables (`POSTGRES_HOST`, `POSTGRES_PORT`,
//! `POSTGRES_USER`, `POSTGRES_PASSWORD`, `POSTGRES_DATABASE`, plus the pool
//! knobs). A non-empty `DATABASE_URL` wins over all of them, which is how the
//! compose manifest points the application at the `postgres` service.

use serde::Deserialize;
use sqlx::postgres::PgConnectOptions;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub max_connections: u32,
    pub min_connections: u32,
    /// Seconds to wait for a pooled connection.
    pub acquire_timeout: u64,
    #[serde(skip)]
    pub url: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            user: "root".to_string(),
            password: String::new(),
            database: "organizations".to_string(),
            max_connections: 10,
            min_connections: 1,
            acquire_timeout: 30,
            url: None,
        }
    }
}

impl DatabaseConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        let mut config: DatabaseConfig = envy::prefixed("POSTGRES_").from_env()?;
        config.url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());
        Ok(config)
    }

    pub fn connect_options(&self) -> Result<PgConnectOptions, sqlx::Error> {
        match &self.url {
            Some(url) => url.parse(),
            None => Ok(PgConnectOptions::new()
                .host(&self.host)
                .port(self.port)
                .username(&self.user)
                .password(&self.password)
                .database(&self.database)),
        }
    }

    /// Where the pool connects, without credentials. Safe to log.
    pub fn target(&self) -> String {
        match self.url.as_deref().and_then(|u| url::Url::parse(u).ok()) {
            Some(parsed) => format!(
                "{}:{}{}",
                parsed.host_str().unwrap_or_default(),
                parsed.port().unwrap_or(5432),
                parsed.path()
            ),
            None => format!("{}:{}/{}", self.host, self.port, self.database),
        }
    }
}
