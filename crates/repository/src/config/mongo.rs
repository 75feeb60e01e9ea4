//! Settings for the MongoDB organization store.
//!
//! `MONGO_URI` carries everything: hosts, credentials, the database in the
//! path and options such as `authSource`. `MONGO_DATABASE` only applies when
//! the URI names no database.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
}

impl Default for MongoConfig {
    fn default() -> Self {
        Self {
            uri: "mongodb://localhost:27017/organizations".to_string(),
            database: "organizations".to_string(),
        }
    }
}

impl MongoConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::prefixed("MONGO_").from_env()
    }

    /// Where the client connects, without credentials. Safe to log.
    pub fn target(&self) -> String {
        match url::Url::parse(&self.uri) {
            Ok(parsed) => format!(
                "{}:{}{}",
                parsed.host_str().unwrap_or_default(),
                parsed.port().unwrap_or(27017),
                parsed.path()
            ),
            Err(_) => format!("<unparsed uri>/{}", self.database),
        }
    }
}
