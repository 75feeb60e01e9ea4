//! MongoDB store: one document per organization in the `organizations`
//! collection, keyed by name.
//!
//! A standalone server has no multi-document transactions, so updates use a
//! version counter instead: read, mutate, then replace only if the version is
//! still the one that was read. A lost race re-reads and re-applies the
//! mutation.

use async_trait::async_trait;
use mongodb::{
    bson::doc,
    error::{ErrorKind, WriteFailure},
    options::ClientOptions,
    Client, Collection, Database,
};
use serde::{Deserialize, Serialize};

use super::{organization_not_found, Mutation, OrganizationStore};
use crate::config::MongoConfig;
use crate::domain::Organization;
use crate::error::{AppError, AppResult};

const COLLECTION: &str = "organizations";
const DUPLICATE_KEY: i32 = 11000;
const UPDATE_ATTEMPTS: u32 = 8;

#[derive(Debug, Serialize, Deserialize)]
struct StoredOrganization {
    #[serde(rename = "_id")]
    name: String,
    version: i64,
    organization: Organization,
}

#[derive(Clone)]
pub struct MongoOrganizationStore {
    database: Database,
    organizations: Collection<StoredOrganization>,
}

impl MongoOrganizationStore {
    /// Connect and ping once, so a wrong URI fails at startup.
    pub async fn connect(config: &MongoConfig) -> AppResult<Self> {
        let mut options = ClientOptions::parse(&config.uri).await?;
        options.app_name = Some("sio-repository".to_string());
        let client = Client::with_options(options)?;
        let database = client
            .default_database()
            .unwrap_or_else(|| client.database(&config.database));

        database.run_command(doc! { "ping": 1 }).await?;
        tracing::info!(
            target = %config.target(),
            database = %database.name(),
            "Connected to organization database"
        );
        Ok(Self::new(database))
    }

    pub fn new(database: Database) -> Self {
        let organizations = database.collection(COLLECTION);
        Self {
            database,
            organizations,
        }
    }

    async fn load(&self, name: &str) -> AppResult<Option<StoredOrganization>> {
        Ok(self.organizations.find_one(doc! { "_id": name }).await?)
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(e)) if e.code == DUPLICATE_KEY
    )
}

#[async_trait]
impl OrganizationStore for MongoOrganizationStore {
    fn backend(&self) -> &'static str {
        "mongo"
    }

    async fn insert(&self, organization: Organization) -> AppResult<()> {
        let stored = StoredOrganization {
            name: organization.name.clone(),
            version: 0,
            organization,
        };
        match self.organizations.insert_one(&stored).await {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => Err(AppError::Conflict(format!(
                "Organization '{}' already exists",
                stored.name
            ))),
            Err(e) => Err(e.into()),
        }
    }

    async fn get(&self, name: &str) -> AppResult<Option<Organization>> {
        Ok(self.load(name).await?.map(|stored| stored.organization))
    }

    async fn list(&self) -> AppResult<Vec<String>> {
        let ids = self.organizations.distinct("_id", doc! {}).await?;
        let mut names: Vec<String> = ids
            .iter()
            .filter_map(|id| id.as_str().map(str::to_string))
            .collect();
        names.sort();
        Ok(names)
    }

    async fn update(&self, name: &str, mutation: Mutation<'_>) -> AppResult<()> {
        for attempt in 1..=UPDATE_ATTEMPTS {
            let stored = self
                .load(name)
                .await?
                .ok_or_else(|| organization_not_found(name))?;

            let mut organization = stored.organization;
            mutation(&mut organization)?;

            let replacement = StoredOrganization {
                name: name.to_string(),
                version: stored.version + 1,
                organization,
            };
            let result = self
                .organizations
                .replace_one(doc! { "_id": name, "version": stored.version }, &replacement)
                .await?;
            if result.matched_count == 1 {
                tracing::debug!(organization = %name, version = replacement.version, "Organization updated");
                return Ok(());
            }
            tracing::debug!(organization = %name, attempt, "Concurrent update, retrying");
        }

        Err(AppError::Conflict(format!(
            "Organization '{}' is being modified concurrently, try again",
            name
        )))
    }

    async fn health(&self) -> bool {
        self.database.run_command(doc! { "ping": 1 }).await.is_ok()
    }
}
