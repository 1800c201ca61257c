use async_trait::async_trait;
use futures::TryStreamExt;
use bson::{Document, doc};
use mongodb::{
    Client, Collection as MongoCollection,
    options::ClientOptions,
};
use tracing::{debug, info};

use doctable_core::{
    backend::{StoreBackend, StoreBackendBuilder, UpdateOutcome, WriteScope},
    config::DatabaseConfig,
    error::{DatabaseError, DatabaseResult},
};


/// A connected MongoDB backend.
///
/// Construction pings the server, so a `MongoDbStore` value always refers to a store that
/// was reachable when it was built. The driver's connection pool is shared by every
/// collection handle and is released by [`StoreBackend::shutdown`].
#[derive(Debug)]
pub struct MongoDbStore {
    client: Client,
    database: String,
}

impl MongoDbStore {
    /// Wraps an already-connected client. No handshake is performed.
    pub fn new(client: Client, database: String) -> Self {
        Self { client, database }
    }

    /// Returns a builder connecting with `config`.
    pub fn builder(config: DatabaseConfig) -> MongoDbStoreBuilder {
        MongoDbStoreBuilder::new(config)
    }

    /// Validates `config`, connects and pings the server.
    ///
    /// # Errors
    ///
    /// - [`DatabaseError::Configuration`] if an identifier is empty or the uri does not parse
    /// - [`DatabaseError::Connection`] if no server answers within the selection timeout
    pub async fn connect(config: &DatabaseConfig) -> DatabaseResult<Self> {
        config.validate()?;

        let mut options = ClientOptions::parse(&config.uri)
            .await
            .map_err(|e| DatabaseError::Configuration(e.to_string()))?;
        options.server_selection_timeout = Some(config.server_selection_timeout());

        let client = Client::with_options(options)
            .map_err(|e| DatabaseError::Configuration(e.to_string()))?;

        client
            .database(&config.database)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| DatabaseError::Connection(e.to_string()))?;

        info!(database = %config.database, "connected to MongoDB");
        Ok(Self::new(client, config.database.clone()))
    }

    /// Returns the driver handle for a collection, for anything the facade does not cover.
    pub fn collection(&self, name: &str) -> MongoCollection<Document> {
        self.client
            .database(&self.database)
            .collection(name)
    }

    /// Returns the name of the database this store targets.
    pub fn database_name(&self) -> &str {
        &self.database
    }
}

#[async_trait]
impl StoreBackend for MongoDbStore {
    async fn insert_documents(&self, documents: Vec<Document>, collection: &str) -> DatabaseResult<()> {
        self.collection(collection)
            .insert_many(documents)
            .await
            .map_err(|e| DatabaseError::Operation(e.to_string()))?;

        Ok(())
    }

    async fn update_documents(
        &self,
        filter: Document,
        update: Document,
        scope: WriteScope,
        collection: &str,
    ) -> DatabaseResult<UpdateOutcome> {
        let handle = self.collection(collection);

        let result = match scope {
            WriteScope::One => handle.update_one(filter, update).await,
            WriteScope::Many => handle.update_many(filter, update).await,
        }
        .map_err(|e| DatabaseError::Operation(e.to_string()))?;

        Ok(UpdateOutcome {
            matched: result.matched_count,
            modified: result.modified_count,
        })
    }

    async fn delete_documents(&self, filter: Document, scope: WriteScope, collection: &str) -> DatabaseResult<u64> {
        let handle = self.collection(collection);

        let result = match scope {
            WriteScope::One => handle.delete_one(filter).await,
            WriteScope::Many => handle.delete_many(filter).await,
        }
        .map_err(|e| DatabaseError::Operation(e.to_string()))?;

        Ok(result.deleted_count)
    }

    async fn aggregate(&self, pipeline: Vec<Document>, collection: &str) -> DatabaseResult<Vec<Document>> {
        debug!(collection, stages = pipeline.len(), "running aggregation");

        // Output is returned untouched; caller stages may emit their own `_id`.
        self.collection(collection)
            .aggregate(pipeline)
            .await
            .map_err(|e| DatabaseError::Operation(e.to_string()))?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(|e| DatabaseError::Operation(e.to_string()))
    }

    async fn shutdown(self) -> DatabaseResult<()> {
        self.client.shutdown().await;

        info!(database = %self.database, "disconnected from MongoDB");
        Ok(())
    }
}

/// Builds a [`MongoDbStore`] from a [`DatabaseConfig`], failing fast on bad settings or an
/// unreachable server.
#[derive(Debug, Clone)]
pub struct MongoDbStoreBuilder {
    config: DatabaseConfig,
}

impl MongoDbStoreBuilder {
    pub fn new(config: DatabaseConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl StoreBackendBuilder for MongoDbStoreBuilder {
    type Backend = MongoDbStore;

    async fn build(self) -> DatabaseResult<Self::Backend> {
        MongoDbStore::connect(&self.config).await
    }
}
