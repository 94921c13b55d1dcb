//! Adapter factory, including disposable shadow databases for migrations.

use async_trait::async_trait;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::Result;
use crate::adapter::{PgAdapter, ShadowDatabase, SqlDriverAdapter};
use crate::client::ClientConnector;
use crate::config::{AdapterOptions, ConnectionConfig};
use crate::postgres::PgConnector;
use crate::queryable::{ADAPTER_NAME, PROVIDER};
use crate::sql::quote_identifier;

const SHADOW_DATABASE_PREFIX: &str = "prisma_migrate_shadow_db_";

/// Factory surface the engine drives.
#[async_trait]
pub trait DriverAdapterFactory: Send + Sync {
    fn provider(&self) -> &'static str {
        PROVIDER
    }

    fn adapter_name(&self) -> &'static str {
        ADAPTER_NAME
    }

    async fn connect(&self) -> Result<Box<dyn SqlDriverAdapter>>;

    /// Create a throwaway database and connect to it. Disposing the returned
    /// adapter drops the database.
    async fn connect_to_shadow_db(&self) -> Result<Box<dyn SqlDriverAdapter>>;
}

/// Factory building [`PgAdapter`]s from a [`ClientConnector`].
#[derive(Debug, Clone)]
pub struct PgAdapterFactory<K> {
    connector: K,
    config: ConnectionConfig,
    options: AdapterOptions,
}

impl PgAdapterFactory<PgConnector> {
    /// Factory backed by the sqlx Postgres client.
    pub fn postgres(config: ConnectionConfig, options: AdapterOptions) -> Self {
        Self::new(PgConnector, config, options)
    }
}

impl<K: ClientConnector> PgAdapterFactory<K> {
    pub fn new(connector: K, config: ConnectionConfig, options: AdapterOptions) -> Self {
        Self {
            connector,
            config,
            options,
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn connector(&self) -> &K {
        &self.connector
    }
}

#[async_trait]
impl<K: ClientConnector> DriverAdapterFactory for PgAdapterFactory<K> {
    async fn connect(&self) -> Result<Box<dyn SqlDriverAdapter>> {
        debug!("[pgshim::connect]");
        let client = self.connector.connect(&self.config).await?;
        Ok(Box::new(PgAdapter::new(client, self.options.clone())))
    }

    async fn connect_to_shadow_db(&self) -> Result<Box<dyn SqlDriverAdapter>> {
        let admin = self.connect().await?;
        let database = format!("{SHADOW_DATABASE_PREFIX}{}", Uuid::new_v4());

        let statement = format!("CREATE DATABASE {}", quote_identifier(&database));
        if let Err(err) = admin.execute_script(&statement).await {
            if let Err(cleanup) = admin.dispose().await {
                warn!(
                    error = %cleanup,
                    "[pgshim::connect_to_shadow_db] failed to dispose admin adapter"
                );
            }
            return Err(err);
        }
        info!(%database, "[pgshim::connect_to_shadow_db] created shadow database");

        let config = self.config.clone().with_database(database.clone());
        let client = match self.connector.connect(&config).await {
            Ok(client) => client,
            Err(err) => {
                let shadow = ShadowDatabase {
                    admin,
                    database: database.clone(),
                };
                if let Err(cleanup) = shadow.drop_database().await {
                    warn!(
                        %database,
                        error = %cleanup,
                        "[pgshim::connect_to_shadow_db] failed to drop shadow database"
                    );
                }
                return Err(err);
            }
        };

        Ok(Box::new(PgAdapter::with_shadow(
            client,
            ShadowDatabase { admin, database },
        )))
    }
}
