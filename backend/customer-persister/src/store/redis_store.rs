use super::sentinel::{resolve_master, NodeTemplate, SentinelConfig, SentinelSupervisor};
use super::RecordStore;
use crate::error::Result;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, ConnectionInfo, IntoConnectionInfo};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Redis-backed record store
///
/// Values are written with a plain `SET` (no expiry, no condition). When a
/// sentinel configuration is given the master is resolved at startup and a
/// supervisor follows fail-overs for the lifetime of the store.
pub struct RedisRecordStore {
    manager: Arc<Mutex<ConnectionManager>>,
    _sentinel: Option<SentinelSupervisor>,
}

impl RedisRecordStore {
    pub async fn connect(redis_url: &str, sentinel: Option<SentinelConfig>) -> Result<Self> {
        let info: ConnectionInfo = redis_url.into_connection_info()?;

        match sentinel {
            Some(sentinel_config) => {
                let template = NodeTemplate {
                    addr: info.addr.clone(),
                    redis: info.redis.clone(),
                };

                let (client, master) = resolve_master(&sentinel_config, &template).await?;
                info!(master = %master, "Redis Sentinel master resolved");

                let manager = Arc::new(Mutex::new(ConnectionManager::new(client).await?));
                let supervisor =
                    SentinelSupervisor::spawn(manager.clone(), sentinel_config, template, master);

                Ok(Self {
                    manager,
                    _sentinel: Some(supervisor),
                })
            }
            None => {
                let client = Client::open(info)?;
                let manager = ConnectionManager::new(client).await?;
                info!("Connected to Redis record store");

                Ok(Self {
                    manager: Arc::new(Mutex::new(manager)),
                    _sentinel: None,
                })
            }
        }
    }

    async fn connection(&self) -> ConnectionManager {
        self.manager.lock().await.clone()
    }
}

#[async_trait]
impl RecordStore for RedisRecordStore {
    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = self.connection().await;
        let _: () = conn.set(key, value).await?;

        debug!(key = %key, bytes = value.len(), "Record stored");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.connection().await;
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }
}
