//! Redis Sentinel master resolution and fail-over supervision

use crate::error::{PersisterError, Result};
use redis::aio::ConnectionManager;
use redis::{Client, ConnectionAddr, ConnectionInfo, RedisConnectionInfo};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Sentinel configuration
#[derive(Clone, Debug)]
pub struct SentinelConfig {
    pub endpoints: Vec<String>,
    pub master_name: String,
    pub poll_interval: Duration,
}

impl SentinelConfig {
    pub fn new(endpoints: Vec<String>, master_name: String, poll_interval: Duration) -> Self {
        Self {
            endpoints,
            master_name,
            poll_interval,
        }
    }
}

/// Connection settings of the data node, reused when the master moves
#[derive(Clone)]
pub(crate) struct NodeTemplate {
    pub(crate) addr: ConnectionAddr,
    pub(crate) redis: RedisConnectionInfo,
}

impl NodeTemplate {
    /// Same credentials and TLS mode as the template, pointed at `host:port`
    fn at(&self, host: String, port: u16) -> ConnectionInfo {
        let addr = match &self.addr {
            ConnectionAddr::TcpTls {
                insecure,
                tls_params,
                ..
            } => ConnectionAddr::TcpTls {
                host,
                port,
                insecure: *insecure,
                tls_params: tls_params.clone(),
            },
            _ => ConnectionAddr::Tcp(host, port),
        };

        ConnectionInfo {
            addr,
            redis: self.redis.clone(),
        }
    }
}

/// Ask each sentinel in turn for the current master address
pub(crate) async fn resolve_master(
    config: &SentinelConfig,
    template: &NodeTemplate,
) -> Result<(Client, String)> {
    let mut last_err: Option<PersisterError> = None;

    for endpoint in &config.endpoints {
        match query_sentinel(endpoint, &config.master_name).await {
            Ok(Some((host, port))) => {
                let label = format!("{}:{}", host, port);
                match Client::open(template.at(host, port)) {
                    Ok(client) => return Ok((client, label)),
                    Err(e) => last_err = Some(e.into()),
                }
            }
            Ok(None) => {
                debug!(sentinel = %endpoint, master = %config.master_name, "Sentinel does not know master");
            }
            Err(e) => {
                debug!(sentinel = %endpoint, error = %e, "Sentinel query failed");
                last_err = Some(e);
            }
        }
    }

    Err(last_err.unwrap_or_else(|| {
        PersisterError::StoreUnavailable(format!(
            "no sentinel could resolve master '{}'",
            config.master_name
        ))
    }))
}

async fn query_sentinel(endpoint: &str, master_name: &str) -> Result<Option<(String, u16)>> {
    let client = Client::open(endpoint)?;
    let mut conn = client.get_multiplexed_async_connection().await?;

    let response: Vec<String> = redis::cmd("SENTINEL")
        .arg("GET-MASTER-ADDR-BY-NAME")
        .arg(master_name)
        .query_async(&mut conn)
        .await?;

    match response.as_slice() {
        [host, port, ..] => Ok(port.parse::<u16>().ok().map(|port| (host.clone(), port))),
        _ => Ok(None),
    }
}

/// Background task that swaps the shared connection when the master moves.
/// Stops when dropped.
pub(crate) struct SentinelSupervisor {
    shutdown_tx: watch::Sender<()>,
    handle: JoinHandle<()>,
}

impl SentinelSupervisor {
    pub(crate) fn spawn(
        manager: Arc<Mutex<ConnectionManager>>,
        config: SentinelConfig,
        template: NodeTemplate,
        current_master: String,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(());
        let handle = tokio::spawn(supervise(
            manager,
            config,
            template,
            current_master,
            shutdown_rx,
        ));

        Self {
            shutdown_tx,
            handle,
        }
    }
}

impl Drop for SentinelSupervisor {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(());
        self.handle.abort();
    }
}

async fn supervise(
    manager: Arc<Mutex<ConnectionManager>>,
    config: SentinelConfig,
    template: NodeTemplate,
    mut current_master: String,
    mut shutdown: watch::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                info!("Redis Sentinel supervisor shutting down");
                break;
            }
            _ = tokio::time::sleep(config.poll_interval) => {
                let (client, master) = match resolve_master(&config, &template).await {
                    Ok(resolved) => resolved,
                    Err(e) => {
                        warn!(error = %e, "Redis Sentinel master lookup failed");
                        continue;
                    }
                };

                if master == current_master {
                    continue;
                }

                match ConnectionManager::new(client).await {
                    Ok(new_manager) => {
                        *manager.lock().await = new_manager;
                        info!(from = %current_master, to = %master, "Redis Sentinel switched master");
                        current_master = master;
                    }
                    Err(e) => {
                        error!(error = %e, master = %master, "Failed to connect to new Redis master");
                    }
                }
            }
        }
    }
}

/// Split comma separated sentinel endpoints, adding the `redis://` scheme
/// where missing
pub fn parse_sentinel_endpoints(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            if s.starts_with("redis://") || s.starts_with("rediss://") {
                s.to_string()
            } else {
                format!("redis://{}", s)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use redis::IntoConnectionInfo;

    #[test]
    fn test_parse_sentinel_endpoints() {
        let endpoints = parse_sentinel_endpoints("10.0.0.1:26379, redis://10.0.0.2:26379,,");
        assert_eq!(
            endpoints,
            vec![
                "redis://10.0.0.1:26379".to_string(),
                "redis://10.0.0.2:26379".to_string()
            ]
        );
    }

    #[test]
    fn test_parse_sentinel_endpoints_empty() {
        assert!(parse_sentinel_endpoints(" , ").is_empty());
    }

    #[test]
    fn test_template_keeps_credentials() {
        let info = "redis://:secret@127.0.0.1:6379/2"
            .into_connection_info()
            .unwrap();
        let template = NodeTemplate {
            addr: info.addr.clone(),
            redis: info.redis.clone(),
        };

        let moved = template.at("10.0.0.9".to_string(), 6380);
        match &moved.addr {
            ConnectionAddr::Tcp(host, port) => {
                assert_eq!(host, "10.0.0.9");
                assert_eq!(*port, 6380);
            }
            other => panic!("expected plain TCP address, got {:?}", other),
        }
        assert_eq!(moved.redis.db, 2);
        assert_eq!(moved.redis.password.as_deref(), Some("secret"));
    }

    fn local_template() -> NodeTemplate {
        let info = "redis://127.0.0.1:6379".into_connection_info().unwrap();
        NodeTemplate {
            addr: info.addr,
            redis: info.redis,
        }
    }

    #[tokio::test]
    async fn test_resolve_master_without_endpoints() {
        let config = SentinelConfig::new(Vec::new(), "mymaster".to_string(), Duration::from_secs(1));

        let err = resolve_master(&config, &local_template()).await.unwrap_err();
        match err {
            PersisterError::StoreUnavailable(message) => assert!(message.contains("mymaster")),
            other => panic!("expected StoreUnavailable, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_resolve_master_unreachable_sentinels() {
        // Nothing listens on port 1
        let config = SentinelConfig::new(
            parse_sentinel_endpoints("127.0.0.1:1,127.0.0.1:1"),
            "mymaster".to_string(),
            Duration::from_secs(1),
        );

        let err = resolve_master(&config, &local_template()).await.unwrap_err();
        assert!(matches!(err, PersisterError::Store(_)), "got {:?}", err);
    }
}
