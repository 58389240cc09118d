//! Hub communication
//!
//! The hub is the server that owns light documents, hands out minion
//! identities and acts as the time authority. Only the request/response side
//! lives here; light change events arrive through [`crate::feed`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use lightminion_core::{MinionConfig, Timestamp};

use crate::{error::ControlError, Result};

/// Identity registration with the hub
#[async_trait]
pub trait Hub: Send + Sync {
    /// Ask the hub for a new identity for a minion of `kind`
    async fn register_minion(&self, kind: &str) -> Result<String>;

    /// Announce that the minion with `id` is online
    async fn connect_minion(&self, id: &str) -> Result<()>;
}

/// A clock that other minions agree on
#[async_trait]
pub trait TimeAuthority: Send + Sync {
    /// Current authority time in seconds since the Unix epoch
    async fn server_time(&self) -> Result<Timestamp>;
}

#[derive(Serialize)]
struct RegisterRequest<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
}

#[derive(Deserialize)]
struct RegisterResponse {
    id: String,
}

#[derive(Deserialize)]
struct TimeResponse {
    /// Milliseconds since the Unix epoch
    now: f64,
}

/// Hub reached over HTTP
///
/// Endpoints, relative to the base URL:
/// - `POST /minions` with `{"type": kind}` answers `{"id": ...}`
/// - `POST /minions/{id}/connect`
/// - `GET /time` answers `{"now": <ms since epoch>}`
pub struct HttpHub {
    client: reqwest::Client,
    base_url: String,
}

impl HttpHub {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl Hub for HttpHub {
    async fn register_minion(&self, kind: &str) -> Result<String> {
        let response: RegisterResponse = self
            .client
            .post(self.url("/minions"))
            .json(&RegisterRequest { kind })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response.id)
    }

    async fn connect_minion(&self, id: &str) -> Result<()> {
        self.client
            .post(self.url(&format!("/minions/{}/connect", id)))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[async_trait]
impl TimeAuthority for HttpHub {
    async fn server_time(&self) -> Result<Timestamp> {
        let response: TimeResponse = self
            .client
            .get(self.url("/time"))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response.now * 0.001)
    }
}

/// Stand-in hub for running without a server: identities are random UUIDs.
#[derive(Debug, Default)]
pub struct LocalHub;

#[async_trait]
impl Hub for LocalHub {
    async fn register_minion(&self, _kind: &str) -> Result<String> {
        Ok(Uuid::new_v4().simple().to_string())
    }

    async fn connect_minion(&self, _id: &str) -> Result<()> {
        Ok(())
    }
}

/// Make sure the config carries an identity, registering if needed, then
/// connect with it.
pub async fn ensure_identity(config: &mut MinionConfig, hub: &dyn Hub) -> Result<String> {
    let id = match config.identity() {
        Some(id) => id.to_string(),
        None => {
            info!("No id in settings, registering as new.");
            let id = hub.register_minion(&config.kind).await?;
            if id.trim().is_empty() {
                return Err(ControlError::TransportError(
                    "hub assigned an empty id".to_string(),
                ));
            }
            config.set_identity(id.clone());
            id
        }
    };

    info!("Connecting with id {}", id);
    hub.connect_minion(&id).await?;
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[derive(Default)]
    struct FakeHub {
        calls: Mutex<Vec<String>>,
        assigned: String,
    }

    #[async_trait]
    impl Hub for FakeHub {
        async fn register_minion(&self, kind: &str) -> Result<String> {
            self.calls.lock().push(format!("register:{}", kind));
            Ok(self.assigned.clone())
        }

        async fn connect_minion(&self, id: &str) -> Result<()> {
            self.calls.lock().push(format!("connect:{}", id));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_registers_when_no_identity() {
        let hub = FakeHub {
            assigned: "new-id".to_string(),
            ..Default::default()
        };
        let mut config = MinionConfig::default();

        let id = ensure_identity(&mut config, &hub).await.unwrap();
        assert_eq!(id, "new-id");
        assert_eq!(config.identity(), Some("new-id"));
        assert_eq!(
            *hub.calls.lock(),
            vec!["register:lighting".to_string(), "connect:new-id".to_string()]
        );
    }

    #[tokio::test]
    async fn test_existing_identity_only_connects() {
        let hub = FakeHub::default();
        let mut config = MinionConfig::default();
        config.set_identity("kept");

        let id = ensure_identity(&mut config, &hub).await.unwrap();
        assert_eq!(id, "kept");
        assert_eq!(*hub.calls.lock(), vec!["connect:kept".to_string()]);
    }

    #[tokio::test]
    async fn test_empty_assignment_is_rejected() {
        let hub = FakeHub::default();
        let mut config = MinionConfig::default();
        assert!(ensure_identity(&mut config, &hub).await.is_err());
        assert!(config.identity().is_none());
    }

    #[tokio::test]
    async fn test_local_hub_assigns_uuid() {
        let mut config = MinionConfig::default();
        let id = ensure_identity(&mut config, &LocalHub).await.unwrap();
        assert_eq!(id.len(), 32);
        assert_eq!(config.identity(), Some(id.as_str()));
    }

    /// Serve one canned HTTP response and return the base URL
    async fn serve_once(status: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = stream.read(&mut buf).await;
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            let _ = stream.write_all(response.as_bytes()).await;
            let _ = stream.shutdown().await;
        });
        format!("http://{}/", addr)
    }

    #[tokio::test]
    async fn test_http_server_time() {
        let base = serve_once("200 OK", r#"{"now": 1700000000500}"#).await;
        let hub = HttpHub::new(&base, Duration::from_secs(2)).unwrap();
        assert!(!hub.base_url().ends_with('/'));

        let now = hub.server_time().await.unwrap();
        assert!((now - 1_700_000_000.5).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_http_error_status() {
        let base = serve_once("500 Internal Server Error", "{}").await;
        let hub = HttpHub::new(&base, Duration::from_secs(2)).unwrap();
        assert!(matches!(
            hub.server_time().await,
            Err(ControlError::HttpError(_))
        ));
    }
}
