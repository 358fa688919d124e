//! Broadcast-and-ring sequence
//!
//! Runs in the background after the webhook has already been answered:
//! send the broadcast, remember its id for `/stats`, then ring the
//! subscribers' phones. Failures are logged and dropped.

use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::roman::{RomanClient, RomanError};
use crate::store::BroadcastStore;
use crate::wire::WireMessage;

/// Step of the sequence that failed
#[derive(Debug, thiserror::Error)]
pub enum BroadcastError {
    #[error("broadcast was not sent: {0}")]
    Send(#[source] RomanError),

    #[error("broadcast {broadcast_id:?} sent but ringing failed: {source}")]
    Ring {
        broadcast_id: Option<String>,
        #[source]
        source: RomanError,
    },
}

/// One broadcast requested by an admin
#[derive(Debug, Clone)]
pub struct BroadcastJob {
    pub message: WireMessage,
    pub app_key: String,
    /// Admin who requested the broadcast
    pub user_id: String,
    /// Webhook message that triggered it, for log correlation
    pub message_id: String,
}

/// Sends broadcasts and records their ids
#[derive(Clone)]
pub struct Broadcaster {
    client: RomanClient,
    store: Arc<dyn BroadcastStore>,
}

impl Broadcaster {
    pub fn new(client: RomanClient, store: Arc<dyn BroadcastStore>) -> Self {
        Self { client, store }
    }

    /// Start the sequence on its own task; callers are not expected to await it
    pub fn spawn(&self, job: BroadcastJob) -> JoinHandle<()> {
        let broadcaster = self.clone();
        tokio::spawn(async move {
            if let Err(e) = broadcaster.run(&job).await {
                error!(
                    user_id = %job.user_id,
                    message_id = %job.message_id,
                    "Broadcast sequence for message {} failed: {}",
                    job.message_id,
                    e
                );
            }
        })
    }

    /// Broadcast, record the id, then ring. Ringing only happens after a successful broadcast.
    pub async fn run(&self, job: &BroadcastJob) -> Result<Option<String>, BroadcastError> {
        info!(
            user_id = %job.user_id,
            message_id = %job.message_id,
            "Executing {} broadcast",
            job.message.kind()
        );

        let receipt = self
            .client
            .broadcast(&job.message, &job.app_key)
            .await
            .map_err(BroadcastError::Send)?;

        match &receipt.broadcast_id {
            Some(broadcast_id) => {
                debug!(
                    user_id = %job.user_id,
                    message_id = %job.message_id,
                    broadcast_id = %broadcast_id,
                    "Broadcast sent, storing id for user"
                );
                self.store.record_broadcast(&job.user_id, broadcast_id.clone());
            }
            None => {
                warn!(
                    user_id = %job.user_id,
                    message_id = %job.message_id,
                    "Roman accepted the broadcast without returning its id, clearing stored id"
                );
                self.store.forget_broadcast(&job.user_id);
            }
        }

        self.client
            .broadcast(&WireMessage::call_start(), &job.app_key)
            .await
            .map_err(|source| BroadcastError::Ring {
                broadcast_id: receipt.broadcast_id.clone(),
                source,
            })?;

        debug!(
            user_id = %job.user_id,
            message_id = %job.message_id,
            broadcast_id = ?receipt.broadcast_id,
            "Call started for broadcast"
        );
        Ok(receipt.broadcast_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryBroadcastStore;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn setup(server: &MockServer) -> (Broadcaster, Arc<InMemoryBroadcastStore>) {
        let store = Arc::new(InMemoryBroadcastStore::new());
        let client = RomanClient::new(format!("{}/broadcast", server.uri()));
        (Broadcaster::new(client, store.clone()), store)
    }

    fn job(text: &str) -> BroadcastJob {
        BroadcastJob {
            message: WireMessage::text(text),
            app_key: "key-1".to_string(),
            user_id: "alice".to_string(),
            message_id: "m-1".to_string(),
        }
    }

    async fn mount_ring(server: &MockServer, status: u16, expected_calls: u64) {
        Mock::given(method("POST"))
            .and(path("/broadcast"))
            .and(body_json(serde_json::to_value(WireMessage::call_start()).unwrap()))
            .respond_with(ResponseTemplate::new(status).set_body_json(json!({})))
            .expect(expected_calls)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_broadcast_records_id_and_rings() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/broadcast"))
            .and(body_json(json!({"type": "text", "text": {"data": "Hello"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"broadcastId": "b-1"})))
            .expect(1)
            .mount(&server)
            .await;
        mount_ring(&server, 200, 1).await;

        let (broadcaster, store) = setup(&server);
        let broadcast_id = broadcaster.run(&job("Hello")).await.unwrap();

        assert_eq!(broadcast_id.as_deref(), Some("b-1"));
        assert_eq!(store.last_broadcast("alice").as_deref(), Some("b-1"));

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 2);
        let second: serde_json::Value = serde_json::from_slice(&requests[1].body).unwrap();
        assert_eq!(second["call"]["type"], "GROUPSTART");
    }

    #[tokio::test]
    async fn test_failed_broadcast_does_not_ring_or_record() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/broadcast"))
            .and(body_json(json!({"type": "text", "text": {"data": "Hello"}})))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;
        mount_ring(&server, 200, 0).await;

        let (broadcaster, store) = setup(&server);
        store.record_broadcast("alice", "b-old".to_string());

        let err = broadcaster.run(&job("Hello")).await.unwrap_err();
        assert!(matches!(err, BroadcastError::Send(_)));
        assert_eq!(store.last_broadcast("alice").as_deref(), Some("b-old"));
    }

    #[tokio::test]
    async fn test_failed_ring_keeps_recorded_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/broadcast"))
            .and(body_json(json!({"type": "text", "text": {"data": "Hello"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"broadcastId": "b-2"})))
            .mount(&server)
            .await;
        mount_ring(&server, 502, 1).await;

        let (broadcaster, store) = setup(&server);
        let err = broadcaster.run(&job("Hello")).await.unwrap_err();

        assert!(matches!(err, BroadcastError::Ring { broadcast_id: Some(ref id), .. } if id == "b-2"));
        assert_eq!(store.last_broadcast("alice").as_deref(), Some("b-2"));
    }

    #[tokio::test]
    async fn test_missing_broadcast_id_clears_stored_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/broadcast"))
            .and(body_json(json!({"type": "text", "text": {"data": "Hello"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;
        mount_ring(&server, 200, 1).await;

        let (broadcaster, store) = setup(&server);
        store.record_broadcast("alice", "b-old".to_string());

        let broadcast_id = broadcaster.run(&job("Hello")).await.unwrap();

        assert_eq!(broadcast_id, None);
        assert_eq!(store.last_broadcast("alice"), None);
    }

    #[tokio::test]
    async fn test_spawned_sequence_swallows_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/broadcast"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let (broadcaster, store) = setup(&server);
        broadcaster.spawn(job("Hello")).await.unwrap();

        assert_eq!(store.last_broadcast("alice"), None);
    }
}
