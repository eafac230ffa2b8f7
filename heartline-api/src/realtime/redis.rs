use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_lite::StreamExt;
use serde::{Deserialize, Serialize};
use socketioxide::SocketIo;

use heartline_shared::clients::RedisClient;

use crate::models::Message;
use crate::realtime::{emit_to_room, FanoutHealth, MessageFanout};

#[derive(Debug, Serialize, Deserialize)]
pub struct FanoutEnvelope {
    pub room_id: String,
    pub message: Message,
}

/// Publishes through a Redis channel; every instance runs a relay that
/// re-emits to its local sockets.
pub struct RedisFanout {
    redis: RedisClient,
    channel: String,
    relay: RelayStatus,
}

impl RedisFanout {
    pub fn new(redis: RedisClient, channel: impl Into<String>, relay: RelayStatus) -> Self {
        Self {
            redis,
            channel: channel.into(),
            relay,
        }
    }
}

#[async_trait]
impl MessageFanout for RedisFanout {
    async fn publish(&self, room_id: &str, message: &Message) -> anyhow::Result<()> {
        let envelope = FanoutEnvelope {
            room_id: room_id.to_string(),
            message: message.clone(),
        };
        let payload = serde_json::to_string(&envelope)?;
        self.redis.publish(&self.channel, &payload).await?;
        Ok(())
    }
}

#[async_trait]
impl FanoutHealth for RedisFanout {
    async fn check(&self) -> Result<(), String> {
        self.redis.ping().await.map_err(|e| e.to_string())?;
        self.relay.check()
    }
}

/// Whether this instance's relay currently holds a subscription.
#[derive(Clone, Default)]
pub struct RelayStatus(Arc<AtomicBool>);

impl RelayStatus {
    fn set(&self, subscribed: bool) {
        self.0.store(subscribed, Ordering::Relaxed);
    }

    pub fn is_subscribed(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn check(&self) -> Result<(), String> {
        if self.is_subscribed() {
            Ok(())
        } else {
            Err("message relay is not subscribed".into())
        }
    }
}

/// Delay between resubscription attempts.
#[derive(Debug, Clone)]
pub struct RelayBackoff {
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RelayBackoff {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RelayBackoff {
    /// Delay before retry `n` (0-indexed), doubling up to the cap.
    fn delay_for(&self, attempt: u32) -> Duration {
        let delay = self.base_delay * 2u32.saturating_pow(attempt);
        delay.min(self.max_delay)
    }
}

/// Subscribe to the fan-out channel and forward each envelope to local
/// rooms. Runs for the life of the process, resubscribing after failures.
pub fn spawn_relay(
    redis: RedisClient,
    channel: String,
    io: SocketIo,
    status: RelayStatus,
    backoff: RelayBackoff,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut attempt = 0u32;
        loop {
            let result = relay(&redis, &channel, &io, &status, &mut attempt).await;
            status.set(false);
            if let Err(e) = result {
                tracing::error!(error = %e, channel = %channel, "message relay interrupted");
            }

            let delay = backoff.delay_for(attempt);
            attempt = attempt.saturating_add(1);
            metrics::counter!("relay_restarts_total").increment(1);
            tracing::info!(
                channel = %channel,
                delay_ms = delay.as_millis() as u64,
                "resubscribing message relay"
            );
            tokio::time::sleep(delay).await;
        }
    })
}

async fn relay(
    redis: &RedisClient,
    channel: &str,
    io: &SocketIo,
    status: &RelayStatus,
    attempt: &mut u32,
) -> anyhow::Result<()> {
    let mut pubsub = redis.subscribe(channel).await?;
    status.set(true);
    *attempt = 0;
    let stream = pubsub.on_message();
    futures_lite::pin!(stream);

    while let Some(msg) = stream.next().await {
        let payload: String = match msg.get_payload() {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(error = %e, "unreadable fan-out payload");
                continue;
            }
        };
        match serde_json::from_str::<FanoutEnvelope>(&payload) {
            Ok(envelope) => {
                if let Err(e) = emit_to_room(io, &envelope.room_id, &envelope.message) {
                    tracing::warn!(error = %e, room_id = %envelope.room_id, "relay emit failed");
                }
            }
            Err(e) => tracing::warn!(error = %e, "malformed fan-out envelope"),
        }
    }

    anyhow::bail!("subscription stream ended")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn envelope_carries_room_and_message() {
        let message = Message {
            id: Uuid::now_v7(),
            seq: 7,
            room_id: "a_b".into(),
            sender_id: Uuid::now_v7(),
            recipient_id: Uuid::now_v7(),
            content: "hello".into(),
            created_at: Utc::now(),
        };
        let json = serde_json::to_string(&FanoutEnvelope { room_id: "a_b".into(), message: message.clone() }).unwrap();
        let back: FanoutEnvelope = serde_json::from_str(&json).unwrap();
        assert_eq!(back.room_id, "a_b");
        assert_eq!(back.message, message);
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let backoff = RelayBackoff::default();
        assert_eq!(backoff.delay_for(0), Duration::from_millis(500));
        assert_eq!(backoff.delay_for(1), Duration::from_secs(1));
        assert_eq!(backoff.delay_for(3), Duration::from_secs(4));
        assert_eq!(backoff.delay_for(20), Duration::from_secs(30));
        assert_eq!(backoff.delay_for(u32::MAX), Duration::from_secs(30));
    }

    #[test]
    fn relay_status_reports_subscription() {
        let status = RelayStatus::default();
        assert!(status.check().is_err());

        let shared = status.clone();
        shared.set(true);
        assert!(status.is_subscribed());
        assert!(status.check().is_ok());

        shared.set(false);
        assert_eq!(status.check().unwrap_err(), "message relay is not subscribed");
    }
}
