use redis::aio::{ConnectionManager, PubSub};
use redis::AsyncCommands;

/// Redis handle used for cross-instance message fan-out.
///
/// Commands go through the multiplexed `ConnectionManager`; subscriptions
/// need a dedicated connection, so the `Client` is kept alongside it.
#[derive(Clone)]
pub struct RedisClient {
    client: redis::Client,
    conn: ConnectionManager,
}

impl RedisClient {
    pub async fn connect(url: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        tracing::info!("connected to Redis");
        Ok(Self { client, conn })
    }

    pub async fn publish(&self, channel: &str, payload: &str) -> Result<(), redis::RedisError> {
        let mut conn = self.conn.clone();
        conn.publish::<_, _, ()>(channel, payload).await
    }

    pub async fn subscribe(&self, channel: &str) -> Result<PubSub, redis::RedisError> {
        let mut pubsub = self.client.get_async_connection().await?.into_pubsub();
        pubsub.subscribe(channel).await?;
        tracing::info!(channel = %channel, "subscribed to Redis channel");
        Ok(pubsub)
    }

    pub async fn ping(&self) -> Result<(), redis::RedisError> {
        let mut conn = self.conn.clone();
        redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
        Ok(())
    }
}
