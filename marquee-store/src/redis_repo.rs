use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tracing::{debug, warn};

use marquee_core::repository::HoldRepository;
use marquee_core::{CoreError, CoreResult};
use marquee_shared::{HoldToken, ReservationHold};

const EXPIRY_INDEX: &str = "holds:expiry";

fn hold_key(token: HoldToken) -> String {
    format!("hold:{}", token)
}

pub(crate) fn map_redis_error(err: redis::RedisError) -> CoreError {
    if err.is_io_error() || err.is_timeout() || err.is_connection_dropped() {
        CoreError::Unavailable(format!("redis: {}", err))
    } else {
        CoreError::InternalError(format!("redis: {}", err))
    }
}

/// Hold records live in Redis: one JSON value per token plus a sorted set
/// scored by expiry (epoch millis) so the sweeper can range-scan.
#[derive(Clone)]
pub struct RedisClient {
    client: redis::Client,
}

impl RedisClient {
    pub fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client })
    }

    async fn connection(&self) -> CoreResult<MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(map_redis_error)
    }

    pub async fn ping(&self) -> CoreResult<()> {
        let mut conn = self.connection().await?;
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(map_redis_error)?;
        Ok(())
    }
}

#[async_trait]
impl HoldRepository for RedisClient {
    async fn insert_hold(&self, hold: &ReservationHold) -> CoreResult<()> {
        let mut conn = self.connection().await?;
        let payload = serde_json::to_string(hold)
            .map_err(|e| CoreError::InternalError(format!("encode hold: {}", e)))?;

        redis::pipe()
            .atomic()
            .set(hold_key(hold.token), payload)
            .ignore()
            .zadd(EXPIRY_INDEX, hold.token.to_string(), hold.expires_at.timestamp_millis())
            .ignore()
            .query_async::<()>(&mut conn)
            .await
            .map_err(map_redis_error)?;

        debug!("Hold stored: {} ({} seats)", hold.token, hold.seat_ids.len());
        Ok(())
    }

    async fn get_hold(&self, token: HoldToken) -> CoreResult<Option<ReservationHold>> {
        let mut conn = self.connection().await?;
        let raw: Option<String> = conn.get(hold_key(token)).await.map_err(map_redis_error)?;

        raw.map(|json| {
            serde_json::from_str(&json)
                .map_err(|e| CoreError::InternalError(format!("decode hold {}: {}", token, e)))
        })
        .transpose()
    }

    async fn remove_hold(&self, token: HoldToken) -> CoreResult<()> {
        let mut conn = self.connection().await?;

        redis::pipe()
            .atomic()
            .del(hold_key(token))
            .ignore()
            .zrem(EXPIRY_INDEX, token.to_string())
            .ignore()
            .query_async::<()>(&mut conn)
            .await
            .map_err(map_redis_error)
    }

    async fn list_expired(&self, now: DateTime<Utc>) -> CoreResult<Vec<ReservationHold>> {
        let mut conn = self.connection().await?;

        let tokens: Vec<String> = redis::cmd("ZRANGEBYSCORE")
            .arg(EXPIRY_INDEX)
            .arg("-inf")
            .arg(now.timestamp_millis())
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)?;

        let mut expired = Vec::with_capacity(tokens.len());
        for raw in tokens {
            let token = match raw.parse() {
                Ok(id) => HoldToken(id),
                Err(_) => {
                    warn!("Dropping malformed hold index entry: {}", raw);
                    let _: i64 = conn.zrem(EXPIRY_INDEX, &raw).await.map_err(map_redis_error)?;
                    continue;
                }
            };

            let raw_hold: Option<String> =
                conn.get(hold_key(token)).await.map_err(map_redis_error)?;
            match raw_hold {
                Some(json) => match serde_json::from_str::<ReservationHold>(&json) {
                    Ok(hold) => expired.push(hold),
                    Err(e) => warn!("Skipping undecodable hold {}: {}", token, e),
                },
                None => {
                    // Record already gone, index entry is stale
                    let _: i64 = conn.zrem(EXPIRY_INDEX, &raw).await.map_err(map_redis_error)?;
                }
            }
        }

        Ok(expired)
    }
}
