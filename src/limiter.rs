//! Rate limiting, delegated to Redis.
//!
//! The limiter keeps no local state: each decision is one round trip running
//! a sliding-window script against a per-identity sorted set. An unreachable
//! Redis propagates as an internal error, so creates are refused rather than
//! waved through while the counter is down.

use std::time::Duration;

use async_trait::async_trait;
use redis::{
    Script,
    aio::{ConnectionManager, ConnectionManagerConfig},
};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::AppResult;

#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Whether `identity` may perform another create right now.
    async fn allow(&self, identity: &str) -> AppResult<bool>;
}

// Entries older than the window are dropped, then the action is accepted
// only while the window still has room. Rejected actions are not recorded.
const SLIDING_WINDOW: &str = r#"
redis.call('ZREMRANGEBYSCORE', KEYS[1], 0, ARGV[1] - ARGV[2])
if redis.call('ZCARD', KEYS[1]) >= tonumber(ARGV[3]) then
    return 0
end
redis.call('ZADD', KEYS[1], ARGV[1], ARGV[4])
redis.call('PEXPIRE', KEYS[1], ARGV[2])
return 1
"#;

pub struct SlidingWindow {
    conn: ConnectionManager,
    limit: u32,
    window: Duration,
}

impl SlidingWindow {
    pub fn new(conn: ConnectionManager, limit: u32, window: Duration) -> Self {
        Self {
            conn,
            limit,
            window,
        }
    }
}

#[async_trait]
impl RateLimiter for SlidingWindow {
    async fn allow(&self, identity: &str) -> AppResult<bool> {
        let now_ms = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;

        let allowed: i64 = Script::new(SLIDING_WINDOW)
            .key(format!("ratelimit:{identity}"))
            .arg(now_ms as i64)
            .arg(self.window.as_millis() as u64)
            .arg(self.limit)
            .arg(Uuid::now_v7().to_string())
            .invoke_async(&mut self.conn.clone())
            .await?;

        Ok(allowed == 1)
    }
}

pub async fn init_redis(redis_url: &str) -> ConnectionManager {
    let config = ConnectionManagerConfig::new()
        .set_number_of_retries(1)
        .set_connection_timeout(Duration::from_millis(100));

    let client = redis::Client::open(redis_url).expect("Invalid REDIS_URL");
    client
        .get_connection_manager_with_config(config)
        .await
        .expect("Redis unreachable")
}
