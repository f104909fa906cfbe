// [libs/core/state-store/src/redis_store.rs]
use crate::trait_def::{SetOptions, StateStore};
use async_trait::async_trait;
use gateway_error::{ErrorKind, GatewayError};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::HashMap;

/// `StateStore` backed by Redis, using a `ConnectionManager` so
/// transient connection loss reconnects transparently instead of
/// failing every call until a caller rebuilds the client.
#[derive(Clone)]
pub struct RedisStateStore {
    conn: ConnectionManager,
}

impl RedisStateStore {
    pub async fn connect(url: &str) -> Result<Self, GatewayError> {
        let client = redis::Client::open(url).map_err(to_gateway_error)?;
        let conn = client.get_connection_manager().await.map_err(to_gateway_error)?;
        Ok(Self { conn })
    }
}

fn to_gateway_error(err: redis::RedisError) -> GatewayError {
    GatewayError::new(ErrorKind::RpcUnreachable, format!("state store unreachable: {err}"))
}

#[async_trait]
impl StateStore for RedisStateStore {
    async fn get(&self, key: &str) -> Result<Option<String>, GatewayError> {
        let mut conn = self.conn.clone();
        conn.get(key).await.map_err(to_gateway_error)
    }

    async fn set(&self, key: &str, value: &str, opts: SetOptions) -> Result<bool, GatewayError> {
        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if opts.only_if_absent {
            cmd.arg("NX");
        }
        if let Some(ttl) = opts.ttl {
            cmd.arg("EX").arg(ttl.as_secs().max(1));
        }
        let reply: Option<String> = cmd.query_async(&mut conn).await.map_err(to_gateway_error)?;
        Ok(reply.is_some())
    }

    async fn del(&self, key: &str) -> Result<bool, GatewayError> {
        let mut conn = self.conn.clone();
        let removed: i64 = conn.del(key).await.map_err(to_gateway_error)?;
        Ok(removed > 0)
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64, GatewayError> {
        let mut conn = self.conn.clone();
        conn.incr(key, delta).await.map_err(to_gateway_error)
    }

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>, GatewayError> {
        let mut conn = self.conn.clone();
        conn.hgetall(key).await.map_err(to_gateway_error)
    }

    async fn sorted_set_add(&self, key: &str, member: &str, score: f64) -> Result<(), GatewayError> {
        let mut conn = self.conn.clone();
        let _: i64 = conn.zadd(key, member, score).await.map_err(to_gateway_error)?;
        Ok(())
    }

    async fn sorted_set_card(&self, key: &str, min: f64, max: f64) -> Result<u64, GatewayError> {
        let mut conn = self.conn.clone();
        let count: u64 = conn.zcount(key, min, max).await.map_err(to_gateway_error)?;
        Ok(count)
    }

    async fn sorted_set_remove_by_score(&self, key: &str, min: f64, max: f64) -> Result<u64, GatewayError> {
        let mut conn = self.conn.clone();
        let removed: u64 = conn.zrembyscore(key, min, max).await.map_err(to_gateway_error)?;
        Ok(removed)
    }

    async fn eval(&self, script: &'static str, keys: &[String], args: &[String]) -> Result<Vec<String>, GatewayError> {
        let mut conn = self.conn.clone();
        let mut invocation = redis::Script::new(script).prepare_invoke();
        for key in keys {
            invocation.key(key);
        }
        for arg in args {
            invocation.arg(arg);
        }
        invocation.invoke_async(&mut conn).await.map_err(to_gateway_error)
    }
}
