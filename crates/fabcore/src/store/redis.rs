//! Redis-реализация хранилища сессий.
//!
//! Values are whole JSON records written with `SET ... EX`, one atomic
//! command per write, so concurrent transitions for the same pair can only
//! race as last-writer-wins, never as a partial merge. Connectivity
//! failures map to `StoreUnavailable`; a Nil reply is an absent key, never
//! an error.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;

use crate::config;
use crate::error::{AppError, AppResult};
use crate::session::AuthSession;
use crate::state::{BlockAudit, ConversationState};

use super::{block_key, rate_key, session_key, state_key, SessionStore};

/// Хранилище поверх внешнего Redis — источник истины между рестартами
#[derive(Clone)]
pub struct RedisSessionStore {
    conn: MultiplexedConnection,
}

impl RedisSessionStore {
    /// Подключается и проверяет соединение одним PING
    pub async fn connect(url: &str) -> AppResult<Self> {
        let client = redis::Client::open(url)?;
        let mut conn = client.get_multiplexed_tokio_connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        log::info!("Connected to session store at {}", url);
        Ok(Self { conn })
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn get_state(&self, bot_id: i64, user_id: i64) -> AppResult<Option<ConversationState>> {
        let mut conn = self.conn.clone();
        let payload: Option<String> = conn.get(state_key(bot_id, user_id)).await?;
        match payload {
            Some(p) => Ok(Some(serde_json::from_str(&p)?)),
            None => Ok(None),
        }
    }

    async fn put_state(&self, state: &ConversationState) -> AppResult<()> {
        let payload = serde_json::to_string(state)?;
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(
                state_key(state.bot_id, state.user_id),
                payload,
                config::session::STATE_TTL_SECS,
            )
            .await?;
        Ok(())
    }

    async fn delete_state(&self, bot_id: i64, user_id: i64) -> AppResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(state_key(bot_id, user_id)).await?;
        Ok(())
    }

    async fn get_auth_session(&self, user_id: i64, session_id: &str) -> AppResult<AuthSession> {
        let mut conn = self.conn.clone();
        let payload: Option<String> = conn.get(session_key(user_id, session_id)).await?;
        let session: AuthSession = match payload {
            Some(p) => serde_json::from_str(&p)?,
            // TTL уже снес запись — для вызывающего это истекшая сессия
            None => return Err(AppError::SessionExpired),
        };
        if session.is_expired(Utc::now()) {
            return Err(AppError::SessionExpired);
        }
        Ok(session)
    }

    async fn put_auth_session(&self, user_id: i64, session: &AuthSession) -> AppResult<()> {
        let ttl = session
            .remaining_ttl(Utc::now())
            .ok_or(AppError::SessionExpired)?;
        let payload = serde_json::to_string(session)?;
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(session_key(user_id, &session.id), payload, ttl.as_secs().max(1))
            .await?;
        Ok(())
    }

    async fn record_block(&self, audit: &BlockAudit) -> AppResult<()> {
        let payload = serde_json::to_string(audit)?;
        let mut conn = self.conn.clone();
        let _: () = conn.set(block_key(audit), payload).await?;
        Ok(())
    }

    async fn check_rate_limit(&self, user_id: i64, limit: u32, window: Duration) -> AppResult<bool> {
        let key = rate_key(user_id);
        let mut conn = self.conn.clone();
        let count: i64 = conn.incr(&key, 1).await?;
        if count == 1 {
            let _: i64 = conn.expire(&key, window.as_secs() as i64).await?;
        }
        Ok(count > i64::from(limit))
    }
}
