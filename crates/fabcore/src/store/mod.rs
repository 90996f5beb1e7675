//! Durable keyed session storage.
//!
//! The store is the single source of truth for conversation state and auth
//! sessions; in-process maps are at most a cache and never survive a
//! restart. Two implementations share one contract:
//!
//! - [`redis::RedisSessionStore`]: production, external Redis;
//! - [`memory::MemorySessionStore`]: tests and degraded single-process
//!   runs, a lock-protected map with the same TTL semantics.
//!
//! Which one runs is a configuration decision made at startup, never a
//! global variable.

pub mod memory;
pub mod redis;

use async_trait::async_trait;
use std::time::Duration;

use crate::error::AppResult;
use crate::session::AuthSession;
use crate::state::{BlockAudit, BlockScope, ConversationState};

/// Контракт хранилища сессий.
///
/// Every write covers the whole record in a single operation: concurrent
/// writers for the same key race as last-writer-wins, but a reader never
/// observes a half-written record. A connectivity failure surfaces as
/// `StoreUnavailable` and must not be conflated with an absent key.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Состояние диалога пары (бот, пользователь), `None` если его еще нет
    async fn get_state(&self, bot_id: i64, user_id: i64) -> AppResult<Option<ConversationState>>;

    /// Перезаписывает состояние целиком и обновляет TTL до 7 дней
    async fn put_state(&self, state: &ConversationState) -> AppResult<()>;

    async fn delete_state(&self, bot_id: i64, user_id: i64) -> AppResult<()>;

    /// Сессия авторизации; отсутствие и истечение — одинаково `SessionExpired`
    async fn get_auth_session(&self, user_id: i64, session_id: &str) -> AppResult<AuthSession>;

    /// Записывает сессию с TTL = `expires_at - now`; уже истекшая сессия
    /// отклоняется, а не записывается
    async fn put_auth_session(&self, user_id: i64, session: &AuthSession) -> AppResult<()>;

    /// Журнальная запись о блокировке (пишется и при повторной блокировке)
    async fn record_block(&self, audit: &BlockAudit) -> AppResult<()>;

    /// Фиксированное окно: `true`, если лимит событий превышен
    async fn check_rate_limit(&self, user_id: i64, limit: u32, window: Duration) -> AppResult<bool>;
}

pub(crate) fn state_key(bot_id: i64, user_id: i64) -> String {
    format!("bot:{bot_id}:user:{user_id}:state")
}

pub(crate) fn session_key(user_id: i64, session_id: &str) -> String {
    format!("user:{user_id}:session:{session_id}")
}

pub(crate) fn block_key(audit: &BlockAudit) -> String {
    match audit.scope {
        BlockScope::Bot => format!("blocked:bot:{}", audit.bot_id),
        BlockScope::User => format!(
            "blocked:user:{}:{}",
            audit.bot_id,
            audit.user_id.unwrap_or_default()
        ),
    }
}

pub(crate) fn rate_key(user_id: i64) -> String {
    format!("rate:{user_id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_key_schemes() {
        assert_eq!(state_key(7, 42), "bot:7:user:42:state");
        assert_eq!(session_key(42, "abc"), "user:42:session:abc");
        assert_eq!(rate_key(42), "rate:42");

        let audit = BlockAudit {
            scope: BlockScope::User,
            bot_id: 7,
            user_id: Some(42),
            reason: "spam".to_string(),
            blocked_at: Utc::now(),
        };
        assert_eq!(block_key(&audit), "blocked:user:7:42");
    }
}
