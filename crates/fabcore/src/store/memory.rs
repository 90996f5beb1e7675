//! In-memory реализация хранилища сессий.
//!
//! A lock-protected map with per-key deadlines, mirroring the Redis
//! contract closely enough that the router cannot tell them apart: same
//! serialized payloads, same TTL behavior, same `SessionExpired` fail-closed
//! reads. Deadlines use `tokio::time::Instant`, so tests can drive expiry
//! with a paused clock.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::config;
use crate::error::{AppError, AppResult};
use crate::session::AuthSession;
use crate::state::{BlockAudit, ConversationState};

use super::{block_key, rate_key, session_key, state_key, SessionStore};

#[derive(Debug)]
struct Entry {
    payload: String,
    /// `None` — запись без срока (журнал блокировок)
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        matches!(self.expires_at, Some(deadline) if now >= deadline)
    }
}

#[derive(Debug)]
struct Counter {
    count: u32,
    window_ends: Instant,
}

/// Хранилище в памяти процесса. Не переживает рестарт — источником истины
/// в продакшене остается внешний Redis.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    entries: RwLock<HashMap<String, Entry>>,
    counters: RwLock<HashMap<String, Counter>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn get_live(&self, key: &str) -> Option<String> {
        let entries = self.entries.read().await;
        let entry = entries.get(key)?;
        if entry.is_expired(Instant::now()) {
            return None;
        }
        Some(entry.payload.clone())
    }

    async fn put(&self, key: String, payload: String, ttl: Option<Duration>) {
        let mut entries = self.entries.write().await;
        entries.insert(
            key,
            Entry {
                payload,
                expires_at: ttl.map(|t| Instant::now() + t),
            },
        );
    }

    /// Убирает истекшие записи; возвращает количество удаленных
    pub async fn cleanup(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, e| !e.is_expired(now));
        let removed = before - entries.len();
        if removed > 0 {
            log::debug!("Cleaned up {} expired session entries", removed);
        }
        removed
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get_state(&self, bot_id: i64, user_id: i64) -> AppResult<Option<ConversationState>> {
        match self.get_live(&state_key(bot_id, user_id)).await {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    async fn put_state(&self, state: &ConversationState) -> AppResult<()> {
        let payload = serde_json::to_string(state)?;
        self.put(
            state_key(state.bot_id, state.user_id),
            payload,
            Some(config::session::state_ttl()),
        )
        .await;
        Ok(())
    }

    async fn delete_state(&self, bot_id: i64, user_id: i64) -> AppResult<()> {
        let mut entries = self.entries.write().await;
        entries.remove(&state_key(bot_id, user_id));
        Ok(())
    }

    async fn get_auth_session(&self, user_id: i64, session_id: &str) -> AppResult<AuthSession> {
        let payload = self
            .get_live(&session_key(user_id, session_id))
            .await
            .ok_or(AppError::SessionExpired)?;
        let session: AuthSession = serde_json::from_str(&payload)?;
        // Второй рубеж: TTL записи мог пережить wall-clock срок
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
        self.put(session_key(user_id, &session.id), payload, Some(ttl)).await;
        Ok(())
    }

    async fn record_block(&self, audit: &BlockAudit) -> AppResult<()> {
        let payload = serde_json::to_string(audit)?;
        self.put(block_key(audit), payload, None).await;
        Ok(())
    }

    async fn check_rate_limit(&self, user_id: i64, limit: u32, window: Duration) -> AppResult<bool> {
        let now = Instant::now();
        let mut counters = self.counters.write().await;
        let counter = counters
            .entry(rate_key(user_id))
            .and_modify(|c| {
                if now >= c.window_ends {
                    c.count = 0;
                    c.window_ends = now + window;
                }
            })
            .or_insert(Counter {
                count: 0,
                window_ends: now + window,
            });
        counter.count += 1;
        Ok(counter.count > limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{BlockScope, FlowData, Step};
    use pretty_assertions::assert_eq;
    use secrecy::SecretString;

    #[tokio::test]
    async fn test_get_absent_state_is_none_not_error() {
        let store = MemorySessionStore::new();
        assert!(store.get_state(1, 2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_get_round_trip() {
        let store = MemorySessionStore::new();
        let mut state = ConversationState::new(1, 2);
        state.current_step = Step::AwaitingBotToken;
        state.flow = FlowData::BotDraft {
            bot_token: None,
            template_id: Some(3),
            ref_code: None,
        };
        store.put_state(&state).await.unwrap();
        assert_eq!(store.get_state(1, 2).await.unwrap(), Some(state));
    }

    #[tokio::test]
    async fn test_states_do_not_cross_talk_between_pairs() {
        let store = MemorySessionStore::new();
        let mut a = ConversationState::new(1, 2);
        a.current_step = Step::WaitingPhone;
        let b = ConversationState::new(1, 3);
        store.put_state(&a).await.unwrap();
        store.put_state(&b).await.unwrap();

        assert_eq!(store.get_state(1, 2).await.unwrap().unwrap().current_step, Step::WaitingPhone);
        assert_eq!(store.get_state(1, 3).await.unwrap().unwrap().current_step, Step::Start);
        assert!(store.get_state(2, 2).await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_state_ttl_window() {
        let store = MemorySessionStore::new();
        let state = ConversationState::new(1, 2);
        store.put_state(&state).await.unwrap();

        // живо через 6 дней
        tokio::time::advance(Duration::from_secs(6 * 24 * 60 * 60)).await;
        assert!(store.get_state(1, 2).await.unwrap().is_some());

        // и отсутствует через 8
        tokio::time::advance(Duration::from_secs(2 * 24 * 60 * 60)).await;
        assert!(store.get_state(1, 2).await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_put_refreshes_ttl() {
        let store = MemorySessionStore::new();
        let state = ConversationState::new(1, 2);
        store.put_state(&state).await.unwrap();

        tokio::time::advance(Duration::from_secs(6 * 24 * 60 * 60)).await;
        store.put_state(&state).await.unwrap();

        // 6 + 6 дней от первой записи, но только 6 от последней
        tokio::time::advance(Duration::from_secs(6 * 24 * 60 * 60)).await;
        assert!(store.get_state(1, 2).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_state() {
        let store = MemorySessionStore::new();
        store.put_state(&ConversationState::new(1, 2)).await.unwrap();
        store.delete_state(1, 2).await.unwrap();
        assert!(store.get_state(1, 2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_auth_session_round_trip_and_fail_closed() {
        let store = MemorySessionStore::new();
        let session =
            AuthSession::new(SecretString::from("blob"), Duration::from_secs(3600)).unwrap();
        store.put_auth_session(9, &session).await.unwrap();

        let loaded = store.get_auth_session(9, &session.id).await.unwrap();
        assert_eq!(loaded.id, session.id);

        // неизвестный id — не NotFound, а SessionExpired (fail closed)
        let err = store.get_auth_session(9, "missing").await.unwrap_err();
        assert!(matches!(err, AppError::SessionExpired));
    }

    #[tokio::test]
    async fn test_expired_session_is_rejected_on_put() {
        let store = MemorySessionStore::new();
        let mut session =
            AuthSession::new(SecretString::from("blob"), Duration::from_secs(3600)).unwrap();
        session.expires_at = session.created_at; // истекла мгновенно
        let err = store.put_auth_session(9, &session).await.unwrap_err();
        assert!(matches!(err, AppError::SessionExpired));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_removes_expired_entries() {
        let store = MemorySessionStore::new();
        store.put_state(&ConversationState::new(1, 2)).await.unwrap();
        store.put_state(&ConversationState::new(1, 3)).await.unwrap();

        tokio::time::advance(Duration::from_secs(8 * 24 * 60 * 60)).await;
        assert_eq!(store.cleanup().await, 2);
    }

    #[tokio::test]
    async fn test_block_audit_is_recorded() {
        let store = MemorySessionStore::new();
        let audit = BlockAudit {
            scope: BlockScope::Bot,
            bot_id: 5,
            user_id: None,
            reason: "жалобы".to_string(),
            blocked_at: Utc::now(),
        };
        store.record_block(&audit).await.unwrap();
        // повторная блокировка перезаписывает журнал без ошибки
        store.record_block(&audit).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_fixed_window() {
        let store = MemorySessionStore::new();
        let window = Duration::from_secs(60);

        for _ in 0..3 {
            assert!(!store.check_rate_limit(1, 3, window).await.unwrap());
        }
        assert!(store.check_rate_limit(1, 3, window).await.unwrap());

        // новое окно — счетчик обнуляется
        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(!store.check_rate_limit(1, 3, window).await.unwrap());
    }
}
