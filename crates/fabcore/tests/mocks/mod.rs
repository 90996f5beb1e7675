//! Test doubles for the conversation core boundaries.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use secrecy::SecretString;
use tokio::sync::Mutex;

use fabcore::error::{AppError, AppResult};
use fabcore::session::AuthSession;
use fabcore::state::{BlockAudit, ConversationState};
use fabcore::{AuthClient, BotDirectory, MemorySessionStore, SessionStore};

/// Справочник ботов в памяти
pub struct FakeDirectory {
    bots: Mutex<HashMap<i64, bool>>,
}

impl FakeDirectory {
    pub fn new(bots: impl IntoIterator<Item = (i64, bool)>) -> Self {
        Self {
            bots: Mutex::new(bots.into_iter().collect()),
        }
    }
}

#[async_trait]
impl BotDirectory for FakeDirectory {
    async fn is_active(&self, bot_id: i64) -> AppResult<bool> {
        self.bots
            .lock()
            .await
            .get(&bot_id)
            .copied()
            .ok_or_else(|| AppError::NotFound(format!("bot {bot_id}")))
    }

    async fn mark_blocked(&self, bot_id: i64, _reason: &str) -> AppResult<()> {
        self.bots.lock().await.insert(bot_id, false);
        Ok(())
    }
}

/// Поведение мока авторизации на следующий вызов
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthBehavior {
    Succeed,
    Fail,
    /// Висит дольше любого таймаута роутера
    Hang,
}

/// Мок протокола авторизации: выдает предсказуемые hash/credential и
/// считает вызовы.
pub struct MockAuthClient {
    behavior: Mutex<AuthBehavior>,
    pub send_calls: AtomicU32,
    pub verify_calls: AtomicU32,
}

impl MockAuthClient {
    pub fn new() -> Self {
        Self {
            behavior: Mutex::new(AuthBehavior::Succeed),
            send_calls: AtomicU32::new(0),
            verify_calls: AtomicU32::new(0),
        }
    }

    pub async fn set_behavior(&self, behavior: AuthBehavior) {
        *self.behavior.lock().await = behavior;
    }
}

#[async_trait]
impl AuthClient for MockAuthClient {
    async fn send_code(&self, phone: &str) -> AppResult<String> {
        self.send_calls.fetch_add(1, Ordering::SeqCst);
        match *self.behavior.lock().await {
            AuthBehavior::Succeed => Ok(format!("hash-{phone}")),
            AuthBehavior::Fail => Err(AppError::ExternalProtocol("PHONE_NUMBER_BANNED".to_string())),
            AuthBehavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok("unreachable-hash".to_string())
            }
        }
    }

    async fn verify_code(
        &self,
        _phone: &str,
        code: &str,
        code_hash: &str,
    ) -> AppResult<SecretString> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        match *self.behavior.lock().await {
            AuthBehavior::Succeed => Ok(SecretString::from(format!("cred:{code_hash}:{code}"))),
            AuthBehavior::Fail => Err(AppError::ExternalProtocol("PHONE_CODE_INVALID".to_string())),
            AuthBehavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(SecretString::from("unreachable"))
            }
        }
    }
}

/// Хранилище с рубильником: пока `down`, каждое обращение — инфраструктурная
/// ошибка, как при потере соединения с Redis.
pub struct FlakyStore {
    inner: MemorySessionStore,
    down: AtomicBool,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self {
            inner: MemorySessionStore::new(),
            down: AtomicBool::new(false),
        }
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    fn check(&self) -> AppResult<()> {
        if self.down.load(Ordering::SeqCst) {
            return Err(AppError::StoreUnavailable("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl SessionStore for FlakyStore {
    async fn get_state(&self, bot_id: i64, user_id: i64) -> AppResult<Option<ConversationState>> {
        self.check()?;
        self.inner.get_state(bot_id, user_id).await
    }

    async fn put_state(&self, state: &ConversationState) -> AppResult<()> {
        self.check()?;
        self.inner.put_state(state).await
    }

    async fn delete_state(&self, bot_id: i64, user_id: i64) -> AppResult<()> {
        self.check()?;
        self.inner.delete_state(bot_id, user_id).await
    }

    async fn get_auth_session(&self, user_id: i64, session_id: &str) -> AppResult<AuthSession> {
        self.check()?;
        self.inner.get_auth_session(user_id, session_id).await
    }

    async fn put_auth_session(&self, user_id: i64, session: &AuthSession) -> AppResult<()> {
        self.check()?;
        self.inner.put_auth_session(user_id, session).await
    }

    async fn record_block(&self, audit: &BlockAudit) -> AppResult<()> {
        self.check()?;
        self.inner.record_block(audit).await
    }

    async fn check_rate_limit(&self, user_id: i64, limit: u32, window: Duration) -> AppResult<bool> {
        self.check()?;
        self.inner.check_rate_limit(user_id, limit, window).await
    }
}
