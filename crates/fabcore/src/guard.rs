//! Блокировки и проверки перед диспетчеризацией.
//!
//! The guard runs before any transition: a blocked bot or user never
//! reaches the state machine, and nothing is written on rejection. Block
//! operations are idempotent: re-blocking an already-blocked entity is a
//! no-op for state but still records a fresh audit entry.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::{AppError, AppResult};
use crate::state::{BlockAudit, BlockScope, ConversationState};
use crate::store::SessionStore;

/// Справочник ботов — граница с реляционным хранилищем платформы.
///
/// The conversation core only needs two questions answered about the
/// persisted bot record; everything else about the schema stays outside.
#[async_trait]
pub trait BotDirectory: Send + Sync {
    /// `false` — бот существует, но выключен или заблокирован.
    /// Неизвестный бот — `NotFound`.
    async fn is_active(&self, bot_id: i64) -> AppResult<bool>;

    /// Помечает бота заблокированным; повторный вызов — no-op
    async fn mark_blocked(&self, bot_id: i64, reason: &str) -> AppResult<()>;
}

pub struct Guard {
    store: Arc<dyn SessionStore>,
    directory: Arc<dyn BotDirectory>,
}

impl Guard {
    pub fn new(store: Arc<dyn SessionStore>, directory: Arc<dyn BotDirectory>) -> Self {
        Self { store, directory }
    }

    /// Отклоняет события для неактивного бота до вызова автомата
    pub async fn check_bot(&self, bot_id: i64) -> AppResult<()> {
        if !self.directory.is_active(bot_id).await? {
            return Err(AppError::BotBlocked);
        }
        Ok(())
    }

    /// Ядовитая запись: заблокированный пользователь отклоняется без
    /// какой-либо мутации состояния
    pub fn check_user(state: &ConversationState) -> AppResult<()> {
        if state.is_blocked {
            return Err(AppError::UserBlocked);
        }
        Ok(())
    }

    /// Блокирует бота целиком. Идемпотентно; журнал пишется всегда.
    pub async fn block_bot(&self, bot_id: i64, reason: &str) -> AppResult<()> {
        self.directory.mark_blocked(bot_id, reason).await?;
        self.store
            .record_block(&BlockAudit {
                scope: BlockScope::Bot,
                bot_id,
                user_id: None,
                reason: reason.to_string(),
                blocked_at: Utc::now(),
            })
            .await?;
        log::warn!("Bot {} blocked: {}", bot_id, reason);
        Ok(())
    }

    /// Блокирует пользователя у конкретного бота. Состояние превращается в
    /// ядовитую запись и сохраняется (не удаляется), чтобы пережить TTL
    /// обычного диалога.
    pub async fn block_user(&self, bot_id: i64, user_id: i64, reason: &str) -> AppResult<()> {
        let mut state = self
            .store
            .get_state(bot_id, user_id)
            .await?
            .unwrap_or_else(|| ConversationState::new(bot_id, user_id));
        state.is_blocked = true;
        state.touch();
        self.store.put_state(&state).await?;

        self.store
            .record_block(&BlockAudit {
                scope: BlockScope::User,
                bot_id,
                user_id: Some(user_id),
                reason: reason.to_string(),
                blocked_at: Utc::now(),
            })
            .await?;
        log::warn!("User {} blocked for bot {}: {}", user_id, bot_id, reason);
        Ok(())
    }
}
