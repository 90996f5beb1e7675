//! Диспетчер входящих событий.
//!
//! One inbound event = one independent unit of work: guard check, fresh
//! read from the store, pure transition, auth round trip if the transition
//! asked for one, single whole-record write, outbound instructions back to
//! the transport. No lock is held across the auth call, so a `cancel` for
//! the same user can be processed while a round trip is still in flight.

use std::sync::Arc;

use secrecy::SecretString;

use crate::config;
use crate::error::{AppError, AppResult};
use crate::fsm::{self, AuthCall, Directive, Event, Keyboard, Reply, StateChange, Transition};
use crate::guard::{BotDirectory, Guard};
use crate::session::AuthSession;
use crate::state::{ConversationState, FlowData};
use crate::store::SessionStore;

/// Граница протокола авторизации (MTProto). Транспортные детали снаружи;
/// ядру нужны только два вызова с непрозрачными результатами.
#[async_trait::async_trait]
pub trait AuthClient: Send + Sync {
    /// Запрашивает отправку кода; возвращает hash для подтверждения
    async fn send_code(&self, phone: &str) -> AppResult<String>;

    /// Подтверждает код; возвращает сериализованный credential
    async fn verify_code(&self, phone: &str, code: &str, code_hash: &str)
        -> AppResult<SecretString>;
}

/// Инструкции транспортному слою по итогам одного события
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub replies: Vec<Reply>,
    pub directives: Vec<Directive>,
}

/// Роутер одного события. Все зависимости внедряются явно — никакого
/// глобального состояния, двойники подставляются в тестах без оговорок.
pub struct Router {
    store: Arc<dyn SessionStore>,
    auth: Arc<dyn AuthClient>,
    guard: Guard,
}

impl Router {
    pub fn new(
        store: Arc<dyn SessionStore>,
        directory: Arc<dyn BotDirectory>,
        auth: Arc<dyn AuthClient>,
    ) -> Self {
        let guard = Guard::new(store.clone(), directory);
        Self { store, auth, guard }
    }

    pub fn guard(&self) -> &Guard {
        &self.guard
    }

    /// Обрабатывает одно событие пары (бот, пользователь).
    ///
    /// Persists on every successful transition; a pure re-prompt still
    /// advances `last_active`, so idle expiry measures real last contact.
    pub async fn handle_event(
        &self,
        bot_id: i64,
        user_id: i64,
        event: Event,
    ) -> AppResult<Outbound> {
        self.guard.check_bot(bot_id).await?;

        let state = self
            .store
            .get_state(bot_id, user_id)
            .await?
            .unwrap_or_else(|| ConversationState::new(bot_id, user_id));
        Guard::check_user(&state)?;

        log::debug!(
            "Event for bot {} user {} at step {}",
            bot_id,
            user_id,
            state.current_step
        );

        let mut transition = fsm::transition(&state, &event);
        if let Some(call) = transition.auth_call.take() {
            transition = self.resolve_auth(&state, transition, call).await?;
        }

        match transition.change {
            StateChange::Clear => self.store.delete_state(bot_id, user_id).await?,
            StateChange::Persist(mut next) => {
                next.touch();
                self.store.put_state(&next).await?;
            }
        }

        Ok(Outbound {
            replies: transition.replies,
            directives: transition.directives,
        })
    }

    /// Исполняет обращение к протоколу авторизации с таймаутом.
    ///
    /// The transition's state is the success case; any failure swaps it for
    /// the previous state (with a retryable error reply), so the user never
    /// gets stuck on a step the backend never confirmed.
    async fn resolve_auth(
        &self,
        prev: &ConversationState,
        mut transition: Transition,
        call: AuthCall,
    ) -> AppResult<Transition> {
        let deadline = config::auth::round_trip_timeout();

        match call {
            AuthCall::SendCode { phone } => {
                match tokio::time::timeout(deadline, self.auth.send_code(&phone)).await {
                    Ok(Ok(code_hash)) => {
                        if let StateChange::Persist(next) = &mut transition.change {
                            if let FlowData::Auth { code_hash: slot, .. } = &mut next.flow {
                                *slot = Some(code_hash);
                            }
                        }
                        Ok(transition)
                    }
                    Ok(Err(e)) => {
                        log::warn!(
                            "send_code failed for bot {} user {} at step {}: {}",
                            prev.bot_id,
                            prev.user_id,
                            prev.current_step,
                            e
                        );
                        Ok(retry_here(
                            prev,
                            "❌ Не удалось отправить код. Попробуйте ещё раз.",
                        ))
                    }
                    Err(_) => {
                        log::warn!(
                            "send_code timed out for bot {} user {}",
                            prev.bot_id,
                            prev.user_id
                        );
                        Ok(retry_here(
                            prev,
                            "❌ Сервис авторизации не ответил вовремя. Попробуйте ещё раз.",
                        ))
                    }
                }
            }

            AuthCall::VerifyCode {
                phone,
                code,
                code_hash,
            } => {
                match tokio::time::timeout(deadline, self.auth.verify_code(&phone, &code, &code_hash))
                    .await
                {
                    Ok(Ok(credential)) => {
                        let session =
                            AuthSession::new(credential, config::session::auth_session_ttl())?;
                        self.store.put_auth_session(prev.user_id, &session).await?;
                        log::info!(
                            "User {} authenticated, session {}",
                            prev.user_id,
                            session.id
                        );
                        Ok(transition)
                    }
                    Ok(Err(e)) => {
                        log::info!(
                            "verify_code rejected for bot {} user {}: {}",
                            prev.bot_id,
                            prev.user_id,
                            e
                        );
                        // Остаемся на waiting_code: введенный телефон и hash не теряются
                        Ok(retry_here(prev, "❌ Код не принят. Введите код ещё раз."))
                    }
                    Err(_) => Ok(retry_here(
                        prev,
                        "❌ Сервис авторизации не ответил вовремя. Попробуйте ещё раз.",
                    )),
                }
            }
        }
    }
}

/// Переход «остаться на прежнем шаге с ошибкой»: прежнее состояние
/// сохраняется (ради `last_active`), побочных действий нет.
fn retry_here(prev: &ConversationState, text: &str) -> Transition {
    Transition {
        change: StateChange::Persist(prev.clone()),
        replies: vec![Reply::with_keyboard(text, Keyboard::Cancel)],
        directives: Vec::new(),
        auth_call: None,
    }
}

impl From<AppError> for Outbound {
    /// Пользовательское сообщение для отклонений политики. Инфраструктурные
    /// ошибки остаются техническими — транспорт показывает их обобщенно.
    fn from(err: AppError) -> Self {
        let text = match &err {
            AppError::BotBlocked => "⛔ Бот отключен владельцем платформы".to_string(),
            AppError::UserBlocked => "⛔ Доступ заблокирован".to_string(),
            AppError::SessionExpired => "❌ Сессия истекла. Авторизуйтесь заново: /auth".to_string(),
            AppError::Validation(msg) => format!("❌ {msg}"),
            _ => "⚠️ Техническая ошибка. Попробуйте позже.".to_string(),
        };
        Outbound {
            replies: vec![Reply::text(text)],
            directives: Vec::new(),
        }
    }
}
