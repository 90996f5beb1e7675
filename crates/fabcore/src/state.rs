use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Шаг диалога — где пользователь находится в многоходовом сценарии
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Step {
    #[default]
    Start,
    AwaitingBotToken,
    SelectingTemplate,
    AwaitingRefCode,
    AwaitingTemplateName,
    AwaitingTemplateContent,
    AwaitingTemplateKeyboard,
    WaitingPhone,
    WaitingCode,
    Authenticated,
}

/// Данные текущего сценария, привязанные к шагу.
///
/// One variant per flow instead of an untyped key/value bag: reading a
/// field that was never set is an `Option` at compile time, not a runtime
/// type assertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "flow", rename_all = "snake_case")]
pub enum FlowData {
    #[default]
    None,
    /// Подключение нового бота: токен → шаблон → реферальный код
    BotDraft {
        #[serde(skip_serializing_if = "Option::is_none", default)]
        bot_token: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        template_id: Option<i64>,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        ref_code: Option<String>,
    },
    /// Создание шаблона: название → содержание → клавиатура
    TemplateDraft {
        #[serde(skip_serializing_if = "Option::is_none", default)]
        name: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        content: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        keyboard: Option<Vec<Vec<String>>>,
    },
    /// Авторизация по номеру телефона
    Auth {
        #[serde(skip_serializing_if = "Option::is_none", default)]
        phone: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        code_hash: Option<String>,
    },
}

/// Состояние диалога одной пары (бот, пользователь).
///
/// At most one record exists per pair; the store writes it whole on every
/// transition (last-writer-wins, never a partial merge). `last_active`
/// advances on every successful transition, including pure re-prompts, so
/// idle expiry is measured from true last contact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    pub bot_id: i64,
    pub user_id: i64,
    pub current_step: Step,
    #[serde(default)]
    pub flow: FlowData,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub ref_code: Option<String>,
    pub last_active: DateTime<Utc>,
    #[serde(default)]
    pub is_blocked: bool,
}

impl ConversationState {
    /// Создает свежее состояние на шаге `start`
    pub fn new(bot_id: i64, user_id: i64) -> Self {
        Self {
            bot_id,
            user_id,
            current_step: Step::Start,
            flow: FlowData::None,
            ref_code: None,
            last_active: Utc::now(),
            is_blocked: false,
        }
    }

    /// Продвигает `last_active` до текущего момента
    pub fn touch(&mut self) {
        self.last_active = Utc::now();
    }
}

/// Кого заблокировали — бота целиком или пользователя у конкретного бота
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockScope {
    Bot,
    User,
}

/// Audit record written on every block operation, including repeat blocks
/// of an already-blocked entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockAudit {
    pub scope: BlockScope,
    pub bot_id: i64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub user_id: Option<i64>,
    pub reason: String,
    pub blocked_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_step_serializes_as_snake_case_tag() {
        let cases = vec![
            (Step::Start, "\"start\""),
            (Step::AwaitingBotToken, "\"awaiting_bot_token\""),
            (Step::AwaitingTemplateKeyboard, "\"awaiting_template_keyboard\""),
            (Step::WaitingPhone, "\"waiting_phone\""),
            (Step::Authenticated, "\"authenticated\""),
        ];

        for (step, expected) in cases {
            assert_eq!(serde_json::to_string(&step).unwrap(), expected);
        }
    }

    #[test]
    fn test_state_round_trips_through_json() {
        let mut state = ConversationState::new(7, 42);
        state.current_step = Step::AwaitingTemplateContent;
        state.flow = FlowData::TemplateDraft {
            name: Some("приветствие".to_string()),
            content: None,
            keyboard: None,
        };

        let json = serde_json::to_string(&state).unwrap();
        let back: ConversationState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }

    #[test]
    fn test_old_records_without_flow_still_deserialize() {
        // Records written before the flow field existed must load as None.
        let json = r#"{"bot_id":1,"user_id":2,"current_step":"start","last_active":"2025-01-01T00:00:00Z"}"#;
        let state: ConversationState = serde_json::from_str(json).unwrap();
        assert_eq!(state.flow, FlowData::None);
        assert!(!state.is_blocked);
    }
}
