//! Границы провижининга: шаблоны и записи ботов.
//!
//! The relational schema behind these traits is the admin panel's business;
//! the conversation core only states what it needs from it. The transport
//! layer resolves [`crate::fsm::Directive`]s against these traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppResult;

/// Именованный версионируемый сценарий, прикрепляемый к боту
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub id: i64,
    pub owner_id: i64,
    pub name: String,
    pub content: String,
    pub keyboard: Vec<Vec<String>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Короткая строка списка шаблонов (для клавиатуры выбора)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateSummary {
    pub id: i64,
    pub name: String,
}

/// Запись провиженного бота
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotRecord {
    pub id: i64,
    pub owner_id: i64,
    /// Токен хранится целиком; наружу уходит только маскированный вид
    pub token: String,
    pub template_id: i64,
    pub ref_code: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Хранилище шаблонов
#[async_trait]
pub trait TemplateStore: Send + Sync {
    async fn save_template(
        &self,
        owner_id: i64,
        name: &str,
        content: &str,
        keyboard: &[Vec<String>],
    ) -> AppResult<i64>;

    async fn list_templates(&self, owner_id: i64) -> AppResult<Vec<TemplateSummary>>;

    /// `None` — шаблона нет; это пользовательское «не найдено», не ошибка
    async fn get_template(&self, id: i64) -> AppResult<Option<Template>>;
}

/// Создание ботов и регистрация вебхуков
#[async_trait]
pub trait BotProvisioner: Send + Sync {
    /// Пишет запись бота. Коллизию реферального кода в рамках владельца
    /// проверяет эта сторона, не автомат.
    async fn create_bot(
        &self,
        owner_id: i64,
        token: &str,
        template_id: i64,
        ref_code: &str,
    ) -> AppResult<BotRecord>;

    async fn register_webhook(&self, token: &str, url: &str) -> AppResult<()>;
}
