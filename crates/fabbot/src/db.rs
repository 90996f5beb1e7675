//! Postgres-backed implementations of the platform boundaries.
//!
//! The schema (bots, bot_templates) belongs to the admin panel; this module
//! only runs the handful of queries the conversation core's boundaries ask
//! for. Connectivity failures map to `StoreUnavailable`, absent rows to
//! `NotFound`, the same taxonomy the session store uses.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};

use fabcore::error::{AppError, AppResult};
use fabcore::fsm::validation::mask_token;
use fabcore::provisioning::{BotProvisioner, BotRecord, Template, TemplateSummary, TemplateStore};
use fabcore::BotDirectory;

use crate::config;

/// Создает пул соединений и проверяет его одним запросом
pub async fn create_pool(url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config::db::MAX_CONNECTIONS)
        .connect(url)
        .await?;
    sqlx::query("SELECT 1").execute(&pool).await?;
    log::info!("Connected to platform database");
    Ok(pool)
}

fn db_err(e: sqlx::Error) -> AppError {
    AppError::StoreUnavailable(e.to_string())
}

/// Справочник ботов поверх таблицы `bots`
pub struct PgDirectory {
    pool: PgPool,
}

impl PgDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Активные боты с токенами — для восстановления воркеров на старте
    pub async fn active_bots(&self) -> AppResult<Vec<(i64, String, i64)>> {
        sqlx::query_as::<_, (i64, String, i64)>(
            "SELECT id, token, template_id FROM bots WHERE is_active",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)
    }
}

#[async_trait]
impl BotDirectory for PgDirectory {
    async fn is_active(&self, bot_id: i64) -> AppResult<bool> {
        let row: Option<(bool,)> = sqlx::query_as("SELECT is_active FROM bots WHERE id = $1")
            .bind(bot_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.map(|(active,)| active)
            .ok_or_else(|| AppError::NotFound(format!("bot {bot_id}")))
    }

    async fn mark_blocked(&self, bot_id: i64, reason: &str) -> AppResult<()> {
        // Идемпотентно: повторная блокировка лишь обновляет причину
        sqlx::query(
            "UPDATE bots SET is_active = FALSE, blocked_reason = $2, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(bot_id)
        .bind(reason)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }
}

/// Справочник, считающий админ-бота всегда активным.
///
/// The admin bot is not a provisioned bot and has no row in `bots`, but
/// every event passes the same guard; without this wrapper the owner's own
/// conversation would bounce off `NotFound`.
pub struct WithAdminBot<D> {
    inner: D,
    admin_bot_id: i64,
}

impl<D> WithAdminBot<D> {
    pub fn new(inner: D, admin_bot_id: i64) -> Self {
        Self {
            inner,
            admin_bot_id,
        }
    }
}

#[async_trait]
impl<D: BotDirectory> BotDirectory for WithAdminBot<D> {
    async fn is_active(&self, bot_id: i64) -> AppResult<bool> {
        if bot_id == self.admin_bot_id {
            return Ok(true);
        }
        self.inner.is_active(bot_id).await
    }

    async fn mark_blocked(&self, bot_id: i64, reason: &str) -> AppResult<()> {
        if bot_id == self.admin_bot_id {
            return Err(AppError::Validation(
                "нельзя заблокировать админ-бота".to_string(),
            ));
        }
        self.inner.mark_blocked(bot_id, reason).await
    }
}

/// Шаблоны поверх таблицы `bot_templates`
pub struct PgTemplates {
    pool: PgPool,
}

impl PgTemplates {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TemplateStore for PgTemplates {
    async fn save_template(
        &self,
        owner_id: i64,
        name: &str,
        content: &str,
        keyboard: &[Vec<String>],
    ) -> AppResult<i64> {
        let keyboard_json = serde_json::to_string(keyboard)?;
        let (id,): (i64,) = sqlx::query_as(
            "INSERT INTO bot_templates (owner_id, name, content, keyboard, is_active, created_at) \
             VALUES ($1, $2, $3, $4::jsonb, TRUE, NOW()) RETURNING id",
        )
        .bind(owner_id)
        .bind(name)
        .bind(content)
        .bind(keyboard_json)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        log::info!("Template {} saved for owner {}", id, owner_id);
        Ok(id)
    }

    async fn list_templates(&self, owner_id: i64) -> AppResult<Vec<TemplateSummary>> {
        let rows: Vec<(i64, String)> = sqlx::query_as(
            "SELECT id, name FROM bot_templates WHERE owner_id = $1 AND is_active ORDER BY id",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows
            .into_iter()
            .map(|(id, name)| TemplateSummary { id, name })
            .collect())
    }

    async fn get_template(&self, id: i64) -> AppResult<Option<Template>> {
        let row: Option<(i64, i64, String, String, String, bool, DateTime<Utc>)> = sqlx::query_as(
            "SELECT id, owner_id, name, content, keyboard::text, is_active, created_at \
             FROM bot_templates WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        let Some((id, owner_id, name, content, keyboard_json, is_active, created_at)) = row else {
            return Ok(None);
        };
        Ok(Some(Template {
            id,
            owner_id,
            name,
            content,
            keyboard: serde_json::from_str(&keyboard_json)?,
            is_active,
            created_at,
        }))
    }
}

/// Провижининг поверх таблицы `bots` + Telegram setWebhook
pub struct PgProvisioner {
    pool: PgPool,
}

impl PgProvisioner {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BotProvisioner for PgProvisioner {
    async fn create_bot(
        &self,
        owner_id: i64,
        token: &str,
        template_id: i64,
        ref_code: &str,
    ) -> AppResult<BotRecord> {
        let (exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM bots WHERE owner_id = $1 AND ref_code = $2)",
        )
        .bind(owner_id)
        .bind(ref_code)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        if exists {
            return Err(AppError::Validation(format!(
                "реферальный код {ref_code} уже используется"
            )));
        }

        let (id, created_at): (i64, DateTime<Utc>) = sqlx::query_as(
            "INSERT INTO bots (owner_id, token, template_id, ref_code, is_active, created_at) \
             VALUES ($1, $2, $3, $4, TRUE, NOW()) RETURNING id, created_at",
        )
        .bind(owner_id)
        .bind(token)
        .bind(template_id)
        .bind(ref_code)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        log::info!(
            "Bot {} provisioned for owner {} (token {})",
            id,
            owner_id,
            mask_token(token)
        );
        Ok(BotRecord {
            id,
            owner_id,
            token: token.to_string(),
            template_id,
            ref_code: ref_code.to_string(),
            is_active: true,
            created_at,
        })
    }

    async fn register_webhook(&self, token: &str, url: &str) -> AppResult<()> {
        let parsed = url::Url::parse(url)
            .map_err(|e| AppError::Validation(format!("webhook url: {e}")))?;
        let bot = teloxide::Bot::new(token);
        teloxide::requests::Requester::set_webhook(&bot, parsed)
            .await
            .map_err(|e| AppError::ExternalProtocol(format!("setWebhook: {e}")))?;
        log::info!("Webhook registered for bot {}", mask_token(token));
        Ok(())
    }
}
