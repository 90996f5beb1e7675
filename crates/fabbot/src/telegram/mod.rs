//! Telegram transport: admin dispatcher, worker webhooks, rendering.

pub mod admin;
pub mod render;
pub mod webhook;

use std::sync::Arc;

use fabcore::provisioning::{BotProvisioner, TemplateStore};
use fabcore::{Router, SessionStore};

use crate::worker::WorkerRegistry;

pub type Bot = teloxide::Bot;

/// Зависимости транспортного слоя. Собираются один раз в main и явно
/// передаются обработчикам — глобальных переменных нет.
pub struct PlatformDeps {
    pub router: Router,
    pub store: Arc<dyn SessionStore>,
    pub templates: Arc<dyn TemplateStore>,
    pub provisioner: Arc<dyn BotProvisioner>,
    pub workers: Arc<WorkerRegistry>,
    pub admin_bot_id: i64,
    pub webhook_base: String,
}

// Re-exports for convenience
pub use admin::run_admin_bot;
pub use webhook::serve_webhooks;
