//! Вебхук-сервер воркер-ботов.
//!
//! Every provisioned bot is registered under `POST /webhook/{token}`; one
//! axum server serves them all. Each delivery is an independent unit of
//! work: resolve the worker, rate-limit, map the update to an event, run it
//! through the shared router, render the result with that bot's token.
//! Telegram retries non-200 responses, so handler failures are logged and
//! still answered with 200.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::Json;

use teloxide::prelude::*;
use teloxide::types::{Update, UpdateKind};

use fabcore::config::rate_limit;
use fabcore::error::AppError;
use fabcore::provisioning::Template;
use fabcore::{Event, Outbound};

use crate::worker::WorkerBot;

use super::admin::message_event;
use super::render::send_worker_replies;
use super::{Bot, PlatformDeps};

/// Поднимает вебхук-сервер; блокируется до остановки процесса
pub async fn serve_webhooks(listen_addr: &str, deps: Arc<PlatformDeps>) -> anyhow::Result<()> {
    let app = axum::Router::new()
        .route("/webhook/{token}", post(handle_webhook))
        .with_state(deps);

    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    log::info!("Worker webhook server listening on {}", listen_addr);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn handle_webhook(
    Path(token): Path<String>,
    State(deps): State<Arc<PlatformDeps>>,
    Json(update): Json<Update>,
) -> StatusCode {
    let Some(worker) = deps.workers.resolve(&token) else {
        // неизвестный токен: бот снесен или вебхук чужой
        return StatusCode::NOT_FOUND;
    };

    let UpdateKind::Message(msg) = update.kind else {
        return StatusCode::OK;
    };
    let Some(user_id) = msg.from.as_ref().map(|u| u.id.0 as i64) else {
        return StatusCode::OK;
    };
    let Some(text) = msg.text() else {
        return StatusCode::OK;
    };

    let bot = Bot::new(&worker.token);
    let chat_id = msg.chat.id;

    // Фиксированное окно на пользователя, честное между рестартами —
    // счетчик живет в том же хранилище, что и состояние
    match deps
        .store
        .check_rate_limit(user_id, rate_limit::EVENTS_PER_WINDOW, rate_limit::window())
        .await
    {
        Ok(true) => {
            let _ = bot
                .send_message(chat_id, "⏳ Слишком много запросов. Подождите минуту.")
                .await;
            return StatusCode::OK;
        }
        Ok(false) => {}
        Err(e) => {
            // лимитер не повод ронять диалог
            log::warn!("Rate limit check failed for user {}: {}", user_id, e);
        }
    }

    let event: Event = message_event(text);
    let outbound = match deps.router.handle_event(worker.bot_id, user_id, event).await {
        Ok(out) => out,
        Err(err) => {
            if matches!(err, AppError::StoreUnavailable(_) | AppError::Serialization(_)) {
                log::error!(
                    "Infra failure handling webhook for bot {} user {}: {}",
                    worker.bot_id,
                    user_id,
                    err
                );
            }
            Outbound::from(err)
        }
    };

    if !outbound.directives.is_empty() {
        // владельческие сценарии конечным пользователям недоступны
        log::warn!(
            "Dropping {} directives from worker bot {} conversation",
            outbound.directives.len(),
            worker.bot_id
        );
    }

    let template = load_template(&deps, &worker).await;
    if let Err(e) = send_worker_replies(&bot, chat_id, template.as_ref(), &outbound.replies).await {
        log::error!("Failed to send replies for bot {}: {}", worker.bot_id, e);
    }

    StatusCode::OK
}

async fn load_template(deps: &Arc<PlatformDeps>, worker: &WorkerBot) -> Option<Template> {
    match deps.templates.get_template(worker.template_id).await {
        Ok(template) => template,
        Err(e) => {
            log::warn!(
                "Failed to load template {} for bot {}: {}",
                worker.template_id,
                worker.bot_id,
                e
            );
            None
        }
    }
}
