//! Админ-бот: long polling, маппинг апдейтов в события автомата и
//! исполнение директив провижининга.

use std::sync::Arc;

use teloxide::dispatching::UpdateFilterExt;
use teloxide::prelude::*;
use teloxide::types::{CallbackQuery, Message, Update};

use fabcore::error::AppError;
use fabcore::fsm::validation::mask_token;
use fabcore::provisioning::BotRecord;
use fabcore::{Callback, Command, Directive, Event, Outbound};

use crate::worker::WorkerBot;

use super::render::send_admin_replies;
use super::{Bot, PlatformDeps};

/// Запускает диспетчер админ-бота; блокируется до остановки процесса
pub async fn run_admin_bot(bot: Bot, deps: Arc<PlatformDeps>) {
    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(on_message))
        .branch(Update::filter_callback_query().endpoint(on_callback));

    log::info!("Admin bot dispatcher starting (bot {})", deps.admin_bot_id);
    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![deps])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

/// Текст сообщения → событие автомата
pub(super) fn message_event(text: &str) -> Event {
    match text.trim() {
        "/start" => Event::Command(Command::Start),
        "/auth" => Event::Command(Command::Auth),
        "/cancel" => Event::Command(Command::Cancel),
        "/skip" => Event::Command(Command::Skip),
        other => Event::Text(other.to_string()),
    }
}

/// Callback data → событие автомата. Формат тот же, что в кнопках render.
fn callback_event(data: &str) -> Option<Event> {
    let (action, arg) = match data.split_once(':') {
        Some((action, arg)) => (action, Some(arg)),
        None => (data, None),
    };
    let event = match (action, arg) {
        ("cancel" | "main_menu", _) => Event::Callback(Callback::Cancel),
        ("add_template", _) => Event::Callback(Callback::AddTemplate),
        ("skip_ref_code", _) => Event::Callback(Callback::SkipRefCode),
        ("add_bot", None) => Event::Callback(Callback::AddBot { template_id: None }),
        ("add_bot", Some(id)) => Event::Callback(Callback::AddBot {
            template_id: Some(id.parse().ok()?),
        }),
        ("select_template_for_bot", Some(id)) => Event::Callback(Callback::SelectTemplate {
            template_id: id.parse().ok()?,
        }),
        _ => return None,
    };
    Some(event)
}

async fn on_message(bot: Bot, msg: Message, deps: Arc<PlatformDeps>) -> ResponseResult<()> {
    let Some(user_id) = msg.from.as_ref().map(|u| u.id.0 as i64) else {
        return Ok(()); // канал или сервисное сообщение
    };
    let Some(text) = msg.text() else {
        return Ok(());
    };

    dispatch(&bot, &deps, user_id, msg.chat.id, message_event(text)).await
}

async fn on_callback(bot: Bot, q: CallbackQuery, deps: Arc<PlatformDeps>) -> ResponseResult<()> {
    bot.answer_callback_query(q.id.clone()).await?;

    let Some(chat_id) = q.message.as_ref().map(|m| m.chat().id) else {
        return Ok(());
    };
    let user_id = q.from.id.0 as i64;
    let Some(event) = q.data.as_deref().and_then(callback_event) else {
        log::debug!("Unhandled callback data: {:?}", q.data);
        return Ok(());
    };

    dispatch(&bot, &deps, user_id, chat_id, event).await
}

async fn dispatch(
    bot: &Bot,
    deps: &Arc<PlatformDeps>,
    user_id: i64,
    chat_id: ChatId,
    event: Event,
) -> ResponseResult<()> {
    let outbound = match deps.router.handle_event(deps.admin_bot_id, user_id, event).await {
        Ok(out) => {
            execute_directives(bot, deps, user_id, chat_id, &out.directives).await?;
            out
        }
        Err(err) => {
            if matches!(err, AppError::StoreUnavailable(_) | AppError::Serialization(_)) {
                log::error!(
                    "Infra failure handling event for bot {} user {}: {}",
                    deps.admin_bot_id,
                    user_id,
                    err
                );
            }
            Outbound::from(err)
        }
    };

    send_admin_replies(bot, chat_id, user_id, &deps.templates, &outbound.replies).await
}

/// Исполняет директивы владельческого сценария. Состояние диалога к этому
/// моменту уже записано; провал побочного действия докладывается отдельным
/// сообщением, не ломая диалог.
async fn execute_directives(
    bot: &Bot,
    deps: &Arc<PlatformDeps>,
    owner_id: i64,
    chat_id: ChatId,
    directives: &[Directive],
) -> ResponseResult<()> {
    let mut provisioned: Option<BotRecord> = None;

    for directive in directives {
        match directive {
            Directive::SaveTemplate {
                name,
                content,
                keyboard,
            } => match deps
                .templates
                .save_template(owner_id, name, content, keyboard)
                .await
            {
                Ok(id) => {
                    bot.send_message(chat_id, format!("📋 Шаблон «{name}» сохранен (ID: {id})"))
                        .await?;
                }
                Err(e) => {
                    log::error!("Template save failed for owner {}: {}", owner_id, e);
                    bot.send_message(chat_id, "❌ Ошибка при сохранении шаблона в БД")
                        .await?;
                }
            },

            Directive::ProvisionBot {
                token,
                template_id,
                ref_code,
            } => match deps
                .provisioner
                .create_bot(owner_id, token, *template_id, ref_code)
                .await
            {
                Ok(record) => provisioned = Some(record),
                Err(e) => {
                    log::error!(
                        "Bot provisioning failed for owner {} (token {}): {}",
                        owner_id,
                        mask_token(token),
                        e
                    );
                    bot.send_message(chat_id, format!("❌ Ошибка при создании бота: {e}"))
                        .await?;
                }
            },

            Directive::RegisterWebhook { token } => {
                if provisioned.is_none() {
                    continue; // бот не создался — вебхук не регистрируем
                }
                let url = format!("{}/webhook/{}", deps.webhook_base, token);
                if let Err(e) = deps.provisioner.register_webhook(token, &url).await {
                    log::error!("Webhook registration failed for {}: {}", mask_token(token), e);
                    bot.send_message(
                        chat_id,
                        "⚠️ Бот создан, но не удалось зарегистрировать вебхук",
                    )
                    .await?;
                }
            }

            Directive::StartWorker { token, template_id } => {
                if let Some(record) = &provisioned {
                    deps.workers.register(WorkerBot {
                        bot_id: record.id,
                        token: token.clone(),
                        template_id: *template_id,
                    });
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_message_event_commands() {
        assert_eq!(message_event("/start"), Event::Command(Command::Start));
        assert_eq!(message_event("/auth"), Event::Command(Command::Auth));
        assert_eq!(message_event(" /cancel "), Event::Command(Command::Cancel));
        assert_eq!(
            message_event("обычный текст"),
            Event::Text("обычный текст".to_string())
        );
    }

    #[test]
    fn test_callback_event_parsing() {
        assert_eq!(
            callback_event("add_bot"),
            Some(Event::Callback(Callback::AddBot { template_id: None }))
        );
        assert_eq!(
            callback_event("add_bot:42"),
            Some(Event::Callback(Callback::AddBot {
                template_id: Some(42)
            }))
        );
        assert_eq!(
            callback_event("select_template_for_bot:7"),
            Some(Event::Callback(Callback::SelectTemplate { template_id: 7 }))
        );
        assert_eq!(callback_event("cancel"), Some(Event::Callback(Callback::Cancel)));
        assert_eq!(callback_event("add_bot:мусор"), None);
        assert_eq!(callback_event("billing"), None);
    }
}
