//! Отрисовка исходящих инструкций в Telegram-сообщения.
//!
//! The state machine names its keyboards semantically; which buttons that
//! means (and whether the viewer is an owner in the admin bot or an end
//! user in a worker bot) is decided here and nowhere else.

use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::types::{
    InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup, ReplyMarkup,
};

use fabcore::provisioning::{Template, TemplateStore};
use fabcore::{Keyboard, Reply};

use super::Bot;

/// Шорткат для inline-кнопки с callback data
pub fn cb(label: impl Into<String>, data: impl Into<String>) -> InlineKeyboardButton {
    InlineKeyboardButton::callback(label.into(), data.into())
}

pub fn owner_panel_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        cb("🤖 Добавить бота", "add_bot"),
        cb("➕ Создать шаблон", "add_template"),
    ]])
}

pub fn cancel_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![cb("❌ Отмена", "cancel")]])
}

pub fn skip_ref_code_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        cb("Пропустить", "skip_ref_code"),
        cb("❌ Отмена", "cancel"),
    ]])
}

/// Клавиатура выбора шаблона: по кнопке на шаблон владельца
pub async fn templates_keyboard(
    templates: &Arc<dyn TemplateStore>,
    owner_id: i64,
) -> Option<InlineKeyboardMarkup> {
    let list = match templates.list_templates(owner_id).await {
        Ok(list) => list,
        Err(e) => {
            log::warn!("Failed to list templates for owner {}: {}", owner_id, e);
            return None;
        }
    };
    if list.is_empty() {
        return None;
    }

    let mut rows: Vec<Vec<InlineKeyboardButton>> = list
        .into_iter()
        .map(|t| {
            vec![cb(
                format!("{} (ID: {})", t.name, t.id),
                format!("select_template_for_bot:{}", t.id),
            )]
        })
        .collect();
    rows.push(vec![cb("❌ Отмена", "cancel")]);
    Some(InlineKeyboardMarkup::new(rows))
}

/// Reply-клавиатура из строк шаблона
pub fn template_reply_keyboard(rows: &[Vec<String>]) -> KeyboardMarkup {
    KeyboardMarkup::new(
        rows.iter()
            .map(|row| row.iter().map(|label| KeyboardButton::new(label.clone())).collect())
            .collect::<Vec<Vec<KeyboardButton>>>(),
    )
}

/// Рендер ответов для владельца в админ-боте
pub async fn send_admin_replies(
    bot: &Bot,
    chat_id: ChatId,
    owner_id: i64,
    templates: &Arc<dyn TemplateStore>,
    replies: &[Reply],
) -> ResponseResult<()> {
    for reply in replies {
        let request = bot.send_message(chat_id, &reply.text);
        match reply.keyboard {
            None => request.await?,
            Some(Keyboard::OwnerPanel) => {
                request.reply_markup(owner_panel_keyboard()).await?
            }
            Some(Keyboard::Cancel) => request.reply_markup(cancel_keyboard()).await?,
            Some(Keyboard::SkipRefCode) => {
                request.reply_markup(skip_ref_code_keyboard()).await?
            }
            Some(Keyboard::Templates) => match templates_keyboard(templates, owner_id).await {
                Some(markup) => request.reply_markup(markup).await?,
                None => {
                    // без шаблонов выбирать нечего — отправляем в создание
                    bot.send_message(
                        chat_id,
                        "❌ У вас нет шаблонов. Сначала создайте шаблон.",
                    )
                    .reply_markup(owner_panel_keyboard())
                    .await?
                }
            },
            Some(Keyboard::Remove) => {
                request.reply_markup(ReplyMarkup::kb_remove()).await?
            }
        };
    }
    Ok(())
}

/// Рендер ответов конечному пользователю воркер-бота: вместо панели
/// владельца показывается контент шаблона с его клавиатурой.
pub async fn send_worker_replies(
    bot: &Bot,
    chat_id: ChatId,
    template: Option<&Template>,
    replies: &[Reply],
) -> ResponseResult<()> {
    for reply in replies {
        match reply.keyboard {
            Some(Keyboard::OwnerPanel) => {
                // меню конечного пользователя — сценарий шаблона
                match template {
                    Some(t) => {
                        bot.send_message(chat_id, &t.content)
                            .reply_markup(template_reply_keyboard(&t.keyboard))
                            .await?;
                    }
                    None => {
                        bot.send_message(chat_id, &reply.text).await?;
                    }
                }
            }
            Some(Keyboard::Remove) => {
                bot.send_message(chat_id, &reply.text)
                    .reply_markup(ReplyMarkup::kb_remove())
                    .await?;
            }
            _ => {
                bot.send_message(chat_id, &reply.text).await?;
            }
        }
    }
    Ok(())
}
