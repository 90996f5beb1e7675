//! Конечный автомат диалога.
//!
//! `transition` is a pure function from (current state, inbound event) to
//! (state change, outbound instructions). It performs no I/O: messages and
//! keyboards come back as data, provisioning and template persistence as
//! [`Directive`]s for the transport layer, and auth round trips as an
//! [`AuthCall`] the router resolves against the auth boundary. That keeps
//! every flow testable without a store, a network or a Telegram server.

pub mod keyboard;
pub mod validation;

use crate::refcode;
use crate::state::{ConversationState, FlowData, Step};

use self::validation::{is_valid_bot_token, is_valid_phone, mask_token};

/// Входящее событие для пары (бот, пользователь)
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Слэш-команда
    Command(Command),
    /// Обычное текстовое сообщение
    Text(String),
    /// Нажатие inline-кнопки
    Callback(Callback),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Auth,
    Cancel,
    Skip,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Callback {
    /// «Добавить бота», с заранее выбранным шаблоном или без
    AddBot { template_id: Option<i64> },
    /// Выбор шаблона для подключаемого бота
    SelectTemplate { template_id: i64 },
    /// «Создать шаблон»
    AddTemplate,
    /// «Пропустить» на шаге реферального кода
    SkipRefCode,
    /// «Отмена» / возврат в меню
    Cancel,
}

/// Семантический маркер клавиатуры. Какие кнопки и как рисовать — дело
/// транспорта; автомат только называет намерение.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyboard {
    /// Панель владельца (главное меню)
    OwnerPanel,
    /// Одна кнопка «Отмена»
    Cancel,
    /// Список шаблонов владельца
    Templates,
    /// «Пропустить» + «Отмена»
    SkipRefCode,
    /// Убрать клавиатуру
    Remove,
}

/// Одно исходящее сообщение
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub text: String,
    pub keyboard: Option<Keyboard>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: None,
        }
    }

    pub fn with_keyboard(text: impl Into<String>, keyboard: Keyboard) -> Self {
        Self {
            text: text.into(),
            keyboard: Some(keyboard),
        }
    }
}

/// Побочное действие, которое исполняет административный/транспортный слой
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    ProvisionBot {
        token: String,
        template_id: i64,
        ref_code: String,
    },
    SaveTemplate {
        name: String,
        content: String,
        keyboard: Vec<Vec<String>>,
    },
    RegisterWebhook {
        token: String,
    },
    StartWorker {
        token: String,
        template_id: i64,
    },
}

/// Обращение к протоколу авторизации, исполняется роутером с таймаутом
#[derive(Debug, Clone, PartialEq)]
pub enum AuthCall {
    SendCode {
        phone: String,
    },
    VerifyCode {
        phone: String,
        code: String,
        code_hash: String,
    },
}

/// Что сделать с состоянием после перехода
#[derive(Debug, Clone, PartialEq)]
pub enum StateChange {
    /// Записать (включая чистые повторные подсказки — ради `last_active`)
    Persist(ConversationState),
    /// Диалог завершен или отменен — запись удаляется
    Clear,
}

/// Результат одного перехода
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub change: StateChange,
    pub replies: Vec<Reply>,
    pub directives: Vec<Directive>,
    /// При `Some` поле `change` описывает состояние НА СЛУЧАЙ УСПЕХА
    /// вызова; провал оставляет прежнее состояние (роутер).
    pub auth_call: Option<AuthCall>,
}

impl Transition {
    fn persist(state: ConversationState, replies: Vec<Reply>) -> Self {
        Self {
            change: StateChange::Persist(state),
            replies,
            directives: Vec::new(),
            auth_call: None,
        }
    }

    fn clear(replies: Vec<Reply>) -> Self {
        Self {
            change: StateChange::Clear,
            replies,
            directives: Vec::new(),
            auth_call: None,
        }
    }
}

const MSG_MENU: &str = "👑 Панель владельца";
const MSG_USE_BUTTONS: &str = "Используйте кнопки меню";
const MSG_CANCELLED: &str = "Действие отменено";
const MSG_ENTER_TOKEN: &str =
    "Введите токен бота (например: 1234567890:ABCdefghijk_Lmnopqrstuvwxyz):";
const MSG_BAD_TOKEN: &str =
    "❌ Неверный формат токена. Токен должен быть в формате 1234567890:ABCdefghijk_Lmnopqrstuvwxyz";
const MSG_CHOOSE_TEMPLATE: &str = "Выберите шаблон для бота:";
const MSG_ENTER_TEMPLATE_NAME: &str = "📝 Создание нового шаблона\n\nВведите название шаблона:";
const MSG_ENTER_TEMPLATE_CONTENT: &str = "Введите содержание шаблона:";
const MSG_ENTER_TEMPLATE_KEYBOARD: &str =
    "Введите клавиатуру в JSON формате (пример: [[\"Да\"], [\"Нет\"]]):";
const MSG_ENTER_PHONE: &str = "Введите номер телефона в формате +71234567890";
const MSG_BAD_PHONE: &str = "❌ Неверный формат номера. Пример: +71234567890";
const MSG_PHONE_ACCEPTED: &str = "Номер принят. Введите код подтверждения";
const MSG_AUTH_DONE: &str = "✅ Вы успешно авторизованы!";
const MSG_DRAFT_LOST: &str = "❌ Данные не найдены. Начните процесс заново.";

/// Чистая функция перехода: (состояние, событие) → (новое состояние,
/// инструкции). Никаких побочных эффектов.
pub fn transition(state: &ConversationState, event: &Event) -> Transition {
    match event {
        Event::Command(Command::Cancel) | Event::Callback(Callback::Cancel) => {
            Transition::clear(vec![
                Reply::text(MSG_CANCELLED),
                Reply::with_keyboard(MSG_MENU, Keyboard::OwnerPanel),
            ])
        }

        Event::Command(Command::Start) => {
            let mut next = ConversationState::new(state.bot_id, state.user_id);
            // Код пользователя детерминированный: повторный /start после
            // истечения состояния выдает тот же код
            next.ref_code = state.ref_code.clone().or_else(|| {
                Some(refcode::derive(&format!("{}:{}", state.bot_id, state.user_id)))
            });
            let greeting = match &next.ref_code {
                Some(code) => format!("Добро пожаловать! Ваш реферальный код: {code}"),
                None => "Добро пожаловать!".to_string(),
            };
            Transition::persist(
                next,
                vec![
                    Reply::with_keyboard(greeting, Keyboard::Remove),
                    Reply::with_keyboard(MSG_MENU, Keyboard::OwnerPanel),
                ],
            )
        }

        Event::Command(Command::Auth) => {
            let mut next = state.clone();
            next.current_step = Step::WaitingPhone;
            next.flow = FlowData::Auth {
                phone: None,
                code_hash: None,
            };
            Transition::persist(next, vec![Reply::with_keyboard(MSG_ENTER_PHONE, Keyboard::Cancel)])
        }

        // «Добавить бота» и «Создать шаблон» перезапускают свой сценарий из
        // любого шага: меню доступно всегда, залипшие черновики не мешают.
        Event::Callback(Callback::AddBot { template_id }) => {
            let mut next = state.clone();
            next.current_step = Step::AwaitingBotToken;
            next.flow = FlowData::BotDraft {
                bot_token: None,
                template_id: *template_id,
                ref_code: None,
            };
            Transition::persist(next, vec![Reply::with_keyboard(MSG_ENTER_TOKEN, Keyboard::Cancel)])
        }

        Event::Callback(Callback::AddTemplate) => {
            let mut next = state.clone();
            next.current_step = Step::AwaitingTemplateName;
            next.flow = FlowData::TemplateDraft {
                name: None,
                content: None,
                keyboard: None,
            };
            Transition::persist(
                next,
                vec![Reply::with_keyboard(MSG_ENTER_TEMPLATE_NAME, Keyboard::Cancel)],
            )
        }

        Event::Callback(Callback::SelectTemplate { template_id }) => {
            select_template(state, *template_id)
        }

        Event::Command(Command::Skip) | Event::Callback(Callback::SkipRefCode) => {
            match state.current_step {
                Step::AwaitingRefCode => finish_bot_draft(state, None),
                _ => reprompt_menu(state),
            }
        }

        Event::Text(text) => on_text(state, text),
    }
}

fn on_text(state: &ConversationState, text: &str) -> Transition {
    match state.current_step {
        Step::Start | Step::Authenticated => reprompt_menu(state),

        Step::AwaitingBotToken => on_token(state, text),

        Step::SelectingTemplate => Transition::persist(
            state.clone(),
            vec![Reply::with_keyboard(MSG_CHOOSE_TEMPLATE, Keyboard::Templates)],
        ),

        Step::AwaitingRefCode => {
            let trimmed = text.trim();
            // «skip» и /skip — просьба сгенерировать код автоматически
            if trimmed.is_empty() || trimmed == "/skip" || trimmed.eq_ignore_ascii_case("skip") {
                finish_bot_draft(state, None)
            } else {
                finish_bot_draft(state, Some(trimmed.to_string()))
            }
        }

        Step::AwaitingTemplateName => on_template_name(state, text),
        Step::AwaitingTemplateContent => on_template_content(state, text),
        Step::AwaitingTemplateKeyboard => on_template_keyboard(state, text),

        Step::WaitingPhone => on_phone(state, text),
        Step::WaitingCode => on_code(state, text),
    }
}

fn reprompt_menu(state: &ConversationState) -> Transition {
    Transition::persist(
        state.clone(),
        vec![Reply::with_keyboard(MSG_USE_BUTTONS, Keyboard::OwnerPanel)],
    )
}

fn on_token(state: &ConversationState, text: &str) -> Transition {
    let token = text.trim();
    if !is_valid_bot_token(token) {
        return Transition::persist(
            state.clone(),
            vec![Reply::with_keyboard(MSG_BAD_TOKEN, Keyboard::Cancel)],
        );
    }

    let template_id = match &state.flow {
        FlowData::BotDraft { template_id, .. } => *template_id,
        _ => None,
    };

    let mut next = state.clone();
    next.flow = FlowData::BotDraft {
        bot_token: Some(token.to_string()),
        template_id,
        ref_code: None,
    };

    match template_id {
        // Шаблон выбран заранее — сразу к реферальному коду
        Some(id) => {
            next.current_step = Step::AwaitingRefCode;
            Transition::persist(
                next,
                vec![Reply::with_keyboard(
                    format!(
                        "Введите реферальный код для бота (или нажмите «Пропустить»):\n\nТокен: {}\nШаблон ID: {id}",
                        mask_token(token)
                    ),
                    Keyboard::SkipRefCode,
                )],
            )
        }
        None => {
            next.current_step = Step::SelectingTemplate;
            Transition::persist(
                next,
                vec![Reply::with_keyboard(MSG_CHOOSE_TEMPLATE, Keyboard::Templates)],
            )
        }
    }
}

fn select_template(state: &ConversationState, template_id: i64) -> Transition {
    let token = match &state.flow {
        FlowData::BotDraft {
            bot_token: Some(token),
            ..
        } => token.clone(),
        _ => {
            // Callback пришел без начатого черновика — токен утерян
            return Transition::clear(vec![
                Reply::text("❌ Не найден токен бота. Начните процесс заново."),
                Reply::with_keyboard(MSG_MENU, Keyboard::OwnerPanel),
            ]);
        }
    };

    let mut next = state.clone();
    next.current_step = Step::AwaitingRefCode;
    next.flow = FlowData::BotDraft {
        bot_token: Some(token.clone()),
        template_id: Some(template_id),
        ref_code: None,
    };
    Transition::persist(
        next,
        vec![Reply::with_keyboard(
            format!(
                "Введите реферальный код для бота (или нажмите «Пропустить»):\n\nТокен: {}\nШаблон ID: {template_id}",
                mask_token(&token)
            ),
            Keyboard::SkipRefCode,
        )],
    )
}

fn finish_bot_draft(state: &ConversationState, explicit_code: Option<String>) -> Transition {
    let (token, template_id) = match &state.flow {
        FlowData::BotDraft {
            bot_token: Some(token),
            template_id: Some(template_id),
            ..
        } => (token.clone(), *template_id),
        _ => {
            return Transition::clear(vec![
                Reply::text(MSG_DRAFT_LOST),
                Reply::with_keyboard(MSG_MENU, Keyboard::OwnerPanel),
            ]);
        }
    };

    let ref_code = explicit_code.unwrap_or_else(refcode::generate);

    let mut t = Transition::clear(vec![
        Reply::text(format!(
            "✅ Бот успешно создан!\n\nТокен: {}\nШаблон ID: {template_id}\nРеферальный код: {ref_code}",
            mask_token(&token)
        )),
        Reply::with_keyboard(MSG_MENU, Keyboard::OwnerPanel),
    ]);
    t.directives = vec![
        Directive::ProvisionBot {
            token: token.clone(),
            template_id,
            ref_code,
        },
        Directive::RegisterWebhook {
            token: token.clone(),
        },
        Directive::StartWorker { token, template_id },
    ];
    t
}

fn on_template_name(state: &ConversationState, text: &str) -> Transition {
    let name = text.trim();
    if name.is_empty() {
        return Transition::persist(
            state.clone(),
            vec![Reply::with_keyboard(
                "❌ Название не может быть пустым. Введите название шаблона:",
                Keyboard::Cancel,
            )],
        );
    }

    let mut next = state.clone();
    next.current_step = Step::AwaitingTemplateContent;
    next.flow = FlowData::TemplateDraft {
        name: Some(name.to_string()),
        content: None,
        keyboard: None,
    };
    Transition::persist(
        next,
        vec![Reply::with_keyboard(MSG_ENTER_TEMPLATE_CONTENT, Keyboard::Cancel)],
    )
}

fn on_template_content(state: &ConversationState, text: &str) -> Transition {
    let content = text.trim();
    if content.is_empty() {
        return Transition::persist(
            state.clone(),
            vec![Reply::with_keyboard(
                "❌ Содержание не может быть пустым. Введите содержание шаблона:",
                Keyboard::Cancel,
            )],
        );
    }

    let name = match &state.flow {
        FlowData::TemplateDraft { name: Some(name), .. } => name.clone(),
        _ => {
            return Transition::clear(vec![
                Reply::text(MSG_DRAFT_LOST),
                Reply::with_keyboard(MSG_MENU, Keyboard::OwnerPanel),
            ]);
        }
    };

    let mut next = state.clone();
    next.current_step = Step::AwaitingTemplateKeyboard;
    next.flow = FlowData::TemplateDraft {
        name: Some(name),
        content: Some(content.to_string()),
        keyboard: None,
    };
    Transition::persist(
        next,
        vec![Reply::with_keyboard(MSG_ENTER_TEMPLATE_KEYBOARD, Keyboard::Cancel)],
    )
}

fn on_template_keyboard(state: &ConversationState, text: &str) -> Transition {
    let rows = match keyboard::parse(text) {
        Ok(rows) => rows,
        Err(e) => {
            return Transition::persist(
                state.clone(),
                vec![Reply::with_keyboard(
                    format!("❌ {e}\n\n{}", keyboard::FORMAT_EXAMPLE),
                    Keyboard::Cancel,
                )],
            );
        }
    };

    let (name, content) = match &state.flow {
        FlowData::TemplateDraft {
            name: Some(name),
            content: Some(content),
            ..
        } => (name.clone(), content.clone()),
        _ => {
            return Transition::clear(vec![
                Reply::text(MSG_DRAFT_LOST),
                Reply::with_keyboard(MSG_MENU, Keyboard::OwnerPanel),
            ]);
        }
    };

    let mut t = Transition::clear(vec![
        Reply::text("✅ Шаблон успешно создан!"),
        Reply::with_keyboard(MSG_MENU, Keyboard::OwnerPanel),
    ]);
    t.directives = vec![Directive::SaveTemplate {
        name,
        content,
        keyboard: rows,
    }];
    t
}

fn on_phone(state: &ConversationState, text: &str) -> Transition {
    let phone = text.trim();
    if !is_valid_phone(phone) {
        return Transition::persist(
            state.clone(),
            vec![Reply::with_keyboard(MSG_BAD_PHONE, Keyboard::Cancel)],
        );
    }

    let mut next = state.clone();
    next.current_step = Step::WaitingCode;
    // code_hash появится после успешного send-code (роутер)
    next.flow = FlowData::Auth {
        phone: Some(phone.to_string()),
        code_hash: None,
    };

    let mut t = Transition::persist(next, vec![Reply::text(MSG_PHONE_ACCEPTED)]);
    t.auth_call = Some(AuthCall::SendCode {
        phone: phone.to_string(),
    });
    t
}

fn on_code(state: &ConversationState, text: &str) -> Transition {
    let (phone, code_hash) = match &state.flow {
        FlowData::Auth {
            phone: Some(phone),
            code_hash: Some(code_hash),
        } => (phone.clone(), code_hash.clone()),
        _ => {
            // Хэш кода утерян (например, рестарт между шагами) — назад к телефону
            let mut next = state.clone();
            next.current_step = Step::WaitingPhone;
            next.flow = FlowData::Auth {
                phone: None,
                code_hash: None,
            };
            return Transition::persist(
                next,
                vec![Reply::with_keyboard(
                    format!("❌ Сессия подтверждения потеряна. {MSG_ENTER_PHONE}"),
                    Keyboard::Cancel,
                )],
            );
        }
    };

    let mut next = state.clone();
    next.current_step = Step::Authenticated;
    next.flow = FlowData::None;

    let mut t = Transition::persist(next, vec![Reply::text(MSG_AUTH_DONE)]);
    t.auth_call = Some(AuthCall::VerifyCode {
        phone,
        code: text.trim().to_string(),
        code_hash,
    });
    t
}
