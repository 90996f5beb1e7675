//! MTProto auth client wrapper around grammers.
//!
//! Implements the `AuthClient` boundary: request a login code for a phone
//! number, then confirm it. grammers hands back a `LoginToken` that must be
//! presented on confirmation; webhook deliveries are stateless, so pending
//! tokens are parked in an in-process map keyed by an opaque hash that
//! travels through the conversation state instead.

use std::path::Path;

use async_trait::async_trait;
use base64::Engine as _;
use dashmap::DashMap;
use grammers_client::types::LoginToken;
use grammers_client::{Client, Config, InitParams};
use grammers_session::Session;
use secrecy::SecretString;

use fabcore::error::{AppError, AppResult};
use fabcore::AuthClient;

pub struct MtProtoAuthClient {
    client: Client,
    pending: DashMap<String, LoginToken>,
}

impl MtProtoAuthClient {
    /// Подключается к Telegram и загружает (или создает) файл сессии
    pub async fn connect(api_id: i32, api_hash: &str, session_path: &Path) -> anyhow::Result<Self> {
        log::info!("Initializing MTProto client...");

        let session = if session_path.exists() {
            Session::load_file(session_path)
                .map_err(|e| anyhow::anyhow!("Failed to load MTProto session: {}", e))?
        } else {
            Session::new()
        };

        let config = Config {
            session,
            api_id,
            api_hash: api_hash.to_string(),
            params: InitParams {
                device_model: "Fabrika Platform".to_string(),
                system_version: "1.0".to_string(),
                app_version: env!("CARGO_PKG_VERSION").to_string(),
                system_lang_code: "ru".to_string(),
                lang_code: "ru".to_string(),
                ..Default::default()
            },
        };

        let client = Client::connect(config)
            .await
            .map_err(|e| anyhow::anyhow!("MTProto connect failed: {}", e))?;
        log::info!("MTProto client connected");

        Ok(Self {
            client,
            pending: DashMap::new(),
        })
    }
}

#[async_trait]
impl AuthClient for MtProtoAuthClient {
    async fn send_code(&self, phone: &str) -> AppResult<String> {
        let token = self
            .client
            .request_login_code(phone)
            .await
            .map_err(|e| AppError::ExternalProtocol(format!("send code failed: {e}")))?;

        let code_hash = uuid::Uuid::new_v4().to_string();
        self.pending.insert(code_hash.clone(), token);
        Ok(code_hash)
    }

    async fn verify_code(
        &self,
        _phone: &str,
        code: &str,
        code_hash: &str,
    ) -> AppResult<SecretString> {
        // Токен одноразовый: неверный код требует нового send_code
        let (_, token) = self.pending.remove(code_hash).ok_or_else(|| {
            AppError::ExternalProtocol("код устарел, запросите новый".to_string())
        })?;

        self.client
            .sign_in(&token, code)
            .await
            .map_err(|e| AppError::ExternalProtocol(format!("sign in failed: {e}")))?;

        let bytes = self.client.session().save();
        Ok(SecretString::from(
            base64::engine::general_purpose::STANDARD.encode(bytes),
        ))
    }
}

/// Заглушка на случай, когда MTProto не сконфигурирован: авторизация
/// отвечает понятной ошибкой вместо паники при старте.
pub struct DisabledAuthClient;

#[async_trait]
impl AuthClient for DisabledAuthClient {
    async fn send_code(&self, _phone: &str) -> AppResult<String> {
        Err(AppError::ExternalProtocol(
            "авторизация не настроена (MTPROTO_API_ID)".to_string(),
        ))
    }

    async fn verify_code(
        &self,
        _phone: &str,
        _code: &str,
        _code_hash: &str,
    ) -> AppResult<SecretString> {
        Err(AppError::ExternalProtocol(
            "авторизация не настроена (MTPROTO_API_ID)".to_string(),
        ))
    }
}
