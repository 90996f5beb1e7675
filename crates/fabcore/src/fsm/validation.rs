//! Input grammar validation for conversation flows
//!
//! Provides the canonical checks for owner- and user-supplied inputs:
//! - Bot token grammar (two colon-separated parts, numeric prefix)
//! - Phone number grammar for the auth flow
//! - Token masking for logs and user-facing messages

use lazy_regex::regex_is_match;

/// Проверяет формат токена бота: `1234567890:ABCdefghijk_Lmnopqrstuvwxyz`.
///
/// The token must split into exactly two colon-separated parts; the first
/// part is entirely numeric, the second is at least 10 characters of
/// `[A-Za-z0-9_-]`.
pub fn is_valid_bot_token(token: &str) -> bool {
    regex_is_match!(r"^\d+:[A-Za-z0-9_-]{10,}$", token)
}

/// Проверяет формат номера телефона: `+71234567890`
pub fn is_valid_phone(phone: &str) -> bool {
    regex_is_match!(r"^\+\d{10,15}$", phone)
}

/// Маскирует токен для логов и сообщений: числовой префикс, `****` и
/// последние 4 символа. Целиком токен не показывается никогда.
pub fn mask_token(token: &str) -> String {
    let Some((id, secret)) = token.split_once(':') else {
        return "invalid_token".to_string();
    };
    if secret.len() < 4 || !secret.is_ascii() {
        return "invalid_token".to_string();
    }
    format!("{}:****{}", id, &secret[secret.len() - 4..])
}
