//! Auth sessions: the long-lived credential minted after phone-code
//! verification completes.
//!
//! A session is immutable after creation and replaced wholesale on re-auth.
//! Expiry is enforced twice: the store sets a TTL of `expires_at - now` at
//! write time, and every read re-checks the wall clock so a stale read can
//! never hand back a usable credential.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, Serializer};
use std::time::Duration;

use crate::error::{AppError, AppResult};

/// Сессия внешнего протокола авторизации для одного пользователя
#[derive(Clone, Deserialize)]
pub struct AuthSession {
    pub id: String,
    /// Opaque serialized credential, owned exclusively by this record.
    /// Kept behind `SecretString` so it never ends up in Debug output.
    credential: SecretString,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

// Serialize is manual: the only place a credential legitimately leaves the
// process is the session store payload.
impl Serialize for AuthSession {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("AuthSession", 4)?;
        s.serialize_field("id", &self.id)?;
        s.serialize_field("credential", self.credential.expose_secret())?;
        s.serialize_field("created_at", &self.created_at)?;
        s.serialize_field("expires_at", &self.expires_at)?;
        s.end()
    }
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("id", &self.id)
            .field("credential", &"[REDACTED]")
            .field("created_at", &self.created_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl AuthSession {
    /// Создает новую сессию со случайным id и заданным временем жизни
    pub fn new(credential: SecretString, ttl: Duration) -> AppResult<Self> {
        let now = Utc::now();
        let ttl = ChronoDuration::from_std(ttl)
            .map_err(|e| AppError::Validation(format!("invalid session ttl: {e}")))?;
        if ttl <= ChronoDuration::zero() {
            return Err(AppError::SessionExpired);
        }
        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            credential,
            created_at: now,
            expires_at: now + ttl,
        })
    }

    /// Сессия пригодна только пока `now < expires_at`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Remaining lifetime at `now`, or `None` once expired.
    /// The store uses this as the record TTL and must reject `None`.
    pub fn remaining_ttl(&self, now: DateTime<Utc>) -> Option<Duration> {
        (self.expires_at - now).to_std().ok().filter(|d| !d.is_zero())
    }

    pub fn credential(&self) -> &SecretString {
        &self.credential
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn session(ttl_secs: u64) -> AuthSession {
        AuthSession::new(SecretString::from("mtproto-blob"), Duration::from_secs(ttl_secs)).unwrap()
    }

    #[test]
    fn test_new_session_expires_after_created() {
        let s = session(3600);
        assert!(s.expires_at > s.created_at);
        assert!(!s.is_expired(Utc::now()));
    }

    #[test]
    fn test_expired_session_fails_closed() {
        let s = session(3600);
        let later = s.expires_at + ChronoDuration::seconds(1);
        assert!(s.is_expired(later));
        assert_eq!(s.remaining_ttl(later), None);
        // boundary: exactly at expires_at the session is already unusable
        assert!(s.is_expired(s.expires_at));
    }

    #[test]
    fn test_remaining_ttl_shrinks_with_time() {
        let s = session(3600);
        let half = s.created_at + ChronoDuration::seconds(1800);
        let remaining = s.remaining_ttl(half).unwrap();
        assert_eq!(remaining, Duration::from_secs(1800));
    }

    #[test]
    fn test_credential_survives_round_trip_but_not_debug() {
        let s = session(60);
        let json = serde_json::to_string(&s).unwrap();
        assert!(json.contains("mtproto-blob"));

        let back: AuthSession = serde_json::from_str(&json).unwrap();
        assert_eq!(back.credential().expose_secret(), "mtproto-blob");
        assert_eq!(back.id, s.id);

        let debug = format!("{s:?}");
        assert!(!debug.contains("mtproto-blob"));
        assert!(debug.contains("[REDACTED]"));
    }
}
