use std::ops::Add;

use axum::http::HeaderMap;
use axum::{Extension, Json};
use chrono::{DateTime, Duration, Utc};
use pbkdf2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use pbkdf2::Pbkdf2;
use rand::{thread_rng, Rng};
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::PgPool;

use crate::config::CONFIG;
use crate::err::Error;
use crate::models::{AdminSession, PrincipalData, PrincipalKind};
use crate::{proceeds, Payload};

pub const ADMIN_TOKEN_HEADER: &str = "admin-token";

/// Salted PHC-format pbkdf2 hash. Two hashes of the same secret differ.
pub fn hash_secret(secret: &str) -> Result<String, Error> {
    let hash = Pbkdf2
        .hash_password(secret.as_bytes(), &SaltString::generate(&mut OsRng))?
        .to_string();
    Ok(hash)
}

/// Constant-time comparison through the PHC verifier; never a string
/// equality on the secret itself.
pub fn verify_secret(stored_hash: &str, secret: &str) -> Result<bool, Error> {
    let hash = PasswordHash::new(stored_hash)?;
    Ok(Pbkdf2.verify_password(secret.as_bytes(), &hash).is_ok())
}

/// Looks a principal up by external id and checks the password. Unknown id
/// and wrong password return the same error, so the endpoint cannot be used
/// to enumerate ids.
pub async fn verify_principal(
    kind: PrincipalKind,
    id_number: &str,
    password: &str,
    pg: &PgPool,
) -> Result<PrincipalData, Error> {
    if id_number.is_empty() || password.is_empty() {
        return Err(Error::invalid("id and password must not be empty"));
    }

    let query = format!(
        "SELECT * FROM {} WHERE id_number = $1 LIMIT 1",
        kind.table()
    );
    let principal = sqlx::query_as::<_, PrincipalData>(&query)
        .bind(id_number)
        .fetch_optional(pg)
        .await?;

    let principal = match principal {
        Some(p) => p,
        None => return Err(Error::bad_credentials()),
    };

    if !verify_secret(&principal.password_hash, password)? {
        return Err(Error::bad_credentials());
    }
    Ok(principal)
}

fn generate_token() -> String {
    let bytes: [u8; 32] = thread_rng().gen();
    let mut hasher: Sha256 = Digest::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Request-level gate for administrative operations. Fails closed when the
/// token header is absent, unknown, or expired; expired rows are dropped on
/// the way out.
pub async fn ensure_admin(headers: &HeaderMap, pg: &PgPool) -> Result<(), Error> {
    let token = headers
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if token.is_empty() {
        return Err(Error::unauthorized());
    }

    let session =
        sqlx::query_as::<_, AdminSession>("SELECT * FROM admin_sessions WHERE ssid = $1 LIMIT 1")
            .bind(token)
            .fetch_optional(pg)
            .await?;

    match session {
        Some(session) if Utc::now().gt(&session.expires_at) => {
            sqlx::query("DELETE FROM admin_sessions WHERE ssid = $1")
                .bind(token)
                .execute(pg)
                .await?;
            Err(Error::unauthorized())
        }
        Some(_) => Ok(()),
        None => Err(Error::unauthorized()),
    }
}

pub async fn admin_login(
    Extension(pg): Extension<PgPool>,
    Json(login): Json<AdminLogin>,
) -> Payload<AdminSessionIssued> {
    if login.admin_id != CONFIG.admin_id
        || !verify_secret(&CONFIG.admin_password_hash, &login.password)?
    {
        return Err(Error::bad_credentials());
    }

    let token = generate_token();
    let expires_at = Utc::now().add(Duration::hours(CONFIG.admin_session_hours));
    sqlx::query("INSERT INTO admin_sessions VALUES ($1, $2)")
        .bind(&token)
        .bind(expires_at)
        .execute(&pg)
        .await?;

    log::info!("Admin session issued, expires at {}", expires_at);
    proceeds(AdminSessionIssued { token, expires_at })
}

pub async fn admin_logout(
    Extension(pg): Extension<PgPool>,
    Json(logout): Json<AdminLogout>,
) -> Payload<AdminSessionDropped> {
    let affected = sqlx::query("DELETE FROM admin_sessions WHERE ssid = $1")
        .bind(&logout.token)
        .execute(&pg)
        .await?;

    proceeds(AdminSessionDropped {
        dropped: affected.rows_affected() >= 1,
    })
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminLogin {
    pub admin_id: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdminLogout {
    pub token: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminSessionIssued {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdminSessionDropped {
    pub dropped: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify_round_trip() {
        let hash = hash_secret("pw").unwrap();
        assert!(verify_secret(&hash, "pw").unwrap());
        assert!(!verify_secret(&hash, "bad").unwrap());
    }

    #[test]
    fn hashes_are_salted() {
        let a = hash_secret("pw").unwrap();
        let b = hash_secret("pw").unwrap();
        assert_ne!(a, b);
        assert!(verify_secret(&a, "pw").unwrap());
        assert!(verify_secret(&b, "pw").unwrap());
    }

    #[test]
    fn stored_hash_is_not_plaintext() {
        let hash = hash_secret("hunter2").unwrap();
        assert!(!hash.contains("hunter2"));
        assert!(hash.starts_with("$pbkdf2"));
    }

    #[test]
    fn tokens_are_sha256_hex() {
        let token = generate_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, generate_token());
    }
}
