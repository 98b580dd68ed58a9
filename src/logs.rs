use axum::http::HeaderMap;
use axum::Extension;
use chrono::Utc;
use serde::Serialize;
use sqlx::PgPool;

use crate::auth::ensure_admin;
use crate::err::Error;
use crate::models::{PrincipalData, PrincipalKind, UserLogData};
use crate::{proceeds, Payload};

/// Appends one login/logout event. Logs are write-once: nothing in the
/// crate updates or deletes `user_logs` rows.
pub async fn record_event(
    principal: &PrincipalData,
    kind: PrincipalKind,
    action: &str,
    pg: &PgPool,
) -> Result<(), Error> {
    sqlx::query(
        "INSERT INTO user_logs (user_id, user_type, full_name, id_number, action, created_at)
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(principal.uuid)
    .bind(kind.as_str())
    .bind(&principal.full_name)
    .bind(&principal.id_number)
    .bind(action)
    .bind(Utc::now())
    .execute(pg)
    .await?;
    Ok(())
}

pub async fn list_logs(
    headers: HeaderMap,
    Extension(pg): Extension<PgPool>,
) -> Payload<LogList> {
    ensure_admin(&headers, &pg).await?;

    let logs =
        sqlx::query_as::<_, UserLogData>("SELECT * FROM user_logs ORDER BY created_at DESC")
            .fetch_all(&pg)
            .await?;

    proceeds(LogList { logs })
}

#[derive(Debug, Clone, Serialize)]
pub struct LogList {
    pub logs: Vec<UserLogData>,
}
