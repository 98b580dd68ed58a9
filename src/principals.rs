//! Credential store: creation, lookup, update and deletion of stored
//! principals. Students and instructors share one column set, so the
//! endpoint families in `students` and `instructors` delegate here with a
//! [`PrincipalKind`] tag.

use chrono::Utc;
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::hash_secret;
use crate::db::is_unique_violation;
use crate::err::Error;
use crate::models::{PrincipalData, PrincipalKind, PrincipalView};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePrincipal {
    pub id_number: String,
    pub full_name: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePrincipal {
    pub id_number: String,
    pub full_name: String,
}

fn duplicate_id(kind: PrincipalKind, id_number: &str) -> Error {
    Error::DuplicateId {
        message: format!("{} id `{}` already exists", kind.as_str(), id_number),
    }
}

pub async fn create(
    kind: PrincipalKind,
    body: CreatePrincipal,
    pg: &PgPool,
) -> Result<PrincipalView, Error> {
    if body.id_number.is_empty() || body.full_name.is_empty() || body.password.is_empty() {
        return Err(Error::invalid(
            "idNumber, fullName and password must not be empty",
        ));
    }

    let principal = PrincipalData {
        uuid: Uuid::new_v4(),
        id_number: body.id_number,
        full_name: body.full_name,
        password_hash: hash_secret(&body.password)?,
        created_at: Utc::now(),
    };

    // The UNIQUE constraint is the authority on duplicates; racing creates
    // leave exactly one row and no partial state.
    let query = format!("INSERT INTO {} VALUES ($1, $2, $3, $4, $5)", kind.table());
    sqlx::query(&query)
        .bind(principal.uuid)
        .bind(&principal.id_number)
        .bind(&principal.full_name)
        .bind(&principal.password_hash)
        .bind(principal.created_at)
        .execute(pg)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                duplicate_id(kind, &principal.id_number)
            } else {
                Error::from(err)
            }
        })?;

    Ok(principal.into())
}

pub async fn find(kind: PrincipalKind, id: Uuid, pg: &PgPool) -> Result<PrincipalData, Error> {
    let query = format!("SELECT * FROM {} WHERE uuid = $1 LIMIT 1", kind.table());
    sqlx::query_as::<_, PrincipalData>(&query)
        .bind(id)
        .fetch_optional(pg)
        .await?
        .ok_or_else(|| Error::not_found(format!("{} `{}` does not exist", kind.as_str(), id)))
}

pub async fn find_by_id_number(
    kind: PrincipalKind,
    id_number: &str,
    pg: &PgPool,
) -> Result<Option<PrincipalData>, Error> {
    let query = format!(
        "SELECT * FROM {} WHERE id_number = $1 LIMIT 1",
        kind.table()
    );
    let row = sqlx::query_as::<_, PrincipalData>(&query)
        .bind(id_number)
        .fetch_optional(pg)
        .await?;
    Ok(row)
}

pub async fn update(
    kind: PrincipalKind,
    id: Uuid,
    body: UpdatePrincipal,
    pg: &PgPool,
) -> Result<PrincipalView, Error> {
    if body.id_number.is_empty() || body.full_name.is_empty() {
        return Err(Error::invalid("idNumber and fullName must not be empty"));
    }

    let existing = find(kind, id, pg).await?;
    if body.id_number != existing.id_number {
        if let Some(taken) = find_by_id_number(kind, &body.id_number, pg).await? {
            if taken.uuid != id {
                return Err(duplicate_id(kind, &body.id_number));
            }
        }
    }

    let query = format!(
        "UPDATE {} SET id_number = $1, full_name = $2 WHERE uuid = $3",
        kind.table()
    );
    sqlx::query(&query)
        .bind(&body.id_number)
        .bind(&body.full_name)
        .bind(id)
        .execute(pg)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                duplicate_id(kind, &body.id_number)
            } else {
                Error::from(err)
            }
        })?;

    Ok(PrincipalView {
        id,
        id_number: body.id_number,
        full_name: body.full_name,
        created_at: existing.created_at,
    })
}

/// Deletes the principal row; roster entries and attendance records for a
/// student go with it through the schema's cascades. User logs are kept as
/// history.
pub async fn delete(kind: PrincipalKind, id: Uuid, pg: &PgPool) -> Result<(), Error> {
    let query = format!("DELETE FROM {} WHERE uuid = $1", kind.table());
    let affected = sqlx::query(&query).bind(id).execute(pg).await?;
    if affected.rows_affected() < 1 {
        return Err(Error::not_found(format!(
            "{} `{}` does not exist",
            kind.as_str(),
            id
        )));
    }
    Ok(())
}

pub async fn list(kind: PrincipalKind, pg: &PgPool) -> Result<Vec<PrincipalView>, Error> {
    let query = format!("SELECT * FROM {} ORDER BY full_name", kind.table());
    let rows = sqlx::query_as::<_, PrincipalData>(&query)
        .fetch_all(pg)
        .await?;
    Ok(rows.into_iter().map(PrincipalView::from).collect())
}

/// Case-insensitive substring match over name and id number. No ranking.
pub async fn search(
    kind: PrincipalKind,
    term: &str,
    pg: &PgPool,
) -> Result<Vec<PrincipalView>, Error> {
    let query = format!(
        "SELECT * FROM {} WHERE full_name ILIKE $1 OR id_number ILIKE $1 ORDER BY full_name",
        kind.table()
    );
    let rows = sqlx::query_as::<_, PrincipalData>(&query)
        .bind(contains_pattern(term))
        .fetch_all(pg)
        .await?;
    Ok(rows.into_iter().map(PrincipalView::from).collect())
}

fn contains_pattern(term: &str) -> String {
    // % and _ are LIKE metacharacters; a search for a literal "10%" should
    // not match everything starting with "10".
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_wraps_term_in_wildcards() {
        assert_eq!(contains_pattern("ann"), "%ann%");
        assert_eq!(contains_pattern(""), "%%");
    }

    #[test]
    fn pattern_escapes_like_metacharacters() {
        assert_eq!(contains_pattern("10%"), "%10\\%%");
        assert_eq!(contains_pattern("a_b"), "%a\\_b%");
        assert_eq!(contains_pattern("a\\b"), "%a\\\\b%");
    }
}
