use axum::extract::{Path, Query};
use axum::http::HeaderMap;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::{ensure_admin, verify_principal};
use crate::err::Error;
use crate::logs::record_event;
use crate::models::{PrincipalKind, PrincipalSummary, PrincipalView};
use crate::principals::{self, CreatePrincipal, UpdatePrincipal};
use crate::{creates, proceeds, Payload, SearchParams};

const KIND: PrincipalKind = PrincipalKind::Instructor;

pub async fn login(
    Extension(pg): Extension<PgPool>,
    Json(login): Json<InstructorLogin>,
) -> Payload<LoggedInInstructor> {
    let instructor = verify_principal(KIND, &login.instructor_id, &login.password, &pg).await?;
    record_event(&instructor, KIND, "login", &pg).await?;

    proceeds(LoggedInInstructor {
        instructor: instructor.into(),
    })
}

pub async fn logout(
    Extension(pg): Extension<PgPool>,
    Json(logout): Json<InstructorLogout>,
) -> Payload<LoggedOut> {
    let instructor = principals::find_by_id_number(KIND, &logout.instructor_id, &pg)
        .await?
        .ok_or_else(|| {
            Error::not_found(format!(
                "Instructor `{}` does not exist",
                logout.instructor_id
            ))
        })?;
    record_event(&instructor, KIND, "logout", &pg).await?;

    proceeds(LoggedOut {
        message: "Logged out successfully".to_string(),
    })
}

pub async fn create(
    headers: HeaderMap,
    Extension(pg): Extension<PgPool>,
    Json(body): Json<CreatePrincipal>,
) -> Payload<CreatedInstructor> {
    ensure_admin(&headers, &pg).await?;
    let instructor = principals::create(KIND, body, &pg).await?;

    creates(CreatedInstructor { instructor })
}

pub async fn search(
    headers: HeaderMap,
    Query(params): Query<SearchParams>,
    Extension(pg): Extension<PgPool>,
) -> Payload<InstructorList> {
    ensure_admin(&headers, &pg).await?;
    let instructors =
        principals::search(KIND, params.search.as_deref().unwrap_or(""), &pg).await?;

    proceeds(InstructorList { instructors })
}

pub async fn list(
    headers: HeaderMap,
    Extension(pg): Extension<PgPool>,
) -> Payload<InstructorList> {
    ensure_admin(&headers, &pg).await?;
    let instructors = principals::list(KIND, &pg).await?;

    proceeds(InstructorList { instructors })
}

pub async fn get(
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Extension(pg): Extension<PgPool>,
) -> Payload<InstructorBody> {
    ensure_admin(&headers, &pg).await?;
    let instructor = principals::find(KIND, id, &pg).await?;

    proceeds(InstructorBody {
        instructor: instructor.into(),
    })
}

pub async fn update(
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Extension(pg): Extension<PgPool>,
    Json(body): Json<UpdatePrincipal>,
) -> Payload<InstructorBody> {
    ensure_admin(&headers, &pg).await?;
    let instructor = principals::update(KIND, id, body, &pg).await?;

    proceeds(InstructorBody { instructor })
}

pub async fn delete(
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Extension(pg): Extension<PgPool>,
) -> Payload<InstructorDeleted> {
    ensure_admin(&headers, &pg).await?;
    principals::delete(KIND, id, &pg).await?;

    proceeds(InstructorDeleted {
        message: "Instructor deleted successfully".to_string(),
    })
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstructorLogin {
    pub instructor_id: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstructorLogout {
    pub instructor_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoggedInInstructor {
    pub instructor: PrincipalSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoggedOut {
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatedInstructor {
    pub instructor: PrincipalView,
}

#[derive(Debug, Clone, Serialize)]
pub struct InstructorBody {
    pub instructor: PrincipalView,
}

#[derive(Debug, Clone, Serialize)]
pub struct InstructorList {
    pub instructors: Vec<PrincipalView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InstructorDeleted {
    pub message: String,
}
