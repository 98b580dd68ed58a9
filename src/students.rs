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

const KIND: PrincipalKind = PrincipalKind::Student;

pub async fn login(
    Extension(pg): Extension<PgPool>,
    Json(login): Json<StudentLogin>,
) -> Payload<LoggedInStudent> {
    let student = verify_principal(KIND, &login.student_id, &login.password, &pg).await?;
    record_event(&student, KIND, "login", &pg).await?;

    proceeds(LoggedInStudent {
        student: student.into(),
    })
}

pub async fn logout(
    Extension(pg): Extension<PgPool>,
    Json(logout): Json<StudentLogout>,
) -> Payload<LoggedOut> {
    let student = principals::find_by_id_number(KIND, &logout.student_id, &pg)
        .await?
        .ok_or_else(|| {
            Error::not_found(format!("Student `{}` does not exist", logout.student_id))
        })?;
    record_event(&student, KIND, "logout", &pg).await?;

    proceeds(LoggedOut {
        message: "Logged out successfully".to_string(),
    })
}

pub async fn create(
    headers: HeaderMap,
    Extension(pg): Extension<PgPool>,
    Json(body): Json<CreatePrincipal>,
) -> Payload<CreatedStudent> {
    ensure_admin(&headers, &pg).await?;
    let student = principals::create(KIND, body, &pg).await?;

    creates(CreatedStudent { student })
}

pub async fn search(
    headers: HeaderMap,
    Query(params): Query<SearchParams>,
    Extension(pg): Extension<PgPool>,
) -> Payload<StudentList> {
    ensure_admin(&headers, &pg).await?;
    let students = principals::search(KIND, params.search.as_deref().unwrap_or(""), &pg).await?;

    proceeds(StudentList { students })
}

pub async fn list(headers: HeaderMap, Extension(pg): Extension<PgPool>) -> Payload<StudentList> {
    ensure_admin(&headers, &pg).await?;
    let students = principals::list(KIND, &pg).await?;

    proceeds(StudentList { students })
}

pub async fn get(
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Extension(pg): Extension<PgPool>,
) -> Payload<StudentBody> {
    ensure_admin(&headers, &pg).await?;
    let student = principals::find(KIND, id, &pg).await?;

    proceeds(StudentBody {
        student: student.into(),
    })
}

pub async fn update(
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Extension(pg): Extension<PgPool>,
    Json(body): Json<UpdatePrincipal>,
) -> Payload<StudentBody> {
    ensure_admin(&headers, &pg).await?;
    let student = principals::update(KIND, id, body, &pg).await?;

    proceeds(StudentBody { student })
}

pub async fn delete(
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Extension(pg): Extension<PgPool>,
) -> Payload<StudentDeleted> {
    ensure_admin(&headers, &pg).await?;
    principals::delete(KIND, id, &pg).await?;

    proceeds(StudentDeleted {
        message: "Student deleted successfully".to_string(),
    })
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentLogin {
    pub student_id: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentLogout {
    pub student_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoggedInStudent {
    pub student: PrincipalSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoggedOut {
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatedStudent {
    pub student: PrincipalView,
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentBody {
    pub student: PrincipalView,
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentList {
    pub students: Vec<PrincipalView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentDeleted {
    pub message: String,
}
