//! Course and enrollment registry: course CRUD, the per-course roster, and
//! self-enrollment verification codes.

use axum::extract::Path;
use axum::http::HeaderMap;
use axum::{Extension, Json};
use chrono::Utc;
use rand::{thread_rng, Rng};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::ensure_admin;
use crate::db::is_unique_violation;
use crate::err::Error;
use crate::models::{CourseData, CourseView, PrincipalKind, PrincipalView};
use crate::principals;
use crate::{creates, proceeds, Payload};

const CODE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const CODE_LEN: usize = 6;

/// Shared secret for self-service enrollment, shown to the instructor and
/// read back from scanned QR payloads.
fn generate_verification_code() -> String {
    let mut rng = thread_rng();
    (0..CODE_LEN)
        .map(|_| CODE_CHARSET[rng.gen_range(0..CODE_CHARSET.len())] as char)
        .collect()
}

fn duplicate_code(code: &str) -> Error {
    Error::DuplicateCode {
        message: format!("Course code `{}` is already taken", code),
    }
}

async fn find_course(id: Uuid, pg: &PgPool) -> Result<CourseData, Error> {
    sqlx::query_as::<_, CourseData>("SELECT * FROM courses WHERE uuid = $1 LIMIT 1")
        .bind(id)
        .fetch_optional(pg)
        .await?
        .ok_or_else(|| Error::not_found(format!("Course `{}` does not exist", id)))
}

pub async fn create(
    Extension(pg): Extension<PgPool>,
    Json(body): Json<CreateCourse>,
) -> Payload<CourseBody> {
    if body.code.is_empty() || body.name.is_empty() {
        return Err(Error::invalid("code and name must not be empty"));
    }
    // NotFound beats DuplicateCode when both would apply
    principals::find(PrincipalKind::Instructor, body.instructor_id, &pg).await?;

    let course = CourseData {
        uuid: Uuid::new_v4(),
        code: body.code,
        name: body.name,
        instructor_id: body.instructor_id,
        verification_code: generate_verification_code(),
        created_at: Utc::now(),
    };

    sqlx::query("INSERT INTO courses VALUES ($1, $2, $3, $4, $5, $6)")
        .bind(course.uuid)
        .bind(&course.code)
        .bind(&course.name)
        .bind(course.instructor_id)
        .bind(&course.verification_code)
        .bind(course.created_at)
        .execute(&pg)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                duplicate_code(&course.code)
            } else {
                Error::from(err)
            }
        })?;

    creates(CourseBody { course })
}

pub async fn update(
    Path(id): Path<Uuid>,
    Extension(pg): Extension<PgPool>,
    Json(body): Json<UpdateCourse>,
) -> Payload<CourseBody> {
    if body.code.is_empty() || body.name.is_empty() {
        return Err(Error::invalid("code and name must not be empty"));
    }

    let mut course = find_course(id, &pg).await?;
    sqlx::query("UPDATE courses SET code = $1, name = $2 WHERE uuid = $3")
        .bind(&body.code)
        .bind(&body.name)
        .bind(id)
        .execute(&pg)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                duplicate_code(&body.code)
            } else {
                Error::from(err)
            }
        })?;

    course.code = body.code;
    course.name = body.name;
    proceeds(CourseBody { course })
}

/// Deletes the course; roster entries, sessions and attendance records go
/// with it through the schema's cascades.
pub async fn delete(Path(id): Path<Uuid>, Extension(pg): Extension<PgPool>) -> Payload<Deleted> {
    let affected = sqlx::query("DELETE FROM courses WHERE uuid = $1")
        .bind(id)
        .execute(&pg)
        .await?;
    if affected.rows_affected() < 1 {
        return Err(Error::not_found(format!("Course `{}` does not exist", id)));
    }

    proceeds(Deleted {
        message: "Course deleted successfully".to_string(),
    })
}

pub async fn list(headers: HeaderMap, Extension(pg): Extension<PgPool>) -> Payload<CourseList> {
    ensure_admin(&headers, &pg).await?;
    let courses = sqlx::query_as::<_, CourseData>("SELECT * FROM courses ORDER BY code")
        .fetch_all(&pg)
        .await?;

    proceeds(CourseList { courses })
}

pub async fn instructor_courses(
    Path(instructor_id): Path<Uuid>,
    Extension(pg): Extension<PgPool>,
) -> Payload<CourseList> {
    principals::find(PrincipalKind::Instructor, instructor_id, &pg).await?;
    let courses = sqlx::query_as::<_, CourseData>(
        "SELECT * FROM courses WHERE instructor_id = $1 ORDER BY code",
    )
    .bind(instructor_id)
    .fetch_all(&pg)
    .await?;

    proceeds(CourseList { courses })
}

pub async fn enroll(
    Path(id): Path<Uuid>,
    Extension(pg): Extension<PgPool>,
    Json(body): Json<EnrollStudent>,
) -> Payload<Enrolled> {
    let course = find_course(id, &pg).await?;
    let student = principals::find_by_id_number(PrincipalKind::Student, &body.student_id, &pg)
        .await?
        .ok_or_else(|| {
            Error::not_found(format!("Student `{}` does not exist", body.student_id))
        })?;

    // Insert-if-absent on the composite key: two racing enrolls leave
    // exactly one roster row, and the loser sees zero rows affected.
    let affected = sqlx::query(
        "INSERT INTO course_roster VALUES ($1, $2, $3) ON CONFLICT DO NOTHING",
    )
    .bind(course.uuid)
    .bind(student.uuid)
    .bind(Utc::now())
    .execute(&pg)
    .await?;

    if affected.rows_affected() < 1 {
        return Err(Error::AlreadyEnrolled {
            message: format!(
                "Student `{}` is already enrolled in `{}`",
                student.id_number, course.code
            ),
        });
    }

    proceeds(Enrolled {
        course: course.into(),
    })
}

pub async fn verify_code(
    Path(id): Path<Uuid>,
    Extension(pg): Extension<PgPool>,
    Json(body): Json<VerifyCode>,
) -> Payload<CodeVerified> {
    let course = find_course(id, &pg).await?;

    proceeds(CodeVerified {
        valid: course.verification_code == body.code,
    })
}

/// Courses the student could still join: everything they are not on the
/// roster of yet.
pub async fn available_courses(
    Path(id_number): Path<String>,
    Extension(pg): Extension<PgPool>,
) -> Payload<CourseViewList> {
    let student = require_student(&id_number, &pg).await?;
    let courses = sqlx::query_as::<_, CourseData>(
        "SELECT * FROM courses WHERE uuid NOT IN
         (SELECT course_id FROM course_roster WHERE student_id = $1)
         ORDER BY code",
    )
    .bind(student.uuid)
    .fetch_all(&pg)
    .await?;

    proceeds(CourseViewList {
        courses: courses.into_iter().map(CourseView::from).collect(),
    })
}

pub async fn enrolled_courses(
    Path(id_number): Path<String>,
    Extension(pg): Extension<PgPool>,
) -> Payload<CourseViewList> {
    let student = require_student(&id_number, &pg).await?;
    let courses = sqlx::query_as::<_, CourseData>(
        "SELECT c.* FROM courses c
         JOIN course_roster r ON r.course_id = c.uuid
         WHERE r.student_id = $1
         ORDER BY c.code",
    )
    .bind(student.uuid)
    .fetch_all(&pg)
    .await?;

    proceeds(CourseViewList {
        courses: courses.into_iter().map(CourseView::from).collect(),
    })
}

pub async fn roster(Path(id): Path<Uuid>, Extension(pg): Extension<PgPool>) -> Payload<Roster> {
    find_course(id, &pg).await?;
    let students = sqlx::query_as::<_, crate::models::PrincipalData>(
        "SELECT s.* FROM students s
         JOIN course_roster r ON r.student_id = s.uuid
         WHERE r.course_id = $1
         ORDER BY s.full_name",
    )
    .bind(id)
    .fetch_all(&pg)
    .await?;

    proceeds(Roster {
        students: students.into_iter().map(PrincipalView::from).collect(),
    })
}

/// Removes a student from the roster along with their attendance records in
/// this course's sessions, in one transaction. Records key on the session,
/// so the roster cascade alone would leave them dangling.
pub async fn remove_student(
    Path((id, student_id)): Path<(Uuid, Uuid)>,
    Extension(pg): Extension<PgPool>,
) -> Payload<Deleted> {
    find_course(id, &pg).await?;

    let mut tx = pg.begin().await?;
    let affected = sqlx::query("DELETE FROM course_roster WHERE course_id = $1 AND student_id = $2")
        .bind(id)
        .bind(student_id)
        .execute(&mut tx)
        .await?;
    if affected.rows_affected() < 1 {
        return Err(Error::NotEnrolled {
            message: format!("Student `{}` is not enrolled in this course", student_id),
        });
    }
    sqlx::query(
        "DELETE FROM attendance_records WHERE student_id = $1 AND session_id IN
         (SELECT uuid FROM attendance_sessions WHERE course_id = $2)",
    )
    .bind(student_id)
    .bind(id)
    .execute(&mut tx)
    .await?;
    tx.commit().await?;

    proceeds(Deleted {
        message: "Student removed from course".to_string(),
    })
}

async fn require_student(
    id_number: &str,
    pg: &PgPool,
) -> Result<crate::models::PrincipalData, Error> {
    principals::find_by_id_number(PrincipalKind::Student, id_number, pg)
        .await?
        .ok_or_else(|| Error::not_found(format!("Student `{}` does not exist", id_number)))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCourse {
    pub code: String,
    pub name: String,
    pub instructor_id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateCourse {
    pub code: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollStudent {
    pub student_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerifyCode {
    pub code: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CourseBody {
    pub course: CourseData,
}

#[derive(Debug, Clone, Serialize)]
pub struct CourseList {
    pub courses: Vec<CourseData>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CourseViewList {
    pub courses: Vec<CourseView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Enrolled {
    pub course: CourseView,
}

#[derive(Debug, Clone, Serialize)]
pub struct CodeVerified {
    pub valid: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Roster {
    pub students: Vec<PrincipalView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Deleted {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verification_codes_use_fixed_charset() {
        for _ in 0..50 {
            let code = generate_verification_code();
            assert_eq!(code.len(), CODE_LEN);
            assert!(code.bytes().all(|b| CODE_CHARSET.contains(&b)));
        }
    }

    #[test]
    fn verification_codes_vary() {
        let codes: std::collections::HashSet<String> =
            (0..20).map(|_| generate_verification_code()).collect();
        assert!(codes.len() > 1);
    }
}
