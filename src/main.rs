pub mod attendance;
pub mod auth;
pub mod config;
pub mod courses;
pub mod db;
pub mod err;
pub mod instructors;
pub mod logs;
pub mod models;
pub mod principals;
pub mod students;

use std::net::SocketAddr;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Extension, Json, Router};
use serde::{Deserialize, Serialize};

use crate::config::CONFIG;
use crate::err::{Error, Success};

pub type Payload<T> = Result<Reply<T>, Error>;

/// Success envelope plus the status it ships with; handlers that create a
/// resource answer 201, everything else 200.
pub struct Reply<T>(StatusCode, Json<Success<T>>);

impl<T: Serialize> IntoResponse for Reply<T> {
    fn into_response(self) -> Response {
        (self.0, self.1).into_response()
    }
}

pub fn proceeds<V>(value: V) -> Payload<V>
where
    V: Serialize,
{
    Ok(Reply(StatusCode::OK, Json(Success::of(value))))
}

pub fn creates<V>(value: V) -> Payload<V>
where
    V: Serialize,
{
    Ok(Reply(StatusCode::CREATED, Json(Success::of(value))))
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchParams {
    pub search: Option<String>,
}

fn router() -> Router {
    Router::new()
        // admin
        .route("/admin/login", post(auth::admin_login))
        .route("/admin/logout", post(auth::admin_logout))
        .route("/logs", get(logs::list_logs))
        // students
        .route("/students/login", post(students::login))
        .route("/students/logout", post(students::logout))
        .route("/students/create", post(students::create))
        .route("/students/search", get(students::search))
        .route("/students", get(students::list))
        .route(
            "/students/:id",
            get(students::get)
                .put(students::update)
                .delete(students::delete),
        )
        .route(
            "/students/enrolled-courses/:id_number",
            get(courses::enrolled_courses),
        )
        // instructors
        .route("/instructors/login", post(instructors::login))
        .route("/instructors/logout", post(instructors::logout))
        .route("/instructors/create", post(instructors::create))
        .route("/instructors/search", get(instructors::search))
        .route("/instructors", get(instructors::list))
        .route(
            "/instructors/:id",
            get(instructors::get)
                .put(instructors::update)
                .delete(instructors::delete),
        )
        // courses & enrollment
        .route("/courses", post(courses::create).get(courses::list))
        .route(
            "/courses/:id",
            put(courses::update).delete(courses::delete),
        )
        .route(
            "/courses/instructor/:instructor_id",
            get(courses::instructor_courses),
        )
        .route("/courses/available/:id_number", get(courses::available_courses))
        .route("/courses/:id/enroll", post(courses::enroll))
        .route("/courses/:id/verify-code", post(courses::verify_code))
        .route("/courses/:id/students", get(courses::roster))
        .route(
            "/courses/:id/students/:student_id",
            delete(courses::remove_student),
        )
        // attendance sessions & records
        .route("/sessions/create", post(attendance::create_session))
        .route("/sessions/course/:course_id", get(attendance::course_sessions))
        .route("/sessions/student/:id_number", get(attendance::student_history))
        .route(
            "/sessions/stats/course/:course_id",
            get(attendance::course_stats),
        )
        .route("/session-attendance/record", post(attendance::record))
        .route(
            "/session-attendance/:session_id",
            get(attendance::session_records),
        )
        .fallback(axum::routing::any(err::handler404))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let pool = db::connect().await?;
    db::prepare_schema(&pool).await?;

    let app = router().layer(Extension(pool));

    let addr = SocketAddr::from(([0, 0, 0, 0], CONFIG.port));
    log::info!("Starting attendance HTTP server on http://{}", addr);
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Body {
        ok: bool,
    }

    #[test]
    fn creation_replies_answer_201() {
        let resp = creates(Body { ok: true }).unwrap().into_response();
        assert_eq!(resp.status(), StatusCode::CREATED);
    }

    #[test]
    fn plain_replies_answer_200() {
        let resp = proceeds(Body { ok: true }).unwrap().into_response();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
