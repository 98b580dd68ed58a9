use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::config::CONFIG;

/// Bounded acquire timeout: a saturated or unreachable store fails the
/// request with a storage error instead of blocking it indefinitely.
pub async fn connect() -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(16)
        .acquire_timeout(Duration::from_secs(CONFIG.storage_timeout_secs))
        .connect(&CONFIG.database_url)
        .await?;
    Ok(pool)
}

/// Postgres error class 23505: a racing insert hit a UNIQUE constraint.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.code().as_deref() == Some("23505"),
        _ => false,
    }
}

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS students (
        uuid UUID PRIMARY KEY,
        id_number TEXT NOT NULL UNIQUE,
        full_name TEXT NOT NULL,
        password_hash TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS instructors (
        uuid UUID PRIMARY KEY,
        id_number TEXT NOT NULL UNIQUE,
        full_name TEXT NOT NULL,
        password_hash TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS courses (
        uuid UUID PRIMARY KEY,
        code TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL,
        instructor_id UUID NOT NULL REFERENCES instructors(uuid) ON DELETE CASCADE,
        verification_code TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS course_roster (
        course_id UUID NOT NULL REFERENCES courses(uuid) ON DELETE CASCADE,
        student_id UUID NOT NULL REFERENCES students(uuid) ON DELETE CASCADE,
        enrolled_at TIMESTAMPTZ NOT NULL,
        PRIMARY KEY (course_id, student_id)
    )",
    "CREATE TABLE IF NOT EXISTS attendance_sessions (
        uuid UUID PRIMARY KEY,
        course_id UUID NOT NULL REFERENCES courses(uuid) ON DELETE CASCADE,
        created_at TIMESTAMPTZ NOT NULL,
        opens_at TIMESTAMPTZ,
        closes_at TIMESTAMPTZ
    )",
    "CREATE TABLE IF NOT EXISTS attendance_records (
        session_id UUID NOT NULL REFERENCES attendance_sessions(uuid) ON DELETE CASCADE,
        student_id UUID NOT NULL REFERENCES students(uuid) ON DELETE CASCADE,
        status TEXT NOT NULL,
        recorded_at TIMESTAMPTZ NOT NULL,
        PRIMARY KEY (session_id, student_id)
    )",
    "CREATE TABLE IF NOT EXISTS user_logs (
        id BIGSERIAL PRIMARY KEY,
        user_id UUID NOT NULL,
        user_type TEXT NOT NULL,
        full_name TEXT NOT NULL,
        id_number TEXT NOT NULL,
        action TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS admin_sessions (
        ssid TEXT PRIMARY KEY,
        expires_at TIMESTAMPTZ NOT NULL
    )",
];

/// Creates all tables on startup. Referential integrity is `ON DELETE
/// CASCADE` throughout: deleting a course removes its roster, sessions and
/// records; deleting a principal removes their enrollments and records.
pub async fn prepare_schema(pool: &PgPool) -> anyhow::Result<()> {
    for stmt in SCHEMA {
        sqlx::query(stmt).execute(pool).await?;
    }
    log::info!("Database schema ready ({} tables)", SCHEMA.len());
    Ok(())
}
