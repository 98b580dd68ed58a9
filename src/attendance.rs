//! Attendance recorder: course-meeting sessions, per-student records keyed
//! by (session, student), and per-day presence stats.

use std::collections::BTreeMap;

use axum::extract::{Path, Query};
use axum::{Extension, Json};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::err::Error;
use crate::models::{
    AttendanceRecordData, AttendanceSessionData, AttendanceStatus, CourseData, PrincipalKind,
};
use crate::principals;
use crate::{creates, proceeds, Payload};

async fn find_course(id: Uuid, pg: &PgPool) -> Result<CourseData, Error> {
    sqlx::query_as::<_, CourseData>("SELECT * FROM courses WHERE uuid = $1 LIMIT 1")
        .bind(id)
        .fetch_optional(pg)
        .await?
        .ok_or_else(|| Error::not_found(format!("Course `{}` does not exist", id)))
}

async fn find_session(id: Uuid, pg: &PgPool) -> Result<AttendanceSessionData, Error> {
    sqlx::query_as::<_, AttendanceSessionData>(
        "SELECT * FROM attendance_sessions WHERE uuid = $1 LIMIT 1",
    )
    .bind(id)
    .fetch_optional(pg)
    .await?
    .ok_or_else(|| Error::not_found(format!("Session `{}` does not exist", id)))
}

pub async fn create_session(
    Extension(pg): Extension<PgPool>,
    Json(body): Json<CreateSession>,
) -> Payload<SessionBody> {
    let course = find_course(body.course_id, &pg).await?;

    let session = AttendanceSessionData {
        uuid: Uuid::new_v4(),
        course_id: course.uuid,
        created_at: Utc::now(),
        opens_at: body.opens_at,
        closes_at: body.closes_at,
    };

    sqlx::query("INSERT INTO attendance_sessions VALUES ($1, $2, $3, $4, $5)")
        .bind(session.uuid)
        .bind(session.course_id)
        .bind(session.created_at)
        .bind(session.opens_at)
        .bind(session.closes_at)
        .execute(&pg)
        .await?;

    creates(SessionBody { session })
}

pub async fn course_sessions(
    Path(course_id): Path<Uuid>,
    Extension(pg): Extension<PgPool>,
) -> Payload<SessionList> {
    find_course(course_id, &pg).await?;
    let sessions = sqlx::query_as::<_, AttendanceSessionData>(
        "SELECT * FROM attendance_sessions WHERE course_id = $1 ORDER BY created_at DESC",
    )
    .bind(course_id)
    .fetch_all(&pg)
    .await?;

    proceeds(SessionList { sessions })
}

/// True when `now` falls inside the session's optional time window. An
/// unset bound does not constrain.
fn within_window(
    now: DateTime<Utc>,
    opens_at: Option<DateTime<Utc>>,
    closes_at: Option<DateTime<Utc>>,
) -> bool {
    if let Some(opens) = opens_at {
        if now < opens {
            return false;
        }
    }
    if let Some(closes) = closes_at {
        if now > closes {
            return false;
        }
    }
    true
}

/// Records attendance for one student in one session. Re-scanning is an
/// upsert: the (session, student) key holds exactly one row and a second
/// call overwrites the prior status.
pub async fn record(
    Extension(pg): Extension<PgPool>,
    Json(body): Json<RecordAttendance>,
) -> Payload<RecordBody> {
    let status: AttendanceStatus = body
        .status
        .parse()
        .map_err(|e: String| Error::invalid(e))?;

    let session = find_session(body.session_id, &pg).await?;
    let student = principals::find_by_id_number(PrincipalKind::Student, &body.student_id, &pg)
        .await?
        .ok_or_else(|| {
            Error::not_found(format!("Student `{}` does not exist", body.student_id))
        })?;

    let now = Utc::now();
    if !within_window(now, session.opens_at, session.closes_at) {
        return Err(Error::invalid("Session is not open for recording"));
    }

    let enrolled = sqlx::query(
        "SELECT 1 FROM course_roster WHERE course_id = $1 AND student_id = $2 LIMIT 1",
    )
    .bind(session.course_id)
    .bind(student.uuid)
    .fetch_optional(&pg)
    .await?;
    if enrolled.is_none() {
        return Err(Error::NotEnrolled {
            message: format!(
                "Student `{}` is not enrolled in this session's course",
                student.id_number
            ),
        });
    }

    sqlx::query(
        "INSERT INTO attendance_records VALUES ($1, $2, $3, $4)
         ON CONFLICT (session_id, student_id)
         DO UPDATE SET status = EXCLUDED.status, recorded_at = EXCLUDED.recorded_at",
    )
    .bind(session.uuid)
    .bind(student.uuid)
    .bind(status.as_str())
    .bind(now)
    .execute(&pg)
    .await?;

    proceeds(RecordBody {
        record: AttendanceRecordData {
            session_id: session.uuid,
            student_id: student.uuid,
            status: status.as_str().to_string(),
            recorded_at: now,
        },
    })
}

pub async fn session_records(
    Path(session_id): Path<Uuid>,
    Extension(pg): Extension<PgPool>,
) -> Payload<RecordList> {
    find_session(session_id, &pg).await?;
    let records = sqlx::query_as::<_, AttendanceRecordData>(
        "SELECT * FROM attendance_records WHERE session_id = $1 ORDER BY recorded_at",
    )
    .bind(session_id)
    .fetch_all(&pg)
    .await?;

    proceeds(RecordList { records })
}

pub async fn student_history(
    Path(id_number): Path<String>,
    Extension(pg): Extension<PgPool>,
) -> Payload<RecordList> {
    let student = principals::find_by_id_number(PrincipalKind::Student, &id_number, &pg)
        .await?
        .ok_or_else(|| Error::not_found(format!("Student `{}` does not exist", id_number)))?;

    let records = sqlx::query_as::<_, AttendanceRecordData>(
        "SELECT * FROM attendance_records WHERE student_id = $1 ORDER BY recorded_at DESC",
    )
    .bind(student.uuid)
    .fetch_all(&pg)
    .await?;

    proceeds(RecordList { records })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyStat {
    pub date: NaiveDate,
    pub present: u32,
    pub late: u32,
    pub absent: u32,
}

/// Buckets records into one count row per calendar day (UTC), oldest first.
fn bucket_by_day<I>(rows: I) -> Vec<DailyStat>
where
    I: IntoIterator<Item = (DateTime<Utc>, AttendanceStatus)>,
{
    let mut days: BTreeMap<NaiveDate, DailyStat> = BTreeMap::new();
    for (at, status) in rows {
        let date = at.date_naive();
        let stat = days.entry(date).or_insert_with(|| DailyStat {
            date,
            present: 0,
            late: 0,
            absent: 0,
        });
        match status {
            AttendanceStatus::Present => stat.present += 1,
            AttendanceStatus::Late => stat.late += 1,
            AttendanceStatus::Absent => stat.absent += 1,
        }
    }
    days.into_values().collect()
}

pub async fn course_stats(
    Path(course_id): Path<Uuid>,
    Query(range): Query<StatsRange>,
    Extension(pg): Extension<PgPool>,
) -> Payload<StatsBody> {
    find_course(course_id, &pg).await?;
    let rows = sqlx::query_as::<_, AttendanceRecordData>(
        "SELECT r.* FROM attendance_records r
         JOIN attendance_sessions s ON s.uuid = r.session_id
         WHERE s.course_id = $1
           AND ($2::timestamptz IS NULL OR r.recorded_at >= $2)
           AND ($3::timestamptz IS NULL OR r.recorded_at <= $3)",
    )
    .bind(course_id)
    .bind(range.from)
    .bind(range.to)
    .fetch_all(&pg)
    .await?;

    let parsed = rows.into_iter().filter_map(|r| {
        r.status
            .parse::<AttendanceStatus>()
            .ok()
            .map(|status| (r.recorded_at, status))
    });

    proceeds(StatsBody {
        days: bucket_by_day(parsed),
    })
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSession {
    pub course_id: Uuid,
    pub opens_at: Option<DateTime<Utc>>,
    pub closes_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordAttendance {
    pub session_id: Uuid,
    pub student_id: String,
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatsRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionBody {
    pub session: AttendanceSessionData,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionList {
    pub sessions: Vec<AttendanceSessionData>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecordBody {
    pub record: AttendanceRecordData,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecordList {
    pub records: Vec<AttendanceRecordData>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsBody {
    pub days: Vec<DailyStat>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, hour, 0, 0).unwrap()
    }

    #[test]
    fn buckets_group_by_calendar_day() {
        let days = bucket_by_day(vec![
            (at(1, 9), AttendanceStatus::Present),
            (at(1, 10), AttendanceStatus::Present),
            (at(1, 11), AttendanceStatus::Late),
            (at(2, 9), AttendanceStatus::Absent),
        ]);
        assert_eq!(days.len(), 2);
        assert_eq!(days[0].date, at(1, 0).date_naive());
        assert_eq!(days[0].present, 2);
        assert_eq!(days[0].late, 1);
        assert_eq!(days[0].absent, 0);
        assert_eq!(days[1].absent, 1);
    }

    #[test]
    fn buckets_are_sorted_oldest_first() {
        let days = bucket_by_day(vec![
            (at(5, 9), AttendanceStatus::Present),
            (at(2, 9), AttendanceStatus::Present),
            (at(3, 9), AttendanceStatus::Present),
        ]);
        let dates: Vec<NaiveDate> = days.iter().map(|d| d.date).collect();
        let mut sorted = dates.clone();
        sorted.sort();
        assert_eq!(dates, sorted);
    }

    #[test]
    fn empty_input_yields_no_buckets() {
        assert!(bucket_by_day(Vec::new()).is_empty());
    }

    #[test]
    fn window_unset_bounds_do_not_constrain() {
        let now = at(1, 9);
        assert!(within_window(now, None, None));
        assert!(within_window(now, Some(now - Duration::hours(1)), None));
        assert!(within_window(now, None, Some(now + Duration::hours(1))));
    }

    #[test]
    fn window_rejects_out_of_bounds() {
        let now = at(1, 9);
        assert!(!within_window(now, Some(now + Duration::hours(1)), None));
        assert!(!within_window(now, None, Some(now - Duration::hours(1))));
        assert!(within_window(
            now,
            Some(now - Duration::hours(1)),
            Some(now + Duration::hours(1))
        ));
    }
}
