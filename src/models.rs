use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stored student or instructor row. Never serialized to clients directly;
/// see [`PrincipalView`].
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PrincipalData {
    pub uuid: Uuid,
    pub id_number: String,
    pub full_name: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Client-facing projection of a principal, without the credential hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrincipalView {
    pub id: Uuid,
    pub id_number: String,
    pub full_name: String,
    pub created_at: DateTime<Utc>,
}

impl From<PrincipalData> for PrincipalView {
    fn from(data: PrincipalData) -> Self {
        Self {
            id: data.uuid,
            id_number: data.id_number,
            full_name: data.full_name,
            created_at: data.created_at,
        }
    }
}

/// Slim projection returned by login: just enough for the client to label
/// the signed-in user.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrincipalSummary {
    pub id: Uuid,
    pub id_number: String,
    pub full_name: String,
}

impl From<PrincipalData> for PrincipalSummary {
    fn from(data: PrincipalData) -> Self {
        Self {
            id: data.uuid,
            id_number: data.id_number,
            full_name: data.full_name,
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CourseData {
    #[serde(rename = "id")]
    pub uuid: Uuid,
    pub code: String,
    pub name: String,
    pub instructor_id: Uuid,
    pub verification_code: String,
    pub created_at: DateTime<Utc>,
}

/// Course as shown to students. The verification code stays server-side;
/// handing it out would defeat self-enrollment verification.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseView {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub instructor_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl From<CourseData> for CourseView {
    fn from(data: CourseData) -> Self {
        Self {
            id: data.uuid,
            code: data.code,
            name: data.name,
            instructor_id: data.instructor_id,
            created_at: data.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceSessionData {
    #[serde(rename = "id")]
    pub uuid: Uuid,
    pub course_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub opens_at: Option<DateTime<Utc>>,
    pub closes_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecordData {
    pub session_id: Uuid,
    pub student_id: Uuid,
    pub status: String,
    pub recorded_at: DateTime<Utc>,
}

/// Append-only login/logout event. Rows are never updated or deleted.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserLogData {
    pub id: i64,
    pub user_id: Uuid,
    pub user_type: String,
    pub full_name: String,
    pub id_number: String,
    pub action: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AdminSession {
    pub ssid: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Absent => "absent",
            AttendanceStatus::Late => "late",
        }
    }
}

impl FromStr for AttendanceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "present" => Ok(AttendanceStatus::Present),
            "absent" => Ok(AttendanceStatus::Absent),
            "late" => Ok(AttendanceStatus::Late),
            other => Err(format!("Unknown attendance status: `{}`", other)),
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Principal type tag stored in user logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrincipalKind {
    Student,
    Instructor,
}

impl PrincipalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrincipalKind::Student => "Student",
            PrincipalKind::Instructor => "Instructor",
        }
    }

    /// Table holding this principal kind; both tables share one column set.
    pub fn table(&self) -> &'static str {
        match self {
            PrincipalKind::Student => "students",
            PrincipalKind::Instructor => "instructors",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn principal_view_drops_password_hash() {
        let data = PrincipalData {
            uuid: Uuid::new_v4(),
            id_number: "S1".to_string(),
            full_name: "Ann".to_string(),
            password_hash: "$pbkdf2-sha256$...".to_string(),
            created_at: Utc::now(),
        };
        let view = PrincipalView::from(data);
        let json = serde_json::to_string(&view).unwrap();
        assert!(!json.contains("password"));
        assert!(json.contains("\"idNumber\":\"S1\""));
        assert!(json.contains("\"fullName\":\"Ann\""));
    }

    #[test]
    fn status_parses_known_values_only() {
        assert_eq!(
            "present".parse::<AttendanceStatus>(),
            Ok(AttendanceStatus::Present)
        );
        assert_eq!("late".parse::<AttendanceStatus>(), Ok(AttendanceStatus::Late));
        assert_eq!(
            "absent".parse::<AttendanceStatus>(),
            Ok(AttendanceStatus::Absent)
        );
        assert!("tardy".parse::<AttendanceStatus>().is_err());
        assert!("Present".parse::<AttendanceStatus>().is_err());
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in [
            AttendanceStatus::Present,
            AttendanceStatus::Absent,
            AttendanceStatus::Late,
        ] {
            assert_eq!(status.as_str().parse::<AttendanceStatus>(), Ok(status));
        }
    }
}
