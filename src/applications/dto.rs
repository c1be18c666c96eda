use serde::{Deserialize, Serialize};
use time::{macros::format_description, OffsetDateTime};

use super::repo_types::{Application, Program, Status};

#[derive(Debug, Serialize)]
pub struct ApplicationSummary {
    pub id: i64,
    pub application_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub status: Status,
    #[serde(with = "time::serde::rfc3339")]
    pub submitted_at: OffsetDateTime,
}

impl From<&Application> for ApplicationSummary {
    fn from(a: &Application) -> Self {
        Self {
            id: a.id,
            application_id: a.application_id.clone(),
            first_name: a.first_name.clone(),
            last_name: a.last_name.clone(),
            email: a.email.clone(),
            status: a.status,
            submitted_at: a.submitted_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApplicationDetails {
    pub id: i64,
    pub application_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub date_of_birth: String, // YYYY-MM-DD
    pub address: String,
    pub program: Program,
    pub previous_education: String,
    pub gpa: f64,
    pub status: Status,
    #[serde(with = "time::serde::rfc3339")]
    pub submitted_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub reviewed_at: Option<OffsetDateTime>,
    pub reviewed_by: Option<String>,
}

impl From<&Application> for ApplicationDetails {
    fn from(a: &Application) -> Self {
        Self {
            id: a.id,
            application_id: a.application_id.clone(),
            first_name: a.first_name.clone(),
            last_name: a.last_name.clone(),
            email: a.email.clone(),
            phone: a.phone.clone(),
            date_of_birth: a
                .date_of_birth
                .format(format_description!("[year]-[month]-[day]"))
                .unwrap_or_default(),
            address: a.address.clone(),
            program: a.program,
            previous_education: a.previous_education.clone(),
            gpa: a.gpa,
            status: a.status,
            submitted_at: a.submitted_at,
            reviewed_at: a.reviewed_at,
            reviewed_by: a.reviewed_by.clone(),
        }
    }
}

/// Review buttons post only the session's form token.
#[derive(Debug, Deserialize)]
pub struct ReviewForm {
    #[serde(default)]
    pub csrf_token: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}
