use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::{Date, OffsetDateTime};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pending,
    Approved,
    Rejected,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::Approved => "approved",
            Status::Rejected => "rejected",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Status::Pending),
            "approved" => Ok(Status::Approved),
            "rejected" => Ok(Status::Rejected),
            other => anyhow::bail!("unknown application status {other:?}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Program {
    ComputerScience,
    Engineering,
    Business,
    Arts,
    Science,
}

impl Program {
    pub const ALL: [Program; 5] = [
        Program::ComputerScience,
        Program::Engineering,
        Program::Business,
        Program::Arts,
        Program::Science,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Program::ComputerScience => "computer_science",
            Program::Engineering => "engineering",
            Program::Business => "business",
            Program::Arts => "arts",
            Program::Science => "science",
        }
    }

    /// Label shown in the submission form.
    pub fn label(self) -> &'static str {
        match self {
            Program::ComputerScience => "Computer Science",
            Program::Engineering => "Engineering",
            Program::Business => "Business Administration",
            Program::Arts => "Arts and Humanities",
            Program::Science => "Natural Sciences",
        }
    }

    /// Stored value with underscores as spaces and each word capitalized,
    /// as printed on the admission letter.
    pub fn title_case(self) -> String {
        self.as_str()
            .split('_')
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl FromStr for Program {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Program::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| anyhow::anyhow!("unknown program {s:?}"))
    }
}

/// Row as stored in `applications`; enums are TEXT columns.
#[derive(Debug, Clone, FromRow)]
pub struct ApplicationRow {
    pub id: i64,
    pub application_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub date_of_birth: Date,
    pub address: String,
    pub program: String,
    pub previous_education: String,
    pub gpa: f64,
    pub degree_certificate: String,
    pub id_proof: String,
    pub status: String,
    pub submitted_at: OffsetDateTime,
    pub reviewed_at: Option<OffsetDateTime>,
    pub reviewed_by: Option<String>,
    pub admission_letter_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Application {
    pub id: i64,
    pub application_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub date_of_birth: Date,
    pub address: String,
    pub program: Program,
    pub previous_education: String,
    pub gpa: f64,
    pub degree_certificate: String,
    pub id_proof: String,
    pub status: Status,
    pub submitted_at: OffsetDateTime,
    pub reviewed_at: Option<OffsetDateTime>,
    pub reviewed_by: Option<String>,
    pub admission_letter_path: Option<String>,
}

impl Application {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

impl TryFrom<ApplicationRow> for Application {
    type Error = anyhow::Error;

    fn try_from(r: ApplicationRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            application_id: r.application_id,
            first_name: r.first_name,
            last_name: r.last_name,
            email: r.email,
            phone: r.phone,
            date_of_birth: r.date_of_birth,
            address: r.address,
            program: r.program.parse()?,
            previous_education: r.previous_education,
            gpa: r.gpa,
            degree_certificate: r.degree_certificate,
            id_proof: r.id_proof,
            status: r.status.parse()?,
            submitted_at: r.submitted_at,
            reviewed_at: r.reviewed_at,
            reviewed_by: r.reviewed_by,
            admission_letter_path: r.admission_letter_path,
        })
    }
}

/// Everything needed to insert a freshly submitted application.
#[derive(Debug, Clone)]
pub struct NewApplication {
    pub application_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub date_of_birth: Date,
    pub address: String,
    pub program: Program,
    pub previous_education: String,
    pub gpa: f64,
    pub degree_certificate: String,
    pub id_proof: String,
}

/// Outcome of an admin review, written in one statement.
#[derive(Debug, Clone)]
pub struct Review {
    pub status: Status,
    pub reviewed_by: String,
    pub reviewed_at: OffsetDateTime,
    pub admission_letter_path: Option<String>,
}
