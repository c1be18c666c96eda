use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;

use super::repo_types::{Application, ApplicationRow, NewApplication, Review};

/// Persistence for applications. Rows are never deleted.
#[async_trait]
pub trait ApplicationStore: Send + Sync {
    /// Inserts a `pending` application in its own transaction.
    async fn insert(&self, new: NewApplication) -> anyhow::Result<Application>;
    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<Application>>;
    async fn find_by_application_id(&self, application_id: &str)
        -> anyhow::Result<Option<Application>>;
    /// All applications, newest submission first.
    async fn list_recent(&self) -> anyhow::Result<Vec<Application>>;
    /// Writes a review outcome on a row that is still `pending` or already
    /// carries the same status. `Ok(None)` when no such row exists.
    async fn record_review(&self, id: i64, review: Review) -> anyhow::Result<Option<Application>>;
}

const COLUMNS: &str = "id, application_id, first_name, last_name, email, phone, date_of_birth, \
     address, program, previous_education, gpa, degree_certificate, id_proof, status, \
     submitted_at, reviewed_at, reviewed_by, admission_letter_path";

#[derive(Clone)]
pub struct PgApplications {
    db: PgPool,
}

impl PgApplications {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ApplicationStore for PgApplications {
    async fn insert(&self, new: NewApplication) -> anyhow::Result<Application> {
        let mut tx = self.db.begin().await.context("begin tx")?;
        let row = sqlx::query_as::<_, ApplicationRow>(&format!(
            r#"
            INSERT INTO applications (
                application_id, first_name, last_name, email, phone, date_of_birth,
                address, program, previous_education, gpa, degree_certificate, id_proof, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, 'pending')
            RETURNING {COLUMNS}
            "#
        ))
        .bind(&new.application_id)
        .bind(&new.first_name)
        .bind(&new.last_name)
        .bind(&new.email)
        .bind(&new.phone)
        .bind(new.date_of_birth)
        .bind(&new.address)
        .bind(new.program.as_str())
        .bind(&new.previous_education)
        .bind(new.gpa)
        .bind(&new.degree_certificate)
        .bind(&new.id_proof)
        .fetch_one(&mut *tx)
        .await
        .context("insert application")?;
        tx.commit().await.context("commit tx")?;
        row.try_into()
    }

    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<Application>> {
        let row = sqlx::query_as::<_, ApplicationRow>(&format!(
            "SELECT {COLUMNS} FROM applications WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find application by id")?;
        row.map(Application::try_from).transpose()
    }

    async fn find_by_application_id(
        &self,
        application_id: &str,
    ) -> anyhow::Result<Option<Application>> {
        let row = sqlx::query_as::<_, ApplicationRow>(&format!(
            "SELECT {COLUMNS} FROM applications WHERE application_id = $1"
        ))
        .bind(application_id)
        .fetch_optional(&self.db)
        .await
        .context("find application by application_id")?;
        row.map(Application::try_from).transpose()
    }

    async fn list_recent(&self) -> anyhow::Result<Vec<Application>> {
        let rows = sqlx::query_as::<_, ApplicationRow>(&format!(
            "SELECT {COLUMNS} FROM applications ORDER BY submitted_at DESC, id DESC"
        ))
        .fetch_all(&self.db)
        .await
        .context("list applications")?;
        rows.into_iter().map(Application::try_from).collect()
    }

    async fn record_review(&self, id: i64, review: Review) -> anyhow::Result<Option<Application>> {
        let mut tx = self.db.begin().await.context("begin tx")?;
        let row = sqlx::query_as::<_, ApplicationRow>(&format!(
            r#"
            UPDATE applications
               SET status = $2, reviewed_at = $3, reviewed_by = $4, admission_letter_path = $5
             WHERE id = $1 AND status IN ('pending', $2)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(id)
        .bind(review.status.as_str())
        .bind(review.reviewed_at)
        .bind(&review.reviewed_by)
        .bind(&review.admission_letter_path)
        .fetch_optional(&mut *tx)
        .await
        .context("record review")?;
        tx.commit().await.context("commit tx")?;
        row.map(Application::try_from).transpose()
    }
}
