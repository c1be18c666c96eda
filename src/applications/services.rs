use bytes::Bytes;
use time::OffsetDateTime;
use tracing::{error, info, warn};

use super::{
    naming::{admission_letter_key, degree_certificate_key, generate_application_id, id_proof_key},
    repo_types::{Application, NewApplication, Review, Status},
    validation::{validate, ApplicationForm, MISSING_DOCUMENTS},
};
use crate::{error::AppError, letters, state::AppState, storage::StorageClient};

pub struct UploadedFile {
    pub filename: String,
    pub content_type: String,
    pub body: Bytes,
}

/// A submission as received: raw text fields plus the two documents.
#[derive(Default)]
pub struct Submission {
    pub form: ApplicationForm,
    pub degree_certificate: Option<UploadedFile>,
    pub id_proof: Option<UploadedFile>,
}

fn already_reviewed(application_id: &str) -> AppError {
    AppError::Conflict(format!(
        "Application {application_id} has already been reviewed."
    ))
}

/// Removes objects written by a request that did not complete.
async fn discard(storage: &dyn StorageClient, keys: &[String]) {
    for key in keys {
        if let Err(e) = storage.delete_object(key).await {
            warn!(error = %e, %key, "could not remove orphaned object");
        }
    }
}

pub async fn submit(st: &AppState, submission: Submission) -> Result<Application, AppError> {
    let Submission {
        form,
        degree_certificate,
        id_proof,
    } = submission;

    let validated = validate(&form);
    let files = match (degree_certificate, id_proof) {
        (Some(d), Some(i)) if !d.filename.is_empty() && !i.filename.is_empty() => Some((d, i)),
        _ => None,
    };
    let (valid, (degree, id_doc)) = match (validated, files) {
        (Ok(valid), Some(files)) => (valid, files),
        (validated, files) => {
            let mut errors = validated.err().unwrap_or_default();
            if files.is_none() {
                errors.add("degree_certificate", MISSING_DOCUMENTS);
                errors.add("id_proof", MISSING_DOCUMENTS);
            }
            return Err(AppError::Validation(errors));
        }
    };

    let application_id = generate_application_id(OffsetDateTime::now_utc());
    let degree_key = degree_certificate_key(&application_id, &degree.filename);
    let id_key = id_proof_key(&application_id, &id_doc.filename);

    let mut stored = Vec::with_capacity(2);
    for (key, file) in [(&degree_key, degree), (&id_key, id_doc)] {
        if let Err(e) = st
            .storage
            .put_object(key, file.body, &file.content_type)
            .await
        {
            error!(error = %e, %application_id, %key, "file save failed");
            discard(st.storage.as_ref(), &stored).await;
            return Err(AppError::Storage(e));
        }
        stored.push(key.clone());
    }

    let new = NewApplication {
        application_id: application_id.clone(),
        first_name: valid.first_name,
        last_name: valid.last_name,
        email: valid.email,
        phone: valid.phone,
        date_of_birth: valid.date_of_birth,
        address: valid.address,
        program: valid.program,
        previous_education: valid.previous_education,
        gpa: valid.gpa,
        degree_certificate: degree_key,
        id_proof: id_key,
    };
    match st.applications.insert(new).await {
        Ok(app) => {
            info!(id = app.id, %application_id, program = %app.program.as_str(), "application submitted");
            Ok(app)
        }
        Err(e) => {
            error!(error = %e, %application_id, "application insert failed");
            discard(st.storage.as_ref(), &stored).await;
            Err(AppError::Database(e))
        }
    }
}

pub async fn get(st: &AppState, id: i64) -> Result<Application, AppError> {
    st.applications
        .find_by_id(id)
        .await
        .map_err(AppError::Database)?
        .ok_or(AppError::NotFound("Application"))
}

/// Lookup by external identifier; an unknown id is `Ok(None)`.
pub async fn find_by_application_id(
    st: &AppState,
    application_id: &str,
) -> Result<Option<Application>, AppError> {
    st.applications
        .find_by_application_id(application_id)
        .await
        .map_err(AppError::Database)
}

pub async fn list(st: &AppState) -> Result<Vec<Application>, AppError> {
    st.applications.list_recent().await.map_err(AppError::Database)
}

/// Approves and issues the admission letter. Re-approving regenerates it.
pub async fn approve(st: &AppState, id: i64, reviewer: &str) -> Result<Application, AppError> {
    let app = get(st, id).await?;
    if app.status == Status::Rejected {
        return Err(AppError::Conflict(format!(
            "Application {} has already been rejected.",
            app.application_id
        )));
    }

    let now = OffsetDateTime::now_utc();
    let key = admission_letter_key(&app.application_id);
    let reviewed = Application {
        status: Status::Approved,
        reviewed_at: Some(now),
        reviewed_by: Some(reviewer.to_string()),
        admission_letter_path: Some(key.clone()),
        ..app.clone()
    };
    let pdf = letters::generate(&reviewed, now.date())?;
    st.storage
        .put_object(&key, Bytes::from(pdf), letters::CONTENT_TYPE)
        .await
        .map_err(AppError::Storage)?;

    let review = Review {
        status: Status::Approved,
        reviewed_by: reviewer.to_string(),
        reviewed_at: now,
        admission_letter_path: Some(key.clone()),
    };
    let recorded = st.applications.record_review(id, review).await;
    // a letter from an earlier approval is still referenced by the row
    let orphaned = app.admission_letter_path.is_none();
    let updated = match recorded {
        Ok(Some(updated)) => updated,
        Ok(None) => {
            warn!(id, application_id = %app.application_id, "review lost to a concurrent reviewer");
            if orphaned {
                discard(st.storage.as_ref(), &[key]).await;
            }
            return Err(already_reviewed(&app.application_id));
        }
        Err(e) => {
            if orphaned {
                discard(st.storage.as_ref(), &[key]).await;
            }
            return Err(AppError::Database(e));
        }
    };
    info!(id, application_id = %updated.application_id, %reviewer, %key, "application approved");
    Ok(updated)
}

pub async fn reject(st: &AppState, id: i64, reviewer: &str) -> Result<Application, AppError> {
    let app = get(st, id).await?;
    if app.status == Status::Approved {
        return Err(AppError::Conflict(format!(
            "Application {} has already been approved.",
            app.application_id
        )));
    }

    let review = Review {
        status: Status::Rejected,
        reviewed_by: reviewer.to_string(),
        reviewed_at: OffsetDateTime::now_utc(),
        admission_letter_path: None,
    };
    let updated = st
        .applications
        .record_review(id, review)
        .await
        .map_err(AppError::Database)?
        .ok_or_else(|| already_reviewed(&app.application_id))?;
    info!(id, application_id = %updated.application_id, %reviewer, "application rejected");
    Ok(updated)
}

pub enum LetterDownload {
    Ready { filename: String, body: Bytes },
    /// Not approved, or no letter recorded.
    NotAvailable { application_id: String },
    /// Recorded, but the stored object is gone.
    Missing { application_id: String },
}

pub async fn admission_letter(st: &AppState, id: i64) -> Result<LetterDownload, AppError> {
    let app = get(st, id).await?;
    let key = match (&app.status, &app.admission_letter_path) {
        (Status::Approved, Some(key)) => key.clone(),
        _ => {
            return Ok(LetterDownload::NotAvailable {
                application_id: app.application_id,
            })
        }
    };
    match st.storage.get_object(&key).await.map_err(AppError::Storage)? {
        Some(body) => Ok(LetterDownload::Ready {
            filename: admission_letter_key(&app.application_id),
            body,
        }),
        None => {
            warn!(id, %key, "admission letter object missing");
            Ok(LetterDownload::Missing {
                application_id: app.application_id,
            })
        }
    }
}
