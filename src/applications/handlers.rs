use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, Path, State},
    http::{
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
        StatusCode,
    },
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use time::OffsetDateTime;
use tracing::{instrument, warn};

use super::{
    dto::{ApplicationDetails, ApplicationSummary, HealthResponse, ReviewForm},
    naming::is_application_id,
    services::{self, LetterDownload, Submission, UploadedFile},
    validation::{ApplicationForm, FieldErrors, MISSING_DOCUMENTS},
};
use crate::{
    auth::extractors::{AdminSession, ApiAdmin},
    error::{AppError, PageError},
    letters,
    pages::{
        self,
        flash::{redirect_with_flash, Flash, FlashLevel, IncomingFlash},
    },
    state::AppState,
};

pub const SUBMIT_STORAGE_ERROR: &str = "Error saving uploaded files. Please try again.";
pub const SUBMIT_GENERIC_ERROR: &str =
    "An error occurred while submitting your application. Please try again.";

// --- routers ---

pub fn public_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route(
            "/apply",
            get(apply_form)
                .post(apply_submit)
                .layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/status/:application_id", get(application_status))
        .route("/download_letter/:id", get(download_admission_letter))
        .route("/health", get(health))
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/dashboard", get(admin_dashboard))
        .route("/admin/application/:id", get(admin_view_application))
        .route("/admin/approve/:id", post(approve_application))
        .route("/admin/reject/:id", post(reject_application))
}

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/api/applications", get(api_list_applications))
        .route("/api/applications/:id", get(api_get_application))
}

// --- public pages ---

pub async fn index(IncomingFlash(flash): IncomingFlash) -> Response {
    pages::render("Student Admission System", &flash, &pages::index_body())
}

pub async fn apply_form(IncomingFlash(flash): IncomingFlash) -> Response {
    pages::render(
        "Apply",
        &flash,
        &pages::apply_body(&ApplicationForm::default(), &FieldErrors::default()),
    )
}

fn apply_again(
    status: StatusCode,
    form: &ApplicationForm,
    errors: &FieldErrors,
    banner: Option<&str>,
) -> Response {
    let banner = banner.map(|m| Flash::new(FlashLevel::Error, m));
    let page = pages::document("Apply", banner.as_ref(), &pages::apply_body(form, errors));
    (status, page).into_response()
}

async fn read_submission(mp: &mut Multipart) -> Result<Submission, MultipartError> {
    let mut submission = Submission::default();
    while let Some(field) = mp.next_field().await? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        match name.as_str() {
            "degree_certificate" | "id_proof" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let body = field.bytes().await?;
                if filename.is_empty() {
                    continue;
                }
                let file = Some(UploadedFile {
                    filename,
                    content_type,
                    body,
                });
                if name == "degree_certificate" {
                    submission.degree_certificate = file;
                } else {
                    submission.id_proof = file;
                }
            }
            _ => {
                let value = field.text().await?;
                submission.form.set(&name, value);
            }
        }
    }
    Ok(submission)
}

/// POST /apply (multipart)
#[instrument(skip(state, mp))]
pub async fn apply_submit(State(state): State<AppState>, mut mp: Multipart) -> Response {
    let submission = match read_submission(&mut mp).await {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "unreadable submission body");
            return apply_again(
                StatusCode::BAD_REQUEST,
                &ApplicationForm::default(),
                &FieldErrors::default(),
                Some(SUBMIT_GENERIC_ERROR),
            );
        }
    };
    let form = submission.form.clone();

    match services::submit(&state, submission).await {
        Ok(app) => redirect_with_flash(
            &format!("/status/{}", app.application_id),
            FlashLevel::Success,
            &format!(
                "Application submitted successfully! Your application ID is: {}",
                app.application_id
            ),
        ),
        Err(AppError::Validation(errors)) => {
            let fields: Vec<&str> = errors.iter().map(|(name, _)| name).collect();
            warn!(?fields, "submission failed validation");
            let missing_docs = errors
                .get("degree_certificate")
                .iter()
                .any(|m| m == MISSING_DOCUMENTS);
            apply_again(
                StatusCode::OK,
                &form,
                &errors,
                missing_docs.then_some(MISSING_DOCUMENTS),
            )
        }
        Err(AppError::Storage(_)) => apply_again(
            StatusCode::OK,
            &form,
            &FieldErrors::default(),
            Some(SUBMIT_STORAGE_ERROR),
        ),
        Err(_) => apply_again(
            StatusCode::OK,
            &form,
            &FieldErrors::default(),
            Some(SUBMIT_GENERIC_ERROR),
        ),
    }
}

#[instrument(skip(state, flash))]
pub async fn application_status(
    State(state): State<AppState>,
    Path(application_id): Path<String>,
    IncomingFlash(flash): IncomingFlash,
) -> Result<Response, PageError> {
    if !is_application_id(&application_id) {
        return Err(AppError::NotFound("Application").into());
    }
    match services::find_by_application_id(&state, &application_id).await? {
        Some(app) => Ok(pages::render("Application Status", &flash, &pages::status_body(&app))),
        None => Err(AppError::NotFound("Application").into()),
    }
}

#[instrument(skip(state))]
pub async fn download_admission_letter(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Response, PageError> {
    Ok(match services::admission_letter(&state, id).await? {
        LetterDownload::Ready { filename, body } => (
            [
                (CONTENT_TYPE, letters::CONTENT_TYPE.to_string()),
                (
                    CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{filename}\""),
                ),
            ],
            body,
        )
            .into_response(),
        LetterDownload::NotAvailable { application_id } => redirect_with_flash(
            &format!("/status/{application_id}"),
            FlashLevel::Error,
            "Admission letter not available!",
        ),
        LetterDownload::Missing { application_id } => redirect_with_flash(
            &format!("/status/{application_id}"),
            FlashLevel::Error,
            "Admission letter file not found!",
        ),
    })
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        timestamp: OffsetDateTime::now_utc(),
    })
}

// --- admin pages ---

#[instrument(skip(state, session, flash))]
pub async fn admin_dashboard(
    State(state): State<AppState>,
    session: AdminSession,
    IncomingFlash(flash): IncomingFlash,
) -> Result<Response, PageError> {
    let apps = services::list(&state).await?;
    Ok(pages::render(
        "Admin Dashboard",
        &flash,
        &pages::dashboard_body(&apps, &session.username, &session.csrf),
    ))
}

#[instrument(skip(state, session, flash))]
pub async fn admin_view_application(
    State(state): State<AppState>,
    session: AdminSession,
    Path(id): Path<i64>,
    IncomingFlash(flash): IncomingFlash,
) -> Result<Response, PageError> {
    let app = services::get(&state, id).await?;
    Ok(pages::render(
        "Application Details",
        &flash,
        &pages::detail_body(&app, &session.csrf),
    ))
}

#[instrument(skip(state, session, form), fields(reviewer = %session.username))]
pub async fn approve_application(
    State(state): State<AppState>,
    session: AdminSession,
    Path(id): Path<i64>,
    Form(form): Form<ReviewForm>,
) -> Result<Response, PageError> {
    session.check_form_token(&form.csrf_token)?;
    let app = services::approve(&state, id, &session.username).await?;
    Ok(redirect_with_flash(
        "/admin/dashboard",
        FlashLevel::Success,
        &format!("Application {} approved!", app.application_id),
    ))
}

#[instrument(skip(state, session, form), fields(reviewer = %session.username))]
pub async fn reject_application(
    State(state): State<AppState>,
    session: AdminSession,
    Path(id): Path<i64>,
    Form(form): Form<ReviewForm>,
) -> Result<Response, PageError> {
    session.check_form_token(&form.csrf_token)?;
    let app = services::reject(&state, id, &session.username).await?;
    Ok(redirect_with_flash(
        "/admin/dashboard",
        FlashLevel::Success,
        &format!("Application {} rejected!", app.application_id),
    ))
}

// --- JSON API ---

#[instrument(skip_all, fields(caller = %admin.username))]
pub async fn api_list_applications(
    State(state): State<AppState>,
    ApiAdmin(admin): ApiAdmin,
) -> Result<Json<Vec<ApplicationSummary>>, AppError> {
    let apps = services::list(&state).await?;
    Ok(Json(apps.iter().map(ApplicationSummary::from).collect()))
}

#[instrument(skip(state, admin), fields(caller = %admin.username))]
pub async fn api_get_application(
    State(state): State<AppState>,
    ApiAdmin(admin): ApiAdmin,
    Path(id): Path<i64>,
) -> Result<Json<ApplicationDetails>, AppError> {
    let app = services::get(&state, id).await?;
    Ok(Json(ApplicationDetails::from(&app)))
}
