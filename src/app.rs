use std::{any::Any, net::SocketAddr};

use axum::{middleware, response::Response, Router};
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, trace::TraceLayer};
use tower_sessions::{cookie::SameSite, Expiry, SessionManagerLayer, SessionStore};

use crate::config::AppConfig;
use crate::error::GENERIC_ERROR_MESSAGE;
use crate::pages::flash::{self, redirect_with_flash, FlashLevel};
use crate::state::AppState;
use crate::{applications, auth};

pub const SESSION_COOKIE: &str = "admissions_session";

/// Browser session carrying flash messages and the logged-in admin.
fn session_layer<Store>(store: Store, config: &AppConfig) -> SessionManagerLayer<Store>
where
    Store: SessionStore + Clone,
{
    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE)
        .with_secure(config.cookie_secure)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(
            config.session_ttl_minutes.max(1),
        )))
}

async fn not_found() -> Response {
    redirect_with_flash("/", FlashLevel::Error, "Page not found.")
}

fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(panic = %detail, "handler panicked");
    redirect_with_flash("/", FlashLevel::Error, GENERIC_ERROR_MESSAGE)
}

pub fn build_app<Store>(state: AppState, sessions: Store) -> Router
where
    Store: SessionStore + Clone,
{
    let max_upload_bytes = state.config.max_upload_bytes;
    let sessions = session_layer(sessions, &state.config);
    Router::new()
        .merge(applications::router(max_upload_bytes))
        .merge(auth::router())
        .fallback(not_found)
        .with_state(state)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(middleware::from_fn(flash::persist))
        .layer(sessions)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     _latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, "response");
                        } else {
                            tracing::info!(%status, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(app: Router) -> anyhow::Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
        std::env::var("APP_PORT").unwrap_or_else(|_| "8080".into())
    )
    .parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{
            header::{AUTHORIZATION, CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE},
            Request, StatusCode,
        },
    };
    use tower::ServiceExt;
    use tower_sessions::MemoryStore;

    use crate::applications::validation::{INVALID_GPA, NOT_PRINTABLE};
    use crate::auth::{
        jwt::JwtKeys,
        repo::{ensure_default_admin, DEFAULT_ADMIN_USERNAME},
    };
    use crate::state::fakes::{test_config, FakeParts};

    const BOUNDARY: &str = "admissions-test-boundary";

    fn app(state: AppState) -> Router {
        build_app(state, MemoryStore::default())
    }

    fn multipart(fields: &[(&str, &str)], files: &[(&str, &str)]) -> String {
        let mut body = String::new();
        for (name, value) in fields {
            body.push_str(&format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            ));
        }
        for (name, filename) in files {
            body.push_str(&format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n\
                 Content-Type: application/pdf\r\n\r\n%PDF-1.4 test\r\n"
            ));
        }
        body.push_str(&format!("--{BOUNDARY}--\r\n"));
        body
    }

    fn apply_request(gpa: &str) -> Request<Body> {
        apply_request_for(("John", "Doe"), gpa)
    }

    fn apply_request_for((first_name, last_name): (&str, &str), gpa: &str) -> Request<Body> {
        let fields = [
            ("first_name", first_name),
            ("last_name", last_name),
            ("email", "john@example.com"),
            ("phone", "1234567890"),
            ("date_of_birth", "2000-01-01"),
            ("address", "123 Main St"),
            ("program", "computer_science"),
            ("previous_education", "High School"),
            ("gpa", gpa),
        ];
        let body = multipart(
            &fields,
            &[("degree_certificate", "degree.pdf"), ("id_proof", "id.pdf")],
        );
        Request::post("/apply")
            .header(CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(body))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    fn get_with_cookie(uri: &str, cookie: &str) -> Request<Body> {
        Request::get(uri)
            .header(COOKIE, cookie)
            .body(Body::empty())
            .unwrap()
    }

    fn get_as_admin(uri: &str, token: &str) -> Request<Body> {
        Request::get(uri)
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap()
    }

    fn form_post(uri: &str) -> axum::http::request::Builder {
        Request::post(uri).header(CONTENT_TYPE, "application/x-www-form-urlencoded")
    }

    fn bearer_post(uri: &str, body: String, token: &str) -> Request<Body> {
        form_post(uri)
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::from(body))
            .unwrap()
    }

    fn cookie_post(uri: &str, body: String, cookie: &str) -> Request<Body> {
        form_post(uri)
            .header(COOKIE, cookie)
            .body(Body::from(body))
            .unwrap()
    }

    async fn body_text(res: Response) -> String {
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn body_json(res: Response) -> serde_json::Value {
        serde_json::from_str(&body_text(res).await).unwrap()
    }

    fn location(res: &Response) -> &str {
        res.headers()[LOCATION].to_str().unwrap()
    }

    /// `name=value` of the session cookie set on `res`.
    fn session_cookie(res: &Response) -> String {
        res.headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find(|v| v.starts_with(SESSION_COOKIE))
            .and_then(|v| v.split(';').next())
            .expect("session cookie")
            .to_string()
    }

    /// A signed Bearer token and its form token.
    fn bearer() -> (String, String) {
        let keys = JwtKeys::from(&test_config().jwt);
        let token = keys.sign(DEFAULT_ADMIN_USERNAME).unwrap();
        let csrf = keys.verify(&token).unwrap().csrf;
        (token, csrf)
    }

    fn form_token_in(html: &str) -> String {
        let marker = "name=\"csrf_token\" value=\"";
        let start = html.find(marker).expect("form token field") + marker.len();
        let len = html[start..].find('"').unwrap();
        html[start..start + len].to_string()
    }

    /// Logs in through the form and returns the session cookie.
    async fn login(app: &Router) -> String {
        let res = app
            .clone()
            .oneshot(
                form_post("/admin/login")
                    .body(Body::from("username=admin&password=admin123"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::FOUND);
        assert_eq!(location(&res), "/admin/dashboard");
        session_cookie(&res)
    }

    async fn seeded() -> (FakeParts, Router) {
        let fake = FakeParts::new();
        ensure_default_admin(fake.admins.as_ref(), "admin123")
            .await
            .unwrap();
        let router = app(fake.state());
        (fake, router)
    }

    #[tokio::test]
    async fn health_reports_healthy() {
        let res = app(AppState::fake()).oneshot(get("/health")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let json = body_json(res).await;
        assert_eq!(json["status"], "healthy");
        assert!(json["timestamp"].is_string());
    }

    #[tokio::test]
    async fn home_page_renders() {
        let res = app(AppState::fake()).oneshot(get("/")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert!(body_text(res).await.contains("Student Admission System"));
    }

    #[tokio::test]
    async fn unknown_routes_redirect_home_with_message() {
        let app = app(AppState::fake());
        let res = app.clone().oneshot(get("/nope")).await.unwrap();
        assert_eq!(res.status(), StatusCode::FOUND);
        assert_eq!(location(&res), "/");

        let cookie = session_cookie(&res);
        let res = app.oneshot(get_with_cookie("/", &cookie)).await.unwrap();
        assert!(body_text(res).await.contains("Page not found."));
    }

    #[tokio::test]
    async fn unknown_application_id_redirects_home() {
        let app = app(AppState::fake());
        let res = app
            .clone()
            .oneshot(get("/status/APP20240101DEADBEEF"))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::FOUND);
        assert_eq!(location(&res), "/");

        let cookie = session_cookie(&res);
        let res = app.oneshot(get_with_cookie("/", &cookie)).await.unwrap();
        assert!(body_text(res).await.contains("Application not found!"));
    }

    #[tokio::test]
    async fn review_actions_refuse_get() {
        let res = app(AppState::fake())
            .oneshot(get("/admin/approve/1"))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn dashboard_requires_login() {
        let res = app(AppState::fake())
            .oneshot(get("/admin/dashboard"))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::FOUND);
        assert_eq!(location(&res), "/admin/login");
    }

    #[tokio::test]
    async fn api_requires_admin() {
        let app = app(AppState::fake());
        let res = app.clone().oneshot(get("/api/applications")).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let (token, _) = bearer();
        let res = app
            .oneshot(get_as_admin("/api/applications", &token))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_text(res).await, "[]");
    }

    #[tokio::test]
    async fn submission_leads_to_status_page() {
        let fake = FakeParts::new();
        let app = app(fake.state());
        let res = app.clone().oneshot(apply_request("3.5")).await.unwrap();
        assert_eq!(res.status(), StatusCode::FOUND);
        let status_url = location(&res).to_string();
        let application_id = status_url.trim_start_matches("/status/").to_string();
        assert!(application_id.starts_with("APP"));
        assert_eq!(fake.applications.len(), 1);
        assert_eq!(fake.storage.len(), 2);

        let cookie = session_cookie(&res);
        let res = app
            .oneshot(get_with_cookie(&status_url, &cookie))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let html = body_text(res).await;
        assert!(html.contains("Application Status"));
        assert!(html.contains(&application_id));
        assert!(html.contains("pending"));
        assert!(html.contains(&format!(
            "Application submitted successfully! Your application ID is: {application_id}"
        )));
        assert!(!html.contains("/download_letter/"));
    }

    #[tokio::test]
    async fn out_of_range_gpa_re_renders_form() {
        let fake = FakeParts::new();
        let res = app(fake.state())
            .oneshot(apply_request("5.0"))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let html = body_text(res).await;
        assert!(html.contains(INVALID_GPA));
        assert!(html.contains("value=\"John\""));
        assert_eq!(fake.applications.len(), 0);
        assert_eq!(fake.storage.len(), 0);
    }

    #[tokio::test]
    async fn name_the_letter_cannot_print_re_renders_form() {
        let fake = FakeParts::new();
        let res = app(fake.state())
            .oneshot(apply_request_for(("小龍", "李氏"), "3.5"))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let html = body_text(res).await;
        assert!(html.contains(NOT_PRINTABLE));
        assert_eq!(fake.applications.len(), 0);
        assert_eq!(fake.storage.len(), 0);
    }

    #[tokio::test]
    async fn wrong_password_re_renders_login() {
        let (_, app) = seeded().await;
        let res = app
            .oneshot(
                form_post("/admin/login")
                    .body(Body::from("username=admin&password=wrong"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert!(body_text(res).await.contains("Invalid username or password!"));
    }

    #[tokio::test]
    async fn logged_in_admin_sees_dashboard() {
        let (_, app) = seeded().await;
        app.clone().oneshot(apply_request("3.5")).await.unwrap();
        let cookie = login(&app).await;

        let res = app
            .clone()
            .oneshot(get_with_cookie("/admin/dashboard", &cookie))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let html = body_text(res).await;
        assert!(html.contains("Admin Dashboard"));
        assert!(html.contains("Login successful!"));
        assert!(html.contains("Signed in as admin"));
        assert!(html.contains("John Doe"));

        let token = form_token_in(&html);
        let res = app
            .clone()
            .oneshot(cookie_post(
                "/admin/logout",
                format!("csrf_token={token}"),
                &cookie,
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::FOUND);
        let res = app
            .oneshot(get_with_cookie("/admin/dashboard", &cookie))
            .await
            .unwrap();
        assert_eq!(location(&res), "/admin/login");
    }

    #[tokio::test]
    async fn detail_page_shows_applicant() {
        let (_, app) = seeded().await;
        app.clone().oneshot(apply_request("3.5")).await.unwrap();
        let (token, _) = bearer();

        let res = app
            .clone()
            .oneshot(get_as_admin("/admin/application/1", &token))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let html = body_text(res).await;
        assert!(html.contains("Application Details"));
        assert!(html.contains("john@example.com"));
        assert!(html.contains("Computer Science"));

        let res = app
            .oneshot(get_as_admin("/admin/application/99", &token))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::FOUND);
        assert_eq!(location(&res), "/");
    }

    #[tokio::test]
    async fn api_detail_fields_and_missing_record() {
        let app = app(AppState::fake());
        app.clone().oneshot(apply_request("3.5")).await.unwrap();
        let (token, _) = bearer();

        let res = app
            .clone()
            .oneshot(get_as_admin("/api/applications/1", &token))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let json = body_json(res).await;
        assert_eq!(json["id"], 1);
        assert!(json["application_id"].as_str().unwrap().starts_with("APP"));
        assert_eq!(json["first_name"], "John");
        assert_eq!(json["last_name"], "Doe");
        assert_eq!(json["date_of_birth"], "2000-01-01");
        assert_eq!(json["program"], "computer_science");
        assert_eq!(json["gpa"], 3.5);
        assert_eq!(json["status"], "pending");
        assert!(json["reviewed_at"].is_null());

        let res = app
            .oneshot(get_as_admin("/api/applications/99", &token))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(res).await["error"], "Application not found");
    }

    #[tokio::test]
    async fn api_login_returns_bearer_token() {
        let (_, app) = seeded().await;
        let res = app
            .oneshot(
                Request::post("/api/admin/login")
                    .header(CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"username":"admin","password":"admin123"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let json = body_json(res).await;
        assert_eq!(json["token_type"], "Bearer");
        let token = json["access_token"].as_str().unwrap();
        let keys = JwtKeys::from(&test_config().jwt);
        assert_eq!(keys.verify(token).unwrap().sub, "admin");
    }

    #[tokio::test]
    async fn letter_of_pending_application_is_not_available() {
        let app = app(AppState::fake());
        let res = app.clone().oneshot(apply_request("3.5")).await.unwrap();
        let status_url = location(&res).to_string();

        let res = app.clone().oneshot(get("/download_letter/1")).await.unwrap();
        assert_eq!(res.status(), StatusCode::FOUND);
        assert_eq!(location(&res), status_url);

        let cookie = session_cookie(&res);
        let res = app
            .oneshot(get_with_cookie(&status_url, &cookie))
            .await
            .unwrap();
        assert!(body_text(res).await.contains("Admission letter not available!"));
    }

    #[tokio::test]
    async fn approve_needs_form_token_and_issues_letter() {
        let fake = FakeParts::new();
        let app = app(fake.state());
        app.clone().oneshot(apply_request("3.5")).await.unwrap();
        let (token, csrf) = bearer();

        let res = app
            .clone()
            .oneshot(bearer_post("/admin/approve/1", "csrf_token=wrong".into(), &token))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
        assert_eq!(fake.storage.len(), 2);

        let res = app
            .clone()
            .oneshot(bearer_post("/admin/approve/1", format!("csrf_token={csrf}"), &token))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::FOUND);
        assert_eq!(location(&res), "/admin/dashboard");
        assert_eq!(fake.storage.len(), 3);

        let res = app.oneshot(get("/download_letter/1")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()[CONTENT_TYPE], "application/pdf");
        let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        assert!(body.starts_with(b"%PDF"));
    }

    #[tokio::test]
    async fn reject_from_the_dashboard() {
        let (fake, app) = seeded().await;
        app.clone().oneshot(apply_request("3.5")).await.unwrap();
        let cookie = login(&app).await;
        let res = app
            .clone()
            .oneshot(get_with_cookie("/admin/dashboard", &cookie))
            .await
            .unwrap();
        let csrf = form_token_in(&body_text(res).await);

        let res = app
            .clone()
            .oneshot(cookie_post("/admin/reject/1", format!("csrf_token={csrf}"), &cookie))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::FOUND);
        assert_eq!(location(&res), "/admin/dashboard");

        let res = app
            .oneshot(get_with_cookie("/admin/dashboard", &cookie))
            .await
            .unwrap();
        assert!(body_text(res).await.contains("rejected!"));
        assert_eq!(fake.storage.len(), 2);
        let stored = crate::applications::services::get(&fake.state(), 1)
            .await
            .unwrap();
        assert_eq!(stored.status.as_str(), "rejected");
        assert_eq!(stored.reviewed_by.as_deref(), Some("admin"));
        assert!(stored.admission_letter_path.is_none());
    }

    #[tokio::test]
    async fn rejecting_an_approved_application_conflicts() {
        let app = app(AppState::fake());
        app.clone().oneshot(apply_request("3.5")).await.unwrap();
        let (token, csrf) = bearer();
        app.clone()
            .oneshot(bearer_post("/admin/approve/1", format!("csrf_token={csrf}"), &token))
            .await
            .unwrap();

        let res = app
            .oneshot(bearer_post("/admin/reject/1", format!("csrf_token={csrf}"), &token))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::FOUND);
        assert_eq!(location(&res), "/admin/dashboard");
    }
}
