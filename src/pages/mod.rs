//! Server-rendered HTML. Markup is deliberately plain; every interpolated
//! value goes through [`escape`].

pub mod flash;

use std::fmt::Write;

use axum::response::{Html, IntoResponse, Response};
use time::{macros::format_description, OffsetDateTime};

use crate::applications::{
    repo_types::{Application, Program, Status},
    validation::{ApplicationForm, FieldErrors},
};
use flash::{Flash, FlashLevel};

pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            c => out.push(c),
        }
    }
    out
}

fn timestamp(t: OffsetDateTime) -> String {
    t.format(format_description!("[year]-[month]-[day] [hour]:[minute] UTC"))
        .unwrap_or_default()
}

/// Wraps `body` in the site layout with an optional message banner.
pub fn document(title: &str, banner: Option<&Flash>, body: &str) -> Html<String> {
    let banner = match banner {
        Some(f) => {
            let class = match f.level {
                FlashLevel::Success => "success",
                FlashLevel::Error => "error",
            };
            format!(r#"<div class="flash {class}">{}</div>"#, escape(&f.message))
        }
        None => String::new(),
    };
    let html = format!(
        "<!doctype html>\n<html><head><meta charset=\"utf-8\"><title>{title}</title></head>\n\
         <body><nav><a href=\"/\">Home</a> | <a href=\"/apply\">Apply</a> | \
         <a href=\"/admin/dashboard\">Admin</a></nav>\n{banner}\n<main>{body}</main></body></html>",
        title = escape(title),
    );
    Html(html)
}

pub fn render(title: &str, flash: &Option<Flash>, body: &str) -> Response {
    document(title, flash.as_ref(), body).into_response()
}

pub fn index_body() -> String {
    "<h1>Student Admission System</h1>\
     <p>Submit your application online and track its status with your application ID.</p>\
     <p><a href=\"/apply\">Start an application</a></p>\
     <form method=\"get\" action=\"/status/\" onsubmit=\"this.action='/status/'+this.id.value;return true;\">\
     <input name=\"id\" placeholder=\"Application ID\"><button>Check status</button></form>"
        .to_string()
}

fn field_errors(errors: &FieldErrors, field: &str) -> String {
    errors
        .get(field)
        .iter()
        .map(|m| format!(r#"<span class="field-error">{}</span>"#, escape(m)))
        .collect()
}

pub fn apply_body(form: &ApplicationForm, errors: &FieldErrors) -> String {
    let mut out = String::from(
        "<h1>Student Application Form</h1>\
         <form method=\"post\" action=\"/apply\" enctype=\"multipart/form-data\">",
    );
    let text_fields = [
        ("first_name", "First Name", &form.first_name),
        ("last_name", "Last Name", &form.last_name),
        ("email", "Email", &form.email),
        ("phone", "Phone Number", &form.phone),
        ("date_of_birth", "Date of Birth (YYYY-MM-DD)", &form.date_of_birth),
        ("gpa", "GPA (0.0-4.0)", &form.gpa),
    ];
    for (name, label, value) in text_fields {
        let _ = write!(
            out,
            r#"<p><label>{label} <input name="{name}" value="{}"></label>{}</p>"#,
            escape(value),
            field_errors(errors, name)
        );
    }
    let _ = write!(
        out,
        r#"<p><label>Address <textarea name="address">{}</textarea></label>{}</p>"#,
        escape(&form.address),
        field_errors(errors, "address")
    );
    out.push_str(r#"<p><label>Program <select name="program">"#);
    for p in Program::ALL {
        let selected = if form.program == p.as_str() { " selected" } else { "" };
        let _ = write!(out, r#"<option value="{}"{selected}>{}</option>"#, p.as_str(), p.label());
    }
    let _ = write!(out, "</select></label>{}</p>", field_errors(errors, "program"));
    let _ = write!(
        out,
        r#"<p><label>Previous Education <textarea name="previous_education">{}</textarea></label>{}</p>"#,
        escape(&form.previous_education),
        field_errors(errors, "previous_education")
    );
    let _ = write!(
        out,
        r#"<p><label>Degree Certificate <input type="file" name="degree_certificate"></label>{}</p>
<p><label>ID Proof <input type="file" name="id_proof"></label>{}</p>
<button type="submit">Submit Application</button></form>"#,
        field_errors(errors, "degree_certificate"),
        field_errors(errors, "id_proof")
    );
    out
}

pub fn status_body(app: &Application) -> String {
    let mut out = format!(
        "<h1>Application Status</h1><dl>\
         <dt>Application ID</dt><dd>{}</dd>\
         <dt>Name</dt><dd>{}</dd>\
         <dt>Program</dt><dd>{}</dd>\
         <dt>Submitted</dt><dd>{}</dd>\
         <dt>Status</dt><dd class=\"status-{}\">{}</dd></dl>",
        escape(&app.application_id),
        escape(&app.full_name()),
        app.program.label(),
        timestamp(app.submitted_at),
        app.status,
        app.status,
    );
    if app.status == Status::Approved && app.admission_letter_path.is_some() {
        let _ = write!(
            out,
            r#"<p><a href="/download_letter/{}">Download admission letter</a></p>"#,
            app.id
        );
    }
    out
}

pub fn login_body() -> String {
    "<h1>Admin Login</h1>\
     <form method=\"post\" action=\"/admin/login\">\
     <p><label>Username <input name=\"username\"></label></p>\
     <p><label>Password <input type=\"password\" name=\"password\"></label></p>\
     <button type=\"submit\">Login</button></form>"
        .to_string()
}

fn review_buttons(app: &Application, csrf: &str) -> String {
    let mut out = String::new();
    for (action, label, allowed) in [
        ("approve", "Approve", app.status != Status::Rejected),
        ("reject", "Reject", app.status != Status::Approved),
    ] {
        if allowed {
            let _ = write!(
                out,
                r#"<form method="post" action="/admin/{action}/{}" style="display:inline"><input type="hidden" name="csrf_token" value="{}"><button>{label}</button></form>"#,
                app.id,
                escape(csrf)
            );
        }
    }
    out
}

pub fn dashboard_body(apps: &[Application], username: &str, csrf: &str) -> String {
    let mut out = format!(
        "<h1>Admin Dashboard</h1><p>Signed in as {} \
         <form method=\"post\" action=\"/admin/logout\" style=\"display:inline\">\
         <input type=\"hidden\" name=\"csrf_token\" value=\"{}\"><button>Log out</button></form></p>\
         <table><tr><th>Application ID</th><th>Name</th><th>Program</th><th>GPA</th>\
         <th>Status</th><th>Submitted</th><th></th></tr>",
        escape(username),
        escape(csrf)
    );
    for app in apps {
        let _ = write!(
            out,
            "<tr><td><a href=\"/admin/application/{}\">{}</a></td><td>{}</td><td>{}</td>\
             <td>{:?}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            app.id,
            escape(&app.application_id),
            escape(&app.full_name()),
            app.program.label(),
            app.gpa,
            app.status,
            timestamp(app.submitted_at),
            review_buttons(app, csrf)
        );
    }
    out.push_str("</table>");
    if apps.is_empty() {
        out.push_str("<p>No applications yet.</p>");
    }
    out
}

pub fn detail_body(app: &Application, csrf: &str) -> String {
    let rows = [
        ("Application ID", app.application_id.clone()),
        ("Name", app.full_name()),
        ("Email", app.email.clone()),
        ("Phone", app.phone.clone()),
        ("Date of Birth", app.date_of_birth.to_string()),
        ("Address", app.address.clone()),
        ("Program", app.program.label().to_string()),
        ("Previous Education", app.previous_education.clone()),
        ("GPA", format!("{:?}", app.gpa)),
        ("Degree Certificate", app.degree_certificate.clone()),
        ("ID Proof", app.id_proof.clone()),
        ("Status", app.status.to_string()),
        ("Submitted", timestamp(app.submitted_at)),
        ("Reviewed", app.reviewed_at.map(timestamp).unwrap_or_default()),
        ("Reviewed By", app.reviewed_by.clone().unwrap_or_default()),
    ];
    let mut out = String::from("<h1>Application Details</h1><dl>");
    for (label, value) in rows {
        let _ = write!(out, "<dt>{label}</dt><dd>{}</dd>", escape(&value));
    }
    out.push_str("</dl>");
    out.push_str(&review_buttons(app, csrf));
    if app.admission_letter_path.is_some() {
        let _ = write!(
            out,
            r#"<p><a href="/download_letter/{}">Admission letter</a></p>"#,
            app.id
        );
    }
    out
}
