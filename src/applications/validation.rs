use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use time::{macros::format_description, Date};

use super::repo_types::Program;
use crate::letters;

pub const REQUIRED: &str = "This field is required.";
pub const INVALID_EMAIL: &str = "Invalid email address.";
pub const INVALID_DATE: &str = "Date must be in YYYY-MM-DD format";
pub const INVALID_GPA: &str = "GPA must be a number between 0.0 and 4.0";
pub const INVALID_CHOICE: &str = "Not a valid choice.";
pub const MISSING_DOCUMENTS: &str = "Please upload both required documents.";
pub const NOT_PRINTABLE: &str = "Only Latin characters can be used in this field.";

pub const EMAIL_MAX: usize = 120;

/// Messages keyed by form field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_default().push(message.into());
    }

    pub fn get(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

/// Raw text fields of the submission form, as typed by the applicant.
#[derive(Debug, Clone, Default)]
pub struct ApplicationForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub date_of_birth: String,
    pub address: String,
    pub program: String,
    pub previous_education: String,
    pub gpa: String,
}

impl ApplicationForm {
    /// Sets a text field by its form name; unknown names are ignored.
    pub fn set(&mut self, name: &str, value: String) {
        let slot = match name {
            "first_name" => &mut self.first_name,
            "last_name" => &mut self.last_name,
            "email" => &mut self.email,
            "phone" => &mut self.phone,
            "date_of_birth" => &mut self.date_of_birth,
            "address" => &mut self.address,
            "program" => &mut self.program,
            "previous_education" => &mut self.previous_education,
            "gpa" => &mut self.gpa,
            _ => return,
        };
        *slot = value;
    }
}

/// Form fields after every rule passed.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidApplication {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub date_of_birth: Date,
    pub address: String,
    pub program: Program,
    pub previous_education: String,
    pub gpa: f64,
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub fn parse_date_of_birth(raw: &str) -> Option<Date> {
    Date::parse(raw, format_description!("[year]-[month]-[day]")).ok()
}

/// Finite value in `[0.0, 4.0]`, bounds included.
pub fn parse_gpa(raw: &str) -> Option<f64> {
    raw.parse::<f64>()
        .ok()
        .filter(|gpa| (0.0..=4.0).contains(gpa))
}

fn required<'a>(errors: &mut FieldErrors, field: &str, raw: &'a str) -> Option<&'a str> {
    let value = raw.trim();
    if value.is_empty() {
        errors.add(field, REQUIRED);
        None
    } else {
        Some(value)
    }
}

// Values printed on the admission letter.
fn printable(errors: &mut FieldErrors, field: &str, value: &str) {
    if !letters::is_printable(value) {
        errors.add(field, NOT_PRINTABLE);
    }
}

fn length(errors: &mut FieldErrors, field: &str, value: &str, min: usize, max: Option<usize>) {
    let n = value.chars().count();
    match max {
        Some(max) if n < min || n > max => errors.add(
            field,
            format!("Field must be between {min} and {max} characters long."),
        ),
        None if n < min => {
            errors.add(field, format!("Field must be at least {min} characters long."))
        }
        _ => {}
    }
}

pub fn validate(form: &ApplicationForm) -> Result<ValidApplication, FieldErrors> {
    let mut errors = FieldErrors::default();

    let first_name = required(&mut errors, "first_name", &form.first_name);
    if let Some(v) = first_name {
        length(&mut errors, "first_name", v, 2, Some(50));
        printable(&mut errors, "first_name", v);
    }
    let last_name = required(&mut errors, "last_name", &form.last_name);
    if let Some(v) = last_name {
        length(&mut errors, "last_name", v, 2, Some(50));
        printable(&mut errors, "last_name", v);
    }
    let email = required(&mut errors, "email", &form.email);
    if let Some(v) = email {
        if v.chars().count() > EMAIL_MAX {
            errors.add(
                "email",
                format!("Field cannot be longer than {EMAIL_MAX} characters."),
            );
        } else if !is_valid_email(v) {
            errors.add("email", INVALID_EMAIL);
        }
        printable(&mut errors, "email", v);
    }
    let phone = required(&mut errors, "phone", &form.phone);
    if let Some(v) = phone {
        length(&mut errors, "phone", v, 10, Some(15));
        printable(&mut errors, "phone", v);
    }
    let date_of_birth = required(&mut errors, "date_of_birth", &form.date_of_birth).and_then(|v| {
        let parsed = parse_date_of_birth(v);
        if parsed.is_none() {
            errors.add("date_of_birth", INVALID_DATE);
        }
        parsed
    });
    let address = required(&mut errors, "address", &form.address);
    if let Some(v) = address {
        length(&mut errors, "address", v, 10, None);
    }
    let program = required(&mut errors, "program", &form.program).and_then(|v| {
        let parsed = v.parse::<Program>().ok();
        if parsed.is_none() {
            errors.add("program", INVALID_CHOICE);
        }
        parsed
    });
    let previous_education =
        required(&mut errors, "previous_education", &form.previous_education);
    let gpa = required(&mut errors, "gpa", &form.gpa).and_then(|v| {
        let parsed = parse_gpa(v);
        if parsed.is_none() {
            errors.add("gpa", INVALID_GPA);
        }
        parsed
    });

    match (
        errors.is_empty(),
        first_name,
        last_name,
        email,
        phone,
        date_of_birth,
        address,
        program,
        previous_education,
        gpa,
    ) {
        (
            true,
            Some(first_name),
            Some(last_name),
            Some(email),
            Some(phone),
            Some(date_of_birth),
            Some(address),
            Some(program),
            Some(previous_education),
            Some(gpa),
        ) => Ok(ValidApplication {
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            email: email.to_string(),
            phone: phone.to_string(),
            date_of_birth,
            address: address.to_string(),
            program,
            previous_education: previous_education.to_string(),
            gpa,
        }),
        _ => Err(errors),
    }
}
