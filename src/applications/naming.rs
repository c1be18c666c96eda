use lazy_static::lazy_static;
use regex::Regex;
use time::{macros::format_description, OffsetDateTime};
use uuid::Uuid;

/// `APP` + `yyyymmdd` of `now` + 8 uppercase hex chars from a random v4 UUID.
pub fn generate_application_id(now: OffsetDateTime) -> String {
    let date = now
        .date()
        .format(format_description!("[year][month][day]"))
        .unwrap_or_default();
    let suffix = Uuid::new_v4().simple().to_string()[..8].to_uppercase();
    format!("APP{date}{suffix}")
}

pub fn is_application_id(candidate: &str) -> bool {
    lazy_static! {
        static ref APP_ID_RE: Regex = Regex::new(r"^APP\d{8}[0-9A-F]{8}$").unwrap();
    }
    APP_ID_RE.is_match(candidate)
}

/// Reduces an arbitrary client filename to a flat, portable name.
pub fn secure_filename(name: &str) -> String {
    lazy_static! {
        static ref UNSAFE_RE: Regex = Regex::new(r"[^A-Za-z0-9_.-]").unwrap();
    }
    let flat: String = name
        .chars()
        .filter(char::is_ascii)
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();
    let joined = flat.split_whitespace().collect::<Vec<_>>().join("_");
    UNSAFE_RE
        .replace_all(&joined, "")
        .trim_matches(|c| c == '.' || c == '_')
        .to_string()
}

/// Longest storage key the `applications` path columns hold.
pub const KEY_MAX: usize = 255;

/// Sanitizes `name` and cuts its stem so the result fits in [`KEY_MAX`],
/// keeping a short extension intact.
fn bounded_key(name: &str) -> String {
    let mut key = secure_filename(name);
    if key.len() <= KEY_MAX {
        return key;
    }
    // secure_filename output is ASCII, so byte offsets are char boundaries
    let ext = match key.rfind('.') {
        Some(dot) if key.len() - dot <= 16 => key[dot..].to_string(),
        _ => String::new(),
    };
    key.truncate(KEY_MAX - ext.len());
    key.push_str(&ext);
    key
}

pub fn degree_certificate_key(application_id: &str, original: &str) -> String {
    bounded_key(&format!("{application_id}_degree_{original}"))
}

pub fn id_proof_key(application_id: &str, original: &str) -> String {
    bounded_key(&format!("{application_id}_id_{original}"))
}

pub fn admission_letter_key(application_id: &str) -> String {
    format!("admission_letter_{application_id}.pdf")
}
