use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use lazy_static::lazy_static;
use tracing::error;

fn argon2_failure(op: &'static str) -> impl Fn(argon2::password_hash::Error) -> anyhow::Error {
    move |e| {
        error!(error = %e, op, "argon2 failure");
        anyhow::anyhow!("{op}: {e}")
    }
}

/// Argon2id PHC string with a fresh random salt.
pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(argon2_failure("hash password"))?
        .to_string())
}

pub fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(argon2_failure("parse stored hash"))?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

lazy_static! {
    // same parameters as real accounts, so a miss costs as much as a hit
    static ref ABSENT_ACCOUNT_HASH: String =
        hash_password("no account has this password").unwrap_or_default();
}

/// Burns one verification for a username that does not exist. Always false.
pub fn verify_absent_account(plain: &str) -> bool {
    let _ = verify_password(plain, &ABSENT_ACCOUNT_HASH);
    false
}
