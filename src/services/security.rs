use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::CONFIG;
use crate::error::{AppError, Result};

/// Minimum accepted password length
pub const MIN_PASSWORD_LENGTH: usize = 12;

/// Session token claims
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // User id
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
}

/// Hash a password using bcrypt
pub fn hash_password(password: &str) -> Result<String> {
    bcrypt::hash(password, bcrypt::DEFAULT_COST)
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))
}

/// Verify a password against its hash
pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

/// Secret words are compared case-insensitively and without surrounding whitespace
fn normalize_secret_word(word: &str) -> String {
    word.trim().to_lowercase()
}

pub fn hash_secret_word(word: &str) -> Result<String> {
    hash_password(&normalize_secret_word(word))
}

pub fn verify_secret_word(word: &str, hash: &str) -> bool {
    verify_password(&normalize_secret_word(word), hash)
}

/// Check a candidate password against the account password policy.
///
/// Returns the first rule that fails, as a user-facing message.
pub fn validate_password(password: &str) -> Result<()> {
    let fail = |msg: &str| Err(AppError::BadRequest(msg.to_string()));

    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return fail("Password must be at least 12 characters long.");
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return fail("Password must contain an uppercase letter.");
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        return fail("Password must contain a lowercase letter.");
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return fail("Password must contain a digit.");
    }
    if password.chars().all(|c| c.is_ascii_alphanumeric()) {
        return fail("Password must contain a symbol.");
    }
    Ok(())
}

/// Create a signed session token for a user
pub fn create_session_token(user_id: i64) -> Result<String> {
    create_session_token_with_ttl(user_id, CONFIG.auth.session_ttl_secs)
}

pub fn create_session_token_with_ttl(user_id: i64, ttl_secs: i64) -> Result<String> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        exp: (now + Duration::seconds(ttl_secs)).timestamp(),
        iat: now.timestamp(),
        jti: uuid::Uuid::new_v4().to_string(),
    };

    let key = EncodingKey::from_secret(CONFIG.auth.secret_key.as_bytes());
    encode(&Header::new(Algorithm::HS256), &claims, &key).map_err(|e| e.into())
}

/// Decode and validate a session token
pub fn decode_session_token(token: &str) -> Result<Claims> {
    let key = DecodingKey::from_secret(CONFIG.auth.secret_key.as_bytes());

    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    validation.leeway = 0;

    let token_data = decode::<Claims>(token, &key, &validation)?;
    Ok(token_data.claims)
}

/// Random URL-safe token, used for stored file-name suffixes
pub fn generate_random_string(length: usize) -> String {
    let bytes: Vec<u8> = (0..length).map(|_| rand::random::<u8>()).collect();
    hex::encode(bytes)
}
