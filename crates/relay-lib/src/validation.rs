// ============================
// crates/relay-lib/src/validation.rs
// ============================
//! Bounds checking for client-supplied payloads.

use pairlink_common::Criteria;
use thiserror::Error;

// Common validation constants
const MAX_NAME_LENGTH: usize = 50;
const MAX_GENDER_LENGTH: usize = 16;
const MAX_INTERESTS: usize = 10;
const MAX_INTEREST_LENGTH: usize = 32;
const MAX_TEXT_LENGTH: usize = 2000;
const MAX_SDP_BYTES: usize = 128 * 1024;
const MAX_CANDIDATE_BYTES: usize = 4 * 1024;

/// Possible validation errors
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Invalid name: {0}")]
    InvalidName(String),

    #[error("Invalid gender tag: {0}")]
    InvalidGender(String),

    #[error("Invalid interest tags: {0}")]
    InvalidInterests(String),

    #[error("Invalid chat text: {0}")]
    InvalidText(String),

    #[error("Invalid signaling payload: {0}")]
    InvalidPayload(String),
}

/// Result type for validation operations
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validate declared criteria and return a normalized copy: trimmed,
/// lowercased, deduplicated interest tags so pool matching can use plain
/// string equality.
pub fn validate_criteria(criteria: &Criteria) -> ValidationResult<Criteria> {
    if criteria.name.len() > MAX_NAME_LENGTH {
        return Err(ValidationError::InvalidName(format!(
            "name must be at most {MAX_NAME_LENGTH} characters"
        )));
    }
    if criteria.name.chars().any(char::is_control) {
        return Err(ValidationError::InvalidName(
            "name must not contain control characters".to_string(),
        ));
    }

    if criteria.gender.len() > MAX_GENDER_LENGTH {
        return Err(ValidationError::InvalidGender(format!(
            "gender tag must be at most {MAX_GENDER_LENGTH} characters"
        )));
    }

    if criteria.interests.len() > MAX_INTERESTS {
        return Err(ValidationError::InvalidInterests(format!(
            "at most {MAX_INTERESTS} interest tags allowed"
        )));
    }

    let mut interests: Vec<String> = Vec::with_capacity(criteria.interests.len());
    for tag in &criteria.interests {
        let tag = tag.trim();
        if tag.is_empty() {
            continue;
        }
        if tag.len() > MAX_INTEREST_LENGTH {
            return Err(ValidationError::InvalidInterests(format!(
                "interest tags must be at most {MAX_INTEREST_LENGTH} characters"
            )));
        }
        let tag = tag.to_lowercase();
        if !interests.contains(&tag) {
            interests.push(tag);
        }
    }

    Ok(Criteria {
        gender: criteria.gender.trim().to_string(),
        interests,
        name: criteria.name.trim().to_string(),
        mode: criteria.mode,
        continuous: criteria.continuous,
    })
}

/// Validate a chat line.
pub fn validate_text(text: &str) -> ValidationResult<()> {
    if text.is_empty() {
        return Err(ValidationError::InvalidText(
            "chat text must not be empty".to_string(),
        ));
    }
    if text.len() > MAX_TEXT_LENGTH {
        return Err(ValidationError::InvalidText(format!(
            "chat text must be at most {MAX_TEXT_LENGTH} bytes"
        )));
    }
    Ok(())
}

/// Validate a connection description payload (offer or answer).
pub fn validate_description(sdp: &serde_json::Value) -> ValidationResult<()> {
    validate_payload_size(sdp, MAX_SDP_BYTES, "connection description")
}

/// Validate a network-path candidate payload.
pub fn validate_candidate(candidate: &serde_json::Value) -> ValidationResult<()> {
    validate_payload_size(candidate, MAX_CANDIDATE_BYTES, "candidate")
}

fn validate_payload_size(
    payload: &serde_json::Value,
    limit: usize,
    what: &str,
) -> ValidationResult<()> {
    if payload.is_null() {
        return Err(ValidationError::InvalidPayload(format!(
            "{what} must not be null"
        )));
    }
    let size = payload.to_string().len();
    if size > limit {
        return Err(ValidationError::InvalidPayload(format!(
            "{what} of {size} bytes exceeds the {limit} byte limit"
        )));
    }
    Ok(())
}
