//! Submission payload validation.
//!
//! A valid body is a JSON object with exactly the five form fields, every
//! value a non-empty string, and a syntactically plausible email address.
//! Checks run in a fixed order and stop at the first failure:
//!
//! 1. The body parses as JSON
//! 2. The value is an object
//! 3. The object has exactly [`FIELD_NAMES`]`.len()` keys
//! 4. No value is the empty string
//! 5. The keys are exactly [`FIELD_NAMES`] and every value is a string
//! 6. `email` passes [`validate_email`]

use serde_json::{Map, Value};

use crate::error::ValidationError;

// =============================================================================
// Field Names
// =============================================================================

pub const FIELD_FIRSTNAME: &str = "firstname";
pub const FIELD_LASTNAME: &str = "lastname";
pub const FIELD_PHONE: &str = "phone";
pub const FIELD_EMAIL: &str = "email";
pub const FIELD_MESSAGE: &str = "message";

/// Every accepted key, in template order.
pub const FIELD_NAMES: [&str; 5] = [
    FIELD_FIRSTNAME,
    FIELD_LASTNAME,
    FIELD_PHONE,
    FIELD_EMAIL,
    FIELD_MESSAGE,
];

/// Characters allowed in an email local part besides ASCII alphanumerics.
const LOCAL_PART_SPECIALS: &str = "!#$%&'*+/=?^_`{|}~-";

/// A validated contact form submission. Values are raw, not yet escaped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub firstname: String,
    pub lastname: String,
    pub phone: String,
    pub email: String,
    pub message: String,
}

/// Parse and validate a request body.
///
/// # Errors
///
/// Returns the first [`ValidationError`] encountered, in the order listed in
/// the module documentation.
pub fn parse_submission(body: &[u8]) -> Result<Submission, ValidationError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| ValidationError::MalformedJson(e.to_string()))?;

    let Value::Object(mut fields) = value else {
        return Err(ValidationError::NotAnObject);
    };

    if fields.len() != FIELD_NAMES.len() {
        return Err(ValidationError::WrongFieldCount {
            expected: FIELD_NAMES.len(),
            found: fields.len(),
        });
    }

    if let Some((key, _)) = fields
        .iter()
        .find(|(_, v)| v.as_str().is_some_and(str::is_empty))
    {
        return Err(ValidationError::EmptyField(key.clone()));
    }

    if let Some(key) = fields.keys().find(|k| !FIELD_NAMES.contains(&k.as_str())) {
        return Err(ValidationError::UnexpectedField(key.clone()));
    }

    let submission = Submission {
        firstname: take_string(&mut fields, FIELD_FIRSTNAME)?,
        lastname: take_string(&mut fields, FIELD_LASTNAME)?,
        phone: take_string(&mut fields, FIELD_PHONE)?,
        email: take_string(&mut fields, FIELD_EMAIL)?,
        message: take_string(&mut fields, FIELD_MESSAGE)?,
    };

    validate_email(&submission.email)?;

    Ok(submission)
}

fn take_string(fields: &mut Map<String, Value>, name: &str) -> Result<String, ValidationError> {
    match fields.remove(name) {
        Some(Value::String(s)) => Ok(s),
        // Key count and key names were checked, so absence cannot happen here
        Some(_) | None => Err(ValidationError::NotAString(name.to_string())),
    }
}

/// Validate email syntax.
///
/// Rules (case-insensitive, the whole value must match):
/// - Local part: one or more atoms of ASCII alphanumerics and
///   ``!#$%&'*+/=?^_`{|}~-``, joined by single dots
/// - Exactly one `@`
/// - Domain: at least two dot-separated labels
/// - Each label is ASCII alphanumeric with optional hyphens, never at either end
///
/// This is a syntax check only. Deliverability is the mail server's concern.
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    let Some((local, domain)) = email.split_once('@') else {
        return Err(ValidationError::InvalidEmail);
    };

    if !local.split('.').all(is_local_atom) {
        return Err(ValidationError::InvalidEmail);
    }

    let mut labels = 0usize;
    for label in domain.split('.') {
        if !is_domain_label(label) {
            return Err(ValidationError::InvalidEmail);
        }
        labels += 1;
    }

    if labels < 2 {
        return Err(ValidationError::InvalidEmail);
    }

    Ok(())
}

fn is_local_atom(atom: &str) -> bool {
    !atom.is_empty()
        && atom
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || LOCAL_PART_SPECIALS.contains(c))
}

fn is_domain_label(label: &str) -> bool {
    let bytes = label.as_bytes();

    match (bytes.first(), bytes.last()) {
        (Some(first), Some(last)) => {
            first.is_ascii_alphanumeric()
                && last.is_ascii_alphanumeric()
                && bytes.iter().all(|b| b.is_ascii_alphanumeric() || *b == b'-')
        }
        _ => false,
    }
}
