//! HTML escaping of submitted values.
//!
//! Escaping is a single pass over the input, so an entity produced for one
//! character is never itself re-escaped.

use crate::validation::Submission;

/// Escape the five HTML-significant characters.
///
/// | Input | Output   |
/// |-------|----------|
/// | `&`   | `&amp;`  |
/// | `<`   | `&lt;`   |
/// | `>`   | `&gt;`   |
/// | `"`   | `&quot;` |
/// | `'`   | `&#39;`  |
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());

    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }

    out
}

/// A submission whose values are safe to interpolate into HTML.
///
/// Only constructible through [`EscapedSubmission::from_submission`], so the
/// renderer cannot be handed raw input by accident.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscapedSubmission(Submission);

impl EscapedSubmission {
    pub fn from_submission(raw: &Submission) -> Self {
        Self(Submission {
            firstname: escape_html(&raw.firstname),
            lastname: escape_html(&raw.lastname),
            phone: escape_html(&raw.phone),
            email: escape_html(&raw.email),
            message: escape_html(&raw.message),
        })
    }

    pub fn firstname(&self) -> &str {
        &self.0.firstname
    }

    pub fn lastname(&self) -> &str {
        &self.0.lastname
    }

    pub fn phone(&self) -> &str {
        &self.0.phone
    }

    pub fn email(&self) -> &str {
        &self.0.email
    }

    pub fn message(&self) -> &str {
        &self.0.message
    }
}
