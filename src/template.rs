//! Mail body template.
//!
//! The template is read once at startup. Rendering replaces each placeholder
//! occurrence with the matching escaped field in a single left-to-right scan:
//! inserted text is never rescanned, so a submitted value that happens to
//! contain `%EMAIL%` is copied through literally.

use std::path::Path;

use tracing::{debug, warn};

use crate::error::TemplateError;
use crate::sanitize::EscapedSubmission;

pub const PLACEHOLDER_FIRSTNAME: &str = "%FIRSTNAME%";
pub const PLACEHOLDER_LASTNAME: &str = "%LASTNAME%";
pub const PLACEHOLDER_PHONE: &str = "%PHONE%";
pub const PLACEHOLDER_EMAIL: &str = "%EMAIL%";
pub const PLACEHOLDER_MESSAGE: &str = "%MESSAGE%";

pub const PLACEHOLDERS: [&str; 5] = [
    PLACEHOLDER_FIRSTNAME,
    PLACEHOLDER_LASTNAME,
    PLACEHOLDER_PHONE,
    PLACEHOLDER_EMAIL,
    PLACEHOLDER_MESSAGE,
];

/// An HTML mail template with `%FIELD%` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
}

impl Template {
    /// Read the template from disk.
    ///
    /// Placeholders absent from the file are logged; the template is still
    /// accepted since the corresponding field simply won't appear in the mail.
    ///
    /// # Errors
    ///
    /// Returns `TemplateError::Unreadable` on I/O failure and
    /// `TemplateError::Empty` when the file has no non-whitespace content.
    pub async fn load(path: &Path) -> Result<Self, TemplateError> {
        let path_display = path.display().to_string();

        let source = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| TemplateError::Unreadable {
                path: path_display.clone(),
                source,
            })?;

        if source.trim().is_empty() {
            return Err(TemplateError::Empty(path_display));
        }

        let template = Self::from_string(source);
        let missing = template.missing_placeholders();
        if missing.is_empty() {
            debug!(path = %path_display, bytes = template.source.len(), "Loaded mail template");
        } else {
            warn!(path = %path_display, missing = ?missing, "Mail template lacks placeholders");
        }

        Ok(template)
    }

    pub fn from_string(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    /// Placeholders that never occur in the template.
    pub fn missing_placeholders(&self) -> Vec<&'static str> {
        PLACEHOLDERS
            .into_iter()
            .filter(|p| !self.source.contains(p))
            .collect()
    }

    /// Substitute every placeholder occurrence with the escaped field value.
    pub fn render(&self, fields: &EscapedSubmission) -> String {
        let mut out = String::with_capacity(self.source.len() + 256);
        let mut rest = self.source.as_str();

        while let Some(start) = rest.find('%') {
            let (before, tail) = rest.split_at(start);
            out.push_str(before);

            let (consumed, replacement) = match Self::match_placeholder(tail, fields) {
                Some((placeholder, value)) => (placeholder.len(), value),
                None => (1, "%"),
            };
            out.push_str(replacement);
            rest = tail.get(consumed..).unwrap_or_default();
        }

        out.push_str(rest);
        out
    }

    fn match_placeholder<'a>(
        tail: &str,
        fields: &'a EscapedSubmission,
    ) -> Option<(&'static str, &'a str)> {
        [
            (PLACEHOLDER_FIRSTNAME, fields.firstname()),
            (PLACEHOLDER_LASTNAME, fields.lastname()),
            (PLACEHOLDER_PHONE, fields.phone()),
            (PLACEHOLDER_EMAIL, fields.email()),
            (PLACEHOLDER_MESSAGE, fields.message()),
        ]
        .into_iter()
        .find(|(placeholder, _)| tail.starts_with(placeholder))
    }
}
