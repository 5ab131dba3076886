use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationErrors};

use crate::error::AppError;

/// Violations
///
/// Field name to human-readable message. An empty map means the request is valid.
/// Keys are the wire (camelCase) field names so clients can map them straight back
/// onto their form inputs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Violations(BTreeMap<String, String>);

impl Violations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut violations = Self::new();
        violations.insert(field, message);
        violations
    }

    /// Sets the message for `field`, replacing any structural message already there.
    /// Used by handlers to inject cross-field rules after validation.
    pub fn insert(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.insert(field.into(), message.into());
    }

    /// Records `message` only if `field` has no violation yet.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_insert_with(|| message.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Pass/fail decision: `Ok` when nothing was violated.
    pub fn into_result(self) -> Result<(), AppError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self))
        }
    }
}

impl From<ValidationErrors> for Violations {
    fn from(errors: ValidationErrors) -> Self {
        let mut violations = Violations::new();
        for (field, failures) in errors.field_errors() {
            let field = camel_case(&field);
            let Some(first) = failures.first() else {
                continue;
            };
            let message = first
                .message
                .as_ref()
                .map(|m| m.to_string())
                .unwrap_or_else(|| format!("{field} is invalid"));
            violations.add(field, message);
        }
        violations
    }
}

/// Runs every declared rule of `request` and collects all violations; no field
/// short-circuits another.
pub fn check<T: Validate>(request: &T) -> Violations {
    match request.validate() {
        Ok(()) => Violations::new(),
        Err(errors) => Violations::from(errors),
    }
}

/// `confirm_password` -> `confirmPassword`. Already camelCase input is returned unchanged.
pub fn camel_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper_next = false;
    for ch in field.chars() {
        if ch == '_' {
            upper_next = !out.is_empty();
            continue;
        }
        if upper_next {
            out.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}

/// Lower-cased extension of `filename` including the dot, or `""` when it has none.
pub fn extension_of(filename: &str) -> String {
    match filename.rfind('.') {
        Some(dot) if dot + 1 < filename.len() => filename[dot..].to_ascii_lowercase(),
        _ => String::new(),
    }
}

/// Upload guard for an attached photo file. Extension and size problems are reported
/// under `photo`, alongside any structural violations already collected.
pub fn check_upload(
    violations: &mut Violations,
    filename: &str,
    size_bytes: usize,
    allowed_extensions: &[String],
    max_upload_kb: u64,
) {
    let extension = extension_of(filename);
    if !allowed_extensions.iter().any(|allowed| *allowed == extension) {
        violations.insert(
            "photo",
            format!("photo with {extension} extension is not allowed"),
        );
        return;
    }

    if size_bytes as u64 > max_upload_kb * 1024 {
        violations.insert(
            "photo",
            format!("photo file is too large, the photo is larger than {max_upload_kb}KB."),
        );
    }
}
