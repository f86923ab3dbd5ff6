//! Delimited credential parsing
//!
//! Operators pass a single secret string per platform, e.g. `token;tenant;rid`.
//! Each platform declares a [`CredentialShape`]; parsing fails up front when the
//! number of `;`-separated fields falls outside that shape, so malformed input
//! never reaches the network.

use crate::errors::{MlokitError, Result};
use std::fmt;

/// Field separator used by every platform credential
pub const FIELD_SEPARATOR: char = ';';

/// Expected layout of a platform credential
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CredentialShape {
    /// Platform name used in error messages
    pub platform: &'static str,
    /// Minimum number of fields; these must all be non-empty
    pub min_fields: usize,
    /// Maximum number of fields; trailing optional fields may be empty
    pub max_fields: usize,
    /// Human readable layout, e.g. `token;tenant[;app_rid]`
    pub layout: &'static str,
}

impl CredentialShape {
    /// Shape with exactly `fields` required fields
    pub const fn exact(platform: &'static str, fields: usize, layout: &'static str) -> Self {
        Self {
            platform,
            min_fields: fields,
            max_fields: fields,
            layout,
        }
    }

    /// Shape with `min` required fields and up to `max - min` optional ones
    pub const fn range(
        platform: &'static str,
        min: usize,
        max: usize,
        layout: &'static str,
    ) -> Self {
        Self {
            platform,
            min_fields: min,
            max_fields: max,
            layout,
        }
    }

    /// Split `raw` into positional fields, enforcing this shape.
    pub fn parse(&self, raw: &str) -> Result<Credential> {
        let fields: Vec<String> = raw.split(FIELD_SEPARATOR).map(str::to_string).collect();

        if fields.len() < self.min_fields || fields.len() > self.max_fields {
            let expected = if self.min_fields == self.max_fields {
                self.min_fields.to_string()
            } else {
                format!("{}..={}", self.min_fields, self.max_fields)
            };
            return Err(MlokitError::credential(
                self.platform,
                format!(
                    "expected {expected} field(s) ({}), got {}",
                    self.layout,
                    fields.len()
                ),
            ));
        }

        if let Some(idx) = fields[..self.min_fields]
            .iter()
            .position(|field| field.is_empty())
        {
            return Err(MlokitError::credential(
                self.platform,
                format!("field {} of {} is empty", idx + 1, self.layout),
            ));
        }

        Ok(Credential {
            platform: self.platform,
            fields,
        })
    }
}

/// A parsed credential. Field values are never printed by `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    platform: &'static str,
    fields: Vec<String>,
}

impl Credential {
    /// Platform this credential was parsed for
    pub fn platform(&self) -> &'static str {
        self.platform
    }

    /// Number of positional fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the credential has no fields (never true for a parsed credential)
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Required or optional field by position
    pub fn field(&self, index: usize) -> Option<&str> {
        self.fields.get(index).map(String::as_str)
    }

    /// Optional field by position, treating an empty value as absent
    pub fn optional_field(&self, index: usize) -> Option<&str> {
        self.field(index).filter(|value| !value.is_empty())
    }

    /// Consume the credential, yielding its fields
    pub fn into_fields(self) -> Vec<String> {
        self.fields
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("platform", &self.platform)
            .field("fields", &format_args!("<{} redacted>", self.fields.len()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PALANTIR: CredentialShape =
        CredentialShape::range("palantir", 2, 3, "token;tenant[;app_rid]");
    const MLFLOW: CredentialShape = CredentialShape::exact("mlflow", 2, "username;password");

    #[test]
    fn test_range_shape_accepts_optional_field() {
        let two = PALANTIR.parse("tok;acme.palantirfoundry.com").unwrap();
        assert_eq!(two.len(), 2);
        assert_eq!(two.optional_field(2), None);

        let three = PALANTIR
            .parse("tok;acme.palantirfoundry.com;ri.compass.main.folder.1")
            .unwrap();
        assert_eq!(three.field(1), Some("acme.palantirfoundry.com"));
        assert_eq!(three.optional_field(2), Some("ri.compass.main.folder.1"));
    }

    #[test]
    fn test_field_count_mismatch_fails() {
        let err = MLFLOW.parse("only-user").unwrap_err();
        assert!(matches!(err, MlokitError::Credential { .. }));
        assert!(err.to_string().contains("expected 2 field(s)"));

        assert!(MLFLOW.parse("user;pass;extra").is_err());
        assert!(PALANTIR.parse("a;b;c;d").is_err());
    }

    #[test]
    fn test_required_field_must_be_non_empty() {
        let err = MLFLOW.parse(";pass").unwrap_err();
        assert!(err.to_string().contains("field 1"));
        // trailing optional field may be empty
        let cred = PALANTIR.parse("tok;tenant;").unwrap();
        assert_eq!(cred.optional_field(2), None);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let cred = MLFLOW.parse("admin;hunter2").unwrap();
        let rendered = format!("{cred:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("admin"));
        assert!(rendered.contains("mlflow"));
    }
}
