//! Field rules for resources.
//!
//! Validation collects every failing field instead of stopping at the first
//! one, so a client sees the whole list in a single `InvalidObject` reply.
//! Spec types implement [`Validate`] by calling the rule helpers on a
//! [`Validator`], which tracks the JSON field path for each error.

use std::{collections::BTreeMap, fmt};

use base64::{Engine as _, engine::general_purpose::STANDARD};

/// Maximum length of an RFC 1035 label.
pub const DNS_LABEL_MAX_LEN: usize = 63;

/// One failing rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// JSON path of the field, e.g. `spec.scm.name`.
    pub path: String,
    /// Rule that failed.
    pub message: String,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Every failing rule of one object, in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    /// The individual failures.
    #[must_use]
    pub fn errors(&self) -> &[FieldError] {
        &self.0
    }

    /// Returns `true` if nothing failed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns `true` if a failure was recorded for `path`.
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.0.iter().any(|error| error.path == path)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

/// Implemented by every spec type.
pub trait Validate {
    /// Records each failing rule on `validator`.
    fn validate(&self, validator: &mut Validator);
}

impl<T: Validate> Validate for Option<T> {
    fn validate(&self, validator: &mut Validator) {
        if let Some(inner) = self {
            inner.validate(validator);
        }
    }
}

/// Collects [`FieldError`]s while walking a resource.
#[derive(Debug, Default)]
pub struct Validator {
    path: Vec<String>,
    errors: Vec<FieldError>,
}

impl Validator {
    /// Creates a validator rooted at the document top level.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Finishes validation.
    ///
    /// # Errors
    ///
    /// Returns every recorded failure if there was at least one.
    pub fn finish(self) -> Result<(), ValidationErrors> {
        if self.errors.is_empty() { Ok(()) } else { Err(ValidationErrors(self.errors)) }
    }

    fn field_path(&self, field: &str) -> String {
        let mut path = self.path.join(".");
        if !field.is_empty() {
            if !path.is_empty() && !field.starts_with('[') {
                path.push('.');
            }
            path.push_str(field);
        }
        path
    }

    /// Records a failure for `field` under the current path.
    pub fn error(&mut self, field: &str, message: impl Into<String>) {
        let path = self.field_path(field);
        self.errors.push(FieldError { path, message: message.into() });
    }

    /// Validates `value` with its fields nested under `field`.
    pub fn nested<T: Validate + ?Sized>(&mut self, field: &str, value: &T) {
        self.path.push(field.to_owned());
        value.validate(self);
        self.path.pop();
    }

    /// Validates every element of `items` under `field[i]`.
    pub fn each<T: Validate>(&mut self, field: &str, items: &[T]) {
        for (i, item) in items.iter().enumerate() {
            self.nested(&format!("{field}[{i}]"), item);
        }
    }

    /// Requires a non-empty string.
    pub fn required(&mut self, field: &str, value: &str) -> bool {
        if value.is_empty() {
            self.error(field, "is required");
            return false;
        }
        true
    }

    /// Requires a non-empty string that is an RFC 1035 label.
    pub fn dns_label(&mut self, field: &str, value: &str) {
        if self.required(field, value) {
            self.optional_dns_label(field, value);
        }
    }

    /// Checks the RFC 1035 label rule when `value` is set.
    pub fn optional_dns_label(&mut self, field: &str, value: &str) {
        if !value.is_empty() && !is_dns_label(value) {
            self.error(
                field,
                format!(
                    "{value:?} must be an RFC 1035 label (lowercase alphanumerics or '-', starting \
                     with a letter, at most {DNS_LABEL_MAX_LEN} characters)"
                ),
            );
        }
    }

    /// Requires every entry of `values` to be an RFC 1035 label.
    pub fn dns_labels(&mut self, field: &str, values: &[String]) {
        for (i, value) in values.iter().enumerate() {
            self.dns_label(&format!("{field}[{i}]"), value);
        }
    }

    /// Requires an absolute `http` or `https` URL.
    pub fn url(&mut self, field: &str, value: &str) {
        if self.required(field, value) {
            self.optional_url(field, value);
        }
    }

    /// Checks the URL rule when `value` is set.
    pub fn optional_url(&mut self, field: &str, value: &str) {
        if value.is_empty() {
            return;
        }
        match url::Url::parse(value) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {},
            Ok(parsed) => {
                self.error(field, format!("unsupported URL scheme {:?}", parsed.scheme()));
            },
            Err(err) => self.error(field, format!("invalid URL: {err}")),
        }
    }

    /// Requires standard base64.
    pub fn base64(&mut self, field: &str, value: &str) {
        if self.required(field, value) {
            self.optional_base64(field, value);
        }
    }

    /// Checks the base64 rule when `value` is set.
    pub fn optional_base64(&mut self, field: &str, value: &str) {
        if !value.is_empty() && STANDARD.decode(value).is_err() {
            self.error(field, "must be valid base64");
        }
    }

    /// Requires an IPv4 or IPv6 address.
    pub fn ip(&mut self, field: &str, value: &str) {
        if self.required(field, value) && value.parse::<std::net::IpAddr>().is_err() {
            self.error(field, format!("{value:?} is not an IP address"));
        }
    }

    /// Requires a non-empty map.
    pub fn non_empty_map<V>(&mut self, field: &str, value: &BTreeMap<String, V>) -> bool {
        if value.is_empty() {
            self.error(field, "is required");
            return false;
        }
        true
    }

    /// Requires a non-empty list.
    pub fn non_empty_list<T>(&mut self, field: &str, value: &[T]) -> bool {
        if value.is_empty() {
            self.error(field, "must contain at least one entry");
            return false;
        }
        true
    }
}

/// Returns `true` if `value` is an RFC 1035 label: 1 to 63 lowercase ASCII
/// letters, digits or `-`, starting with a letter and ending with a letter
/// or digit.
#[must_use]
pub fn is_dns_label(value: &str) -> bool {
    let bytes = value.as_bytes();
    let (Some(first), Some(last)) = (bytes.first(), bytes.last()) else {
        return false;
    };
    bytes.len() <= DNS_LABEL_MAX_LEN
        && first.is_ascii_lowercase()
        && (last.is_ascii_lowercase() || last.is_ascii_digit())
        && bytes.iter().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
}
