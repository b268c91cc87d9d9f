//! XSS injection scan.
//!
//! Request-derived values (query strings, form bodies, route captures) are
//! walked recursively; any string leaf containing the opening of a `script`,
//! `link`, `form`, `frame`/`iframe`/`frameset`, `meta`, `input`, `select` or
//! `button` tag aborts the request with
//! [`Error::SuspiciousInputDetected`]. Matching is case-insensitive and allows
//! whitespace and a closing slash after the `<`. Keys are not scanned.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::warn;

use crate::context::Parameters;
use crate::error::{Error, Result};

static SUSPICIOUS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<\s*/?\s*(?:script|link|form|i?frame|frameset|meta|input|select|button)")
        .expect("injection pattern is valid")
});

/// `true` if `text` contains a blacklisted tag opening.
///
/// # Examples
///
/// ```
/// use fasttrack::security::is_suspicious;
///
/// assert!(is_suspicious("<script>alert(1)</script>"));
/// assert!(is_suspicious("< / IFRAME"));
/// assert!(!is_suspicious("1 < 2 and <b>bold</b>"));
/// ```
pub fn is_suspicious(text: &str) -> bool {
    SUSPICIOUS.is_match(text)
}

/// Scan every value of `params`; `label` names the input in the error.
pub fn check_parameters(params: &Parameters, label: &str) -> Result<()> {
    params.iter().try_for_each(|(_, value)| check_value(value, label))
}

/// Scan `value` and everything nested in it.
pub fn check_value(value: &Value, label: &str) -> Result<()> {
    match value {
        Value::String(text) if is_suspicious(text) => {
            warn!(input = label, "suspicious value detected");
            Err(Error::SuspiciousInputDetected {
                label: label.to_owned(),
            })
        }
        Value::Array(items) => items.iter().try_for_each(|item| check_value(item, label)),
        Value::Object(fields) => fields.values().try_for_each(|field| check_value(field, label)),
        _ => Ok(()),
    }
}
