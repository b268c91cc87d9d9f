//! Field validation over request [`Parameters`].
//!
//! A [`Validator`] is a list of checks, each pairing a field name with a
//! [`Rule`] and the message reported when the rule fails. Every rule except
//! [`Rule::Required`] accepts a missing or empty field, so optional fields
//! only need their type rule and mandatory ones add `Required` as well.
//!
//! | Rule               | Accepts                                              |
//! |--------------------|------------------------------------------------------|
//! | `Required`         | any value that is not null, `""`, `[]` or `{}`       |
//! | `Matches(regex)`   | strings the regex finds a match in                   |
//! | `Email`            | `name@host.tld` shaped addresses                     |
//! | `Int(compare)`     | `-?[0-9]+` fitting an `i64`, then `compare`          |
//! | `Float(compare)`   | `-?[0-9]+(.[0-9]+)?`, then `compare`                 |
//! | `Date(compare)`    | `YYYY-MM-DD` with optional `HH:MM[:SS]`, then `compare` |
//!
//! # Examples
//!
//! ```
//! use fasttrack::Parameters;
//! use fasttrack::validation::{Compare, Rule, Validator};
//!
//! let mut form = Parameters::new();
//! form.insert("email", "ann@example.com");
//! form.insert("age", "17");
//!
//! let validator = Validator::new()
//!     .required("email", "Email is required")
//!     .rule("email", Rule::Email, "Email is invalid")
//!     .rule("age", Rule::Int(Compare::Range(18, 130)), "You must be an adult");
//!
//! let errors = validator.validate(&form).unwrap_err();
//! assert_eq!(errors.messages(), vec!["You must be an adult"]);
//! assert_eq!(errors.message_for("age"), Some("You must be an adult"));
//! ```

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use thiserror::Error;

use crate::context::Parameters;

static INT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^-?[0-9]+$").expect("int pattern is valid"));

static FLOAT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-?[0-9]+(?:\.[0-9]+)?$").expect("float pattern is valid"));

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\w+(?:[.-]?\w+)*@\w+(?:[.-]?\w+)*(?:\.\w{2,})+$").expect("email pattern is valid")
});

const DATE_TIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"];
const DATE_FORMAT: &str = "%Y-%m-%d";

/// How a typed value is compared once it parsed.
#[derive(Debug, Clone, PartialEq)]
pub enum Compare<T> {
    /// Only check that the value parses.
    TypeCheck,
    Equal(T),
    NotEqual(T),
    GreaterThan(T),
    GreaterThanOrEqual(T),
    LessThan(T),
    LessThanOrEqual(T),
    /// Inclusive on both ends.
    Range(T, T),
}

impl<T: PartialOrd> Compare<T> {
    /// `true` if `value` satisfies this comparison.
    pub fn holds(&self, value: &T) -> bool {
        match self {
            Compare::TypeCheck => true,
            Compare::Equal(other) => value == other,
            Compare::NotEqual(other) => value != other,
            Compare::GreaterThan(other) => value > other,
            Compare::GreaterThanOrEqual(other) => value >= other,
            Compare::LessThan(other) => value < other,
            Compare::LessThanOrEqual(other) => value <= other,
            Compare::Range(min, max) => value >= min && value <= max,
        }
    }
}

/// A single validation rule.
#[derive(Debug, Clone)]
pub enum Rule {
    Required,
    Matches(Regex),
    Email,
    Int(Compare<i64>),
    Float(Compare<f64>),
    Date(Compare<NaiveDateTime>),
}

impl Rule {
    /// Check one field value; `None` means the field is absent.
    pub fn accepts(&self, value: Option<&Value>) -> bool {
        if let Rule::Required = self {
            return value.is_some_and(|value| !is_blank(value));
        }
        let Some(value) = value.filter(|value| !is_blank(value)) else {
            return true;
        };
        let Some(text) = scalar_text(value) else {
            return false;
        };

        match self {
            Rule::Required => true,
            Rule::Matches(regex) => regex.is_match(&text),
            Rule::Email => EMAIL.is_match(&text),
            Rule::Int(compare) => INT.is_match(&text) && text.parse::<i64>().is_ok_and(|n| compare.holds(&n)),
            Rule::Float(compare) => FLOAT.is_match(&text) && text.parse::<f64>().is_ok_and(|n| compare.holds(&n)),
            Rule::Date(compare) => parse_date_time(&text).is_some_and(|date| compare.holds(&date)),
        }
    }
}

/// Parse `YYYY-MM-DD`, optionally followed by `HH:MM` or `HH:MM:SS`.
///
/// A bare date is midnight.
pub fn parse_date_time(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    DATE_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, DATE_FORMAT)
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

#[derive(Debug, Clone)]
struct Check {
    field: String,
    rule: Rule,
    message: String,
}

/// An ordered list of field checks.
#[derive(Debug, Clone, Default)]
pub struct Validator {
    checks: Vec<Check>,
}

impl Validator {
    /// Create a validator with no checks
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a check of `field` against `rule`.
    pub fn rule(mut self, field: impl Into<String>, rule: Rule, message: impl Into<String>) -> Self {
        self.checks.push(Check {
            field: field.into(),
            rule,
            message: message.into(),
        });
        self
    }

    /// Shorthand for [`Rule::Required`].
    pub fn required(self, field: impl Into<String>, message: impl Into<String>) -> Self {
        self.rule(field, Rule::Required, message)
    }

    /// Number of checks
    pub fn len(&self) -> usize {
        self.checks.len()
    }

    /// `true` if no check was added
    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    /// Run every check against `params`.
    ///
    /// # Errors
    ///
    /// [`ValidationErrors`] listing each failed check in the order the checks
    /// were added.
    pub fn validate(&self, params: &Parameters) -> Result<(), ValidationErrors> {
        let failures: Vec<FieldError> = self
            .checks
            .iter()
            .filter(|check| !check.rule.accepts(params.value(&check.field)))
            .map(|check| FieldError {
                field: check.field.clone(),
                message: check.message.clone(),
            })
            .collect();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors(failures))
        }
    }
}

/// One failed check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Every check that failed during [`Validator::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("validation failed: {}", Messages(.0))]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    /// Returns every failed check.
    pub fn errors(&self) -> &[FieldError] {
        &self.0
    }

    /// The failure messages, in check order.
    pub fn messages(&self) -> Vec<&str> {
        self.0.iter().map(|error| error.message.as_str()).collect()
    }

    /// The first failure message reported for `field`.
    pub fn message_for(&self, field: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|error| error.field == field)
            .map(|error| error.message.as_str())
    }
}

struct Messages<'a>(&'a [FieldError]);

impl fmt::Display for Messages<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            f.write_str(&error.message)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn accepts(rule: &Rule, value: Value) -> bool {
        rule.accepts(Some(&value))
    }

    fn date(text: &str) -> NaiveDateTime {
        parse_date_time(text).unwrap()
    }

    #[test]
    fn required_rejects_missing_and_empty_values() {
        let rule = Rule::Required;
        assert!(!rule.accepts(None));
        assert!(!accepts(&rule, json!(null)));
        assert!(!accepts(&rule, json!("")));
        assert!(!accepts(&rule, json!([])));
        assert!(accepts(&rule, json!(" ")));
        assert!(accepts(&rule, json!(0)));
        assert!(accepts(&rule, json!(["a"])));
    }

    #[test]
    fn optional_fields_pass_every_other_rule_when_empty() {
        let rules = [
            Rule::Email,
            Rule::Int(Compare::Equal(3)),
            Rule::Float(Compare::GreaterThan(1.0)),
            Rule::Date(Compare::TypeCheck),
            Rule::Matches(Regex::new("^x$").unwrap()),
        ];
        for rule in &rules {
            assert!(rule.accepts(None), "{rule:?}");
            assert!(accepts(rule, json!("")), "{rule:?}");
        }
    }

    #[test]
    fn int_type_check_and_comparisons() {
        let plain = Rule::Int(Compare::TypeCheck);
        assert!(accepts(&plain, json!("-42")));
        assert!(accepts(&plain, json!(7)));
        assert!(!accepts(&plain, json!("4.2")));
        assert!(!accepts(&plain, json!("12abc")));
        assert!(!accepts(&plain, json!("99999999999999999999")));

        assert!(accepts(&Rule::Int(Compare::Equal(5)), json!("5")));
        assert!(accepts(&Rule::Int(Compare::NotEqual(5)), json!("6")));
        assert!(!accepts(&Rule::Int(Compare::GreaterThan(5)), json!("5")));
        assert!(accepts(&Rule::Int(Compare::GreaterThanOrEqual(5)), json!("5")));
        assert!(accepts(&Rule::Int(Compare::LessThan(5)), json!("-5")));
        assert!(!accepts(&Rule::Int(Compare::LessThanOrEqual(5)), json!("6")));

        let range = Rule::Int(Compare::Range(1, 10));
        assert!(accepts(&range, json!("1")));
        assert!(accepts(&range, json!("10")));
        assert!(!accepts(&range, json!("11")));
    }

    #[test]
    fn float_accepts_integers_and_decimals_only() {
        let rule = Rule::Float(Compare::Range(0.5, 2.5));
        assert!(accepts(&rule, json!("1")));
        assert!(accepts(&rule, json!("2.5")));
        assert!(!accepts(&rule, json!("2.51")));
        assert!(!accepts(&Rule::Float(Compare::TypeCheck), json!("1e3")));
        assert!(!accepts(&Rule::Float(Compare::TypeCheck), json!(".5")));
    }

    #[test]
    fn dates_parse_with_optional_time() {
        assert_eq!(date("2024-02-29"), date("2024-02-29 00:00:00"));
        assert_eq!(date("2024-02-29 08:30"), date("2024-02-29 08:30:00"));
        assert!(parse_date_time("2023-02-29").is_none());
        assert!(parse_date_time("2024-13-01").is_none());
        assert!(parse_date_time("2024-01-01 24:00").is_none());
        assert!(parse_date_time("01/02/2024").is_none());

        let window = Rule::Date(Compare::Range(date("2024-01-01"), date("2024-12-31 23:59:59")));
        assert!(accepts(&window, json!("2024-06-15 12:00")));
        assert!(!accepts(&window, json!("2025-01-01")));
        assert!(accepts(&Rule::Date(Compare::LessThan(date("2024-01-01"))), json!("2023-12-31")));
    }

    #[test]
    fn emails_and_patterns() {
        assert!(accepts(&Rule::Email, json!("ann.lee@mail.example.org")));
        assert!(!accepts(&Rule::Email, json!("ann@localhost")));
        assert!(!accepts(&Rule::Email, json!("not an email")));

        let slug = Rule::Matches(Regex::new("^[a-z0-9-]+$").unwrap());
        assert!(accepts(&slug, json!("hello-world")));
        assert!(!accepts(&slug, json!("Hello World")));
    }

    #[test]
    fn structured_values_fail_typed_rules() {
        assert!(!accepts(&Rule::Int(Compare::TypeCheck), json!(["1"])));
        assert!(!accepts(&Rule::Email, json!({ "a": "b" })));
    }

    #[test]
    fn validator_reports_every_failure_in_order() {
        let mut form = Parameters::new();
        form.insert("name", "");
        form.insert("age", "abc");
        form.insert("email", "ann@example.com");

        let validator = Validator::new()
            .required("name", "Name is required")
            .rule("age", Rule::Int(Compare::TypeCheck), "Age must be a number")
            .rule("email", Rule::Email, "Email is invalid")
            .required("terms", "Accept the terms");
        assert_eq!(validator.len(), 4);

        let errors = validator.validate(&form).unwrap_err();
        assert_eq!(
            errors.messages(),
            vec!["Name is required", "Age must be a number", "Accept the terms"]
        );
        assert_eq!(errors.message_for("email"), None);
        assert_eq!(
            errors.to_string(),
            "validation failed: Name is required; Age must be a number; Accept the terms"
        );
    }

    #[test]
    fn actions_can_propagate_failures() {
        fn comment(form: &Parameters) -> crate::Result<String> {
            Validator::new().required("body", "The comment is empty").validate(form)?;
            Ok("saved".to_owned())
        }

        let err = comment(&Parameters::new()).unwrap_err();
        assert!(matches!(err, crate::Error::Validation(_)));
        assert_eq!(err.to_string(), "validation failed: The comment is empty");
    }

    #[test]
    fn empty_validator_accepts_anything() {
        let validator = Validator::new();
        assert!(validator.is_empty());
        assert!(validator.validate(&Parameters::new()).is_ok());
    }
}
