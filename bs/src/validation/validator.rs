//! Rule evaluation over mapped records

use tracing::debug;

use super::rules::{FieldRules, Rule, RuleSet};
use crate::domain::{FieldError, MappedRecord, ValidationOutcome};
use crate::values::{is_valid_email, parse_date, parse_integer, parse_number};

/// Applies a rule set to mapped records
///
/// Every rule of every field is evaluated so a row reports all of its
/// problems at once. The record is passed through unchanged.
#[derive(Debug, Clone)]
pub struct Validator {
    rules: RuleSet,
}

impl Validator {
    pub fn new(rules: RuleSet) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Validate one record. `caller_scope` is the scope value the caller is
    /// restricted to, if any (e.g. a branch manager's branch id).
    pub fn validate(&self, record: MappedRecord, caller_scope: Option<&str>) -> ValidationOutcome {
        debug!(row = record.row, "Validator::validate: called");
        let mut errors = Vec::new();
        for field in self.rules.fields() {
            check_field(field, record.get(&field.field), caller_scope, &mut errors);
        }
        if !errors.is_empty() {
            debug!(row = record.row, count = errors.len(), "Validator::validate: record invalid");
        }
        ValidationOutcome { record, errors }
    }
}

fn check_field(field: &FieldRules, value: Option<&str>, caller_scope: Option<&str>, errors: &mut Vec<FieldError>) {
    for rule in &field.rules {
        if field.lenient && rule.is_format() {
            continue;
        }
        if let Some(message) = check_rule(rule, &field.label, value, caller_scope) {
            errors.push(FieldError::new(&field.field, message));
        }
    }
}

fn check_rule(rule: &Rule, label: &str, value: Option<&str>, caller_scope: Option<&str>) -> Option<String> {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return match (rule, caller_scope) {
            (Rule::Required, _) => Some(format!("{label} is required")),
            (Rule::ScopeAuthorized, Some(scope)) => Some(format!(
                "{label} is required and must be your permitted scope '{}'",
                scope.trim()
            )),
            _ => None,
        };
    };
    match rule {
        Rule::Required => None,
        Rule::Number => parse_number(value)
            .is_none()
            .then(|| format!("{label} must be a number, got '{value}'")),
        Rule::Integer { min } => match parse_integer(value) {
            None => Some(format!("{label} must be a whole number, got '{value}'")),
            Some(n) => match min {
                Some(min) if n < *min => Some(format!("{label} must be at least {min}")),
                _ => None,
            },
        },
        Rule::Date(order) => parse_date(value, *order)
            .is_none()
            .then(|| format!("{label} '{value}' is not a valid date")),
        Rule::Email => (!is_valid_email(value)).then(|| format!("Invalid email format for {label}")),
        Rule::OneOf(allowed) => (!allowed.iter().any(|a| a.eq_ignore_ascii_case(value)))
            .then(|| format!("Invalid {label} value '{value}', expected one of: {}", allowed.join(", "))),
        Rule::Length { min, max } => {
            let len = value.chars().count();
            match (min, max) {
                (Some(min), Some(max)) if len < *min || len > *max => {
                    Some(format!("{label} must be {min}-{max} characters"))
                }
                (Some(min), None) if len < *min => Some(format!("{label} must be at least {min} characters")),
                (None, Some(max)) if len > *max => Some(format!("{label} must be at most {max} characters")),
                _ => None,
            }
        }
        Rule::Pattern(re) => (!re.is_match(value)).then(|| format!("{label} '{value}' has an invalid format")),
        Rule::ScopeAuthorized => match caller_scope {
            Some(scope) if !scope.trim().eq_ignore_ascii_case(value) => Some(format!(
                "{label} '{value}' is outside your permitted scope '{}'",
                scope.trim()
            )),
            _ => None,
        },
    }
}
