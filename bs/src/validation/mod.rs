//! Per-field validation of mapped records

mod rules;
mod validator;

pub use rules::{FieldRules, Rule, RuleSet};
pub use validator::Validator;
