//! Field rule definitions

use regex::Regex;

use crate::values::DateOrder;

/// A single check applied to one canonical field
#[derive(Debug, Clone)]
pub enum Rule {
    /// Field must be present and non-empty
    Required,
    /// Parses as a decimal number (thousands separators allowed)
    Number,
    /// Parses as a whole number, optionally with a lower bound
    Integer { min: Option<i64> },
    /// ISO date, or a slash date in the given order
    Date(DateOrder),
    Email,
    /// Value must be one of the listed values (case-insensitive)
    OneOf(Vec<String>),
    /// Character count bounds
    Length { min: Option<usize>, max: Option<usize> },
    Pattern(Regex),
    /// Value must equal the caller's permitted scope when the caller is restricted
    ScopeAuthorized,
}

impl Rule {
    /// Format rules are skipped for lenient fields; unparseable values are
    /// dropped from the payload instead
    pub fn is_format(&self) -> bool {
        matches!(
            self,
            Self::Number | Self::Integer { .. } | Self::Date(_) | Self::Email | Self::Pattern(_)
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Required => "required",
            Self::Number => "number",
            Self::Integer { .. } => "integer",
            Self::Date(_) => "date",
            Self::Email => "email",
            Self::OneOf(_) => "one-of",
            Self::Length { .. } => "length",
            Self::Pattern(_) => "pattern",
            Self::ScopeAuthorized => "scope",
        }
    }
}

/// Rules for one canonical field
#[derive(Debug, Clone)]
pub struct FieldRules {
    pub field: String,
    /// Human-readable name used in messages
    pub label: String,
    pub lenient: bool,
    pub rules: Vec<Rule>,
}

impl FieldRules {
    pub fn new(field: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            label: label.into(),
            lenient: false,
            rules: Vec::new(),
        }
    }

    pub fn rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn lenient(mut self, lenient: bool) -> Self {
        self.lenient = lenient;
        self
    }

    pub fn is_required(&self) -> bool {
        self.rules.iter().any(|r| matches!(r, Rule::Required))
    }
}

/// Ordered rules for all fields of a profile
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    fields: Vec<FieldRules>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, rules: FieldRules) {
        self.fields.push(rules);
    }

    pub fn with(mut self, rules: FieldRules) -> Self {
        self.push(rules);
        self
    }

    pub fn fields(&self) -> &[FieldRules] {
        &self.fields
    }

    /// Canonical names of fields carrying a `Required` rule
    pub fn required_fields(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|f| f.is_required())
            .map(|f| f.field.clone())
            .collect()
    }
}
