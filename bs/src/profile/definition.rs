//! Import profile definitions as loaded from YAML

use std::collections::HashSet;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::plan::ImportPlan;
use crate::domain::{KeySpec, Payload};
use crate::error::SyncError;
use crate::executor::{InvalidationRule, WriteMode, WritePolicy};
use crate::mapper::AliasTable;
use crate::payload::{FieldKind, GeneratedField, PayloadBuilder, PayloadField};
use crate::scheduler::BatchOverride;
use crate::validation::{FieldRules, Rule, RuleSet, Validator};
use crate::values::DateOrder;

/// One import feature: its columns, rules, identity and write behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportProfile {
    /// Defaults to the file stem when loaded from a directory
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Store resource (e.g. `nic_cc_agent`)
    pub resource: String,

    /// Field holding the run scope value (e.g. `data_as_of_date`)
    #[serde(rename = "scope-field", default, skip_serializing_if = "Option::is_none")]
    pub scope_field: Option<String>,

    /// Fields forming the identity key, in order
    pub key: Vec<String>,

    #[serde(rename = "key-case-insensitive", default)]
    pub key_case_insensitive: bool,

    #[serde(default)]
    pub mode: WriteMode,

    #[serde(rename = "skip-unchanged", default)]
    pub skip_unchanged: bool,

    #[serde(default)]
    pub batch: BatchOverride,

    pub fields: Vec<FieldSpec>,

    /// Values used on create when a row does not supply the field
    #[serde(default, skip_serializing_if = "Payload::is_empty")]
    pub defaults: Payload,

    /// Values sent only on create
    #[serde(rename = "on-create", default, skip_serializing_if = "Payload::is_empty")]
    pub on_create: Payload,

    /// Derived-state invalidation rules applied on update
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub invalidate: Vec<InvalidationRule>,

    /// Values generated for each created record
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub generate: Vec<GeneratedField>,

    /// Fields set to the creation time (RFC 3339, UTC)
    #[serde(rename = "timestamp-on-create", default, skip_serializing_if = "Vec::is_empty")]
    pub timestamp_on_create: Vec<String>,
}

/// A canonical field: header aliases, type and rules
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldSpec {
    pub name: String,

    /// Name used in messages; defaults to `name`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Accepted header spellings besides the canonical name
    pub aliases: Vec<String>,

    pub kind: FieldKind,

    pub required: bool,

    /// Unparseable values are dropped instead of rejecting the row
    pub lenient: bool,

    #[serde(rename = "one-of")]
    pub one_of: Vec<String>,

    #[serde(rename = "min-length", skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,

    #[serde(rename = "max-length", skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,

    /// Lower bound for integer fields
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,

    /// Must match the caller's permitted scope when the caller is restricted
    #[serde(rename = "scope-restricted")]
    pub scope_restricted: bool,

    #[serde(rename = "date-order")]
    pub date_order: DateOrder,
}

impl FieldSpec {
    fn label(&self) -> String {
        self.label.clone().unwrap_or_else(|| self.name.clone())
    }

    fn rules(&self) -> Result<FieldRules, SyncError> {
        let mut rules = FieldRules::new(&self.name, self.label()).lenient(self.lenient);
        if self.required {
            rules = rules.rule(Rule::Required);
        }
        match self.kind {
            FieldKind::Text => {}
            FieldKind::Number => rules = rules.rule(Rule::Number),
            FieldKind::Integer => rules = rules.rule(Rule::Integer { min: self.min }),
            FieldKind::Date => rules = rules.rule(Rule::Date(self.date_order)),
            FieldKind::Email => rules = rules.rule(Rule::Email),
        }
        if self.min.is_some() && self.kind != FieldKind::Integer {
            return Err(SyncError::InvalidConfig(format!(
                "field '{}': min only applies to integer fields",
                self.name
            )));
        }
        if !self.one_of.is_empty() {
            rules = rules.rule(Rule::OneOf(self.one_of.clone()));
        }
        if self.min_length.is_some() || self.max_length.is_some() {
            rules = rules.rule(Rule::Length {
                min: self.min_length,
                max: self.max_length,
            });
        }
        if let Some(pattern) = &self.pattern {
            let re = Regex::new(pattern)
                .map_err(|e| SyncError::InvalidConfig(format!("field '{}': bad pattern: {}", self.name, e)))?;
            rules = rules.rule(Rule::Pattern(re));
        }
        if self.scope_restricted {
            rules = rules.rule(Rule::ScopeAuthorized);
        }
        Ok(rules)
    }

    fn payload_field(&self) -> PayloadField {
        PayloadField::new(&self.name, self.kind)
            .lenient(self.lenient)
            .date_order(self.date_order)
    }
}

impl ImportProfile {
    /// Check the profile and turn it into an executable plan
    pub fn compile(&self) -> Result<ImportPlan, SyncError> {
        debug!(name = %self.name, "ImportProfile::compile: called");
        let invalid = |msg: String| SyncError::InvalidConfig(format!("profile '{}': {}", self.name, msg));

        if self.name.trim().is_empty() {
            return Err(SyncError::InvalidConfig("profile name is empty".to_string()));
        }
        if self.resource.trim().is_empty() {
            return Err(invalid("resource is empty".to_string()));
        }
        if self.fields.is_empty() {
            return Err(invalid("no fields declared".to_string()));
        }
        if self.key.is_empty() {
            return Err(invalid("key is empty".to_string()));
        }

        let mut seen = HashSet::new();
        for field in &self.fields {
            if field.name.trim().is_empty() {
                return Err(invalid("field with empty name".to_string()));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(invalid(format!("field '{}' declared twice", field.name)));
            }
        }
        for part in &self.key {
            if !seen.contains(part.as_str()) && Some(part) != self.scope_field.as_ref() {
                return Err(invalid(format!("key field '{}' is not a declared field", part)));
            }
        }
        for rule in &self.invalidate {
            if rule.when_changed.is_empty() {
                return Err(invalid("invalidation rule watches no fields".to_string()));
            }
        }

        let mut aliases = AliasTable::new();
        let mut rules = RuleSet::new();
        let mut payload_fields = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            aliases.insert(&field.name, field.aliases.iter().cloned());
            rules.push(field.rules().map_err(|e| invalid(e.to_string()))?);
            payload_fields.push(field.payload_field());
        }

        let builder = PayloadBuilder::new(payload_fields)
            .with_defaults(self.defaults.clone())
            .with_on_create(self.on_create.clone())
            .with_generated(self.generate.clone())
            .with_timestamps(self.timestamp_on_create.clone());

        Ok(ImportPlan {
            name: self.name.clone(),
            resource: self.resource.clone(),
            aliases,
            validator: Validator::new(rules),
            builder,
            key: KeySpec::new(self.key.iter().cloned(), self.key_case_insensitive),
            scope_field: self.scope_field.clone(),
            write: WritePolicy {
                mode: self.mode,
                skip_unchanged: self.skip_unchanged,
                invalidation: self.invalidate.clone(),
            },
            batch: self.batch.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
name: contacts
resource: contact
key: [email]
key-case-insensitive: true
fields:
  - name: email
    label: Email
    aliases: ["Email Address"]
    kind: email
    required: true
  - name: age
    kind: integer
    min: 18
"#;

    #[test]
    fn test_deserialize_and_compile() {
        let profile: ImportProfile = serde_yaml::from_str(MINIMAL).unwrap();
        assert_eq!(profile.mode, WriteMode::Upsert);
        assert!(profile.key_case_insensitive);

        let plan = profile.compile().unwrap();
        assert_eq!(plan.required_columns(), vec!["email".to_string()]);
        assert_eq!(
            plan.aliases.spellings("email").unwrap(),
            &["email".to_string(), "Email Address".to_string()]
        );
        assert_eq!(plan.validator.rules().fields().len(), 2);
        assert!(plan.scope_field.is_none());
    }

    #[test]
    fn test_key_must_reference_declared_field() {
        let mut profile: ImportProfile = serde_yaml::from_str(MINIMAL).unwrap();
        profile.key = vec!["mobile".to_string()];
        assert!(matches!(profile.compile(), Err(SyncError::InvalidConfig(_))));
    }

    #[test]
    fn test_scope_field_may_complete_key() {
        let mut profile: ImportProfile = serde_yaml::from_str(MINIMAL).unwrap();
        profile.scope_field = Some("period".to_string());
        profile.key = vec!["email".to_string(), "period".to_string()];
        assert!(profile.compile().is_ok());
    }

    #[test]
    fn test_bad_pattern_rejected() {
        let mut profile: ImportProfile = serde_yaml::from_str(MINIMAL).unwrap();
        profile.fields[1].pattern = Some("([".to_string());
        let err = profile.compile().unwrap_err();
        assert!(err.to_string().contains("bad pattern"));
    }

    #[test]
    fn test_min_only_for_integers() {
        let mut profile: ImportProfile = serde_yaml::from_str(MINIMAL).unwrap();
        profile.fields[1].kind = FieldKind::Number;
        assert!(profile.compile().is_err());
    }

    #[test]
    fn test_duplicate_field_rejected() {
        let mut profile: ImportProfile = serde_yaml::from_str(MINIMAL).unwrap();
        let dup = profile.fields[0].clone();
        profile.fields.push(dup);
        assert!(profile.compile().is_err());
    }
}
