//! Typed payload construction from validated records

use std::collections::BTreeMap;

use chrono::{SecondsFormat, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use tracing::debug;

use crate::domain::{FieldError, MappedRecord, Payload};
use crate::scope::ScopeFilter;
use crate::values::{DateOrder, clean_email, is_valid_email, normalize_date, parse_integer, parse_number};

/// Unambiguous characters for generated secrets (no 0/O, 1/l/I)
const PASSWORD_CHARSET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZabcdefghijkmnpqrstuvwxyz23456789";

pub const DEFAULT_GENERATED_LENGTH: usize = 10;

/// How a field's text is converted into its JSON value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldKind {
    #[default]
    Text,
    Number,
    Integer,
    Date,
    Email,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadField {
    pub name: String,
    pub kind: FieldKind,
    pub lenient: bool,
    pub date_order: DateOrder,
}

impl PayloadField {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            lenient: false,
            date_order: DateOrder::default(),
        }
    }

    pub fn lenient(mut self, lenient: bool) -> Self {
        self.lenient = lenient;
        self
    }

    pub fn date_order(mut self, order: DateOrder) -> Self {
        self.date_order = order;
        self
    }

    pub(crate) fn convert(&self, text: &str) -> Option<Value> {
        match self.kind {
            FieldKind::Text => Some(Value::String(text.to_string())),
            FieldKind::Number => parse_number(text).and_then(number_value),
            FieldKind::Integer => parse_integer(text).map(Value::from),
            FieldKind::Date => normalize_date(text, self.date_order).map(Value::String),
            FieldKind::Email => {
                let email = clean_email(text);
                is_valid_email(&email).then_some(Value::String(email))
            }
        }
    }
}

fn number_value(n: f64) -> Option<Value> {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        Some(Value::from(n as i64))
    } else {
        Number::from_f64(n).map(Value::Number)
    }
}

/// A value generated for each created record and reported back to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedField {
    pub field: String,
    #[serde(default = "default_generated_length")]
    pub length: usize,
}

fn default_generated_length() -> usize {
    DEFAULT_GENERATED_LENGTH
}

/// Converts validated records into store payloads
#[derive(Debug, Clone, Default)]
pub struct PayloadBuilder {
    fields: Vec<PayloadField>,
    defaults: Payload,
    on_create: Payload,
    generate: Vec<GeneratedField>,
    timestamps: Vec<String>,
}

impl PayloadBuilder {
    pub fn new(fields: Vec<PayloadField>) -> Self {
        Self {
            fields,
            ..Self::default()
        }
    }

    /// Values inserted on create when the record does not supply the field.
    /// Updates never carry them, so stored values survive a re-import.
    pub fn with_defaults(mut self, defaults: Payload) -> Self {
        self.defaults = defaults;
        self
    }

    /// Values sent only when creating a record
    pub fn with_on_create(mut self, on_create: Payload) -> Self {
        self.on_create = on_create;
        self
    }

    pub fn with_generated(mut self, generate: Vec<GeneratedField>) -> Self {
        self.generate = generate;
        self
    }

    /// Fields stamped with the current time on create
    pub fn with_timestamps(mut self, timestamps: Vec<String>) -> Self {
        self.timestamps = timestamps;
        self
    }

    pub fn field(&self, name: &str) -> Option<&PayloadField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Build the payload for one record
    ///
    /// Empty values are omitted. Unparseable values of lenient fields are
    /// dropped; for other fields they are errors. The scope value, when
    /// present, overrides whatever the row carried for the scope field.
    /// Defaults are not applied here; see [`Self::apply_create_extras`].
    pub fn build(&self, record: &MappedRecord, scope: Option<&ScopeFilter>) -> Result<Payload, Vec<FieldError>> {
        debug!(row = record.row, "PayloadBuilder::build: called");
        let mut payload = Payload::new();
        let mut errors = Vec::new();

        for field in &self.fields {
            let Some(text) = record.get(&field.name).map(str::trim).filter(|t| !t.is_empty()) else {
                continue;
            };
            match field.convert(text) {
                Some(value) => {
                    payload.insert(field.name.clone(), value);
                }
                None if field.lenient => {
                    debug!(row = record.row, field = %field.name, %text, "PayloadBuilder::build: dropping unparseable lenient value");
                }
                None => errors.push(FieldError::new(
                    &field.name,
                    format!("{} value '{}' cannot be converted", field.name, text),
                )),
            }
        }

        if let Some(scope) = scope {
            let value = self
                .field(&scope.field)
                .and_then(|f| f.convert(&scope.value))
                .unwrap_or_else(|| Value::String(scope.value.clone()));
            payload.insert(scope.field.clone(), value);
        }

        if errors.is_empty() { Ok(payload) } else { Err(errors) }
    }

    /// Whether creating a record adds anything beyond the base payload
    pub fn has_create_extras(&self) -> bool {
        !self.defaults.is_empty()
            || !self.on_create.is_empty()
            || !self.generate.is_empty()
            || !self.timestamps.is_empty()
    }

    /// Extend a payload with defaults and create-only values. Returns the
    /// generated values so the caller can report them (e.g. initial passwords).
    pub fn apply_create_extras(&self, payload: &mut Payload) -> BTreeMap<String, String> {
        for (name, value) in self.defaults.iter().chain(&self.on_create) {
            if !payload.contains_key(name) {
                payload.insert(name.clone(), value.clone());
            }
        }
        if !self.timestamps.is_empty() {
            let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
            for name in &self.timestamps {
                payload.insert(name.clone(), Value::String(now.clone()));
            }
        }
        let mut generated = BTreeMap::new();
        for spec in &self.generate {
            let secret = generate_secret(spec.length);
            payload.insert(spec.field.clone(), Value::String(secret.clone()));
            generated.insert(spec.field.clone(), secret);
        }
        generated
    }
}

/// Random string drawn from an unambiguous alphabet
pub fn generate_secret(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| PASSWORD_CHARSET[rng.random_range(0..PASSWORD_CHARSET.len())] as char)
        .collect()
}
