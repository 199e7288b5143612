//! Compiled import plan

use crate::domain::KeySpec;
use crate::executor::WritePolicy;
use crate::mapper::AliasTable;
use crate::payload::PayloadBuilder;
use crate::scheduler::BatchOverride;
use crate::validation::Validator;

/// Everything the engine needs to run one import feature
#[derive(Debug, Clone)]
pub struct ImportPlan {
    pub name: String,
    /// Store resource the records live in (e.g. `nic_cc_customer`)
    pub resource: String,
    pub aliases: AliasTable,
    pub validator: Validator,
    pub builder: PayloadBuilder,
    pub key: KeySpec,
    /// Field narrowing the existing records loaded for a run
    pub scope_field: Option<String>,
    pub write: WritePolicy,
    pub batch: BatchOverride,
}

impl ImportPlan {
    /// Required canonical fields that must be present as input columns.
    /// The scope field is supplied by the run, not the file.
    pub fn required_columns(&self) -> Vec<String> {
        self.validator
            .rules()
            .required_fields()
            .into_iter()
            .filter(|f| Some(f) != self.scope_field.as_ref())
            .collect()
    }
}
