//! Import profiles embedded in the binary

use tracing::debug;

const CUSTOMERS: &str = include_str!("../../profiles/customers.yml");
const AGENTS: &str = include_str!("../../profiles/agents.yml");
const POLICIES: &str = include_str!("../../profiles/policies.yml");
const PAYMENTS: &str = include_str!("../../profiles/payments.yml");

/// Names of the builtin profiles, in load order
pub const BUILTIN_NAMES: &[&str] = &["customers", "agents", "policies", "payments"];

/// Get the embedded profile YAML by name
pub fn get_builtin(name: &str) -> Option<&'static str> {
    debug!(%name, "get_builtin: called");
    match name {
        "customers" => Some(CUSTOMERS),
        "agents" => Some(AGENTS),
        "policies" => Some(POLICIES),
        "payments" => Some(PAYMENTS),
        _ => {
            debug!(%name, "get_builtin: unknown profile");
            None
        }
    }
}
