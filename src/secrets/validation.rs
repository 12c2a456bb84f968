//! Name checks applied at the operator boundary, before records reach a store.

use super::error::{Result, SecretsError};
use super::types::SecretRecord;
use once_cell::sync::Lazy;
use regex::Regex;

static NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z0-9_]+$").expect("static regex is valid"));

pub fn is_valid_name(name: &str) -> bool {
    NAME_PATTERN.is_match(name)
}

pub fn validate_name(name: &str) -> Result<()> {
    validate_field("name", name)
}

/// An empty constant name is allowed; it means "bind under the secret name".
pub fn validate_constant_name(constant_name: &str) -> Result<()> {
    if constant_name.is_empty() {
        return Ok(());
    }
    validate_field("constant name", constant_name)
}

/// Validate every charset-constrained field of a record.
pub fn validate_record(record: &SecretRecord) -> Result<()> {
    validate_name(&record.name)?;
    if let Some(ref constant) = record.constant_name {
        validate_constant_name(constant)?;
    }
    Ok(())
}

fn validate_field(field: &'static str, value: &str) -> Result<()> {
    if is_valid_name(value) {
        Ok(())
    } else {
        Err(SecretsError::InvalidName {
            field,
            value: value.to_string(),
        })
    }
}
