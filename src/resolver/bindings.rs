use std::collections::BTreeMap;

use crate::secrets::{redact_secret, Result, SecretsError};

/// Outcome of [`BindingTable::define`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Definition {
    /// The name was unbound and now holds the value.
    Defined,
    /// The name already held exactly this value.
    Unchanged,
}

/// Append-only name → value table. A name, once bound, keeps its value for
/// the lifetime of the table.
#[derive(Default, Clone)]
pub struct BindingTable {
    values: BTreeMap<String, String>,
}

impl BindingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to `value`, or verify an existing binding is identical.
    pub fn define(&mut self, name: &str, value: &str) -> Result<Definition> {
        match self.values.get(name) {
            Some(existing) if existing == value => Ok(Definition::Unchanged),
            Some(_) => Err(SecretsError::BindingCollision {
                name: name.to_string(),
            }),
            None => {
                self.values.insert(name.to_string(), value.to_string());
                Ok(Definition::Defined)
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// One `export NAME='value'` line per binding, for `eval` in a POSIX shell.
    pub fn to_shell_exports(&self) -> String {
        self.values
            .iter()
            .map(|(name, value)| format!("export {name}={}\n", shell_quote(value)))
            .collect()
    }
}

impl std::fmt::Debug for BindingTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.values.iter().map(|(k, v)| (k, redact_secret(v))))
            .finish()
    }
}

/// Single-quote `value` for a POSIX shell.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}
