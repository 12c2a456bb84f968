//! Secret record model and the operator-facing service.
//!
//! 1. **Model**: [`SecretRecord`] with its load context and status
//! 2. **Validation**: the `^[A-Z0-9_]+$` charset for names and binding names
//! 3. **Service**: validated create / update / delete across both stores

pub mod error;
pub mod service;
pub mod types;
pub mod validation;

pub use error::{ErrorKind, Result, SecretsError};
pub use service::{NewSecret, SecretUpdate, SecretsService};
pub use types::{redact_secret, LoadContext, RecordStatus, SecretRecord};
