#![forbid(unsafe_code)]

pub mod auth;
pub mod common;
pub mod provider_secrets;
pub mod reminder;
pub mod task;

pub use common::{ContractViolation, ReasonCodeId, SchemaVersion, UtcTimestamp, Validate};
