#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

use crate::common::validate_token;
use crate::{ContractViolation, Validate};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Result<Self, ContractViolation> {
        let v = Self(id.into());
        v.validate()?;
        Ok(v)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for TaskId {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_token("task_id", &self.0, 128)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Open,
    Completed,
}

/// Opaque label emitted by the category classifier collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryLabel(String);

impl CategoryLabel {
    pub fn new(label: impl Into<String>) -> Result<Self, ContractViolation> {
        let v = Self(label.into());
        v.validate()?;
        Ok(v)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for CategoryLabel {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_token("category_label", &self.0, 64)
    }
}

/// Opaque label emitted by the priority classifier collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityLabel(String);

impl PriorityLabel {
    pub fn new(label: impl Into<String>) -> Result<Self, ContractViolation> {
        let v = Self(label.into());
        v.validate()?;
        Ok(v)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for PriorityLabel {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_token("priority_label", &self.0, 32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_task_contract_01_blank_ids_refused() {
        assert!(TaskId::new("   ").is_err());
        assert!(TaskId::new("task_000001").is_ok());
    }
}
