//! Error types for flowtoll.
//!
//! Errors carry a stable machine code so callers (CLI, HTTP layers built on
//! top of the engine) can branch on them without parsing messages.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::expr::ExprError;

/// Result type alias for flowtoll operations.
pub type Result<T> = std::result::Result<T, Error>;

/// flowtoll error types.
#[derive(Error, Debug)]
pub enum Error {
    /// The definition text could not be read as YAML or JSON.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The definition is structurally unsound. Lists every violation found.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Caller-supplied inputs do not satisfy the definition.
    #[error("Input error: {0}")]
    Input(String),

    /// A step handler failed (network, malformed response, evaluation...).
    #[error("Step error: {0}")]
    Step(String),

    #[error("Expression error: {0}")]
    Expression(#[from] ExprError),

    /// The run was cancelled or exceeded its deadline.
    #[error("Execution cancelled: {0}")]
    Cancelled(String),

    #[error("Registry error: {0}")]
    Registry(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get the error code for programmatic handling.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Parse(_) => "PARSE_ERROR",
            Error::Validation(_) => "VALIDATION_ERROR",
            Error::Input(_) => "INPUT_ERROR",
            Error::Step(_) => "STEP_ERROR",
            Error::Expression(_) => "EXPRESSION_ERROR",
            Error::Cancelled(_) => "CANCELLED",
            Error::Registry(_) => "REGISTRY_ERROR",
            Error::Config(_) => "CONFIG_ERROR",
            Error::Http(_) => "HTTP_ERROR",
            Error::Yaml(_) => "YAML_ERROR",
            Error::Json(_) => "JSON_ERROR",
            Error::Io(_) => "IO_ERROR",
        }
    }

    /// Convert to a JSON error envelope.
    pub fn to_json(&self) -> serde_json::Value {
        let mut error = serde_json::json!({
            "code": self.code(),
            "message": self.to_string(),
        });
        if let Error::Validation(validation) = self {
            error["violations"] = serde_json::to_value(&validation.violations)
                .unwrap_or(serde_json::Value::Null);
        }
        serde_json::json!({
            "success": false,
            "error": error,
        })
    }
}

/// Category of a single definition violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ViolationKind {
    MissingField,
    UnknownStepType,
    DuplicateStepId,
    DuplicateInput,
    UnknownDependency,
    UnknownBranchStep,
    OwnershipConflict,
    InvalidValue,
    /// Back-edge path of a dependency cycle, first and last id equal.
    Cycle { path: Vec<String> },
}

/// One problem found in a workflow definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    #[serde(flatten)]
    pub kind: ViolationKind,
    pub message: String,
}

impl Violation {
    pub fn new(kind: ViolationKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn missing(field: &str) -> Self {
        Self::new(
            ViolationKind::MissingField,
            format!("Missing required field: {}", field),
        )
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(ViolationKind::InvalidValue, message)
    }
}

/// Aggregated definition error: every violation, not just the first.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    pub violations: Vec<Violation>,
}

impl ValidationError {
    pub fn new(violations: Vec<Violation>) -> Self {
        Self { violations }
    }

    /// Return `Ok(())` when nothing was collected.
    pub fn check(violations: Vec<Violation>) -> std::result::Result<(), Self> {
        if violations.is_empty() {
            Ok(())
        } else {
            Err(Self::new(violations))
        }
    }

    /// Find the first cycle violation, if any.
    pub fn cycle(&self) -> Option<&[String]> {
        self.violations.iter().find_map(|v| match &v.kind {
            ViolationKind::Cycle { path } => Some(path.as_slice()),
            _ => None,
        })
    }

    pub fn has_kind(&self, kind: &ViolationKind) -> bool {
        self.violations
            .iter()
            .any(|v| std::mem::discriminant(&v.kind) == std::mem::discriminant(kind))
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Validation failed with {} violation(s)",
            self.violations.len()
        )?;
        for violation in &self.violations {
            write!(f, "\n  - {}", violation.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}
