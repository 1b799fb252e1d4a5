//! Crate-wide error type tying the per-phase errors of each module together.
//!
//! Every phase (`dsl`, `semantic`, `interpreter`) already defines and displays
//! its own error type with a manual `impl Display` (see `dsl::DslError` for
//! the same shape one level down). `CryptosimError` is
//! just the next level of that same wrapping, so a caller driving the whole
//! pipeline (grammar generation through tokenize/parse/check/run) can
//! propagate a single error type with `?` without losing which phase failed.

use crate::dsl::DslError;
use crate::interpreter::RuntimeError;
use crate::semantic::SemanticError;
use std::fmt::{Display, Formatter};

#[derive(Debug)]
pub enum CryptosimError {
    Dsl(DslError),
    Semantic(SemanticError),
    Runtime(RuntimeError),
}

impl Display for CryptosimError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CryptosimError::Dsl(e) => write!(f, "{}", e),
            CryptosimError::Semantic(e) => write!(f, "{}", e),
            CryptosimError::Runtime(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for CryptosimError {}

impl From<DslError> for CryptosimError {
    fn from(e: DslError) -> Self {
        CryptosimError::Dsl(e)
    }
}

impl From<SemanticError> for CryptosimError {
    fn from(e: SemanticError) -> Self {
        CryptosimError::Semantic(e)
    }
}

impl From<RuntimeError> for CryptosimError {
    fn from(e: RuntimeError) -> Self {
        CryptosimError::Runtime(e)
    }
}
