// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Author: Pushp Kharat

//! Error types for the pbcheck system.

use thiserror::Error;

/// Top-level error taxonomy of the checker.
///
/// Each kind maps to a distinct process exit code so scripts can tell a bad
/// proof from a bad input file or a checker bug.
#[derive(Error, Debug, Clone)]
pub enum CheckError {
    /// Structural or lexical failure in an input file.
    #[error("{file}:{line}:{column}: {message}")]
    Parse {
        file: String,
        line: usize,
        column: usize,
        message: String,
    },

    /// A rule's semantic check failed.
    #[error("verification failed at line {line}: {message}")]
    InvalidProof { line: usize, message: String },

    /// Rule or option not implemented in this build.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// A bug in the checker itself.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CheckError {
    /// Process exit code for this error kind.
    pub fn exit_code(&self) -> i32 {
        match self {
            CheckError::InvalidProof { .. } => 1,
            CheckError::Parse { .. } => 2,
            CheckError::Unsupported(_) => 3,
            CheckError::Internal(_) => 4,
        }
    }
}

/// Result type for whole-file checker operations.
pub type CheckResult<T> = Result<T, CheckError>;

/// A failure raised inside a rule, before the dispatcher knows the proof
/// line it belongs to. The dispatcher annotates it with file, line and
/// column and re-raises it as a [`CheckError`] of the same kind.
#[derive(Error, Debug, Clone)]
pub enum StepError {
    #[error("{0}")]
    Syntax(String),

    #[error("{0}")]
    Invalid(String),

    #[error("{0}")]
    Unsupported(String),

    #[error("{0}")]
    Internal(String),
}

impl StepError {
    pub fn syntax(message: impl Into<String>) -> Self {
        StepError::Syntax(message.into())
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        StepError::Invalid(message.into())
    }

    /// Attach a location, producing the corresponding [`CheckError`].
    pub fn at(self, file: &str, line: usize, column: usize) -> CheckError {
        match self {
            StepError::Syntax(message) => CheckError::Parse {
                file: file.to_string(),
                line,
                column,
                message,
            },
            StepError::Invalid(message) => CheckError::InvalidProof { line, message },
            StepError::Unsupported(message) => CheckError::Unsupported(message),
            StepError::Internal(message) => CheckError::Internal(message),
        }
    }
}

/// Result type for single-step operations.
pub type StepResult<T> = Result<T, StepError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        let invalid = StepError::invalid("no").at("p.pbp", 3, 1);
        assert_eq!(invalid.exit_code(), 1);

        let parse = StepError::syntax("bad token").at("p.pbp", 3, 7);
        assert_eq!(parse.exit_code(), 2);
        assert_eq!(parse.to_string(), "p.pbp:3:7: bad token");

        assert_eq!(CheckError::Unsupported("rule".into()).exit_code(), 3);
        assert_eq!(CheckError::Internal("bug".into()).exit_code(), 4);
    }
}
