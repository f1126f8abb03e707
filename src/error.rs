//   Copyright (c) 2024-2026 Anton Kundenko <singaraiona@gmail.com>
//   All rights reserved.
//
//   Permission is hereby granted, free of charge, to any person obtaining a copy
//   of this software and associated documentation files (the "Software"), to deal
//   in the Software without restriction, including without limitation the rights
//   to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
//   copies of the Software, and to permit persons to whom the Software is
//   furnished to do so, subject to the following conditions:
//
//   The above copyright notice and this permission notice shall be included in all
//   copies or substantial portions of the Software.
//
//   THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
//   IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
//   FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
//   AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
//   LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
//   OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
//   SOFTWARE.

use thiserror::Error;

use crate::store::DType;

/// Error values returned by graph construction, execution and loading.
///
/// Schema-related variants (`UnknownColumn`, `DuplicateColumn`, `Schema`,
/// `InvalidArgument`) are raised while the graph is being built. The
/// remaining variants surface from a pass or from I/O.
#[derive(Error, Debug)]
pub enum Error {
    #[error("unknown column '{0}'")]
    UnknownColumn(String),

    #[error("duplicate column '{0}'")]
    DuplicateColumn(String),

    #[error("schema error: {0}")]
    Schema(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("aggregator already finalized")]
    AlreadyFinalized,

    #[error("type mismatch for '{column}': expected {expected}, found {found}")]
    TypeMismatch {
        column: String,
        expected: DType,
        found: DType,
    },

    #[error("callback failed: {0}")]
    Callback(String),

    #[error("pass cancelled")]
    Cancelled,

    #[error("expression error: {0}")]
    Expr(#[from] crate::sql::ExprError),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Wrap a failure raised inside a user predicate or transform.
    pub fn callback(msg: impl std::fmt::Display) -> Self {
        Error::Callback(msg.to_string())
    }

    /// True for errors that can only be produced at graph-construction time.
    pub fn is_schema_error(&self) -> bool {
        matches!(
            self,
            Error::UnknownColumn(_)
                | Error::DuplicateColumn(_)
                | Error::Schema(_)
                | Error::InvalidArgument(_)
                | Error::Expr(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
