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


//! String expressions compiled into predicates and transforms.
//!
//! Expressions use SQL syntax (`pt > 30 AND len(muons) >= 2`) and are
//! parsed with `sqlparser`. Identifiers are resolved against the schema of
//! the node the expression is attached to, so an unknown column fails as a
//! schema error before any row is read.

pub mod expr;

use crate::error::Result;
use crate::func::{Predicate, Transform};
use crate::graph::Node;
use crate::store::{DType, Value};

use self::expr::{mismatch, CompiledExpr};

/// Errors produced by the expression layer.
#[derive(Debug)]
pub enum ExprError {
    /// SQL syntax error from the parser.
    Parse(String),
    /// Planning error (unsupported construct, operand types, etc.).
    Plan(String),
}

impl std::fmt::Display for ExprError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExprError::Parse(msg) => write!(f, "parse error: {msg}"),
            ExprError::Plan(msg) => write!(f, "planning error: {msg}"),
        }
    }
}

impl std::error::Error for ExprError {}

impl Node {
    /// Keep rows for which the boolean expression holds.
    pub fn filter_expr(&self, expr: &str) -> Result<Node> {
        let (predicate, inputs) = compile_filter(self, expr)?;
        self.filter(predicate, &as_refs(&inputs))
    }

    /// Named variant of [`Node::filter_expr`], listed by [`Node::report`].
    pub fn filter_expr_named(&self, name: &str, expr: &str) -> Result<Node> {
        let (predicate, inputs) = compile_filter(self, expr)?;
        self.filter_named(name, predicate, &as_refs(&inputs))
    }

    /// Define a column computed by an expression. The column type is the
    /// inferred type of the expression.
    pub fn define_expr(&self, name: &str, expr: &str) -> Result<Node> {
        let CompiledExpr {
            scalar,
            dtype,
            inputs,
        } = CompiledExpr::compile(expr, self.schema())?;
        let transform = Transform::new(dtype, move |row| scalar.eval(row));
        self.define(name, transform, &as_refs(&inputs))
    }
}

fn compile_filter(node: &Node, expr: &str) -> Result<(Predicate, Vec<String>)> {
    let CompiledExpr {
        scalar,
        dtype,
        inputs,
    } = CompiledExpr::compile(expr, node.schema())?;
    if dtype != DType::Bool {
        return Err(ExprError::Plan(format!("filter '{expr}' must be BOOLEAN, got {dtype}")).into());
    }
    let predicate = Predicate::new(move |row| match scalar.eval(row)? {
        Value::Bool(b) => Ok(b),
        other => Err(mismatch(DType::Bool, &other)),
    });
    Ok((predicate, inputs))
}

fn as_refs(names: &[String]) -> Vec<&str> {
    names.iter().map(String::as_str).collect()
}
