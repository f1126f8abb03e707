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

//! User row functions bound to named input columns.
//!
//! A [`Predicate`] decides whether a row survives a filter; a [`Transform`]
//! computes the value of a defined column. Both receive a [`Row`] holding
//! the values of their declared input columns, in declaration order.

use std::fmt;
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::store::{DType, Value};

// ---------------------------------------------------------------------------
// Row: view over the bound input values of one row
// ---------------------------------------------------------------------------

/// Input values of one row, in the order the columns were bound.
pub struct Row<'a> {
    names: &'a [String],
    values: &'a [Value],
}

impl<'a> Row<'a> {
    pub(crate) fn new(names: &'a [String], values: &'a [Value]) -> Self {
        Row { names, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Raw value of input `i`.
    pub fn value(&self, i: usize) -> Result<&'a Value> {
        self.values.get(i).ok_or_else(|| {
            Error::InvalidArgument(format!(
                "input {i} requested, {} column(s) bound",
                self.values.len()
            ))
        })
    }

    /// Value of the bound input called `name`.
    pub fn get(&self, name: &str) -> Result<&'a Value> {
        let pos = self
            .names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| Error::UnknownColumn(name.to_string()))?;
        Ok(&self.values[pos])
    }

    fn mismatch(&self, i: usize, expected: DType, found: &Value) -> Error {
        Error::TypeMismatch {
            column: self.names.get(i).cloned().unwrap_or_default(),
            expected,
            found: found.dtype(),
        }
    }

    /// Input `i` as f64 (bool and integer inputs widen).
    pub fn f64(&self, i: usize) -> Result<f64> {
        let v = self.value(i)?;
        v.as_f64().ok_or_else(|| self.mismatch(i, DType::F64, v))
    }

    pub fn i64(&self, i: usize) -> Result<i64> {
        let v = self.value(i)?;
        v.as_i64().ok_or_else(|| self.mismatch(i, DType::I64, v))
    }

    pub fn bool(&self, i: usize) -> Result<bool> {
        let v = self.value(i)?;
        v.as_bool().ok_or_else(|| self.mismatch(i, DType::Bool, v))
    }

    pub fn str(&self, i: usize) -> Result<&'a str> {
        let v = self.value(i)?;
        v.as_str().ok_or_else(|| self.mismatch(i, DType::Str, v))
    }

    pub fn array(&self, i: usize) -> Result<&'a [f64]> {
        let v = self.value(i)?;
        v.as_array().ok_or_else(|| self.mismatch(i, DType::F64Array, v))
    }
}

// ---------------------------------------------------------------------------
// Predicate
// ---------------------------------------------------------------------------

type PredicateFn = dyn Fn(&Row<'_>) -> Result<bool>;

/// Pure row predicate used by filter nodes.
#[derive(Clone)]
pub struct Predicate {
    f: Rc<PredicateFn>,
}

impl Predicate {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Row<'_>) -> Result<bool> + 'static,
    {
        Predicate { f: Rc::new(f) }
    }

    /// Predicate over the first input read as f64.
    pub fn on_f64<F>(f: F) -> Self
    where
        F: Fn(f64) -> bool + 'static,
    {
        Predicate::new(move |row| Ok(f(row.f64(0)?)))
    }

    /// Predicate over the first input read as i64.
    pub fn on_i64<F>(f: F) -> Self
    where
        F: Fn(i64) -> bool + 'static,
    {
        Predicate::new(move |row| Ok(f(row.i64(0)?)))
    }

    pub(crate) fn call(&self, row: &Row<'_>) -> Result<bool> {
        (self.f)(row)
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Predicate")
    }
}

// ---------------------------------------------------------------------------
// Transform
// ---------------------------------------------------------------------------

type TransformFn = dyn Fn(&Row<'_>) -> Result<Value>;

/// Row function computing a defined column of a fixed output type.
#[derive(Clone)]
pub struct Transform {
    dtype: DType,
    f: Rc<TransformFn>,
}

impl Transform {
    /// Transform declared to produce `dtype`. A value of any other type
    /// fails the pass with `TypeMismatch`.
    pub fn new<F>(dtype: DType, f: F) -> Self
    where
        F: Fn(&Row<'_>) -> Result<Value> + 'static,
    {
        Transform {
            dtype,
            f: Rc::new(f),
        }
    }

    pub fn f64<F>(f: F) -> Self
    where
        F: Fn(&Row<'_>) -> Result<f64> + 'static,
    {
        Transform::new(DType::F64, move |row| f(row).map(Value::F64))
    }

    pub fn i64<F>(f: F) -> Self
    where
        F: Fn(&Row<'_>) -> Result<i64> + 'static,
    {
        Transform::new(DType::I64, move |row| f(row).map(Value::I64))
    }

    pub fn bool<F>(f: F) -> Self
    where
        F: Fn(&Row<'_>) -> Result<bool> + 'static,
    {
        Transform::new(DType::Bool, move |row| f(row).map(Value::Bool))
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub(crate) fn call(&self, column: &str, row: &Row<'_>) -> Result<Value> {
        let v = (self.f)(row)?;
        if v.dtype() != self.dtype {
            return Err(Error::TypeMismatch {
                column: column.to_string(),
                expected: self.dtype,
                found: v.dtype(),
            });
        }
        Ok(v)
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Transform({})", self.dtype)
    }
}
