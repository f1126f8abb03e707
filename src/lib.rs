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


//! lazycol: a lazy, single-pass columnar query engine.
//!
//! A [`Node`] graph is built from a source of named, typed columns with
//! `filter`, `define` and `range` steps, and terminated by aggregates such
//! as histograms. Building the graph does no work. Reading any
//! [`ResultHandle`] runs one pass over the source rows that fills every
//! aggregate pending on that source, stopping early once every aggregate
//! sits behind a saturated range.
//!
//! ```
//! use lazycol::{open_source, ColumnData, HistogramModel, Predicate};
//!
//! let df = open_source([("x", ColumnData::from(vec![1i64, 2, 3, 4, 5]))])?;
//! let h = df
//!     .filter(Predicate::on_i64(|x| x > 2), &["x"])?
//!     .range(2)?
//!     .histo1d(HistogramModel::new(2, 0.0, 10.0)?, "x")?;
//! assert_eq!(h.get()?.counts, vec![2, 0]);
//! # Ok::<(), lazycol::Error>(())
//! ```

pub mod agg;
pub mod engine;
pub mod error;
pub mod func;
pub mod graph;
pub mod histogram;
pub mod sql;
pub mod store;

pub use agg::{AggOutput, AggResult, AggSpec, CutInfo, Report};
pub use engine::{CancelToken, ResultHandle};
pub use error::{Error, Result};
pub use func::{Predicate, Row, Transform};
pub use graph::{open_source, Node};
pub use histogram::{Bin, Histogram, HistogramModel, HistogramResult, HistogramState};
pub use sql::ExprError;
pub use store::{ColumnData, ColumnStore, CsvOptions, DType, Value, ENTRY_COLUMN};
