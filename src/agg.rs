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

//! Terminal aggregates and their accumulators.

use std::fmt;

use crate::error::{Error, Result};
use crate::histogram::{Histogram, HistogramModel, HistogramResult};
use crate::store::{DType, Value};

/// Aggregation operation variants.
#[derive(Debug, Clone, PartialEq)]
pub enum AggSpec {
    /// Fixed-bin frequency distribution of a numeric column.
    Histogram { column: String, model: HistogramModel },
    /// Number of rows reaching the aggregate.
    Count,
    Sum(String),
    Mean(String),
    Min(String),
    Max(String),
    /// Every value of a column, in row order.
    Take(String),
    /// Cut-flow statistics of the named filters upstream.
    Report,
}

impl AggSpec {
    /// Column the aggregate reads, if any.
    pub fn column(&self) -> Option<&str> {
        match self {
            AggSpec::Histogram { column, .. }
            | AggSpec::Sum(column)
            | AggSpec::Mean(column)
            | AggSpec::Min(column)
            | AggSpec::Max(column)
            | AggSpec::Take(column) => Some(column),
            AggSpec::Count | AggSpec::Report => None,
        }
    }

    /// Whether the column must be Bool, I64 or F64.
    pub(crate) fn needs_numeric(&self) -> bool {
        !matches!(self, AggSpec::Take(_) | AggSpec::Count | AggSpec::Report)
    }

    pub(crate) fn kind_name(&self) -> &'static str {
        match self {
            AggSpec::Histogram { .. } => "histogram",
            AggSpec::Count => "count",
            AggSpec::Sum(_) => "sum",
            AggSpec::Mean(_) => "mean",
            AggSpec::Min(_) => "min",
            AggSpec::Max(_) => "max",
            AggSpec::Take(_) => "take",
            AggSpec::Report => "report",
        }
    }
}

/// Finalized value of an aggregate.
#[derive(Debug, Clone, PartialEq)]
pub enum AggResult {
    Histogram(HistogramResult),
    Count(u64),
    Sum(f64),
    /// `None` when no row qualified.
    Mean(Option<f64>),
    Min(Option<f64>),
    Max(Option<f64>),
    Take(Vec<Value>),
    Report(Report),
}

/// Conversion from the untyped result, used by typed result handles.
pub trait AggOutput: Sized {
    fn from_result(result: &AggResult) -> Option<Self>;
}

impl AggOutput for AggResult {
    fn from_result(result: &AggResult) -> Option<Self> {
        Some(result.clone())
    }
}

impl AggOutput for HistogramResult {
    fn from_result(result: &AggResult) -> Option<Self> {
        match result {
            AggResult::Histogram(h) => Some(h.clone()),
            _ => None,
        }
    }
}

impl AggOutput for u64 {
    fn from_result(result: &AggResult) -> Option<Self> {
        match result {
            AggResult::Count(n) => Some(*n),
            _ => None,
        }
    }
}

impl AggOutput for f64 {
    fn from_result(result: &AggResult) -> Option<Self> {
        match result {
            AggResult::Sum(s) => Some(*s),
            _ => None,
        }
    }
}

impl AggOutput for Option<f64> {
    fn from_result(result: &AggResult) -> Option<Self> {
        match result {
            AggResult::Mean(v) | AggResult::Min(v) | AggResult::Max(v) => Some(*v),
            _ => None,
        }
    }
}

impl AggOutput for Vec<Value> {
    fn from_result(result: &AggResult) -> Option<Self> {
        match result {
            AggResult::Take(v) => Some(v.clone()),
            _ => None,
        }
    }
}

impl AggOutput for Report {
    fn from_result(result: &AggResult) -> Option<Self> {
        match result {
            AggResult::Report(r) => Some(r.clone()),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Cut-flow report
// ---------------------------------------------------------------------------

/// Statistics of one named filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CutInfo {
    pub name: String,
    /// Rows that reached the filter.
    pub all: u64,
    /// Rows the filter accepted.
    pub pass: u64,
}

impl CutInfo {
    /// Accepted fraction in percent; 0 when nothing reached the filter.
    pub fn efficiency(&self) -> f64 {
        if self.all == 0 {
            0.0
        } else {
            self.pass as f64 / self.all as f64 * 100.0
        }
    }
}

/// Named filters upstream of a node, in chain order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Report {
    pub cuts: Vec<CutInfo>,
}

impl Report {
    pub fn get(&self, name: &str) -> Option<&CutInfo> {
        self.cuts.iter().find(|c| c.name == name)
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self.cuts.iter().map(|c| c.name.len()).max().unwrap_or(0);
        for cut in &self.cuts {
            writeln!(
                f,
                "{:<width$}: pass={:<10} all={:<10} -- eff={:.2} %",
                cut.name,
                cut.pass,
                cut.all,
                cut.efficiency(),
            )?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Accumulator: per-pass state of one aggregate
// ---------------------------------------------------------------------------

pub(crate) enum Accumulator {
    Histogram(Histogram),
    Count(u64),
    Sum(f64),
    Mean { sum: f64, n: u64 },
    Min(Option<f64>),
    Max(Option<f64>),
    Take(Vec<Value>),
    Report,
}

impl Accumulator {
    pub(crate) fn new(spec: &AggSpec) -> Result<Self> {
        Ok(match spec {
            AggSpec::Histogram { model, .. } => Accumulator::Histogram(Histogram::new(model.clone())?),
            AggSpec::Count => Accumulator::Count(0),
            AggSpec::Sum(_) => Accumulator::Sum(0.0),
            AggSpec::Mean(_) => Accumulator::Mean { sum: 0.0, n: 0 },
            AggSpec::Min(_) => Accumulator::Min(None),
            AggSpec::Max(_) => Accumulator::Max(None),
            AggSpec::Take(_) => Accumulator::Take(Vec::new()),
            AggSpec::Report => Accumulator::Report,
        })
    }

    /// Feed one qualifying row. `value` is the bound column's value, absent
    /// for aggregates that read no column.
    pub(crate) fn fill(&mut self, column: &str, value: Option<Value>) -> Result<()> {
        let numeric = |v: &Option<Value>| -> Result<f64> {
            match v {
                Some(v) => v.as_f64().ok_or_else(|| Error::TypeMismatch {
                    column: column.to_string(),
                    expected: DType::F64,
                    found: v.dtype(),
                }),
                None => Err(Error::Schema(format!("aggregate needs column '{column}'"))),
            }
        };
        match self {
            Accumulator::Histogram(h) => h.fill(numeric(&value)?)?,
            Accumulator::Count(n) => *n += 1,
            Accumulator::Sum(s) => *s += numeric(&value)?,
            Accumulator::Mean { sum, n } => {
                *sum += numeric(&value)?;
                *n += 1;
            }
            Accumulator::Min(m) => {
                let x = numeric(&value)?;
                *m = Some(m.map_or(x, |cur| cur.min(x)));
            }
            Accumulator::Max(m) => {
                let x = numeric(&value)?;
                *m = Some(m.map_or(x, |cur| cur.max(x)));
            }
            Accumulator::Take(vals) => {
                if let Some(v) = value {
                    vals.push(v);
                }
            }
            Accumulator::Report => {}
        }
        Ok(())
    }

    /// Close the accumulator. `cuts` is only consulted by reports.
    pub(crate) fn finalize(self, cuts: Vec<CutInfo>) -> AggResult {
        match self {
            Accumulator::Histogram(mut h) => AggResult::Histogram(h.finalize()),
            Accumulator::Count(n) => AggResult::Count(n),
            Accumulator::Sum(s) => AggResult::Sum(s),
            Accumulator::Mean { sum, n } => {
                AggResult::Mean(if n == 0 { None } else { Some(sum / n as f64) })
            }
            Accumulator::Min(m) => AggResult::Min(m),
            Accumulator::Max(m) => AggResult::Max(m),
            Accumulator::Take(v) => AggResult::Take(v),
            Accumulator::Report => AggResult::Report(Report { cuts }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(spec: AggSpec, values: &[Value]) -> AggResult {
        let mut acc = Accumulator::new(&spec).unwrap();
        for v in values {
            acc.fill("x", Some(v.clone())).unwrap();
        }
        acc.finalize(Vec::new())
    }

    #[test]
    fn numeric_aggregates() {
        let vals = [Value::I64(3), Value::F64(1.5), Value::Bool(true)];
        assert_eq!(run(AggSpec::Sum("x".into()), &vals), AggResult::Sum(5.5));
        assert_eq!(run(AggSpec::Min("x".into()), &vals), AggResult::Min(Some(1.0)));
        assert_eq!(run(AggSpec::Max("x".into()), &vals), AggResult::Max(Some(3.0)));
        assert_eq!(
            run(AggSpec::Mean("x".into()), &vals),
            AggResult::Mean(Some(5.5 / 3.0))
        );
        assert_eq!(run(AggSpec::Count, &vals), AggResult::Count(3));
    }

    #[test]
    fn empty_aggregates() {
        assert_eq!(run(AggSpec::Mean("x".into()), &[]), AggResult::Mean(None));
        assert_eq!(run(AggSpec::Min("x".into()), &[]), AggResult::Min(None));
        assert_eq!(run(AggSpec::Sum("x".into()), &[]), AggResult::Sum(0.0));
    }

    #[test]
    fn non_numeric_value_is_rejected() {
        let mut acc = Accumulator::new(&AggSpec::Sum("x".into())).unwrap();
        assert!(matches!(
            acc.fill("x", Some(Value::from("a"))),
            Err(Error::TypeMismatch { .. })
        ));
    }

    #[test]
    fn report_display() {
        let report = Report {
            cuts: vec![
                CutInfo { name: "nMuon".into(), all: 10, pass: 4 },
                CutInfo { name: "pt".into(), all: 4, pass: 0 },
            ],
        };
        let text = report.to_string();
        assert!(text.contains("eff=40.00 %"));
        assert!(text.contains("eff=0.00 %"));
        assert_eq!(report.get("pt").map(|c| c.pass), Some(0));
    }

    #[test]
    fn typed_outputs() {
        assert_eq!(u64::from_result(&AggResult::Count(2)), Some(2));
        assert_eq!(f64::from_result(&AggResult::Count(2)), None);
        assert_eq!(
            Option::<f64>::from_result(&AggResult::Max(Some(1.0))),
            Some(Some(1.0))
        );
    }
}
