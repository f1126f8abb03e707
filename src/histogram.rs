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

//! Fixed-bin 1D histogram with underflow and overflow buckets.

use crate::error::{Error, Result};

/// Binning and labels of a histogram.
///
/// `title` follows the `"title;x axis;y axis"` convention; the axis parts
/// are optional.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramModel {
    pub name: String,
    pub title: String,
    pub nbins: usize,
    pub lower: f64,
    pub upper: f64,
}

impl HistogramModel {
    /// Validated binning: `nbins >= 1`, finite bounds, `lower < upper`.
    pub fn new(nbins: usize, lower: f64, upper: f64) -> Result<Self> {
        let model = HistogramModel {
            name: String::new(),
            title: String::new(),
            nbins,
            lower,
            upper,
        };
        model.validate()?;
        Ok(model)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Check the binning. Models built through struct literals are checked
    /// again when an aggregate is registered.
    pub fn validate(&self) -> Result<()> {
        if self.nbins == 0 {
            return Err(Error::InvalidArgument("histogram needs at least one bin".into()));
        }
        if !self.lower.is_finite() || !self.upper.is_finite() {
            return Err(Error::InvalidArgument(format!(
                "histogram bounds must be finite, got [{}, {})",
                self.lower, self.upper
            )));
        }
        if self.lower >= self.upper {
            return Err(Error::InvalidArgument(format!(
                "histogram lower bound {} is not below upper bound {}",
                self.lower, self.upper
            )));
        }
        Ok(())
    }

    fn title_part(&self, idx: usize) -> &str {
        self.title.split(';').nth(idx).unwrap_or("")
    }

    /// Histogram title without axis labels.
    pub fn main_title(&self) -> &str {
        self.title_part(0)
    }

    pub fn x_title(&self) -> &str {
        self.title_part(1)
    }

    pub fn y_title(&self) -> &str {
        self.title_part(2)
    }

    /// Bucket a value falls into.
    pub fn find_bin(&self, value: f64) -> Bin {
        if value < self.lower {
            return Bin::Underflow;
        }
        // NaN counts as overflow.
        if value.is_nan() || value >= self.upper {
            return Bin::Overflow;
        }
        let width = self.upper - self.lower;
        let frac = if width.is_finite() {
            (value - self.lower) / width
        } else {
            // Bounds far apart: halve everything so the span stays finite.
            (value / 2.0 - self.lower / 2.0) / (self.upper / 2.0 - self.lower / 2.0)
        };
        let idx = (frac * self.nbins as f64).floor() as usize;
        Bin::Regular(idx.min(self.nbins - 1))
    }
}

/// Target bucket of one fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bin {
    Underflow,
    Regular(usize),
    Overflow,
}

/// Lifecycle of an accumulating histogram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistogramState {
    Uninitialized,
    Accumulating,
    Finalized,
}

/// Accumulating histogram. Filled once per qualifying row, finalized at
/// the end of a pass.
#[derive(Debug, Clone)]
pub struct Histogram {
    model: HistogramModel,
    counts: Vec<u64>,
    underflow: u64,
    overflow: u64,
    state: HistogramState,
}

impl Histogram {
    pub fn new(model: HistogramModel) -> Result<Self> {
        model.validate()?;
        Ok(Histogram {
            counts: vec![0; model.nbins],
            model,
            underflow: 0,
            overflow: 0,
            state: HistogramState::Uninitialized,
        })
    }

    pub fn state(&self) -> HistogramState {
        self.state
    }

    pub fn fill(&mut self, value: f64) -> Result<()> {
        if self.state == HistogramState::Finalized {
            return Err(Error::AlreadyFinalized);
        }
        self.state = HistogramState::Accumulating;
        match self.model.find_bin(value) {
            Bin::Underflow => self.underflow += 1,
            Bin::Overflow => self.overflow += 1,
            Bin::Regular(i) => self.counts[i] += 1,
        }
        Ok(())
    }

    /// Freeze the counts and hand out the result.
    pub fn finalize(&mut self) -> HistogramResult {
        self.state = HistogramState::Finalized;
        HistogramResult {
            model: self.model.clone(),
            counts: self.counts.clone(),
            underflow: self.underflow,
            overflow: self.overflow,
        }
    }
}

/// Finalized histogram contents.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramResult {
    pub model: HistogramModel,
    /// Per-bin counts, lowest bin first.
    pub counts: Vec<u64>,
    pub underflow: u64,
    pub overflow: u64,
}

impl HistogramResult {
    pub fn bin_count(&self) -> usize {
        self.model.nbins
    }

    pub fn lower(&self) -> f64 {
        self.model.lower
    }

    pub fn upper(&self) -> f64 {
        self.model.upper
    }

    pub fn bin_width(&self) -> f64 {
        let n = self.model.nbins as f64;
        let span = self.model.upper - self.model.lower;
        if span.is_finite() {
            span / n
        } else {
            self.model.upper / n - self.model.lower / n
        }
    }

    /// Lower edge of bin `i`.
    pub fn bin_low_edge(&self, i: usize) -> f64 {
        self.model.lower + i as f64 * self.bin_width()
    }

    pub fn bin_center(&self, i: usize) -> f64 {
        self.bin_low_edge(i) + 0.5 * self.bin_width()
    }

    /// Sum of in-range bins.
    pub fn integral(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Every fill, including underflow and overflow.
    pub fn entries(&self) -> u64 {
        self.integral() + self.underflow + self.overflow
    }
}
