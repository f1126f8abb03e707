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


//! Property tests for row order, range limits and early termination.

use std::cell::Cell;
use std::rc::Rc;

use proptest::collection::vec;
use proptest::prelude::*;

use lazycol::{open_source, ColumnData, HistogramModel, Predicate, Value, ENTRY_COLUMN};

proptest! {
    #[test]
    fn filter_preserves_source_order(xs in vec(-100i64..100, 0..200), threshold in -100i64..100) {
        let df = open_source([("x", ColumnData::from(xs.clone()))]).unwrap();
        let kept = df
            .filter(Predicate::on_i64(move |x| x > threshold), &["x"])
            .unwrap();
        let entries = kept.take(ENTRY_COLUMN).unwrap();
        let values = kept.take("x").unwrap();

        let expected: Vec<usize> = (0..xs.len()).filter(|&i| xs[i] > threshold).collect();
        let got: Vec<usize> = entries
            .get()
            .unwrap()
            .iter()
            .map(|v| v.as_i64().unwrap() as usize)
            .collect();
        prop_assert_eq!(&got, &expected);
        let expected_values: Vec<Value> = expected.iter().map(|&i| Value::I64(xs[i])).collect();
        prop_assert_eq!(values.get().unwrap(), expected_values);
    }

    #[test]
    fn range_yields_min_of_limit_and_survivors(
        xs in vec(0i64..10, 0..200),
        threshold in 0i64..10,
        limit in 0i64..50,
    ) {
        let df = open_source([("x", ColumnData::from(xs.clone()))]).unwrap();
        let calls = Rc::new(Cell::new(0usize));
        let c = calls.clone();
        let pred = Predicate::new(move |row| {
            c.set(c.get() + 1);
            Ok(row.i64(0)? >= threshold)
        });
        let limited = df.filter(pred, &["x"]).unwrap().range(limit).unwrap();
        let n = limited.count().unwrap();
        let h = limited
            .histo1d(HistogramModel::new(5, 0.0, 10.0).unwrap(), "x")
            .unwrap();

        let survivors: Vec<usize> = (0..xs.len()).filter(|&i| xs[i] >= threshold).collect();
        let expected = survivors.len().min(limit as usize);
        prop_assert_eq!(n.get().unwrap(), expected as u64);
        prop_assert_eq!(h.get().unwrap().entries(), expected as u64);

        // The pass stops right after the last row the range can accept.
        let visited = if limit == 0 {
            0
        } else if survivors.len() >= limit as usize {
            survivors[limit as usize - 1] + 1
        } else {
            xs.len()
        };
        prop_assert_eq!(calls.get(), visited);
        prop_assert_eq!(df.n_runs(), 1);
    }

    #[test]
    fn histogram_accounts_for_every_fill(xs in vec(-20.0f64..20.0, 0..300), nbins in 1usize..16) {
        let df = open_source([("x", ColumnData::from(xs.clone()))]).unwrap();
        let h = df
            .histo1d(HistogramModel::new(nbins, -10.0, 10.0).unwrap(), "x")
            .unwrap()
            .get()
            .unwrap();
        prop_assert_eq!(h.entries(), xs.len() as u64);
        prop_assert_eq!(h.underflow, xs.iter().filter(|&&x| x < -10.0).count() as u64);
        prop_assert_eq!(h.overflow, xs.iter().filter(|&&x| x >= 10.0).count() as u64);
    }
}
