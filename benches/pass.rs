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


//! Single-pass benchmarks over a synthetic event table (criterion).
//!
//! Row count defaults to 1M and can be changed with `LAZYCOL_BENCH_ROWS`.

use criterion::{criterion_group, criterion_main, Criterion, SamplingMode};
use std::time::Duration;

use lazycol::{ColumnData, ColumnStore, HistogramModel, Node, Predicate, Transform};

fn bench_rows() -> usize {
    std::env::var("LAZYCOL_BENCH_ROWS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(1_000_000)
}

/// Deterministic pseudo-random events: muon multiplicity and momenta.
fn events(n: usize) -> ColumnStore {
    let mut state = 0x2545_f491_4f6c_dd1du64;
    let mut next = move || {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        (state >> 11) as f64 / (1u64 << 53) as f64
    };
    let mut n_muon = Vec::with_capacity(n);
    let mut pt = Vec::with_capacity(n);
    for _ in 0..n {
        let k = (next() * 4.0) as usize;
        n_muon.push(k as i64);
        pt.push((0..k).map(|_| next() * 80.0).collect::<Vec<f64>>());
    }
    ColumnStore::new([
        ("nMuon", ColumnData::from(n_muon)),
        ("Muon_pt", ColumnData::from(pt)),
    ])
    .unwrap()
}

fn model() -> HistogramModel {
    HistogramModel::new(16, 0.0, 80.0).unwrap()
}

fn leading_pt_closure(df: &Node) -> u64 {
    let lead = df
        .filter(Predicate::on_i64(|n| n == 2), &["nMuon"])
        .unwrap()
        .define(
            "lead_pt",
            Transform::f64(|r| Ok(r.array(0)?.iter().copied().fold(f64::MIN, f64::max))),
            &["Muon_pt"],
        )
        .unwrap();
    lead.histo1d(model(), "lead_pt").unwrap().get().unwrap().entries()
}

fn leading_pt_expr(df: &Node) -> u64 {
    let lead = df
        .filter_expr("nMuon = 2")
        .unwrap()
        .define_expr("lead_pt", "max(Muon_pt)")
        .unwrap();
    lead.histo1d(model(), "lead_pt").unwrap().get().unwrap().entries()
}

fn bench_pass(c: &mut Criterion) {
    let store = events(bench_rows());

    let mut group = c.benchmark_group("pass");
    group.sample_size(10);
    group.sampling_mode(SamplingMode::Flat);
    group.warm_up_time(Duration::from_millis(500));
    group.measurement_time(Duration::from_secs(2));

    group.bench_function("closure_filter_define_histo", |b| {
        b.iter(|| leading_pt_closure(&Node::source(store.clone())))
    });
    group.bench_function("expr_filter_define_histo", |b| {
        b.iter(|| leading_pt_expr(&Node::source(store.clone())))
    });
    group.bench_function("shared_pass_four_histos", |b| {
        b.iter(|| {
            let df = Node::source(store.clone());
            let lead = df.define_expr("lead", "CASE WHEN nMuon > 0 THEN max(Muon_pt) ELSE 0 END").unwrap();
            let handles: Vec<_> = (0..4)
                .map(|k| {
                    lead.filter_expr(&format!("nMuon = {k}"))
                        .unwrap()
                        .histo1d(model(), "lead")
                        .unwrap()
                })
                .collect();
            handles.iter().map(|h| h.get().unwrap().entries()).sum::<u64>()
        })
    });
    group.bench_function("range_early_stop", |b| {
        b.iter(|| {
            let df = Node::source(store.clone());
            df.filter_expr("nMuon >= 1")
                .unwrap()
                .range(1000)
                .unwrap()
                .count()
                .unwrap()
                .get()
                .unwrap()
        })
    });

    group.finish();
}

criterion_group!(benches, bench_pass);
criterion_main!(benches);
