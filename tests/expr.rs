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


//! String expression tests: parsing, schema resolution, type checking and
//! evaluation inside a pass.

use lazycol::{open_source, ColumnData, DType, Error, ExprError, HistogramModel, Node, Value};

fn events() -> Node {
    open_source([
        ("nMuon", ColumnData::from(vec![2i64, 1, 2, 3, 2, 0])),
        (
            "Muon_pt",
            ColumnData::from(vec![
                vec![30.0, 10.0],
                vec![5.0],
                vec![45.5, 50.0],
                vec![1.0, 2.0, 3.0],
                vec![12.0, 8.0],
                vec![],
            ]),
        ),
        ("run", ColumnData::from(vec!["a", "a", "b", "b", "c", "c"])),
        ("w", ColumnData::from(vec![0.5, 1.0, 1.5, 2.0, 2.5, 3.0])),
    ])
    .unwrap()
}

#[test]
fn filter_and_define_from_strings() {
    let df = events();
    let lead = df
        .filter_expr_named("two muons", "nMuon = 2")
        .unwrap()
        .define_expr("lead_pt", "max(Muon_pt)")
        .unwrap();
    assert_eq!(lead.column_type("lead_pt"), Some(DType::F64));

    let h = lead
        .histo1d(HistogramModel::new(12, 0.0, 60.0).unwrap(), "lead_pt")
        .unwrap();
    let r = h.get().unwrap();
    assert_eq!(r.entries(), 3);
    assert_eq!(r.counts[10], 1);
}

#[test]
fn short_circuit_guards_empty_arrays() {
    let df = events();
    let n = df
        .filter_expr("len(Muon_pt) > 0 AND first(Muon_pt) > 10")
        .unwrap()
        .count()
        .unwrap();
    assert_eq!(n.get().unwrap(), 3);
}

#[test]
fn runtime_failure_surfaces_from_the_pass() {
    let df = events();
    let n = df.filter_expr("first(Muon_pt) > 10").unwrap().count().unwrap();
    assert!(matches!(n.get(), Err(Error::Callback(_))));
    assert!(!n.is_ready());
}

#[test]
fn string_and_set_predicates() {
    let df = events();
    let b = df.filter_expr("run = 'b'").unwrap().count().unwrap();
    let ac = df.filter_expr("run IN ('a', 'c')").unwrap().count().unwrap();
    let mid = df.filter_expr("w BETWEEN 1 AND 2").unwrap().sum("w").unwrap();
    let not_mid = df
        .filter_expr("NOT (w BETWEEN 1 AND 2)")
        .unwrap()
        .count()
        .unwrap();
    assert_eq!(b.get().unwrap(), 2);
    assert_eq!(ac.get().unwrap(), 4);
    assert_eq!(mid.get().unwrap(), 4.5);
    assert_eq!(not_mid.get().unwrap(), 3);
    assert_eq!(df.n_runs(), 1);
}

#[test]
fn defined_columns_feed_later_expressions() {
    let df = events();
    let scaled = df
        .define_expr("weight", "CASE WHEN nMuon >= 2 THEN w * 2 ELSE 0 END")
        .unwrap()
        .define_expr("idx", "rdfentry_ % 2")
        .unwrap();
    assert_eq!(scaled.column_type("weight"), Some(DType::F64));
    assert_eq!(scaled.column_type("idx"), Some(DType::I64));

    let even = scaled.filter_expr("idx = 0").unwrap().take("weight").unwrap();
    assert_eq!(
        even.get().unwrap(),
        vec![Value::F64(1.0), Value::F64(3.0), Value::F64(5.0)]
    );
}

#[test]
fn construction_errors() {
    let df = events();
    assert!(matches!(df.filter_expr("missing > 1"), Err(Error::Schema(_))));
    assert!(matches!(
        df.filter_expr("nMuon + 1"),
        Err(Error::Expr(ExprError::Plan(_)))
    ));
    assert!(matches!(
        df.filter_expr("nMuon >"),
        Err(Error::Expr(ExprError::Parse(_)))
    ));
    assert!(matches!(
        df.define_expr("nMuon", "1"),
        Err(Error::DuplicateColumn(_))
    ));
    assert!(matches!(
        df.define_expr("bad", "run * 2"),
        Err(Error::Expr(ExprError::Plan(_)))
    ));
    assert!(Error::Expr(ExprError::Plan(String::new())).is_schema_error());
}

#[test]
fn identifiers_are_case_sensitive() {
    let df = events();
    assert!(df.filter_expr("nmuon > 1").is_err());
    assert!(df.filter_expr("nMuon > 1").is_ok());
}
