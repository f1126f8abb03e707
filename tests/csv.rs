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


//! CSV loading tests using temporary files.

use std::io::Write;

use lazycol::{ColumnStore, CsvOptions, DType, Error, HistogramModel, Node, Value};

fn write_csv(contents: &str) -> tempfile::NamedTempFile {
    let mut f = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    f.write_all(contents.as_bytes()).unwrap();
    f.flush().unwrap();
    f
}

const EVENTS: &str = "\
nMuon,Muon_pt,run,w,good
2,[30 10],a,0.5,true
1,[5],a,1,false
2,[45.5 50],b,1.5,true
0,[],c,2,false
";

#[test]
fn infers_column_types() {
    let f = write_csv(EVENTS);
    let store = ColumnStore::read_csv(f.path()).unwrap();
    assert_eq!(store.nrows(), 4);
    assert_eq!(
        store.schema(),
        vec![
            ("nMuon".to_string(), DType::I64),
            ("Muon_pt".to_string(), DType::F64Array),
            ("run".to_string(), DType::Str),
            ("w".to_string(), DType::F64),
            ("good".to_string(), DType::Bool),
        ]
    );
    let pt = store.get_column("Muon_pt").unwrap();
    assert_eq!(pt.get(2), Some(Value::from(vec![45.5, 50.0])));
}

#[test]
fn loaded_store_drives_a_pass() {
    let f = write_csv(EVENTS);
    let df = Node::source(ColumnStore::read_csv(f.path()).unwrap());
    let h = df
        .filter_expr("good")
        .unwrap()
        .define_expr("lead", "max(Muon_pt)")
        .unwrap()
        .histo1d(HistogramModel::new(6, 0.0, 60.0).unwrap(), "lead")
        .unwrap();
    let r = h.get().unwrap();
    assert_eq!(r.counts, vec![0, 0, 0, 1, 0, 1]);
}

#[test]
fn explicit_types_and_delimiter() {
    let f = write_csv("1;2\n3;4\n");
    let opts = CsvOptions {
        delimiter: b';',
        has_header: false,
        column_types: Some(vec![DType::F64, DType::I64]),
    };
    let store = ColumnStore::read_csv_opts(f.path(), &opts).unwrap();
    assert_eq!(store.nrows(), 2);
    assert_eq!(
        store.schema(),
        vec![
            ("Column1".to_string(), DType::F64),
            ("Column2".to_string(), DType::I64),
        ]
    );
}

#[test]
fn loader_errors() {
    let empty = write_csv("");
    assert!(matches!(
        ColumnStore::read_csv(empty.path()),
        Err(Error::InvalidArgument(_))
    ));

    let ragged = write_csv("a,b\n1,2\n3\n");
    assert!(matches!(
        ColumnStore::read_csv(ragged.path()),
        Err(Error::Parse(_))
    ));

    let dup = write_csv("a,a\n1,2\n");
    assert!(matches!(
        ColumnStore::read_csv(dup.path()),
        Err(Error::DuplicateColumn(_))
    ));

    let typed = write_csv("a\nx\n");
    let opts = CsvOptions {
        column_types: Some(vec![DType::I64]),
        ..CsvOptions::default()
    };
    assert!(matches!(
        ColumnStore::read_csv_opts(typed.path(), &opts),
        Err(Error::Parse(_))
    ));

    assert!(matches!(
        ColumnStore::read_csv("/nonexistent/lazycol.csv"),
        Err(Error::Io(_))
    ));
}
