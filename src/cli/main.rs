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


mod theme;

use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use lazycol::{
    ColumnStore, CsvOptions, Error, HistogramModel, HistogramResult, Node, Report, ResultHandle,
};

use theme::{BAR, BOLD, BORDER, ERROR, FOOTER, HEADER, R, SUCCESS, TEXT, TIMER};

const BAR_WIDTH: u64 = 40;

#[derive(Parser)]
#[command(
    name = "lazycol",
    version,
    about = "Filter, define and histogram CSV columns in a single lazy pass"
)]
struct Args {
    /// CSV file to load
    input: PathBuf,
    /// Define a column, NAME=EXPR (applied in order, before filters)
    #[arg(short, long, value_name = "NAME=EXPR")]
    define: Vec<String>,
    /// Keep rows matching a boolean expression (applied in order)
    #[arg(short, long, value_name = "EXPR")]
    filter: Vec<String>,
    /// Keep at most this many rows after filtering
    #[arg(short, long)]
    range: Option<i64>,
    /// Book a histogram, COLUMN:BINS:LOW:HIGH
    #[arg(long, value_name = "COLUMN:BINS:LOW:HIGH")]
    histo: Vec<String>,
    /// Print the number of selected rows
    #[arg(short, long)]
    count: bool,
    /// Print the cut-flow report of the filters
    #[arg(long)]
    report: bool,
    /// Show pass execution time
    #[arg(short, long)]
    timer: bool,
    /// Field delimiter
    #[arg(long, default_value_t = ',')]
    delimiter: char,
    /// Treat the first line as data; columns are named Column1, Column2, ...
    #[arg(long)]
    no_header: bool,
}

fn main() {
    let filter = EnvFilter::try_from_env("LAZYCOL_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    if let Err(e) = run(&args) {
        eprintln!("{ERROR}Error: {e}{R}");
        std::process::exit(1);
    }
}

fn run(args: &Args) -> lazycol::Result<()> {
    if !args.delimiter.is_ascii() {
        return Err(Error::InvalidArgument(format!(
            "delimiter must be a single ASCII character, got '{}'",
            args.delimiter
        )));
    }
    let opts = CsvOptions {
        delimiter: args.delimiter as u8,
        has_header: !args.no_header,
        column_types: None,
    };
    let store = ColumnStore::read_csv_opts(&args.input, &opts)?;
    let nrows = store.nrows();
    let mut node = Node::source(store);

    for def in &args.define {
        let (name, expr) = def.split_once('=').ok_or_else(|| {
            Error::InvalidArgument(format!("--define expects NAME=EXPR, got '{def}'"))
        })?;
        node = node.define_expr(name.trim(), expr.trim())?;
    }
    // Filters are reported under their own expression text.
    for expr in &args.filter {
        node = node.filter_expr_named(expr, expr)?;
    }
    if let Some(limit) = args.range {
        node = node.range(limit)?;
    }

    let histos = args
        .histo
        .iter()
        .map(|spec| {
            let (column, model) = parse_histo(spec)?;
            Ok((column.clone(), node.histo1d(model, &column)?))
        })
        .collect::<lazycol::Result<Vec<_>>>()?;
    let count = if args.count || (histos.is_empty() && !args.report) {
        Some(node.count()?)
    } else {
        None
    };
    let report = if args.report { Some(node.report()?) } else { None };

    let start = Instant::now();
    for (column, handle) in &histos {
        print_histogram(column, &handle.get()?);
    }
    if let Some(count) = &count {
        print_count(count, nrows)?;
    }
    if let Some(report) = &report {
        print_report(&report.get()?);
    }
    if args.timer {
        println!(
            "{TIMER}Run Time: {:.3}s ({} pass){R}",
            start.elapsed().as_secs_f64(),
            node.n_runs()
        );
    }
    Ok(())
}

/// `COLUMN:BINS:LOW:HIGH`, split from the right so column names may
/// contain ':'.
fn parse_histo(spec: &str) -> lazycol::Result<(String, HistogramModel)> {
    let bad = || Error::InvalidArgument(format!("--histo expects COLUMN:BINS:LOW:HIGH, got '{spec}'"));
    let mut parts = spec.rsplitn(4, ':');
    let high = parts.next().ok_or_else(bad)?;
    let low = parts.next().ok_or_else(bad)?;
    let bins = parts.next().ok_or_else(bad)?;
    let column = parts.next().ok_or_else(bad)?;
    let model = HistogramModel::new(
        bins.trim().parse().map_err(|_| bad())?,
        low.trim().parse().map_err(|_| bad())?,
        high.trim().parse().map_err(|_| bad())?,
    )?
    .with_name(column)
    .with_title(format!("{column};{column};Count"));
    Ok((column.to_string(), model))
}

fn print_histogram(column: &str, h: &HistogramResult) {
    println!(
        "{BOLD}{HEADER}{column}{R} {FOOTER}({} entries, underflow {}, overflow {}){R}",
        h.entries(),
        h.underflow,
        h.overflow
    );
    let peak = h.counts.iter().copied().max().unwrap_or(0).max(1);
    for (i, &c) in h.counts.iter().enumerate() {
        let bar = "\u{2588}".repeat((c * BAR_WIDTH / peak) as usize);
        println!(
            "{BORDER}[{:>12.4}, {:>12.4}){R} {TEXT}{c:>10}{R} {BAR}{bar}{R}",
            h.bin_low_edge(i),
            h.bin_low_edge(i + 1),
        );
    }
}

fn print_count(count: &ResultHandle<u64>, nrows: usize) -> lazycol::Result<()> {
    let n = count.get()?;
    println!("{SUCCESS}{n}{R} {FOOTER}of {nrows} rows selected{R}");
    Ok(())
}

fn print_report(report: &Report) {
    if report.cuts.is_empty() {
        println!("{FOOTER}(no filters){R}");
        return;
    }
    println!("{BOLD}{HEADER}Cut flow{R}");
    print!("{TEXT}{report}{R}");
}
