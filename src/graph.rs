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

//! Query graph builder.
//!
//! Every builder call returns a new immutable [`Node`] wrapping its parent.
//! Nothing is executed here: column references are resolved against the
//! parent's schema immediately, so a misspelled column fails before any
//! row is read. Execution happens in [`crate::engine`] when a result handle
//! is first read.

use std::collections::HashMap;
use std::rc::Rc;

use tracing::debug;

use crate::agg::{AggResult, AggSpec, Report};
use crate::engine::{AggNode, CancelToken, Pipeline, ResultHandle};
use crate::error::{Error, Result};
use crate::func::{Predicate, Transform};
use crate::histogram::{HistogramModel, HistogramResult};
use crate::store::{ColumnData, ColumnStore, DType, Value, ENTRY_COLUMN};

pub(crate) type NodeId = usize;

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

/// Where the values of a visible column come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ColumnRef {
    /// Store column at this position.
    Source(usize),
    /// Row index of the source.
    Entry,
    /// Output of the define node with this id.
    Derived(NodeId),
}

#[derive(Debug, Clone)]
pub(crate) struct Field {
    pub name: String,
    pub dtype: DType,
    pub col: ColumnRef,
}

/// Columns visible at a node, in the order they became visible.
#[derive(Debug, Clone, Default)]
pub(crate) struct Schema {
    fields: Vec<Field>,
    index: HashMap<String, usize>,
}

impl Schema {
    fn of_store(store: &ColumnStore) -> Self {
        let mut schema = Schema::default();
        schema.push(Field {
            name: ENTRY_COLUMN.to_string(),
            dtype: DType::I64,
            col: ColumnRef::Entry,
        });
        for (i, (name, dtype)) in store.schema().into_iter().enumerate() {
            schema.push(Field {
                name,
                dtype,
                col: ColumnRef::Source(i),
            });
        }
        schema
    }

    fn push(&mut self, field: Field) {
        self.index.insert(field.name.clone(), self.fields.len());
        self.fields.push(field);
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.index.get(name).map(|&i| &self.fields[i])
    }

    /// Resolve a referenced column or fail with a schema error.
    pub fn resolve(&self, name: &str) -> Result<&Field> {
        self.get(name)
            .ok_or_else(|| Error::Schema(format!("column '{name}' not found")))
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }
}

/// Input columns bound to a user function.
#[derive(Debug, Clone)]
pub(crate) struct Bindings {
    pub names: Vec<String>,
    pub cols: Vec<ColumnRef>,
}

impl Bindings {
    fn resolve(schema: &Schema, inputs: &[&str]) -> Result<Self> {
        let mut names = Vec::with_capacity(inputs.len());
        let mut cols = Vec::with_capacity(inputs.len());
        for &name in inputs {
            cols.push(schema.resolve(name)?.col);
            names.push(name.to_string());
        }
        Ok(Bindings { names, cols })
    }
}

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub(crate) enum NodeKind {
    Source,
    Filter {
        name: Option<String>,
        predicate: Predicate,
        inputs: Bindings,
    },
    Define {
        name: String,
        transform: Transform,
        inputs: Bindings,
    },
    /// Among rows reaching the node (counted from 0), pass indices in
    /// `[begin, end)` that are `begin + k * stride`.
    Range {
        begin: u64,
        end: Option<u64>,
        stride: u64,
    },
}

pub(crate) struct NodeInner {
    pub id: NodeId,
    pub kind: NodeKind,
    pub parent: Option<Node>,
    pub schema: Rc<Schema>,
    pub pipeline: Rc<Pipeline>,
}

/// A node of a lazy query graph.
///
/// Cloning is cheap and yields a handle to the same node. Nodes may be
/// branched from any number of times; every branch shares the pass of
/// its source.
#[derive(Clone)]
pub struct Node {
    pub(crate) inner: Rc<NodeInner>,
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.inner.id)
            .field("kind", &self.inner.kind)
            .finish()
    }
}

/// Create the source node of a new pipeline from `(name, column)` pairs.
pub fn open_source<N, I>(columns: I) -> Result<Node>
where
    N: Into<String>,
    I: IntoIterator<Item = (N, ColumnData)>,
{
    Ok(Node::source(ColumnStore::new(columns)?))
}

impl Node {
    /// Create the source node of a new pipeline over `store`.
    pub fn source(store: ColumnStore) -> Node {
        let schema = Rc::new(Schema::of_store(&store));
        let pipeline = Rc::new(Pipeline::new(Rc::new(store)));
        let id = pipeline.next_id();
        debug!(node = id, ncols = schema.fields().len(), "source opened");
        Node {
            inner: Rc::new(NodeInner {
                id,
                kind: NodeKind::Source,
                parent: None,
                schema,
                pipeline,
            }),
        }
    }

    fn child(&self, kind: NodeKind, schema: Rc<Schema>) -> Node {
        let id = self.inner.pipeline.next_id();
        debug!(node = id, parent = self.inner.id, kind = kind_label(&kind), "node added");
        Node {
            inner: Rc::new(NodeInner {
                id,
                kind,
                parent: Some(self.clone()),
                schema,
                pipeline: self.inner.pipeline.clone(),
            }),
        }
    }

    // ---- Schema -----------------------------------------------------------

    /// Names of the columns visible at this node, including the implicit
    /// entry column.
    pub fn columns(&self) -> Vec<String> {
        self.inner
            .schema
            .fields()
            .iter()
            .map(|f| f.name.clone())
            .collect()
    }

    pub fn column_type(&self, name: &str) -> Option<DType> {
        self.inner.schema.get(name).map(|f| f.dtype)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.inner.schema.get(name).is_some()
    }

    /// Rows in the underlying store.
    pub fn source_rows(&self) -> usize {
        self.inner.pipeline.store().nrows()
    }

    /// Completed passes over the source of this pipeline.
    pub fn n_runs(&self) -> u64 {
        self.inner.pipeline.n_runs()
    }

    /// Cancellation flag shared by every node of this pipeline.
    pub fn cancel_token(&self) -> CancelToken {
        self.inner.pipeline.cancel_token()
    }

    pub(crate) fn schema(&self) -> &Schema {
        &self.inner.schema
    }

    // ---- Transformations --------------------------------------------------

    /// Keep rows for which `predicate` returns true.
    pub fn filter(&self, predicate: Predicate, inputs: &[&str]) -> Result<Node> {
        self.add_filter(None, predicate, inputs)
    }

    /// Like [`Node::filter`], and reported by [`Node::report`] under `name`.
    pub fn filter_named(&self, name: &str, predicate: Predicate, inputs: &[&str]) -> Result<Node> {
        if name.is_empty() {
            return Err(Error::InvalidArgument("filter name is empty".into()));
        }
        self.add_filter(Some(name.to_string()), predicate, inputs)
    }

    fn add_filter(&self, name: Option<String>, predicate: Predicate, inputs: &[&str]) -> Result<Node> {
        let inputs = Bindings::resolve(&self.inner.schema, inputs)?;
        Ok(self.child(
            NodeKind::Filter {
                name,
                predicate,
                inputs,
            },
            self.inner.schema.clone(),
        ))
    }

    /// Add a computed column visible to all downstream nodes.
    pub fn define(&self, name: &str, transform: Transform, inputs: &[&str]) -> Result<Node> {
        if name.is_empty() {
            return Err(Error::InvalidArgument("column name is empty".into()));
        }
        if self.inner.schema.get(name).is_some() {
            return Err(Error::DuplicateColumn(name.to_string()));
        }
        let inputs = Bindings::resolve(&self.inner.schema, inputs)?;
        let mut schema = Schema::clone(&self.inner.schema);
        let id = self.inner.pipeline.peek_id();
        schema.push(Field {
            name: name.to_string(),
            dtype: transform.dtype(),
            col: ColumnRef::Derived(id),
        });
        let node = self.child(
            NodeKind::Define {
                name: name.to_string(),
                transform,
                inputs,
            },
            Rc::new(schema),
        );
        debug_assert_eq!(node.inner.id, id);
        Ok(node)
    }

    /// Let at most `limit` rows through, in source order.
    pub fn range(&self, limit: i64) -> Result<Node> {
        if limit < 0 {
            return Err(Error::InvalidArgument(format!(
                "range limit must be non-negative, got {limit}"
            )));
        }
        self.range_window(0, Some(limit), 1)
    }

    /// Let through rows `begin, begin + stride, ...` below `end`, counting
    /// only rows that reach this node. `end: None` means unbounded.
    pub fn range_window(&self, begin: i64, end: Option<i64>, stride: i64) -> Result<Node> {
        if begin < 0 {
            return Err(Error::InvalidArgument(format!(
                "range begin must be non-negative, got {begin}"
            )));
        }
        if let Some(end) = end {
            if end < begin {
                return Err(Error::InvalidArgument(format!(
                    "range end {end} is below begin {begin}"
                )));
            }
        }
        if stride < 1 {
            return Err(Error::InvalidArgument(format!(
                "range stride must be positive, got {stride}"
            )));
        }
        Ok(self.child(
            NodeKind::Range {
                begin: begin as u64,
                end: end.map(|e| e as u64),
                stride: stride as u64,
            },
            self.inner.schema.clone(),
        ))
    }

    // ---- Aggregates -------------------------------------------------------

    /// Register a terminal aggregate. Nothing runs until the returned
    /// handle is read.
    pub fn aggregate(&self, spec: AggSpec) -> Result<ResultHandle<AggResult>> {
        self.book(spec)
    }

    fn book<T>(&self, spec: AggSpec) -> Result<ResultHandle<T>> {
        let column = match spec.column() {
            Some(name) => {
                let field = self.inner.schema.resolve(name)?;
                if spec.needs_numeric() && !field.dtype.is_numeric() {
                    return Err(Error::Schema(format!(
                        "{} needs a numeric column, '{name}' is {}",
                        spec.kind_name(),
                        field.dtype
                    )));
                }
                Some(field.col)
            }
            None => None,
        };
        if let AggSpec::Histogram { model, .. } = &spec {
            model.validate()?;
        }
        let id = self.inner.pipeline.next_id();
        debug!(node = id, parent = self.inner.id, kind = spec.kind_name(), "aggregate booked");
        let node = Rc::new(AggNode::new(id, self.clone(), spec, column));
        self.inner.pipeline.register(&node);
        Ok(ResultHandle::new(node))
    }

    /// Book a 1D histogram of `column`.
    pub fn histo1d(&self, model: HistogramModel, column: &str) -> Result<ResultHandle<HistogramResult>> {
        self.book(AggSpec::Histogram {
            column: column.to_string(),
            model,
        })
    }

    /// Number of rows reaching this node.
    pub fn count(&self) -> Result<ResultHandle<u64>> {
        self.book(AggSpec::Count)
    }

    pub fn sum(&self, column: &str) -> Result<ResultHandle<f64>> {
        self.book(AggSpec::Sum(column.to_string()))
    }

    /// Mean of `column`; `None` when no row qualifies.
    pub fn mean(&self, column: &str) -> Result<ResultHandle<Option<f64>>> {
        self.book(AggSpec::Mean(column.to_string()))
    }

    pub fn min(&self, column: &str) -> Result<ResultHandle<Option<f64>>> {
        self.book(AggSpec::Min(column.to_string()))
    }

    pub fn max(&self, column: &str) -> Result<ResultHandle<Option<f64>>> {
        self.book(AggSpec::Max(column.to_string()))
    }

    /// Collect the values of `column` in row order.
    pub fn take(&self, column: &str) -> Result<ResultHandle<Vec<Value>>> {
        self.book(AggSpec::Take(column.to_string()))
    }

    /// Cut-flow statistics of every named filter upstream of this node.
    pub fn report(&self) -> Result<ResultHandle<Report>> {
        self.book(AggSpec::Report)
    }

    // ---- Traversal helpers ------------------------------------------------

    /// This node and its ancestors, source last.
    pub(crate) fn lineage(&self) -> Vec<Node> {
        let mut out = Vec::new();
        let mut cur = Some(self.clone());
        while let Some(node) = cur {
            cur = node.inner.parent.clone();
            out.push(node);
        }
        out
    }
}

fn kind_label(kind: &NodeKind) -> &'static str {
    match kind {
        NodeKind::Source => "source",
        NodeKind::Filter { .. } => "filter",
        NodeKind::Define { .. } => "define",
        NodeKind::Range { .. } => "range",
    }
}
