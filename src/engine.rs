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

//! Lazy execution engine.
//!
//! Aggregates booked on a pipeline stay pending until one of their handles
//! is read. The first read runs a single pass over the source rows that
//! fills every pending aggregate of the pipeline at once; results are then
//! memoized on the aggregate nodes.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::marker::PhantomData;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, info_span, warn};

use crate::agg::{Accumulator, AggOutput, AggResult, AggSpec, CutInfo};
use crate::error::{Error, Result};
use crate::func::Row;
use crate::graph::{ColumnRef, Node, NodeId, NodeKind};
use crate::store::{ColumnStore, Value};

// ---------------------------------------------------------------------------
// CancelToken
// ---------------------------------------------------------------------------

/// Cooperative cancellation flag, checked once per row.
///
/// The flag is sticky: once cancelled, every pass fails with
/// `Error::Cancelled` until [`CancelToken::reset`] is called. Tokens are
/// `Send`, so another thread may cancel a running pass.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn reset(&self) {
        self.flag.store(false, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// Pipeline: state shared by every node of one source
// ---------------------------------------------------------------------------

pub(crate) struct Pipeline {
    store: Rc<ColumnStore>,
    next_id: Cell<NodeId>,
    // Weak so that dropping every handle of an aggregate drops its booking.
    booked: RefCell<Vec<Weak<AggNode>>>,
    n_runs: Cell<u64>,
    running: Cell<bool>,
    cancel: CancelToken,
}

struct RunningGuard<'a>(&'a Cell<bool>);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl Pipeline {
    pub(crate) fn new(store: Rc<ColumnStore>) -> Self {
        Pipeline {
            store,
            next_id: Cell::new(0),
            booked: RefCell::new(Vec::new()),
            n_runs: Cell::new(0),
            running: Cell::new(false),
            cancel: CancelToken::default(),
        }
    }

    /// Allocate the next node id. Ids grow monotonically, so a parent's id
    /// is always below its children's.
    pub(crate) fn next_id(&self) -> NodeId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }

    pub(crate) fn peek_id(&self) -> NodeId {
        self.next_id.get()
    }

    pub(crate) fn store(&self) -> &ColumnStore {
        &self.store
    }

    pub(crate) fn n_runs(&self) -> u64 {
        self.n_runs.get()
    }

    pub(crate) fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub(crate) fn register(&self, node: &Rc<AggNode>) {
        self.booked.borrow_mut().push(Rc::downgrade(node));
    }

    /// Evaluate every pending aggregate in one pass.
    ///
    /// On error nothing is stored: the aggregates stay pending and the next
    /// read runs the whole pass again.
    pub(crate) fn run(&self) -> Result<()> {
        if self.running.get() {
            return Err(Error::InvalidArgument(
                "a pass is already running on this pipeline".into(),
            ));
        }
        let aggs: Vec<Rc<AggNode>> = {
            let mut booked = self.booked.borrow_mut();
            booked.retain(|w| w.upgrade().is_some_and(|a| !a.is_ready()));
            booked.iter().filter_map(Weak::upgrade).collect()
        };
        if aggs.is_empty() {
            return Ok(());
        }

        self.running.set(true);
        let _guard = RunningGuard(&self.running);
        let span = info_span!("pass", aggregates = aggs.len(), rows = self.store.nrows());
        let _enter = span.enter();

        let results = match Pass::new(&self.store, &aggs).and_then(|pass| pass.execute(&self.cancel)) {
            Ok(results) => results,
            Err(err) => {
                warn!(error = %err, "pass aborted, results discarded");
                return Err(err);
            }
        };
        for (agg, result) in aggs.iter().zip(results) {
            *agg.result.borrow_mut() = Some(result);
        }
        self.n_runs.set(self.n_runs.get() + 1);
        self.booked
            .borrow_mut()
            .retain(|w| w.upgrade().is_some_and(|a| !a.is_ready()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// AggNode / ResultHandle
// ---------------------------------------------------------------------------

/// Terminal node: an aggregate booked on a parent node.
pub(crate) struct AggNode {
    id: NodeId,
    parent: Node,
    spec: AggSpec,
    column: Option<ColumnRef>,
    result: RefCell<Option<AggResult>>,
}

impl AggNode {
    pub(crate) fn new(id: NodeId, parent: Node, spec: AggSpec, column: Option<ColumnRef>) -> Self {
        AggNode {
            id,
            parent,
            spec,
            column,
            result: RefCell::new(None),
        }
    }

    fn is_ready(&self) -> bool {
        self.result.borrow().is_some()
    }
}

/// Deferred result of an aggregate.
///
/// Reading the handle the first time runs the pipeline's pass; later reads
/// return the memoized value without touching the rows.
pub struct ResultHandle<T> {
    node: Rc<AggNode>,
    _out: PhantomData<fn() -> T>,
}

impl<T> Clone for ResultHandle<T> {
    fn clone(&self) -> Self {
        ResultHandle {
            node: self.node.clone(),
            _out: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for ResultHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultHandle")
            .field("node", &self.node.id)
            .field("kind", &self.node.spec.kind_name())
            .field("ready", &self.node.is_ready())
            .finish()
    }
}

impl<T> ResultHandle<T> {
    pub(crate) fn new(node: Rc<AggNode>) -> Self {
        ResultHandle {
            node,
            _out: PhantomData,
        }
    }

    /// True once the value has been computed.
    pub fn is_ready(&self) -> bool {
        self.node.is_ready()
    }

    pub fn spec(&self) -> &AggSpec {
        &self.node.spec
    }

    /// Node the aggregate was booked on.
    pub fn node(&self) -> &Node {
        &self.node.parent
    }
}

impl<T: AggOutput> ResultHandle<T> {
    /// Finalized aggregate value. Triggers the pass on first call only.
    pub fn get(&self) -> Result<T> {
        if !self.node.is_ready() {
            self.node.parent.inner.pipeline.run()?;
        }
        let result = self.node.result.borrow();
        let result = result
            .as_ref()
            .ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "{} aggregate is not booked on its pipeline",
                    self.node.spec.kind_name()
                ))
            })?;
        T::from_result(result).ok_or_else(|| {
            Error::InvalidArgument(format!(
                "{} result cannot be read as {}",
                self.node.spec.kind_name(),
                std::any::type_name::<T>()
            ))
        })
    }
}

// ---------------------------------------------------------------------------
// Pass: one traversal of the source rows
// ---------------------------------------------------------------------------

/// Resolved column location inside a pass.
#[derive(Debug, Clone, Copy)]
enum Col {
    Source(usize),
    Entry,
    /// Define step at this slot.
    Slot(usize),
}

struct Step {
    node: Node,
    parent: Option<usize>,
    inputs: Vec<Col>,
    /// Sinks downstream of this step.
    dependents: Vec<usize>,
}

#[derive(Default, Clone, Copy)]
struct RangeState {
    seen: u64,
    saturated: bool,
}

#[derive(Default, Clone, Copy)]
struct FilterStats {
    all: u64,
    pass: u64,
}

struct Sink {
    acc: Accumulator,
    parent: usize,
    column: Option<Col>,
    column_name: String,
    /// Range steps on the path to the source.
    ranges: Vec<usize>,
    /// Named filters upstream, source first. Reports only.
    cuts: Vec<(String, usize)>,
}

struct Pass<'a> {
    store: &'a ColumnStore,
    steps: Vec<Step>,
    sinks: Vec<Sink>,
    ranges: Vec<RangeState>,
    stats: Vec<FilterStats>,
    active: Vec<bool>,
    blocked: Vec<bool>,
}

impl<'a> Pass<'a> {
    fn new(store: &'a ColumnStore, aggs: &[Rc<AggNode>]) -> Result<Self> {
        // Union of all lineages, ordered by id (parents before children).
        let mut nodes: BTreeMap<NodeId, Node> = BTreeMap::new();
        for agg in aggs {
            for node in agg.parent.lineage() {
                if nodes.contains_key(&node.inner.id) {
                    break;
                }
                nodes.insert(node.inner.id, node);
            }
        }
        let slot_of: HashMap<NodeId, usize> =
            nodes.keys().enumerate().map(|(slot, &id)| (id, slot)).collect();
        let slot = |id: NodeId| -> Result<usize> {
            slot_of
                .get(&id)
                .copied()
                .ok_or_else(|| Error::Schema(format!("node {id} is not part of this pass")))
        };
        let resolve = |col: ColumnRef| -> Result<Col> {
            Ok(match col {
                ColumnRef::Source(i) => Col::Source(i),
                ColumnRef::Entry => Col::Entry,
                ColumnRef::Derived(id) => Col::Slot(slot(id)?),
            })
        };

        let mut steps = Vec::with_capacity(nodes.len());
        for node in nodes.into_values() {
            let parent = node
                .inner
                .parent
                .as_ref()
                .map(|p| slot(p.inner.id))
                .transpose()?;
            let inputs = match &node.inner.kind {
                NodeKind::Filter { inputs, .. } | NodeKind::Define { inputs, .. } => inputs
                    .cols
                    .iter()
                    .map(|&c| resolve(c))
                    .collect::<Result<Vec<_>>>()?,
                _ => Vec::new(),
            };
            steps.push(Step {
                node,
                parent,
                inputs,
                dependents: Vec::new(),
            });
        }

        let mut sinks = Vec::with_capacity(aggs.len());
        for (k, agg) in aggs.iter().enumerate() {
            let lineage = agg.parent.lineage();
            let mut ranges = Vec::new();
            let mut cuts = Vec::new();
            for node in lineage.iter().rev() {
                let at = slot(node.inner.id)?;
                steps[at].dependents.push(k);
                match &node.inner.kind {
                    NodeKind::Range { .. } => ranges.push(at),
                    NodeKind::Filter { name: Some(name), .. } if matches!(agg.spec, AggSpec::Report) => {
                        cuts.push((name.clone(), at))
                    }
                    _ => {}
                }
            }
            sinks.push(Sink {
                acc: Accumulator::new(&agg.spec)?,
                parent: slot(agg.parent.inner.id)?,
                column: agg.column.map(resolve).transpose()?,
                column_name: agg.spec.column().unwrap_or_default().to_string(),
                ranges,
                cuts,
            });
        }

        let mut ranges = vec![RangeState::default(); steps.len()];
        for (at, step) in steps.iter().enumerate() {
            if let NodeKind::Range { begin, end, .. } = step.node.inner.kind {
                ranges[at].saturated = end == Some(begin);
            }
        }

        let n = steps.len();
        let mut pass = Pass {
            store,
            steps,
            blocked: vec![false; sinks.len()],
            sinks,
            ranges,
            stats: vec![FilterStats::default(); n],
            active: vec![true; n],
        };
        pass.refresh();
        debug!(steps = n, sinks = pass.sinks.len(), "pass planned");
        Ok(pass)
    }

    /// Recompute which sinks are cut off by a saturated range and which
    /// steps still feed a live sink. Returns whether any sink is live.
    fn refresh(&mut self) -> bool {
        for (k, sink) in self.sinks.iter().enumerate() {
            self.blocked[k] = sink.ranges.iter().any(|&s| self.ranges[s].saturated);
        }
        for (slot, step) in self.steps.iter().enumerate() {
            self.active[slot] = step.dependents.iter().any(|&k| !self.blocked[k]);
        }
        self.blocked.iter().any(|b| !b)
    }

    fn execute(mut self, cancel: &CancelToken) -> Result<Vec<AggResult>> {
        let nrows = self.store.nrows();
        let mut reached = vec![false; self.steps.len()];
        let mut derived: Vec<Option<Value>> = vec![None; self.steps.len()];
        let mut visited = 0usize;
        let mut live = self.blocked.iter().any(|b| !b);

        for row in 0..nrows {
            if !live {
                break;
            }
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            derived.iter_mut().for_each(|d| *d = None);
            let mut saturated_now = false;

            for slot in 0..self.steps.len() {
                if !self.active[slot] {
                    reached[slot] = false;
                    continue;
                }
                let step = &self.steps[slot];
                let parent_reached = step.parent.map_or(true, |p| reached[p]);
                reached[slot] = parent_reached
                    && match &step.node.inner.kind {
                        NodeKind::Source | NodeKind::Define { .. } => true,
                        NodeKind::Filter {
                            predicate, inputs, ..
                        } => {
                            let values = self.gather(&step.inputs, row, &mut derived)?;
                            let ok = predicate.call(&Row::new(&inputs.names, &values))?;
                            let stats = &mut self.stats[slot];
                            stats.all += 1;
                            stats.pass += ok as u64;
                            ok
                        }
                        NodeKind::Range { begin, end, stride } => {
                            let state = &mut self.ranges[slot];
                            let i = state.seen;
                            state.seen += 1;
                            let ok = i >= *begin
                                && end.map_or(true, |e| i < e)
                                && (i - *begin) % *stride == 0;
                            if let Some(last) = last_index(*begin, *end, *stride) {
                                if i >= last {
                                    state.saturated = true;
                                    saturated_now = true;
                                }
                            }
                            ok
                        }
                    };
            }

            for k in 0..self.sinks.len() {
                if self.blocked[k] || !reached[self.sinks[k].parent] {
                    continue;
                }
                let value = match self.sinks[k].column {
                    Some(col) => Some(self.value(col, row, &mut derived)?),
                    None => None,
                };
                let sink = &mut self.sinks[k];
                sink.acc.fill(&sink.column_name, value)?;
            }
            visited += 1;

            if saturated_now {
                live = self.refresh();
                if !live {
                    debug!(row, "every aggregate behind a saturated range, stopping");
                }
            }
        }

        info!(visited, early_stop = visited < nrows, "pass complete");
        let stats = self.stats;
        Ok(self
            .sinks
            .into_iter()
            .map(|sink| {
                let cuts = sink
                    .cuts
                    .into_iter()
                    .map(|(name, slot)| CutInfo {
                        name,
                        all: stats[slot].all,
                        pass: stats[slot].pass,
                    })
                    .collect();
                sink.acc.finalize(cuts)
            })
            .collect())
    }

    fn gather(&self, cols: &[Col], row: usize, derived: &mut [Option<Value>]) -> Result<Vec<Value>> {
        cols.iter().map(|&c| self.value(c, row, derived)).collect()
    }

    /// Value of a column at `row`. Defined columns are computed on first
    /// use and cached for the rest of the row.
    fn value(&self, col: Col, row: usize, derived: &mut [Option<Value>]) -> Result<Value> {
        match col {
            Col::Source(i) => Ok(self.store.column_at(i).value_at(row)),
            Col::Entry => Ok(Value::I64(row as i64)),
            Col::Slot(slot) => {
                if let Some(v) = &derived[slot] {
                    return Ok(v.clone());
                }
                let step = &self.steps[slot];
                let NodeKind::Define {
                    name,
                    transform,
                    inputs,
                } = &step.node.inner.kind
                else {
                    return Err(Error::Schema(format!("slot {slot} is not a define")));
                };
                let values = self.gather(&step.inputs, row, derived)?;
                let v = transform.call(name, &Row::new(&inputs.names, &values))?;
                derived[slot] = Some(v.clone());
                Ok(v)
            }
        }
    }
}

/// Last index a range window can pass, or None when unbounded or empty.
fn last_index(begin: u64, end: Option<u64>, stride: u64) -> Option<u64> {
    let end = end?;
    if end <= begin {
        return None;
    }
    Some(begin + (end - 1 - begin) / stride * stride)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_index_of_windows() {
        assert_eq!(last_index(0, Some(2), 1), Some(1));
        assert_eq!(last_index(1, Some(10), 4), Some(9));
        assert_eq!(last_index(1, Some(9), 4), Some(5));
        assert_eq!(last_index(3, Some(3), 1), None);
        assert_eq!(last_index(0, None, 1), None);
    }

    #[test]
    fn unbooked_aggregate_is_not_a_schema_error() {
        let df = crate::graph::open_source([(
            "x",
            crate::store::ColumnData::from(vec![1i64, 2]),
        )])
        .unwrap();
        let node = Rc::new(AggNode::new(99, df.clone(), AggSpec::Count, None));
        let handle: ResultHandle<u64> = ResultHandle::new(node);
        let err = handle.get().unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert!(!err.is_schema_error());
        assert!(!handle.is_ready());
        assert_eq!(df.count().unwrap().get().unwrap(), 2);
    }

    #[test]
    fn cancel_token_is_sticky() {
        let t = CancelToken::default();
        let t2 = t.clone();
        t2.cancel();
        assert!(t.is_cancelled());
        t.reset();
        assert!(!t2.is_cancelled());
    }
}
