//! Flow graph: upstream and downstream adjacency over flowline segments
//!
//! External string ids are interned into dense [`SegmentIx`] indices so the
//! tracer works on integer adjacency lists. Both directions are built in the
//! same pass over the flow relation, then cross-checked.

use lagosnet_core::{Error, FlowRow, Result, SegmentRecord, SENTINEL_ID};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Dense index of a segment inside one [`FlowGraph`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SegmentIx(u32);

impl SegmentIx {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Direction of travel along the flow network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Toward sources (follow `upstream`)
    Up,
    /// Toward outlets (follow `downstream`)
    Down,
}

impl Direction {
    pub fn reverse(self) -> Self {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
        }
    }
}

/// What to do with flow-table ids that are not in the segment table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExternalIds {
    /// Fail with a data error
    #[default]
    Reject,
    /// Keep them as boundary nodes belonging to a neighbouring subregion
    AsBoundary,
}

/// Parameters for building a flow graph
#[derive(Debug, Clone)]
pub struct FlowGraphParams {
    /// Id marking "no segment" in the flow table. Default: `"0"`
    pub sentinel: String,
    /// Policy for ids missing from the segment table
    pub external_ids: ExternalIds,
}

impl Default for FlowGraphParams {
    fn default() -> Self {
        Self {
            sentinel: SENTINEL_ID.to_string(),
            external_ids: ExternalIds::Reject,
        }
    }
}

/// Directed flow graph for one hydrologic subregion.
///
/// Invariants: every edge `a -> b` appears as `b` in `downstream(a)` and as
/// `a` in `upstream(b)`; the sentinel id never becomes a node. The graph may
/// contain cycles.
#[derive(Debug, Clone, Default)]
pub struct FlowGraph {
    ids: Vec<String>,
    index: HashMap<String, SegmentIx>,
    external: Vec<bool>,
    upstream: Vec<Vec<SegmentIx>>,
    downstream: Vec<Vec<SegmentIx>>,
}

impl FlowGraph {
    /// Build a graph from the flow relation alone; every non-sentinel id is a segment.
    pub fn from_flows(rows: &[FlowRow], params: &FlowGraphParams) -> Result<Self> {
        let mut graph = FlowGraph::default();
        for (n, row) in rows.iter().enumerate() {
            graph.add_row(n + 1, row, &params.sentinel, None)?;
        }
        graph.verify()?;
        debug!(
            "flow graph: {} segments, {} edges (no segment table)",
            graph.len(),
            graph.edge_count()
        );
        Ok(graph)
    }

    /// Build a graph from the flow relation and the segment table.
    ///
    /// Segments for which `exclude` returns true are dropped before any edge
    /// is added, so no edge references them. Ids in the flow table that are
    /// not in the segment table are handled per `params.external_ids`.
    pub fn load<F>(
        rows: &[FlowRow],
        segments: &[SegmentRecord],
        exclude: F,
        params: &FlowGraphParams,
    ) -> Result<Self>
    where
        F: Fn(&SegmentRecord) -> bool,
    {
        let mut graph = FlowGraph::default();
        let mut excluded: HashSet<&str> = HashSet::new();

        for seg in segments {
            if seg.id == params.sentinel {
                return Err(Error::Data(format!(
                    "segment table uses the sentinel id '{}'",
                    params.sentinel
                )));
            }
            if graph.index.contains_key(&seg.id) || excluded.contains(seg.id.as_str()) {
                return Err(Error::Data(format!(
                    "duplicate segment id '{}' in segment table",
                    seg.id
                )));
            }
            if exclude(seg) {
                excluded.insert(seg.id.as_str());
            } else {
                graph.intern(&seg.id, false);
            }
        }

        let mut dropped = 0_usize;
        for (n, row) in rows.iter().enumerate() {
            if excluded.contains(row.from_id.as_str()) || excluded.contains(row.to_id.as_str()) {
                dropped += 1;
                continue;
            }
            graph.add_row(n + 1, row, &params.sentinel, Some(params.external_ids))?;
        }

        graph.verify()?;
        debug!(
            "flow graph: {} segments ({} boundary), {} edges, {} excluded segments, {} flow rows dropped",
            graph.len(),
            graph.external.iter().filter(|&&e| e).count(),
            graph.edge_count(),
            excluded.len(),
            dropped
        );
        Ok(graph)
    }

    fn intern(&mut self, id: &str, external: bool) -> SegmentIx {
        if let Some(&ix) = self.index.get(id) {
            return ix;
        }
        let ix = SegmentIx(self.ids.len() as u32);
        self.ids.push(id.to_string());
        self.index.insert(id.to_string(), ix);
        self.external.push(external);
        self.upstream.push(Vec::new());
        self.downstream.push(Vec::new());
        ix
    }

    /// `policy` is `None` when there is no segment table to check against.
    fn resolve(&mut self, id: &str, policy: Option<ExternalIds>, line: usize) -> Result<SegmentIx> {
        if let Some(ix) = self.lookup(id) {
            return Ok(ix);
        }
        match policy {
            None => Ok(self.intern(id, false)),
            Some(ExternalIds::AsBoundary) => Ok(self.intern(id, true)),
            Some(ExternalIds::Reject) => Err(Error::Data(format!(
                "flow row {} references segment '{}' which is not in the segment table",
                line, id
            ))),
        }
    }

    fn add_row(&mut self, line: usize, row: &FlowRow, sentinel: &str, policy: Option<ExternalIds>) -> Result<()> {
        match (row.from_id == sentinel, row.to_id == sentinel) {
            (true, true) => Err(Error::Data(format!(
                "flow row {}: both ends are the sentinel id",
                line
            ))),
            // Network source: the segment exists but has no parent
            (true, false) => self.resolve(&row.to_id, policy, line).map(|_| ()),
            // Terminal outflow
            (false, true) => self.resolve(&row.from_id, policy, line).map(|_| ()),
            (false, false) => {
                let from = self.resolve(&row.from_id, policy, line)?;
                let to = self.resolve(&row.to_id, policy, line)?;
                self.link(from, to);
                Ok(())
            }
        }
    }

    fn link(&mut self, from: SegmentIx, to: SegmentIx) {
        if !self.downstream[from.index()].contains(&to) {
            self.downstream[from.index()].push(to);
            self.upstream[to.index()].push(from);
        }
    }

    /// Check that every edge has its reverse entry.
    fn verify(&self) -> Result<()> {
        for (from, targets) in self.downstream.iter().enumerate() {
            for to in targets {
                if !self.upstream[to.index()].iter().any(|u| u.index() == from) {
                    return Err(Error::Data(format!(
                        "segment '{}' flows to '{}' but has no upstream entry there",
                        self.ids[from],
                        self.ids[to.index()]
                    )));
                }
            }
        }
        for (to, sources) in self.upstream.iter().enumerate() {
            for from in sources {
                if !self.downstream[from.index()].iter().any(|d| d.index() == to) {
                    return Err(Error::Data(format!(
                        "segment '{}' lists '{}' upstream but has no downstream entry there",
                        self.ids[to],
                        self.ids[from.index()]
                    )));
                }
            }
        }
        Ok(())
    }

    /// Total number of segments, boundary nodes included
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.downstream.iter().map(Vec::len).sum()
    }

    pub fn id(&self, ix: SegmentIx) -> &str {
        &self.ids[ix.index()]
    }

    pub fn lookup(&self, id: &str) -> Option<SegmentIx> {
        self.index.get(id).copied()
    }

    pub fn upstream(&self, ix: SegmentIx) -> &[SegmentIx] {
        &self.upstream[ix.index()]
    }

    pub fn downstream(&self, ix: SegmentIx) -> &[SegmentIx] {
        &self.downstream[ix.index()]
    }

    pub fn neighbors(&self, ix: SegmentIx, direction: Direction) -> &[SegmentIx] {
        match direction {
            Direction::Up => self.upstream(ix),
            Direction::Down => self.downstream(ix),
        }
    }

    /// True for boundary nodes that belong to a neighbouring subregion
    pub fn is_external(&self, ix: SegmentIx) -> bool {
        self.external[ix.index()]
    }

    pub fn segments(&self) -> impl Iterator<Item = SegmentIx> + '_ {
        (0..self.ids.len() as u32).map(SegmentIx)
    }
}

/// Flow and segment tables for one subregion, ready to be (re)loaded into a graph.
///
/// Each load builds both adjacency maps from scratch, so switching the
/// exclusion predicate never leaves stale entries behind.
#[derive(Debug, Clone, Default)]
pub struct FlowGraphStore {
    flows: Vec<FlowRow>,
    segments: Vec<SegmentRecord>,
    params: FlowGraphParams,
}

impl FlowGraphStore {
    pub fn new(flows: Vec<FlowRow>, segments: Vec<SegmentRecord>, params: FlowGraphParams) -> Self {
        Self { flows, segments, params }
    }

    pub fn flows(&self) -> &[FlowRow] {
        &self.flows
    }

    pub fn segments(&self) -> &[SegmentRecord] {
        &self.segments
    }

    pub fn params(&self) -> &FlowGraphParams {
        &self.params
    }

    /// Load every segment.
    pub fn load(&self) -> Result<FlowGraph> {
        self.load_excluding(|_| false)
    }

    /// Load with an exclusion predicate applied at load time.
    ///
    /// Without a segment table the graph is built from the flow relation alone
    /// and the predicate has nothing to act on.
    pub fn load_excluding<F>(&self, exclude: F) -> Result<FlowGraph>
    where
        F: Fn(&SegmentRecord) -> bool,
    {
        if self.segments.is_empty() {
            FlowGraph::from_flows(&self.flows, &self.params)
        } else {
            FlowGraph::load(&self.flows, &self.segments, exclude, &self.params)
        }
    }

    /// Load with intermittent and ephemeral segments removed.
    pub fn load_perennial(&self) -> Result<FlowGraph> {
        self.load_excluding(|s| s.intermittent)
    }
}
