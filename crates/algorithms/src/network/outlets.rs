//! Subregion outlets and inlets
//!
//! Outlets are the segments where water leaves the subregion: segments
//! flowing into a boundary node of a neighbouring subregion. When nothing
//! leaves (closed or frontal drainage, or a graph built without boundary
//! nodes) the fallback picks one outlet per large connected sub-network:
//! the segment with the largest upstream reach. Only terminal strongly
//! connected components are walked, which keeps the fallback linear on
//! dendritic networks.
//!
//! Inlets are the segments fed from a neighbouring subregion, i.e. with a
//! boundary node upstream.

use super::flow_graph::{Direction, FlowGraph, SegmentIx};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Sub-networks at least this fraction of the largest one get an outlet in
/// the closed-drainage fallback. Empirically tuned.
pub const SECONDARY_OUTLET_FRACTION: f64 = 0.5;

/// Union-Find over segment indices, tracking component sizes
struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<usize>,
    size: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            rank: vec![0; n],
            size: vec![1; n],
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]]; // path halving
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) -> usize {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return ra;
        }

        let (root, child) = if self.rank[ra] >= self.rank[rb] {
            (ra, rb)
        } else {
            (rb, ra)
        };

        self.parent[child] = root;
        self.size[root] += self.size[child];
        if self.rank[root] == self.rank[child] {
            self.rank[root] += 1;
        }
        root
    }
}

/// Segments draining out of the subregion, or the largest sub-networks' outlets.
pub fn find_subregion_outlets(graph: &FlowGraph) -> Vec<SegmentIx> {
    let outlets: Vec<SegmentIx> = graph
        .segments()
        .filter(|&s| !graph.is_external(s))
        .filter(|&s| graph.downstream(s).iter().any(|&d| graph.is_external(d)))
        .collect();

    if !outlets.is_empty() || graph.is_empty() {
        debug!("subregion outlets: {}", outlets.len());
        return outlets;
    }

    let fallback = secondary_outlets(graph);
    debug!(
        "no flow leaves the subregion, {} outlets from the largest sub-networks",
        fallback.len()
    );
    fallback
}

/// Segments fed by a boundary node from a neighbouring subregion.
pub fn find_subregion_inlets(graph: &FlowGraph) -> Vec<SegmentIx> {
    let inlets: Vec<SegmentIx> = graph
        .segments()
        .filter(|&s| !graph.is_external(s))
        .filter(|&s| graph.upstream(s).iter().any(|&u| graph.is_external(u)))
        .collect();
    debug!("subregion inlets: {}", inlets.len());
    inlets
}

fn secondary_outlets(graph: &FlowGraph) -> Vec<SegmentIx> {
    let mut uf = UnionFind::new(graph.len());
    for s in graph.segments() {
        if graph.is_external(s) {
            continue;
        }
        for &d in graph.downstream(s) {
            if !graph.is_external(d) {
                uf.union(s.index(), d.index());
            }
        }
    }

    let mut sizes: HashMap<usize, usize> = HashMap::new();
    for s in graph.segments().filter(|&s| !graph.is_external(s)) {
        *sizes.entry(uf.find(s.index())).or_default() += 1;
    }
    let largest = sizes.values().copied().max().unwrap_or(0);
    let cutoff = largest as f64 * SECONDARY_OUTLET_FRACTION;

    // Reach only grows downstream, so the best member of a sub-network lies
    // in one of its terminal components; one walk per terminal component.
    let mut best: HashMap<usize, (usize, SegmentIx)> = HashMap::new();
    for members in terminal_components(graph) {
        let root = uf.find(members[0].index());
        if (sizes.get(&root).copied().unwrap_or(0) as f64) < cutoff {
            continue;
        }
        let reach = upstream_reach(graph, members[0]);
        let Some(candidate) = members.into_iter().min_by(|a, b| graph.id(*a).cmp(graph.id(*b))) else {
            continue;
        };
        let replace = match best.get(&root) {
            None => true,
            Some(&(r, s)) => reach > r || (reach == r && graph.id(candidate) < graph.id(s)),
        };
        if replace {
            best.insert(root, (reach, candidate));
        }
    }

    let mut outlets: Vec<SegmentIx> = best.into_values().map(|(_, s)| s).collect();
    outlets.sort_unstable_by(|a, b| graph.id(*a).cmp(graph.id(*b)));
    outlets
}

/// Strongly connected components of the internal graph that no internal
/// edge leaves (iterative Tarjan).
fn terminal_components(graph: &FlowGraph) -> Vec<Vec<SegmentIx>> {
    const UNVISITED: usize = usize::MAX;
    let n = graph.len();
    let mut order = vec![UNVISITED; n];
    let mut low = vec![0_usize; n];
    let mut on_stack = vec![false; n];
    let mut component = vec![UNVISITED; n];
    let mut stack: Vec<SegmentIx> = Vec::new();
    let mut components: Vec<Vec<SegmentIx>> = Vec::new();
    let mut counter = 0_usize;

    for root in graph.segments() {
        if graph.is_external(root) || order[root.index()] != UNVISITED {
            continue;
        }
        order[root.index()] = counter;
        low[root.index()] = counter;
        counter += 1;
        stack.push(root);
        on_stack[root.index()] = true;
        let mut calls: Vec<(SegmentIx, usize)> = vec![(root, 0)];

        while let Some(frame) = calls.last_mut() {
            let v = frame.0;
            let down = graph.downstream(v);
            if frame.1 < down.len() {
                let w = down[frame.1];
                frame.1 += 1;
                if graph.is_external(w) {
                    continue;
                }
                if order[w.index()] == UNVISITED {
                    order[w.index()] = counter;
                    low[w.index()] = counter;
                    counter += 1;
                    stack.push(w);
                    on_stack[w.index()] = true;
                    calls.push((w, 0));
                } else if on_stack[w.index()] {
                    low[v.index()] = low[v.index()].min(order[w.index()]);
                }
                continue;
            }

            calls.pop();
            if let Some(&(parent, _)) = calls.last() {
                low[parent.index()] = low[parent.index()].min(low[v.index()]);
            }
            if low[v.index()] == order[v.index()] {
                let id = components.len();
                let mut members = Vec::new();
                while let Some(w) = stack.pop() {
                    on_stack[w.index()] = false;
                    component[w.index()] = id;
                    members.push(w);
                    if w == v {
                        break;
                    }
                }
                components.push(members);
            }
        }
    }

    components
        .into_iter()
        .enumerate()
        .filter(|(id, members)| {
            members.iter().all(|&s| {
                graph
                    .downstream(s)
                    .iter()
                    .all(|&d| graph.is_external(d) || component[d.index()] == *id)
            })
        })
        .map(|(_, members)| members)
        .collect()
}

/// Number of internal segments upstream of `start`, start included
fn upstream_reach(graph: &FlowGraph, start: SegmentIx) -> usize {
    let mut seen: HashSet<SegmentIx> = HashSet::from([start]);
    let mut frontier = vec![start];
    while let Some(s) = frontier.pop() {
        for &u in graph.neighbors(s, Direction::Up) {
            if !graph.is_external(u) && seen.insert(u) {
                frontier.push(u);
            }
        }
    }
    seen.len()
}
