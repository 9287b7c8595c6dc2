//! Cross-references between segments, waterbodies and raw source ids

use super::flow_graph::{FlowGraph, SegmentIx};
use lagosnet_core::{SegmentRecord, Waterbody};
use std::collections::HashMap;
use tracing::debug;

/// Dense index of a waterbody inside one [`IdentifierMaps`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WaterbodyIx(u32);

impl WaterbodyIx {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Segment/waterbody lookups for one subregion.
///
/// A segment has at most one associated waterbody; a waterbody may own any
/// number of segments, including none (landlocked lakes).
#[derive(Debug, Clone, Default)]
pub struct IdentifierMaps {
    waterbody_ids: Vec<String>,
    waterbody_index: HashMap<String, WaterbodyIx>,
    segment_waterbody: Vec<Option<WaterbodyIx>>,
    waterbody_segments: Vec<Vec<SegmentIx>>,
    raw_to_canonical: HashMap<String, String>,
    canonical_to_raw: HashMap<String, String>,
}

impl IdentifierMaps {
    /// Join the segment table to the waterbody table.
    ///
    /// A segment's waterbody attribute is matched against canonical
    /// waterbody ids first, then against their raw source ids. Segments not
    /// present in `graph` (excluded at load time) are ignored.
    pub fn build(graph: &FlowGraph, segments: &[SegmentRecord], waterbodies: &[Waterbody]) -> Self {
        let mut maps = IdentifierMaps {
            segment_waterbody: vec![None; graph.len()],
            ..IdentifierMaps::default()
        };

        let mut by_source: HashMap<&str, WaterbodyIx> = HashMap::new();
        for wb in waterbodies {
            if maps.waterbody_index.contains_key(&wb.id) {
                continue;
            }
            let ix = WaterbodyIx(maps.waterbody_ids.len() as u32);
            maps.waterbody_ids.push(wb.id.clone());
            maps.waterbody_index.insert(wb.id.clone(), ix);
            maps.waterbody_segments.push(Vec::new());
            if let Some(raw) = &wb.source_id {
                by_source.insert(raw.as_str(), ix);
                maps.register_raw(raw, &wb.id);
            }
        }

        let mut unmatched = 0_usize;
        for seg in segments {
            if let Some(raw) = &seg.source_id {
                maps.register_raw(raw, &seg.id);
            }
            let Some(six) = graph.lookup(&seg.id) else {
                continue;
            };
            let Some(attr) = seg.waterbody_id.as_deref() else {
                continue;
            };
            let wix = maps
                .waterbody_index
                .get(attr)
                .copied()
                .or_else(|| by_source.get(attr).copied());
            match wix {
                Some(wix) => {
                    maps.segment_waterbody[six.index()] = Some(wix);
                    maps.waterbody_segments[wix.index()].push(six);
                }
                None => unmatched += 1,
            }
        }
        for owned in &mut maps.waterbody_segments {
            owned.sort_unstable();
        }

        debug!(
            "identifier maps: {} waterbodies, {} segments in waterbodies, {} unmatched waterbody attributes",
            maps.waterbody_ids.len(),
            maps.segment_waterbody.iter().filter(|w| w.is_some()).count(),
            unmatched
        );
        maps
    }

    fn register_raw(&mut self, raw: &str, canonical: &str) {
        self.raw_to_canonical.insert(raw.to_string(), canonical.to_string());
        self.canonical_to_raw.insert(canonical.to_string(), raw.to_string());
    }

    pub fn waterbody_count(&self) -> usize {
        self.waterbody_ids.len()
    }

    pub fn waterbody_ix(&self, id: &str) -> Option<WaterbodyIx> {
        self.waterbody_index.get(id).copied()
    }

    pub fn waterbody_id(&self, ix: WaterbodyIx) -> &str {
        &self.waterbody_ids[ix.index()]
    }

    /// Owning waterbody of a segment
    pub fn segment_to_waterbody(&self, segment: SegmentIx) -> Option<WaterbodyIx> {
        self.segment_waterbody.get(segment.index()).copied().flatten()
    }

    /// Segments owned by a waterbody, in index order
    pub fn waterbody_to_segments(&self, waterbody: WaterbodyIx) -> &[SegmentIx] {
        &self.waterbody_segments[waterbody.index()]
    }

    /// Segments owned by the waterbody with this id; empty if the id is unknown.
    pub fn segments_of(&self, waterbody_id: &str) -> &[SegmentIx] {
        self.waterbody_ix(waterbody_id)
            .map(|ix| self.waterbody_to_segments(ix))
            .unwrap_or(&[])
    }

    /// Canonical id for a raw source id
    pub fn canonical_id(&self, raw: &str) -> Option<&str> {
        self.raw_to_canonical.get(raw).map(String::as_str)
    }

    /// Raw source id for a canonical segment or waterbody id
    pub fn raw_id(&self, canonical: &str) -> Option<&str> {
        self.canonical_to_raw.get(canonical).map(String::as_str)
    }

    pub fn waterbodies(&self) -> impl Iterator<Item = WaterbodyIx> + '_ {
        (0..self.waterbody_ids.len() as u32).map(WaterbodyIx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::flow_graph::FlowGraphParams;
    use lagosnet_core::FlowRow;

    fn fixture() -> (FlowGraph, Vec<SegmentRecord>, Vec<Waterbody>) {
        let rows = vec![
            FlowRow::new("1", "2"),
            FlowRow::new("2", "3"),
            FlowRow::new("3", "4"),
            FlowRow::new("4", "0"),
        ];
        let segments = vec![
            SegmentRecord::new("1").with_source_id("p1"),
            SegmentRecord::new("2").in_waterbody("100"),
            SegmentRecord::new("3").in_waterbody("wb-100"),
            SegmentRecord::new("4").in_waterbody("nowhere"),
        ];
        let waterbodies = vec![
            Waterbody::new("100", 0.5, 39004).with_source_id("wb-100"),
            Waterbody::new("200", 0.02, 39004),
        ];
        let graph = FlowGraph::load(&rows, &segments, |_| false, &FlowGraphParams::default()).unwrap();
        (graph, segments, waterbodies)
    }

    #[test]
    fn test_join_by_canonical_and_raw_ids() {
        let (graph, segments, waterbodies) = fixture();
        let maps = IdentifierMaps::build(&graph, &segments, &waterbodies);

        let owned: Vec<&str> = maps.segments_of("100").iter().map(|&s| graph.id(s)).collect();
        assert_eq!(owned, vec!["2", "3"]);

        let two = graph.lookup("2").unwrap();
        let wb = maps.segment_to_waterbody(two).unwrap();
        assert_eq!(maps.waterbody_id(wb), "100");

        assert!(maps.segment_to_waterbody(graph.lookup("4").unwrap()).is_none());
    }

    #[test]
    fn test_landlocked_waterbody_owns_nothing() {
        let (graph, segments, waterbodies) = fixture();
        let maps = IdentifierMaps::build(&graph, &segments, &waterbodies);
        assert!(maps.segments_of("200").is_empty());
        assert!(maps.segments_of("missing").is_empty());
        assert_eq!(maps.waterbody_count(), 2);
    }

    #[test]
    fn test_raw_id_table() {
        let (graph, segments, waterbodies) = fixture();
        let maps = IdentifierMaps::build(&graph, &segments, &waterbodies);
        assert_eq!(maps.canonical_id("wb-100"), Some("100"));
        assert_eq!(maps.raw_id("1"), Some("p1"));
        assert_eq!(maps.raw_id("2"), None);
    }
}
