use std::collections::HashMap;
use std::num::NonZeroUsize;

use lru::LruCache;

use crate::base_types::{Distance, Hours, LocationId};

/// A directed relocation edge between two locations. The graph does not
/// assume a symmetric closure: an edge `(a, b)` says nothing about `(b, a)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    pub distance: Distance,
    pub time: Hours,
}

/// Indexes the location-relation edge list for O(1) expected lookup of
/// `(from, to) -> Option<Edge>`. Construction ingests the edge list as-is.
/// A bounded LRU cache wraps lookups purely as a performance aid: it never
/// changes what a lookup returns, only how fast a repeated one is.
pub struct GraphIndex {
    edges: HashMap<(LocationId, LocationId), Edge>,
    cache: Option<parking_lot::Mutex<LruCache<(LocationId, LocationId), Option<Edge>>>>,
}

impl GraphIndex {
    pub fn new(edges: impl IntoIterator<Item = ((LocationId, LocationId), Edge)>) -> GraphIndex {
        GraphIndex {
            edges: edges.into_iter().collect(),
            cache: None,
        }
    }

    /// Wraps lookups in a bounded LRU cache of `capacity` entries.
    pub fn with_cache(mut self, capacity: usize) -> GraphIndex {
        if let Some(capacity) = NonZeroUsize::new(capacity) {
            self.cache = Some(parking_lot::Mutex::new(LruCache::new(capacity)));
        }
        self
    }

    /// Missing edge means "no direct relocation path": the caller is
    /// infeasible for that route unless it is already at the route start.
    pub fn edge(&self, from: LocationId, to: LocationId) -> Option<Edge> {
        if let Some(cache) = &self.cache {
            let mut cache = cache.lock();
            if let Some(hit) = cache.get(&(from, to)) {
                return *hit;
            }
            let value = self.edges.get(&(from, to)).copied();
            cache.put((from, to), value);
            return value;
        }
        self.edges.get(&(from, to)).copied()
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph() -> GraphIndex {
        GraphIndex::new([(
            (LocationId(1), LocationId(2)),
            Edge {
                distance: Distance::from_km(10.0),
                time: Hours(0.5),
            },
        )])
    }

    #[test]
    fn missing_edge_is_none() {
        let g = graph();
        assert!(g.edge(LocationId(2), LocationId(1)).is_none());
    }

    #[test]
    fn present_edge_is_directional() {
        let g = graph();
        let edge = g.edge(LocationId(1), LocationId(2)).unwrap();
        assert_eq!(edge.distance.km(), Some(10.0));
    }

    #[test]
    fn cache_does_not_change_lookup_result() {
        let g = graph().with_cache(4);
        assert!(g.edge(LocationId(1), LocationId(2)).is_some());
        // second lookup hits the cache, same answer
        assert!(g.edge(LocationId(1), LocationId(2)).is_some());
        assert!(g.edge(LocationId(9), LocationId(9)).is_none());
        assert!(g.edge(LocationId(9), LocationId(9)).is_none());
    }
}
