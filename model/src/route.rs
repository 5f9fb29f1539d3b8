use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::base_types::{Km, LocationId, RouteId};
use crate::error::ModelError;

/// An intra-route leg between two locations, ordered within the route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub route_id: RouteId,
    pub seq: u32,
    pub start_location_id: LocationId,
    pub end_location_id: LocationId,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub relation_id: Option<u32>,
}

/// A dated delivery job. `start_location_id`/`end_location_id`/`is_loop` are
/// derived from the segment list ordered by `seq`, never stored redundantly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub id: RouteId,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub distance_km: f64,
    segments: Vec<Segment>,
}

impl Route {
    /// Validates the invariants in §3.1 and constructs a `Route`. Segments
    /// need not already be sorted; they are sorted by `seq` here.
    pub fn new(
        id: RouteId,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        distance_km: f64,
        mut segments: Vec<Segment>,
    ) -> Result<Route, ModelError> {
        if distance_km <= 0.0 {
            return Err(ModelError::NonPositiveRouteDistance { route: id, distance_km });
        }
        if end_time < start_time {
            return Err(ModelError::RouteEndsBeforeStart {
                route: id,
                start: start_time.to_rfc3339(),
                end: end_time.to_rfc3339(),
            });
        }
        if segments.is_empty() {
            return Err(ModelError::EmptySegmentList { route: id });
        }

        segments.sort_by_key(|s| s.seq);
        for (expected, segment) in segments.iter().enumerate() {
            if segment.seq != expected as u32 {
                return Err(ModelError::NonContiguousSegments {
                    route: id,
                    expected: expected as u32,
                    got: segment.seq,
                });
            }
        }

        // Every leg must pick up where the previous one dropped off, the
        // same chain-continuity check the corpus runs over a node sequence
        // with `tuple_windows` before trusting it as a single journey.
        for (prev, next) in segments.iter().tuple_windows() {
            if prev.end_location_id != next.start_location_id {
                return Err(ModelError::DisjointSegmentChain {
                    route: id,
                    prev_seq: prev.seq,
                    prev_end: prev.end_location_id,
                    next_seq: next.seq,
                    next_start: next.start_location_id,
                });
            }
        }

        Ok(Route {
            id,
            start_time,
            end_time,
            distance_km,
            segments,
        })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn start_location_id(&self) -> LocationId {
        self.segments.first().expect("validated non-empty").start_location_id
    }

    pub fn end_location_id(&self) -> LocationId {
        self.segments.last().expect("validated non-empty").end_location_id
    }

    pub fn is_loop(&self) -> bool {
        self.start_location_id() == self.end_location_id()
    }

    /// Distance rounded to the nearest whole kilometer, as added to state
    /// counters (§4.2).
    pub fn rounded_distance_km(&self) -> Km {
        self.distance_km.round() as Km
    }
}
