use thiserror::Error;

use crate::base_types::{LocationId, RouteId, VehicleId};

/// Failures that abort a run before or during input loading (§7
/// `InputInvalid`). Every variant names the offending row so the caller can
/// report it without re-scanning the source.
#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    #[error("route {route}: distance_km must be positive, got {distance_km}")]
    NonPositiveRouteDistance { route: RouteId, distance_km: f64 },

    #[error("route {route}: end_time ({end}) is before start_time ({start})")]
    RouteEndsBeforeStart {
        route: RouteId,
        start: String,
        end: String,
    },

    #[error("route {route}: has no segments")]
    EmptySegmentList { route: RouteId },

    #[error("route {route}: segments are not contiguously ordered by seq (expected {expected}, got {got})")]
    NonContiguousSegments {
        route: RouteId,
        expected: u32,
        got: u32,
    },

    #[error("route {route}: segment {prev_seq} ends at {prev_end} but segment {next_seq} starts at {next_start}")]
    DisjointSegmentChain {
        route: RouteId,
        prev_seq: u32,
        prev_end: LocationId,
        next_seq: u32,
        next_start: LocationId,
    },

    #[error("route {route}: references unknown location {location}")]
    UnknownLocation { route: RouteId, location: LocationId },

    #[error("edge ({from} -> {to}): distance_km and time_hours must be non-negative")]
    NegativeEdgeMetric { from: LocationId, to: LocationId },

    #[error("edge ({from} -> {to}): an edge cannot connect a location to itself")]
    SelfLoopEdge { from: LocationId, to: LocationId },

    #[error("vehicle {vehicle}: leasing_limit_km must be positive, got {leasing_limit_km}")]
    NonPositiveLeasingLimit { vehicle: VehicleId, leasing_limit_km: i64 },

    #[error("vehicle {vehicle}: lease_end_date ({end}) is not after lease_start_date ({start})")]
    LeaseEndsBeforeStart {
        vehicle: VehicleId,
        start: String,
        end: String,
    },

    #[error("vehicle {vehicle}: current_odometer_km must be non-negative, got {current_odometer_km}")]
    NegativeOdometer { vehicle: VehicleId, current_odometer_km: i64 },

    #[error("row could not be parsed: {0}")]
    MalformedRow(String),
}
