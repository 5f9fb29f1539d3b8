//! Thin loaders for the five input tables (§6.1). These only parse and
//! validate shape; they do not retry, cache, or talk to a database — that
//! stays out of scope (§1, §10).

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use tracing::{info, instrument};

use crate::base_types::{Distance, Hours, LocationId, RouteId, VehicleId};
use crate::error::ModelError;
use crate::graph::{Edge, GraphIndex};
use crate::location::Location;
use crate::route::{Route, Segment};
use crate::vehicle_spec::VehicleSpec;

/// Default bound for the relation cache when `performance.use_relation_cache`
/// is set and the caller does not pick its own capacity (§4.1, §6.2).
pub const DEFAULT_RELATION_CACHE_CAPACITY: usize = 4_096;

/// The fully parsed and validated input to a run: everything Phase 1 and
/// Phase 2 need, with routes already sorted by `start_time`.
pub struct LoadedInstance {
    pub locations: Vec<Location>,
    pub graph: Arc<GraphIndex>,
    pub vehicle_specs: Vec<VehicleSpec>,
    pub routes: Vec<Route>,
}

/// "N/A" is treated as null when reading text-formatted inputs (§6.1).
fn none_if_na(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("n/a") {
        None
    } else {
        Some(trimmed)
    }
}

/// Accepts `"2024-01-01T08:00:00"`, `"2024-01-01T08:00"`, and `"2024-01-01
/// 08:00:00"`, all treated as UTC.
pub fn parse_datetime(raw: &str) -> Result<DateTime<Utc>, ModelError> {
    let normalized = raw.trim().replace(' ', "T");
    let candidates = [normalized.clone(), format!("{normalized}:00")];
    for candidate in &candidates {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(candidate, "%Y-%m-%dT%H:%M:%S") {
            return Ok(DateTime::from_naive_utc_and_offset(parsed, Utc));
        }
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(&normalized) {
        return Ok(parsed.with_timezone(&Utc));
    }
    Err(ModelError::MalformedRow(format!("invalid datetime: {raw}")))
}

#[derive(Debug, Deserialize)]
pub struct LocationRow {
    pub id: u32,
    pub name: String,
    pub lat: f64,
    pub long: f64,
    pub is_hub: u8,
}

#[derive(Debug, Deserialize)]
pub struct LocationRelationRow {
    pub id: u32,
    pub id_loc_1: u32,
    pub id_loc_2: u32,
    pub dist: f64,
    pub time: f64,
}

#[derive(Debug, Deserialize)]
pub struct VehicleRow {
    pub id: u32,
    pub registration: String,
    pub brand: String,
    pub service_interval_km: i64,
    pub leasing_start_km: i64,
    pub leasing_limit_km: i64,
    pub leasing_start_date: String,
    pub leasing_end_date: String,
    pub current_odometer_km: i64,
    pub current_location_id: String,
}

#[derive(Debug, Deserialize)]
pub struct RouteRow {
    pub id: u32,
    pub start_datetime: String,
    pub end_datetime: String,
    pub distance_km: f64,
}

#[derive(Debug, Deserialize)]
pub struct SegmentRow {
    pub id: u32,
    pub route_id: u32,
    pub seq: u32,
    pub start_loc_id: u32,
    pub end_loc_id: u32,
    pub start_datetime: String,
    pub end_datetime: String,
    pub relation_id: String,
}

/// Reads a `;`-delimited CSV file into rows of type `T`, in the style the
/// corpus uses for its tabular fleet inputs.
fn read_csv<T: for<'de> Deserialize<'de>>(path: &str) -> Result<Vec<T>, ModelError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .from_path(path)
        .map_err(|e| ModelError::MalformedRow(format!("{path}: {e}")))?;
    reader
        .deserialize()
        .map(|row| row.map_err(|e| ModelError::MalformedRow(format!("{path}: {e}"))))
        .collect()
}

pub mod csv_loader {
    use super::*;

    /// `cache_capacity` mirrors `performance.use_relation_cache` (§6.2): pass
    /// `Some(n)` to wrap the assembled graph in a bounded LRU of `n` entries,
    /// `None` to look up edges directly.
    #[instrument(skip_all, fields(locations_path, routes_path))]
    pub fn load(
        locations_path: &str,
        relations_path: &str,
        vehicles_path: &str,
        routes_path: &str,
        segments_path: &str,
        cache_capacity: Option<usize>,
    ) -> Result<LoadedInstance, ModelError> {
        let locations: Vec<LocationRow> = read_csv(locations_path)?;
        let relations: Vec<LocationRelationRow> = read_csv(relations_path)?;
        let vehicles: Vec<VehicleRow> = read_csv(vehicles_path)?;
        let routes: Vec<RouteRow> = read_csv(routes_path)?;
        let segments: Vec<SegmentRow> = read_csv(segments_path)?;
        info!(
            locations = locations.len(),
            vehicles = vehicles.len(),
            routes = routes.len(),
            "csv instance loaded"
        );
        assemble(locations, relations, vehicles, routes, segments, cache_capacity)
    }
}

pub mod json_loader {
    use super::*;

    /// Accepts a single JSON document with arrays of objects, one per table:
    /// `{"locations": [...], "location_relations": [...], "vehicles": [...],
    /// "routes": [...], "segments": [...]}`.
    #[instrument(skip_all)]
    pub fn load(document: &serde_json::Value, cache_capacity: Option<usize>) -> Result<LoadedInstance, ModelError> {
        let table = |key: &str| -> Result<serde_json::Value, ModelError> {
            document
                .get(key)
                .cloned()
                .ok_or_else(|| ModelError::MalformedRow(format!("missing table: {key}")))
        };
        let from_value = |value: serde_json::Value| -> Result<Vec<_>, ModelError> {
            serde_json::from_value(value).map_err(|e| ModelError::MalformedRow(e.to_string()))
        };

        let locations: Vec<LocationRow> = from_value(table("locations")?)?;
        let relations: Vec<LocationRelationRow> = from_value(table("location_relations")?)?;
        let vehicles: Vec<VehicleRow> = from_value(table("vehicles")?)?;
        let routes: Vec<RouteRow> = from_value(table("routes")?)?;
        let segments: Vec<SegmentRow> = from_value(table("segments")?)?;
        info!(
            locations = locations.len(),
            vehicles = vehicles.len(),
            routes = routes.len(),
            "json instance loaded"
        );
        assemble(locations, relations, vehicles, routes, segments, cache_capacity)
    }
}

fn assemble(
    location_rows: Vec<LocationRow>,
    relation_rows: Vec<LocationRelationRow>,
    vehicle_rows: Vec<VehicleRow>,
    route_rows: Vec<RouteRow>,
    segment_rows: Vec<SegmentRow>,
    cache_capacity: Option<usize>,
) -> Result<LoadedInstance, ModelError> {
    let locations: Vec<Location> = location_rows
        .iter()
        .map(|row| Location::new(LocationId(row.id), row.name.clone(), row.lat, row.long, row.is_hub != 0))
        .collect();
    let known_locations: std::collections::HashSet<LocationId> =
        locations.iter().map(|l| l.id).collect();

    let mut edges = Vec::with_capacity(relation_rows.len());
    for row in &relation_rows {
        let from = LocationId(row.id_loc_1);
        let to = LocationId(row.id_loc_2);
        if row.dist < 0.0 || row.time < 0.0 {
            return Err(ModelError::NegativeEdgeMetric { from, to });
        }
        if from == to {
            return Err(ModelError::SelfLoopEdge { from, to });
        }
        edges.push((
            (from, to),
            Edge {
                distance: Distance::from_km(row.dist),
                time: Hours(row.time),
            },
        ));
    }
    let graph = GraphIndex::new(edges);
    let graph = Arc::new(match cache_capacity {
        Some(capacity) => graph.with_cache(capacity),
        None => graph,
    });

    let vehicle_specs = vehicle_rows
        .iter()
        .map(|row| {
            let initial_location_id = none_if_na(&row.current_location_id)
                .map(|s| s.parse::<u32>().map(LocationId))
                .transpose()
                .map_err(|_| ModelError::MalformedRow(format!("vehicle {}: bad location id", row.id)))?;
            VehicleSpec::new(
                VehicleId(row.id),
                row.registration.clone(),
                row.brand.clone(),
                row.service_interval_km,
                row.leasing_start_km,
                row.leasing_limit_km,
                parse_datetime(&row.leasing_start_date)?,
                parse_datetime(&row.leasing_end_date)?,
                row.current_odometer_km,
                initial_location_id,
            )
        })
        .collect::<Result<Vec<_>, ModelError>>()?;

    let mut segments_by_route: HashMap<RouteId, Vec<Segment>> = HashMap::new();
    for row in &segment_rows {
        let route_id = RouteId(row.route_id);
        let start_location_id = LocationId(row.start_loc_id);
        let end_location_id = LocationId(row.end_loc_id);
        if !known_locations.contains(&start_location_id) {
            return Err(ModelError::UnknownLocation { route: route_id, location: start_location_id });
        }
        if !known_locations.contains(&end_location_id) {
            return Err(ModelError::UnknownLocation { route: route_id, location: end_location_id });
        }
        let relation_id = none_if_na(&row.relation_id)
            .map(|s| s.parse::<u32>())
            .transpose()
            .map_err(|_| ModelError::MalformedRow(format!("segment {}: bad relation id", row.id)))?;
        segments_by_route.entry(route_id).or_default().push(Segment {
            route_id,
            seq: row.seq,
            start_location_id,
            end_location_id,
            start_time: parse_datetime(&row.start_datetime)?,
            end_time: parse_datetime(&row.end_datetime)?,
            relation_id,
        });
    }

    let mut routes = route_rows
        .iter()
        .map(|row| {
            let route_id = RouteId(row.id);
            let segments = segments_by_route.remove(&route_id).unwrap_or_default();
            Route::new(
                route_id,
                parse_datetime(&row.start_datetime)?,
                parse_datetime(&row.end_datetime)?,
                row.distance_km,
                segments,
            )
        })
        .collect::<Result<Vec<_>, ModelError>>()?;
    routes.sort_by_key(|r| (r.start_time, r.id));

    Ok(LoadedInstance {
        locations,
        graph,
        vehicle_specs,
        routes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows() -> (
        Vec<LocationRow>,
        Vec<LocationRelationRow>,
        Vec<VehicleRow>,
        Vec<RouteRow>,
        Vec<SegmentRow>,
    ) {
        let locations = vec![
            LocationRow { id: 10, name: "Warsaw".into(), lat: 52.2, long: 21.0, is_hub: 1 },
            LocationRow { id: 20, name: "Krakow".into(), lat: 50.0, long: 19.9, is_hub: 0 },
        ];
        let relations = vec![LocationRelationRow { id: 1, id_loc_1: 20, id_loc_2: 10, dist: 300.0, time: 3.5 }];
        let vehicles = vec![VehicleRow {
            id: 1,
            registration: "WX1234".into(),
            brand: "Scania".into(),
            service_interval_km: 120_000,
            leasing_start_km: 0,
            leasing_limit_km: 150_000,
            leasing_start_date: "2024-01-01T00:00".into(),
            leasing_end_date: "2024-12-31T00:00".into(),
            current_odometer_km: 0,
            current_location_id: "N/A".into(),
        }];
        let routes = vec![RouteRow { id: 1, start_datetime: "2024-01-01T08:00".into(), end_datetime: "2024-01-01T12:00".into(), distance_km: 100.0 }];
        let segments = vec![SegmentRow {
            id: 1,
            route_id: 1,
            seq: 0,
            start_loc_id: 10,
            end_loc_id: 10,
            start_datetime: "2024-01-01T08:00".into(),
            end_datetime: "2024-01-01T12:00".into(),
            relation_id: "N/A".into(),
        }];
        (locations, relations, vehicles, routes, segments)
    }

    #[test]
    fn na_becomes_none_for_optional_fields() {
        let (locations, relations, vehicles, routes, segments) = rows();
        let instance = assemble(locations, relations, vehicles, routes, segments, None).unwrap();
        assert_eq!(instance.vehicle_specs[0].initial_location_id, None);
        assert_eq!(instance.routes[0].segments()[0].relation_id, None);
    }

    #[test]
    fn rejects_segment_with_unknown_location() {
        let (locations, relations, vehicles, routes, mut segments) = rows();
        segments[0].start_loc_id = 999;
        let err = assemble(locations, relations, vehicles, routes, segments, None).unwrap_err();
        assert!(matches!(err, ModelError::UnknownLocation { .. }));
    }

    #[test]
    fn cache_capacity_is_threaded_into_the_assembled_graph() {
        let (locations, relations, vehicles, routes, segments) = rows();
        let instance = assemble(locations, relations, vehicles, routes, segments, Some(DEFAULT_RELATION_CACHE_CAPACITY)).unwrap();
        // lookup still resolves correctly whether or not it came from cold cache
        let edge = instance.graph.edge(LocationId(20), LocationId(10));
        assert!(edge.is_some());
        assert_eq!(instance.graph.edge(LocationId(20), LocationId(10)), edge);
    }

    #[test]
    fn routes_are_sorted_by_start_time_then_id() {
        let (locations, relations, vehicles, mut routes, mut segments) = rows();
        routes.push(RouteRow {
            id: 2,
            start_datetime: "2024-01-01T06:00".into(),
            end_datetime: "2024-01-01T07:00".into(),
            distance_km: 50.0,
        });
        segments.push(SegmentRow {
            id: 2,
            route_id: 2,
            seq: 0,
            start_loc_id: 10,
            end_loc_id: 20,
            start_datetime: "2024-01-01T06:00".into(),
            end_datetime: "2024-01-01T07:00".into(),
            relation_id: "1".into(),
        });
        let instance = assemble(locations, relations, vehicles, routes, segments, None).unwrap();
        assert_eq!(instance.routes[0].id, RouteId(2));
    }
}
