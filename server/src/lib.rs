use std::collections::HashMap;
use std::time as stdtime;

use chrono::Utc;
use gethostname::gethostname;
use tracing::{info, warn};

use engine::progress::NullProgressSink;
use model::base_types::{LocationId, VehicleId};
use model::config::Config;
use model::io::json_loader;
use solver::run_driver;

/// Loads the §6.1 JSON document (plus an optional `"config"` override), runs
/// the driver once, and assembles the §6.3 output envelope. `Err` carries a
/// human-readable message for an `InputInvalid` failure (§7); the caller
/// turns that into an HTTP 400.
pub fn solve_instance(input_data: serde_json::Value) -> Result<serde_json::Value, String> {
    let start_time = stdtime::Instant::now();

    let config = match input_data.get("config") {
        Some(raw) => Config::from_json(raw).map_err(|e| format!("invalid config: {e}"))?,
        None => Config::default(),
    };
    let cache_capacity = config
        .performance
        .use_relation_cache
        .then_some(model::io::DEFAULT_RELATION_CACHE_CAPACITY);
    let instance = json_loader::load(&input_data, cache_capacity).map_err(|e| e.to_string())?;

    info!(vehicles = instance.vehicle_specs.len(), routes = instance.routes.len(), "solving instance");

    let result = run_driver::execute(
        &instance.vehicle_specs,
        &instance.locations,
        instance.graph.as_ref(),
        &instance.routes,
        &config,
        &NullProgressSink,
        || false,
        None,
    )
    .map_err(|e| e.to_string())?;

    if result.summary.unassigned_routes > 0 {
        warn!(unassigned = result.summary.unassigned_routes, "run finished with unassigned routes");
    }

    let runtime_duration = start_time.elapsed();

    Ok(serde_json::json!({
        "info": {
            "running_time_sec": runtime_duration.as_secs_f64(),
            "timestamp_utc": Utc::now().to_rfc3339(),
            "hostname": gethostname().into_string().unwrap_or_else(|_| "unknown".to_string()),
        },
        "summary": result.summary,
        "assignments": result.assignments,
        "vehicle_states": result.vehicle_states,
        "placement": placement_to_json(&result.placement),
    }))
}

fn placement_to_json(placement: &HashMap<VehicleId, LocationId>) -> serde_json::Value {
    let map: serde_json::Map<String, serde_json::Value> =
        placement.iter().map(|(vehicle, location)| (vehicle.0.to_string(), serde_json::json!(location.0))).collect();
    serde_json::Value::Object(map)
}
