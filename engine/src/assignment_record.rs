use std::collections::HashMap;

use serde::Serialize;

use model::base_types::{Cost, Km, RouteId, VehicleId};

use crate::feasibility::ReasonCode;

/// One append-only entry per route (§3 `Assignment`). `Unassigned` carries a
/// histogram rather than a single reason: every candidate vehicle was
/// rejected, possibly for different reasons, and the summary reports the
/// full breakdown (§4.6 step 5).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AssignmentRecord {
    Assigned {
        route_id: RouteId,
        vehicle_id: VehicleId,
        requires_relocation: bool,
        requires_service: bool,
        relocation_cost: Cost,
        overage_cost: Cost,
        overage_km: Km,
        service_penalty: Cost,
        total_cost: Cost,
        vehicle_km_before: Km,
        vehicle_km_after: Km,
    },
    Unassigned {
        route_id: RouteId,
        reasons: HashMap<ReasonCode, u32>,
    },
}

impl AssignmentRecord {
    pub fn route_id(&self) -> RouteId {
        match self {
            AssignmentRecord::Assigned { route_id, .. } => *route_id,
            AssignmentRecord::Unassigned { route_id, .. } => *route_id,
        }
    }
}
