use thiserror::Error;

use model::base_types::{RouteId, VehicleId};
use model::error::ModelError;

/// Failures that can abort a run. Everything else — `Unassignable`,
/// `NoPath`, `LifetimeExceeded` — is data (a [`crate::feasibility::ReasonCode`]
/// on an `Assignment::Unassigned` record), never an `Err` (§7.1).
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("input invalid: {0}")]
    InputInvalid(#[from] ModelError),

    #[error("internal invariant violated after advancing vehicle {vehicle} on route {route}: {detail}")]
    Internal {
        vehicle: VehicleId,
        route: RouteId,
        detail: String,
    },
}
