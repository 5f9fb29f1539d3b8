use serde::{Deserialize, Serialize};

use crate::base_types::LocationId;

/// A depot, hub, or customer site. Immutable for the lifetime of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: LocationId,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub is_hub: bool,
}

impl Location {
    pub fn new(id: LocationId, name: impl Into<String>, latitude: f64, longitude: f64, is_hub: bool) -> Location {
        Location {
            id,
            name: name.into(),
            latitude,
            longitude,
            is_hub,
        }
    }
}
