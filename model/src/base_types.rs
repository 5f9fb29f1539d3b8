use derive_more::{Display, From};
use serde::{Deserialize, Serialize};

/// Kilometers, rounded to an integer the moment they are added to a running
/// counter. Monetary costs stay floating point (see [`Cost`]).
pub type Km = i64;

/// Monetary amount in PLN. Opaque to the engine beyond addition.
pub type Cost = f64;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, From, Serialize, Deserialize,
)]
pub struct LocationId(pub u32);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, From, Serialize, Deserialize,
)]
pub struct RouteId(pub u32);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, From, Serialize, Deserialize,
)]
pub struct VehicleId(pub u32);

/// Distance in kilometers. `Infinity` marks "no direct relocation path"
/// without forcing every consumer to thread an `Option` through the cost
/// kernel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Distance {
    Km(f64),
    Infinity,
}

impl Distance {
    pub const ZERO: Distance = Distance::Km(0.0);

    pub fn from_km(km: f64) -> Distance {
        Distance::Km(km)
    }

    pub fn km(&self) -> Option<f64> {
        match self {
            Distance::Km(d) => Some(*d),
            Distance::Infinity => None,
        }
    }

    /// Rounds to the nearest whole kilometer, as mandated for state counters.
    pub fn rounded_km(&self) -> Option<Km> {
        self.km().map(|d| d.round() as Km)
    }

    pub fn is_finite(&self) -> bool {
        matches!(self, Distance::Km(_))
    }
}

impl std::fmt::Display for Distance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Distance::Km(d) => write!(f, "{d:.3}km"),
            Distance::Infinity => write!(f, "INF km"),
        }
    }
}

/// Travel time in hours.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Hours(pub f64);

impl Hours {
    pub const ZERO: Hours = Hours(0.0);
}

impl std::fmt::Display for Hours {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}h", self.0)
    }
}
