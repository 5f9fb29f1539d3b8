use serde::{Deserialize, Serialize};

use crate::base_types::{Cost, Km};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementStrategy {
    Proportional,
    CostMatrix,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct PlacementConfig {
    pub strategy: PlacementStrategy,
    pub lookahead_days: i64,
    pub max_concentration: f64,
    pub max_vehicles_per_location: Option<u32>,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        PlacementConfig {
            strategy: PlacementStrategy::Proportional,
            lookahead_days: 14,
            max_concentration: 0.30,
            max_vehicles_per_location: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct AssignmentConfig {
    pub assignment_lookahead_days: i64,
    pub look_ahead_days: i64,
    pub chain_depth: u32,
    pub chain_weight: f64,
    pub max_lookahead_routes: u32,
    pub use_chain_optimization: bool,
}

impl Default for AssignmentConfig {
    fn default() -> Self {
        AssignmentConfig {
            assignment_lookahead_days: 0,
            look_ahead_days: 7,
            chain_depth: 3,
            chain_weight: 0.5,
            max_lookahead_routes: 20,
            // Disabled by default: the source's own notes call it slower and
            // no-better. Ship without it first.
            use_chain_optimization: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SwapPolicyConfig {
    pub max_swaps_per_period: u32,
    pub swap_period_days: i64,
}

impl Default for SwapPolicyConfig {
    fn default() -> Self {
        SwapPolicyConfig {
            max_swaps_per_period: 2,
            swap_period_days: 90,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ServicePolicyConfig {
    pub service_tolerance_km: Km,
    pub service_duration_hours: i64,
    pub service_penalty_pln: Cost,
    pub service_cost_pln: Cost,
}

impl Default for ServicePolicyConfig {
    fn default() -> Self {
        ServicePolicyConfig {
            service_tolerance_km: 2_000,
            service_duration_hours: 8,
            service_penalty_pln: 500.0,
            service_cost_pln: 1_200.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct CostsConfig {
    pub relocation_base_cost_pln: Cost,
    pub relocation_per_km_pln: Cost,
    pub relocation_per_hour_pln: Cost,
    pub overage_per_km_pln: Cost,
}

impl Default for CostsConfig {
    fn default() -> Self {
        CostsConfig {
            relocation_base_cost_pln: 1_000.0,
            relocation_per_km_pln: 1.0,
            relocation_per_hour_pln: 150.0,
            overage_per_km_pln: 0.92,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct PerformanceConfig {
    pub progress_report_days: i64,
    pub progress_report_interval: u32,
    pub use_relation_cache: bool,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        PerformanceConfig {
            progress_report_days: 7,
            progress_report_interval: 500,
            use_relation_cache: true,
        }
    }
}

/// Recognized configuration options (§6.2). Unknown keys are a load error;
/// every field has a documented default so a whole group may be omitted.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields, default)]
pub struct Config {
    pub placement: PlacementConfig,
    pub assignment: AssignmentConfig,
    pub swap_policy: SwapPolicyConfig,
    pub service_policy: ServicePolicyConfig,
    pub costs: CostsConfig,
    pub performance: PerformanceConfig,
}

impl Config {
    pub fn from_json(value: &serde_json::Value) -> Result<Config, serde_json::Error> {
        serde_json::from_value(value.clone())
    }
}
