use std::collections::VecDeque;

use chrono::{DateTime, Months, Utc};
use model::base_types::{Cost, Km, LocationId, RouteId, VehicleId};
use model::vehicle_spec::VehicleSpec;
use serde::Serialize;

/// Observational view of where a vehicle sits in the state machine (§4.8).
/// Derived from [`VehicleState`]; never stored separately so it can't drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VehicleLifecycle {
    IdleAt { location: LocationId },
    Busy,
}

/// Mutable per-vehicle runtime record. Created once per vehicle at Phase 1
/// exit, mutated only through [`crate::store::VehicleStateStore::advance`],
/// destroyed at run end. `Serialize` backs the vehicle-state log (§6.3).
#[derive(Debug, Clone, Serialize)]
pub struct VehicleState {
    pub vehicle_id: VehicleId,
    pub current_location_id: LocationId,
    pub current_odometer_km: Km,
    pub km_since_last_service: Km,
    pub km_this_lease_year: Km,
    pub total_lifetime_km: Km,
    pub available_from: DateTime<Utc>,
    pub last_route_id: Option<RouteId>,
    pub lease_cycle_number: u32,
    pub lease_start_date: DateTime<Utc>,
    pub lease_end_date: DateTime<Utc>,
    /// Rolling window of `(time, from, to)` relocations, oldest first.
    pub relocations: VecDeque<(DateTime<Utc>, LocationId, LocationId)>,
    pub annual_limit_km: Km,
    pub service_interval_km: Km,
    pub total_contract_limit_km: Option<Km>,
    pub total_service_count: u32,
    pub total_service_cost: Cost,
    pub total_relocation_cost: Cost,
    pub total_overage_cost: Cost,
}

impl VehicleState {
    /// Initial state: idle at its placement location, trivially available
    /// 24h before the run starts (§4.8).
    pub fn initial(spec: &VehicleSpec, placement: LocationId, run_start_time: DateTime<Utc>) -> VehicleState {
        VehicleState {
            vehicle_id: spec.id,
            current_location_id: placement,
            current_odometer_km: spec.current_odometer_km,
            km_since_last_service: 0,
            km_this_lease_year: 0,
            total_lifetime_km: spec.current_odometer_km,
            available_from: run_start_time - chrono::Duration::hours(24),
            last_route_id: None,
            lease_cycle_number: 0,
            lease_start_date: spec.lease_start_date,
            lease_end_date: spec.lease_end_date,
            relocations: VecDeque::new(),
            annual_limit_km: spec.annual_limit_km(),
            service_interval_km: spec.service_interval_km,
            total_contract_limit_km: spec.total_contract_limit_km(),
            total_service_count: 0,
            total_service_cost: 0.0,
            total_relocation_cost: 0.0,
            total_overage_cost: 0.0,
        }
    }

    pub fn lifecycle(&self, now: DateTime<Utc>) -> VehicleLifecycle {
        if now >= self.available_from {
            VehicleLifecycle::IdleAt { location: self.current_location_id }
        } else {
            VehicleLifecycle::Busy
        }
    }

    /// Rolls `[lease_start_date, lease_end_date)` forward one lease year at
    /// a time until `as_of < lease_end_date`, resetting `km_this_lease_year`
    /// on every roll (§3, §4.3 "Lease-boundary correctness").
    pub(crate) fn roll_lease_cycle(&mut self, as_of: DateTime<Utc>) {
        while as_of >= self.lease_end_date {
            self.lease_cycle_number += 1;
            self.km_this_lease_year = 0;
            self.lease_start_date = self.lease_end_date;
            self.lease_end_date = self
                .lease_end_date
                .checked_add_months(Months::new(12))
                .expect("lease end date overflowed while rolling forward");
        }
    }

    /// Count of relocation tuples within the trailing
    /// `[now - swap_period_days, now)` window.
    pub fn swaps_in_window(&self, now: DateTime<Utc>, swap_period_days: i64) -> usize {
        let window_start = now - chrono::Duration::days(swap_period_days);
        self.relocations
            .iter()
            .filter(|(t, _, _)| *t >= window_start && *t < now)
            .count()
    }

    /// Discards relocation tuples older than `now - swap_period_days` (§4.4
    /// `prune_swap_window`).
    pub fn prune_swap_window(&mut self, now: DateTime<Utc>, swap_period_days: i64) {
        let window_start = now - chrono::Duration::days(swap_period_days);
        while matches!(self.relocations.front(), Some((t, _, _)) if *t < window_start) {
            self.relocations.pop_front();
        }
    }

    /// A cheap, read-only view with the lease-roll applied as of
    /// `route_start`, used by the cost and feasibility kernels without
    /// mutating the committed state (§4.4 `snapshot_for_scoring`).
    pub fn snapshot_for_scoring(&self, route_start: DateTime<Utc>) -> VehicleState {
        let mut snapshot = self.clone();
        snapshot.roll_lease_cycle(route_start);
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn base_spec() -> VehicleSpec {
        VehicleSpec::new(
            VehicleId(1),
            "WX1234",
            "Scania",
            120_000,
            0,
            150_000,
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 12, 31, 0, 0, 0).unwrap(),
            0,
            None,
        )
        .unwrap()
    }

    #[test]
    fn initial_state_is_available_a_day_before_run_start() {
        let run_start = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
        let state = VehicleState::initial(&base_spec(), LocationId(10), run_start);
        assert_eq!(state.available_from, run_start - chrono::Duration::hours(24));
        assert_eq!(state.lease_cycle_number, 0);
    }

    #[test]
    fn lease_roll_resets_km_and_advances_exactly_once_at_boundary() {
        let mut state = VehicleState::initial(&base_spec(), LocationId(10), Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        state.km_this_lease_year = 140_000;
        let boundary = Utc.with_ymd_and_hms(2024, 12, 31, 0, 0, 0).unwrap();
        state.roll_lease_cycle(boundary);
        assert_eq!(state.km_this_lease_year, 0);
        assert_eq!(state.lease_cycle_number, 1);
        assert_eq!(state.lease_start_date, boundary);
        assert_eq!(state.lease_end_date, Utc.with_ymd_and_hms(2025, 12, 31, 0, 0, 0).unwrap());
    }

    #[test]
    fn lease_roll_is_noop_strictly_before_boundary() {
        let mut state = VehicleState::initial(&base_spec(), LocationId(10), Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        state.km_this_lease_year = 140_000;
        state.roll_lease_cycle(Utc.with_ymd_and_hms(2024, 12, 30, 23, 59, 59).unwrap());
        assert_eq!(state.km_this_lease_year, 140_000);
        assert_eq!(state.lease_cycle_number, 0);
    }

    #[test]
    fn swap_window_counts_only_trailing_entries() {
        let mut state = VehicleState::initial(&base_spec(), LocationId(10), Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        state.relocations.push_back((Utc.with_ymd_and_hms(2024, 1, 5, 0, 0, 0).unwrap(), LocationId(1), LocationId(2)));
        let now = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        assert_eq!(state.swaps_in_window(now, 90), 1);
        assert_eq!(state.swaps_in_window(now, 20), 0);
    }

    #[test]
    fn prune_swap_window_drops_only_stale_entries() {
        let mut state = VehicleState::initial(&base_spec(), LocationId(10), Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        state.relocations.push_back((Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(), LocationId(1), LocationId(2)));
        state.relocations.push_back((Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(), LocationId(2), LocationId(3)));
        state.prune_swap_window(Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap(), 30);
        assert_eq!(state.relocations.len(), 1);
        assert_eq!(state.relocations[0].1, LocationId(2));
    }
}
