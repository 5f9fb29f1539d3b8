use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::base_types::{Km, LocationId, VehicleId};
use crate::error::ModelError;

/// The threshold (in km) that distinguishes an annual leasing_limit_km from
/// a lifetime one (§3).
pub const LIFETIME_LIMIT_THRESHOLD_KM: Km = 200_000;

/// The annual limit assumed when a vehicle carries a lifetime limit instead
/// of an annual one.
pub const DEFAULT_ANNUAL_LIMIT_KM: Km = 150_000;

/// Immutable leasing-contract facts about a single vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleSpec {
    pub id: VehicleId,
    pub registration: String,
    pub brand: String,
    pub service_interval_km: Km,
    pub leasing_start_km: Km,
    pub leasing_limit_km: Km,
    pub lease_start_date: DateTime<Utc>,
    pub lease_end_date: DateTime<Utc>,
    pub current_odometer_km: Km,
    pub initial_location_id: Option<LocationId>,
}

impl VehicleSpec {
    pub fn new(
        id: VehicleId,
        registration: impl Into<String>,
        brand: impl Into<String>,
        service_interval_km: Km,
        leasing_start_km: Km,
        leasing_limit_km: Km,
        lease_start_date: DateTime<Utc>,
        lease_end_date: DateTime<Utc>,
        current_odometer_km: Km,
        initial_location_id: Option<LocationId>,
    ) -> Result<VehicleSpec, ModelError> {
        if leasing_limit_km <= 0 {
            return Err(ModelError::NonPositiveLeasingLimit {
                vehicle: id,
                leasing_limit_km,
            });
        }
        if lease_end_date <= lease_start_date {
            return Err(ModelError::LeaseEndsBeforeStart {
                vehicle: id,
                start: lease_start_date.to_rfc3339(),
                end: lease_end_date.to_rfc3339(),
            });
        }
        if current_odometer_km < 0 {
            return Err(ModelError::NegativeOdometer {
                vehicle: id,
                current_odometer_km,
            });
        }

        Ok(VehicleSpec {
            id,
            registration: registration.into(),
            brand: brand.into(),
            service_interval_km,
            leasing_start_km,
            leasing_limit_km,
            lease_start_date,
            lease_end_date,
            current_odometer_km,
            initial_location_id,
        })
    }

    /// `leasing_limit_km <= 200_000` is an annual cap used as-is; above that
    /// it is a lifetime cap and the annual cap defaults to 150_000 km.
    pub fn is_lifetime_limit(&self) -> bool {
        self.leasing_limit_km > LIFETIME_LIMIT_THRESHOLD_KM
    }

    pub fn annual_limit_km(&self) -> Km {
        if self.is_lifetime_limit() {
            DEFAULT_ANNUAL_LIMIT_KM
        } else {
            self.leasing_limit_km
        }
    }

    pub fn total_contract_limit_km(&self) -> Option<Km> {
        self.is_lifetime_limit().then_some(self.leasing_limit_km)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn spec(leasing_limit_km: Km) -> VehicleSpec {
        VehicleSpec::new(
            VehicleId(1),
            "WX1234",
            "Scania",
            120_000,
            0,
            leasing_limit_km,
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            0,
            None,
        )
        .unwrap()
    }

    #[test]
    fn leasing_limit_at_or_below_threshold_is_annual() {
        let v = spec(150_000);
        assert!(!v.is_lifetime_limit());
        assert_eq!(v.annual_limit_km(), 150_000);
        assert_eq!(v.total_contract_limit_km(), None);

        let boundary = spec(LIFETIME_LIMIT_THRESHOLD_KM);
        assert!(!boundary.is_lifetime_limit());
    }

    #[test]
    fn leasing_limit_above_threshold_is_lifetime_with_default_annual() {
        let v = spec(600_000);
        assert!(v.is_lifetime_limit());
        assert_eq!(v.annual_limit_km(), DEFAULT_ANNUAL_LIMIT_KM);
        assert_eq!(v.total_contract_limit_km(), Some(600_000));
    }

    #[test]
    fn rejects_non_positive_leasing_limit() {
        let err = VehicleSpec::new(
            VehicleId(1),
            "WX1234",
            "Scania",
            120_000,
            0,
            0,
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            0,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, ModelError::NonPositiveLeasingLimit { .. }));
    }

    #[test]
    fn rejects_lease_end_not_after_start() {
        let err = VehicleSpec::new(
            VehicleId(1),
            "WX1234",
            "Scania",
            120_000,
            0,
            150_000,
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            0,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, ModelError::LeaseEndsBeforeStart { .. }));
    }
}
