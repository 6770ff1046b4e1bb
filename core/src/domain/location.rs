use serde::{Deserialize, Serialize};

/// `{id, name, message, lat, lon, radiusMeters, lastTriggered, enabled}`.
/// Fired by the Engine on each inbound location update when the update falls
/// within `radiusMeters` and `cooldownMinutes` (shared with
/// [`super::EventSubscription`] semantics) has passed since `lastTriggered`.
/// The scheduler only stores and filters these — proximity detection runs in
/// the Engine (spec.md §4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationReminder {
    pub id: String,
    pub owner_scope: String,
    pub name: String,
    pub message: String,
    pub lat: f64,
    pub lon: f64,
    pub radius_meters: f64,
    pub cooldown_minutes: i64,
    #[serde(default)]
    pub last_triggered: Option<chrono::DateTime<chrono::Utc>>,
    pub enabled: bool,
}

/// Haversine distance in meters between two lat/lon points.
fn haversine_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    const EARTH_RADIUS_M: f64 = 6_371_000.0;
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();
    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();
    EARTH_RADIUS_M * c
}

impl LocationReminder {
    /// Whether an inbound location update at `(lat, lon)` should fire this
    /// reminder at `now`: enabled, within radius, and cooldown elapsed.
    pub fn should_fire(&self, lat: f64, lon: f64, now: chrono::DateTime<chrono::Utc>) -> bool {
        if !self.enabled {
            return false;
        }
        if haversine_meters(self.lat, self.lon, lat, lon) > self.radius_meters {
            return false;
        }
        match self.last_triggered {
            None => true,
            Some(last) => now - last >= chrono::Duration::minutes(self.cooldown_minutes),
        }
    }
}
