use serde::{Deserialize, Serialize};

/// World-space position record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// Speed readouts in the game's four display modes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Velocity {
    pub real_total: f32,
    pub fake_total: f32,
    pub real_horizontal: f32,
    pub fake_horizontal: f32,
}

/// One captured telemetry frame.
///
/// Every field is independently nullable: a failed read on one field shows
/// that field as unavailable, never an error, and never blocks the rest.
/// Two tiers exist — `timer_value` and `race_completion_pct` are read on
/// every poll; the rest are only attempted when a new physics tick was
/// detected and are explicitly absent otherwise ("no new data this tick",
/// not "no data at all").
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub timer_value: Option<i32>,
    pub race_completion_pct: Option<f32>,
    pub velocity: Option<Velocity>,
    pub car_angle: Option<f32>,
    pub car_position: Option<Vec3>,
    pub camera_angle: Option<f32>,
    pub camera_position: Option<Vec3>,
    pub checkpoint: Option<i32>,
    pub nitro_bar_pct: Option<f32>,
    pub nitro_state: Option<i32>,
    pub drift_state: Option<i32>,
    pub rollover_state: Option<i32>,
    pub gear: Option<i32>,
    pub engine_rpm: Option<f32>,
    pub acceleration: Option<f32>,
}

impl Snapshot {
    /// Frame holding only the always-read tier.
    pub fn light(timer_value: Option<i32>, race_completion_pct: Option<f32>) -> Self {
        Self {
            timer_value,
            race_completion_pct,
            ..Default::default()
        }
    }

    /// True when any full-tier field carries a value.
    pub fn has_full_tier(&self) -> bool {
        self.velocity.is_some()
            || self.car_angle.is_some()
            || self.car_position.is_some()
            || self.camera_angle.is_some()
            || self.camera_position.is_some()
            || self.checkpoint.is_some()
            || self.nitro_bar_pct.is_some()
            || self.nitro_state.is_some()
            || self.drift_state.is_some()
            || self.rollover_state.is_some()
            || self.gear.is_some()
            || self.engine_rpm.is_some()
            || self.acceleration.is_some()
    }

    /// Timer/progress pair for ghost comparison, when both are present.
    pub fn comparison_point(&self) -> Option<(i64, f64)> {
        match (self.timer_value, self.race_completion_pct) {
            (Some(timer), Some(pct)) => Some((timer as i64, pct as f64)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_light_frame_has_no_full_tier() {
        let frame = Snapshot::light(Some(1200), Some(34.5));
        assert_eq!(frame.timer_value, Some(1200));
        assert_eq!(frame.race_completion_pct, Some(34.5));
        assert!(!frame.has_full_tier());
    }

    #[test]
    fn test_comparison_point_requires_both_fields() {
        assert!(Snapshot::light(Some(100), None).comparison_point().is_none());
        assert!(Snapshot::light(None, Some(5.0)).comparison_point().is_none());
        assert_eq!(
            Snapshot::light(Some(100), Some(5.0)).comparison_point(),
            Some((100, 5.0))
        );
    }

    #[test]
    fn test_json_schema_keys() {
        let frame = Snapshot {
            timer_value: Some(80),
            gear: Some(3),
            ..Default::default()
        };
        let json = serde_json::to_value(&frame).unwrap();
        // Absent fields serialize as null, matching the ghost-file schema.
        assert_eq!(json["timer_value"], 80);
        assert_eq!(json["gear"], 3);
        assert!(json["engine_rpm"].is_null());
        assert!(json["rollover_state"].is_null());
        assert!(json.get("race_completion_pct").is_some());
    }

    #[test]
    fn test_json_roundtrip_with_nested_records() {
        let frame = Snapshot {
            timer_value: Some(512),
            race_completion_pct: Some(12.25),
            car_position: Some(Vec3 {
                x: 1.0,
                y: -2.0,
                z: 3.5,
            }),
            velocity: Some(Velocity {
                real_total: 180.0,
                fake_total: 240.0,
                real_horizontal: 178.5,
                fake_horizontal: 238.0,
            }),
            ..Default::default()
        };
        let json = serde_json::to_string(&frame).unwrap();
        let back: Snapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, frame);
    }
}
