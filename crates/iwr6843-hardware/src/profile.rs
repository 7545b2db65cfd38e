//! Sensor CLI profile for the people-tracking firmware.
//!
//! The sensor is configured with a fixed chirp/CFAR/antenna profile. Only the
//! track allocation depends on runtime settings. The sensor-side boundary
//! boxes cover the whole field of view: boundaries and ceiling height are
//! applied on the host, so the sensor position is reported as floor level.

/// Boundary box pushed to the sensor: x, y in [-10, 10], z in [-5, 10] meters.
const SENSOR_BOUNDARY: [f32; 6] = [-10.0, 10.0, -10.0, 10.0, -5.0, 10.0];

const CHIRP_PROFILE: &[&str] = &[
    "dfeDataOutputMode 1",
    "channelCfg 15 7 0",
    "adcCfg 2 1",
    "adcbufCfg -1 0 1 1 1",
    "lowPower 0 0",
    "chirpCfg 0 0 0 0 0 0 0 1",
    "chirpCfg 1 1 0 0 0 0 0 2",
    "chirpCfg 2 2 0 0 0 0 0 4",
    "frameCfg 0 2 224 0 120.00 1 0",
    "dynamicRACfarCfg -1 10 1 1 1 8 8 6 4 4.00 6.00 0.50 1 1",
    "staticRACfarCfg -1 4 4 2 2 8 16 4 6 6.00 13.00 0.50 0 0",
    "dynamicRangeAngleCfg -1 7.000 0.0010 2 0",
    "dynamic2DAngleCfg -1 5 1 1 1.00 15.00 2",
    "staticRangeAngleCfg -1 0 1 1",
    "antGeometry0 -1 -1 0 0 -3 -3 -2 -2 -1 -1 0 0",
    "antGeometry1 -1 0 -1 0 -3 -2 -3 -2 -3 -2 -3 -2",
    "antPhaseRot 1 -1 1 -1 1 -1 1 -1 1 -1 1 -1",
    "fovCfg -1 64.0 64.0",
    "compRangeBiasAndRxChanPhase 0 1 0 1 0 1 0 1 0 1 0 1 0 1 0 1 0 1 0 1 0 1 0 1 0",
];

const TRACKER_PROFILE: &[&str] = &["gatingParam 3 2 2 3 4", "stateParam 3 3 6 20 3 1000"];

const MOTION_PROFILE: &[&str] = &["maxAcceleration 1 0.1 1", "trackingCfg 1 4 800 20 37 33 120 1"];

pub const SENSOR_STOP: &str = "sensorStop";
pub const SENSOR_START: &str = "sensorStart";
pub const FLUSH_CFG: &str = "flushCfg";

/// Prompt printed by the sensor CLI once it has booted.
pub const BOOT_PROMPT: &str = "mmwDemo:/>";

/// `allocationParam` line for the given track limit.
pub fn allocation_command(max_tracks: u8) -> String {
    let n = max_tracks;
    format!("allocationParam {n} {n} 0.05 {n} 1.5 {n}")
}

fn box_command(name: &str) -> String {
    let [x0, x1, y0, y1, z0, z1] = SENSOR_BOUNDARY;
    format!("{name} {x0:.1} {x1:.1} {y0:.1} {y1:.1} {z0:.1} {z1:.1}")
}

/// Full startup sequence, from `sensorStop` to `sensorStart`.
pub fn startup_commands(max_tracks: u8) -> Vec<String> {
    let mut lines = vec![SENSOR_STOP.to_string(), FLUSH_CFG.to_string()];
    lines.extend(CHIRP_PROFILE.iter().map(|s| s.to_string()));
    lines.push(box_command("boundaryBox"));
    lines.push(box_command("presenceBoundaryBox"));
    lines.push("sensorPosition 0.0 0 90".to_string());
    lines.extend(TRACKER_PROFILE.iter().map(|s| s.to_string()));
    lines.push(allocation_command(max_tracks));
    lines.extend(MOTION_PROFILE.iter().map(|s| s.to_string()));
    lines.push(SENSOR_START.to_string());
    lines
}

/// Sequence that changes the track limit on a running sensor.
pub fn max_tracks_update(max_tracks: u8) -> [String; 3] {
    [
        SENSOR_STOP.to_string(),
        allocation_command(max_tracks),
        SENSOR_START.to_string(),
    ]
}
