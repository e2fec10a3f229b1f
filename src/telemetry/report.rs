//! Human-readable record dump for diagnostics
//!
//! Out-of-range values are reported, never rejected: a record with a wild
//! altitude is still relayed.

use tracing::{debug, warn};

use crate::message::record::TelemetryRecord;

/// Check every field group against its physical range
///
/// Returns one message per implausible value, empty when all look sane.
pub fn plausibility_warnings(record: &TelemetryRecord) -> Vec<String> {
    let mut warnings = Vec::new();
    let mut check = |name: &str, value: f32, min: f32, max: f32| {
        if !(min..=max).contains(&value) {
            warnings.push(format!("{} out of range: {} (expected {}..{})", name, value, min, max));
        }
    };

    check("latitude", record.latitude, -90.0, 90.0);
    check("longitude", record.longitude, -180.0, 180.0);
    check("altitude", record.altitude, -1000.0, 10000.0);
    check("roll", record.roll, -180.0, 180.0);
    check("pitch", record.pitch, -90.0, 90.0);
    check("yaw", record.yaw, -360.0, 360.0);
    check("vx", record.vx, -100.0, 100.0);
    check("vy", record.vy, -100.0, 100.0);
    check("vz", record.vz, -50.0, 50.0);

    if record.battery_percent > 100 {
        warnings.push(format!(
            "battery_percent out of range: {} (expected 0..100)",
            record.battery_percent
        ));
    }

    warnings
}

/// Log a record field by field at debug level, plus a warning per
/// implausible value
pub fn log_record(record: &TelemetryRecord) {
    debug!(
        "{} id={} t={} ms v{}",
        record.msg_type, record.msg_id, record.timestamp_ms, record.format_version
    );
    debug!(
        "  position lat={:.6} lon={:.6} alt={:.2} m rel={:.2} m",
        record.latitude, record.longitude, record.altitude, record.relative_altitude
    );
    debug!(
        "  attitude roll={:.2} pitch={:.2} yaw={:.2}",
        record.roll, record.pitch, record.yaw
    );
    debug!(
        "  velocity vx={:.2} vy={:.2} vz={:.2} m/s",
        record.vx, record.vy, record.vz
    );
    debug!(
        "  battery {}% {:.2} V {:.2} A, flight time {} s",
        record.battery_percent, record.battery_voltage, record.battery_current, record.flight_time_s
    );
    debug!(
        "  status 0x{:04X} [{}] cpu={}% signal={}% sats={} fix={:?}",
        record.status_flags.bits(),
        record.status_flags.names().join(" "),
        record.cpu_load_percent,
        record.signal_strength_percent,
        record.satellite_count,
        record.gps_fix_type
    );

    for warning in plausibility_warnings(record) {
        warn!("Implausible telemetry: {}", warning);
    }
}
