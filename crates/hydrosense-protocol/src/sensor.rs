use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Earliest timestamp accepted from a device (spec.md §4.2 "Timestamp sanity").
pub fn earliest_valid_timestamp() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()
}

pub const PH_RANGE: (f64, f64) = (0.0, 14.0);
pub const TDS_RANGE: (f64, f64) = (0.0, 2000.0);
pub const TURBIDITY_RANGE: (f64, f64) = (0.0, 1000.0);

/// Inbound `devices/<id>/data` payload, before validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorFrame {
    #[serde(rename = "pH", default)]
    pub ph: Option<f64>,
    #[serde(default)]
    pub tds: Option<f64>,
    #[serde(default)]
    pub turbidity: Option<f64>,
    #[serde(rename = "pH_valid", default = "default_true")]
    pub ph_valid: bool,
    #[serde(default = "default_true")]
    pub tds_valid: bool,
    #[serde(default = "default_true")]
    pub turbidity_valid: bool,
    /// Device-reported epoch seconds; absent means "use server-now".
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub device_name: Option<String>,
}

fn default_true() -> bool {
    true
}

/// Reason a sensor frame was rejected before any side effect.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameValidationError {
    #[error("non-finite value for {0}")]
    NotFinite(&'static str),
    #[error("timestamp {0} outside the accepted window")]
    TimestampOutOfWindow(i64),
    #[error("{0} value {1} outside its declared range")]
    OutOfRange(&'static str, f64),
}

/// A sensor frame that has passed validation, ready to persist.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedFrame {
    pub ph: Option<f64>,
    pub tds: Option<f64>,
    pub turbidity: Option<f64>,
    pub ph_valid: bool,
    pub tds_valid: bool,
    pub turbidity_valid: bool,
    pub timestamp: DateTime<Utc>,
}

/// Validate a sensor frame per spec.md §4.2: type check, timestamp
/// sanity, range, then apply validity flags (a false flag nulls the
/// field and suppresses that parameter's alert evaluation).
pub fn validate_frame(
    frame: &SensorFrame,
    now: DateTime<Utc>,
) -> Result<ValidatedFrame, FrameValidationError> {
    let timestamp = match frame.timestamp {
        Some(secs) => {
            let ts = Utc
                .timestamp_opt(secs, 0)
                .single()
                .ok_or(FrameValidationError::TimestampOutOfWindow(secs))?;
            let earliest = earliest_valid_timestamp();
            let latest = now + chrono::Duration::hours(1);
            if ts < earliest || ts > latest {
                return Err(FrameValidationError::TimestampOutOfWindow(secs));
            }
            ts
        }
        None => now,
    };

    let ph = check_range("pH", frame.ph, PH_RANGE)?;
    let tds = check_range("tds", frame.tds, TDS_RANGE)?;
    let turbidity = check_range("turbidity", frame.turbidity, TURBIDITY_RANGE)?;

    Ok(ValidatedFrame {
        ph: if frame.ph_valid { ph } else { None },
        tds: if frame.tds_valid { tds } else { None },
        turbidity: if frame.turbidity_valid { turbidity } else { None },
        ph_valid: frame.ph_valid,
        tds_valid: frame.tds_valid,
        turbidity_valid: frame.turbidity_valid,
        timestamp,
    })
}

fn check_range(
    name: &'static str,
    value: Option<f64>,
    range: (f64, f64),
) -> Result<Option<f64>, FrameValidationError> {
    match value {
        None => Ok(None),
        Some(v) => {
            if !v.is_finite() {
                return Err(FrameValidationError::NotFinite(name));
            }
            if v < range.0 || v > range.1 {
                return Err(FrameValidationError::OutOfRange(name, v));
            }
            Ok(Some(v))
        }
    }
}

/// Append-only stored sensor reading (spec.md §3 "SensorReading").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorReading {
    pub device_id: String,
    pub timestamp: DateTime<Utc>,
    pub ph: Option<f64>,
    pub tds: Option<f64>,
    pub turbidity: Option<f64>,
    pub ph_valid: bool,
    pub tds_valid: bool,
    pub turbidity_valid: bool,
}

impl SensorReading {
    pub fn from_validated(device_id: impl Into<String>, frame: ValidatedFrame) -> Self {
        Self {
            device_id: device_id.into(),
            timestamp: frame.timestamp,
            ph: frame.ph,
            tds: frame.tds,
            turbidity: frame.turbidity,
            ph_valid: frame.ph_valid,
            tds_valid: frame.tds_valid,
            turbidity_valid: frame.turbidity_valid,
        }
    }

    /// True if any declared sensor was flagged invalid in this frame —
    /// suppresses hand-off to the Alert Engine (spec.md §4.4).
    pub fn has_invalid_sensor(&self) -> bool {
        !self.ph_valid || !self.tds_valid || !self.turbidity_valid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(ph: Option<f64>, tds: Option<f64>, turbidity: Option<f64>) -> SensorFrame {
        SensorFrame {
            ph,
            tds,
            turbidity,
            ph_valid: true,
            tds_valid: true,
            turbidity_valid: true,
            timestamp: None,
            device_name: None,
        }
    }

    #[test]
    fn accepts_in_range_values() {
        let now = Utc::now();
        let f = frame(Some(7.0), Some(400.0), Some(2.0));
        let validated = validate_frame(&f, now).unwrap();
        assert_eq!(validated.ph, Some(7.0));
    }

    #[test]
    fn rejects_out_of_range_ph() {
        let now = Utc::now();
        let f = frame(Some(15.0), None, None);
        assert_eq!(
            validate_frame(&f, now).unwrap_err(),
            FrameValidationError::OutOfRange("pH", 15.0)
        );
    }

    #[test]
    fn rejects_non_finite_value() {
        let now = Utc::now();
        let f = frame(Some(f64::NAN), None, None);
        assert_eq!(
            validate_frame(&f, now).unwrap_err(),
            FrameValidationError::NotFinite("pH")
        );
    }

    #[test]
    fn rejects_timestamp_before_2020() {
        let now = Utc::now();
        let mut f = frame(Some(7.0), None, None);
        f.timestamp = Some(0); // 1970
        assert!(matches!(
            validate_frame(&f, now),
            Err(FrameValidationError::TimestampOutOfWindow(_))
        ));
    }

    #[test]
    fn rejects_timestamp_too_far_in_future() {
        let now = Utc::now();
        let mut f = frame(Some(7.0), None, None);
        f.timestamp = Some((now + chrono::Duration::hours(2)).timestamp());
        assert!(matches!(
            validate_frame(&f, now),
            Err(FrameValidationError::TimestampOutOfWindow(_))
        ));
    }

    #[test]
    fn invalid_flag_nulls_the_field() {
        let now = Utc::now();
        let mut f = frame(Some(7.0), Some(400.0), Some(2.0));
        f.ph_valid = false;
        let validated = validate_frame(&f, now).unwrap();
        assert_eq!(validated.ph, None);
        assert!(!validated.ph_valid);
    }

    #[test]
    fn has_invalid_sensor_detects_any_false_flag() {
        let reading = SensorReading {
            device_id: "tank-01".into(),
            timestamp: Utc::now(),
            ph: None,
            tds: Some(100.0),
            turbidity: Some(1.0),
            ph_valid: false,
            tds_valid: true,
            turbidity_valid: true,
        };
        assert!(reading.has_invalid_sensor());
    }
}
