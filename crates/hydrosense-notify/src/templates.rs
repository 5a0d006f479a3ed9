//! Alert email body rendering (spec.md §4.6 "Body templates are
//! parameterized by severity, parameter, device, location, and
//! per-parameter guidance tables").

use hydrosense_protocol::alert::{Alert, Parameter, Severity};
use hydrosense_protocol::device::{Device, Location};

struct Guidance {
    standard: &'static str,
    health_impact: &'static str,
    recommended_action: &'static str,
}

fn guidance(parameter: Parameter) -> Guidance {
    match parameter {
        Parameter::Ph => Guidance {
            standard: "WHO drinking-water guideline: pH 6.5-8.5",
            health_impact: "Extreme pH can irritate skin/eyes and accelerate pipe corrosion.",
            recommended_action: "Check dosing pumps and recalibrate the pH probe.",
        },
        Parameter::Tds => Guidance {
            standard: "WHO drinking-water guideline: TDS < 500 ppm (acceptable to 1000 ppm)",
            health_impact: "Elevated TDS indicates dissolved solids that may affect taste and indicate contamination.",
            recommended_action: "Inspect filtration and reverse-osmosis membranes.",
        },
        Parameter::Turbidity => Guidance {
            standard: "WHO drinking-water guideline: turbidity < 1 NTU (ideally < 5 NTU)",
            health_impact: "High turbidity can shield pathogens from disinfection.",
            recommended_action: "Inspect pre-filters and check for upstream sediment disturbance.",
        },
    }
}

fn severity_label(severity: Severity) -> &'static str {
    match severity {
        Severity::Advisory => "Advisory",
        Severity::Warning => "Warning",
        Severity::Critical => "Critical",
    }
}

fn location_line(location: &Option<Location>) -> String {
    match location {
        Some(loc) => {
            let building = loc.building.as_deref().unwrap_or("unknown building");
            let floor = loc.floor.as_deref().unwrap_or("unknown floor");
            format!("{building}, {floor}")
        }
        None => "location not set".to_string(),
    }
}

/// Render subject + HTML body for a newly-created alert.
pub fn render_new_alert(alert: &Alert, device: &Device) -> (String, String) {
    let guide = guidance(alert.parameter);
    let severity = severity_label(alert.severity);
    let subject = format!("[HydroSense] {severity} alert: {} on {}", parameter_label(alert.parameter), device.name);

    let body = format!(
        "<h2>{severity} alert for {device_name}</h2>\
         <p>{message}</p>\
         <table>\
           <tr><td>Parameter</td><td>{parameter}</td></tr>\
           <tr><td>Current value</td><td>{value:.2}</td></tr>\
           <tr><td>Threshold</td><td>{threshold:.2}</td></tr>\
           <tr><td>Location</td><td>{location}</td></tr>\
         </table>\
         <h3>Guidance</h3>\
         <p><strong>Standard:</strong> {standard}</p>\
         <p><strong>Health impact:</strong> {health_impact}</p>\
         <p><strong>Recommended action:</strong> {recommended_action}</p>",
        device_name = device.name,
        message = alert.message,
        parameter = parameter_label(alert.parameter),
        value = alert.current_value,
        threshold = alert.threshold,
        location = location_line(&device.location),
        standard = guide.standard,
        health_impact = guide.health_impact,
        recommended_action = guide.recommended_action,
    );

    (subject, body)
}

fn parameter_label(parameter: Parameter) -> &'static str {
    match parameter {
        Parameter::Ph => "pH",
        Parameter::Tds => "TDS",
        Parameter::Turbidity => "Turbidity",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use hydrosense_protocol::alert::AlertStatus;
    use hydrosense_protocol::device::DeviceStatus;
    use uuid::Uuid;

    fn alert() -> Alert {
        Alert {
            alert_id: Uuid::nil(),
            device_id: "tank-01".into(),
            device_name: "Tank 1".into(),
            parameter: Parameter::Ph,
            severity: Severity::Critical,
            status: AlertStatus::Active,
            current_value: 5.2,
            threshold: 5.5,
            message: "Tank 1: pH reading 5.20 crossed the Critical threshold of 5.50".into(),
            occurrence_count: 1,
            created_at: Utc::now(),
            acknowledged_at: None,
            resolved_at: None,
            resolution_notes: None,
            nominal_since: None,
        }
    }

    fn device() -> Device {
        let now = Utc::now();
        Device {
            device_id: "tank-01".into(),
            name: "Tank 1".into(),
            device_type: "generic".into(),
            firmware_version: None,
            mac_address: None,
            ip_address: None,
            sensors: hydrosense_protocol::device::default_sensors(),
            status: DeviceStatus::Online,
            is_registered: true,
            location: Some(Location {
                building: Some("Building A".into()),
                floor: Some("2nd floor".into()),
                notes: None,
            }),
            last_seen: now,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn subject_includes_severity_and_parameter() {
        let (subject, _) = render_new_alert(&alert(), &device());
        assert!(subject.contains("Critical"));
        assert!(subject.contains("pH"));
    }

    #[test]
    fn body_includes_location_and_guidance() {
        let (_, body) = render_new_alert(&alert(), &device());
        assert!(body.contains("Building A"));
        assert!(body.contains("Recommended action"));
    }
}
