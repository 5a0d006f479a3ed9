//! Severity band tables (spec.md §4.5). Bands are deliberately plain
//! functions rather than a config-driven table for now — §9 flags the
//! edges as one plausible reconciliation of the source's inconsistent
//! tables, so every edge has a dedicated test below.

use hydrosense_protocol::alert::{Parameter, Severity};

/// A threshold breach: the severity reached and the nearest edge the
/// value crossed to get there (used as the alert's `threshold` field).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Breach {
    pub severity: Severity,
    pub threshold: f64,
}

/// Evaluate a single parameter's value against its severity bands.
/// Returns `None` if the value is nominal (inside all bands).
pub fn evaluate_parameter(parameter: Parameter, value: f64) -> Option<Breach> {
    match parameter {
        Parameter::Ph => evaluate_ph(value),
        Parameter::Tds => evaluate_tds(value),
        Parameter::Turbidity => evaluate_turbidity(value),
    }
}

fn evaluate_ph(value: f64) -> Option<Breach> {
    if value < 5.5 {
        return Some(Breach { severity: Severity::Critical, threshold: 5.5 });
    }
    if value > 9.5 {
        return Some(Breach { severity: Severity::Critical, threshold: 9.5 });
    }
    if value < 6.0 {
        return Some(Breach { severity: Severity::Warning, threshold: 6.0 });
    }
    if value > 9.0 {
        return Some(Breach { severity: Severity::Warning, threshold: 9.0 });
    }
    if value < 6.5 {
        return Some(Breach { severity: Severity::Advisory, threshold: 6.5 });
    }
    if value > 8.5 {
        return Some(Breach { severity: Severity::Advisory, threshold: 8.5 });
    }
    None
}

fn evaluate_tds(value: f64) -> Option<Breach> {
    if value >= 1200.0 {
        Some(Breach { severity: Severity::Critical, threshold: 1200.0 })
    } else if value >= 900.0 {
        Some(Breach { severity: Severity::Warning, threshold: 900.0 })
    } else if value >= 500.0 {
        Some(Breach { severity: Severity::Advisory, threshold: 500.0 })
    } else {
        None
    }
}

fn evaluate_turbidity(value: f64) -> Option<Breach> {
    if value >= 10.0 {
        Some(Breach { severity: Severity::Critical, threshold: 10.0 })
    } else if value >= 5.0 {
        Some(Breach { severity: Severity::Warning, threshold: 5.0 })
    } else if value >= 1.0 {
        Some(Breach { severity: Severity::Advisory, threshold: 1.0 })
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ph_critical_low_boundary() {
        let b = evaluate_parameter(Parameter::Ph, 5.499).unwrap();
        assert_eq!(b.severity, Severity::Critical);
        assert_eq!(b.threshold, 5.5);
    }

    #[test]
    fn ph_exactly_5_5_is_warning_not_critical() {
        let b = evaluate_parameter(Parameter::Ph, 5.5).unwrap();
        assert_eq!(b.severity, Severity::Warning);
    }

    #[test]
    fn ph_6_0_is_advisory() {
        let b = evaluate_parameter(Parameter::Ph, 6.0).unwrap();
        assert_eq!(b.severity, Severity::Advisory);
        assert_eq!(b.threshold, 6.5);
    }

    #[test]
    fn ph_nominal_band_is_none() {
        assert!(evaluate_parameter(Parameter::Ph, 6.5).is_none());
        assert!(evaluate_parameter(Parameter::Ph, 7.0).is_none());
        assert!(evaluate_parameter(Parameter::Ph, 8.5).is_none());
    }

    #[test]
    fn ph_high_side_mirrors_low_side() {
        assert_eq!(
            evaluate_parameter(Parameter::Ph, 9.6).unwrap(),
            Breach { severity: Severity::Critical, threshold: 9.5 }
        );
        assert_eq!(
            evaluate_parameter(Parameter::Ph, 9.2).unwrap(),
            Breach { severity: Severity::Warning, threshold: 9.0 }
        );
        assert_eq!(
            evaluate_parameter(Parameter::Ph, 8.6).unwrap(),
            Breach { severity: Severity::Advisory, threshold: 8.5 }
        );
    }

    #[test]
    fn tds_bands() {
        assert!(evaluate_parameter(Parameter::Tds, 499.0).is_none());
        assert_eq!(
            evaluate_parameter(Parameter::Tds, 500.0).unwrap().severity,
            Severity::Advisory
        );
        assert_eq!(
            evaluate_parameter(Parameter::Tds, 900.0).unwrap().severity,
            Severity::Warning
        );
        assert_eq!(
            evaluate_parameter(Parameter::Tds, 1200.0).unwrap().severity,
            Severity::Critical
        );
    }

    #[test]
    fn turbidity_bands() {
        assert!(evaluate_parameter(Parameter::Turbidity, 0.99).is_none());
        assert_eq!(
            evaluate_parameter(Parameter::Turbidity, 1.0).unwrap().severity,
            Severity::Advisory
        );
        assert_eq!(
            evaluate_parameter(Parameter::Turbidity, 5.0).unwrap().severity,
            Severity::Warning
        );
        assert_eq!(
            evaluate_parameter(Parameter::Turbidity, 10.0).unwrap().severity,
            Severity::Critical
        );
    }
}
