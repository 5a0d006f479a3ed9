use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

use hydrosense_protocol::alert::{AlertStatus, Parameter, Severity};
use hydrosense_protocol::device::Device;
use hydrosense_protocol::sensor::SensorReading;
use hydrosense_protocol::ws_event::WsEvent;
use hydrosense_store::{NewAlert, Store, StoreResult};

use crate::config::AlertConfig;
use crate::notifier::AlertNotifier;
use crate::thresholds::evaluate_parameter;

/// Evaluates one sensor frame's parameters against their severity bands
/// and drives alert lifecycle transitions (spec.md §4.5).
pub struct AlertEngine {
    store: Arc<dyn Store>,
    events: broadcast::Sender<WsEvent>,
    notifier: Arc<dyn AlertNotifier>,
    config: AlertConfig,
}

impl AlertEngine {
    pub fn new(
        store: Arc<dyn Store>,
        events: broadcast::Sender<WsEvent>,
        notifier: Arc<dyn AlertNotifier>,
        config: AlertConfig,
    ) -> Self {
        Self {
            store,
            events,
            notifier,
            config,
        }
    }

    /// Evaluate every present parameter in `reading` for `device`.
    /// No-op for unregistered devices (spec.md §3 invariant).
    pub async fn evaluate_frame(
        &self,
        device: &Device,
        reading: &SensorReading,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        if !device.is_registered {
            return Ok(());
        }

        for (parameter, value) in [
            (Parameter::Ph, reading.ph),
            (Parameter::Tds, reading.tds),
            (Parameter::Turbidity, reading.turbidity),
        ] {
            let Some(value) = value else { continue };
            self.evaluate_one(device, parameter, value, now).await?;
        }
        Ok(())
    }

    async fn evaluate_one(
        &self,
        device: &Device,
        parameter: Parameter,
        value: f64,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        let breach = evaluate_parameter(parameter, value);
        let existing = self.store.find_open_alert(&device.device_id, parameter).await?;

        match (breach, existing) {
            (Some(breach), None) => {
                let message = build_message(parameter, breach.severity, value, breach.threshold, &device.name);
                let alert = self
                    .store
                    .create_alert(
                        NewAlert {
                            device_id: device.device_id.clone(),
                            device_name: device.name.clone(),
                            parameter,
                            severity: breach.severity,
                            current_value: value,
                            threshold: breach.threshold,
                            message,
                        },
                        now,
                    )
                    .await?;
                let _ = self.events.send(WsEvent::AlertNew {
                    alert: alert.clone(),
                    timestamp: now,
                });
                self.notifier.notify_new_alert(&alert, device).await;
            }
            (Some(breach), Some(existing)) => {
                if breach.severity >= existing.severity {
                    let severity = breach.severity.max(existing.severity);
                    self.store
                        .increment_alert_occurrence(existing.alert_id, value, severity)
                        .await?;
                } else if existing.nominal_since.is_some() {
                    // A re-entry at a lower-but-still-breaching severity still
                    // counts as "within its active window" — no new alert, no
                    // email, occurrence count untouched per spec.md §4.5 step 3
                    // (only equal-or-higher severities increment). But it is
                    // still a breach, so any idle timer started by an earlier
                    // nominal reading must not survive it (spec.md §4.5 step 4
                    // "nominal for >= T_auto_resolve").
                    self.store
                        .set_alert_nominal_since(existing.alert_id, None)
                        .await?;
                }
            }
            (None, Some(existing)) => {
                match existing.nominal_since {
                    None => {
                        self.store
                            .set_alert_nominal_since(existing.alert_id, Some(now))
                            .await?;
                    }
                    Some(nominal_since) => {
                        if now - nominal_since >= self.config.auto_resolve_idle() {
                            let resolved = self
                                .store
                                .transition_alert(
                                    existing.alert_id,
                                    AlertStatus::Resolved,
                                    None,
                                    now,
                                )
                                .await?;
                            let _ = self.events.send(WsEvent::AlertResolved {
                                alert: resolved,
                                timestamp: now,
                            });
                        }
                    }
                }
            }
            (None, None) => {}
        }
        Ok(())
    }
}

fn build_message(parameter: Parameter, severity: Severity, value: f64, threshold: f64, device_name: &str) -> String {
    format!(
        "{device_name}: {parameter:?} reading {value:.2} crossed the {severity:?} threshold of {threshold:.2}"
    )
}
