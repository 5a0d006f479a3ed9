//! Alert Engine (spec.md §4.5): per-parameter threshold evaluation,
//! debouncing, and the idle auto-resolve timer.

pub mod config;
pub mod engine;
pub mod notifier;
pub mod thresholds;

pub use config::AlertConfig;
pub use engine::AlertEngine;
pub use notifier::AlertNotifier;
pub use thresholds::{Breach, evaluate_parameter};
