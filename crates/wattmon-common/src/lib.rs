//! Shared domain types for the wattmon cluster telemetry collector.
//!
//! [`record`] defines the fixed per-node metric record that crosses the wire
//! each round, together with the sentinel constants that stand in for
//! unmeasured fields. [`snapshot`] defines the coordinator-side round
//! snapshot and its serialized document form.

pub mod record;
pub mod snapshot;
