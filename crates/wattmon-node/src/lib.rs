//! The wattmon node: one process per cluster node, all running this same
//! binary. Rank 0 coordinates the per-tick gather and owns the run's
//! document log; every other rank samples and sends. See `config` for the
//! TOML layout, `scheduler` for the round loop and `sink` for how a run
//! lands on disk.

pub mod config;
pub mod context;
pub mod scheduler;
pub mod sink;
