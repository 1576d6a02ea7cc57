// All pipeline functionality is in dmc-monitor-core
// This CLI acts as a thin wrapper around the core library

// CLI-specific modules
pub mod summary;

// Re-export core types for convenience
pub use dmc_monitor_core::*;
