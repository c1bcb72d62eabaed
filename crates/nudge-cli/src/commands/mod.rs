//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Init and shared utilities (open_db, load_config, open_engine)
//! - `run` - Automation runs (run, run-all, backfill)
//! - `settings` - Automation settings (show, set)
//! - `insights` - Stored insight listing
//! - `score` - Relationship score snapshot
//! - `alerts` - Alert listing and read marking
//! - `report` - Monthly report printing

pub mod alerts;
pub mod core;
pub mod insights;
pub mod report;
pub mod run;
pub mod score;
pub mod settings;

// Re-export command functions for main.rs
pub use alerts::*;
pub use core::*;
pub use insights::*;
pub use report::*;
pub use run::*;
pub use score::*;
pub use settings::*;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
