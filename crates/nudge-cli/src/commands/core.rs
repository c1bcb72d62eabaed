//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_db` - Shared utility to open the database
//! - `load_config` - Engine config from file and environment
//! - `open_engine` - Database + config + providers in one engine
//! - `cmd_init` - Initialize the database

use std::path::Path;

use anyhow::{Context, Result};
use nudge_core::{AutomationEngine, Database, EngineConfig};

/// Open database with encryption by default, or unencrypted if --no-encrypt
pub fn open_db(db_path: &Path, no_encrypt: bool) -> Result<Database> {
    let path_str = db_path
        .to_str()
        .context("Database path is not valid UTF-8")?;
    if no_encrypt {
        Database::new_unencrypted(path_str).context("Failed to open database (unencrypted)")
    } else {
        Database::new(path_str).context("Failed to open database")
    }
}

/// Load the engine config, failing only when an explicit path can't be read
pub fn load_config(config_path: Option<&Path>) -> Result<EngineConfig> {
    EngineConfig::load(config_path).context("Failed to load engine config")
}

pub fn open_engine(
    db_path: &Path,
    config_path: Option<&Path>,
    no_encrypt: bool,
) -> Result<AutomationEngine> {
    let db = open_db(db_path, no_encrypt)?;
    let config = load_config(config_path)?;
    Ok(AutomationEngine::new(db, config))
}

pub fn cmd_init(db_path: &Path, no_encrypt: bool) -> Result<()> {
    println!("🔧 Initializing database at {}...", db_path.display());

    let db = open_db(db_path, no_encrypt)?;
    let users = db.list_user_ids().context("Failed to read users")?;
    println!("   Schema ready ({} known users)", users.len());

    if no_encrypt {
        println!("   ⚠️  Encryption: DISABLED (--no-encrypt)");
    } else {
        println!("   🔒 Encryption: ENABLED");
    }

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Run automation now: nudge run --user <id>");
    println!("  2. Schedule it: nudge daemon --interval-hours 24");

    Ok(())
}
