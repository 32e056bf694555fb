//! JSON persistence for ledger documents.

use std::{fs, path::Path};

use crate::errors::{LedgerError, Result};
use crate::ledger::{Ledger, CURRENT_SCHEMA_VERSION};
use crate::utils::persistence::write_atomic;

/// Writes the ledger to disk atomically by staging to a temporary file.
pub fn save_ledger_to_file(ledger: &Ledger, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(ledger)?;
    write_atomic(path, &json)?;
    tracing::info!(path = %path.display(), ledger = %ledger.name, "ledger saved");
    Ok(())
}

/// Loads a ledger, rebuilding account back-references and checking that
/// every reference resolves.
pub fn load_ledger_from_file(path: &Path) -> Result<Ledger> {
    let data = fs::read_to_string(path)?;
    let mut ledger: Ledger = serde_json::from_str(&data)?;
    if ledger.schema_version > CURRENT_SCHEMA_VERSION {
        return Err(LedgerError::Inconsistent(format!(
            "schema version {} is newer than supported version {}",
            ledger.schema_version, CURRENT_SCHEMA_VERSION
        )));
    }
    ledger.schema_version = CURRENT_SCHEMA_VERSION;
    ledger.rebuild_all_entries();
    ledger.check_structure()?;
    tracing::info!(path = %path.display(), ledger = %ledger.name, "ledger loaded");
    Ok(ledger)
}
