//! Persistence layer.
//!
//! Bankroll state is saved as a single JSON record per bankroll identity.
//! Writes go to a temporary sibling file which is then renamed over the
//! target, so a crash mid-write leaves the previous record intact.
//!
//! Threshold publication lives in [`thresholds`].

pub mod thresholds;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

use crate::strategy::bankroll::BankrollState;

/// Default bankroll state file path.
pub const DEFAULT_BANKROLL_FILE: &str = "data/bankroll.json";

// ---------------------------------------------------------------------------
// Store abstraction
// ---------------------------------------------------------------------------

/// Keyed storage for one bankroll identity.
///
/// A store must have a single writer. `BankrollManager` takes ownership of
/// its store, which gives exclusive access within a process; separate
/// processes must not share one backing file.
#[cfg_attr(test, mockall::automock)]
pub trait BankrollStore: Send {
    /// Load the persisted state. `Ok(None)` means no record exists yet.
    fn load(&self) -> Result<Option<BankrollState>>;

    /// Replace the persisted state with `state`.
    fn save(&self, state: &BankrollState) -> Result<()>;
}

// ---------------------------------------------------------------------------
// JSON file store
// ---------------------------------------------------------------------------

/// Bankroll state stored as pretty-printed JSON on disk.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the state file (for testing or operator reset).
    pub fn delete(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)
                .with_context(|| format!("Failed to delete state file {}", self.path.display()))?;
        }
        Ok(())
    }
}

impl Default for JsonFileStore {
    fn default() -> Self {
        Self::new(DEFAULT_BANKROLL_FILE)
    }
}

impl BankrollStore for JsonFileStore {
    fn load(&self) -> Result<Option<BankrollState>> {
        if !self.path.exists() {
            info!(path = %self.path.display(), "No saved bankroll found");
            return Ok(None);
        }

        let json = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read bankroll from {}", self.path.display()))?;
        let state: BankrollState = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse bankroll from {}", self.path.display()))?;

        info!(
            path = %self.path.display(),
            balance = state.balance,
            total_bets = state.total_bets,
            "Bankroll loaded from disk"
        );
        Ok(Some(state))
    }

    fn save(&self, state: &BankrollState) -> Result<()> {
        let json = serde_json::to_string_pretty(state).context("Failed to serialise bankroll")?;
        write_atomic(&self.path, json.as_bytes())?;
        debug!(path = %self.path.display(), balance = state.balance, "Bankroll saved");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// Process-local store, used by simulations and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slot: Mutex<Option<BankrollState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: BankrollState) -> Self {
        Self {
            slot: Mutex::new(Some(state)),
        }
    }
}

impl BankrollStore for MemoryStore {
    fn load(&self) -> Result<Option<BankrollState>> {
        let guard = self
            .slot
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))?;
        Ok(guard.clone())
    }

    fn save(&self, state: &BankrollState) -> Result<()> {
        let mut guard = self
            .slot
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))?;
        *guard = Some(state.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Write `bytes` to `path` via a temporary file and rename.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "state".to_string());
    let tmp = path.with_file_name(format!(".{file_name}.{}.tmp", uuid::Uuid::new_v4()));

    std::fs::write(&tmp, bytes).with_context(|| format!("Failed to write {}", tmp.display()))?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e).with_context(|| format!("Failed to replace {}", path.display()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
