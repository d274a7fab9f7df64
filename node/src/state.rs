//! # State Persistence
//!
//! Loads and saves the runtime as a JSON snapshot. Saving writes a sibling
//! temporary file and renames it over the target, so a crash mid-write never
//! leaves a truncated snapshot behind.

use anyhow::{ensure, Context, Result};
use std::path::{Path, PathBuf};

use quorum_contracts::config::STATE_VERSION;
use quorum_contracts::Runtime;

/// Loads the runtime from `path`, or starts empty if the file does not exist.
pub fn load(path: &Path) -> Result<Runtime> {
    if !path.exists() {
        tracing::info!(path = %path.display(), "no state file, starting empty");
        return Ok(Runtime::new());
    }

    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read state file {}", path.display()))?;
    let runtime: Runtime = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse state file {}", path.display()))?;
    ensure!(
        runtime.version() == STATE_VERSION,
        "state file {} has version {}, expected {}",
        path.display(),
        runtime.version(),
        STATE_VERSION
    );

    tracing::info!(
        path = %path.display(),
        contracts = runtime.contract_addresses().len(),
        events = runtime.logs().len(),
        "state loaded"
    );
    Ok(runtime)
}

/// Writes `runtime` to `path`.
pub fn save(path: &Path, runtime: &Runtime) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create state directory {}", dir.display()))?;
    }

    let json = serde_json::to_vec_pretty(runtime).context("failed to serialize state")?;
    let tmp = temp_path(path);
    std::fs::write(&tmp, json)
        .with_context(|| format!("failed to write {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("failed to move state into {}", path.display()))?;

    tracing::info!(path = %path.display(), "state saved");
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quorum_contracts::Address;

    #[test]
    fn missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = load(&dir.path().join("state.json")).unwrap();
        assert!(runtime.logs().is_empty());
        assert!(runtime.contract_addresses().is_empty());
    }

    #[test]
    fn save_then_load_restores_wallets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");

        let mut runtime = Runtime::new();
        let alice = Address::from_label("alice");
        let registry = runtime.deploy_registry(alice).unwrap();
        let wallet = runtime.create_wallet(alice, registry, vec![alice], 1).unwrap();
        save(&path, &runtime).unwrap();

        let loaded = load(&path).unwrap();
        assert_eq!(loaded.owners(&wallet).unwrap(), vec![alice]);
        assert_eq!(loaded.logs(), runtime.logs());
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, b"{ not json").unwrap();
        assert!(load(&path).is_err());
    }

    #[test]
    fn duplicate_owners_in_state_file_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let mut runtime = Runtime::new();
        let alice = Address::from_label("alice");
        let registry = runtime.deploy_registry(alice).unwrap();
        let wallet = runtime.create_wallet(alice, registry, vec![alice], 1).unwrap();

        let mut value = serde_json::to_value(&runtime).unwrap();
        value["contracts"][wallet.to_string()]["Wallet"]["owners"] =
            serde_json::json!([alice, alice]);
        std::fs::write(&path, serde_json::to_vec(&value).unwrap()).unwrap();

        let err = load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("owner already exists"), "{err:#}");
    }
}
