//! Declarative catalog of invitable CLI agents.
//!
//! The catalog is operator-configured JSON loaded once at startup. Entries
//! describe how to spawn a named CLI agent onto a thread; they are never
//! mutable at runtime and invocation commands are never accepted from API
//! clients.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::defaults;
use crate::error::{Error, Result};

/// One invitable agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    /// Shell command template. Supported placeholders: `{thread_id}`,
    /// `{session_id}`, `{bus_address}`.
    pub invoke_command: String,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_timeout() -> u64 {
    defaults::INVITE_TIMEOUT_SECS
}

fn default_enabled() -> bool {
    true
}

/// On-disk catalog shape: either `{name: entry, …}` or `{"agents": [entry, …]}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum CatalogFile {
    List { agents: Vec<CatalogEntry> },
    Map(HashMap<String, CatalogEntry>),
}

/// Load the agent catalog from a JSON file.
///
/// A missing file is an empty catalog, not an error — invitations simply
/// fail with `InvalidInput` until the operator configures one.
pub fn load_catalog(path: &Path) -> Result<HashMap<String, CatalogEntry>> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no agent catalog file, starting empty");
        return Ok(HashMap::new());
    }
    let raw = std::fs::read_to_string(path)?;
    let parsed: CatalogFile = serde_json::from_str(&raw)
        .map_err(|e| Error::Config(format!("Invalid agent catalog {}: {}", path.display(), e)))?;

    let entries = match parsed {
        CatalogFile::List { agents } => agents
            .into_iter()
            .map(|entry| (entry.name.clone(), entry))
            .collect::<HashMap<_, _>>(),
        CatalogFile::Map(map) => map
            .into_iter()
            .map(|(key, mut entry)| {
                if entry.name.is_empty() {
                    entry.name = key.clone();
                }
                (key, entry)
            })
            .collect(),
    };

    let mut catalog = HashMap::new();
    for (key, mut entry) in entries {
        if entry.name.is_empty() {
            return Err(Error::Config(format!(
                "Catalog entry '{}' is missing a name",
                key
            )));
        }
        if entry.invoke_command.trim().is_empty() {
            return Err(Error::Config(format!(
                "Catalog entry '{}' has an empty invoke_command",
                entry.name
            )));
        }
        if entry.display_name.is_empty() {
            entry.display_name = entry.name.clone();
        }
        catalog.insert(entry.name.clone(), entry);
    }
    tracing::info!(agents = catalog.len(), "agent catalog loaded");
    Ok(catalog)
}
