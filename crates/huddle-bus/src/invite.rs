//! Invitation executor: wake external CLI agents by subprocess spawn.
//!
//! Commands come exclusively from the operator-configured catalog; the only
//! runtime inputs are the whitelisted placeholders, and those are quoted for
//! the shell. The spawned process is detached — it is expected to register
//! itself on the bus and owns its own lifecycle; the bus keeps a per-
//! invocation log and a hard kill deadline, nothing more.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use uuid::Uuid;

use huddle_core::{CatalogEntry, Error, Result};

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{[A-Za-z_][A-Za-z0-9_]*\}").expect("static pattern"));

/// Result of an invitation attempt. Spawn failures are reported here, not
/// as transport errors.
#[derive(Debug, Clone, Serialize)]
pub struct InviteOutcome {
    pub ok: bool,
    pub agent_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_executed: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

pub struct InviteExecutor {
    catalog: HashMap<String, CatalogEntry>,
    bus_address: String,
    log_dir: PathBuf,
}

/// Quote a value for `sh -c`. Single quotes pass everything verbatim; an
/// embedded quote becomes `'\''`.
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

impl InviteExecutor {
    pub fn new(
        catalog: HashMap<String, CatalogEntry>,
        bus_address: String,
        log_dir: PathBuf,
    ) -> Self {
        Self {
            catalog,
            bus_address,
            log_dir,
        }
    }

    /// Names of enabled catalog entries.
    pub fn available(&self) -> Vec<&CatalogEntry> {
        let mut entries: Vec<_> = self.catalog.values().filter(|e| e.enabled).collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries
    }

    /// Interpolate the whitelisted placeholders into an invoke command.
    /// Any other residual `{placeholder}` is rejected.
    fn render_command(
        &self,
        entry: &CatalogEntry,
        thread_id: Uuid,
        session_id: Uuid,
    ) -> Result<String> {
        let cmd = entry
            .invoke_command
            .replace("{thread_id}", &shell_quote(&thread_id.to_string()))
            .replace("{session_id}", &shell_quote(&session_id.to_string()))
            .replace("{bus_address}", &shell_quote(&self.bus_address));
        if let Some(m) = PLACEHOLDER.find(&cmd) {
            return Err(Error::InvalidInput(format!(
                "Unsupported placeholder {} in invoke_command for '{}'",
                m.as_str(),
                entry.name
            )));
        }
        Ok(cmd)
    }

    /// Spawn the named catalog agent onto a thread.
    ///
    /// Returns synchronously once the subprocess has started; it is not
    /// awaited. `timeout_seconds` is enforced by a detached kill task.
    pub fn invite(&self, agent_name: &str, thread_id: Uuid) -> Result<InviteOutcome> {
        let entry = self
            .catalog
            .get(agent_name)
            .ok_or_else(|| Error::InvalidInput(format!("Unknown agent '{}'", agent_name)))?;
        if !entry.enabled {
            return Err(Error::InvalidInput(format!(
                "Agent '{}' is disabled",
                agent_name
            )));
        }

        let session_id = Uuid::new_v4();
        let cmd = self.render_command(entry, thread_id, session_id)?;

        std::fs::create_dir_all(&self.log_dir)?;
        let log_path = self
            .log_dir
            .join(format!("{}-{}.log", entry.name, session_id));
        let log_file = std::fs::File::create(&log_path)?;
        let log_err = log_file.try_clone()?;

        let spawned = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(&cmd)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log_file))
            .stderr(Stdio::from(log_err))
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                tracing::warn!(
                    catalog_name = %entry.name,
                    error = %e,
                    "invite spawn failed"
                );
                return Ok(InviteOutcome {
                    ok: false,
                    agent_name: entry.name.clone(),
                    command_executed: None,
                    reason: Some(e.to_string()),
                });
            }
        };

        tracing::info!(
            catalog_name = %entry.name,
            thread_id = %thread_id,
            log = %log_path.display(),
            "invited CLI agent"
        );

        // Hard kill deadline; the exit status is logged and otherwise
        // ignored — the agent rejoins via registration on its own.
        let timeout = Duration::from_secs(entry.timeout_seconds);
        let name = entry.name.clone();
        tokio::spawn(async move {
            match tokio::time::timeout(timeout, child.wait()).await {
                Ok(Ok(status)) => {
                    tracing::debug!(catalog_name = %name, %status, "invited agent exited");
                }
                Ok(Err(e)) => {
                    tracing::warn!(catalog_name = %name, error = %e, "invited agent wait failed");
                }
                Err(_) => {
                    tracing::warn!(catalog_name = %name, ?timeout, "invited agent timed out; killing");
                    let _ = child.kill().await;
                }
            }
        });

        Ok(InviteOutcome {
            ok: true,
            agent_name: entry.name.clone(),
            command_executed: Some(cmd),
            reason: None,
        })
    }
}
