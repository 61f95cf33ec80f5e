//! MCP resource surface.
//!
//! Resources expose read-only bus state under the `chat://` scheme:
//! configuration, the agent roster, the thread index, and per-thread
//! transcripts, summaries, and states.

use serde_json::{json, Value};
use uuid::Uuid;

use huddle_bus::ChatBus;
use huddle_core::{content_text, Error, Result};

/// Resource descriptors for `resources/list`. Thread-scoped resources are
/// enumerated from the live thread index.
pub async fn resource_list(bus: &ChatBus) -> Result<Value> {
    let mut resources = vec![
        json!({
            "uri": "chat://bus/config",
            "name": "Bus Configuration",
            "description": "Bus-level settings including the preferred language. Agents should read this at startup.",
            "mimeType": "application/json",
        }),
        json!({
            "uri": "chat://agents/active",
            "name": "Active Agents",
            "description": "All currently registered agents and their online status.",
            "mimeType": "application/json",
        }),
        json!({
            "uri": "chat://threads/active",
            "name": "Active Threads",
            "description": "Summary list of all threads.",
            "mimeType": "application/json",
        }),
    ];

    let threads = bus.thread_list(None, true).await?;
    for t in &threads {
        let short: String = t.topic.chars().take(40).collect();
        resources.push(json!({
            "uri": format!("chat://threads/{}/transcript", t.id),
            "name": format!("Transcript: {}", short),
            "description": format!("Full conversation history for thread '{}'", t.topic),
            "mimeType": "text/plain",
        }));
        resources.push(json!({
            "uri": format!("chat://threads/{}/state", t.id),
            "name": format!("State: {}", short),
            "description": format!("Current lifecycle status of thread '{}'", t.topic),
            "mimeType": "application/json",
        }));
        if t.summary.is_some() {
            resources.push(json!({
                "uri": format!("chat://threads/{}/summary", t.id),
                "name": format!("Summary: {}", short),
                "description": format!("Closed-thread summary for '{}'", t.topic),
                "mimeType": "text/plain",
            }));
        }
    }
    Ok(Value::Array(resources))
}

fn thread_uri_id(uri: &str) -> Result<Uuid> {
    let rest = uri
        .strip_prefix("chat://threads/")
        .ok_or_else(|| Error::InvalidInput(format!("Unknown resource URI: {}", uri)))?;
    let id = rest
        .split('/')
        .next()
        .ok_or_else(|| Error::InvalidInput(format!("Unknown resource URI: {}", uri)))?;
    Uuid::parse_str(id).map_err(|_| Error::InvalidInput(format!("Invalid thread id in URI: {}", uri)))
}

/// Read a resource body. Returns `(mime_type, text)`.
pub async fn read_resource(
    bus: &ChatBus,
    session_lang: Option<&str>,
    uri: &str,
) -> Result<(&'static str, String)> {
    match uri {
        "chat://bus/config" => Ok((
            "application/json",
            serde_json::to_string_pretty(&bus.bus_config(session_lang))?,
        )),
        "chat://agents/active" => {
            let agents = bus.agent_list().await?;
            let rows: Vec<Value> = agents
                .iter()
                .map(|a| {
                    json!({
                        "agent_id": a.id,
                        "name": a.display_name,
                        "description": a.description,
                        "capabilities": a.capabilities,
                        "is_online": a.is_online,
                        "state": a.state,
                    })
                })
                .collect();
            Ok(("application/json", serde_json::to_string_pretty(&rows)?))
        }
        "chat://threads/active" => {
            let threads = bus.thread_list(None, false).await?;
            let rows: Vec<Value> = threads
                .iter()
                .map(|t| {
                    json!({
                        "thread_id": t.id,
                        "topic": t.topic,
                        "status": t.status,
                        "created_at": t.created_at.to_rfc3339(),
                    })
                })
                .collect();
            Ok(("application/json", serde_json::to_string_pretty(&rows)?))
        }
        _ if uri.ends_with("/transcript") => {
            let id = thread_uri_id(uri)?;
            let thread = bus.thread_get(id).await?;
            let msgs = bus.msg_list(id, 0, 10_000, true).await?;
            let mut lines = vec![format!(
                "# Thread: {}  [status: {}]\n",
                thread.topic, thread.status
            )];
            for m in &msgs {
                lines.push(format!(
                    "[seq={}] {} ({}): {}",
                    m.seq,
                    m.author_name,
                    m.role,
                    content_text(&m.content)
                ));
            }
            Ok(("text/plain", lines.join("\n")))
        }
        _ if uri.ends_with("/summary") => {
            let thread = bus.thread_get(thread_uri_id(uri)?).await?;
            Ok((
                "text/plain",
                thread
                    .summary
                    .unwrap_or_else(|| "(No summary recorded for this thread.)".to_string()),
            ))
        }
        _ if uri.ends_with("/state") => {
            let thread = bus.thread_get(thread_uri_id(uri)?).await?;
            Ok((
                "application/json",
                serde_json::to_string_pretty(&json!({
                    "thread_id": thread.id,
                    "status": thread.status,
                    "closed_at": thread.closed_at.map(|dt| dt.to_rfc3339()),
                }))?,
            ))
        }
        other => Err(Error::InvalidInput(format!(
            "Unknown resource URI: {}",
            other
        ))),
    }
}
