//! MCP tool definitions and dispatch.
//!
//! Tool names are underscore-separated because some MCP clients reject dots.
//! Each tool maps 1:1 to a core API call; results are returned as JSON text
//! content.

use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use huddle_bus::ChatBus;
use huddle_core::{
    defaults, CreateThreadRequest, Error, Message, PostMessageRequest, RegisterAgentRequest,
    Result, Role, Thread, ThreadStatus,
};

fn require_str<'a>(args: &'a Value, key: &str) -> Result<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| Error::InvalidInput(format!("Missing required argument '{}'", key)))
}

fn require_uuid(args: &Value, key: &str) -> Result<Uuid> {
    let raw = require_str(args, key)?;
    Uuid::parse_str(raw).map_err(|_| Error::InvalidInput(format!("Invalid {} '{}'", key, raw)))
}

fn opt_uuid(args: &Value, key: &str) -> Result<Option<Uuid>> {
    match args.get(key).and_then(Value::as_str) {
        Some(raw) => Uuid::parse_str(raw)
            .map(Some)
            .map_err(|_| Error::InvalidInput(format!("Invalid {} '{}'", key, raw))),
        None => Ok(None),
    }
}

fn message_json(m: &Message) -> Value {
    json!({
        "msg_id": m.id,
        "author": m.author_name,
        "author_id": m.author_id,
        "author_name": m.author_name,
        "role": m.role,
        "content": m.content,
        "seq": m.seq,
        "created_at": m.created_at.to_rfc3339(),
    })
}

fn thread_json(t: &Thread) -> Value {
    json!({
        "thread_id": t.id,
        "topic": t.topic,
        "status": t.status,
        "created_at": t.created_at.to_rfc3339(),
    })
}

/// Tool descriptors for `tools/list`.
pub fn tool_list() -> Value {
    json!([
        // ── Thread management ──────────────────
        {
            "name": "thread_create",
            "description": "Create a new conversation thread (topic / task context) on the bus.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "topic": {"type": "string", "description": "Short description of the thread's purpose."},
                    "metadata": {"type": "object", "description": "Optional arbitrary key-value metadata."},
                    "system_prompt": {"type": "string", "description": "Optional system prompt defining collaboration rules for this thread."}
                },
                "required": ["topic"]
            }
        },
        {
            "name": "thread_list",
            "description": "List threads, optionally filtered by status.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "status": {"type": "string", "enum": ["discuss", "implement", "review", "done", "closed", "archived"],
                               "description": "Filter by lifecycle state. Omit for all threads."},
                    "include_archived": {"type": "boolean", "default": false}
                }
            }
        },
        {
            "name": "thread_get",
            "description": "Get details of a single thread by ID.",
            "inputSchema": {
                "type": "object",
                "properties": {"thread_id": {"type": "string"}},
                "required": ["thread_id"]
            }
        },
        {
            "name": "thread_set_state",
            "description": "Advance the thread state machine: discuss → implement → review → done.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "thread_id": {"type": "string"},
                    "state": {"type": "string", "enum": ["discuss", "implement", "review", "done", "closed"]}
                },
                "required": ["thread_id", "state"]
            }
        },
        {
            "name": "thread_close",
            "description": "Close a thread and optionally write a final summary for future checkpoint reads.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "thread_id": {"type": "string"},
                    "summary": {"type": "string", "description": "Summary of conclusions reached in this thread."}
                },
                "required": ["thread_id"]
            }
        },
        {
            "name": "thread_archive",
            "description": "Archive a thread. The prior status is preserved and restored on unarchive.",
            "inputSchema": {
                "type": "object",
                "properties": {"thread_id": {"type": "string"}},
                "required": ["thread_id"]
            }
        },
        // ── Messaging ─────────────────────────
        {
            "name": "msg_post",
            "description": "Post a message to a thread. Returns the new message ID and global seq number.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "thread_id": {"type": "string"},
                    "author": {"type": "string", "description": "Agent ID, 'system', or 'human'."},
                    "content": {"type": "string"},
                    "role": {"type": "string", "enum": ["user", "assistant", "system"], "default": "user"},
                    "mentions": {"type": "array", "items": {"type": "string"}},
                    "metadata": {"type": "object"}
                },
                "required": ["thread_id", "author", "content"]
            }
        },
        {
            "name": "msg_list",
            "description": "Fetch messages in a thread after a given seq cursor.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "thread_id": {"type": "string"},
                    "after_seq": {"type": "integer", "default": 0, "description": "Return messages with seq > this value."},
                    "limit": {"type": "integer", "default": 100},
                    "include_system_prompt": {"type": "boolean", "default": true}
                },
                "required": ["thread_id"]
            }
        },
        {
            "name": "msg_wait",
            "description": "Block until at least one new message arrives in the thread after `after_seq`. Returns immediately if messages are already available. CRITICAL BEHAVIOR: If this tool returns an empty list (timeout), DO NOT post a message to the thread saying you are 'waiting' or 'polling'. REMAIN SILENT. Just call this tool again to continue listening.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "thread_id": {"type": "string"},
                    "after_seq": {"type": "integer"},
                    "timeout_ms": {"type": "integer", "description": "Max wait in milliseconds."},
                    "agent_id": {"type": "string", "description": "Optional agent attribution for presence."},
                    "token": {"type": "string"}
                },
                "required": ["thread_id", "after_seq"]
            }
        },
        // ── Agent identity & presence ──────────
        {
            "name": "agent_register",
            "description": "Register an agent onto the bus. The display name is auto-generated as 'IDE (Model)' — e.g. 'Cursor (GPT-4)'. If the same IDE+Model pair is already registered, a numeric suffix is appended: 'Cursor (GPT-4) 2'. Returns agent_id and a secret token for subsequent calls.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "ide": {"type": "string", "description": "Name of the IDE or client, e.g. 'Cursor', 'Claude Desktop', 'CLI'."},
                    "model": {"type": "string", "description": "Model name, e.g. 'claude-3-5-sonnet', 'GPT-4'."},
                    "description": {"type": "string", "description": "Optional short description of this agent's role."},
                    "capabilities": {"type": "array", "items": {"type": "string"}, "description": "List of capability tags, e.g. ['code', 'review']."},
                    "display_name": {"type": "string", "description": "Optional custom alias shown in the console."}
                },
                "required": ["ide", "model"]
            }
        },
        {
            "name": "agent_heartbeat",
            "description": "Send a keep-alive ping. Agents that miss the heartbeat window are marked offline.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "agent_id": {"type": "string"},
                    "token": {"type": "string"}
                },
                "required": ["agent_id", "token"]
            }
        },
        {
            "name": "agent_resume",
            "description": "Re-attach to an existing registration after a reconnect.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "agent_id": {"type": "string"},
                    "token": {"type": "string"}
                },
                "required": ["agent_id", "token"]
            }
        },
        {
            "name": "agent_unregister",
            "description": "Gracefully deregister an agent from the bus.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "agent_id": {"type": "string"},
                    "token": {"type": "string"}
                },
                "required": ["agent_id", "token"]
            }
        },
        {
            "name": "agent_list",
            "description": "List all registered agents and their online status.",
            "inputSchema": {"type": "object", "properties": {}}
        },
        {
            "name": "agent_set_typing",
            "description": "Broadcast an 'is typing' signal for a thread (optional, for UI feedback).",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "thread_id": {"type": "string"},
                    "agent_id": {"type": "string"},
                    "is_typing": {"type": "boolean"}
                },
                "required": ["thread_id", "agent_id", "is_typing"]
            }
        },
        {
            "name": "agent_invite",
            "description": "Invoke a pre-configured CLI agent onto a thread by spawning its command. The agent registers itself once it starts.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "agent_name": {"type": "string", "description": "Catalog name of the CLI agent."},
                    "thread_id": {"type": "string"}
                },
                "required": ["agent_name", "thread_id"]
            }
        },
        // ── Bus config ────────────────────────
        {
            "name": "bus_get_config",
            "description": "Get the bus-level configuration. Agents SHOULD call this once at startup. The most important field is `preferred_language`: agents are expected to try to communicate in that language whenever possible. This is a SOFT recommendation — no enforcement is done by the server.",
            "inputSchema": {"type": "object", "properties": {}}
        }
    ])
}

/// Execute a tool call against the bus and return its JSON payload.
pub async fn dispatch_tool(
    bus: &ChatBus,
    session_lang: Option<&str>,
    name: &str,
    args: &Value,
    cancel: &CancellationToken,
) -> Result<Value> {
    match name {
        "bus_get_config" => Ok(bus.bus_config(session_lang)),

        // ── Thread tools ──────────────────────────────────────────────────
        "thread_create" => {
            let thread = bus
                .thread_create(CreateThreadRequest {
                    topic: require_str(args, "topic")?.to_string(),
                    metadata: args.get("metadata").cloned(),
                    system_prompt: args
                        .get("system_prompt")
                        .and_then(Value::as_str)
                        .map(String::from),
                })
                .await?;
            Ok(json!({
                "thread_id": thread.id,
                "topic": thread.topic,
                "status": thread.status,
                "system_prompt": thread.system_prompt,
            }))
        }
        "thread_list" => {
            let status = args
                .get("status")
                .and_then(Value::as_str)
                .map(ThreadStatus::parse)
                .transpose()?;
            let include_archived = args
                .get("include_archived")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            let threads = bus.thread_list(status, include_archived).await?;
            Ok(Value::Array(threads.iter().map(thread_json).collect()))
        }
        "thread_get" => {
            let t = bus.thread_get(require_uuid(args, "thread_id")?).await?;
            Ok(json!({
                "thread_id": t.id,
                "topic": t.topic,
                "status": t.status,
                "system_prompt": t.system_prompt,
                "created_at": t.created_at.to_rfc3339(),
                "closed_at": t.closed_at.map(|dt| dt.to_rfc3339()),
                "summary": t.summary,
            }))
        }
        "thread_set_state" => {
            let status = ThreadStatus::parse(require_str(args, "state")?)?;
            bus.thread_set_state(require_uuid(args, "thread_id")?, status)
                .await?;
            Ok(json!({"ok": true}))
        }
        "thread_close" => {
            let summary = args.get("summary").and_then(Value::as_str);
            bus.thread_close(require_uuid(args, "thread_id")?, summary)
                .await?;
            Ok(json!({"ok": true}))
        }
        "thread_archive" => {
            bus.thread_archive(require_uuid(args, "thread_id")?).await?;
            Ok(json!({"ok": true}))
        }

        // ── Message tools ─────────────────────────────────────────────────
        "msg_post" => {
            let mentions = args
                .get("mentions")
                .and_then(Value::as_array)
                .map(|a| {
                    a.iter()
                        .filter_map(Value::as_str)
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default();
            let role = match args.get("role").and_then(Value::as_str) {
                Some(r) => Role::parse(r)?,
                None => Role::User,
            };
            let msg = bus
                .msg_post(PostMessageRequest {
                    thread_id: require_uuid(args, "thread_id")?,
                    author: require_str(args, "author")?.to_string(),
                    role,
                    content: require_str(args, "content")?.to_string(),
                    mentions,
                    metadata: args.get("metadata").cloned(),
                })
                .await?;
            Ok(json!({"msg_id": msg.id, "seq": msg.seq}))
        }
        "msg_list" => {
            let thread_id = require_uuid(args, "thread_id")?;
            let after_seq = args.get("after_seq").and_then(Value::as_i64).unwrap_or(0);
            let limit = args
                .get("limit")
                .and_then(Value::as_i64)
                .unwrap_or(defaults::MSG_LIST_LIMIT);
            let include_system_prompt = args
                .get("include_system_prompt")
                .and_then(Value::as_bool)
                .unwrap_or(true);
            let thread = bus.thread_get(thread_id).await?;
            let msgs = bus
                .msg_list(thread_id, after_seq, limit, include_system_prompt)
                .await?;
            let payload = Value::Array(msgs.iter().map(message_json).collect());
            // Threads with collaboration rules prepend them for agents.
            match thread.system_prompt {
                Some(prompt) if include_system_prompt => Ok(json!({
                    "system_prompt": prompt,
                    "messages": payload,
                })),
                _ => Ok(payload),
            }
        }
        "msg_wait" => {
            let thread_id = require_uuid(args, "thread_id")?;
            let after_seq = args
                .get("after_seq")
                .and_then(Value::as_i64)
                .ok_or_else(|| Error::InvalidInput("Missing required argument 'after_seq'".into()))?;
            let timeout_ms = args.get("timeout_ms").and_then(Value::as_u64);
            let agent_id = opt_uuid(args, "agent_id")?;
            let token = args.get("token").and_then(Value::as_str);
            let attribution = agent_id.zip(token);
            let msgs = bus
                .msg_wait(thread_id, after_seq, timeout_ms, attribution, cancel)
                .await?;
            Ok(Value::Array(msgs.iter().map(message_json).collect()))
        }

        // ── Agent tools ───────────────────────────────────────────────────
        "agent_register" => {
            let capabilities = args
                .get("capabilities")
                .and_then(Value::as_array)
                .map(|a| {
                    a.iter()
                        .filter_map(Value::as_str)
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default();
            let agent = bus
                .agent_register(RegisterAgentRequest {
                    ide: require_str(args, "ide")?.to_string(),
                    model: require_str(args, "model")?.to_string(),
                    description: args
                        .get("description")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    capabilities,
                    display_name: args
                        .get("display_name")
                        .and_then(Value::as_str)
                        .map(String::from),
                })
                .await?;
            Ok(json!({
                "agent_id": agent.id,
                "name": agent.name,
                "display_name": agent.display_name,
                "alias_source": agent.alias_source,
                "token": agent.token,
            }))
        }
        "agent_heartbeat" => {
            bus.agent_heartbeat(
                require_uuid(args, "agent_id")?,
                require_str(args, "token")?,
            )
            .await?;
            Ok(json!({"ok": true}))
        }
        "agent_resume" => {
            let agent = bus
                .agent_resume(
                    require_uuid(args, "agent_id")?,
                    require_str(args, "token")?,
                )
                .await?;
            let summary = agent.summary(bus.config().heartbeat_timeout_secs);
            Ok(json!({
                "ok": true,
                "agent_id": agent.id,
                "name": agent.name,
                "display_name": agent.display_name,
                "alias_source": agent.alias_source,
                "is_online": summary.is_online,
                "last_heartbeat": agent.last_heartbeat.to_rfc3339(),
            }))
        }
        "agent_unregister" => {
            bus.agent_unregister(
                require_uuid(args, "agent_id")?,
                require_str(args, "token")?,
            )
            .await?;
            Ok(json!({"ok": true}))
        }
        "agent_list" => {
            let agents = bus.agent_list().await?;
            Ok(Value::Array(
                agents
                    .iter()
                    .map(|a| {
                        json!({
                            "agent_id": a.id,
                            "name": a.name,
                            "display_name": a.display_name,
                            "alias_source": a.alias_source,
                            "ide": a.ide,
                            "model": a.model,
                            "description": a.description,
                            "is_online": a.is_online,
                            "state": a.state,
                            "last_heartbeat": a.last_heartbeat.to_rfc3339(),
                            "last_activity": a.last_activity,
                            "last_activity_time": a.last_activity_time.map(|dt| dt.to_rfc3339()),
                        })
                    })
                    .collect(),
            ))
        }
        "agent_set_typing" => {
            let is_typing = args
                .get("is_typing")
                .and_then(Value::as_bool)
                .ok_or_else(|| Error::InvalidInput("Missing required argument 'is_typing'".into()))?;
            bus.agent_set_typing(
                require_uuid(args, "thread_id")?,
                require_uuid(args, "agent_id")?,
                is_typing,
            )
            .await?;
            Ok(json!({"ok": true}))
        }
        "agent_invite" => {
            let outcome = bus
                .agent_invite(
                    require_str(args, "agent_name")?,
                    require_uuid(args, "thread_id")?,
                )
                .await?;
            Ok(serde_json::to_value(outcome)?)
        }

        other => Err(Error::InvalidInput(format!("Unknown tool: {}", other))),
    }
}
