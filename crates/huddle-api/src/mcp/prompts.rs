//! MCP prompt surface: static templates with string interpolation.

use serde_json::{json, Value};

use huddle_core::{Error, Result};

/// Prompt descriptors for `prompts/list`.
pub fn prompt_list() -> Value {
    json!([
        {
            "name": "summarize_thread",
            "description": "Instructs an agent to produce a concise summary of a thread's transcript.",
            "arguments": [
                {"name": "topic", "description": "The thread topic.", "required": true},
                {"name": "transcript", "description": "The full transcript text.", "required": true}
            ]
        },
        {
            "name": "handoff_to_agent",
            "description": "Standard format for handing off a task from one agent to another.",
            "arguments": [
                {"name": "from_agent", "description": "Name of the delegating agent.", "required": true},
                {"name": "to_agent", "description": "Name of the receiving agent.", "required": true},
                {"name": "task_description", "description": "What needs to be done.", "required": true},
                {"name": "context", "description": "Relevant background or prior decisions.", "required": false}
            ]
        }
    ])
}

fn arg<'a>(args: &'a Value, key: &str, default: &'a str) -> &'a str {
    args.get(key).and_then(Value::as_str).unwrap_or(default)
}

/// Render a prompt for `prompts/get`.
pub fn get_prompt(name: &str, args: &Value) -> Result<Value> {
    match name {
        "summarize_thread" => {
            let text = format!(
                "Please read the following conversation transcript for the topic \"{}\" \
                 and write a concise summary capturing the key decisions, conclusions, \
                 and any open questions.\n\n--- TRANSCRIPT ---\n{}\n--- END ---",
                arg(args, "topic", "(unknown)"),
                arg(args, "transcript", ""),
            );
            Ok(json!({
                "description": "Summarize the thread transcript.",
                "messages": [{
                    "role": "user",
                    "content": {"type": "text", "text": text}
                }]
            }))
        }
        "handoff_to_agent" => {
            let context_block = match args.get("context").and_then(Value::as_str) {
                Some(ctx) if !ctx.is_empty() => format!("\n\nRelevant context:\n{}", ctx),
                _ => String::new(),
            };
            let text = format!(
                "Hi {}, this is {} handing off a task to you.\n\n**Task:** {}{}\n\nPlease acknowledge and proceed.",
                arg(args, "to_agent", "Agent"),
                arg(args, "from_agent", "Agent"),
                arg(args, "task_description", ""),
                context_block,
            );
            Ok(json!({
                "description": "Task handoff message.",
                "messages": [{
                    "role": "user",
                    "content": {"type": "text", "text": text}
                }]
            }))
        }
        other => Err(Error::InvalidInput(format!("Unknown prompt: {}", other))),
    }
}
