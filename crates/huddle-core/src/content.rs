//! Message content normalization.
//!
//! `content` is sometimes plain text and sometimes a JSON array of typed
//! content blocks (multimodal tool results). Incoming content is normalized
//! and stored as text; adapters that explicitly ask for structure get the
//! block projection back.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A typed content block inside a multimodal message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    Image {
        /// Base64-encoded image bytes.
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
}

/// Validate and canonicalize incoming content.
///
/// Plain text passes through untouched. A JSON array is only accepted when
/// every element is a known content block; it is re-serialized in canonical
/// form so stored text round-trips through [`content_blocks`].
pub fn normalize_content(raw: &str) -> Result<String> {
    let trimmed = raw.trim_start();
    if !trimmed.starts_with('[') {
        return Ok(raw.to_string());
    }
    match serde_json::from_str::<Vec<ContentBlock>>(raw) {
        Ok(blocks) => {
            if blocks.is_empty() {
                return Err(Error::InvalidInput(
                    "Content block array must not be empty".to_string(),
                ));
            }
            Ok(serde_json::to_string(&blocks)?)
        }
        // A leading '[' that is not a block array is treated as plain text
        // (e.g. markdown starting with a link).
        Err(_) => Ok(raw.to_string()),
    }
}

/// Project stored content into structured blocks.
///
/// Text that was stored as a canonical block array deserializes back into
/// its blocks; anything else becomes a single text block.
pub fn content_blocks(stored: &str) -> Vec<ContentBlock> {
    if stored.trim_start().starts_with('[') {
        if let Ok(blocks) = serde_json::from_str::<Vec<ContentBlock>>(stored) {
            return blocks;
        }
    }
    vec![ContentBlock::Text {
        text: stored.to_string(),
    }]
}

/// Flatten stored content to display text, dropping image payloads.
pub fn content_text(stored: &str) -> String {
    let blocks = content_blocks(stored);
    match blocks.as_slice() {
        [ContentBlock::Text { text }] => text.clone(),
        _ => blocks
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Text { text } => Some(text.as_str()),
                ContentBlock::Image { mime_type, .. } => {
                    tracing::trace!(mime_type, "dropping image block from text projection");
                    None
                }
            })
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_passes_through() {
        assert_eq!(normalize_content("hello world").unwrap(), "hello world");
    }

    #[test]
    fn test_markdown_bracket_is_not_a_block_array() {
        let md = "[link](https://example.com) and more";
        assert_eq!(normalize_content(md).unwrap(), md);
        assert_eq!(
            content_blocks(md),
            vec![ContentBlock::Text {
                text: md.to_string()
            }]
        );
    }

    #[test]
    fn test_block_array_round_trip() {
        let raw = r#"[{"type":"text","text":"look:"},{"type":"image","data":"aGk=","mimeType":"image/png"}]"#;
        let stored = normalize_content(raw).unwrap();
        let blocks = content_blocks(&stored);
        assert_eq!(blocks.len(), 2);
        assert_eq!(
            blocks[0],
            ContentBlock::Text {
                text: "look:".to_string()
            }
        );
        match &blocks[1] {
            ContentBlock::Image { mime_type, .. } => assert_eq!(mime_type, "image/png"),
            other => panic!("expected image block, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_block_array_rejected() {
        assert!(normalize_content("[]").is_err());
    }

    #[test]
    fn test_content_text_flattens_blocks() {
        let raw = r#"[{"type":"text","text":"a"},{"type":"image","data":"x","mimeType":"image/png"},{"type":"text","text":"b"}]"#;
        let stored = normalize_content(raw).unwrap();
        assert_eq!(content_text(&stored), "a\nb");
        assert_eq!(content_text("plain"), "plain");
    }
}
