//! Attachment Processing (spec.md §4.7).
//!
//! Grounded on `tyler/models/agent.py`'s `_process_message_files`: image
//! content is base64-encoded inline, other supported document types are
//! routed to a `read-file` tool, and a bad attachment records an error in
//! its own `processed_content` without aborting the turn.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use relay_storage::FileStore;
use relay_thread::{Attachment, Message};
use relay_tools::ToolRegistry;
use serde_json::json;
use tracing::warn;

use crate::error::Result;

const READ_FILE_TOOL: &str = "read-file";

/// Process every attachment on `message` in place: detect MIME if unset,
/// route to the image/document/unsupported handling in spec.md §4.7
/// steps 3-5, then ensure each is persisted to the file store (step 6)
/// before it can be referenced in an outgoing chat-completion projection.
pub async fn process_attachments(message: &mut Message, tools: &ToolRegistry, file_store: &dyn FileStore) {
    for attachment in &mut message.attachments {
        process_one(attachment, tools).await;
        if let Err(e) = ensure_stored(attachment, file_store).await {
            // Storage failure for one attachment does not abort the turn
            // (spec.md §4.7 step 5's "one bad attachment does not abort
            // the turn" applies equally to storage as to processing).
            warn!(filename = %attachment.filename, error = %e, "failed to store attachment");
            attachment.mark_failed(format!("Failed to process file: {e}"));
        }
    }
}

async fn process_one(attachment: &mut Attachment, tools: &ToolRegistry) {
    let Some(bytes) = attachment.data.clone() else {
        attachment.mark_failed("Failed to process file: no content available to process");
        return;
    };

    let mime = attachment
        .mime_type
        .clone()
        .or_else(|| infer::get(&bytes).map(|t| t.mime_type().to_string()));
    attachment.mime_type = mime.clone();

    let mime = mime.unwrap_or_else(|| "application/octet-stream".to_string());

    if mime.starts_with("image/") {
        attachment.processed_content = Some(json!({
            "type": "image",
            "content": STANDARD.encode(&bytes),
            "mime_type": mime,
        }));
        return;
    }

    if is_supported_document(&mime) {
        if !tools.has(READ_FILE_TOOL).await {
            attachment.mark_failed(format!("Failed to process file: no '{READ_FILE_TOOL}' tool registered to process {mime}"));
            return;
        }
        let call = relay_thread::ToolCallRef::new(
            "attachment-processing",
            READ_FILE_TOOL,
            json!({ "file_url": attachment.filename, "mime_type": mime }).to_string(),
        );
        let result = tools.execute_tool_call(&call).await;
        attachment.processed_content = Some(json!({ "content": result.outcome.content() }));
        return;
    }

    attachment.mark_failed(format!("Failed to process file: unsupported file type: {mime}"));
}

fn is_supported_document(mime: &str) -> bool {
    matches!(
        mime,
        "application/pdf"
            | "application/msword"
            | "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            | "text/plain"
            | "text/csv"
            | "application/json"
    )
}

async fn ensure_stored(attachment: &mut Attachment, file_store: &dyn FileStore) -> Result<()> {
    if attachment.file_id.is_some() {
        return Ok(());
    }
    let Some(bytes) = attachment.data.clone() else {
        return Ok(());
    };
    let meta = file_store
        .save(bytes, &attachment.filename, attachment.mime_type.as_deref())
        .await
        .map_err(|e| crate::error::AgentError::store(e.to_string()))?;
    attachment.mark_stored(meta.id, meta.storage_path);
    Ok(())
}
