//! Read and read-all command implementation.

use super::Context;
use crate::Format;
use anyhow::{Context as _, Result};
use notisync_engine::NotificationId;
use serde_json::json;

/// Marks `id` as read, or every notification when `id` is `None`.
pub async fn run(context: &Context, id: Option<i64>) -> Result<()> {
    let service = context.one_shot_service();
    match id {
        Some(id) => service
            .mark_as_read(NotificationId(id))
            .await
            .with_context(|| format!("failed to mark notification {id} as read"))?,
        None => service
            .mark_all_as_read()
            .await
            .context("failed to mark all notifications as read")?,
    }

    match context.format {
        Format::Json => context.print_json(&json!({ "status": "ok", "id": id }))?,
        Format::Text => match id {
            Some(id) => println!("Marked notification {id} as read."),
            None => println!("Marked all notifications as read."),
        },
    }
    Ok(())
}
