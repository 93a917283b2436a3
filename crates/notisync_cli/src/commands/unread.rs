//! Unread command implementation.

use super::Context;
use crate::Format;
use anyhow::Result;
use notisync_protocol::UnreadCountResponse;

/// Runs the unread command.
pub async fn run(context: &Context) -> Result<()> {
    let unread_count = context.one_shot_service().fetch_unread_count().await?;
    match context.format {
        Format::Json => context.print_json(&UnreadCountResponse { unread_count })?,
        Format::Text => println!("{unread_count}"),
    }
    Ok(())
}
