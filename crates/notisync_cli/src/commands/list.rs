//! List command implementation.

use super::{format_record, Context};
use crate::Format;
use anyhow::Result;
use notisync_engine::NotificationRecord;
use serde::Serialize;

/// Listing result.
#[derive(Debug, Serialize)]
pub struct ListResult {
    /// Unread count after the listing was merged.
    pub unread_count: u32,
    /// Listed notifications, newest first.
    pub notifications: Vec<NotificationRecord>,
}

/// Runs the list command.
pub async fn run(context: &Context, recent: bool, unread_only: bool) -> Result<()> {
    let service = context.one_shot_service();
    let state = if recent {
        service.fetch_recent().await?
    } else {
        service.fetch_all().await?
    };

    let result = ListResult {
        unread_count: state.unread_count,
        notifications: state
            .notifications
            .into_iter()
            .filter(|record| !unread_only || !record.is_read)
            .collect(),
    };

    match context.format {
        Format::Json => context.print_json(&result)?,
        Format::Text => print_text_output(&result),
    }
    Ok(())
}

fn print_text_output(result: &ListResult) {
    if result.notifications.is_empty() {
        println!("No notifications.");
    }
    for record in &result.notifications {
        println!("{}", format_record(record));
    }
    println!();
    println!("{} unread", result.unread_count);
}
