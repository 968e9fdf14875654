//! Outbound message templates (Telegram HTML).
//!
//! Anything that came from a user or the provider goes through
//! [`escape_html`] before it is embedded.

use chrono::{DateTime, Utc};

use crate::{
    domain::{Carrier, Shipment, ShipmentStatus},
    formatting::escape_html,
    normalize::status_emoji,
};

pub const STATUS_UPDATED_FALLBACK: &str = "Status updated";
const NO_EVENTS_YET: &str = "No tracking events yet.";

fn stamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M UTC").to_string()
}

pub fn welcome() -> String {
    "\
🎉 <b>Welcome to PackTrack Bot!</b>

I track your packages from Temu, Shein, AliExpress, Alibaba and more, and message you when something changes. 📦

<b>How it works:</b>
📍 Send me your tracking number
🔄 I'll track it automatically
🚚 Receive delivery notifications

<b>Commands:</b>
/help - Show help information
/list - View your tracked packages
/stop &lt;number&gt; - Stop tracking a package

<b>Please send me a tracking number to get started!</b> 👇"
        .to_string()
}

pub fn help() -> String {
    "\
🤖 <b>PackTrack Bot Help</b>

<b>Commands:</b>
/start - Start the bot and add tracking
/help - Show this help message
/list - View your tracked packages
/stop &lt;number&gt; - Stop tracking a package

<b>Supported formats:</b>
📦 Temu / AliExpress (YT…)
🛍️ Shein (LB…CN)
🏭 Alibaba (LP…CN)
🌍 Postal (AA123456789BB)

You can send several numbers at once, separated by spaces, commas or new lines.

<b>Just send me a tracking number anytime!</b>"
        .to_string()
}

pub fn unknown_command() -> String {
    "\
❓ <b>Unknown command</b>

Use these commands:
/start - Start tracking packages
/help - Show help
/list - View tracked packages

Or send me a tracking number! 📦"
        .to_string()
}

pub fn empty_batch() -> String {
    "❌ No tracking number found. Please send a valid tracking number.".to_string()
}

pub fn add_more() -> String {
    "\
📦 <b>Add more packages?</b>

Send me another tracking number or use:
/list - View tracked packages
/help - Show help menu"
        .to_string()
}

pub fn no_packages() -> String {
    "\
📦 <b>No Tracked Packages</b>

You don't have any packages being tracked yet.

Send me a tracking number to get started! 👇"
        .to_string()
}

/// `/list` summary, one block per shipment.
pub fn package_list(shipments: &[Shipment]) -> String {
    if shipments.is_empty() {
        return no_packages();
    }

    let mut blocks = vec![format!(
        "📦 <b>Your Tracked Packages ({})</b>",
        shipments.len()
    )];
    for s in shipments {
        let latest = s
            .latest_event()
            .map(|e| e.description.as_str())
            .filter(|d| !d.trim().is_empty())
            .unwrap_or("No updates yet");
        blocks.push(format!(
            "{} <b>{}</b>\n📊 Status: {}\n📝 Latest: {}\n🕐 Last Updated: {}",
            status_emoji(s.status),
            escape_html(&s.tracking_number),
            s.status.as_str().to_uppercase(),
            escape_html(latest),
            s.updated_at.format("%Y-%m-%d"),
        ));
    }
    blocks.push("💡 Use /stop &lt;number&gt; to stop tracking a package".to_string());
    blocks.join("\n\n")
}

pub fn invalid_entry(number: &str) -> String {
    format!(
        "⚠️ <b>{}</b>: Invalid tracking number format.",
        escape_html(number)
    )
}

pub fn already_tracked_entry(number: &str) -> String {
    format!("📦 <b>{}</b>: Already being tracked!", escape_html(number))
}

pub fn added_entry(number: &str, status: ShipmentStatus, latest: Option<&str>) -> String {
    let latest = latest.filter(|d| !d.trim().is_empty()).unwrap_or(NO_EVENTS_YET);
    format!(
        "✅ <b>{}</b> - Successfully added to tracking!\n\n📊 <b>Status:</b> {}\n📝 <b>Latest Update:</b> {}\n🔔 <b>Notifications:</b> Enabled",
        escape_html(number),
        status.as_str(),
        escape_html(latest),
    )
}

pub fn fetch_failed_entry(number: &str) -> String {
    format!(
        "❌ <b>{}</b>: Unable to fetch tracking information. Please check the number and try again.",
        escape_html(number)
    )
}

pub fn store_failed_entry(number: &str) -> String {
    format!(
        "❌ <b>{}</b>: Error occurred while adding to tracking.",
        escape_html(number)
    )
}

pub fn delivery_notification(number: &str, description: &str, at: DateTime<Utc>) -> String {
    format!(
        "🎉 <b>Package Delivered!</b>\n\n📦 <b>Tracking:</b> {}\n✅ <b>Status:</b> DELIVERED\n📝 <b>Description:</b> {}\n🕐 <b>Time:</b> {}\n\nYour package has been successfully delivered! 🚚📬\n\nUse /list to see all your packages.",
        escape_html(number),
        escape_html(description),
        stamp(at),
    )
}

pub fn status_update_notification(
    number: &str,
    status: ShipmentStatus,
    latest: &str,
    has_new_events: bool,
    at: DateTime<Utc>,
) -> String {
    let mut out = format!(
        "📦 <b>Package Update</b>\n\n🔢 <b>Tracking:</b> {}\n📊 <b>Status:</b> {}\n📝 <b>Latest Update:</b> {}\n🕐 <b>Time:</b> {}",
        escape_html(number),
        status.as_str().to_uppercase(),
        escape_html(latest),
        stamp(at),
    );
    if has_new_events {
        out.push_str("\n\n🆕 New tracking event detected!");
    }
    out.push_str("\n\nUse /list to see all your packages.");
    out
}

pub fn new_package(number: &str, carrier: Carrier, description: Option<&str>) -> String {
    let mut out = format!(
        "📦 New package added for tracking!\n\n🔢 {}\n🚚 {}",
        escape_html(number),
        carrier
    );
    if let Some(d) = description.filter(|d| !d.trim().is_empty()) {
        out.push_str(&format!("\n📝 {}", escape_html(d)));
    }
    out
}

pub fn stop_usage() -> String {
    "ℹ️ Usage: /stop &lt;tracking number&gt;".to_string()
}

pub fn stopped(number: &str) -> String {
    format!(
        "🔕 <b>{}</b>: Tracking stopped. You won't receive further updates.",
        escape_html(number)
    )
}

pub fn not_your_package(number: &str) -> String {
    format!(
        "❓ <b>{}</b>: Not found among your tracked packages.",
        escape_html(number)
    )
}

pub fn generic_failure() -> String {
    "❌ An error occurred. Please try again.".to_string()
}
