use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Chat identity on the messaging channel (Telegram chat id).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Telegram message id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageId(pub i32);

/// A stable reference to a sent message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

/// Canonical shipment status, independent of provider codes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShipmentStatus {
    #[default]
    Pending,
    InTransit,
    Delivered,
    Exception,
    Expired,
}

impl ShipmentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InTransit => "in_transit",
            Self::Delivered => "delivered",
            Self::Exception => "exception",
            Self::Expired => "expired",
        }
    }

    /// Terminal statuses are never polled again.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Expired)
    }
}

impl fmt::Display for ShipmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical carrier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Carrier {
    Temu,
    Shein,
    #[serde(rename = "aliexpress")]
    AliExpress,
    Alibaba,
    Dhl,
    Fedex,
    Ups,
    Usps,
    Amazon,
    ChinaPost,
    SingaporePost,
    #[default]
    Unknown,
}

impl Carrier {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Temu => "temu",
            Self::Shein => "shein",
            Self::AliExpress => "aliexpress",
            Self::Alibaba => "alibaba",
            Self::Dhl => "dhl",
            Self::Fedex => "fedex",
            Self::Ups => "ups",
            Self::Usps => "usps",
            Self::Amazon => "amazon",
            Self::ChinaPost => "china_post",
            Self::SingaporePost => "singapore_post",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Carrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One provider-reported checkpoint. Immutable once decoded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingEvent {
    /// Absent when the provider sent a time we could not parse.
    pub occurred_at: Option<DateTime<Utc>>,
    pub description: String,
    pub location: Option<String>,
    /// Raw provider status code for this checkpoint (not normalized).
    pub status: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Shipment {
    pub tracking_number: String,
    pub carrier: Carrier,
    pub description: Option<String>,
    pub status: ShipmentStatus,
    /// Most recent first.
    pub events: Vec<TrackingEvent>,
    pub chat_id: Option<ChatId>,
    pub notifications_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Shipment {
    pub fn new(tracking_number: impl Into<String>, carrier: Carrier) -> Self {
        let now = Utc::now();
        Self {
            tracking_number: tracking_number.into(),
            carrier,
            description: None,
            status: ShipmentStatus::Pending,
            events: Vec::new(),
            chat_id: None,
            notifications_enabled: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn latest_event(&self) -> Option<&TrackingEvent> {
        self.events.first()
    }

    /// Eligible for a reconciliation pass.
    pub fn is_pollable(&self) -> bool {
        self.notifications_enabled && !self.status.is_terminal()
    }
}

/// Sender metadata observed on an inbound chat message.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderProfile {
    pub user_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl SenderProfile {
    /// Best human label for logs.
    pub fn display_name(&self) -> &str {
        self.username
            .as_deref()
            .or(self.first_name.as_deref())
            .unwrap_or("unknown")
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatUser {
    pub chat_id: ChatId,
    pub user_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub tracked_numbers: Vec<String>,
    pub notifications_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChatUser {
    pub fn new(chat_id: ChatId, profile: &SenderProfile) -> Self {
        let now = Utc::now();
        Self {
            chat_id,
            user_id: profile.user_id,
            username: profile.username.clone(),
            first_name: profile.first_name.clone(),
            last_name: profile.last_name.clone(),
            tracked_numbers: Vec::new(),
            notifications_enabled: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply_profile(&mut self, profile: &SenderProfile) {
        self.user_id = profile.user_id;
        self.username = profile.username.clone();
        self.first_name = profile.first_name.clone();
        self.last_name = profile.last_name.clone();
        self.updated_at = Utc::now();
    }
}
