//! Provider code ↔ canonical enum tables.
//!
//! All tables are built once and never mutated. Unknown keys resolve through
//! explicit fallbacks, never a lookup failure.

use std::{collections::HashMap, sync::LazyLock};

use crate::domain::{Carrier, ShipmentStatus};

/// Provider carrier id meaning "let the provider auto-detect".
pub const UNSPECIFIED_CARRIER: u32 = 0;

static STATUS_CODES: LazyLock<HashMap<i64, ShipmentStatus>> = LazyLock::new(|| {
    HashMap::from([
        (0, ShipmentStatus::Pending),
        (10, ShipmentStatus::InTransit),
        (20, ShipmentStatus::Exception),
        (30, ShipmentStatus::InTransit),
        (40, ShipmentStatus::Delivered),
        (50, ShipmentStatus::Expired),
    ])
});

static CARRIER_IDS: LazyLock<HashMap<Carrier, u32>> = LazyLock::new(|| {
    HashMap::from([
        (Carrier::Temu, 2003),
        (Carrier::Shein, 2108),
        (Carrier::AliExpress, 2031),
        (Carrier::Dhl, 7),
        (Carrier::Fedex, 8),
        (Carrier::Ups, 9),
        (Carrier::Usps, 36),
    ])
});

static CARRIERS_BY_ID: LazyLock<HashMap<u32, Carrier>> =
    LazyLock::new(|| CARRIER_IDS.iter().map(|(c, id)| (*id, *c)).collect());

static CARRIER_NAMES: LazyLock<HashMap<&'static str, Carrier>> = LazyLock::new(|| {
    [
        Carrier::Temu,
        Carrier::Shein,
        Carrier::AliExpress,
        Carrier::Alibaba,
        Carrier::Dhl,
        Carrier::Fedex,
        Carrier::Ups,
        Carrier::Usps,
        Carrier::Amazon,
        Carrier::ChinaPost,
        Carrier::SingaporePost,
    ]
    .into_iter()
    .map(|c| (c.as_str(), c))
    .collect()
});

/// Map a provider status code to a canonical status. Unknown codes are `pending`.
pub fn normalize_status(code: i64) -> ShipmentStatus {
    STATUS_CODES
        .get(&code)
        .copied()
        .unwrap_or(ShipmentStatus::Pending)
}

/// Parse a carrier name as submitted by a user or form (case-insensitive).
pub fn carrier_from_name(name: &str) -> Carrier {
    let key = name.trim().to_lowercase().replace([' ', '-'], "_");
    CARRIER_NAMES.get(key.as_str()).copied().unwrap_or_default()
}

/// Provider numeric id for a carrier, or [`UNSPECIFIED_CARRIER`].
pub fn carrier_code(carrier: Carrier) -> u32 {
    CARRIER_IDS
        .get(&carrier)
        .copied()
        .unwrap_or(UNSPECIFIED_CARRIER)
}

/// Convenience: provider id straight from a free-text carrier name.
pub fn carrier_code_for_name(name: &str) -> u32 {
    carrier_code(carrier_from_name(name))
}

/// Reverse lookup used when decoding provider responses.
pub fn carrier_from_provider_id(id: u32) -> Carrier {
    CARRIERS_BY_ID.get(&id).copied().unwrap_or_default()
}

pub fn status_emoji(status: ShipmentStatus) -> &'static str {
    match status {
        ShipmentStatus::Pending => "⏳",
        ShipmentStatus::InTransit => "🚚",
        ShipmentStatus::Delivered => "✅",
        ShipmentStatus::Exception => "⚠️",
        ShipmentStatus::Expired => "⏰",
    }
}
