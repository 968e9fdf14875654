//! Form-submission intake: register a number with an explicit carrier.

use std::{sync::Arc, time::Duration};

use serde::Deserialize;

use crate::{
    domain::{Carrier, ChatId, Shipment},
    errors::Error,
    normalize::carrier_from_name,
    notify::Notifier,
    provider::TrackingProvider,
    store::{ShipmentStore, UserStore},
    templates,
    utils::with_timeout,
    validate::{normalize_number, validate_for_carrier},
};

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageRequest {
    #[serde(default)]
    pub tracking_number: Option<String>,
    #[serde(default)]
    pub carrier: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, alias = "telegramChatId")]
    pub chat_id: Option<i64>,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error("{0}")]
    Validation(String),

    #[error("package is already being tracked")]
    AlreadyExists,

    #[error("failed to register tracking number with provider")]
    ProviderRejected,

    #[error("store error: {0}")]
    Store(String),
}

impl From<Error> for RegistrationError {
    fn from(e: Error) -> Self {
        match e {
            Error::Duplicate(_) => Self::AlreadyExists,
            Error::Validation(m) => Self::Validation(m),
            other => Self::Store(other.to_string()),
        }
    }
}

pub struct RegistrationService {
    provider: Arc<dyn TrackingProvider>,
    shipments: Arc<dyn ShipmentStore>,
    users: Arc<dyn UserStore>,
    notifier: Notifier,
    io_timeout: Duration,
}

impl RegistrationService {
    pub fn new(
        provider: Arc<dyn TrackingProvider>,
        shipments: Arc<dyn ShipmentStore>,
        users: Arc<dyn UserStore>,
        notifier: Notifier,
        io_timeout: Duration,
    ) -> Self {
        Self {
            provider,
            shipments,
            users,
            notifier,
            io_timeout,
        }
    }

    /// Creates a `pending` shipment with no events; the next reconciliation
    /// pass fills it in.
    pub async fn register(&self, req: PackageRequest) -> Result<Shipment, RegistrationError> {
        let number = req
            .tracking_number
            .as_deref()
            .map(normalize_number)
            .filter(|n| !n.is_empty());
        let carrier_name = req
            .carrier
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty());
        let (Some(number), Some(carrier_name)) = (number, carrier_name) else {
            return Err(RegistrationError::Validation(
                "tracking number and carrier are required".to_string(),
            ));
        };

        let carrier = carrier_from_name(carrier_name);
        validate_for_carrier(carrier, &number)?;

        let existing = with_timeout(
            self.io_timeout,
            "find shipment",
            self.shipments.find_by_tracking_number(&number),
        )
        .await?;
        if existing.is_some() {
            return Err(RegistrationError::AlreadyExists);
        }

        let hint = (carrier != Carrier::Unknown).then_some(carrier);
        if !self.provider.register(&number, hint).await {
            tracing::warn!(tracking_number = %number, %carrier, "provider refused registration");
            return Err(RegistrationError::ProviderRejected);
        }

        let chat_id = req.chat_id.map(ChatId);
        let mut shipment = Shipment::new(number.clone(), carrier);
        shipment.description = req
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        shipment.chat_id = chat_id;

        with_timeout(
            self.io_timeout,
            "create shipment",
            self.shipments.insert_new(shipment.clone()),
        )
        .await?;
        tracing::info!(tracking_number = %number, %carrier, "package registered");

        if let Some(chat_id) = chat_id {
            if let Err(e) = with_timeout(
                self.io_timeout,
                "index tracked number",
                self.users.add_tracked_number(chat_id, &number),
            )
            .await
            {
                tracing::warn!(%chat_id, tracking_number = %number, error = %e, "failed to index tracked number");
            }
            let html =
                templates::new_package(&number, carrier, shipment.description.as_deref());
            self.notifier.send_html(chat_id, &html).await;
        }

        Ok(shipment)
    }
}
