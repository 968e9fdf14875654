//! Conversational intake: commands, dialog state, batch tracking input.
//!
//! Adapters hand every inbound chat text to [`IntakeService::handle`]. The
//! service replies through the [`Notifier`] itself and returns an
//! [`IntakeOutcome`] for logging and tests. Callers must serialize messages
//! per chat; different chats may be handled in parallel.

use std::{sync::Arc, time::Duration};

use crate::{
    domain::{ChatId, SenderProfile, Shipment},
    errors::Error,
    notify::Notifier,
    provider::TrackingProvider,
    reconcile::order_latest_first,
    store::{ShipmentStore, UserStore},
    templates,
    utils::with_timeout,
    validate::{is_valid_format, looks_like_tracking_input, split_tracking_input},
};

pub mod command;
pub mod dialog;
pub mod locks;

use command::{parse_command, parse_dialog_command, Command};
use dialog::{DialogState, DialogStates};
pub use locks::ChatLocks;

/// One inbound chat text with the sender it came from.
#[derive(Clone, Debug)]
pub struct InboundMessage {
    pub chat_id: ChatId,
    pub sender: SenderProfile,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EntryOutcome {
    Added,
    AlreadyTracked,
    Invalid,
    FetchFailed,
    StoreFailed,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchEntry {
    pub tracking_number: String,
    pub outcome: EntryOutcome,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IntakeOutcome {
    Welcome,
    Help,
    Listed { count: usize },
    Stopped { tracking_number: String },
    StopRejected { tracking_number: Option<String> },
    Batch(Vec<BatchEntry>),
    EmptyBatch,
    UnknownCommand,
    Failed,
}

pub struct IntakeService {
    provider: Arc<dyn TrackingProvider>,
    shipments: Arc<dyn ShipmentStore>,
    users: Arc<dyn UserStore>,
    notifier: Notifier,
    dialogs: DialogStates,
    io_timeout: Duration,
}

impl IntakeService {
    pub fn new(
        provider: Arc<dyn TrackingProvider>,
        shipments: Arc<dyn ShipmentStore>,
        users: Arc<dyn UserStore>,
        notifier: Notifier,
        dialogs: DialogStates,
        io_timeout: Duration,
    ) -> Self {
        Self {
            provider,
            shipments,
            users,
            notifier,
            dialogs,
            io_timeout,
        }
    }

    pub async fn handle(&self, msg: InboundMessage) -> IntakeOutcome {
        let chat_id = msg.chat_id;
        let text = msg.text.trim();
        tracing::debug!(%chat_id, from = msg.sender.display_name(), "inbound message");

        self.record_sender(chat_id, &msg.sender).await;

        let awaiting = self.dialogs.get(chat_id).await == DialogState::AwaitingTrackingInput;
        let command = if awaiting {
            parse_dialog_command(text)
        } else {
            parse_command(text)
        };

        let outcome = if let Some(cmd) = command {
            self.run_command(chat_id, cmd).await
        } else if awaiting || looks_like_tracking_input(text) {
            self.dialogs.clear(chat_id).await;
            self.run_batch(chat_id, text).await
        } else {
            self.reply(chat_id, &templates::unknown_command()).await;
            IntakeOutcome::UnknownCommand
        };

        tracing::info!(%chat_id, outcome = outcome_label(&outcome), "intake handled");
        outcome
    }

    async fn record_sender(&self, chat_id: ChatId, sender: &SenderProfile) {
        let res = with_timeout(
            self.io_timeout,
            "upsert chat user",
            self.users.upsert_by_chat_id(chat_id, sender),
        )
        .await;
        if let Err(e) = res {
            tracing::warn!(%chat_id, error = %e, "failed to record chat user");
        }
    }

    async fn reply(&self, chat_id: ChatId, html: &str) {
        self.notifier.send_html(chat_id, html).await;
    }

    async fn run_command(&self, chat_id: ChatId, cmd: Command) -> IntakeOutcome {
        match cmd {
            Command::Start => {
                self.dialogs
                    .set(chat_id, DialogState::AwaitingTrackingInput)
                    .await;
                self.reply(chat_id, &templates::welcome()).await;
                IntakeOutcome::Welcome
            }
            Command::Help => {
                self.reply(chat_id, &templates::help()).await;
                IntakeOutcome::Help
            }
            Command::List => self.list(chat_id).await,
            Command::Stop(None) => {
                self.reply(chat_id, &templates::stop_usage()).await;
                IntakeOutcome::StopRejected {
                    tracking_number: None,
                }
            }
            Command::Stop(Some(number)) => self.stop(chat_id, number).await,
        }
    }

    async fn list(&self, chat_id: ChatId) -> IntakeOutcome {
        match with_timeout(
            self.io_timeout,
            "list shipments",
            self.shipments.find_by_owner(chat_id),
        )
        .await
        {
            Ok(owned) => {
                self.reply(chat_id, &templates::package_list(&owned)).await;
                IntakeOutcome::Listed { count: owned.len() }
            }
            Err(e) => {
                tracing::error!(%chat_id, error = %e, "list failed");
                self.reply(chat_id, &templates::generic_failure()).await;
                IntakeOutcome::Failed
            }
        }
    }

    async fn stop(&self, chat_id: ChatId, number: String) -> IntakeOutcome {
        let owned = match with_timeout(
            self.io_timeout,
            "find shipment",
            self.shipments.find_by_tracking_number(&number),
        )
        .await
        {
            Ok(found) => found.is_some_and(|s| s.chat_id == Some(chat_id)),
            Err(e) => {
                tracing::error!(%chat_id, tracking_number = %number, error = %e, "stop lookup failed");
                self.reply(chat_id, &templates::generic_failure()).await;
                return IntakeOutcome::Failed;
            }
        };

        if !owned {
            self.reply(chat_id, &templates::not_your_package(&number))
                .await;
            return IntakeOutcome::StopRejected {
                tracking_number: Some(number),
            };
        }

        match with_timeout(
            self.io_timeout,
            "disable notifications",
            self.shipments.set_notifications(&number, false),
        )
        .await
        {
            Ok(_) => {
                tracing::info!(%chat_id, tracking_number = %number, "tracking stopped");
                self.reply(chat_id, &templates::stopped(&number)).await;
                IntakeOutcome::Stopped {
                    tracking_number: number,
                }
            }
            Err(e) => {
                tracing::error!(%chat_id, tracking_number = %number, error = %e, "stop failed");
                self.reply(chat_id, &templates::generic_failure()).await;
                IntakeOutcome::Failed
            }
        }
    }

    async fn run_batch(&self, chat_id: ChatId, text: &str) -> IntakeOutcome {
        let numbers = split_tracking_input(text);
        if numbers.is_empty() {
            self.dialogs
                .set(chat_id, DialogState::AwaitingTrackingInput)
                .await;
            self.reply(chat_id, &templates::empty_batch()).await;
            return IntakeOutcome::EmptyBatch;
        }

        let mut entries = Vec::with_capacity(numbers.len());
        let mut lines = Vec::with_capacity(numbers.len());
        for number in numbers {
            let (outcome, line) = self.track_one(chat_id, &number).await;
            lines.push(line);
            entries.push(BatchEntry {
                tracking_number: number,
                outcome,
            });
        }

        self.reply(chat_id, &lines.join("\n\n")).await;
        self.reply(chat_id, &templates::add_more()).await;
        IntakeOutcome::Batch(entries)
    }

    async fn track_one(&self, chat_id: ChatId, number: &str) -> (EntryOutcome, String) {
        if !is_valid_format(number) {
            return (EntryOutcome::Invalid, templates::invalid_entry(number));
        }

        match with_timeout(
            self.io_timeout,
            "find shipment",
            self.shipments.find_by_tracking_number(number),
        )
        .await
        {
            Ok(Some(_)) => {
                return (
                    EntryOutcome::AlreadyTracked,
                    templates::already_tracked_entry(number),
                )
            }
            Ok(None) => {}
            Err(e) => {
                tracing::error!(tracking_number = %number, error = %e, "lookup failed");
                return (EntryOutcome::StoreFailed, templates::store_failed_entry(number));
            }
        }

        let snapshot = match self.provider.fetch_info(number).await {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(tracking_number = %number, error = %e, "fetch failed during intake");
                return (EntryOutcome::FetchFailed, templates::fetch_failed_entry(number));
            }
        };

        let mut shipment = Shipment::new(number, snapshot.carrier);
        shipment.status = snapshot.status;
        shipment.events = order_latest_first(snapshot.events);
        shipment.chat_id = Some(chat_id);

        let line = templates::added_entry(
            number,
            shipment.status,
            shipment.latest_event().map(|e| e.description.as_str()),
        );

        match with_timeout(
            self.io_timeout,
            "create shipment",
            self.shipments.insert_new(shipment),
        )
        .await
        {
            Ok(()) => {}
            Err(Error::Duplicate(_)) => {
                return (
                    EntryOutcome::AlreadyTracked,
                    templates::already_tracked_entry(number),
                )
            }
            Err(e) => {
                tracing::error!(tracking_number = %number, error = %e, "create failed");
                return (EntryOutcome::StoreFailed, templates::store_failed_entry(number));
            }
        }

        if let Err(e) = with_timeout(
            self.io_timeout,
            "index tracked number",
            self.users.add_tracked_number(chat_id, number),
        )
        .await
        {
            tracing::warn!(%chat_id, tracking_number = %number, error = %e, "failed to index tracked number");
        }

        tracing::info!(%chat_id, tracking_number = %number, "shipment added");
        (EntryOutcome::Added, line)
    }
}

fn outcome_label(outcome: &IntakeOutcome) -> &'static str {
    match outcome {
        IntakeOutcome::Welcome => "welcome",
        IntakeOutcome::Help => "help",
        IntakeOutcome::Listed { .. } => "list",
        IntakeOutcome::Stopped { .. } => "stopped",
        IntakeOutcome::StopRejected { .. } => "stop_rejected",
        IntakeOutcome::Batch(_) => "batch",
        IntakeOutcome::EmptyBatch => "empty_batch",
        IntakeOutcome::UnknownCommand => "unknown_command",
        IntakeOutcome::Failed => "failed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{Carrier, MessageId, MessageRef, ShipmentStatus, TrackingEvent},
        messaging::{
            port::MessagingPort,
            types::{FormatMode, MessagingCapabilities},
        },
        provider::{GatewayError, TrackingSnapshot},
        store::memory::MemoryStore,
        Result,
    };
    use async_trait::async_trait;
    use std::{
        collections::HashMap,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Mutex,
        },
    };

    #[derive(Default)]
    struct FakeProvider {
        known: HashMap<String, TrackingSnapshot>,
        fetches: AtomicUsize,
    }

    impl FakeProvider {
        fn knowing(numbers: &[&str]) -> Self {
            let known = numbers
                .iter()
                .map(|n| {
                    (
                        n.to_string(),
                        TrackingSnapshot {
                            tracking_number: n.to_string(),
                            carrier: Carrier::Temu,
                            status: ShipmentStatus::InTransit,
                            events: vec![TrackingEvent {
                                occurred_at: None,
                                description: "Accepted by carrier".into(),
                                location: None,
                                status: "10".into(),
                            }],
                        },
                    )
                })
                .collect();
            Self {
                known,
                fetches: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl TrackingProvider for FakeProvider {
        async fn register(&self, _n: &str, _c: Option<Carrier>) -> bool {
            true
        }

        async fn fetch_info(
            &self,
            n: &str,
        ) -> std::result::Result<TrackingSnapshot, GatewayError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.known.get(n).cloned().ok_or(GatewayError::NotFound)
        }
    }

    #[derive(Default)]
    struct FakeMessenger {
        sent: Mutex<Vec<(ChatId, String)>>,
    }

    impl FakeMessenger {
        fn texts(&self) -> Vec<String> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .map(|(_, t)| t.clone())
                .collect()
        }

        fn clear(&self) {
            self.sent.lock().unwrap().clear();
        }
    }

    #[async_trait]
    impl MessagingPort for FakeMessenger {
        fn capabilities(&self) -> MessagingCapabilities {
            MessagingCapabilities {
                supports_html: true,
                max_message_len: 4096,
            }
        }

        async fn send(&self, chat_id: ChatId, text: &str, _mode: FormatMode) -> Result<MessageRef> {
            self.sent.lock().unwrap().push((chat_id, text.to_string()));
            Ok(MessageRef {
                chat_id,
                message_id: MessageId(1),
            })
        }
    }

    struct Harness {
        store: Arc<MemoryStore>,
        provider: Arc<FakeProvider>,
        messenger: Arc<FakeMessenger>,
        intake: IntakeService,
    }

    fn harness(known: &[&str]) -> Harness {
        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(FakeProvider::knowing(known));
        let messenger = Arc::new(FakeMessenger::default());
        let intake = IntakeService::new(
            provider.clone(),
            store.clone(),
            store.clone(),
            Notifier::new(messenger.clone(), Duration::from_secs(1), 4000),
            DialogStates::new(Duration::from_secs(1800), 100),
            Duration::from_secs(1),
        );
        Harness {
            store,
            provider,
            messenger,
            intake,
        }
    }

    fn msg(chat: i64, text: &str) -> InboundMessage {
        InboundMessage {
            chat_id: ChatId(chat),
            sender: SenderProfile {
                user_id: chat,
                username: Some("alice".into()),
                ..Default::default()
            },
            text: text.to_string(),
        }
    }

    fn outcomes(o: &IntakeOutcome) -> Vec<(&str, EntryOutcome)> {
        match o {
            IntakeOutcome::Batch(entries) => entries
                .iter()
                .map(|e| (e.tracking_number.as_str(), e.outcome.clone()))
                .collect(),
            other => panic!("expected batch, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_text_gets_help_prompt_and_records_user() {
        let h = harness(&[]);
        let out = h.intake.handle(msg(1, "banana")).await;

        assert_eq!(out, IntakeOutcome::UnknownCommand);
        assert!(h.messenger.texts()[0].contains("Unknown command"));
        let user = h.store.find(ChatId(1)).await.unwrap().unwrap();
        assert_eq!(user.username.as_deref(), Some("alice"));
        assert_eq!(h.store.shipment_count().await, 0);
        assert_eq!(h.provider.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn start_then_any_text_is_tracking_input() {
        let h = harness(&[]);
        assert_eq!(h.intake.handle(msg(1, "/start")).await, IntakeOutcome::Welcome);
        assert!(h.messenger.texts()[0].contains("Welcome"));

        let out = h.intake.handle(msg(1, "banana")).await;
        assert_eq!(outcomes(&out), vec![("BANANA", EntryOutcome::Invalid)]);

        // Dialog state was consumed by the previous turn.
        let again = h.intake.handle(msg(1, "banana")).await;
        assert_eq!(again, IntakeOutcome::UnknownCommand);
    }

    #[tokio::test]
    async fn start_then_stop_is_tracking_input() {
        let h = harness(&[]);
        h.intake.handle(msg(1, "/start")).await;

        let out = h.intake.handle(msg(1, "/stop")).await;
        assert_eq!(outcomes(&out), vec![("/STOP", EntryOutcome::Invalid)]);

        // Back to idle: the same text is a command again.
        let usage = h.intake.handle(msg(1, "/stop")).await;
        assert_eq!(
            usage,
            IntakeOutcome::StopRejected {
                tracking_number: None
            }
        );
    }

    #[tokio::test]
    async fn batch_mixes_valid_and_invalid_entries() {
        let h = harness(&["YT12345678901", "LB123456789CN"]);
        let out = h
            .intake
            .handle(msg(1, "YT12345678901  , lb123456789cn\nXX999"))
            .await;

        assert_eq!(
            outcomes(&out),
            vec![
                ("YT12345678901", EntryOutcome::Added),
                ("LB123456789CN", EntryOutcome::Added),
                ("XX999", EntryOutcome::Invalid),
            ]
        );

        let texts = h.messenger.texts();
        assert_eq!(texts.len(), 2);
        assert!(texts[0].contains("YT12345678901</b> - Successfully added"));
        assert!(texts[0].contains("Accepted by carrier"));
        assert!(texts[0].contains("XX999</b>: Invalid tracking number format"));
        assert!(texts[1].contains("Add more packages?"));

        let saved = h
            .store
            .find_by_tracking_number("LB123456789CN")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(saved.chat_id, Some(ChatId(1)));
        assert_eq!(saved.status, ShipmentStatus::InTransit);
        assert!(saved.notifications_enabled);

        let user = h.store.find(ChatId(1)).await.unwrap().unwrap();
        assert_eq!(user.tracked_numbers, vec!["YT12345678901", "LB123456789CN"]);
    }

    #[tokio::test]
    async fn re_registration_is_already_tracked() {
        let h = harness(&["YT12345678901"]);
        h.intake.handle(msg(1, "YT12345678901")).await;
        let out = h.intake.handle(msg(2, "yt12345678901")).await;

        assert_eq!(
            outcomes(&out),
            vec![("YT12345678901", EntryOutcome::AlreadyTracked)]
        );
        assert_eq!(h.store.shipment_count().await, 1);
        assert_eq!(h.provider.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unknown_number_reports_fetch_failure() {
        let h = harness(&[]);
        let out = h.intake.handle(msg(1, "YT99999999999")).await;
        assert_eq!(
            outcomes(&out),
            vec![("YT99999999999", EntryOutcome::FetchFailed)]
        );
        assert!(h.messenger.texts()[0].contains("Unable to fetch tracking information"));
        assert_eq!(h.store.shipment_count().await, 0);
    }

    #[tokio::test]
    async fn empty_batch_reprompts_and_keeps_waiting() {
        let h = harness(&[]);
        h.intake.handle(msg(1, "/start")).await;
        assert_eq!(h.intake.handle(msg(1, " , ,")).await, IntakeOutcome::EmptyBatch);
        assert!(h
            .messenger
            .texts()
            .iter()
            .any(|t| t.contains("No tracking number found")));

        let out = h.intake.handle(msg(1, "anything")).await;
        assert!(matches!(out, IntakeOutcome::Batch(_)));
    }

    #[tokio::test]
    async fn help_does_not_change_state() {
        let h = harness(&[]);
        h.intake.handle(msg(1, "/start")).await;
        assert_eq!(h.intake.handle(msg(1, "/help")).await, IntakeOutcome::Help);
        let out = h.intake.handle(msg(1, "banana")).await;
        assert!(matches!(out, IntakeOutcome::Batch(_)));
    }

    #[tokio::test]
    async fn list_shows_only_own_packages() {
        let h = harness(&["YT12345678901", "YT12345678902"]);
        assert_eq!(
            h.intake.handle(msg(1, "/list")).await,
            IntakeOutcome::Listed { count: 0 }
        );
        assert!(h.messenger.texts()[0].contains("No Tracked Packages"));

        h.intake.handle(msg(1, "YT12345678901")).await;
        h.intake.handle(msg(2, "YT12345678902")).await;
        h.messenger.clear();

        assert_eq!(
            h.intake.handle(msg(1, "/list@PackTrackBot")).await,
            IntakeOutcome::Listed { count: 1 }
        );
        let text = &h.messenger.texts()[0];
        assert!(text.contains("YT12345678901"));
        assert!(!text.contains("YT12345678902"));
    }

    #[tokio::test]
    async fn stop_disables_only_owned_shipments() {
        let h = harness(&["YT12345678901"]);
        h.intake.handle(msg(1, "YT12345678901")).await;

        let other = h.intake.handle(msg(2, "/stop YT12345678901")).await;
        assert!(matches!(other, IntakeOutcome::StopRejected { .. }));

        let usage = h.intake.handle(msg(1, "/stop")).await;
        assert_eq!(
            usage,
            IntakeOutcome::StopRejected {
                tracking_number: None
            }
        );

        let out = h.intake.handle(msg(1, "/stop yt12345678901")).await;
        assert_eq!(
            out,
            IntakeOutcome::Stopped {
                tracking_number: "YT12345678901".into()
            }
        );
        assert!(h.store.find_active_for_polling().await.unwrap().is_empty());
    }
}
