//! End-to-end integration tests for the SuiSend protocol.
//!
//! These tests drive the public API the way a host app does: probe the
//! reader, start it, mint a card, write it to a tag, read it back on
//! another "phone", and pass payments around as QR text. The NFC radio is
//! the in-memory `SimulatedReader`; everything else is the real code.
//!
//! Each test builds its own controller and reader. No globals, no test
//! ordering dependencies.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use suisend_protocol::card::{CardError, CardLifecycleManager, CardMode};
use suisend_protocol::config::TagSessionConfig;
use suisend_protocol::envelope::{Envelope, EnvelopeCodec, QrTransactionData, TransactionDirection};
use suisend_protocol::exchange::{QrExchange, ScanOutcome, Settlement};
use suisend_protocol::ndef::NdefPayloadCodec;
use suisend_protocol::tag::{
    ControllerState, SimulatedReader, SimulatedTag, TagError, TagSessionController,
};
use suisend_protocol::wallet::{AppMode, InMemoryWallet, WalletContext};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

/// A started controller over a fresh simulated reader.
async fn phone() -> (Arc<SimulatedReader>, Arc<TagSessionController>) {
    let reader = Arc::new(SimulatedReader::new());
    let controller = Arc::new(TagSessionController::new(reader.clone()));
    assert!(controller.probe_support().await, "simulated reader is supported");
    controller.start().await.expect("reader starts");
    (reader, controller)
}

fn transfer(id: &str, amount: f64) -> QrTransactionData {
    QrTransactionData {
        wallet_address: "0xalice".into(),
        amount,
        recipient: Some("0xbob".into()),
        sender: Some("0xalice".into()),
        timestamp: 1_718_000_000_000,
        transaction_id: id.into(),
        signature: None,
        direction: TransactionDirection::Send,
        is_offline: true,
    }
}

// ---------------------------------------------------------------------------
// Card Lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn card_travels_between_phones_on_a_tag() {
    let (writer_reader, writer) = phone().await;
    let (reader_reader, reader) = phone().await;
    let alice = CardLifecycleManager::new(writer);
    let bob = CardLifecycleManager::new(reader);

    let wallet = InMemoryWallet::new("0xABC123", 10.0);
    let card = alice
        .create_card_from_wallet(&wallet, CardMode::Sender)
        .expect("card");

    // Alice taps a blank tag.
    writer_reader.present_tag(SimulatedTag::blank(vec![0x04, 0xA2, 0x2B, 0x11]));
    assert!(alice.write_card_to_tag(&card).await.expect("write"));
    let tag = writer_reader.remove_tag().expect("tag still in field");

    // Bob taps the same tag.
    reader_reader.present_tag(tag);
    let read = bob.read_card_from_tag().await.expect("read");
    assert_eq!(read, Some(card));

    assert!(!alice.controller().has_open_session());
    assert!(!bob.controller().has_open_session());
}

#[tokio::test]
async fn scenario_create_card() {
    let (_, controller) = phone().await;
    let manager = CardLifecycleManager::new(controller);

    let card = manager
        .create_card("0xABC...", CardMode::Sender, 10.0)
        .expect("card");

    let rest = card.id.strip_prefix("card_").expect("card_ prefix");
    let (millis, suffix) = rest.split_once('_').expect("two id segments");
    assert!(!millis.is_empty() && millis.chars().all(|c| c.is_ascii_digit()));
    assert!((6..=9).contains(&suffix.len()));
    assert!(suffix.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    assert_eq!(card.card_mode, CardMode::Sender);
    assert_eq!(card.balance, 10.0);
}

#[tokio::test]
async fn tag_json_has_exactly_the_card_fields() {
    let (reader, controller) = phone().await;
    let manager = CardLifecycleManager::new(controller);
    reader.present_tag(SimulatedTag::blank(vec![1]));

    let card = manager.create_card("0xabc", CardMode::Receiver, 0.5).expect("card");
    assert!(manager.write_card_to_tag(&card).await.expect("write"));

    let bytes = reader.tag_message().expect("tag written");
    let text = NdefPayloadCodec::decode_text(&bytes).expect("text record");
    let value: serde_json::Value = serde_json::from_str(&text).expect("json");
    let mut keys: Vec<_> = value.as_object().expect("object").keys().cloned().collect();
    keys.sort();
    assert_eq!(keys, ["balance", "cardMode", "id", "timestamp", "walletAddress"]);
}

#[test]
fn scenario_decode_without_record_is_absent() {
    assert_eq!(NdefPayloadCodec::decode(&[]), None);
}

// ---------------------------------------------------------------------------
// Resource Safety
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failing_hardware_never_leaves_a_session_open() {
    let (reader, controller) = phone().await;
    let manager = CardLifecycleManager::new(controller.clone());
    let card = manager.create_card("0xabc", CardMode::Sender, 1.0).expect("card");

    reader.present_tag(SimulatedTag::blank(vec![1]));
    reader.fail_writes(true);
    assert!(!manager.write_card_to_tag(&card).await.expect("absorbed"));
    assert!(!controller.has_open_session());

    reader.fail_writes(false);
    reader.fail_reads(true);
    assert_eq!(manager.read_card_from_tag().await.expect("absorbed"), None);
    assert!(!controller.has_open_session());

    reader.present_tag(SimulatedTag::blank(vec![2]).locked());
    reader.fail_reads(false);
    assert!(!manager.write_card_to_tag(&card).await.expect("absorbed"));
    assert!(!controller.has_open_session());
    assert!(!reader.technology_outstanding());
    assert_eq!(controller.state(), ControllerState::Active);
}

#[tokio::test(start_paused = true)]
async fn acquisition_timeout_propagates_and_releases() {
    let reader = Arc::new(SimulatedReader::new());
    let config = TagSessionConfig {
        session_timeout_ms: 2_000,
        ..TagSessionConfig::default()
    };
    let controller = Arc::new(TagSessionController::with_config(reader.clone(), config));
    assert!(controller.probe_support().await);
    controller.start().await.expect("start");
    let manager = CardLifecycleManager::new(controller.clone());

    // No tag is ever presented.
    let err = manager.read_card_from_tag().await.unwrap_err();
    assert!(matches!(
        err,
        CardError::Tag(TagError::SessionAcquisitionTimeout { timeout_ms: 2_000 })
    ));
    assert!(!controller.has_open_session());
    assert!(!reader.technology_outstanding());
}

#[tokio::test]
async fn busy_reader_rejects_a_second_operation() {
    let (reader, controller) = phone().await;
    let manager = CardLifecycleManager::new(controller.clone());
    reader.present_tag(SimulatedTag::blank(vec![1]));

    controller.open_session().await.expect("first session");
    let card = manager.create_card("0xabc", CardMode::Sender, 1.0).expect("card");
    assert!(matches!(
        manager.write_card_to_tag(&card).await,
        Err(CardError::Tag(TagError::SessionBusy))
    ));
    assert!(controller.has_open_session(), "first session untouched");
    assert_eq!(reader.technology_requests(), 1);

    controller.close_session().await;
    assert!(manager.write_card_to_tag(&card).await.expect("write"));
}

#[tokio::test]
async fn concurrent_writers_are_serialized_by_rejection() {
    let (reader, controller) = phone().await;
    let manager = Arc::new(CardLifecycleManager::new(controller.clone()));
    let card = manager.create_card("0xabc", CardMode::Sender, 1.0).expect("card");

    // Both writers wait for the same tag; only one may hold the reader.
    let first = {
        let manager = manager.clone();
        let card = card.clone();
        tokio::spawn(async move { manager.write_card_to_tag(&card).await })
    };
    tokio::task::yield_now().await;
    let second = manager.write_card_to_tag(&card).await;
    assert!(matches!(second, Err(CardError::Tag(TagError::SessionBusy))));

    reader.present_tag(SimulatedTag::blank(vec![1]));
    assert!(first.await.expect("join").expect("write"));
    assert!(!controller.has_open_session());
}

#[tokio::test(start_paused = true)]
async fn scenario_hung_probe_is_unsupported() {
    let reader = Arc::new(SimulatedReader::new());
    reader.hang_probe(true);
    let controller = TagSessionController::new(reader);

    assert!(!controller.probe_support().await);
    assert!(!controller.is_supported());
    assert_eq!(controller.start().await, Err(TagError::UnsupportedHardware));
}

#[tokio::test]
async fn stop_tears_everything_down() {
    let (reader, controller) = phone().await;
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let _token = controller
        .register_tag_listener(Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }))
        .await
        .expect("listener");

    reader.present_tag(SimulatedTag::blank(vec![1]));
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    controller.stop().await;
    assert!(!controller.is_initialized());
    assert!(!reader.has_listener());
    assert!(!reader.is_started());

    reader.present_tag(SimulatedTag::blank(vec![2]));
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    let manager = CardLifecycleManager::new(controller);
    assert!(matches!(
        manager.read_card_from_tag().await,
        Err(CardError::Tag(TagError::NotInitialized))
    ));
}

// ---------------------------------------------------------------------------
// QR Envelopes
// ---------------------------------------------------------------------------

#[test]
fn scenario_payment_request() {
    let codec = EnvelopeCodec::new();
    let text = codec
        .encode_payment_request(25.0, "0xDEF...", Some("Lunch"))
        .expect("encode");
    let parsed = codec.parse(&text).expect("recognized");
    assert_eq!(parsed.envelope_type, "SuiSend_PaymentRequest");

    let Envelope::PaymentRequest(request) = parsed.into_envelope().expect("valid") else {
        panic!("expected a payment request");
    };
    assert_eq!(request.amount, 25.0);
    let rest = request.id.strip_prefix("req_").expect("req_ prefix");
    let (millis, suffix) = rest.split_once('_').expect("two id segments");
    assert!(millis.chars().all(|c| c.is_ascii_digit()));
    assert!(!suffix.is_empty());
}

#[test]
fn scenario_bundle_order() {
    let codec = EnvelopeCodec::new();
    let txs = [transfer("tx_1_a", 1.0), transfer("tx_2_b", 2.0), transfer("tx_3_c", 3.0)];
    let parsed = codec
        .parse(&codec.encode_bundle(&txs).expect("encode"))
        .expect("recognized");

    let Envelope::TransactionBundle(bundle) = parsed.into_envelope().expect("valid") else {
        panic!("expected a bundle");
    };
    assert_eq!(bundle.total_transactions, 3);
    assert_eq!(bundle.transactions, txs);
}

#[test]
fn transaction_round_trip_through_text() {
    let codec = EnvelopeCodec::new();
    let tx = transfer("tx_1718000000000_k3j9x0a2b", 0.1 + 0.2);
    let parsed = codec
        .parse(&codec.encode_transaction(&tx).expect("encode"))
        .expect("recognized");
    assert_eq!(parsed.envelope_type, "SuiSend_Transaction");
    let back: QrTransactionData = serde_json::from_value(parsed.data).expect("shape");
    assert_eq!(back, tx);
}

#[test]
fn foreign_qr_content_is_rejected() {
    let codec = EnvelopeCodec::new();
    assert!(codec.parse(r#"{"type":"Other_Thing","data":{}}"#).is_none());
    assert!(codec.parse("not json").is_none());
}

#[tokio::test]
async fn offline_payment_is_queued_then_settles() {
    let alice = QrExchange::new(Arc::new(InMemoryWallet::new("0xalice", 20.0)));
    let bob_wallet = Arc::new(InMemoryWallet::new("0xbob", 0.0));
    bob_wallet.set_mode(AppMode::Offline);
    let bob = QrExchange::new(bob_wallet.clone());

    // Bob asks, Alice pays.
    let request_qr = bob.payment_request_qr(5.0, Some("coffee")).expect("request");
    let ScanOutcome::PaymentRequest(request) = alice.process_scan(&request_qr).await.expect("scan")
    else {
        panic!("expected a payment request");
    };
    let payment_qr = alice
        .transaction_qr(request.amount, &request.recipient)
        .expect("payment");

    let outcome = bob.process_scan(&payment_qr).await.expect("scan");
    assert!(matches!(
        outcome,
        ScanOutcome::Transaction { settlement: Settlement::Queued, .. }
    ));
    assert_eq!(bob_wallet.current_balance(), 5.0);
    assert_eq!(bob_wallet.applied().len(), 1);
}
