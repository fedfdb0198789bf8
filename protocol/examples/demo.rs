//! Interactive CLI demo of the SuiSend offline exchange.
//!
//! Walks through bringing up a (simulated) NFC reader, minting a wallet
//! card, writing it to a tag and reading it on a second phone, then paying
//! over QR while the receiver is offline. The output uses ANSI escape codes
//! for colored, storytelling-style terminal rendering.
//!
//! Run with:
//!   cargo run --example demo
//!
//! Set `RUST_LOG=suisend_protocol=debug` to watch the protocol's own events.

use std::sync::Arc;
use std::time::Instant;

use suisend_protocol::card::{CardLifecycleManager, CardMode};
use suisend_protocol::exchange::{QrExchange, ScanOutcome};
use suisend_protocol::logging::{init_logging, LogFormat};
use suisend_protocol::tag::{SimulatedReader, SimulatedTag, TagSessionController};
use suisend_protocol::wallet::{AppMode, InMemoryWallet, WalletContext};

// ---------------------------------------------------------------------------
// ANSI color constants
// ---------------------------------------------------------------------------

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";

const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const BLUE: &str = "\x1b[34m";
const CYAN: &str = "\x1b[36m";
const WHITE: &str = "\x1b[37m";

const BG_BLUE: &str = "\x1b[44m";

// ---------------------------------------------------------------------------
// Display helpers
// ---------------------------------------------------------------------------

fn banner() {
    println!();
    println!("{BG_BLUE}{BOLD}{WHITE}                                                                    {RESET}");
    println!("{BG_BLUE}{BOLD}{WHITE}    SUISEND PROTOCOL  --  Offline Card & QR Demo                    {RESET}");
    println!("{BG_BLUE}{BOLD}{WHITE}    Version 0.1.0  |  NDEF text records + SuiSend_ envelopes v1.0   {RESET}");
    println!("{BG_BLUE}{BOLD}{WHITE}                                                                    {RESET}");
    println!();
}

fn section(num: u32, title: &str) {
    println!();
    println!("{BOLD}{CYAN}===[{YELLOW} Step {num} {CYAN}]=============================================================={RESET}");
    println!("{BOLD}{WHITE}  {title}{RESET}");
    println!("{CYAN}------------------------------------------------------------------------{RESET}");
}

fn subsection(text: &str) {
    println!("{DIM}{CYAN}  >> {text}{RESET}");
}

fn success(text: &str) {
    println!("{GREEN}  [OK] {text}{RESET}");
}

fn info(label: &str, value: &str) {
    println!("{WHITE}  {BOLD}{label}:{RESET} {YELLOW}{value}{RESET}");
}

fn timing(label: &str, elapsed: std::time::Duration) {
    let ms = elapsed.as_secs_f64() * 1000.0;
    println!("{DIM}  [{label}: {ms:.2} ms]{RESET}");
}

fn preview(text: &str) -> String {
    if text.len() <= 64 {
        text.to_string()
    } else {
        format!("{}... ({} bytes)", &text[..64], text.len())
    }
}

#[tokio::main]
async fn main() {
    init_logging("suisend_protocol=warn", LogFormat::Pretty);
    let demo_start = Instant::now();

    banner();

    // -----------------------------------------------------------------------
    // Step 1: Reader bring-up
    // -----------------------------------------------------------------------

    section(1, "NFC Reader Bring-up");
    subsection("Probing two simulated phones for NFC support and starting their readers...");

    let alice_radio = Arc::new(SimulatedReader::new());
    let bob_radio = Arc::new(SimulatedReader::new());
    let alice_nfc = Arc::new(TagSessionController::new(alice_radio.clone()));
    let bob_nfc = Arc::new(TagSessionController::new(bob_radio.clone()));

    let t = Instant::now();
    for (name, controller) in [("Alice", &alice_nfc), ("Bob", &bob_nfc)] {
        if !controller.probe_support().await {
            println!("  {name}'s phone has no NFC; nothing to demo.");
            return;
        }
        controller.start().await.expect("reader starts");
    }
    timing("probe + start x2", t.elapsed());
    success("Both readers active");

    // -----------------------------------------------------------------------
    // Step 2: Mint and write a card
    // -----------------------------------------------------------------------

    section(2, "Wallet Card Creation");
    let alice_wallet = Arc::new(InMemoryWallet::new(
        "0x7d2f9c0e4b1a83f6d5c2e9b0a1f4c7d8e3b6a9f2",
        42.5,
    ));
    let alice_cards = CardLifecycleManager::new(alice_nfc.clone());
    let card = alice_cards
        .create_card_from_wallet(alice_wallet.as_ref(), CardMode::Sender)
        .expect("wallet is loaded");
    info("Card id", &card.id);
    info("Mode", &card.card_mode.to_string());
    info("Balance", &format!("{:.2} SUI", card.balance));

    subsection("Alice holds a blank NTAG215 to her phone...");
    alice_radio.present_tag(SimulatedTag::blank(vec![0x04, 0xA2, 0x2B, 0x11, 0x6C, 0x80]));
    let t = Instant::now();
    let written = alice_cards.write_card_to_tag(&card).await.expect("reader active");
    timing("write", t.elapsed());
    assert!(written);
    success("Card written; session released");

    // -----------------------------------------------------------------------
    // Step 3: Read it elsewhere
    // -----------------------------------------------------------------------

    section(3, "Reading the Card on Another Phone");
    let tag = alice_radio.remove_tag().expect("tag in field");
    info("Tag UID", &tag.handle.id_hex());
    bob_radio.present_tag(tag);

    let bob_cards = CardLifecycleManager::new(bob_nfc.clone());
    match bob_cards.read_card_from_tag().await.expect("reader active") {
        Some(read) => {
            assert_eq!(read, card);
            success(&format!("Bob sees {}'s {} card", read.wallet_address, read.card_mode));
        }
        None => println!("  Tag held no wallet card."),
    }

    subsection("Bob taps his transit card by mistake...");
    bob_radio.present_tag(SimulatedTag::with_message(vec![0x08, 0x11], vec![0xD1, 0x01, 0x01, b'U', 0x00]));
    let foreign = bob_cards.read_card_from_tag().await.expect("reader active");
    assert!(foreign.is_none());
    success("Foreign tag ignored, no error raised");

    // -----------------------------------------------------------------------
    // Step 4: QR payment, receiver offline
    // -----------------------------------------------------------------------

    section(4, "Offline QR Payment");
    let bob_wallet = Arc::new(InMemoryWallet::new("0xb0b", 0.0));
    bob_wallet.set_mode(AppMode::Offline);
    let alice_qr = QrExchange::new(alice_wallet.clone());
    let bob_qr = QrExchange::new(bob_wallet.clone());

    let request = bob_qr
        .payment_request_qr(7.25, Some("Lunch"))
        .expect("request");
    info("Bob shows", &preview(&request));

    let ScanOutcome::PaymentRequest(req) = alice_qr.process_scan(&request).await.expect("scan")
    else {
        unreachable!("Bob's QR is a payment request");
    };
    let payment = alice_qr
        .transaction_qr(req.amount, &req.recipient)
        .expect("payment");
    info("Alice shows", &preview(&payment));

    match bob_qr.process_scan(&payment).await.expect("scan") {
        ScanOutcome::Transaction { data, settlement } => {
            success(&format!(
                "{} applied ({:?}); Bob's balance is now {:.2}",
                data.transaction_id,
                settlement,
                bob_wallet.current_balance()
            ));
        }
        other => println!("  unexpected scan outcome: {other:?}"),
    }

    // -----------------------------------------------------------------------
    // Shutdown
    // -----------------------------------------------------------------------

    section(5, "Shutdown");
    alice_nfc.stop().await;
    bob_nfc.stop().await;
    success("Readers stopped");

    println!();
    println!(
        "  {BOLD}{GREEN}Total demo time: {:.2}s{RESET}  {DIM}{BLUE}(no network was harmed){RESET}",
        demo_start.elapsed().as_secs_f64()
    );
    println!();
}
