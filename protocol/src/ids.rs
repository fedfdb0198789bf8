//! Wall-clock timestamps and time-plus-random identifiers.
//!
//! Ids look like `card_1718000000000_k3j9x0a2b`: a prefix, the creation
//! time in epoch milliseconds, and a random lowercase base-36 suffix. This
//! is unique enough for one device minting a handful of cards and requests
//! per millisecond. It is not a cross-device uniqueness guarantee.

use rand::Rng;

use crate::config::ID_SUFFIX_LENGTH;

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Current Unix time in milliseconds.
pub fn now_millis() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or_default()
}

/// Random lowercase base-36 string of `len` characters.
pub fn random_suffix(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect()
}

/// Mint a `<prefix>_<epoch-ms>_<suffix>` identifier.
pub fn generate_id(prefix: &str) -> String {
    format!(
        "{}_{}_{}",
        prefix,
        now_millis(),
        random_suffix(ID_SUFFIX_LENGTH)
    )
}
