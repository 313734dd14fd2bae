//! §4.7.1: a short, greppable tag embedded in both the user-facing error
//! text and the `tracing::error!` line logged alongside it.

use chrono::{DateTime, Utc};

const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Base-36, lower-case rendering of `at`'s Unix millisecond timestamp.
pub fn reference_code(at: DateTime<Utc>) -> String {
    let mut millis = at.timestamp_millis().max(0) as u128;
    if millis == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while millis > 0 {
        let digit = (millis % 36) as usize;
        digits.push(ALPHABET[digit]);
        millis /= 36;
    }
    digits.reverse();
    String::from_utf8(digits).expect("base36 alphabet is ASCII")
}
