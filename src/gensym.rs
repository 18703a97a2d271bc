//! Hygiene name generation.
//!
//! A process-wide monotonic counter rendered in base-36: fresh names never
//! collide with user source because the reader independently rejects any
//! plain symbol shaped like one.

use std::sync::atomic::{AtomicUsize, Ordering};

use once_cell::sync::Lazy;
use regex::Regex;

static COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Matches the shape of a name this module could have generated: a
/// non-empty prefix, an underscore, then a non-empty run of base-36
/// digits. Ordinary underscore_separated words (`user_name`, `test_case`)
/// have a final segment with the same alphabet but no digit in it, so the
/// digit requirement is enforced separately in `looks_like_gensym` rather
/// than folded into this pattern.
pub static GENSYM_SHAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^.+_([0-9a-z]+)$").expect("static gensym regex is valid"));

fn to_base36(mut n: usize) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut buf = Vec::new();
    while n > 0 {
        buf.push(DIGITS[n % 36]);
        n /= 36;
    }
    buf.reverse();
    String::from_utf8(buf).expect("base-36 digits are ASCII")
}

/// Returns the next fresh base-36 tag. Callers combine it with the
/// original parameter name (`name_<gensym>`); this function only owns the
/// counter.
pub fn next() -> String {
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    to_base36(n)
}

/// Builds a fresh name from an original parameter name, per the hygiene
/// rename scheme.
pub fn fresh_name(original: &str) -> String {
    format!("{}_{}", original, next())
}

/// True if `name` has the shape this module's output has — used by the
/// reader to reject the name outright, independent of whether it was
/// actually produced here.
pub fn looks_like_gensym(name: &str) -> bool {
    let Some(caps) = GENSYM_SHAPE.captures(name) else {
        return false;
    };
    let suffix = &caps[1];
    // A real tag always has at least one digit somewhere in it (`to_base36`
    // only omits digits entirely for the narrow range of single-letter
    // outputs); requiring one keeps plain underscore_separated words like
    // `user_name` or `test_case` from being rejected as reserved.
    if !suffix.bytes().any(|b| b.is_ascii_digit()) {
        return false;
    }
    // `to_base36` never zero-pads: a leading '0' is only valid when the
    // whole suffix is exactly "0".
    if suffix.len() > 1 && suffix.starts_with('0') {
        return false;
    }
    true
}
