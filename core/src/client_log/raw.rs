//! Raw client-log line splitting.
//!
//! Client log lines share a fixed prefix:
//!
//! `2026/08/03 21:15:36 425019843 cffb0719 [INFO Client 9240] <content>`
//!
//! The splitter peels the timestamp off the front, skips the bracketed
//! source tag, and hands the remaining content to the classifier. Lines
//! that do not fit the shape are dropped with a logged parse failure.

use chrono::NaiveDateTime;
use memchr::memchr;

const TIMESTAMP_LEN: usize = 19;
const TIMESTAMP_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// One well-formed log line: when it happened and what it said.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLine {
    pub timestamp: NaiveDateTime,
    pub content: String,
}

/// Split a raw client-log line into timestamp and content.
///
/// Trailing carriage returns are stripped before anything else so the
/// Windows client and a copied-over log behave identically.
pub fn split_line(line: &str) -> Option<RawLine> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    if line.len() <= TIMESTAMP_LEN {
        return None;
    }

    let timestamp = NaiveDateTime::parse_from_str(&line[..TIMESTAMP_LEN], TIMESTAMP_FORMAT)
        .map_err(|err| {
            tracing::debug!("unparseable line timestamp: {err} in {line:?}");
        })
        .ok()?;

    let bytes = line.as_bytes();
    let open = memchr(b'[', bytes)?;
    let close = open + memchr(b']', &bytes[open..])?;
    if close + 1 >= line.len() {
        return None;
    }

    let content = line[close + 1..].strip_prefix(' ').unwrap_or(&line[close + 1..]);
    if content.is_empty() {
        return None;
    }

    Some(RawLine {
        timestamp,
        content: content.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_system_line() {
        let raw = split_line(
            "2026/08/03 21:15:36 425019843 cffb0719 [INFO Client 9240] : You have entered Crimson Temple.",
        )
        .unwrap();
        assert_eq!(raw.content, ": You have entered Crimson Temple.");
        assert_eq!(
            raw.timestamp,
            NaiveDateTime::parse_from_str("2026/08/03 21:15:36", TIMESTAMP_FORMAT).unwrap()
        );
    }

    #[test]
    fn test_split_strips_carriage_return() {
        let raw = split_line(
            "2026/08/03 21:15:36 425019843 cffb0719 [INFO Client 9240] : AFK mode is now ON.\r",
        )
        .unwrap();
        assert_eq!(raw.content, ": AFK mode is now ON.");
    }

    #[test]
    fn test_split_rejects_malformed_lines() {
        assert_eq!(split_line(""), None);
        assert_eq!(split_line("not a log line"), None);
        assert_eq!(split_line("2026/08/03 21:15:36 no bracket block"), None);
        assert_eq!(
            split_line("2026/08/03 21:15:36 425019843 cffb0719 [INFO Client 9240]"),
            None
        );
    }
}
