//! Plain-text recovery from archived rich-text message bodies.
//!
//! When the message store has no plain `text` column for a row, the body
//! lives in a versioned, length-prefixed binary archive. The layout is
//! undocumented and varies between OS releases, so decoding is a tiered
//! pattern match: a prioritized list of known marker byte sequences, each
//! tried as a pure `Option<String>` decoder, followed by a bounded
//! heuristic scan. "No recoverable text" is a normal outcome, not an
//! error. Callers drop such rows rather than emit corrupt content.

/// Marker that anchors the text-bearing region of the archive.
const TEXT_ANCHOR: &[u8] = b"NSString";

/// Known byte sequences that immediately precede the length field, in
/// priority order. The first marker that yields a valid decode wins.
const LENGTH_MARKERS: [&[u8]; 4] = [
    &[0x67, 0x01, 0x94, 0x84, 0x01, 0x2b],
    &[0x84, 0x01, 0x2b],
    &[0x01, 0x94, 0x84, 0x01, 0x2b],
    &[0x01, 0x95, 0x84, 0x01, 0x2b],
];

/// Decoded text length must land in this range; anything outside it is a
/// misaligned match and the next candidate is tried.
const MARKER_LENGTH_RANGE: std::ops::RangeInclusive<usize> = 1..=10_000;

/// The heuristic scan probes at most this many offsets past the anchor.
const SCAN_WINDOW: usize = 100;

/// Tentative lengths accepted by the heuristic scan.
const SCAN_LENGTH_RANGE: std::ops::RangeInclusive<usize> = 2..=200;

/// Recover the plain-text payload from an archived rich-text body.
///
/// Returns `None` when the blob is empty, carries no anchor, or no
/// candidate region decodes to usable text. Never panics.
pub fn decode_attributed_body(blob: &[u8]) -> Option<String> {
    if blob.is_empty() {
        return None;
    }
    let anchor = find_from(blob, TEXT_ANCHOR, 0)?;

    LENGTH_MARKERS
        .iter()
        .find_map(|marker| decode_at_marker(blob, anchor, marker))
        .or_else(|| scan_fallback(blob, anchor))
}

/// Attempt a decode anchored at the first occurrence of `marker` at or
/// after `anchor`.
///
/// The byte after the marker is the length descriptor: values below 0x80
/// are the literal text length in bytes; otherwise the low 7 bits count
/// trailing length bytes (1 or 2 supported, little-endian, followed by a
/// one-byte separator). Any other shape means the marker does not apply.
fn decode_at_marker(blob: &[u8], anchor: usize, marker: &[u8]) -> Option<String> {
    let marker_pos = find_from(blob, marker, anchor)?;
    let length_pos = marker_pos + marker.len();
    let length_byte = *blob.get(length_pos)?;

    let (text_len, text_start) = if length_byte >= 0x80 {
        match length_byte & 0x7f {
            1 => {
                if length_pos + 2 >= blob.len() {
                    return None;
                }
                (blob[length_pos + 1] as usize, length_pos + 3)
            }
            2 => {
                if length_pos + 3 >= blob.len() {
                    return None;
                }
                let len = blob[length_pos + 1] as usize | ((blob[length_pos + 2] as usize) << 8);
                (len, length_pos + 4)
            }
            _ => return None,
        }
    } else {
        (length_byte as usize, length_pos + 1)
    };

    if !MARKER_LENGTH_RANGE.contains(&text_len) || text_start + text_len > blob.len() {
        return None;
    }

    let text = std::str::from_utf8(&blob[text_start..text_start + text_len]).ok()?;
    let cleaned = sanitize(text);
    (!cleaned.is_empty()).then_some(cleaned)
}

/// Last-resort decoder: walk offsets just past the anchor, treating each
/// byte as a tentative length and accepting the first candidate that
/// decodes as UTF-8, contains an alphanumeric character, and does not look
/// like an archive-internal token.
fn scan_fallback(blob: &[u8], anchor: usize) -> Option<String> {
    let start = anchor + TEXT_ANCHOR.len();
    let end = (start + SCAN_WINDOW).min(blob.len().saturating_sub(10));

    for pos in start..end {
        let text_len = blob[pos] as usize;
        if !SCAN_LENGTH_RANGE.contains(&text_len) {
            continue;
        }
        let text_start = pos + 1;
        if text_start + text_len > blob.len() {
            continue;
        }
        let Ok(text) = std::str::from_utf8(&blob[text_start..text_start + text_len]) else {
            continue;
        };
        if !text.chars().any(char::is_alphanumeric)
            || text.starts_with("NS")
            || text.starts_with("__")
        {
            continue;
        }
        let cleaned = sanitize(text);
        if cleaned.chars().count() >= 2 {
            return Some(cleaned);
        }
    }
    None
}

/// Strip the candidate down to its message text: control characters end
/// the text (`\n`, `\t`, `\r` are exempt and retained), and surrounding
/// whitespace is trimmed.
fn sanitize(text: &str) -> String {
    let mut cleaned = String::new();
    for ch in text.chars() {
        if matches!(ch, '\n' | '\t' | '\r') || ch as u32 >= 32 {
            cleaned.push(ch);
        } else {
            break;
        }
    }
    cleaned.trim().to_string()
}

fn find_from(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if needle.is_empty() || from >= haystack.len() || haystack.len() - from < needle.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|pos| pos + from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob_with(marker: &[u8], payload: &[u8]) -> Vec<u8> {
        let mut blob = b"bplist\x00".to_vec();
        blob.extend_from_slice(TEXT_ANCHOR);
        blob.extend_from_slice(marker);
        blob.extend_from_slice(payload);
        blob
    }

    #[test]
    fn single_byte_length_decodes() {
        let mut payload = vec![5u8];
        payload.extend_from_slice(b"hello");
        let blob = blob_with(&[0x84, 0x01, 0x2b], &payload);
        assert_eq!(decode_attributed_body(&blob).as_deref(), Some("hello"));
    }

    #[test]
    fn primary_marker_wins() {
        let mut payload = vec![2u8];
        payload.extend_from_slice(b"ok");
        let blob = blob_with(&[0x67, 0x01, 0x94, 0x84, 0x01, 0x2b], &payload);
        assert_eq!(decode_attributed_body(&blob).as_deref(), Some("ok"));
    }

    #[test]
    fn one_trailing_length_byte() {
        // 0x81 = one trailing length byte, then a separator before the text.
        let text = "a".repeat(150);
        let mut payload = vec![0x81, 150, 0x00];
        payload.extend_from_slice(text.as_bytes());
        let blob = blob_with(&[0x84, 0x01, 0x2b], &payload);
        assert_eq!(decode_attributed_body(&blob).as_deref(), Some(text.as_str()));
    }

    #[test]
    fn two_trailing_length_bytes_little_endian() {
        let text = "b".repeat(300);
        let mut payload = vec![0x82, 0x2c, 0x01, 0x00]; // 0x012c = 300
        payload.extend_from_slice(text.as_bytes());
        let blob = blob_with(&[0x84, 0x01, 0x2b], &payload);
        assert_eq!(decode_attributed_body(&blob).as_deref(), Some(text.as_str()));
    }

    #[test]
    fn unsupported_trailing_count_falls_through() {
        // 0x83 would need three trailing bytes; the marker is skipped and
        // nothing else in the blob is decodable.
        let blob = blob_with(&[0x84, 0x01, 0x2b], &[0x83, 0x01, 0x02, 0x03]);
        assert_eq!(decode_attributed_body(&blob), None);
    }

    #[test]
    fn multibyte_utf8_counts_bytes_not_chars() {
        // "héllo" is 6 bytes but 5 characters.
        let text = "héllo";
        let mut payload = vec![text.len() as u8];
        payload.extend_from_slice(text.as_bytes());
        let blob = blob_with(&[0x84, 0x01, 0x2b], &payload);
        assert_eq!(decode_attributed_body(&blob).as_deref(), Some(text));
    }

    #[test]
    fn control_byte_truncates_text() {
        let mut payload = vec![8u8];
        payload.extend_from_slice(b"hi\x00world");
        let blob = blob_with(&[0x84, 0x01, 0x2b], &payload);
        assert_eq!(decode_attributed_body(&blob).as_deref(), Some("hi"));
    }

    #[test]
    fn newline_and_tab_survive_sanitization() {
        let text = "line one\nline two\ttabbed";
        let mut payload = vec![text.len() as u8];
        payload.extend_from_slice(text.as_bytes());
        let blob = blob_with(&[0x84, 0x01, 0x2b], &payload);
        assert_eq!(decode_attributed_body(&blob).as_deref(), Some(text));
    }

    #[test]
    fn missing_anchor_is_undecodable() {
        assert_eq!(decode_attributed_body(b"no marker here at all"), None);
    }

    #[test]
    fn empty_blob_is_undecodable() {
        assert_eq!(decode_attributed_body(&[]), None);
    }

    #[test]
    fn invalid_utf8_at_marker_falls_back_to_scan() {
        // The marker points at invalid UTF-8; a later scan offset holds a
        // plausible length-prefixed string.
        let mut payload = vec![4u8, 0xff, 0xfe, 0xfd, 0xfc];
        payload.extend_from_slice(&[12u8]);
        payload.extend_from_slice(b"found me tho");
        let blob = blob_with(&[0x84, 0x01, 0x2b], &payload);
        assert_eq!(
            decode_attributed_body(&blob).as_deref(),
            Some("found me tho")
        );
    }

    #[test]
    fn scan_rejects_archive_tokens() {
        // A length-prefixed "NSDictionary" must not be mistaken for text.
        let mut blob = TEXT_ANCHOR.to_vec();
        blob.extend_from_slice(&[12u8]);
        blob.extend_from_slice(b"NSDictionary");
        blob.extend_from_slice(&[0u8; 16]);
        assert_eq!(decode_attributed_body(&blob), None);
    }

    #[test]
    fn whitespace_only_candidate_is_undecodable() {
        let mut payload = vec![3u8];
        payload.extend_from_slice(b"   ");
        let blob = blob_with(&[0x84, 0x01, 0x2b], &payload);
        assert_eq!(decode_attributed_body(&blob), None);
    }

    #[test]
    fn oversized_length_is_rejected() {
        // Two-byte length far beyond the blob bounds.
        let blob = blob_with(&[0x84, 0x01, 0x2b], &[0x82, 0xff, 0xff, 0x00, b'x']);
        assert_eq!(decode_attributed_body(&blob), None);
    }
}
