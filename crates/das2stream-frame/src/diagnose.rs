//! Best-effort explanations for malformed input.

use crate::marker::FrameMarker;

/// Explain what the bytes at a lost sync point probably are.
pub fn sync_hint(bytes: &[u8]) -> Option<&'static str> {
    let head: Vec<u8> = bytes
        .iter()
        .take(5)
        .map(u8::to_ascii_lowercase)
        .collect();
    if head.starts_with(b"<htm") || head.starts_with(b"<!do") {
        Some("input looks like an HTML page, probably a server error")
    } else if head.starts_with(b"http") {
        Some("input looks like a raw HTTP response; strip the headers first")
    } else if head.starts_with(b"<?xm") {
        Some("input starts with an XML prolog; das2 headers must be framed with [00] and a length")
    } else {
        None
    }
}

/// Suggest the content length a header should have declared.
///
/// `frame` starts at the header's marker, `payload_start` is where the XML
/// begins, `declared` is the length the header claimed, and `trailing` is
/// the payload-relative position of the content found after the root
/// element. Scans back from `trailing` for the root's closing `>`, then
/// forward for the next frame marker; the distance to that marker is the
/// likely intended length.
pub fn suggest_content_length(
    frame: &[u8],
    payload_start: usize,
    declared: usize,
    trailing: usize,
) -> Option<usize> {
    let expected_end = payload_start + declared;
    let search_end = (payload_start + trailing).min(frame.len());
    let root_end = frame[payload_start..search_end]
        .iter()
        .rposition(|b| *b == b'>')?
        + payload_start
        + 1;

    let marker_offset = (root_end..frame.len().saturating_sub(3))
        .find(|&i| FrameMarker::parse(&frame[i..]).is_some())?;

    (declared + marker_offset).checked_sub(expected_end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_web_responses() {
        assert!(sync_hint(b"<html><body>").unwrap().contains("HTML"));
        assert!(sync_hint(b"<!DOCTYPE html>").unwrap().contains("HTML"));
        assert!(sync_hint(b"HTTP/1.1 500").unwrap().contains("HTTP"));
        assert!(sync_hint(b"<?xml version").unwrap().contains("prolog"));
        assert_eq!(sync_hint(b"garbage"), None);
    }

    #[test]
    fn suggests_length_up_to_next_marker() {
        // Declared 20, real payload is the 10-byte "<stream/>\n".
        let frame = b"[00]000020<stream/>\n[01]000004<xx/>....";
        let suggested = suggest_content_length(frame, 10, 20, 10);
        assert_eq!(suggested, Some(10));
    }

    #[test]
    fn no_marker_no_suggestion() {
        let frame = b"[00]000020<stream/>\n junk junk junk";
        assert_eq!(suggest_content_length(frame, 10, 20, 11), None);
    }
}
