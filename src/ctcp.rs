//! CTCP payload extraction only — formatting a CTCP reply is out of scope.

/// A CTCP payload: `\x01<tag> <data>\x01`. Only the first payload in a
/// message is surfaced, matching the dispatch table in SPEC_FULL.md §4.5.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CtcpPayload<'a> {
    pub tag: &'a str,
    pub data: &'a str,
}

/// Extracts the first `\x01...\x01`-delimited payload from `body`, if any.
pub fn extract(body: &str) -> Option<CtcpPayload<'_>> {
    let body = body.strip_prefix('\u{0001}')?;
    let end = body.find('\u{0001}').unwrap_or(body.len());
    let payload = &body[..end];
    match payload.split_once(' ') {
        Some((tag, data)) => Some(CtcpPayload { tag, data }),
        None => Some(CtcpPayload {
            tag: payload,
            data: "",
        }),
    }
}
