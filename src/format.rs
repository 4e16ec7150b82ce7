//! Outgoing message formatting and the 512-byte line splitter.
//!
//! The splitting algorithm itself has no teacher counterpart — the
//! teacher's `encode.rs` serializes one full command per call with no
//! chunking — so this module is new, reusing only the zero-copy-writer
//! framing idiom (`"<COMMAND> <target> :"` header, explicit CRLF tail)
//! `encode.rs` already establishes.

/// Total bytes permitted on the wire per line, including the CRLF terminator.
pub const WIRE_LIMIT: usize = 512;

/// Approximates the `nick!user@host` prefix the server prepends when
/// relaying a PRIVMSG/NOTICE to other clients, so the *relayed* copy also
/// fits in [`WIRE_LIMIT`].
pub const RELAY_OVERHEAD: usize = 74;

fn per_command_overhead(command: &str) -> usize {
    if command.eq_ignore_ascii_case("PRIVMSG") || command.eq_ignore_ascii_case("NOTICE") {
        RELAY_OVERHEAD
    } else {
        0
    }
}

/// Bytes of body text ("chunk") that fit after the `"<COMMAND> <target> :"`
/// header, the trailing CRLF, and the per-command relay reservation.
pub fn body_capacity(command: &str, target: &str) -> usize {
    let header_len = command.len() + 1 + target.len() + 2; // "CMD target:"
    let reserved = header_len + 2 /* CRLF */ + per_command_overhead(command);
    WIRE_LIMIT.saturating_sub(reserved)
}

/// Formats a single short write (not subject to chunking), clipping the
/// body to whatever is left of 510 bytes after the command and args.
pub fn format_line(command: &str, args: &[&str]) -> String {
    let mut line = command.to_string();
    if let Some((last, rest)) = args.split_last() {
        for a in rest {
            line.push(' ');
            line.push_str(a);
        }
        line.push(' ');
        line.push(':');
        let remaining = WIRE_LIMIT.saturating_sub(line.len() + 2);
        line.push_str(clip_to_byte_len(last, remaining));
    }
    line.push_str("\r\n");
    line
}

fn floor_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut idx = index;
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn clip_to_byte_len(s: &str, max_len: usize) -> &str {
    &s[..floor_char_boundary(s, max_len)]
}

/// Splits `body` into one or more `PRIVMSG`/`NOTICE`-style lines addressed
/// at `target`, respecting the 512-byte wire limit and any embedded
/// newlines (each newline ends the current line; leading and consecutive
/// newlines are elided).
pub fn split_chat_message(command: &str, target: &str, body: &str) -> Vec<String> {
    let cap = body_capacity(command, target);
    let mut lines = Vec::new();
    let mut rest = body.trim_start_matches(['\r', '\n']);

    while !rest.is_empty() {
        let newline_pos = rest.find(['\r', '\n']);
        let window_end = floor_char_boundary(rest, cap.min(rest.len()));

        let chunk_end = match newline_pos {
            Some(pos) if pos <= window_end => pos,
            _ => window_end,
        };

        let chunk = &rest[..chunk_end];
        lines.push(format!("{command} {target} :{chunk}\r\n"));

        rest = rest[chunk_end..].trim_start_matches(['\r', '\n']);
    }

    lines
}

/// Streaming formatter variant: renders `args` first, then applies the same
/// chunking as [`split_chat_message`].
pub fn sendf(command: &str, target: &str, args: std::fmt::Arguments<'_>) -> Vec<String> {
    split_chat_message(command, target, &std::fmt::format(args))
}
