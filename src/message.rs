//! RFC 1459 / 2812 line grammar: `[':' prefix SP+] command SP* {SP+ arg}* [SP+ ':' trailing]`.
//!
//! Parsing is zero-copy: [`MessageRef`] borrows slices out of the line it was built from.
//! Argument storage is a fixed-capacity array rather than a `Vec` so that parsing a message
//! never allocates.

use nom::bytes::complete::{tag, take_till1};
use nom::character::complete::space1;
use nom::combinator::opt;
use nom::sequence::terminated;
use nom::IResult;

use crate::error::MessageParseError;

/// Maximum number of arguments a single message can carry on the wire.
pub const MAX_ARGS: usize = 15;

/// Fixed-capacity, insertion-ordered list of argument slices.
///
/// Pushing past [`MAX_ARGS`] silently drops the overflow argument rather than
/// corrupting the ones already stored; real servers never emit such lines.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Args<'a> {
    items: [&'a str; MAX_ARGS],
    len: usize,
}

impl<'a> Args<'a> {
    fn new() -> Self {
        Args {
            items: [""; MAX_ARGS],
            len: 0,
        }
    }

    fn push(&mut self, arg: &'a str) {
        if self.len < MAX_ARGS {
            self.items[self.len] = arg;
            self.len += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get(&self, index: usize) -> Option<&'a str> {
        if index < self.len {
            Some(self.items[index])
        } else {
            None
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.items[..self.len].iter().copied()
    }

    pub fn as_slice(&self) -> &[&'a str] {
        &self.items[..self.len]
    }
}

/// A parsed IRC line, borrowing from the input it was parsed out of.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MessageRef<'a> {
    pub prefix: Option<&'a str>,
    pub command: &'a str,
    pub args: Args<'a>,
}

impl<'a> MessageRef<'a> {
    /// Parses a single line (no trailing CR/LF expected — strip those first).
    pub fn parse(line: &'a str) -> Result<Self, MessageParseError> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            return Err(MessageParseError::EmptyMessage);
        }

        if line.starts_with(':') && !line.contains(' ') {
            return Err(MessageParseError::InvalidPrefix(line.to_string()));
        }

        let (rest, prefix) =
            parse_prefix(line).map_err(|_| MessageParseError::InvalidPrefix(line.to_string()))?;
        let (rest, command) = parse_command(rest).map_err(|_| MessageParseError::InvalidCommand)?;
        let args = parse_params(rest);

        Ok(MessageRef {
            prefix,
            command,
            args,
        })
    }

    /// Returns the command's numeric value if it is a 3-digit numeric reply.
    pub fn numeric(&self) -> Option<u16> {
        if self.command.len() == 3 && self.command.bytes().all(|b| b.is_ascii_digit()) {
            self.command.parse().ok()
        } else {
            None
        }
    }
}

fn parse_prefix(input: &str) -> IResult<&str, Option<&str>> {
    let (rest, prefix) = opt(terminated(
        nom::sequence::preceded(tag(":"), take_till1(|c| c == ' ')),
        space1,
    ))(input)?;
    Ok((rest, prefix))
}

fn parse_command(input: &str) -> IResult<&str, &str> {
    take_till1(|c| c == ' ')(input)
}

/// Hand-written parameter walk: consecutive spaces collapse, and the first
/// argument beginning with `:` consumes the remainder of the line verbatim.
fn parse_params(input: &str) -> Args<'_> {
    let mut args = Args::new();
    let mut rest = input;

    loop {
        rest = rest.trim_start_matches(' ');
        if rest.is_empty() {
            break;
        }

        if let Some(trailing) = rest.strip_prefix(':') {
            args.push(trailing);
            break;
        }

        match rest.find(' ') {
            Some(pos) => {
                args.push(&rest[..pos]);
                rest = &rest[pos..];
            }
            None => {
                args.push(rest);
                break;
            }
        }
    }

    args
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ping_no_prefix() {
        let m = MessageRef::parse("PING 123456").unwrap();
        assert_eq!(m.prefix, None);
        assert_eq!(m.command, "PING");
        assert_eq!(m.args.as_slice(), &["123456"]);
    }

    #[test]
    fn privmsg_middle_arg_no_colon() {
        let m = MessageRef::parse(":foo!bar@baz PRIVMSG #channel hi!").unwrap();
        assert_eq!(m.prefix, Some("foo!bar@baz"));
        assert_eq!(m.command, "PRIVMSG");
        assert_eq!(m.args.as_slice(), &["#channel", "hi!"]);
    }

    #[test]
    fn privmsg_trailing_with_comma() {
        let m = MessageRef::parse(":foo!bar@baz PRIVMSG #channel :hello, world!").unwrap();
        assert_eq!(m.args.as_slice(), &["#channel", "hello, world!"]);
    }

    #[test]
    fn isupport_trailing_has_spaces() {
        let m = MessageRef::parse(
            ":foo!bar@baz 005 testnick CHANLIMIT=#:120 :are supported by this server",
        )
        .unwrap();
        assert_eq!(m.args.len(), 3);
        assert_eq!(m.args.get(2), Some("are supported by this server"));
    }

    #[test]
    fn colons_in_host_are_preserved() {
        let m =
            MessageRef::parse(":nick!~ident@00:00:00:00::00 PRIVMSG #some.channel :some message")
                .unwrap();
        assert_eq!(m.prefix, Some("nick!~ident@00:00:00:00::00"));
        assert_eq!(m.args.as_slice(), &["#some.channel", "some message"]);
    }

    #[test]
    fn join_single_trailing_arg() {
        let m = MessageRef::parse(":foo!bar@baz JOIN :#channel").unwrap();
        assert_eq!(m.args.as_slice(), &["#channel"]);
    }

    #[test]
    fn crlf_is_trimmed() {
        let m = MessageRef::parse("PING :irc.example.com\r\n").unwrap();
        assert_eq!(m.args.as_slice(), &["irc.example.com"]);
    }

    #[test]
    fn numeric_command_is_text() {
        let m = MessageRef::parse(":irc.example.com 001 nick :Welcome").unwrap();
        assert_eq!(m.command, "001");
        assert_eq!(m.numeric(), Some(1));
    }

    #[test]
    fn empty_line_is_rejected() {
        assert!(matches!(
            MessageRef::parse(""),
            Err(MessageParseError::EmptyMessage)
        ));
    }

    #[test]
    fn missing_space_after_prefix_is_rejected() {
        assert!(MessageRef::parse(":onlyprefix").is_err());
    }

    #[test]
    fn arg_overflow_is_capped_not_corrupted() {
        let many = (0..20).map(|i| i.to_string()).collect::<Vec<_>>().join(" ");
        let line = format!("CMD {}", many);
        let m = MessageRef::parse(&line).unwrap();
        assert_eq!(m.args.len(), MAX_ARGS);
        assert_eq!(m.args.get(0), Some("0"));
        assert_eq!(
            m.args.get(MAX_ARGS - 1),
            Some((MAX_ARGS - 1).to_string().as_str())
        );
    }
}
