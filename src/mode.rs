//! Incoming MODE-string walking and outgoing MODE-line construction.
//!
//! The incoming walk is adapted from the teacher's `mode::parse::parse_modes`
//! (a `+`/`-` tracking scan that consumes parameters only for modes that take
//! one) to be driven by the connection's live [`IsupportState`] rather than a
//! fixed enum of mode letters, since the set of parameter-taking modes is
//! server-defined via CHANMODES/PREFIX.

use crate::error::ModeParseError;
use crate::isupport::IsupportState;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sign {
    Plus,
    Minus,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModeChange<'a> {
    pub sign: Sign,
    pub mode: char,
    pub arg: Option<&'a str>,
}

/// Walks a MODE string (e.g. `+o-v`) against its parameter list.
///
/// When the parameter list is exhausted mid-string, the last parameter seen
/// is reused for subsequent parameter-taking modes. This is non-standard but
/// matches the documented behavior this crate commits to (see DESIGN.md).
///
/// Returns [`ModeParseError::MissingModeModifier`] if the string doesn't open
/// with a `+`/`-` sign, and [`ModeParseError::InvalidModeModifier`] if it
/// contains a character that is neither a sign nor an ASCII letter.
pub fn parse_mode_changes<'a>(
    isupport: &IsupportState,
    mode_str: &str,
    params: &[&'a str],
) -> Result<Vec<ModeChange<'a>>, ModeParseError> {
    let mut changes = Vec::new();
    let mut sign = None;
    let mut param_idx = 0usize;
    let mut last_param: Option<&'a str> = None;

    for c in mode_str.chars() {
        match c {
            '+' => sign = Some(Sign::Plus),
            '-' => sign = Some(Sign::Minus),
            c if c.is_ascii_alphabetic() => {
                let Some(sign) = sign else {
                    return Err(ModeParseError::MissingModeModifier);
                };
                let adding = sign == Sign::Plus;
                let takes_arg = isupport.mode_takes_arg(c, adding);
                let arg = if takes_arg {
                    let next = params.get(param_idx).copied();
                    if next.is_some() {
                        param_idx += 1;
                    }
                    let arg = next.or(last_param);
                    last_param = arg;
                    arg
                } else {
                    None
                };
                changes.push(ModeChange { sign, mode: c, arg });
            }
            other => return Err(ModeParseError::InvalidModeModifier { modifier: other }),
        }
    }

    Ok(changes)
}

/// Builds one or more `MODE <channel> <sign><modes> <args...>` lines from a
/// sequence of `(mode, argument)` pairs, chunked at `limit` pairs per line.
pub fn build_mode_lines(
    channel: &str,
    sign: char,
    pairs: &[(char, Option<&str>)],
    limit: usize,
) -> Vec<String> {
    let limit = limit.max(1);
    pairs
        .chunks(limit)
        .map(|chunk| {
            let modes: String = chunk.iter().map(|(m, _)| *m).collect();
            let mut line = format!("MODE {channel} {sign}{modes}");
            for (_, arg) in chunk {
                if let Some(a) = arg {
                    line.push(' ');
                    line.push_str(a);
                }
            }
            line
        })
        .collect()
}
