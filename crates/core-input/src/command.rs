//! Line command parsing.
//!
//! Every stdin line becomes exactly one `ParsedLine`:
//! * plain text replaces the buffer,
//! * `::text` replaces the buffer with `:text` (escape for a leading colon),
//! * `:<command> [args]` maps onto an edit or a command event.
//!
//! Indices are zero-based, matching the numbers printed in the match list.
//! Pure; no side effects.

use core_events::{CommandEvent, EditEvent};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedLine {
    Edit(EditEvent),
    Command(CommandEvent),
}

pub struct CommandParser;

impl CommandParser {
    pub fn parse(raw: &str) -> ParsedLine {
        let line = raw.strip_suffix('\r').unwrap_or(raw);
        let Some(body) = line.strip_prefix(':') else {
            return ParsedLine::Edit(EditEvent::Replace(line.to_string()));
        };
        if body.starts_with(':') {
            return ParsedLine::Edit(EditEvent::Replace(body.to_string()));
        }

        let (name, rest) = match body.split_once(' ') {
            Some((name, rest)) => (name, rest),
            None => (body, ""),
        };
        let parsed = match name {
            "q" | "quit" => Ok(ParsedLine::Command(CommandEvent::Quit)),
            "show" => Ok(ParsedLine::Command(CommandEvent::Show)),
            "next" | "n" => Ok(ParsedLine::Command(CommandEvent::SelectNext)),
            "prev" | "p" => Ok(ParsedLine::Command(CommandEvent::SelectPrev)),
            "append" | "a" => Ok(ParsedLine::Edit(EditEvent::Append(rest.to_string()))),
            "select" | "s" => index(rest, "select").map(|i| cmd(CommandEvent::Select(i))),
            "click" => index(rest, "click").map(|pos| cmd(CommandEvent::Click(pos))),
            "apply" => apply(rest),
            "fix" => fix(rest),
            "splice" => splice(rest),
            "" => Err("empty command".to_string()),
            other => Err(format!("unknown command `:{other}`")),
        };
        parsed.unwrap_or_else(|msg| cmd(CommandEvent::Invalid(msg)))
    }
}

fn cmd(event: CommandEvent) -> ParsedLine {
    ParsedLine::Command(event)
}

fn index(arg: &str, command: &str) -> Result<usize, String> {
    let arg = arg.trim();
    if arg.is_empty() {
        return Err(format!(":{command} needs a number"));
    }
    arg.parse()
        .map_err(|_| format!(":{command} expects a number, got `{arg}`"))
}

// :apply <n> [k]
fn apply(rest: &str) -> Result<ParsedLine, String> {
    let mut parts = rest.split_whitespace();
    let index = index(parts.next().unwrap_or_default(), "apply")?;
    let choice = match parts.next() {
        Some(k) => k
            .parse()
            .map_err(|_| format!(":apply expects a candidate number, got `{k}`"))?,
        None => 0,
    };
    if parts.next().is_some() {
        return Err(":apply takes at most two numbers".to_string());
    }
    Ok(cmd(CommandEvent::Apply { index, choice }))
}

/// Next whitespace-delimited token and the text after its single separator.
fn split_token(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    s.split_once(char::is_whitespace).unwrap_or((s, ""))
}

// :fix <n> <text>; text may be empty to delete the span.
fn fix(rest: &str) -> Result<ParsedLine, String> {
    let (n, text) = split_token(rest);
    let index = index(n, "fix")?;
    Ok(cmd(CommandEvent::ApplyText {
        index,
        text: text.to_string(),
    }))
}

// :splice <start> <end> <text>
fn splice(rest: &str) -> Result<ParsedLine, String> {
    let (start, rest) = split_token(rest);
    let (end, text) = split_token(rest);
    let start = index(start, "splice")?;
    let end = index(end, "splice")?;
    if end < start {
        return Err(format!(":splice range {start}..{end} is reversed"));
    }
    Ok(ParsedLine::Edit(EditEvent::Splice {
        start,
        end,
        text: text.to_string(),
    }))
}
