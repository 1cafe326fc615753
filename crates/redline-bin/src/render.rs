//! Frame rendering: annotated buffer, match list, status line.
//!
//! With `color` the highlighted spans are underlined in a per-severity color
//! and the selected span is reversed. Without it (pipes, `NO_COLOR`) spans are
//! bracketed instead: `[span]`, selected `[[span]]`.

use core_analysis::HealthStatus;
use core_model::Severity;
use core_state::Session;
use crossterm::queue;
use crossterm::style::{Attribute, Color, Print, ResetColor, SetAttribute, SetForegroundColor};
use std::io::{self, Write};

pub(crate) struct Frame<'a> {
    pub session: &'a Session,
    pub health: HealthStatus,
    pub notice: Option<&'a str>,
}

fn severity_color(severity: Severity) -> Color {
    match severity {
        Severity::Critical => Color::Red,
        Severity::Warning => Color::Yellow,
        Severity::Info => Color::Blue,
    }
}

pub(crate) fn render<W: Write>(out: &mut W, frame: &Frame<'_>, color: bool) -> io::Result<()> {
    let session = frame.session;

    for segment in session.segments() {
        match (segment.severity, color) {
            (None, _) => queue!(out, Print(&segment.text))?,
            (Some(severity), true) => {
                queue!(
                    out,
                    SetForegroundColor(severity_color(severity)),
                    SetAttribute(Attribute::Underlined)
                )?;
                if segment.selected {
                    queue!(out, SetAttribute(Attribute::Reverse))?;
                }
                queue!(
                    out,
                    Print(&segment.text),
                    SetAttribute(Attribute::Reset),
                    ResetColor
                )?;
            }
            (Some(_), false) if segment.selected => {
                queue!(out, Print(format!("[[{}]]", segment.text)))?
            }
            (Some(_), false) => queue!(out, Print(format!("[{}]", segment.text)))?,
        }
    }
    queue!(out, Print("\n"))?;

    let matches = session.matches();
    let selected = session.selection();
    for (i, m) in matches.iter().enumerate() {
        let marker = if selected == Some(i) { '>' } else { ' ' };
        let covered = session.buffer().slice(m.offset, m.end());
        let mut line = format!(
            "{marker} [{i}] {}..{} {covered:?} {} ({})",
            m.offset,
            m.end(),
            m.label(),
            m.severity().as_str()
        );
        if !m.replacements.is_empty() {
            let candidates: Vec<String> = m
                .replacements
                .iter()
                .enumerate()
                .map(|(k, r)| format!("{k}:{r:?}"))
                .collect();
            line.push_str(" -> ");
            line.push_str(&candidates.join(" "));
        }
        queue!(out, Print(line), Print("\n"))?;
    }

    let status = session.status();
    let count = match status.count() {
        Some(1) => " (1 issue)".to_string(),
        Some(n) => format!(" ({n} issues)"),
        None => String::new(),
    };
    let source = if matches.is_empty() {
        ""
    } else {
        matches.source().as_str()
    };
    let status_line = format!(
        "status: {}{count} | service {} | {} {source}",
        status.label(),
        frame.health.as_str(),
        session.generation(),
    );
    if color {
        queue!(
            out,
            SetAttribute(Attribute::Dim),
            Print(status_line.trim_end()),
            SetAttribute(Attribute::Reset),
            Print("\n")
        )?;
    } else {
        queue!(out, Print(status_line.trim_end()), Print("\n"))?;
    }

    if let Some(notice) = frame.notice {
        queue!(out, Print("! "), Print(notice), Print("\n"))?;
    }
    out.flush()
}
