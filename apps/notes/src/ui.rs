//! Line-oriented terminal front end: parses commands into intents and renders
//! view-state snapshots.

use std::fmt::Write as _;

use client_core::{DraftField, Intent, SessionPhase, ViewState};

pub const HELP: &str = "\
commands:
  name <text>     set the draft name
  desc <text>     set the draft description
  create          create a note from the draft
  toggle <n>      mark note n complete / incomplete
  delete <n>      delete note n
  list            show notes
  help            show this help
  quit            exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SetDraft(DraftField, String),
    Create,
    Toggle(usize),
    Delete(usize),
    List,
    Help,
    Quit,
}

pub fn parse_command(line: &str) -> Result<Command, String> {
    let line = line.trim();
    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };

    match verb.to_ascii_lowercase().as_str() {
        "name" | "desc" | "description" => {
            let field = verb
                .parse::<DraftField>()
                .map_err(|err| err.to_string())?;
            Ok(Command::SetDraft(field, rest.to_string()))
        }
        "create" | "add" => Ok(Command::Create),
        "toggle" | "done" => parse_position(rest).map(Command::Toggle),
        "delete" | "rm" => parse_position(rest).map(Command::Delete),
        "list" | "ls" | "" => Ok(Command::List),
        "help" | "?" => Ok(Command::Help),
        "quit" | "exit" | "q" => Ok(Command::Quit),
        other => Err(format!("unknown command: {other} (try `help`)")),
    }
}

fn parse_position(raw: &str) -> Result<usize, String> {
    match raw.parse::<usize>() {
        Ok(position) if position > 0 => Ok(position),
        _ => Err(format!("expected a note number, got '{raw}'")),
    }
}

/// Maps a command onto a session intent using the positions shown in `view`.
/// `Ok(None)` means the command is handled by the front end alone.
pub fn to_intent(command: Command, view: &ViewState) -> Result<Option<Intent>, String> {
    let note_at = |position: usize| {
        position
            .checked_sub(1)
            .and_then(|index| view.notes.get(index))
            .map(|note| note.id.clone())
            .ok_or_else(|| format!("no note number {position}"))
    };

    match command {
        Command::SetDraft(field, value) => Ok(Some(Intent::UpdateDraftField { field, value })),
        Command::Create => Ok(Some(Intent::SubmitDraft)),
        Command::Toggle(position) => Ok(Some(Intent::ToggleComplete {
            id: note_at(position)?,
        })),
        Command::Delete(position) => Ok(Some(Intent::Delete {
            id: note_at(position)?,
        })),
        Command::Quit => Ok(Some(Intent::Shutdown)),
        Command::List | Command::Help => Ok(None),
    }
}

pub fn render(view: &ViewState) -> String {
    let mut out = String::new();
    match view.phase() {
        SessionPhase::Loading => out.push_str("loading notes...\n"),
        SessionPhase::Errored => out.push_str("could not load notes from the backend\n"),
        SessionPhase::Ready if view.notes.is_empty() => out.push_str("no notes yet\n"),
        SessionPhase::Ready => {}
    }

    for (index, note) in view.notes.iter().enumerate() {
        let status = if note.completed {
            "completed"
        } else {
            "mark complete"
        };
        let _ = writeln!(
            out,
            "{:>3}. {} - {} [{status}]",
            index + 1,
            note.name,
            note.description
        );
    }

    let _ = write!(
        out,
        "draft: name='{}' description='{}'",
        view.draft.name, view.draft.description
    );
    out
}

#[cfg(test)]
#[path = "tests/ui_tests.rs"]
mod tests;
