use colored::Colorize;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use std::io::{BufRead, IsTerminal, Write};
use supatool_schema::{Confirmation, Confirmer, Prompt, SchemaError, SchemaResult};

/// Asks on the terminal with a single keypress.
///
/// `y` answers yes, `a` answers yes-to-all (when offered), `n`/Enter and any
/// other key answer no. Ctrl-C cancels the run. Without a TTY on stdin a
/// whole line is read instead.
#[derive(Debug, Default)]
pub struct TerminalConfirmer;

impl Confirmer for TerminalConfirmer {
    fn confirm(&mut self, prompt: &Prompt) -> SchemaResult<Confirmation> {
        for line in &prompt.details {
            println!("{line}");
        }
        let choices = if prompt.allow_all { "[y/N/a]" } else { "[y/N]" };
        print!("{} {} ", prompt.message.bold(), choices.dimmed());
        std::io::stdout()
            .flush()
            .map_err(|e| SchemaError::Other(format!("failed to flush stdout: {e}")))?;

        let answer = if std::io::stdin().is_terminal() {
            read_key(prompt.allow_all)
        } else {
            read_line(prompt.allow_all)
        };
        println!();
        answer
    }
}

struct RawMode;

impl RawMode {
    fn enable() -> SchemaResult<Self> {
        terminal::enable_raw_mode()
            .map_err(|e| SchemaError::Other(format!("failed to enter raw mode: {e}")))?;
        Ok(Self)
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

fn read_key(allow_all: bool) -> SchemaResult<Confirmation> {
    let _raw = RawMode::enable()?;
    loop {
        let ev = event::read()
            .map_err(|e| SchemaError::Other(format!("failed to read key: {e}")))?;
        let Event::Key(key) = ev else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }
        return key_answer(key, allow_all);
    }
}

fn key_answer(key: KeyEvent, allow_all: bool) -> SchemaResult<Confirmation> {
    if key.modifiers.contains(KeyModifiers::CONTROL)
        && matches!(key.code, KeyCode::Char('c') | KeyCode::Char('C'))
    {
        return Err(SchemaError::Cancelled);
    }
    Ok(match key.code {
        KeyCode::Char(c) => char_answer(c, allow_all),
        _ => Confirmation::No,
    })
}

fn char_answer(c: char, allow_all: bool) -> Confirmation {
    match c.to_ascii_lowercase() {
        'y' => Confirmation::Yes,
        'a' if allow_all => Confirmation::All,
        _ => Confirmation::No,
    }
}

fn read_line(allow_all: bool) -> SchemaResult<Confirmation> {
    let mut line = String::new();
    let read = std::io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|e| SchemaError::Other(format!("failed to read answer: {e}")))?;
    if read == 0 {
        return Ok(Confirmation::No);
    }
    Ok(line
        .trim()
        .chars()
        .next()
        .map_or(Confirmation::No, |c| char_answer(c, allow_all)))
}
