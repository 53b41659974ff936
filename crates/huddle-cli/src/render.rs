//! Streamed stdout/stderr rendering of session updates.
//!
//! # Output contract
//! - Answer text → stdout
//! - Placeholder, status lines and the `Sources:` line → stderr
//!
//! Failures are not printed here; the caller reports the terminal error.

use std::io::{IsTerminal, Stderr, Stdout, Write, stderr, stdout};

use huddle_core::citation::Citation;
use huddle_core::events::{SessionUpdate, SessionUpdateRx};
use tokio::task::JoinHandle;

/// Clears the current terminal line.
const ERASE_LINE: &str = "\r\x1b[2K";

pub struct AskRenderer<O: Write, E: Write> {
    stdout: O,
    stderr: E,
    /// Placeholder can be erased in place (stderr is a terminal).
    erase_in_place: bool,
    placeholder_shown: bool,
    /// Answer text was written without a trailing newline.
    needs_final_newline: bool,
}

impl Default for AskRenderer<Stdout, Stderr> {
    fn default() -> Self {
        Self::new()
    }
}

impl AskRenderer<Stdout, Stderr> {
    pub fn new() -> Self {
        let erase_in_place = stderr().is_terminal();
        Self::with_writers(stdout(), stderr(), erase_in_place)
    }
}

impl<O: Write, E: Write> AskRenderer<O, E> {
    pub fn with_writers(stdout: O, stderr: E, erase_in_place: bool) -> Self {
        Self {
            stdout,
            stderr,
            erase_in_place,
            placeholder_shown: false,
            needs_final_newline: false,
        }
    }

    pub fn handle_update(&mut self, update: &SessionUpdate) {
        match update {
            SessionUpdate::Started {
                session_id,
                transport,
                ..
            } => {
                tracing::debug!(%session_id, %transport, "rendering session");
            }
            SessionUpdate::Planning { placeholder } => {
                let _ = write!(self.stderr, "{placeholder}");
                let _ = self.stderr.flush();
                self.placeholder_shown = true;
            }
            SessionUpdate::AnswerDelta {
                text,
                cleared_placeholder,
            } => {
                if *cleared_placeholder {
                    self.clear_placeholder();
                }
                self.write_answer(text);
            }
            SessionUpdate::Sources { .. } | SessionUpdate::FallbackStarted => {
                // Citations are listed once the answer is final.
            }
            SessionUpdate::StreamFailed { message } => {
                self.clear_placeholder();
                self.end_answer_line();
                let _ = writeln!(
                    self.stderr,
                    "Stream failed ({message}); retrying without streaming..."
                );
            }
            SessionUpdate::Completed {
                answer,
                citations,
                via_fallback,
            } => {
                self.clear_placeholder();
                if *via_fallback {
                    self.end_answer_line();
                    self.write_answer(answer);
                }
                self.end_answer_line();
                if !citations.is_empty() {
                    let _ = writeln!(self.stderr, "Sources: {}", format_sources(citations));
                }
            }
            SessionUpdate::Failed { .. } => {
                self.clear_placeholder();
                self.end_answer_line();
            }
        }
    }

    fn write_answer(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let _ = write!(self.stdout, "{text}");
        let _ = self.stdout.flush();
        self.needs_final_newline = true;
    }

    fn clear_placeholder(&mut self) {
        if !self.placeholder_shown {
            return;
        }
        self.placeholder_shown = false;
        if self.erase_in_place {
            let _ = write!(self.stderr, "{ERASE_LINE}");
        } else {
            let _ = writeln!(self.stderr);
        }
        let _ = self.stderr.flush();
    }

    fn end_answer_line(&mut self) {
        if self.needs_final_newline {
            let _ = writeln!(self.stdout);
            let _ = self.stdout.flush();
            self.needs_final_newline = false;
        }
    }

    /// Leaves both streams on a fresh line.
    pub fn finish(&mut self) {
        self.clear_placeholder();
        self.end_answer_line();
    }
}

fn format_sources(citations: &[Citation]) -> String {
    citations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Spawns a renderer task that consumes updates until the channel closes.
pub fn spawn_renderer_task(mut rx: SessionUpdateRx) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut renderer = AskRenderer::new();

        while let Some(update) = rx.recv().await {
            renderer.handle_update(&update);
        }

        renderer.finish();
    })
}
