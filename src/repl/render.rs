//! Terminal rendering of a streaming reply
//!
//! Text is written as it arrives. With a live status the current partial
//! line is redrawn in place followed by a dim `N tokens/s` marker; finished
//! lines are committed and never touched again.

use crate::streaming::StreamSink;
use colored::*;
use crossterm::{
    cursor, queue,
    terminal::{self, Clear, ClearType},
};
use indicatif::ProgressBar;
use std::io::{self, Stdout, Write};

/// Columns kept free for the status marker
const STATUS_RESERVE: usize = 20;

/// Fallback width when the terminal size is unknown
const DEFAULT_WIDTH: usize = 80;

/// `StreamSink` that draws the assistant reply on a terminal
pub struct TerminalRenderer<W: Write> {
    out: W,
    live_status: bool,
    width: usize,
    header: Option<String>,
    line: String,
    tokens_per_second: u64,
    /// Bytes of the accumulated text already drawn
    shown: usize,
    started: bool,
    waiting: Option<ProgressBar>,
}

impl TerminalRenderer<Stdout> {
    /// Render to stdout; the status marker is shown only on a terminal
    pub fn stdout(live_status: bool) -> Self {
        use crossterm::tty::IsTty;

        let out = io::stdout();
        let live_status = live_status && out.is_tty();
        let width = terminal::size()
            .map(|(cols, _)| cols as usize)
            .unwrap_or(DEFAULT_WIDTH);

        Self::new(out, live_status).with_width(width)
    }
}

impl<W: Write> TerminalRenderer<W> {
    pub fn new(out: W, live_status: bool) -> Self {
        Self {
            out,
            live_status,
            width: DEFAULT_WIDTH,
            header: None,
            line: String::new(),
            tokens_per_second: 0,
            shown: 0,
            started: false,
            waiting: None,
        }
    }

    pub fn with_width(mut self, width: usize) -> Self {
        self.width = width.max(STATUS_RESERVE * 2);
        self
    }

    /// Line printed before the first delta
    pub fn with_header(mut self, header: impl Into<String>) -> Self {
        self.header = Some(header.into());
        self
    }

    /// Spinner cleared when the first byte of the reply arrives
    pub fn with_waiting(mut self, spinner: ProgressBar) -> Self {
        self.waiting = Some(spinner);
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn stop_waiting(&mut self) {
        if let Some(spinner) = self.waiting.take() {
            spinner.finish_and_clear();
        }
    }

    fn write_header(&mut self) -> io::Result<()> {
        self.stop_waiting();
        if let Some(header) = self.header.take() {
            writeln!(self.out, "{}", header.bold().green())?;
        }
        Ok(())
    }

    fn clear_line(&mut self) -> io::Result<()> {
        queue!(self.out, cursor::MoveToColumn(0), Clear(ClearType::UntilNewLine))
    }

    fn draw_delta(&mut self, text: &str) -> io::Result<()> {
        if !self.live_status {
            write!(self.out, "{}", text)?;
            return self.out.flush();
        }

        self.clear_line()?;

        let mut segments = text.split('\n');
        if let Some(first) = segments.next() {
            self.line.push_str(first);
        }
        for segment in segments {
            writeln!(self.out, "{}", self.line)?;
            self.line.clear();
            self.line.push_str(segment);
        }

        // Hard-wrap so the partial line never spans more than one row
        let room = self.width - STATUS_RESERVE;
        while self.line.chars().count() > room {
            let split = self
                .line
                .char_indices()
                .nth(room)
                .map(|(i, _)| i)
                .unwrap_or(self.line.len());
            let rest = self.line.split_off(split);
            writeln!(self.out, "{}", self.line)?;
            self.line = rest;
        }

        let status = format!("  {} tokens/s", self.tokens_per_second);
        write!(self.out, "{}{}", self.line, status.dimmed())?;
        self.out.flush()
    }

    fn draw_done(&mut self) -> io::Result<()> {
        self.write_header()?;
        if self.live_status {
            self.clear_line()?;
            write!(self.out, "{}", self.line)?;
            self.line.clear();
        }
        writeln!(self.out)?;
        self.out.flush()
    }

    fn draw_error(&mut self, message: &str) -> io::Result<()> {
        self.stop_waiting();
        if self.live_status {
            self.clear_line()?;
            if !self.line.is_empty() {
                writeln!(self.out, "{}", self.line)?;
                self.line.clear();
            }
        } else if self.started {
            writeln!(self.out)?;
        }
        writeln!(self.out, "{} {}", "Error:".red().bold(), message.red())?;
        self.out.flush()
    }
}

impl<W: Write> StreamSink for TerminalRenderer<W> {
    fn on_delta(&mut self, text: &str, tokens_per_second: u64) {
        self.tokens_per_second = tokens_per_second;
        self.started = true;

        let fresh = text.get(self.shown..).unwrap_or_default();
        self.shown = text.len();
        let _ = self.write_header().and_then(|_| self.draw_delta(fresh));
    }

    fn on_done(&mut self, _full_text: &str) {
        let _ = self.draw_done();
    }

    fn on_error(&mut self, message: &str) {
        let _ = self.draw_error(message);
    }
}
