//! A display target that prints to a terminal.

use std::collections::BTreeMap;
use std::io::{self, Stdout, Write};
use std::sync::{Mutex, MutexGuard, PoisonError};

use caption_sync_core::RenderFrame;
use caption_sync_engine::DisplayTarget;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Line {
    text: String,
    is_final: bool,
}

struct Screen<W> {
    out: W,
    lines: BTreeMap<String, Line>,
    stale: bool,
}

/// Prints one line per update, prefixed with the channel name.
///
/// Final lines end with nothing extra; interim lines already carry the
/// provisional marker. Going stale prints a notice once.
pub struct TerminalTarget<W: Write + Send = Stdout> {
    screen: Mutex<Screen<W>>,
}

impl TerminalTarget<Stdout> {
    /// A target writing to stdout.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> TerminalTarget<W> {
    /// A target writing to `out`.
    pub fn new(out: W) -> Self {
        Self {
            screen: Mutex::new(Screen {
                out,
                lines: BTreeMap::new(),
                stale: false,
            }),
        }
    }

    fn screen(&self) -> MutexGuard<'_, Screen<W>> {
        self.screen.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current text of `channel`.
    pub fn line(&self, channel: &str) -> Option<String> {
        self.screen().lines.get(channel).map(|l| l.text.clone())
    }

    /// Whether the last line shown for `channel` was final.
    pub fn is_final(&self, channel: &str) -> Option<bool> {
        self.screen().lines.get(channel).map(|l| l.is_final)
    }

    /// Whether the target is stale.
    pub fn is_stale(&self) -> bool {
        self.screen().stale
    }

    /// Give back the writer.
    pub fn into_inner(self) -> W {
        self.screen
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .out
    }
}

impl<W: Write + Send> DisplayTarget for TerminalTarget<W> {
    fn render(&self, frame: &RenderFrame) {
        let mut screen = self.screen();
        let line = Line {
            text: frame.text.clone(),
            is_final: frame.is_final,
        };
        if screen.lines.get(&frame.channel) == Some(&line) {
            return;
        }
        if let Err(e) = writeln!(screen.out, "[{}] {}", frame.channel, frame.text) {
            tracing::warn!("terminal write failed: {}", e);
        }
        let _ = screen.out.flush();
        screen.lines.insert(frame.channel.clone(), line);
    }

    fn set_stale(&self, stale: bool) {
        let mut screen = self.screen();
        screen.stale = stale;
        if stale {
            let channels: Vec<&str> = screen.lines.keys().map(String::as_str).collect();
            let notice = format!("[{}] (stale)", channels.join(", "));
            if let Err(e) = writeln!(screen.out, "{notice}") {
                tracing::warn!("terminal write failed: {}", e);
            }
            let _ = screen.out.flush();
        }
    }
}
