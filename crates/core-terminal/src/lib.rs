//! Terminal backend abstraction and crossterm implementation.
//!
//! Raw mode plus focus reporting; the kitty keyboard protocol is pushed when the
//! terminal supports it so key-up events reach the engine.

use anyhow::Result;
use crossterm::{
    cursor::{Hide, MoveTo, Show},
    event::{
        DisableFocusChange, EnableFocusChange, KeyboardEnhancementFlags,
        PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
    },
    execute, queue,
    style::Print,
    terminal::{
        Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen, SetTitle, disable_raw_mode,
        enable_raw_mode,
    },
};
use std::io::{Write, stdout};

pub mod capabilities;
pub use capabilities::TerminalCapabilities;

pub trait TerminalBackend {
    fn enter(&mut self) -> Result<()>;
    fn leave(&mut self) -> Result<()>;
    fn set_title(&mut self, title: &str) -> Result<()>;
    /// Replace the content of one screen row.
    fn write_line(&mut self, row: u16, text: &str) -> Result<()>;
}

pub struct CrosstermBackend {
    entered: bool,
    enhanced: bool,
    capabilities: TerminalCapabilities,
}

/// RAII guard ensuring terminal state restoration even if caller early-returns or panics.
pub struct TerminalGuard<'a> {
    backend: &'a mut CrosstermBackend,
    active: bool,
}

impl Default for CrosstermBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CrosstermBackend {
    pub fn new() -> Self {
        Self {
            entered: false,
            enhanced: false,
            capabilities: TerminalCapabilities::detect(),
        }
    }

    pub fn capabilities(&self) -> TerminalCapabilities {
        self.capabilities
    }

    /// Enter and return a guard that will leave on drop.
    pub fn enter_guard(&mut self) -> Result<TerminalGuard<'_>> {
        self.enter()?;
        Ok(TerminalGuard {
            backend: self,
            active: true,
        })
    }
}

impl TerminalBackend for TerminalGuard<'_> {
    fn enter(&mut self) -> Result<()> {
        self.active = true;
        self.backend.enter()
    }

    fn leave(&mut self) -> Result<()> {
        self.active = false;
        self.backend.leave()
    }

    fn set_title(&mut self, title: &str) -> Result<()> {
        self.backend.set_title(title)
    }

    fn write_line(&mut self, row: u16, text: &str) -> Result<()> {
        self.backend.write_line(row, text)
    }
}

impl TerminalBackend for CrosstermBackend {
    fn enter(&mut self) -> Result<()> {
        if !self.entered {
            enable_raw_mode()?;
            execute!(stdout(), EnterAlternateScreen, Hide, EnableFocusChange)?;
            if self.capabilities.key_release_events {
                execute!(
                    stdout(),
                    PushKeyboardEnhancementFlags(
                        KeyboardEnhancementFlags::DISAMBIGUATE_ESCAPE_CODES
                            | KeyboardEnhancementFlags::REPORT_EVENT_TYPES
                    )
                )?;
                self.enhanced = true;
            }
            self.entered = true;
        }
        Ok(())
    }

    fn leave(&mut self) -> Result<()> {
        if self.entered {
            if self.enhanced {
                execute!(stdout(), PopKeyboardEnhancementFlags)?;
                self.enhanced = false;
            }
            execute!(stdout(), DisableFocusChange, LeaveAlternateScreen, Show)?;
            disable_raw_mode()?;
            self.entered = false;
        }
        Ok(())
    }

    fn set_title(&mut self, title: &str) -> Result<()> {
        execute!(stdout(), SetTitle(title))?;
        Ok(())
    }

    fn write_line(&mut self, row: u16, text: &str) -> Result<()> {
        let mut out = stdout();
        queue!(out, MoveTo(0, row), Clear(ClearType::CurrentLine), Print(text))?;
        out.flush()?;
        Ok(())
    }
}

impl Drop for CrosstermBackend {
    fn drop(&mut self) {
        let _ = self.leave();
    }
}

impl<'a> Drop for TerminalGuard<'a> {
    fn drop(&mut self) {
        if self.active {
            let _ = self.backend.leave();
        }
    }
}
