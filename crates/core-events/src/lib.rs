//! Core event types and channel helpers for keyward.
//!
//! Everything the shortcut engine consumes from the host lives here: the raw
//! key press model (`KeyPress` + `KeyToken` + `ModMask` + `FocusTarget`), the
//! `InputSource` seam that replaces window-level key listeners, the runtime
//! `Event` enum driven through the binary's event loop, the `Clock` seam and
//! the cancellable `Timers` service used for chord timeouts and
//! recommendation expiry.

use std::fmt;
use std::sync::atomic::AtomicU64;
use tokio::sync::mpsc::Sender;
use tokio::task::JoinHandle;

pub mod clock;
pub mod input;
pub mod timer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use input::{InputSource, KeyHandler, SyntheticInput};
pub use timer::{TimerHandle, Timers};

// -------------------------------------------------------------------------------------------------
// Channel Policy
// -------------------------------------------------------------------------------------------------
// Bounded mpsc channel between the input task / tick source and the single consumer loop. Producers
// await capacity instead of dropping key presses; a dropped chord half is worse than a late one.
// -------------------------------------------------------------------------------------------------
pub const EVENT_CHANNEL_CAP: usize = 1024;

// -------------------------------------------------------------------------------------------------
// Telemetry
// -------------------------------------------------------------------------------------------------
// Relaxed atomic counters, inspected by tests and logged by the binary on shutdown.
// -------------------------------------------------------------------------------------------------
pub static CHANNEL_SEND_FAILURES: AtomicU64 = AtomicU64::new(0);
pub static KEYPRESS_TOTAL: AtomicU64 = AtomicU64::new(0); // key-down events seen by the engine
pub static KEYPRESS_REPEAT: AtomicU64 = AtomicU64::new(0); // key-down events flagged as repeat
pub static KEYPRESS_SUPPRESSED: AtomicU64 = AtomicU64::new(0); // swallowed by the text-entry filter
pub static KEYPRESS_RESERVED: AtomicU64 = AtomicU64::new(0); // dropped by the reserved guard
pub static SHORTCUTS_DISPATCHED: AtomicU64 = AtomicU64::new(0);
pub static SEQUENCE_TIMEOUTS: AtomicU64 = AtomicU64::new(0);
pub static PERSIST_FAILURES: AtomicU64 = AtomicU64::new(0);
pub static ASYNC_INPUT_STARTS: AtomicU64 = AtomicU64::new(0);
pub static ASYNC_INPUT_STOP_SIGNAL: AtomicU64 = AtomicU64::new(0);
pub static ASYNC_INPUT_STOP_CHANNEL: AtomicU64 = AtomicU64::new(0);
pub static ASYNC_INPUT_STOP_STREAM: AtomicU64 = AtomicU64::new(0);
pub static ASYNC_INPUT_STOP_ERROR: AtomicU64 = AtomicU64::new(0);

/// Top-level event enum consumed by the central event loop.
#[derive(Debug, Clone)]
pub enum Event {
    Input(InputEvent),
    Command(CommandEvent),
    /// Periodic monotonic tick used to expire chord timeouts and recommendation timers without
    /// busy polling.
    Tick,
    Shutdown,
}

#[derive(Debug, Clone)]
pub enum CommandEvent {
    Quit,
}

/// Normalized input events delivered by an input task.
#[derive(Debug, Clone)]
pub enum InputEvent {
    /// Key went down (or auto-repeated). Drives dispatch.
    KeyDown(KeyPress),
    /// Key released. Only clears held-key bookkeeping.
    KeyUp(KeyPress),
    /// Terminal resize (columns, rows).
    Resize(u16, u16),
    /// Interrupt surfaced distinctly so the host can always exit, even when a shortcut is bound.
    CtrlC,
    FocusGained,
    FocusLost,
}

// -------------------------------------------------------------------------------------------------
// Async Event Sources
// -------------------------------------------------------------------------------------------------

/// Trait implemented by any async event producer. Implementors hold their configuration and spawn
/// one background task that pushes `Event`s into the shared channel, stopping when the channel
/// closes.
pub trait AsyncEventSource: Send + 'static {
    /// Stable identifier used in logs.
    fn name(&self) -> &'static str;
    /// Consume self and spawn the background task.
    fn spawn(self: Box<Self>, tx: Sender<Event>) -> JoinHandle<()>;
}

/// Registry of event sources spawned together at startup.
pub struct EventSourceRegistry {
    sources: Vec<Box<dyn AsyncEventSource>>,
}

impl Default for EventSourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSourceRegistry {
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    pub fn register<S: AsyncEventSource>(&mut self, src: S) {
        self.sources.push(Box::new(src));
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Spawn all registered sources. Each source receives its own `Sender` clone; the registry is
    /// drained so a second call spawns nothing.
    pub fn spawn_all(&mut self, tx: &Sender<Event>) -> Vec<JoinHandle<()>> {
        let mut out = Vec::with_capacity(self.sources.len());
        for src in self.sources.drain(..) {
            let name = src.name();
            tracing::info!(target: "runtime.events", source = name, "spawning event source");
            out.push(src.spawn(tx.clone()));
        }
        out
    }
}

/// Emits `Event::Tick` every configured interval.
pub struct TickEventSource {
    interval: std::time::Duration,
}

impl TickEventSource {
    pub fn new(interval: std::time::Duration) -> Self {
        Self { interval }
    }
}

impl AsyncEventSource for TickEventSource {
    fn name(&self) -> &'static str {
        "tick"
    }

    fn spawn(self: Box<Self>, tx: Sender<Event>) -> JoinHandle<()> {
        let dur = self.interval;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(dur);
            loop {
                interval.tick().await;
                if tx.send(Event::Tick).await.is_err() {
                    break;
                }
            }
        })
    }
}

// -------------------------------------------------------------------------------------------------
// Key press model
// -------------------------------------------------------------------------------------------------

bitflags::bitflags! {
    /// Modifier flags held during a key press. `CTRL`, `META` and `SUPER` all collapse into the
    /// canonical `mod` prefix when normalized.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct ModMask: u16 {
        const CTRL = 1;
        const ALT = 2;
        const SHIFT = 4;
        const META = 8;
        const SUPER = 16;
    }
}

impl ModMask {
    /// True when a command modifier (ctrl/meta/super) or alt is held. Shift alone does not count:
    /// it is how capital letters reach a text field.
    pub fn has_command_modifier(self) -> bool {
        self.intersects(ModMask::CTRL | ModMask::META | ModMask::SUPER | ModMask::ALT)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamedKey {
    Enter,
    Escape,
    Backspace,
    Tab,
    Space,
    F(u8),
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    Insert,
    Delete,
}

/// Physical modifier keys. A press of one of these on its own never forms a combo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModifierKey {
    Control,
    Alt,
    Shift,
    Meta,
    Super,
}

/// Logical key identity of a press, independent of held modifiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyToken {
    Char(char),
    Named(NamedKey),
    Modifier(ModifierKey),
}

/// Kind of element that had focus when the key went down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FocusTarget {
    /// Page body or any element that does not accept typed text.
    #[default]
    Document,
    Button,
    TextInput,
    TextArea,
    Select,
    ContentEditable,
}

impl FocusTarget {
    /// Whether the target accepts typed text (and therefore owns bare letter keys).
    pub fn is_text_entry(self) -> bool {
        matches!(
            self,
            FocusTarget::TextInput
                | FocusTarget::TextArea
                | FocusTarget::Select
                | FocusTarget::ContentEditable
        )
    }
}

/// A raw key press as delivered by an `InputSource`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyPress {
    pub token: KeyToken,
    pub mods: ModMask,
    pub target: FocusTarget,
    /// Auto-repeat reported by the host. Never synthesized downstream.
    pub repeat: bool,
}

impl KeyPress {
    pub fn new(token: KeyToken) -> Self {
        Self {
            token,
            mods: ModMask::empty(),
            target: FocusTarget::Document,
            repeat: false,
        }
    }

    pub fn char(c: char) -> Self {
        Self::new(KeyToken::Char(c))
    }

    pub fn named(key: NamedKey) -> Self {
        Self::new(KeyToken::Named(key))
    }

    pub fn with_mods(mut self, mods: ModMask) -> Self {
        self.mods = mods;
        self
    }

    pub fn in_target(mut self, target: FocusTarget) -> Self {
        self.target = target;
        self
    }

    pub fn with_repeat(mut self, repeat: bool) -> Self {
        self.repeat = repeat;
        self
    }
}

impl fmt::Display for KeyPress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}{:?}", self.token, self.mods)
    }
}
