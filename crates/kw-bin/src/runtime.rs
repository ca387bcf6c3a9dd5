//! Single-threaded event loop driving the shortcut engine.

use crate::shortcuts::{AppCommand, MENU, default_shortcuts};
use anyhow::Result;
use core_actions::{DispatchOutcome, EngineSettings, ShortcutEngine, TimerEvent};
use core_events::{Clock, CommandEvent, Event, InputEvent, KeyPress, KeyToken};
use core_state::Scope;
use core_store::Store;
use core_terminal::TerminalBackend;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{debug, error, info, trace, warn};

pub(crate) const RECOMMEND_INTERVAL_MS: u64 = 30_000;
pub(crate) const TICK_INTERVAL: Duration = Duration::from_millis(100);

const HEADER: &str = "keyward | 1-6 menu  q modal  y/n/x answer tips  ctrl+c quit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ShutdownReason {
    CtrlC,
    CommandQuit,
    ShutdownEvent,
    ChannelClosed,
}

impl ShutdownReason {
    fn as_str(&self) -> &'static str {
        match self {
            ShutdownReason::CtrlC => "ctrl_c",
            ShutdownReason::CommandQuit => "command_quit",
            ShutdownReason::ShutdownEvent => "shutdown_event",
            ShutdownReason::ChannelClosed => "channel_closed",
        }
    }
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn log_shutdown_stage(reason: ShutdownReason, stage: &'static str) {
    info!(
        target: "runtime.shutdown",
        reason = reason.as_str(),
        stage = stage,
        "shutdown_stage"
    );
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LoopControl {
    Continue,
    Break(ShutdownReason),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub(crate) struct StatusSnapshot {
    pub scope: Scope,
    pub pending: Option<String>,
    pub last: String,
    pub tip: Option<String>,
}

impl StatusSnapshot {
    fn lines(&self) -> [String; 4] {
        [
            HEADER.to_string(),
            format!(
                "scope: {}  pending: {}",
                self.scope,
                self.pending.as_deref().unwrap_or("-")
            ),
            self.last.clone(),
            self.tip.clone().unwrap_or_default(),
        ]
    }
}

/// Background tasks the loop owns and tears down on exit.
pub(crate) struct BackgroundTasks {
    pub tx: Option<mpsc::Sender<Event>>,
    pub source_handles: Vec<tokio::task::JoinHandle<()>>,
    pub input_task: Option<tokio::task::JoinHandle<()>>,
    pub input_shutdown: Option<core_input::AsyncInputShutdown>,
}

pub(crate) struct Runtime<B: TerminalBackend> {
    engine: ShortcutEngine,
    clock: Arc<dyn Clock>,
    commands: UnboundedReceiver<AppCommand>,
    backend: B,
    status: StatusSnapshot,
    drawn: Option<StatusSnapshot>,
    last_recommend_ms: u64,
}

impl<B: TerminalBackend> Runtime<B> {
    /// Engine with the default shortcut set registered and initialized, page scope active.
    pub(crate) fn with_defaults(
        settings: EngineSettings,
        clock: Arc<dyn Clock>,
        store: Arc<dyn Store>,
        backend: B,
    ) -> Self {
        let (cmd_tx, commands) = mpsc::unbounded_channel();
        let mut engine = ShortcutEngine::new(settings, Arc::clone(&clock), store);
        for def in default_shortcuts(&cmd_tx) {
            let id = def.id.clone();
            let outcome = engine.register_shortcut(def);
            if !outcome.success {
                warn!(
                    target: "runtime.startup",
                    id = %id,
                    reason = ?outcome.reason,
                    "default_shortcut_rejected"
                );
            }
        }
        for def in engine.unreachable_shortcuts() {
            warn!(
                target: "runtime.startup",
                id = %def.id,
                keys = %def.keys,
                "default_shortcut_unreachable"
            );
        }
        engine.init();
        engine.update_scope(Scope::Page);
        let last_recommend_ms = clock.now_ms();
        let status = StatusSnapshot {
            scope: engine.current_scope(),
            ..StatusSnapshot::default()
        };
        Self {
            engine,
            clock,
            commands,
            backend,
            status,
            drawn: None,
            last_recommend_ms,
        }
    }

    pub(crate) fn status(&self) -> &StatusSnapshot {
        &self.status
    }

    pub(crate) fn engine(&self) -> &ShortcutEngine {
        &self.engine
    }

    pub(crate) async fn run(
        &mut self,
        mut rx: mpsc::Receiver<Event>,
        mut tasks: BackgroundTasks,
    ) -> Result<()> {
        self.render();

        let loop_span = tracing::debug_span!(target: "runtime", "event_loop");
        let _enter_loop = loop_span.enter();

        let mut shutdown_reason = ShutdownReason::ChannelClosed;
        while let Some(event) = rx.recv().await {
            match self.handle_event(&event) {
                LoopControl::Break(reason) => {
                    shutdown_reason = reason;
                    break;
                }
                LoopControl::Continue => self.render(),
            }
        }

        rx.close();
        self.engine.dispose();
        finalize_shutdown(shutdown_reason, &mut tasks).await;
        log_counters();
        Ok(())
    }

    pub(crate) fn handle_event(&mut self, event: &Event) -> LoopControl {
        match event {
            Event::Input(input) => self.handle_input_event(input),
            Event::Command(CommandEvent::Quit) => LoopControl::Break(ShutdownReason::CommandQuit),
            Event::Tick => {
                self.handle_tick();
                LoopControl::Continue
            }
            Event::Shutdown => LoopControl::Break(ShutdownReason::ShutdownEvent),
        }
    }

    fn handle_input_event(&mut self, input: &InputEvent) -> LoopControl {
        match input {
            InputEvent::KeyDown(press) => self.handle_key_down(press),
            InputEvent::KeyUp(press) => self.engine.handle_key_up(press),
            InputEvent::CtrlC => return LoopControl::Break(ShutdownReason::CtrlC),
            InputEvent::Resize(w, h) => {
                trace!(target: "runtime", w, h, "resize_redraw");
                self.drawn = None;
            }
            InputEvent::FocusGained | InputEvent::FocusLost => {}
        }
        LoopControl::Continue
    }

    fn handle_key_down(&mut self, press: &KeyPress) {
        if press.mods.is_empty()
            && let KeyToken::Char(c) = press.token
            && (self.answer_tip(c) || self.pick_menu(c))
        {
            return;
        }

        match self.engine.handle_key_down(press) {
            DispatchOutcome::Dispatched { id } => self.status.last = format!("ran {id}"),
            DispatchOutcome::Unmatched { sequence } => {
                self.status.last = format!("no shortcut for '{sequence}'");
            }
            DispatchOutcome::Pending { .. } | DispatchOutcome::Ignored(_) => {}
        }
        self.status.pending = self.engine.pending_sequence();
        if self.engine.current_recommendation().is_none() {
            self.status.tip = None;
        }
        self.drain_commands();
    }

    /// Tip answers only consume keys while a recommendation is on screen.
    fn answer_tip(&mut self, c: char) -> bool {
        let Some(id) = self
            .engine
            .current_recommendation()
            .map(|candidate| candidate.action_id.clone())
        else {
            return false;
        };
        let handled = match c {
            'y' => self.engine.accept_recommendation(&id),
            'n' => self.engine.dismiss_recommendation(&id, false),
            'x' => self.engine.dismiss_recommendation(&id, true),
            _ => return false,
        };
        if handled {
            self.status.tip = None;
        }
        handled
    }

    /// Numbered menu stands in for mouse clicks: runs the action as a UI pick.
    fn pick_menu(&mut self, c: char) -> bool {
        let Some(index) = c.to_digit(10).map(|d| d as usize) else {
            return false;
        };
        let Some(id) = index.checked_sub(1).and_then(|i| MENU.get(i)) else {
            return false;
        };
        if self.engine.execute_action(id) {
            self.status.last = format!("menu: {id}");
        }
        self.drain_commands();
        true
    }

    fn handle_tick(&mut self) {
        for timer in self.engine.poll_timers() {
            match timer {
                TimerEvent::SequenceTimedOut { sequence } => {
                    self.status.last = format!("'{sequence}' timed out");
                }
                TimerEvent::RecommendationExpired { .. } => self.status.tip = None,
            }
        }
        self.status.pending = self.engine.pending_sequence();

        let now = self.clock.now_ms();
        if now.saturating_sub(self.last_recommend_ms) >= RECOMMEND_INTERVAL_MS {
            self.last_recommend_ms = now;
            match self.engine.try_request_recommendation() {
                Ok(candidate) => {
                    self.status.tip = Some(format!(
                        "tip: press {} to {} (y got it, n later, x never)",
                        candidate.keys,
                        candidate.description.to_lowercase()
                    ));
                }
                Err(reason) => {
                    debug!(target: "runtime", ?reason, "recommendation_withheld");
                }
            }
        }
    }

    fn drain_commands(&mut self) {
        while let Ok(cmd) = self.commands.try_recv() {
            match cmd {
                AppCommand::Notice(text) => self.status.last = text,
                AppCommand::ToggleModal => {
                    let next = if self.engine.current_scope() == Scope::Modal {
                        Scope::Page
                    } else {
                        Scope::Modal
                    };
                    self.engine.update_scope(next);
                }
                AppCommand::CloseModal => {
                    self.engine.update_scope(Scope::Page);
                }
            }
        }
        self.status.scope = self.engine.current_scope();
    }

    fn render(&mut self) {
        if self.drawn.as_ref() == Some(&self.status) {
            return;
        }
        for (row, line) in self.status.lines().iter().enumerate() {
            if let Err(e) = self.backend.write_line(row as u16, line) {
                error!(target: "runtime.render", ?e, "status_write_failed");
                return;
            }
        }
        self.drawn = Some(self.status.clone());
    }
}

async fn finalize_shutdown(reason: ShutdownReason, tasks: &mut BackgroundTasks) {
    log_shutdown_stage(reason, "begin");
    if let Some(tx) = tasks.tx.take() {
        trace!(target: "runtime.shutdown", reason = reason.as_str(), "dropping_runtime_sender");
        drop(tx);
    }

    while let Some(handle) = tasks.source_handles.pop() {
        match tokio::time::timeout(Duration::from_millis(200), handle).await {
            Ok(Ok(_)) => trace!(
                target: "runtime.shutdown",
                reason = reason.as_str(),
                "event_source_task_stopped"
            ),
            Ok(Err(err)) if err.is_cancelled() => trace!(
                target: "runtime.shutdown",
                reason = reason.as_str(),
                "event_source_task_cancelled"
            ),
            Ok(Err(err)) => error!(
                target: "runtime.shutdown",
                reason = reason.as_str(),
                ?err,
                "event_source_task_error"
            ),
            Err(_) => warn!(
                target: "runtime.shutdown",
                reason = reason.as_str(),
                "event_source_task_timeout"
            ),
        }
    }

    if let Some(shutdown) = tasks.input_shutdown.take() {
        trace!(target: "runtime.shutdown", reason = reason.as_str(), "input_task_shutdown_signal");
        shutdown.signal();
    }

    if let Some(handle) = tasks.input_task.take() {
        match handle.await {
            Ok(_) => trace!(
                target: "runtime.shutdown",
                reason = reason.as_str(),
                "input_task_joined"
            ),
            Err(err) if err.is_cancelled() => trace!(
                target: "runtime.shutdown",
                reason = reason.as_str(),
                "input_task_cancelled"
            ),
            Err(err) => error!(
                target: "runtime.shutdown",
                reason = reason.as_str(),
                ?err,
                "input_task_join_failed"
            ),
        }
    }

    log_shutdown_stage(reason, "complete");
}

fn log_counters() {
    info!(
        target: "runtime.shutdown",
        keypresses = core_events::KEYPRESS_TOTAL.load(Ordering::Relaxed),
        suppressed = core_events::KEYPRESS_SUPPRESSED.load(Ordering::Relaxed),
        reserved = core_events::KEYPRESS_RESERVED.load(Ordering::Relaxed),
        dispatched = core_events::SHORTCUTS_DISPATCHED.load(Ordering::Relaxed),
        sequence_timeouts = core_events::SEQUENCE_TIMEOUTS.load(Ordering::Relaxed),
        persist_failures = core_events::PERSIST_FAILURES.load(Ordering::Relaxed),
        "session_counters"
    );
}
