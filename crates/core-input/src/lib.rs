//! Terminal input service feeding the shortcut engine.
//!
//! Wraps `crossterm::EventStream` in a Tokio task that translates terminal
//! key events into `InputEvent::KeyDown` / `InputEvent::KeyUp` and forwards
//! them over an mpsc channel to the runtime loop.

mod async_service;
mod key_token;

pub use async_service::AsyncInputShutdown;

use async_service::spawn_async_event_task;
use core_events::Event;
use tokio::task::JoinHandle;

/// Spawn the async input service backed by `crossterm::EventStream`.
///
/// Returns the `JoinHandle` for the background task alongside a shutdown handle
/// that can be used to request immediate termination.
pub fn spawn_async_input(
    sender: tokio::sync::mpsc::Sender<Event>,
) -> (JoinHandle<()>, AsyncInputShutdown) {
    spawn_async_event_task(sender)
}
