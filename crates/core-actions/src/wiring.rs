use std::cell::RefCell;
use std::rc::Rc;

use core_events::InputSource;
use tracing::trace;

use crate::engine::ShortcutEngine;

/// Subscribe `engine` to an input source's key-down and key-up streams.
///
/// The engine borrow is released before the matched action runs.
pub fn attach_input(source: &mut dyn InputSource, engine: Rc<RefCell<ShortcutEngine>>) {
    let down = Rc::clone(&engine);
    source.on_key_down(Box::new(move |press| {
        let dispatch = down.borrow_mut().dispatch_key_down(press);
        let outcome = dispatch.run();
        trace!(target: "input.event", press = %press, ?outcome, "key_down");
    }));
    source.on_key_up(Box::new(move |press| {
        engine.borrow_mut().handle_key_up(press);
    }));
}
