//! Injectable input seam.
//!
//! Collaborators subscribe to key-down / key-up through `InputSource` instead
//! of attaching listeners to a host window. `SyntheticInput` is the in-process
//! implementation used by tests and by embedders that already own an event
//! loop.

use crate::KeyPress;

pub type KeyHandler = Box<dyn FnMut(&KeyPress)>;

pub trait InputSource {
    fn on_key_down(&mut self, handler: KeyHandler);
    fn on_key_up(&mut self, handler: KeyHandler);
}

#[derive(Default)]
pub struct SyntheticInput {
    down: Vec<KeyHandler>,
    up: Vec<KeyHandler>,
}

impl SyntheticInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key_down(&mut self, press: &KeyPress) {
        for handler in self.down.iter_mut() {
            handler(press);
        }
    }

    pub fn key_up(&mut self, press: &KeyPress) {
        for handler in self.up.iter_mut() {
            handler(press);
        }
    }

    /// Key down immediately followed by key up.
    pub fn tap(&mut self, press: &KeyPress) {
        self.key_down(press);
        self.key_up(press);
    }

    pub fn subscriber_count(&self) -> usize {
        self.down.len() + self.up.len()
    }
}

impl InputSource for SyntheticInput {
    fn on_key_down(&mut self, handler: KeyHandler) {
        self.down.push(handler);
    }

    fn on_key_up(&mut self, handler: KeyHandler) {
        self.up.push(handler);
    }
}

impl std::fmt::Debug for SyntheticInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyntheticInput")
            .field("down", &self.down.len())
            .field("up", &self.up.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn handlers_receive_presses_in_order() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut input = SyntheticInput::new();
        let down_log = seen.clone();
        input.on_key_down(Box::new(move |p| down_log.borrow_mut().push(format!("down:{p}"))));
        let up_log = seen.clone();
        input.on_key_up(Box::new(move |p| up_log.borrow_mut().push(format!("up:{p}"))));
        assert_eq!(input.subscriber_count(), 2);

        input.tap(&KeyPress::char('j'));
        let seen = seen.borrow();
        assert_eq!(seen.len(), 2);
        assert!(seen[0].starts_with("down:"));
        assert!(seen[1].starts_with("up:"));
    }
}
