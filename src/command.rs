//! Observer commands that call back into scripting code.
//!
//! Native code keeps commands alive and fires them on events. The bridge
//! only tracks them weakly so that, at teardown, it can detach every command
//! still alive: a command fired after the bridge is gone does nothing.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::debug;

use objbridge_core::{BridgeResult, Value};

/// Callback run by a [`Command`]: event name and call data.
pub type CommandFn = Box<dyn Fn(&str, &Value) -> BridgeResult<()>>;

/// A native-side observer forwarding events to a scripting callable.
pub struct Command {
    callback: RefCell<Option<CommandFn>>,
}

impl Command {
    /// Create a command around a callback.
    pub fn new<F>(callback: F) -> Rc<Self>
    where
        F: Fn(&str, &Value) -> BridgeResult<()> + 'static,
    {
        Rc::new(Self {
            callback: RefCell::new(Some(Box::new(callback))),
        })
    }

    /// Fire the command. Returns `Ok(false)` once the command is detached.
    ///
    /// The callback may fire other commands but must not re-fire this one.
    pub fn execute(&self, event: &str, call_data: &Value) -> BridgeResult<bool> {
        let callback = self.callback.borrow();
        match callback.as_ref() {
            Some(callback) => callback(event, call_data).map(|()| true),
            None => Ok(false),
        }
    }

    /// Whether the callback has been dropped.
    pub fn is_detached(&self) -> bool {
        self.callback.borrow().is_none()
    }

    /// Take the callback out; the command becomes a no-op.
    pub fn detach(&self) -> Option<CommandFn> {
        self.callback.borrow_mut().take()
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("detached", &self.is_detached())
            .finish()
    }
}

/// Weak list of registered commands.
#[derive(Debug, Default)]
pub struct CommandList {
    commands: Vec<Weak<Command>>,
}

impl CommandList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `command`. Dead entries are pruned.
    pub fn register(&mut self, command: &Rc<Command>) {
        self.commands.retain(|c| c.strong_count() > 0);
        self.commands.push(Rc::downgrade(command));
    }

    /// Stop tracking `command`; removes every occurrence.
    pub fn unregister(&mut self, command: &Command) -> bool {
        let before = self.commands.len();
        self.commands
            .retain(|c| c.strong_count() > 0 && !std::ptr::eq(c.as_ptr(), command));
        self.commands.len() != before
    }

    /// Number of tracked entries that are still alive.
    pub fn live_count(&self) -> usize {
        self.commands.iter().filter(|c| c.strong_count() > 0).count()
    }

    /// Detach every live command and forget all entries.
    ///
    /// The detached callbacks are returned so the caller decides when they
    /// are dropped.
    pub fn detach_all(&mut self) -> Vec<CommandFn> {
        let callbacks: Vec<CommandFn> = self
            .commands
            .drain(..)
            .filter_map(|c| c.upgrade())
            .filter_map(|c| c.detach())
            .collect();
        debug!(detached = callbacks.len(), "commands detached");
        callbacks
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    fn counting() -> (Rc<Command>, Rc<Cell<usize>>) {
        let fired = Rc::new(Cell::new(0));
        let command = Command::new({
            let fired = Rc::clone(&fired);
            move |_, _| {
                fired.set(fired.get() + 1);
                Ok(())
            }
        });
        (command, fired)
    }

    #[test]
    fn execute_until_detached() {
        let (command, fired) = counting();
        assert_eq!(command.execute("ModifiedEvent", &Value::None), Ok(true));
        assert_eq!(fired.get(), 1);

        assert!(command.detach().is_some());
        assert_eq!(command.execute("ModifiedEvent", &Value::None), Ok(false));
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn list_is_weak() {
        let mut list = CommandList::new();
        let (command, _) = counting();
        list.register(&command);
        assert_eq!(Rc::strong_count(&command), 1);
        assert_eq!(list.live_count(), 1);

        drop(command);
        assert_eq!(list.live_count(), 0);
    }

    #[test]
    fn unregister_removes_all_occurrences() {
        let mut list = CommandList::new();
        let (a, _) = counting();
        let (b, _) = counting();
        list.register(&a);
        list.register(&a);
        list.register(&b);

        assert!(list.unregister(&a));
        assert_eq!(list.live_count(), 1);
        assert!(!list.unregister(&a));
    }

    #[test]
    fn detach_all_silences_live_commands() {
        let mut list = CommandList::new();
        let (a, fired) = counting();
        let (b, _) = counting();
        list.register(&a);
        list.register(&b);
        drop(b);

        let callbacks = list.detach_all();
        assert_eq!(callbacks.len(), 1);
        assert!(a.is_detached());
        assert_eq!(a.execute("AnyEvent", &Value::Int(1)), Ok(false));
        assert_eq!(fired.get(), 0);
        assert_eq!(list.live_count(), 0);
    }
}
