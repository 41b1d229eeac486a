//! Event hook registry
//!
//! Multiplexes interpreter events to subscribers. Hooks fire in insertion
//! order within one event kind; removing a hook that was never added is
//! an error.

use crate::errors::{FlatpyError, Result};
use crate::features::trace::domain::{HookFn, HookId, TraceEvent, TraceFrame, TRACE_EVENTS};
use rustc_hash::FxHashMap;
use tracing::trace;

pub struct EventHook {
    hooks: FxHashMap<TraceEvent, Vec<(HookId, HookFn)>>,
    next_id: HookId,
}

impl Default for EventHook {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHook {
    pub fn new() -> Self {
        let mut hooks = FxHashMap::default();
        for event in TRACE_EVENTS {
            hooks.insert(event, Vec::new());
        }
        Self { hooks, next_id: 0 }
    }

    /// Register a hook for one event kind and return its removal id.
    pub fn add_hook(&mut self, event: TraceEvent, hook: impl FnMut(&TraceFrame) + 'static) -> HookId {
        self.next_id += 1;
        let id = self.next_id;
        self.hooks
            .get_mut(&event)
            .expect("registry is pre-populated for every event kind")
            .push((id, Box::new(hook)));
        id
    }

    /// Remove a previously registered hook. Removing a hook that was
    /// never added (or already removed) is an error.
    pub fn del_hook(&mut self, event: TraceEvent, id: HookId) -> Result<()> {
        let hooks = self
            .hooks
            .get_mut(&event)
            .expect("registry is pre-populated for every event kind");
        match hooks.iter().position(|(hook_id, _)| *hook_id == id) {
            Some(index) => {
                let _removed = hooks.remove(index);
                Ok(())
            }
            None => Err(FlatpyError::HookNotRegistered {
                event: event.as_str(),
                id,
            }),
        }
    }

    pub fn on_call(&mut self, hook: impl FnMut(&TraceFrame) + 'static) -> HookId {
        self.add_hook(TraceEvent::Call, hook)
    }

    pub fn on_line(&mut self, hook: impl FnMut(&TraceFrame) + 'static) -> HookId {
        self.add_hook(TraceEvent::Line, hook)
    }

    pub fn on_return(&mut self, hook: impl FnMut(&TraceFrame) + 'static) -> HookId {
        self.add_hook(TraceEvent::Return, hook)
    }

    pub fn on_exception(&mut self, hook: impl FnMut(&TraceFrame) + 'static) -> HookId {
        self.add_hook(TraceEvent::Exception, hook)
    }

    /// Invoke every hook registered for `event`, in insertion order.
    pub fn fire(&mut self, event: TraceEvent, frame: &TraceFrame) {
        let hooks = self
            .hooks
            .get_mut(&event)
            .expect("registry is pre-populated for every event kind");
        if hooks.is_empty() {
            return;
        }
        trace!(event = event.as_str(), function = %frame.function, "firing hooks");
        for (_, hook) in hooks.iter_mut() {
            hook(frame);
        }
    }

    pub fn count(&self, event: TraceEvent) -> usize {
        self.hooks.get(&event).map(|h| h.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.values().all(|h| h.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_hooks_fire_in_insertion_order() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let mut registry = EventHook::new();

        for label in ["first", "second", "third"] {
            let order = Rc::clone(&order);
            registry.on_call(move |_| order.borrow_mut().push(label));
        }

        registry.fire(TraceEvent::Call, &TraceFrame::new("f", 0));
        assert_eq!(*order.borrow(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_hooks_are_scoped_to_their_event() {
        let calls = Rc::new(RefCell::new(0));
        let mut registry = EventHook::new();
        {
            let calls = Rc::clone(&calls);
            registry.on_return(move |_| *calls.borrow_mut() += 1);
        }

        registry.fire(TraceEvent::Call, &TraceFrame::new("f", 0));
        assert_eq!(*calls.borrow(), 0);
        registry.fire(TraceEvent::Return, &TraceFrame::new("f", 0));
        assert_eq!(*calls.borrow(), 1);
    }

    #[test]
    fn test_removing_unregistered_hook_is_an_error() {
        let mut registry = EventHook::new();
        let err = registry.del_hook(TraceEvent::Line, 7).unwrap_err();
        assert!(matches!(
            err,
            FlatpyError::HookNotRegistered { event: "line", id: 7 }
        ));
    }

    #[test]
    fn test_removed_hook_no_longer_fires() {
        let calls = Rc::new(RefCell::new(0));
        let mut registry = EventHook::new();
        let id = {
            let calls = Rc::clone(&calls);
            registry.on_call(move |_| *calls.borrow_mut() += 1)
        };

        registry.del_hook(TraceEvent::Call, id).unwrap();
        registry.fire(TraceEvent::Call, &TraceFrame::new("f", 0));
        assert_eq!(*calls.borrow(), 0);

        // a second removal of the same id is an error
        assert!(registry.del_hook(TraceEvent::Call, id).is_err());
    }
}
