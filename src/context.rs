//! Per-poll activation record of the frame currently being resumed.
//!
//! While a frame polls its computation it installs a fresh [`Activation`] in a
//! thread-local. Awaitables polled inside use it to report what they parked on
//! and to defer callback registration until the frame has parked. Nested
//! frames (a child continuation started eagerly inside a parent's poll) save
//! and restore the outer activation.
//!
//! Deferred registrations run through a per-frame drain queue. A frame woken
//! synchronously from inside one of its own registrations only queues its new
//! registrations; the outermost drain runs them once the current one returns,
//! so a loop of synchronous deliveries does not grow the stack.

use std::cell::RefCell;
use std::collections::VecDeque;

/// What a frame last parked on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Suspension {
    /// A [`CallbackBridge`](crate::CallbackBridge) or an iteration step.
    Bridge,
    /// Another [`Continuation`](crate::Continuation).
    Continuation,
    /// Any other future.
    Foreign,
}

impl Suspension {
    pub(crate) const fn to_u8(self) -> u8 {
        match self {
            Suspension::Bridge => 0,
            Suspension::Continuation => 1,
            Suspension::Foreign => 2,
        }
    }

    pub(crate) const fn from_u8(value: u8) -> Self {
        match value {
            0 => Suspension::Bridge,
            1 => Suspension::Continuation,
            _ => Suspension::Foreign,
        }
    }
}

pub(crate) type Registration = Box<dyn FnOnce()>;

pub(crate) struct Activation {
    suspension: Suspension,
    deferred: Vec<Registration>,
}

impl Activation {
    fn new() -> Self {
        Self {
            suspension: Suspension::Foreign,
            deferred: Vec::new(),
        }
    }

    pub(crate) fn suspension(&self) -> Suspension {
        self.suspension
    }

    /// Run the registrations collected during the poll, in order.
    ///
    /// `owner` identifies the frame that parked. If that frame is already
    /// draining further up this thread's stack, the registrations are queued
    /// behind the running one instead.
    pub(crate) fn run_deferred(self, owner: usize) {
        let deferred = self.deferred;
        let nested = DRAINING.with(|cell| {
            let mut draining = cell.borrow_mut();
            match draining.iter_mut().rfind(|drain| drain.owner == owner) {
                Some(drain) => {
                    drain.queue.extend(deferred);
                    true
                }
                None => {
                    draining.push(Drain {
                        owner,
                        queue: deferred.into(),
                    });
                    false
                }
            }
        });
        if nested {
            return;
        }

        let _guard = DrainGuard { owner };
        while let Some(registration) = next_registration(owner) {
            registration();
        }
    }

    pub(crate) fn has_deferred(&self) -> bool {
        !self.deferred.is_empty()
    }
}

struct Drain {
    owner: usize,
    queue: VecDeque<Registration>,
}

thread_local! {
    static ACTIVE: RefCell<Option<Activation>> = const { RefCell::new(None) };
    static DRAINING: RefCell<Vec<Drain>> = const { RefCell::new(Vec::new()) };
}

fn next_registration(owner: usize) -> Option<Registration> {
    DRAINING.with(|cell| {
        cell.borrow_mut()
            .iter_mut()
            .rfind(|drain| drain.owner == owner)
            .and_then(|drain| drain.queue.pop_front())
    })
}

/// Removes a frame's drain entry, also when a registration unwinds.
struct DrainGuard {
    owner: usize,
}

impl Drop for DrainGuard {
    fn drop(&mut self) {
        let removed = DRAINING.with(|cell| {
            let mut draining = cell.borrow_mut();
            let index = draining
                .iter()
                .rposition(|drain| drain.owner == self.owner)?;
            Some(draining.remove(index))
        });
        // leftover registrations are dropped outside the borrow
        drop(removed);
    }
}

/// Puts the outer activation back, also when the poll unwinds.
struct Restore {
    outer: Option<Activation>,
}

impl Drop for Restore {
    fn drop(&mut self) {
        let outer = self.outer.take();
        ACTIVE.with(|cell| *cell.borrow_mut() = outer);
    }
}

/// Run `f` with a fresh activation installed, returning what it recorded.
pub(crate) fn enter<T>(f: impl FnOnce() -> T) -> (T, Activation) {
    let outer = ACTIVE.with(|cell| cell.replace(Some(Activation::new())));
    let restore = Restore { outer };
    let output = f();
    let activation = ACTIVE
        .with(|cell| cell.take())
        .unwrap_or_else(Activation::new);
    drop(restore);
    (output, activation)
}

/// Record what the current frame is about to park on.
pub(crate) fn mark(suspension: Suspension) {
    ACTIVE.with(|cell| {
        if let Some(activation) = cell.borrow_mut().as_mut() {
            activation.suspension = suspension;
        }
    });
}

/// Defer `registration` until the current frame has parked.
///
/// Outside a frame there is nothing to wait for and the registration runs
/// immediately.
pub(crate) fn defer(registration: Registration) {
    let rejected = ACTIVE.with(|cell| match cell.borrow_mut().as_mut() {
        Some(activation) => {
            activation.deferred.push(registration);
            None
        }
        None => Some(registration),
    });
    if let Some(registration) = rejected {
        registration();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_defer_outside_frame_runs_inline() {
        let ran = Rc::new(Cell::new(false));
        defer(Box::new({
            let ran = Rc::clone(&ran);
            move || ran.set(true)
        }));
        assert!(ran.get());
    }

    #[test]
    fn test_defer_inside_frame_waits_for_run() {
        let ran = Rc::new(Cell::new(0));
        let ((), activation) = enter(|| {
            mark(Suspension::Bridge);
            defer(Box::new({
                let ran = Rc::clone(&ran);
                move || ran.set(ran.get() + 1)
            }));
        });
        assert_eq!(ran.get(), 0);
        assert!(activation.has_deferred());
        assert_eq!(activation.suspension(), Suspension::Bridge);
        activation.run_deferred(1);
        assert_eq!(ran.get(), 1);
    }

    #[test]
    fn test_nested_drain_of_same_owner_is_queued() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let ((), outer) = enter(|| {
            let order = Rc::clone(&order);
            defer(Box::new(move || {
                order.borrow_mut().push("first: start");
                let ((), inner) = enter(|| {
                    let order = Rc::clone(&order);
                    defer(Box::new(move || order.borrow_mut().push("second")));
                });
                inner.run_deferred(7);
                order.borrow_mut().push("first: end");
            }));
        });
        outer.run_deferred(7);
        assert_eq!(
            *order.borrow(),
            vec!["first: start", "first: end", "second"]
        );
        DRAINING.with(|cell| assert!(cell.borrow().is_empty()));
    }

    #[test]
    fn test_drain_of_other_owner_runs_inline() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let ((), outer) = enter(|| {
            let order = Rc::clone(&order);
            defer(Box::new(move || {
                order.borrow_mut().push("first: start");
                let ((), inner) = enter(|| {
                    let order = Rc::clone(&order);
                    defer(Box::new(move || order.borrow_mut().push("second")));
                });
                inner.run_deferred(8);
                order.borrow_mut().push("first: end");
            }));
        });
        outer.run_deferred(7);
        assert_eq!(
            *order.borrow(),
            vec!["first: start", "second", "first: end"]
        );
        DRAINING.with(|cell| assert!(cell.borrow().is_empty()));
    }

    #[test]
    fn test_nested_activation_restores_outer() {
        let ((), outer) = enter(|| {
            mark(Suspension::Continuation);
            let ((), inner) = enter(|| mark(Suspension::Bridge));
            assert_eq!(inner.suspension(), Suspension::Bridge);
        });
        assert_eq!(outer.suspension(), Suspension::Continuation);
    }

    #[test]
    fn test_unmarked_activation_is_foreign() {
        let ((), activation) = enter(|| ());
        assert_eq!(activation.suspension(), Suspension::Foreign);
        assert!(!activation.has_deferred());
    }
}
