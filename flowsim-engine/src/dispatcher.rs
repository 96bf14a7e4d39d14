// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! The virtual-time event dispatcher.
//!
//! Callbacks are kept in a priority queue ordered by `(due time, submission
//! sequence)`, so callbacks due at the same time run in the order in which
//! they were scheduled. Virtual time only advances when [`Dispatcher::step`],
//! [`Dispatcher::run`] or [`Dispatcher::run_until`] take the next callback
//! off the queue.
//!
//! Background callbacks (see [`Dispatcher::schedule_background`]) run like
//! any other callback but are not counted by
//! [`Dispatcher::num_foreground_pending`], so periodic observers can tell
//! whether any real work is left.
//!
//! Cancelled callbacks are removed from the callback table straight away and
//! their queue entries are discarded lazily when they reach the head of the
//! queue.

use std::cell::{Cell, RefCell};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::fmt;
use std::rc::{Rc, Weak};

use flowsim_track::entity::Entity;
use flowsim_track::{set_time, trace};

use crate::types::{SimResult, SimTime};

/// The type of a callback scheduled on the [`Dispatcher`].
pub type Callback = Box<dyn FnOnce(&Dispatcher) -> SimResult>;

struct DispatcherState {
    now: Cell<SimTime>,
    next_seq: Cell<u64>,

    /// Min-heap of `(due time, sequence)` pairs.
    queue: RefCell<BinaryHeap<Reverse<(SimTime, u64)>>>,

    /// Callbacks that have not yet run or been cancelled, keyed by sequence.
    callbacks: RefCell<HashMap<u64, Callback>>,

    /// Sequences of pending callbacks scheduled as background.
    background: RefCell<HashSet<u64>>,
}

/// Single-threaded virtual-time dispatcher
///
/// This is a thin-wrapper (using [`Rc`]) around the real dispatcher state, so
/// that this struct can be cloned and passed around.
#[derive(Clone)]
pub struct Dispatcher {
    pub entity: Rc<Entity>,
    state: Rc<DispatcherState>,
}

impl Dispatcher {
    pub fn new(parent: &Rc<Entity>) -> Self {
        Self {
            entity: Rc::new(Entity::new(parent, "dispatcher")),
            state: Rc::new(DispatcherState {
                now: Cell::new(0),
                next_seq: Cell::new(0),
                queue: RefCell::new(BinaryHeap::new()),
                callbacks: RefCell::new(HashMap::new()),
                background: RefCell::new(HashSet::new()),
            }),
        }
    }

    /// Current virtual time in milliseconds.
    #[must_use]
    pub fn now(&self) -> SimTime {
        self.state.now.get()
    }

    /// Run `callback` once virtual time reaches `now + delay_ms`.
    ///
    /// A delay of zero runs the callback before virtual time advances any
    /// further, after any callbacks already due at the current time.
    pub fn schedule<F>(&self, delay_ms: SimTime, callback: F)
    where
        F: FnOnce(&Dispatcher) -> SimResult + 'static,
    {
        self.push(delay_ms, Box::new(callback));
    }

    /// As [`Dispatcher::schedule`], but returns a [`Timer`] that can be used
    /// to cancel the callback before it runs.
    pub fn schedule_cancellable<F>(&self, delay_ms: SimTime, callback: F) -> Timer
    where
        F: FnOnce(&Dispatcher) -> SimResult + 'static,
    {
        let seq = self.push(delay_ms, Box::new(callback));
        Timer {
            seq,
            state: Rc::downgrade(&self.state),
        }
    }

    /// As [`Dispatcher::schedule`], but the callback is background work
    /// which [`Dispatcher::num_foreground_pending`] does not count.
    pub fn schedule_background<F>(&self, delay_ms: SimTime, callback: F)
    where
        F: FnOnce(&Dispatcher) -> SimResult + 'static,
    {
        let seq = self.push(delay_ms, Box::new(callback));
        self.state.background.borrow_mut().insert(seq);
    }

    fn push(&self, delay_ms: SimTime, callback: Callback) -> u64 {
        let due = self.now().saturating_add(delay_ms);
        let seq = self.state.next_seq.get();
        self.state.next_seq.set(seq + 1);

        self.state.queue.borrow_mut().push(Reverse((due, seq)));
        self.state.callbacks.borrow_mut().insert(seq, callback);
        trace!(self.entity ; "schedule {seq} at {due}ms");
        seq
    }

    /// Number of callbacks that are still waiting to run.
    #[must_use]
    pub fn num_pending(&self) -> usize {
        self.state.callbacks.borrow().len()
    }

    /// Number of callbacks still waiting to run that are not background work.
    #[must_use]
    pub fn num_foreground_pending(&self) -> usize {
        self.num_pending() - self.state.background.borrow().len()
    }

    /// Due time of the next callback that will run, if there is one.
    #[must_use]
    pub fn next_time(&self) -> Option<SimTime> {
        let mut queue = self.state.queue.borrow_mut();
        let callbacks = self.state.callbacks.borrow();
        while let Some(Reverse((due, seq))) = queue.peek().copied() {
            if callbacks.contains_key(&seq) {
                return Some(due);
            }
            // Cancelled
            queue.pop();
        }
        None
    }

    /// Run the next callback, advancing time to its due time first.
    ///
    /// Returns `Ok(false)` when there was nothing left to run.
    pub fn step(&self) -> Result<bool, crate::types::SimError> {
        let Some(due) = self.next_time() else {
            return Ok(false);
        };

        let (seq, callback) = {
            let mut queue = self.state.queue.borrow_mut();
            let Some(Reverse((_, seq))) = queue.pop() else {
                return Ok(false);
            };
            match self.state.callbacks.borrow_mut().remove(&seq) {
                Some(callback) => {
                    self.state.background.borrow_mut().remove(&seq);
                    (seq, callback)
                }
                None => return Ok(false),
            }
        };

        self.advance_to(due);
        trace!(self.entity ; "run {seq}");
        callback(self)?;
        Ok(true)
    }

    /// Run until there are no callbacks left.
    ///
    /// The first callback error stops the run and is returned.
    pub fn run(&self) -> SimResult {
        while self.step()? {}
        Ok(())
    }

    /// Run all callbacks due at or before `time_ms` and then advance the
    /// clock to `time_ms`.
    pub fn run_until(&self, time_ms: SimTime) -> SimResult {
        while let Some(due) = self.next_time() {
            if due > time_ms {
                break;
            }
            self.step()?;
        }
        self.advance_to(time_ms);
        Ok(())
    }

    fn advance_to(&self, time_ms: SimTime) {
        if time_ms > self.now() {
            self.state.now.set(time_ms);
            set_time!(self.entity ; time_ms);
        }
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("now", &self.now())
            .field("pending", &self.num_pending())
            .finish()
    }
}

/// Handle to a callback scheduled with [`Dispatcher::schedule_cancellable`].
///
/// Dropping a `Timer` does not cancel the callback.
#[derive(Clone, Debug)]
pub struct Timer {
    seq: u64,
    state: Weak<DispatcherState>,
}

impl Timer {
    /// Stop the callback from running.
    ///
    /// Returns `true` if the callback was still pending. Cancelling a callback
    /// that has already run (or was already cancelled) does nothing.
    pub fn cancel(&self) -> bool {
        match self.state.upgrade() {
            Some(state) => state.callbacks.borrow_mut().remove(&self.seq).is_some(),
            None => false,
        }
    }

    /// Whether the callback is still waiting to run.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.state
            .upgrade()
            .is_some_and(|state| state.callbacks.borrow().contains_key(&self.seq))
    }
}
