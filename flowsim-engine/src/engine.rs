// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! The top-level simulation engine.
//!
//! The [`Engine`] owns the top-level [`Entity`], the [`Tracker`] shared by
//! every entity below it and the [`Dispatcher`] that holds virtual time.

use std::rc::Rc;

use flowsim_track::Tracker;
use flowsim_track::entity::{Entity, toplevel};
use flowsim_track::tracker::stdout_tracker;

use crate::dispatcher::Dispatcher;
use crate::types::{SimResult, SimTime};

pub struct Engine {
    toplevel: Rc<Entity>,
    tracker: Tracker,
    dispatcher: Dispatcher,
}

impl Engine {
    /// Create a standalone engine.
    pub fn new(tracker: &Tracker) -> Self {
        let toplevel = toplevel(tracker, "top");
        let dispatcher = Dispatcher::new(&toplevel);
        Self {
            toplevel,
            tracker: tracker.clone(),
            dispatcher,
        }
    }

    /// Run until no callbacks remain.
    pub fn run(&mut self) -> SimResult {
        let result = self.dispatcher.run();
        self.tracker.shutdown();
        result
    }

    /// Run all callbacks due up to and including `time_ms`.
    pub fn run_until(&mut self, time_ms: SimTime) -> SimResult {
        let result = self.dispatcher.run_until(time_ms);
        self.tracker.shutdown();
        result
    }

    #[must_use]
    pub fn dispatcher(&self) -> Dispatcher {
        self.dispatcher.clone()
    }

    #[must_use]
    pub fn time_now_ms(&self) -> SimTime {
        self.dispatcher.now()
    }

    #[must_use]
    pub fn top(&self) -> &Rc<Entity> {
        &self.toplevel
    }

    #[must_use]
    pub fn tracker(&self) -> Tracker {
        self.tracker.clone()
    }
}

/// Create a default engine that sends [`Track`](flowsim_track::Track) events
/// at `Warn` level and above to stdout.
///
/// This is provided to keep documentation examples simple with fewer
/// concepts to have to consider at once.
impl Default for Engine {
    fn default() -> Self {
        let tracker = stdout_tracker(log::Level::Warn);
        Self::new(&tracker)
    }
}
