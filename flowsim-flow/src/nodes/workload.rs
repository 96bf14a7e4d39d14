// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! A consumer replaying a trace of fragments.
//!
//! Each [`Fragment`] demands a rate for a duration. The work it represents is
//! computed by the workload's [`ScalingPolicy`] when the fragment starts and
//! is consumed at the rate the policy dictates. The workload schedules an
//! update for when it expects the current fragment to complete and
//! reschedules it whenever its supply changes.
//!
//! Fragments with no demand are idle periods that last exactly their
//! duration.
//!
//! A workload does not start until it has a supplier edge. Once the last
//! fragment completes it drops its demand and closes its edge.

use std::rc::Rc;

use flowsim_engine::dispatcher::Timer;
use flowsim_engine::types::{SimResult, SimTime};
use flowsim_track::entity::Entity;
use flowsim_track::{debug, info};
use serde::{Deserialize, Serialize};

use crate::node::{FlowNode, NodeContext};
use crate::scaling::{PerfectScaling, ScalingPolicy};
use crate::types::EdgeId;

/// A fragment whose remaining duration is below this is complete.
const DURATION_TOLERANCE_MS: f64 = 1e-6;

/// One step of a workload trace.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
pub struct Fragment {
    pub duration_ms: u64,
    pub demand: f64,
}

impl Fragment {
    #[must_use]
    pub fn new(duration_ms: u64, demand: f64) -> Self {
        Self {
            duration_ms,
            demand,
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum Progress {
    Work(f64),
    Idle { until: SimTime },
}

pub struct FlowWorkload {
    fragments: Vec<Fragment>,
    scaling: Box<dyn ScalingPolicy>,

    index: usize,
    progress: Option<Progress>,
    demand: f64,
    supply: f64,
    last_update: SimTime,
    timer: Option<Timer>,

    started_at: Option<SimTime>,
    completed_at: Option<SimTime>,
    demanded_work: f64,
    supplied_work: f64,
}

impl FlowWorkload {
    /// Create a workload using [`PerfectScaling`].
    #[must_use]
    pub fn new(fragments: Vec<Fragment>) -> Self {
        Self::with_scaling(fragments, Box::new(PerfectScaling))
    }

    #[must_use]
    pub fn with_scaling(fragments: Vec<Fragment>, scaling: Box<dyn ScalingPolicy>) -> Self {
        Self {
            fragments,
            scaling,
            index: 0,
            progress: None,
            demand: 0.0,
            supply: 0.0,
            last_update: 0,
            timer: None,
            started_at: None,
            completed_at: None,
            demanded_work: 0.0,
            supplied_work: 0.0,
        }
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.completed_at.is_some()
    }

    #[must_use]
    pub fn started_at(&self) -> Option<SimTime> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<SimTime> {
        self.completed_at
    }

    /// Index of the fragment being replayed.
    #[must_use]
    pub fn fragment_index(&self) -> usize {
        self.index
    }

    /// Demand of the current fragment.
    #[must_use]
    pub fn demand(&self) -> f64 {
        self.demand
    }

    /// Supply received at the last update.
    #[must_use]
    pub fn supply(&self) -> f64 {
        self.supply
    }

    /// Work left in the current fragment, if it is not an idle period.
    #[must_use]
    pub fn remaining_work(&self) -> Option<f64> {
        match self.progress {
            Some(Progress::Work(work)) => Some(work),
            _ => None,
        }
    }

    /// Integral of the demand over time, up to the last update.
    #[must_use]
    pub fn demanded_work(&self) -> f64 {
        self.demanded_work
    }

    /// Integral of the supply over time, up to the last update.
    #[must_use]
    pub fn supplied_work(&self) -> f64 {
        self.supplied_work
    }

    fn start_fragment(&mut self, index: usize, now: SimTime) {
        self.index = index;
        let fragment = self.fragments[index];
        self.demand = fragment.demand.max(0.0);
        self.progress = Some(if self.demand > 0.0 {
            Progress::Work(
                self.scaling
                    .remaining_work(self.demand, fragment.duration_ms as f64),
            )
        } else {
            Progress::Idle {
                until: now.saturating_add(fragment.duration_ms),
            }
        });
    }

    /// Account for the time elapsed since the last update at the rates that
    /// applied during it.
    fn advance(&mut self, now: SimTime) {
        let elapsed = now.saturating_sub(self.last_update) as f64;
        if elapsed > 0.0 {
            if let Some(Progress::Work(work)) = self.progress.as_mut() {
                *work -= self
                    .scaling
                    .finished_work(self.demand, self.supply, elapsed);
            }
            self.demanded_work += self.demand * elapsed;
            self.supplied_work += self.supply * elapsed;
        }
        self.last_update = now;
    }

    fn fragment_done(&self, now: SimTime) -> bool {
        match self.progress {
            Some(Progress::Work(work)) => {
                work <= 0.0
                    || self
                        .scaling
                        .remaining_duration(self.demand, self.supply, work)
                        .is_some_and(|d| d <= DURATION_TOLERANCE_MS)
            }
            Some(Progress::Idle { until }) => now >= until,
            None => false,
        }
    }

    /// Time until the current fragment is expected to complete.
    fn time_to_completion(&self, now: SimTime) -> Option<f64> {
        match self.progress {
            Some(Progress::Work(work)) => {
                self.scaling
                    .remaining_duration(self.demand, self.supply, work)
            }
            Some(Progress::Idle { until }) => Some(until.saturating_sub(now) as f64),
            None => None,
        }
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
    }

    fn complete(
        &mut self,
        ctx: &mut NodeContext,
        edge: Option<EdgeId>,
        now: SimTime,
    ) -> SimResult {
        self.cancel_timer();
        self.demand = 0.0;
        self.supply = 0.0;
        self.completed_at = Some(now);
        if let Some(edge) = edge {
            ctx.push_demand(edge, 0.0)?;
            ctx.close_edge(edge)?;
        }
        info!(ctx.entity() ; "completed at {now}ms");
        Ok(())
    }
}

impl FlowNode for FlowWorkload {
    fn on_update(&mut self, ctx: &mut NodeContext) -> SimResult {
        if self.is_complete() {
            return Ok(());
        }

        let now = ctx.now();
        let edge = ctx.supplier_edges().first().copied();

        if self.progress.is_none() {
            if edge.is_none() {
                // Not connected yet
                return Ok(());
            }
            debug!(ctx.entity() ; "started at {now}ms");
            self.started_at = Some(now);
            self.last_update = now;
            if self.fragments.is_empty() {
                return self.complete(ctx, edge, now);
            }
            self.start_fragment(0, now);
        } else {
            self.advance(now);
        }

        while self.fragment_done(now) {
            debug!(ctx.entity() ; "fragment {} done at {now}ms", self.index);
            if self.index + 1 == self.fragments.len() {
                return self.complete(ctx, edge, now);
            }
            self.start_fragment(self.index + 1, now);
        }

        self.supply = match edge {
            Some(edge) => {
                ctx.push_demand(edge, self.demand)?;
                ctx.supply(edge)
            }
            None => 0.0,
        };

        self.cancel_timer();
        if let Some(duration) = self.time_to_completion(now) {
            let delay_ms = (duration - DURATION_TOLERANCE_MS).ceil().max(1.0) as u64;
            self.timer = Some(ctx.schedule_update(delay_ms));
        }
        Ok(())
    }

    fn on_remove(&mut self, _entity: &Rc<Entity>) {
        self.cancel_timer();
    }
}
