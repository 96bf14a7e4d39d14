// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

#![doc(test(attr(warn(unused))))]

//! `FlowSim` engine
//!
//! This library provides the virtual clock of a flow simulation. The
//! [Dispatcher](crate::dispatcher::Dispatcher) holds an ordered queue of
//! callbacks keyed by virtual time (in milliseconds) and is the only thing
//! that advances time.
//!
//! # Simple Application
//!
//! ```rust
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! use flowsim_engine::engine::Engine;
//! use flowsim_engine::run_simulation;
//!
//! let mut engine = Engine::default();
//! let fired_at = Rc::new(Cell::new(0));
//! {
//!     let fired_at = fired_at.clone();
//!     engine.dispatcher().schedule(250, move |dispatcher| {
//!         fired_at.set(dispatcher.now());
//!         Ok(())
//!     });
//! }
//! run_simulation!(engine);
//! assert_eq!(fired_at.get(), 250);
//! ```

pub mod dispatcher;
pub mod engine;
pub mod test_helpers;
pub mod types;

#[macro_export]
/// Run the simulation until no callbacks remain.
///
/// The second form expects the run to fail with the given error message.
macro_rules! run_simulation {
    ($engine:ident) => {
        $engine.run().unwrap();
    };
    ($engine:ident, $expect:expr) => {
        match $engine.run() {
            Ok(()) => panic!("Expected an error!"),
            Err(e) => assert_eq!(format!("{e}").as_str(), $expect),
        }
    };
}
