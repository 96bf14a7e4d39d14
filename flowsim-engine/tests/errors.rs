// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

use std::cell::Cell;
use std::rc::Rc;

use flowsim_engine::test_helpers::start_test;
use flowsim_engine::{run_simulation, sim_error};

#[test]
fn callback_error_is_returned() {
    let mut engine = start_test(file!());

    engine.dispatcher().schedule(5, |_| sim_error!("callback failed"));
    run_simulation!(engine, "Error: callback failed");
}

#[test]
#[should_panic(expected = "Error: stop here")]
fn callback_error_panics_simulation() {
    let mut engine = start_test(file!());

    engine.dispatcher().schedule(0, |_| sim_error!("stop here"));
    run_simulation!(engine);
}

#[test]
fn error_stops_later_callbacks() {
    let mut engine = start_test(file!());
    let ran = Rc::new(Cell::new(false));

    let dispatcher = engine.dispatcher();
    dispatcher.schedule(1, |_| sim_error!(format!("failed at {}", 1)));
    {
        let ran = ran.clone();
        dispatcher.schedule(2, move |_| {
            ran.set(true);
            Ok(())
        });
    }

    run_simulation!(engine, "Error: failed at 1");
    assert!(!ran.get());
    assert_eq!(engine.time_now_ms(), 1);
    assert_eq!(dispatcher.num_pending(), 1);
}
