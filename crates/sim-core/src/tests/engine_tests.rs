use std::cell::RefCell;
use std::rc::Rc;

use serde::Serialize;

use crate::{cast, Event, EventHandler, Simulation, SimulationContext};

#[derive(Clone, Serialize)]
struct Ping {
    value: u32,
}

#[derive(Clone, Serialize)]
struct Pong {
    value: u32,
}

struct Receiver {
    ctx: SimulationContext,
    received: Vec<u32>,
}

impl EventHandler for Receiver {
    fn on(&mut self, event: Event) {
        cast!(match event.data {
            Ping { value } => {
                self.received.push(value);
            }
            Pong { value } => {
                self.received.push(value + 1000);
            }
        })
    }
}

#[test]
fn events_are_delivered_in_time_order() {
    let mut sim = Simulation::new(42);
    let ctx = sim.create_context("receiver");
    let receiver = Rc::new(RefCell::new(Receiver {
        ctx,
        received: Vec::new(),
    }));
    let receiver_id = sim.add_handler("receiver", receiver.clone());

    let client = sim.create_context("client");
    client.emit(Ping { value: 3 }, receiver_id, 3.0);
    client.emit(Ping { value: 1 }, receiver_id, 1.0);
    client.emit(Pong { value: 2 }, receiver_id, 2.0);

    sim.step_until_no_events();

    assert_eq!(receiver.borrow().received, vec![1, 1002, 3]);
    assert_eq!(sim.time(), 3.0);
}

#[test]
fn canceled_event_is_not_delivered() {
    let mut sim = Simulation::new(7);
    let ctx = sim.create_context("receiver");
    let receiver = Rc::new(RefCell::new(Receiver {
        ctx,
        received: Vec::new(),
    }));
    let receiver_id = sim.add_handler("receiver", receiver.clone());

    let client = sim.create_context("client");
    let event_id = client.emit(Ping { value: 9 }, receiver_id, 5.0);
    client.cancel_event(event_id);

    sim.step_until_no_events();

    assert!(receiver.borrow().received.is_empty());
}

#[test]
fn seeded_simulations_are_deterministic() {
    let mut sim_a = Simulation::new(123);
    let mut sim_b = Simulation::new(123);
    let values_a: Vec<f64> = (0..10).map(|_| sim_a.rand()).collect();
    let values_b: Vec<f64> = (0..10).map(|_| sim_b.rand()).collect();
    assert_eq!(values_a, values_b);
}

#[test]
fn emit_self_schedules_event_for_own_component() {
    let mut sim = Simulation::new(1);
    let ctx = sim.create_context("receiver");
    let receiver = Rc::new(RefCell::new(Receiver {
        ctx,
        received: Vec::new(),
    }));
    let receiver_id = sim.add_handler("receiver", receiver.clone());
    {
        let mut r = receiver.borrow_mut();
        r.ctx.emit_self(Ping { value: 42 }, 10.0);
    }
    let _ = receiver_id;
    sim.step_until_no_events();
    assert_eq!(receiver.borrow().received, vec![42]);
}
