// NetSim: Packet-level network simulator and graph toolkit written in Rust
// Copyright (C) 2023-2024 The NetSim developers
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;

use pretty_assertions::assert_eq;

use crate::event::{
    ConsumerRef, EventConsumer, EventQueue, EventTime, RealTimeEventQueue, SimTimeEventQueue,
};

/// A consumer that records a marker value every time it fires, optionally
/// rescheduling itself with a fixed period.
struct DummyConsumer {
    id: String,
    me: Weak<RefCell<DummyConsumer>>,
    log: Rc<RefCell<Vec<u64>>>,
    marker: u64,
    period: Option<EventTime>,
}

impl DummyConsumer {
    fn new(
        marker: u64,
        log: Rc<RefCell<Vec<u64>>>,
        period: Option<EventTime>,
    ) -> Rc<RefCell<Self>> {
        Rc::new_cyclic(|me| {
            RefCell::new(Self {
                id: format!("dummy_{marker}"),
                me: me.clone(),
                log,
                marker,
                period,
            })
        })
    }
}

impl EventConsumer for DummyConsumer {
    fn id(&self) -> &str {
        &self.id
    }

    fn handle_event(&mut self, queue: &mut dyn EventQueue) {
        if let Some(period) = self.period {
            let me = self.me.upgrade().unwrap();
            queue.enqueue_in(period, &(me as ConsumerRef));
        }
        self.log.borrow_mut().push(self.marker);
    }
}

#[test]
fn init() {
    let queue = SimTimeEventQueue::new();
    assert_eq!(queue.current_time(), EventTime::ZERO);
    assert_eq!(queue.stop_time(), EventTime::MAX);
    assert_eq!(queue.pending_events(), 0);
}

#[test]
fn empty_run() {
    let mut queue = SimTimeEventQueue::new();
    queue.run_and_stop_in(Duration::from_secs(100));
    assert_eq!(
        queue.duration_from_time(queue.current_time()),
        Duration::from_secs(100)
    );
}

#[test]
fn order() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut queue = SimTimeEventQueue::new();
    let consumers: Vec<_> = (1..=5)
        .map(|i| DummyConsumer::new(i, log.clone(), None))
        .collect();

    let schedule = [(4u64, 50u64), (2, 5), (1, 1), (3, 10), (5, 60)];
    for (marker, at_ms) in schedule {
        let c = consumers[marker as usize - 1].clone() as ConsumerRef;
        queue.enqueue_at(queue.time_from_millis(at_ms), &c);
    }

    queue.run_and_stop_in(Duration::from_secs(100));
    assert_eq!(*log.borrow(), vec![1, 2, 3, 4, 5]);
}

#[test]
fn equal_times_are_fifo() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut queue = SimTimeEventQueue::new();
    let at = queue.time_from_millis(10);
    let consumers: Vec<_> = (1..=4)
        .map(|i| DummyConsumer::new(i, log.clone(), None))
        .collect();

    for _ in 0..2 {
        for c in &consumers {
            queue.enqueue_at(at, &(c.clone() as ConsumerRef));
        }
    }

    queue.run_and_stop_in(Duration::from_secs(1));
    assert_eq!(*log.borrow(), vec![1, 2, 3, 4, 1, 2, 3, 4]);
}

#[test]
fn event_at_stop_time_is_not_delivered() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut queue = SimTimeEventQueue::new();
    let consumer = DummyConsumer::new(1, log.clone(), None);
    queue.enqueue_at(
        queue.time_from_millis(500),
        &(consumer.clone() as ConsumerRef),
    );

    queue.run_and_stop_in(Duration::from_millis(500));
    assert!(log.borrow().is_empty());
    // virtual time still advances to the stop time
    assert_eq!(queue.millis_from_time(queue.current_time()), 500);

    // a second run with a later stop delivers the leftover event
    queue.run_and_stop_in(Duration::from_secs(5));
    assert_eq!(*log.borrow(), vec![1]);
}

#[test]
fn event_before_stop_time_is_delivered() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut queue = SimTimeEventQueue::new();
    let consumer = DummyConsumer::new(1, log.clone(), None);
    queue.enqueue_at(
        queue.time_from_millis(500),
        &(consumer.clone() as ConsumerRef),
    );
    queue.run_and_stop_in(Duration::from_millis(1000));
    assert_eq!(*log.borrow(), vec![1]);
    assert_eq!(queue.millis_from_time(queue.current_time()), 1000);
}

/// A consumer that schedules another consumer into the past.
struct LateScheduler {
    target: ConsumerRef,
}

impl EventConsumer for LateScheduler {
    fn id(&self) -> &str {
        "late_scheduler"
    }

    fn handle_event(&mut self, queue: &mut dyn EventQueue) {
        // 5ms is already in the past at this point
        queue.enqueue_at(queue.time_from_millis(5), &self.target);
    }
}

#[test]
fn late_events_run_immediately() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut queue = SimTimeEventQueue::new();
    let target = DummyConsumer::new(7, log.clone(), None);
    let scheduler = Rc::new(RefCell::new(LateScheduler {
        target: target.clone() as ConsumerRef,
    }));
    queue.enqueue_at(
        queue.time_from_millis(20),
        &(scheduler.clone() as ConsumerRef),
    );

    queue.run_and_stop_in(Duration::from_millis(100));
    assert_eq!(*log.borrow(), vec![7]);
}

#[test]
fn periodic_consumer() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut queue = SimTimeEventQueue::new();
    let period = queue.time_from_millis(10);
    let consumer = DummyConsumer::new(1, log.clone(), Some(period));
    queue.enqueue_asap(&(consumer.clone() as ConsumerRef));

    queue.run_and_stop_in(Duration::from_millis(100));
    // fires at 0, 10, ..., 90; the event at 100 hits the stop time
    assert_eq!(log.borrow().len(), 10);
}

#[test]
fn evict_consumer() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut queue = SimTimeEventQueue::new();
    let victim = DummyConsumer::new(1, log.clone(), None);
    let witness = DummyConsumer::new(2, log.clone(), None);

    for at_ms in [10, 20, 30] {
        queue.enqueue_at(queue.time_from_millis(at_ms), &(victim.clone() as ConsumerRef));
    }
    queue.enqueue_at(queue.time_from_millis(15), &(witness.clone() as ConsumerRef));

    assert_eq!(queue.evict_consumer(&(victim.clone() as ConsumerRef)), 3);
    assert_eq!(queue.pending_events(), 1);

    queue.run_and_stop_in(Duration::from_secs(1));
    assert_eq!(*log.borrow(), vec![2]);
}

#[test]
#[should_panic(expected = "outstanding events")]
fn dropped_consumer_panics() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut queue = SimTimeEventQueue::new();
    let consumer = DummyConsumer::new(1, log, None);
    queue.enqueue_at(queue.time_from_millis(10), &(consumer.clone() as ConsumerRef));
    drop(consumer);
    queue.run_and_stop_in(Duration::from_secs(1));
}

#[test]
fn time_arithmetic() {
    let a = EventTime::from_raw(100);
    let b = EventTime::from_raw(40);
    assert_eq!(a + b, EventTime::from_raw(140));
    assert_eq!(a - b, EventTime::from_raw(60));
    assert_eq!(b * 3, EventTime::from_raw(120));
    assert_eq!(a / b, 2.5);
    assert_eq!(a / 2.0, EventTime::from_raw(50));
    assert_eq!(b.checked_sub(a), None);
    assert!(EventTime::ZERO.is_zero());
}

#[test]
#[should_panic(expected = "negative time")]
fn negative_time_panics() {
    let _ = EventTime::from_raw(1) - EventTime::from_raw(2);
}

#[test]
fn sim_time_conversions() {
    let queue = SimTimeEventQueue::new();
    let time = queue.time_from_duration(Duration::from_micros(64));
    // simulated ticks have picosecond resolution
    assert_eq!(time.raw(), 64_000_000);
    assert_eq!(queue.duration_from_time(time), Duration::from_micros(64));
    assert_eq!(queue.time_from_millis(500), queue.time_from_duration(Duration::from_millis(500)));
}

#[test]
fn real_time_queue_runs_in_order() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut queue = RealTimeEventQueue::new();
    let c1 = DummyConsumer::new(1, log.clone(), None);
    let c2 = DummyConsumer::new(2, log.clone(), None);
    queue.enqueue_at(queue.time_from_millis(20), &(c2.clone() as ConsumerRef));
    queue.enqueue_at(queue.time_from_millis(5), &(c1.clone() as ConsumerRef));

    let start = std::time::Instant::now();
    queue.run_and_stop_in(Duration::from_secs(10));
    assert_eq!(*log.borrow(), vec![1, 2]);
    // the queue slept until the wallclock reached the last event; the
    // epoch is the queue construction, slightly before `start`
    assert!(start.elapsed() >= Duration::from_millis(10));
}
