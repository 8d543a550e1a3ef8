#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use jobloop::engine::{EventSink, SchedulerEvent};
use jobloop::types::JobId;

/// Event sink that keeps every event for later assertions.
///
/// Clones share the same log, so keep one clone and hand the other to the
/// scheduler.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<SchedulerEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SchedulerEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Events matching `pred`, in order.
    pub fn filter(&self, pred: impl Fn(&SchedulerEvent) -> bool) -> Vec<SchedulerEvent> {
        self.events().into_iter().filter(|e| pred(e)).collect()
    }

    /// `(dependent, dependency, status)` of every dependency notification.
    pub fn resolutions(&self) -> Vec<(JobId, JobId, jobloop::types::JobStatus)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SchedulerEvent::DependencyResolved {
                    dependent,
                    dependency,
                    status,
                } => Some((dependent, dependency, status)),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}

impl EventSink for RecordingSink {
    fn record(&mut self, event: SchedulerEvent) {
        self.events.lock().unwrap().push(event);
    }
}
