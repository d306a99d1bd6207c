//! Shared fixtures: a resource provider that records every boundary call.

#![allow(dead_code)]

use async_trait::async_trait;
use ordo_core::{
    BoxError, Orchestrator, ResourceProvider, RetryPolicy, Task, TaskContext, TaskCounts,
};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Open(String),
    Execute(String, u32),
    Validate(String),
    Commit(String),
    Rollback(String),
}

#[derive(Debug, Clone, Default)]
pub struct Recorder {
    events: Arc<Mutex<Vec<Event>>>,
}

impl Recorder {
    pub fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn position(&self, event: &Event) -> usize {
        self.events()
            .iter()
            .position(|e| e == event)
            .unwrap_or_else(|| panic!("{event:?} was not recorded"))
    }

    pub fn executions(&self, task: &str) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, Event::Execute(name, _) if name == task))
            .count()
    }

    pub fn executed_tasks(&self) -> Vec<String> {
        let mut names = Vec::new();
        for event in self.events() {
            if let Event::Execute(name, _) = event
                && !names.contains(&name)
            {
                names.push(name);
            }
        }
        names
    }
}

/// Handle given to task bodies: the task it belongs to.
#[derive(Debug, Clone)]
pub struct Boundary {
    pub task: String,
}

#[derive(Debug, Clone, Default)]
pub struct RecordingProvider {
    pub recorder: Recorder,
    fail_open: HashSet<String>,
    fail_commit: HashSet<String>,
    fail_rollback: HashSet<String>,
}

impl RecordingProvider {
    pub fn new(recorder: &Recorder) -> Self {
        Self {
            recorder: recorder.clone(),
            ..Self::default()
        }
    }

    pub fn failing_open(mut self, task: &str) -> Self {
        self.fail_open.insert(task.to_string());
        self
    }

    pub fn failing_commit(mut self, task: &str) -> Self {
        self.fail_commit.insert(task.to_string());
        self
    }

    pub fn failing_rollback(mut self, task: &str) -> Self {
        self.fail_rollback.insert(task.to_string());
        self
    }
}

#[async_trait]
impl ResourceProvider for RecordingProvider {
    type Handle = Boundary;

    async fn open(&self, ctx: &TaskContext) -> Result<Boundary, BoxError> {
        self.recorder.push(Event::Open(ctx.task_name().to_string()));
        if self.fail_open.contains(ctx.task_name()) {
            return Err("pool exhausted".into());
        }
        Ok(Boundary {
            task: ctx.task_name().to_string(),
        })
    }

    async fn commit(&self, handle: Boundary) -> Result<(), BoxError> {
        self.recorder.push(Event::Commit(handle.task.clone()));
        if self.fail_commit.contains(&handle.task) {
            return Err("commit refused".into());
        }
        Ok(())
    }

    async fn rollback(&self, handle: Boundary) -> Result<(), BoxError> {
        self.recorder.push(Event::Rollback(handle.task.clone()));
        if self.fail_rollback.contains(&handle.task) {
            return Err("rollback refused".into());
        }
        Ok(())
    }
}

/// Orchestrator over a recording provider with millisecond backoff.
pub fn orchestrator(provider: RecordingProvider) -> Orchestrator<RecordingProvider> {
    Orchestrator::new(provider).with_retry_policy(RetryPolicy::new(3, Duration::from_millis(1)))
}

/// Task that records its execution and creates one record.
pub fn ok_task(name: &str, recorder: &Recorder) -> Task<Boundary> {
    sleeping_task(name, recorder, Duration::ZERO)
}

/// Task that records its execution, sleeps, then creates one record.
pub fn sleeping_task(name: &str, recorder: &Recorder, delay: Duration) -> Task<Boundary> {
    let recorder = recorder.clone();
    Task::new(name, move |ctx: TaskContext, _handle: Boundary| {
        recorder.push(Event::Execute(ctx.task_name().to_string(), ctx.attempt()));
        async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            Ok(TaskCounts::created(1))
        }
    })
}

/// Task whose `execute` always fails.
pub fn failing_task(name: &str, recorder: &Recorder) -> Task<Boundary> {
    let recorder = recorder.clone();
    Task::new(name, move |ctx: TaskContext, _handle: Boundary| {
        recorder.push(Event::Execute(ctx.task_name().to_string(), ctx.attempt()));
        async { Err::<TaskCounts, BoxError>("constraint violation".into()) }
    })
}
