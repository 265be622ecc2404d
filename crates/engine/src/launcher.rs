// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Launching act work off the controller's tick

use crate::act::{ActResult, ActWork};
use crate::live::Completion;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;

/// One act execution waiting to run
pub struct ActJob {
    pub(crate) work: Arc<dyn ActWork>,
    pub(crate) completion: Completion,
}

impl ActJob {
    pub fn key(&self) -> &str {
        self.completion.key()
    }

    /// Run the work and report its outcome
    pub async fn run(self) {
        let result = self.work.run().await;
        self.completion.complete(result);
    }

    /// Report an outcome without running the work
    pub fn complete(self, result: ActResult) {
        self.completion.complete(result);
    }
}

/// Starts act jobs; must not block
pub trait Launcher: Send + Sync {
    /// Start `job`; the returned handle, if any, aborts it on timeout or cancel
    fn launch(&self, job: ActJob) -> Option<AbortHandle>;
}

/// Runs jobs as tasks on a tokio runtime
#[derive(Clone, Debug)]
pub struct TokioLauncher {
    handle: Handle,
}

impl TokioLauncher {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Launcher for the runtime of the calling task
    pub fn current() -> Self {
        Self::new(Handle::current())
    }
}

impl Launcher for TokioLauncher {
    fn launch(&self, job: ActJob) -> Option<AbortHandle> {
        let task = self.handle.spawn(job.run());
        Some(task.abort_handle())
    }
}

/// Holds jobs until a test completes them
#[derive(Clone, Default)]
pub struct ManualLauncher {
    jobs: Arc<Mutex<Vec<ActJob>>>,
    launched: Arc<Mutex<Vec<String>>>,
}

impl ManualLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys of every job launched so far, in order
    pub fn launched(&self) -> Vec<String> {
        self.launched.lock().clone()
    }

    /// Keys of jobs not yet completed
    pub fn pending(&self) -> Vec<String> {
        self.jobs
            .lock()
            .iter()
            .map(|job| job.key().to_string())
            .collect()
    }

    /// Complete the oldest pending job for `key`; false if there is none
    pub fn complete(&self, key: &str, result: ActResult) -> bool {
        let job = {
            let mut jobs = self.jobs.lock();
            match jobs.iter().position(|job| job.key() == key) {
                Some(index) => jobs.remove(index),
                None => return false,
            }
        };
        job.complete(result);
        true
    }

    /// Run the oldest pending job for `key` to completion
    pub async fn run(&self, key: &str) -> bool {
        let job = {
            let mut jobs = self.jobs.lock();
            match jobs.iter().position(|job| job.key() == key) {
                Some(index) => jobs.remove(index),
                None => return false,
            }
        };
        job.run().await;
        true
    }
}

impl Launcher for ManualLauncher {
    fn launch(&self, job: ActJob) -> Option<AbortHandle> {
        self.launched.lock().push(job.key().to_string());
        self.jobs.lock().push(job);
        None
    }
}
