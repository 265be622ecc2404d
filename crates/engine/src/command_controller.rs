// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Drives a single command on the tick model

use crate::command::Command;
use crate::composition::{compose, Disposition};
use crate::driver::{Tickable, Trigger};
use parking_lot::Mutex;
use rampart_core::checker::{
    earliest_ready_in_ms, is_in_attempt, is_policy_violated, is_ready_to_execute, NEVER,
};
use rampart_core::{Clock, Defaults, ExecutionError, Notification, ResilienceRegistry};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandState {
    Pending,
    Running,
    Finished,
    Failed,
    Cancelled,
}

pub struct CommandController<T, C: Clock> {
    command: Command<T>,
    registry: Arc<ResilienceRegistry>,
    trigger: Arc<dyn Trigger>,
    defaults: Defaults,
    clock: C,
    state: Mutex<CommandState>,
}

impl<T, C: Clock> CommandController<T, C> {
    pub fn new(
        command: Command<T>,
        registry: Arc<ResilienceRegistry>,
        trigger: Arc<dyn Trigger>,
        defaults: Defaults,
        clock: C,
    ) -> Self {
        Self {
            command,
            registry,
            trigger,
            defaults,
            clock,
            state: Mutex::new(CommandState::Pending),
        }
    }

    pub fn command(&self) -> &Command<T> {
        &self.command
    }

    pub fn state(&self) -> CommandState {
        *self.state.lock()
    }

    /// Begin a new subscription cycle
    pub fn subscribe(&self) -> Result<(), ExecutionError> {
        let Some(mut state) = self.state.try_lock_for(self.defaults.lock_timeout) else {
            return Err(ExecutionError::AlreadySubscribed);
        };
        if *state == CommandState::Running {
            return Err(ExecutionError::AlreadySubscribed);
        }
        self.command.status().reset(self.clock.now());
        self.command.status().set_starting(true);
        *state = CommandState::Running;
        tracing::debug!(command = self.command.name(), "command subscribed");
        drop(state);
        self.trigger.trigger_now();
        Ok(())
    }

    pub fn run(&self) {
        let Some(mut state) = self.state.try_lock_for(self.defaults.lock_timeout) else {
            tracing::warn!(command = self.command.name(), "controller lock contended, skipping tick");
            return;
        };
        if *state != CommandState::Running {
            return;
        }
        let status = self.command.status();
        let policy = self.command.policy();
        let now = self.clock.now();

        if status.is_cancelled() {
            *state = CommandState::Cancelled;
            self.command
                .subject()
                .emit(&Notification::Error(ExecutionError::Cancelled));
            return;
        }
        is_policy_violated(status, policy, &self.defaults.tuning, now);
        if !is_ready_to_execute(status, policy, now) {
            status.false_start();
            tracing::debug!(
                command = self.command.name(),
                false_starts = status.total_false_starts(),
                "tick fired before the command was ready"
            );
            return;
        }

        *state = match compose(&self.command, &self.registry, &self.clock) {
            Disposition::Busy => CommandState::Running,
            Disposition::Failed(ExecutionError::Cancelled) => CommandState::Cancelled,
            Disposition::Failed(ExecutionError::Fatal(_)) => CommandState::Failed,
            Disposition::Completed if !is_in_attempt(status, &policy.attempt) => {
                CommandState::Finished
            }
            Disposition::Failed(_) if !is_in_attempt(status, &policy.attempt) => {
                CommandState::Failed
            }
            Disposition::Completed | Disposition::Failed(_) => CommandState::Running,
        };
        let settled = *state;
        if settled != CommandState::Running {
            tracing::info!(command = self.command.name(), state = ?settled, "command settled");
        }
    }

    /// Delay until the command is next ready
    pub fn next(&self) -> Option<Duration> {
        let state = self.state.try_lock_for(self.defaults.lock_timeout)?;
        if *state != CommandState::Running {
            return None;
        }
        if self.command.status().is_cancelled() {
            return Some(Duration::ZERO);
        }
        let delay = earliest_ready_in_ms(
            self.command.status(),
            self.command.policy(),
            &self.defaults.tuning,
            self.clock.now(),
        );
        if delay == NEVER {
            return None;
        }
        Some(Duration::from_millis(u64::try_from(delay).unwrap_or(0)))
    }

    pub fn cancel(&self) {
        self.command.status().cancel();
        let Some(mut state) = self.state.try_lock_for(self.defaults.lock_timeout) else {
            self.trigger.trigger_now();
            return;
        };
        if matches!(*state, CommandState::Pending | CommandState::Running) {
            *state = CommandState::Cancelled;
            self.command
                .subject()
                .emit(&Notification::Error(ExecutionError::Cancelled));
        }
    }
}

impl<T: Send + Sync, C: Clock> Tickable for CommandController<T, C> {
    fn run(&self) {
        CommandController::run(self);
    }

    fn next(&self) -> Option<Duration> {
        CommandController::next(self)
    }
}

#[cfg(test)]
#[path = "command_controller_tests.rs"]
mod tests;
