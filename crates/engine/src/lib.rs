// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Rampart execution engine: commands, acts and the controllers that drive them

mod act;
mod action;
mod command;
mod command_controller;
pub mod composition;
pub mod computation;
mod controller;
mod driver;
mod launcher;
mod live;
pub mod logging;
mod scheduler;

pub use act::{Act, ActGroup, ActGroupChain, ActResult, ActWork};
pub use action::{Action, ActionResult};
pub use command::Command;
pub use command_controller::{CommandController, CommandState};
pub use composition::{compose, Disposition, FallbackReport, Tally};
pub use computation::{ComputationMode, Schedulable};
pub use controller::{ActsController, ActsDeps, ChainSnapshot, ChainState};
pub use driver::{Driver, DriverTrigger, ManualTrigger, Tickable, Trigger};
pub use launcher::{ActJob, Launcher, ManualLauncher, TokioLauncher};
pub use live::Completion;
pub use scheduler::{ScheduledItem, ScheduledKind, Scheduler, TickId};
