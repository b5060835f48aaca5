/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Frame scheduling for the compositor thread.
//!
//! The crate answers one question: given the current visibility, commit and
//! redraw requests, texture ownership, and context health, what is the
//! single next pipeline action (begin frame, commit, draw, acquire
//! textures, or recreate the context)? [`SchedulerStateMachine`] answers it
//! as a pure function of its flags; [`Scheduler`] drives that machine from
//! external events, dispatches the chosen actions to a [`SchedulerClient`],
//! and keeps the vsync source powered only while work is pending.
//!
//! Rendering itself is out of scope. The embedder implements
//! [`SchedulerClient`] (what to do for each action) and [`FrameSource`]
//! (when the display can take a frame); this crate only decides sequencing.

pub mod client;
pub mod diagnostics;
pub mod frame_source;
pub mod proxy;
pub mod scheduler;

pub use client::{DrawAndSwapResult, SchedulerClient};
pub use frame_source::{FrameSource, NullFrameSource};
pub use proxy::{ProxyError, SchedulerMailbox, SchedulerProxy, SchedulerRequest, scheduler_channel};
pub use scheduler::state_machine::{DrawCompletion, SchedulerAction, SchedulerStateMachine};
pub use scheduler::{Scheduler, SchedulerRequests, SchedulerSettings};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
