/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Embedder-facing callback contract for scheduled actions.

use std::time::Instant;

use crate::scheduler::SchedulerRequests;

/// What a draw-and-swap callback actually accomplished.
///
/// `did_draw` reconciles the scheduler's optimistic bookkeeping: a draw the
/// machine decided on may still fail if drawability changed between decision
/// and execution. `did_swap` feeds frame pacing; a draw without a swap (for
/// example, readback-only) must not count against pending-frame limits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrawAndSwapResult {
    pub did_draw: bool,
    pub did_swap: bool,
}

impl DrawAndSwapResult {
    pub fn drew_and_swapped() -> Self {
        Self {
            did_draw: true,
            did_swap: true,
        }
    }

    pub fn aborted() -> Self {
        Self::default()
    }
}

/// Receiver of scheduled actions. The embedder implements this; every
/// callback is invoked synchronously from the scheduler's drain loop.
///
/// Callbacks may re-enter the scheduler through the `requests` handle
/// (for example, a commit that discovers it also needs a redraw). Such
/// requests are picked up by the same outer drain loop, never dispatched
/// recursively. Work the callback starts asynchronously must be reported
/// back through the scheduler's feedback methods (`begin_frame_complete`,
/// `did_swap_buffers_complete`), not by blocking.
pub trait SchedulerClient {
    fn scheduled_action_begin_frame(&mut self, requests: &mut SchedulerRequests<'_>);

    fn scheduled_action_commit(&mut self, requests: &mut SchedulerRequests<'_>);

    fn scheduled_action_draw_and_swap_if_possible(
        &mut self,
        requests: &mut SchedulerRequests<'_>,
    ) -> DrawAndSwapResult;

    /// Terminal draw for shutdown/flush paths. `did_draw` is ignored for
    /// forced draws; only `did_swap` is consumed, for frame pacing.
    fn scheduled_action_draw_and_swap_forced(
        &mut self,
        requests: &mut SchedulerRequests<'_>,
    ) -> DrawAndSwapResult;

    fn scheduled_action_begin_context_recreation(&mut self, requests: &mut SchedulerRequests<'_>);

    fn scheduled_action_acquire_layer_textures_for_main_thread(
        &mut self,
        requests: &mut SchedulerRequests<'_>,
    );

    /// Published after every drain so the embedder can align speculative
    /// work (input sampling, pre-paint) to the next expected draw.
    fn did_anticipated_draw_time_change(&mut self, time: Instant);
}
