/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Stateful driver around the pure state machine.
//!
//! Every external event mutates a machine flag and immediately drains the
//! action queue: a synchronous, level-triggered scheduler with no pending
//! event queue of its own. The drain loop re-queries the machine after each
//! dispatched action, so requests made re-entrantly from client callbacks
//! are picked up by the same outer loop instead of recursing.

pub mod state_machine;

#[cfg(test)]
mod tests;

use std::time::{Duration, Instant};

use log::debug;

use crate::client::SchedulerClient;
use crate::diagnostics::{
    CHANNEL_SCHEDULER_BEGIN_FRAME_ABORTED, CHANNEL_SCHEDULER_CONTEXT_LOST,
    CHANNEL_SCHEDULER_CONTEXT_RECREATED, CHANNEL_SCHEDULER_DRAW_ESCALATED_TO_FORCED,
    CHANNEL_SCHEDULER_DRAW_FAILED, SchedulerDiagnostics, action_channel,
};
use crate::frame_source::FrameSource;
use self::state_machine::{DrawCompletion, SchedulerAction, SchedulerStateMachine};

const DEFAULT_MAX_FRAMES_PENDING: usize = 2;
const DEFAULT_MAX_FAILED_DRAWS_BEFORE_DRAW_IS_FORCED: u32 = 3;
const DEFAULT_DIAGNOSTICS_RETENTION: usize = 128;

/// Embedder-injected tuning knobs, applied at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerSettings {
    /// Forwarded to the frame source: swaps allowed in flight at once.
    pub max_frames_pending: usize,
    /// Forwarded to the frame source: whether the platform reports swap
    /// completion.
    pub swap_buffers_complete_supported: bool,
    /// Consecutive failed draws tolerated before a forced redraw is armed.
    pub max_failed_draws_before_draw_is_forced: u32,
    /// Ring size of the dispatched-action diagnostics buffer.
    pub diagnostics_retention: usize,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            max_frames_pending: DEFAULT_MAX_FRAMES_PENDING,
            swap_buffers_complete_supported: true,
            max_failed_draws_before_draw_is_forced: DEFAULT_MAX_FAILED_DRAWS_BEFORE_DRAW_IS_FORCED,
            diagnostics_retention: DEFAULT_DIAGNOSTICS_RETENTION,
        }
    }
}

/// Re-entry handle passed to every scheduled-action callback. Mutations
/// land directly in the state machine's level-triggered flags; the outer
/// drain loop observes them on its next `next_action` query.
pub struct SchedulerRequests<'a> {
    machine: &'a mut SchedulerStateMachine,
}

impl SchedulerRequests<'_> {
    pub fn set_needs_commit(&mut self) {
        self.machine.set_needs_commit();
    }

    pub fn set_needs_forced_commit(&mut self) {
        self.machine.set_needs_forced_commit();
    }

    pub fn set_needs_redraw(&mut self) {
        self.machine.set_needs_redraw();
    }

    pub fn set_needs_forced_redraw(&mut self) {
        self.machine.set_needs_forced_redraw();
    }

    pub fn set_main_thread_needs_layer_textures(&mut self) {
        self.machine.set_main_thread_needs_layer_textures();
    }
}

pub struct Scheduler {
    state_machine: SchedulerStateMachine,
    frame_source: Box<dyn FrameSource>,
    diagnostics: SchedulerDiagnostics,
    inside_process_scheduled_actions: bool,
}

impl Scheduler {
    pub fn new(mut frame_source: Box<dyn FrameSource>, settings: SchedulerSettings) -> Self {
        frame_source.set_max_frames_pending(settings.max_frames_pending);
        frame_source.set_swap_buffers_complete_supported(settings.swap_buffers_complete_supported);
        Self {
            state_machine: SchedulerStateMachine::new(&settings),
            frame_source,
            diagnostics: SchedulerDiagnostics::new(settings.diagnostics_retention),
            inside_process_scheduled_actions: false,
        }
    }

    pub fn set_can_begin_frame(&mut self, can: bool, client: &mut dyn SchedulerClient) {
        self.state_machine.set_can_begin_frame(can);
        self.process_scheduled_actions(client);
    }

    pub fn set_visible(&mut self, visible: bool, client: &mut dyn SchedulerClient) {
        self.state_machine.set_visible(visible);
        self.process_scheduled_actions(client);
    }

    pub fn set_can_draw(&mut self, can: bool, client: &mut dyn SchedulerClient) {
        self.state_machine.set_can_draw(can);
        self.process_scheduled_actions(client);
    }

    pub fn set_needs_commit(&mut self, client: &mut dyn SchedulerClient) {
        self.state_machine.set_needs_commit();
        self.process_scheduled_actions(client);
    }

    pub fn set_needs_forced_commit(&mut self, client: &mut dyn SchedulerClient) {
        self.state_machine.set_needs_forced_commit();
        self.process_scheduled_actions(client);
    }

    pub fn set_needs_redraw(&mut self, client: &mut dyn SchedulerClient) {
        self.state_machine.set_needs_redraw();
        self.process_scheduled_actions(client);
    }

    pub fn set_needs_forced_redraw(&mut self, client: &mut dyn SchedulerClient) {
        self.state_machine.set_needs_forced_redraw();
        self.process_scheduled_actions(client);
    }

    pub fn set_main_thread_needs_layer_textures(&mut self, client: &mut dyn SchedulerClient) {
        self.state_machine.set_main_thread_needs_layer_textures();
        self.process_scheduled_actions(client);
    }

    /// The main thread finished producing the in-flight frame; the commit
    /// becomes dispatchable.
    pub fn begin_frame_complete(&mut self, client: &mut dyn SchedulerClient) {
        self.state_machine.begin_frame_complete();
        self.process_scheduled_actions(client);
    }

    pub fn begin_frame_aborted(&mut self, client: &mut dyn SchedulerClient) {
        debug!("scheduler: begin frame aborted by main thread");
        self.state_machine.begin_frame_aborted();
        self.diagnostics.record(
            self.state_machine.current_frame_number(),
            CHANNEL_SCHEDULER_BEGIN_FRAME_ABORTED,
        );
        self.process_scheduled_actions(client);
    }

    /// Tick from the frame source. Unthrottled ticks bracket a drain with
    /// the vsync window so per-tick decisions (one draw per interval) hold;
    /// throttled ticks are virtual and must not trigger drawing.
    pub fn vsync_tick(&mut self, throttled: bool, client: &mut dyn SchedulerClient) {
        if throttled {
            debug!("scheduler: throttled vsync tick, no actions processed");
            return;
        }
        self.state_machine.did_enter_vsync();
        self.process_scheduled_actions(client);
        self.state_machine.did_leave_vsync();
    }

    /// Swap-latency feedback edge: lets the frame source pace future
    /// frames by real completion times instead of assuming a fast
    /// turnaround.
    pub fn did_swap_buffers_complete(&mut self) {
        self.frame_source.did_finish_frame();
    }

    pub fn did_lose_context(&mut self, client: &mut dyn SchedulerClient) {
        debug!("scheduler: rendering context lost");
        self.frame_source.did_abort_all_pending_frames();
        self.state_machine.did_lose_context();
        self.diagnostics.record(
            self.state_machine.current_frame_number(),
            CHANNEL_SCHEDULER_CONTEXT_LOST,
        );
        self.process_scheduled_actions(client);
    }

    pub fn did_recreate_context(&mut self, client: &mut dyn SchedulerClient) {
        debug!("scheduler: rendering context recreated");
        self.state_machine.did_recreate_context();
        self.diagnostics.record(
            self.state_machine.current_frame_number(),
            CHANNEL_SCHEDULER_CONTEXT_RECREATED,
        );
        self.process_scheduled_actions(client);
    }

    pub fn set_timebase_and_interval(&mut self, timebase: Instant, interval: Duration) {
        self.frame_source.set_timebase_and_interval(timebase, interval);
    }

    pub fn anticipated_draw_time(&self) -> Instant {
        self.frame_source.next_tick_time()
    }

    pub fn commit_pending(&self) -> bool {
        self.state_machine.commit_pending()
    }

    pub fn diagnostics_snapshot(&self) -> serde_json::Value {
        self.diagnostics.snapshot()
    }

    /// Drain the machine until it reports no further action. The guard
    /// makes the outermost call the only one that loops: a client callback
    /// re-entering through a public method finds the guard set and returns
    /// immediately, leaving its flag mutations for this loop's next query.
    pub fn process_scheduled_actions(&mut self, client: &mut dyn SchedulerClient) {
        if self.inside_process_scheduled_actions {
            return;
        }
        self.inside_process_scheduled_actions = true;

        while let Some(action) = self.state_machine.next_action() {
            // State first, dispatch second: the machine optimistically
            // assumes the action happens, and divergence is reported back
            // through the completion feedback below.
            self.state_machine.update_state(action);
            self.diagnostics.record(
                self.state_machine.current_frame_number(),
                action_channel(action),
            );
            match action {
                SchedulerAction::BeginFrame => {
                    client.scheduled_action_begin_frame(&mut SchedulerRequests {
                        machine: &mut self.state_machine,
                    });
                }
                SchedulerAction::Commit => {
                    client.scheduled_action_commit(&mut SchedulerRequests {
                        machine: &mut self.state_machine,
                    });
                }
                SchedulerAction::DrawIfPossible => {
                    let result =
                        client.scheduled_action_draw_and_swap_if_possible(&mut SchedulerRequests {
                            machine: &mut self.state_machine,
                        });
                    match self
                        .state_machine
                        .did_draw_if_possible_completed(result.did_draw)
                    {
                        DrawCompletion::Drew => {}
                        DrawCompletion::Failed => {
                            self.diagnostics.record(
                                self.state_machine.current_frame_number(),
                                CHANNEL_SCHEDULER_DRAW_FAILED,
                            );
                        }
                        DrawCompletion::FailedAndEscalated => {
                            self.diagnostics.record(
                                self.state_machine.current_frame_number(),
                                CHANNEL_SCHEDULER_DRAW_FAILED,
                            );
                            self.diagnostics.record(
                                self.state_machine.current_frame_number(),
                                CHANNEL_SCHEDULER_DRAW_ESCALATED_TO_FORCED,
                            );
                        }
                    }
                    if result.did_swap {
                        self.frame_source.did_begin_frame();
                    }
                }
                SchedulerAction::DrawForced => {
                    let result =
                        client.scheduled_action_draw_and_swap_forced(&mut SchedulerRequests {
                            machine: &mut self.state_machine,
                        });
                    if result.did_swap {
                        self.frame_source.did_begin_frame();
                    }
                }
                SchedulerAction::BeginContextRecreation => {
                    client.scheduled_action_begin_context_recreation(&mut SchedulerRequests {
                        machine: &mut self.state_machine,
                    });
                }
                SchedulerAction::AcquireLayerTexturesForMainThread => {
                    client.scheduled_action_acquire_layer_textures_for_main_thread(
                        &mut SchedulerRequests {
                            machine: &mut self.state_machine,
                        },
                    );
                }
            }
        }

        // Power down the tick source whenever nothing is waiting on vsync,
        // and let the client realign speculative work to the next draw.
        self.frame_source
            .set_active(self.state_machine.vsync_callback_needed());
        client.did_anticipated_draw_time_change(self.frame_source.next_tick_time());
        self.inside_process_scheduled_actions = false;
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.frame_source.set_active(false);
    }
}
