/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Contract for the vsync/frame-rate source that paces the scheduler.

use std::time::{Duration, Instant};

// 60Hz fallback for sources that were never given a real display interval.
const DEFAULT_DISPLAY_REFRESH_INTERVAL: Duration = Duration::from_nanos(16_666_667);

/// The external clock that decides when the display can take a frame.
///
/// The scheduler owns its source and drives the control surface below. The
/// reverse direction is wired by the embedder: whoever pumps the source's
/// ticks calls [`Scheduler::vsync_tick`](crate::Scheduler::vsync_tick) for
/// each one.
pub trait FrameSource {
    /// Power control. The scheduler keeps the source active only while
    /// [`SchedulerStateMachine::vsync_callback_needed`](crate::SchedulerStateMachine::vsync_callback_needed)
    /// holds, so an idle compositor stops receiving ticks entirely.
    fn set_active(&mut self, active: bool);

    /// Upper bound on swaps issued but not yet completed.
    fn set_max_frames_pending(&mut self, max: usize);

    /// Whether the platform reports swap completion. Sources without the
    /// signal must assume a fixed fast turnaround instead.
    fn set_swap_buffers_complete_supported(&mut self, supported: bool);

    /// A previously begun frame finished its swap.
    fn did_finish_frame(&mut self);

    /// Discard all in-flight frame accounting (context loss).
    fn did_abort_all_pending_frames(&mut self);

    /// A draw produced a swap; one more frame is now in flight.
    fn did_begin_frame(&mut self);

    fn set_timebase_and_interval(&mut self, timebase: Instant, interval: Duration);

    /// Predicted time of the next tick; published to the client as the
    /// anticipated draw time after every drain.
    fn next_tick_time(&self) -> Instant;
}

/// Frame source for headless embedders and tests: never ticks on its own,
/// but keeps honest tick-time predictions and pending-frame accounting so a
/// scheduler wired to it behaves normally when ticks are injected manually.
#[derive(Debug)]
pub struct NullFrameSource {
    active: bool,
    max_frames_pending: usize,
    swap_buffers_complete_supported: bool,
    frames_pending: usize,
    timebase: Instant,
    interval: Duration,
}

impl NullFrameSource {
    pub fn new() -> Self {
        Self {
            active: false,
            max_frames_pending: 1,
            swap_buffers_complete_supported: true,
            frames_pending: 0,
            timebase: Instant::now(),
            interval: DEFAULT_DISPLAY_REFRESH_INTERVAL,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn frames_pending(&self) -> usize {
        self.frames_pending
    }

    pub fn max_frames_pending(&self) -> usize {
        self.max_frames_pending
    }

    pub fn swap_buffers_complete_supported(&self) -> bool {
        self.swap_buffers_complete_supported
    }
}

impl Default for NullFrameSource {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSource for NullFrameSource {
    fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    fn set_max_frames_pending(&mut self, max: usize) {
        self.max_frames_pending = max.max(1);
    }

    fn set_swap_buffers_complete_supported(&mut self, supported: bool) {
        self.swap_buffers_complete_supported = supported;
    }

    fn did_finish_frame(&mut self) {
        self.frames_pending = self.frames_pending.saturating_sub(1);
    }

    fn did_abort_all_pending_frames(&mut self) {
        self.frames_pending = 0;
    }

    fn did_begin_frame(&mut self) {
        self.frames_pending = self.frames_pending.saturating_add(1);
    }

    fn set_timebase_and_interval(&mut self, timebase: Instant, interval: Duration) {
        self.timebase = timebase;
        self.interval = interval;
    }

    fn next_tick_time(&self) -> Instant {
        let now = Instant::now();
        if self.interval.is_zero() {
            return now;
        }
        // Round up from the timebase to the first tick boundary after now.
        let elapsed = now.saturating_duration_since(self.timebase);
        let remainder_ns = elapsed.as_nanos() % self.interval.as_nanos();
        let to_next_ns = self.interval.as_nanos() - remainder_ns;
        now + Duration::from_nanos(to_next_ns as u64)
    }
}
