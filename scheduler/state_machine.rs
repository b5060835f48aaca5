/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Pure decision core of the frame scheduler.
//!
//! `next_action` is a side-effect-free query over the machine's flags and
//! counters; `update_state` records the effect of dispatching the chosen
//! action. The caller must alternate the two; querying twice without an
//! intervening update returns the same action again. Everything here is
//! deterministic and clock-free; time only enters through the vsync
//! bracketing calls of the driver.

use log::{debug, warn};

use super::SchedulerSettings;

/// The single next step of the begin-frame → commit → draw pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerAction {
    BeginFrame,
    Commit,
    DrawIfPossible,
    DrawForced,
    BeginContextRecreation,
    AcquireLayerTexturesForMainThread,
}

/// Lifecycle of the one allowed in-flight begin-frame/commit cycle.
/// `FrameInProgress` is the backpressure marker: while set, no second
/// begin-frame can be issued, so a slow main thread cannot pipeline an
/// unbounded queue of commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CommitState {
    Idle,
    FrameInProgress,
    ReadyToCommit,
    WaitingForFirstDraw,
}

/// Who currently holds the layer textures. While the main thread holds
/// them, non-forced draws are suspended; a commit hands them back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextureOwnership {
    Unlocked,
    MainThread,
    ImplThread,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContextState {
    Active,
    Lost,
    Recreating,
}

/// Outcome of reconciling an optimistic `DrawIfPossible` dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawCompletion {
    Drew,
    Failed,
    /// The failure streak reached the configured limit; a forced redraw
    /// has been armed so progress is guaranteed on the next drain.
    FailedAndEscalated,
}

#[derive(Debug)]
pub struct SchedulerStateMachine {
    max_failed_draws_before_draw_is_forced: u32,

    can_begin_frame: bool,
    visible: bool,
    can_draw: bool,
    needs_commit: bool,
    needs_forced_commit: bool,
    needs_redraw: bool,
    needs_forced_redraw: bool,
    main_thread_needs_layer_textures: bool,
    inside_vsync: bool,

    commit_state: CommitState,
    texture_ownership: TextureOwnership,
    context_state: ContextState,

    current_frame_number: u64,
    last_frame_number_where_draw_was_called: Option<u64>,
    consecutive_failed_draws: u32,
}

impl SchedulerStateMachine {
    pub fn new(settings: &SchedulerSettings) -> Self {
        Self {
            max_failed_draws_before_draw_is_forced: settings
                .max_failed_draws_before_draw_is_forced
                .max(1),
            can_begin_frame: false,
            visible: false,
            can_draw: false,
            needs_commit: false,
            needs_forced_commit: false,
            needs_redraw: false,
            needs_forced_redraw: false,
            main_thread_needs_layer_textures: false,
            inside_vsync: false,
            commit_state: CommitState::Idle,
            texture_ownership: TextureOwnership::Unlocked,
            context_state: ContextState::Active,
            current_frame_number: 0,
            last_frame_number_where_draw_was_called: None,
            consecutive_failed_draws: 0,
        }
    }

    /// Pure query: the single best next action for the current flags, or
    /// `None` when the machine is idle. Context recreation preempts all
    /// other work; texture handoff precedes new frames; commits precede
    /// draws so a redraw stream can never starve a pending commit.
    pub fn next_action(&self) -> Option<SchedulerAction> {
        match self.context_state {
            ContextState::Lost => return Some(SchedulerAction::BeginContextRecreation),
            // Nothing may run against a dead context until the client
            // reports it recreated.
            ContextState::Recreating => return None,
            ContextState::Active => {}
        }
        if self.should_acquire_layer_textures() {
            return Some(SchedulerAction::AcquireLayerTexturesForMainThread);
        }
        if self.should_begin_frame() {
            return Some(SchedulerAction::BeginFrame);
        }
        if self.commit_state == CommitState::ReadyToCommit {
            return Some(SchedulerAction::Commit);
        }
        if self.needs_forced_redraw {
            return Some(SchedulerAction::DrawForced);
        }
        if self.should_draw_if_possible() {
            return Some(SchedulerAction::DrawIfPossible);
        }
        None
    }

    fn should_acquire_layer_textures(&self) -> bool {
        if !self.main_thread_needs_layer_textures {
            return false;
        }
        if self.texture_ownership == TextureOwnership::MainThread {
            return false;
        }
        // While a begin-frame/commit is in flight the textures are about to
        // be handed back through the commit anyway; acquiring now would
        // steal them out from under it.
        !matches!(
            self.commit_state,
            CommitState::FrameInProgress | CommitState::ReadyToCommit
        )
    }

    fn should_begin_frame(&self) -> bool {
        self.can_begin_frame
            && self.commit_state == CommitState::Idle
            && (self.needs_forced_commit || (self.needs_commit && self.visible))
    }

    fn should_draw_if_possible(&self) -> bool {
        self.needs_redraw
            && self.visible
            && self.can_draw
            && self.inside_vsync
            && self.texture_ownership != TextureOwnership::MainThread
            && self.last_frame_number_where_draw_was_called != Some(self.current_frame_number)
    }

    /// Record that `action` has been dispatched. Optimistic for draws: the
    /// redraw flags are cleared here and restored through
    /// [`did_draw_if_possible_completed`](Self::did_draw_if_possible_completed)
    /// if the draw turns out to have failed.
    pub fn update_state(&mut self, action: SchedulerAction) {
        match action {
            SchedulerAction::BeginFrame => {
                debug_assert_eq!(self.commit_state, CommitState::Idle);
                self.commit_state = CommitState::FrameInProgress;
                self.needs_commit = false;
                self.needs_forced_commit = false;
            }
            SchedulerAction::Commit => {
                debug_assert_eq!(self.commit_state, CommitState::ReadyToCommit);
                self.commit_state = CommitState::WaitingForFirstDraw;
                // A commit always produces new content to present, and
                // returns the layer textures to the compositor.
                self.needs_redraw = true;
                self.texture_ownership = TextureOwnership::ImplThread;
            }
            SchedulerAction::DrawIfPossible | SchedulerAction::DrawForced => {
                self.last_frame_number_where_draw_was_called = Some(self.current_frame_number);
                self.needs_redraw = false;
                self.needs_forced_redraw = false;
                if self.commit_state == CommitState::WaitingForFirstDraw {
                    self.commit_state = CommitState::Idle;
                }
            }
            SchedulerAction::BeginContextRecreation => {
                debug_assert_eq!(self.context_state, ContextState::Lost);
                self.context_state = ContextState::Recreating;
            }
            SchedulerAction::AcquireLayerTexturesForMainThread => {
                self.main_thread_needs_layer_textures = false;
                self.texture_ownership = TextureOwnership::MainThread;
            }
        }
    }

    pub fn set_can_begin_frame(&mut self, can: bool) {
        self.can_begin_frame = can;
    }

    /// Visibility gates normal frames but never cancels requests: a redraw
    /// pending across a hide/show cycle is still pending afterwards.
    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub fn set_can_draw(&mut self, can: bool) {
        self.can_draw = can;
    }

    pub fn set_needs_commit(&mut self) {
        self.needs_commit = true;
    }

    /// A commit that must happen regardless of visibility (shutdown,
    /// flush). Still subject to the one-in-flight rule.
    pub fn set_needs_forced_commit(&mut self) {
        self.needs_forced_commit = true;
    }

    pub fn set_needs_redraw(&mut self) {
        self.needs_redraw = true;
    }

    pub fn set_needs_forced_redraw(&mut self) {
        self.needs_forced_redraw = true;
    }

    /// One-shot request that the main thread be handed the layer textures.
    /// Requesting while the main thread already holds them is a contract
    /// violation.
    pub fn set_main_thread_needs_layer_textures(&mut self) {
        if self.main_thread_needs_layer_textures
            || self.texture_ownership == TextureOwnership::MainThread
        {
            debug_assert!(false, "layer texture request while already requested or held");
            warn!("scheduler: ignoring duplicate layer texture request from main thread");
            return;
        }
        self.main_thread_needs_layer_textures = true;
    }

    pub fn begin_frame_complete(&mut self) {
        if self.commit_state != CommitState::FrameInProgress {
            debug_assert!(false, "begin_frame_complete without an in-flight begin frame");
            warn!("scheduler: begin_frame_complete without an in-flight begin frame");
            return;
        }
        self.commit_state = CommitState::ReadyToCommit;
    }

    /// The main thread gave up on the in-flight frame. The commit request
    /// is re-armed so the aborted work is eventually retried.
    pub fn begin_frame_aborted(&mut self) {
        if self.commit_state != CommitState::FrameInProgress {
            debug_assert!(false, "begin_frame_aborted without an in-flight begin frame");
            warn!("scheduler: begin_frame_aborted without an in-flight begin frame");
            return;
        }
        self.commit_state = CommitState::Idle;
        self.needs_commit = true;
    }

    /// Reconcile an optimistic `DrawIfPossible`. A failed draw restores the
    /// redraw request and also requests a commit, since fresh content is
    /// the usual cure; repeated failures escalate to a forced redraw so a
    /// wedged drawability signal cannot stall the pipeline forever.
    pub fn did_draw_if_possible_completed(&mut self, did_draw: bool) -> DrawCompletion {
        if did_draw {
            self.consecutive_failed_draws = 0;
            return DrawCompletion::Drew;
        }

        self.needs_redraw = true;
        self.needs_commit = true;
        self.consecutive_failed_draws += 1;
        if self.consecutive_failed_draws >= self.max_failed_draws_before_draw_is_forced {
            debug!(
                "scheduler: {} consecutive failed draws, forcing a redraw",
                self.consecutive_failed_draws
            );
            self.consecutive_failed_draws = 0;
            self.needs_forced_redraw = true;
            return DrawCompletion::FailedAndEscalated;
        }
        DrawCompletion::Failed
    }

    pub fn did_enter_vsync(&mut self) {
        debug_assert!(!self.inside_vsync, "nested vsync entry");
        self.inside_vsync = true;
        self.current_frame_number += 1;
    }

    pub fn did_leave_vsync(&mut self) {
        debug_assert!(self.inside_vsync, "vsync exit without entry");
        self.inside_vsync = false;
    }

    /// Context loss preempts everything. Any in-flight begin-frame/commit
    /// can never complete against the dead context, so its bookkeeping is
    /// collapsed (begin-frame-aborted semantics) and the commit request
    /// re-armed; otherwise the one-in-flight marker would leak and block
    /// every future begin-frame.
    pub fn did_lose_context(&mut self) {
        self.context_state = ContextState::Lost;
        if self.commit_state != CommitState::Idle {
            self.commit_state = CommitState::Idle;
            self.needs_commit = true;
        }
    }

    /// Recreation finished. Content must be reproduced for the new
    /// context, so a commit is requested unconditionally.
    pub fn did_recreate_context(&mut self) {
        if self.context_state != ContextState::Recreating {
            debug_assert!(false, "did_recreate_context without a recreation in flight");
            warn!("scheduler: did_recreate_context without a recreation in flight");
        }
        self.context_state = ContextState::Active;
        self.needs_commit = true;
    }

    /// Whether the driver should keep vsync ticks coming. False whenever
    /// ticking cannot lead to a draw, so an idle compositor costs no power.
    pub fn vsync_callback_needed(&self) -> bool {
        if self.needs_forced_redraw {
            return true;
        }
        if !self.can_draw {
            return false;
        }
        self.needs_redraw && self.visible && self.context_state == ContextState::Active
    }

    pub fn current_frame_number(&self) -> u64 {
        self.current_frame_number
    }

    /// True from begin-frame dispatch until the resulting commit has been
    /// applied and drawn.
    pub fn commit_pending(&self) -> bool {
        self.commit_state != CommitState::Idle
    }

    #[cfg(test)]
    pub(crate) fn needs_redraw(&self) -> bool {
        self.needs_redraw
    }

    #[cfg(test)]
    pub(crate) fn needs_commit(&self) -> bool {
        self.needs_commit
    }
}
