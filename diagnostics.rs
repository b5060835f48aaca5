/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Diagnostics channels and the dispatched-action sample ring.
//!
//! Channel ids follow the `component.event` convention so an embedding
//! shell can route them into its own diagnostics registry. The ring keeps
//! the most recent samples only; the snapshot carries the running total so
//! truncation is visible to whoever reads it.

use std::collections::VecDeque;

use serde::Serialize;

use crate::scheduler::state_machine::SchedulerAction;

pub const CHANNEL_SCHEDULER_ACTION_BEGIN_FRAME: &str = "scheduler.action.begin_frame";
pub const CHANNEL_SCHEDULER_ACTION_COMMIT: &str = "scheduler.action.commit";
pub const CHANNEL_SCHEDULER_ACTION_DRAW_IF_POSSIBLE: &str = "scheduler.action.draw_if_possible";
pub const CHANNEL_SCHEDULER_ACTION_DRAW_FORCED: &str = "scheduler.action.draw_forced";
pub const CHANNEL_SCHEDULER_ACTION_BEGIN_CONTEXT_RECREATION: &str =
    "scheduler.action.begin_context_recreation";
pub const CHANNEL_SCHEDULER_ACTION_ACQUIRE_LAYER_TEXTURES: &str =
    "scheduler.action.acquire_layer_textures";
pub const CHANNEL_SCHEDULER_DRAW_FAILED: &str = "scheduler.draw.failed";
pub const CHANNEL_SCHEDULER_DRAW_ESCALATED_TO_FORCED: &str = "scheduler.draw.escalated_to_forced";
pub const CHANNEL_SCHEDULER_BEGIN_FRAME_ABORTED: &str = "scheduler.begin_frame.aborted";
pub const CHANNEL_SCHEDULER_CONTEXT_LOST: &str = "scheduler.context.lost";
pub const CHANNEL_SCHEDULER_CONTEXT_RECREATED: &str = "scheduler.context.recreated";

/// Severity tier for channel prioritization in diagnostics panes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelSeverity {
    #[default]
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelDescriptor {
    pub channel_id: &'static str,
    pub severity: ChannelSeverity,
}

pub const SCHEDULER_CHANNELS: [ChannelDescriptor; 11] = [
    ChannelDescriptor {
        channel_id: CHANNEL_SCHEDULER_ACTION_BEGIN_FRAME,
        severity: ChannelSeverity::Info,
    },
    ChannelDescriptor {
        channel_id: CHANNEL_SCHEDULER_ACTION_COMMIT,
        severity: ChannelSeverity::Info,
    },
    ChannelDescriptor {
        channel_id: CHANNEL_SCHEDULER_ACTION_DRAW_IF_POSSIBLE,
        severity: ChannelSeverity::Info,
    },
    ChannelDescriptor {
        channel_id: CHANNEL_SCHEDULER_ACTION_DRAW_FORCED,
        severity: ChannelSeverity::Info,
    },
    ChannelDescriptor {
        channel_id: CHANNEL_SCHEDULER_ACTION_BEGIN_CONTEXT_RECREATION,
        severity: ChannelSeverity::Warn,
    },
    ChannelDescriptor {
        channel_id: CHANNEL_SCHEDULER_ACTION_ACQUIRE_LAYER_TEXTURES,
        severity: ChannelSeverity::Info,
    },
    ChannelDescriptor {
        channel_id: CHANNEL_SCHEDULER_DRAW_FAILED,
        severity: ChannelSeverity::Warn,
    },
    ChannelDescriptor {
        channel_id: CHANNEL_SCHEDULER_DRAW_ESCALATED_TO_FORCED,
        severity: ChannelSeverity::Warn,
    },
    ChannelDescriptor {
        channel_id: CHANNEL_SCHEDULER_BEGIN_FRAME_ABORTED,
        severity: ChannelSeverity::Warn,
    },
    ChannelDescriptor {
        channel_id: CHANNEL_SCHEDULER_CONTEXT_LOST,
        severity: ChannelSeverity::Error,
    },
    ChannelDescriptor {
        channel_id: CHANNEL_SCHEDULER_CONTEXT_RECREATED,
        severity: ChannelSeverity::Info,
    },
];

pub fn channel_severity(channel_id: &str) -> Option<ChannelSeverity> {
    SCHEDULER_CHANNELS
        .iter()
        .find(|descriptor| descriptor.channel_id == channel_id)
        .map(|descriptor| descriptor.severity)
}

pub fn action_channel(action: SchedulerAction) -> &'static str {
    match action {
        SchedulerAction::BeginFrame => CHANNEL_SCHEDULER_ACTION_BEGIN_FRAME,
        SchedulerAction::Commit => CHANNEL_SCHEDULER_ACTION_COMMIT,
        SchedulerAction::DrawIfPossible => CHANNEL_SCHEDULER_ACTION_DRAW_IF_POSSIBLE,
        SchedulerAction::DrawForced => CHANNEL_SCHEDULER_ACTION_DRAW_FORCED,
        SchedulerAction::BeginContextRecreation => CHANNEL_SCHEDULER_ACTION_BEGIN_CONTEXT_RECREATION,
        SchedulerAction::AcquireLayerTexturesForMainThread => {
            CHANNEL_SCHEDULER_ACTION_ACQUIRE_LAYER_TEXTURES
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionSample {
    pub sequence: u64,
    pub frame_number: u64,
    pub channel_id: &'static str,
}

#[derive(Debug)]
pub struct SchedulerDiagnostics {
    samples: VecDeque<ActionSample>,
    retention: usize,
    total_recorded: u64,
}

impl SchedulerDiagnostics {
    pub fn new(retention: usize) -> Self {
        let retention = retention.max(1);
        Self {
            samples: VecDeque::with_capacity(retention),
            retention,
            total_recorded: 0,
        }
    }

    pub fn record(&mut self, frame_number: u64, channel_id: &'static str) {
        if self.samples.len() == self.retention {
            self.samples.pop_front();
        }
        self.total_recorded += 1;
        self.samples.push_back(ActionSample {
            sequence: self.total_recorded,
            frame_number,
            channel_id,
        });
    }

    pub fn recent(&self) -> impl Iterator<Item = &ActionSample> {
        self.samples.iter()
    }

    pub fn snapshot(&self) -> serde_json::Value {
        let samples: Vec<&ActionSample> = self.samples.iter().collect();
        serde_json::json!({
            "total_recorded": self.total_recorded,
            "retention": self.retention,
            "samples": samples,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_action_maps_to_a_registered_channel() {
        let actions = [
            SchedulerAction::BeginFrame,
            SchedulerAction::Commit,
            SchedulerAction::DrawIfPossible,
            SchedulerAction::DrawForced,
            SchedulerAction::BeginContextRecreation,
            SchedulerAction::AcquireLayerTexturesForMainThread,
        ];
        for action in actions {
            assert!(channel_severity(action_channel(action)).is_some());
        }
    }

    #[test]
    fn context_loss_is_the_only_error_tier_channel() {
        let errors: Vec<&str> = SCHEDULER_CHANNELS
            .iter()
            .filter(|descriptor| descriptor.severity == ChannelSeverity::Error)
            .map(|descriptor| descriptor.channel_id)
            .collect();
        assert_eq!(errors, vec![CHANNEL_SCHEDULER_CONTEXT_LOST]);
    }

    #[test]
    fn ring_truncates_to_retention_and_keeps_running_total() {
        let mut diagnostics = SchedulerDiagnostics::new(2);
        diagnostics.record(1, CHANNEL_SCHEDULER_ACTION_BEGIN_FRAME);
        diagnostics.record(1, CHANNEL_SCHEDULER_ACTION_COMMIT);
        diagnostics.record(2, CHANNEL_SCHEDULER_ACTION_DRAW_IF_POSSIBLE);

        let snapshot = diagnostics.snapshot();
        assert_eq!(snapshot["total_recorded"], 3);
        assert_eq!(snapshot["samples"].as_array().map(Vec::len), Some(2));
        assert_eq!(
            snapshot["samples"][0]["channel_id"],
            CHANNEL_SCHEDULER_ACTION_COMMIT
        );
        assert_eq!(snapshot["samples"][1]["sequence"], 3);
    }

    #[test]
    fn zero_retention_is_clamped_to_one_sample() {
        let mut diagnostics = SchedulerDiagnostics::new(0);
        diagnostics.record(1, CHANNEL_SCHEDULER_ACTION_BEGIN_FRAME);
        diagnostics.record(1, CHANNEL_SCHEDULER_ACTION_COMMIT);
        assert_eq!(diagnostics.recent().count(), 1);
    }
}
