/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Cross-thread request forwarding into the compositor-thread scheduler.
//!
//! The scheduler itself is single-threaded; producers on other threads
//! (typically the main thread) hold a cloneable [`SchedulerProxy`] and post
//! [`SchedulerRequest`]s. The compositor thread drains its
//! [`SchedulerMailbox`] whenever it gets control, applying every pending
//! request through the ordinary level-triggered setters.

use crossbeam_channel::{Receiver, Sender, TryRecvError, unbounded};
use log::warn;

use crate::client::SchedulerClient;
use crate::scheduler::Scheduler;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerRequest {
    NeedsCommit,
    NeedsForcedCommit,
    NeedsRedraw,
    NeedsForcedRedraw,
    MainThreadNeedsLayerTextures,
    BeginFrameComplete,
    BeginFrameAborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyError {
    /// The compositor-side mailbox has been dropped; the request was
    /// discarded. Producers normally treat this as shutdown.
    Disconnected,
}

/// Create a connected proxy/mailbox pair. The proxy half is `Send + Clone`
/// and may be handed to any number of producer threads.
pub fn scheduler_channel() -> (SchedulerProxy, SchedulerMailbox) {
    let (sender, receiver) = unbounded();
    (SchedulerProxy { sender }, SchedulerMailbox { receiver })
}

#[derive(Debug, Clone)]
pub struct SchedulerProxy {
    sender: Sender<SchedulerRequest>,
}

impl SchedulerProxy {
    pub fn post(&self, request: SchedulerRequest) -> Result<(), ProxyError> {
        self.sender.send(request).map_err(|_| {
            warn!("scheduler proxy: mailbox gone, discarding {request:?}");
            ProxyError::Disconnected
        })
    }
}

#[derive(Debug)]
pub struct SchedulerMailbox {
    receiver: Receiver<SchedulerRequest>,
}

impl SchedulerMailbox {
    /// Apply all pending requests in post order. Returns how many were
    /// applied. Each request drains the scheduler through the normal
    /// setter path, so actions are dispatched as eagerly as local calls.
    pub fn drain_into(
        &self,
        scheduler: &mut Scheduler,
        client: &mut dyn SchedulerClient,
    ) -> usize {
        let mut applied = 0;
        loop {
            match self.receiver.try_recv() {
                Ok(request) => {
                    apply_request(scheduler, client, request);
                    applied += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        applied
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

fn apply_request(
    scheduler: &mut Scheduler,
    client: &mut dyn SchedulerClient,
    request: SchedulerRequest,
) {
    match request {
        SchedulerRequest::NeedsCommit => scheduler.set_needs_commit(client),
        SchedulerRequest::NeedsForcedCommit => scheduler.set_needs_forced_commit(client),
        SchedulerRequest::NeedsRedraw => scheduler.set_needs_redraw(client),
        SchedulerRequest::NeedsForcedRedraw => scheduler.set_needs_forced_redraw(client),
        SchedulerRequest::MainThreadNeedsLayerTextures => {
            scheduler.set_main_thread_needs_layer_textures(client)
        }
        SchedulerRequest::BeginFrameComplete => scheduler.begin_frame_complete(client),
        SchedulerRequest::BeginFrameAborted => scheduler.begin_frame_aborted(client),
    }
}
