//! # Unit Mailboxes
//!
//! The message channel between the orchestrator and one execution unit.
//!
//! A [`duplex`] call returns the two ends of a bidirectional link made of two
//! flume channels. Each end posts encoded frames to its peer and receives the
//! frames its peer posted. Nothing but frames crosses the link: the unit and
//! the orchestrator share no mutable state.
//!
//! A bounded link makes `post` wait for room; an unbounded one never waits.

use flume::{Receiver, Sender};

use weft_api::Frame;

use crate::error::MailboxError;

/// One end of a unit link.
#[derive(Debug)]
pub struct Mailbox {
    /// Frames to the peer
    outbound: Sender<Frame>,
    /// Frames from the peer
    inbound: Receiver<Frame>,
}

/// Create a linked pair of mailboxes: `(orchestrator end, unit end)`.
pub fn duplex(capacity: Option<usize>) -> (Mailbox, Mailbox) {
    let (to_unit, unit_inbox) = channel(capacity);
    let (to_orchestrator, orchestrator_inbox) = channel(capacity);

    let orchestrator = Mailbox {
        outbound: to_unit,
        inbound: orchestrator_inbox,
    };
    let unit = Mailbox {
        outbound: to_orchestrator,
        inbound: unit_inbox,
    };

    (orchestrator, unit)
}

fn channel(capacity: Option<usize>) -> (Sender<Frame>, Receiver<Frame>) {
    match capacity {
        Some(capacity) => flume::bounded(capacity),
        None => flume::unbounded(),
    }
}

impl Mailbox {
    /// Post a frame to the peer, waiting for room if the link is bounded.
    pub async fn post(&self, frame: Frame) -> Result<(), MailboxError> {
        self.outbound
            .send_async(frame)
            .await
            .map_err(|_| MailboxError::Closed)
    }

    /// Receive the next frame from the peer.
    ///
    /// Returns `MailboxError::Closed` once the peer is gone and every frame it
    /// posted has been received.
    pub async fn next_frame(&self) -> Result<Frame, MailboxError> {
        self.inbound
            .recv_async()
            .await
            .map_err(|_| MailboxError::Closed)
    }

    /// A sender posting to this end's peer.
    pub fn sender(&self) -> Sender<Frame> {
        self.outbound.clone()
    }

    /// A receiver for frames from the peer, for draining them on another task.
    pub fn receiver(&self) -> Receiver<Frame> {
        self.inbound.clone()
    }
}
