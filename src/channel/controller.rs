use std::sync::atomic::{AtomicU8, Ordering};

use tokio::sync::{broadcast, watch};

use crate::pipe::{PipeCancel, PipeCompletion};

const CREATED: u8 = 0;
const RUNNING: u8 = 1;
const CLOSING: u8 = 2;
const CLOSED: u8 = 3;

/// Channel lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Created,
    Running,
    Closing,
    Closed,
}

/// Coordinates shutdown across the three loop tasks.
///
/// Close ordering: cancel the inbound reader so the parser exits promptly,
/// broadcast to the fill loop so it stops waiting on the transport, then
/// complete the outbound writer so pending senders fail and the send loop
/// drains out. All of it is idempotent.
#[derive(Debug)]
pub(crate) struct CloseController {
    state: AtomicU8,
    notify_shutdown: broadcast::Sender<()>,
    inbound_cancel: PipeCancel,
    outbound_done: PipeCompletion,
    closed_tx: watch::Sender<bool>,
}

impl CloseController {
    pub(crate) fn new(inbound_cancel: PipeCancel, outbound_done: PipeCompletion) -> Self {
        let (notify_shutdown, _) = broadcast::channel(1);
        let (closed_tx, _) = watch::channel(false);
        CloseController {
            state: AtomicU8::new(CREATED),
            notify_shutdown,
            inbound_cancel,
            outbound_done,
            closed_tx,
        }
    }

    pub(crate) fn state(&self) -> ChannelState {
        match self.state.load(Ordering::Acquire) {
            CREATED => ChannelState::Created,
            RUNNING => ChannelState::Running,
            CLOSING => ChannelState::Closing,
            _ => ChannelState::Closed,
        }
    }

    pub(crate) fn is_closing(&self) -> bool {
        self.state.load(Ordering::Acquire) >= CLOSING
    }

    pub(crate) fn subscribe_shutdown(&self) -> broadcast::Receiver<()> {
        self.notify_shutdown.subscribe()
    }

    pub(crate) fn subscribe_closed(&self) -> watch::Receiver<bool> {
        self.closed_tx.subscribe()
    }

    pub(crate) fn mark_running(&self) {
        let _ = self
            .state
            .compare_exchange(CREATED, RUNNING, Ordering::AcqRel, Ordering::Acquire);
    }

    pub(crate) fn transition_closing(&self) {
        let _ = self
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |state| match state {
                CREATED | RUNNING => Some(CLOSING),
                _ => None,
            });
    }

    pub(crate) fn close(&self) {
        self.transition_closing();
        self.inbound_cancel.cancel();
        let _ = self.notify_shutdown.send(());
        self.outbound_done.complete();
    }

    pub(crate) fn complete_outbound(&self) {
        self.outbound_done.complete();
    }

    pub(crate) fn set_closed(&self) {
        self.state.store(CLOSED, Ordering::Release);
        let _ = self.closed_tx.send(true);
    }
}
