//! One-shot listener for the "user unlocked" notification.
//!
//! ```text
//! Armed --USER_UNLOCKED--> Fired
//!   │                        │
//!   └─ other actions ignored └─ further notifications are no-ops
//! ```
//!
//! The listener is armed by the bootstrap when storage is locked at start.
//! The first matching notification deregisters it from the bus and runs the
//! deferred pass (preferences, dictionary, theme) against the credential
//! context that is current at that moment.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Weak};

use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::app::{self, AppState, BootError, BootResult};
use crate::broadcast::{Broadcast, BroadcastBus, ReceiverId, ACTION_USER_UNLOCKED};

const ARMED: u8 = 0;
const FIRED: u8 = 1;

/// Listener lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Armed,
    Fired,
}

/// Deferred-unlock listener.
pub struct UnlockListener {
    id: ReceiverId,
    state: AtomicU8,
    bus: Arc<BroadcastBus>,
    app: Weak<AppState>,
}

impl fmt::Debug for UnlockListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnlockListener")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish()
    }
}

impl UnlockListener {
    /// Register for `USER_UNLOCKED` on the state's bus.
    ///
    /// Returns the armed listener and the channel its notifications arrive on.
    pub fn arm(state: &Arc<AppState>) -> (Arc<Self>, UnboundedReceiver<Broadcast>) {
        let bus = Arc::clone(state.bus());
        let (id, receiver) = bus.register(ACTION_USER_UNLOCKED);
        let listener = Arc::new(Self {
            id,
            state: AtomicU8::new(ARMED),
            bus,
            app: Arc::downgrade(state),
        });
        info!(receiver = %id, "Unlock listener armed");
        (listener, receiver)
    }

    /// Feed every notification from `receiver` to [`on_receive`] on the
    /// current tokio runtime. The task ends when the channel closes, which
    /// happens once the listener has deregistered.
    ///
    /// [`on_receive`]: Self::on_receive
    pub fn listen(
        self: Arc<Self>,
        mut receiver: UnboundedReceiver<Broadcast>,
    ) -> BootResult<JoinHandle<()>> {
        let handle = Handle::try_current().map_err(|_| BootError::NoRuntime("unlock listener"))?;
        Ok(handle.spawn(async move {
            while let Some(broadcast) = receiver.recv().await {
                self.on_receive(&broadcast);
            }
            debug!(receiver = %self.id, "Unlock listener channel closed");
        }))
    }

    /// Handle one notification.
    ///
    /// Returns `true` only for the call that moved the listener from
    /// `Armed` to `Fired`.
    pub fn on_receive(&self, broadcast: &Broadcast) -> bool {
        if broadcast.action() != ACTION_USER_UNLOCKED {
            debug!(action = broadcast.action(), "Ignoring broadcast");
            return false;
        }
        if self
            .state
            .compare_exchange(ARMED, FIRED, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!(receiver = %self.id, "Unlock listener already fired");
            return false;
        }

        info!(receiver = %self.id, "User unlocked, running deferred initialization");
        if let Err(e) = self.bus.unregister(self.id) {
            warn!(error = %e, "Failed to deregister unlock listener");
        }

        match self.app.upgrade() {
            Some(state) => {
                app::run_deferred_pass(&state);
            }
            None => warn!("Application state dropped before unlock"),
        }
        true
    }

    pub fn state(&self) -> ListenerState {
        match self.state.load(Ordering::SeqCst) {
            ARMED => ListenerState::Armed,
            _ => ListenerState::Fired,
        }
    }

    pub fn id(&self) -> ReceiverId {
        self.id
    }
}
