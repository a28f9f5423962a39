//! Broadcast-style lifecycle notifications.
//!
//! The host delivers OS lifecycle events (such as "user unlocked") as
//! `Broadcast`s. Subscribers register for a single action and receive
//! matching broadcasts over their own unbounded channel; deregistering drops
//! the sending half, which ends the subscriber's receive loop.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::app::BootError;

/// Action delivered once credential-protected storage becomes accessible.
pub const ACTION_USER_UNLOCKED: &str = "android.intent.action.USER_UNLOCKED";

/// A lifecycle notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Broadcast {
    action: String,
}

impl Broadcast {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
        }
    }

    /// The "user storage unlocked" notification.
    pub fn user_unlocked() -> Self {
        Self::new(ACTION_USER_UNLOCKED)
    }

    pub fn action(&self) -> &str {
        &self.action
    }
}

/// Identifies a registered receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReceiverId(u64);

impl fmt::Display for ReceiverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

struct Registration {
    action: String,
    sender: mpsc::UnboundedSender<Broadcast>,
}

/// Routes broadcasts to registered receivers.
#[derive(Default)]
pub struct BroadcastBus {
    next_id: AtomicU64,
    receivers: Mutex<HashMap<ReceiverId, Registration>>,
}

impl fmt::Debug for BroadcastBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BroadcastBus")
            .field("receivers", &self.receivers.lock().len())
            .finish()
    }
}

impl BroadcastBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register for broadcasts with the given action.
    pub fn register(
        &self,
        action: impl Into<String>,
    ) -> (ReceiverId, mpsc::UnboundedReceiver<Broadcast>) {
        let id = ReceiverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (sender, receiver) = mpsc::unbounded_channel();
        let action = action.into();
        debug!(receiver = %id, action = %action, "Broadcast receiver registered");
        self.receivers
            .lock()
            .insert(id, Registration { action, sender });
        (id, receiver)
    }

    /// Remove a receiver. Fails if it is not registered.
    pub fn unregister(&self, id: ReceiverId) -> Result<(), BootError> {
        match self.receivers.lock().remove(&id) {
            Some(_) => {
                debug!(receiver = %id, "Broadcast receiver unregistered");
                Ok(())
            }
            None => Err(BootError::ListenerDeregisterFailure { id }),
        }
    }

    /// Deliver a broadcast to every receiver registered for its action.
    ///
    /// Receivers whose channel has closed are pruned. Returns the number of
    /// receivers the broadcast was delivered to.
    pub fn send(&self, broadcast: &Broadcast) -> usize {
        let mut receivers = self.receivers.lock();
        let mut delivered = 0;
        receivers.retain(|id, registration| {
            if registration.action != broadcast.action {
                return true;
            }
            match registration.sender.send(broadcast.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(_) => {
                    trace!(receiver = %id, "Pruning closed broadcast receiver");
                    false
                }
            }
        });
        debug!(action = %broadcast.action, delivered, "Broadcast sent");
        delivered
    }

    /// Number of registered receivers.
    pub fn receiver_count(&self) -> usize {
        self.receivers.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_routes_by_action() {
        let bus = BroadcastBus::new();
        let (_, mut unlocked) = bus.register(ACTION_USER_UNLOCKED);
        let (_, mut other) = bus.register("android.intent.action.LOCALE_CHANGED");

        assert_eq!(bus.send(&Broadcast::user_unlocked()), 1);
        assert_eq!(unlocked.try_recv().unwrap(), Broadcast::user_unlocked());
        assert!(other.try_recv().is_err());
    }

    #[test]
    fn test_unregister_closes_channel() {
        let bus = BroadcastBus::new();
        let (id, mut receiver) = bus.register(ACTION_USER_UNLOCKED);

        bus.unregister(id).unwrap();
        assert_eq!(bus.receiver_count(), 0);
        assert_eq!(bus.send(&Broadcast::user_unlocked()), 0);
        assert!(matches!(
            receiver.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }

    #[test]
    fn test_unregister_twice_fails() {
        let bus = BroadcastBus::new();
        let (id, _receiver) = bus.register(ACTION_USER_UNLOCKED);
        bus.unregister(id).unwrap();
        assert!(matches!(
            bus.unregister(id),
            Err(BootError::ListenerDeregisterFailure { .. })
        ));
    }

    #[test]
    fn test_closed_receivers_are_pruned() {
        let bus = BroadcastBus::new();
        let (_, receiver) = bus.register(ACTION_USER_UNLOCKED);
        drop(receiver);
        assert_eq!(bus.send(&Broadcast::user_unlocked()), 0);
        assert_eq!(bus.receiver_count(), 0);
    }
}
