//! Storage-unlock gate.
//!
//! Decides once per process start whether credential-protected storage is
//! accessible. The sampled value is the single branch point for the
//! bootstrap; afterwards the state may only move from locked to unlocked.
//!
//! ```text
//! Locked --[USER_UNLOCKED]--> Unlocked
//! Unlocked (terminal)
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

use tracing::{debug, info};

use crate::platform::Platform;

/// Result of the gate evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageAccess {
    Unlocked,
    Locked,
}

/// Live policy query: storage is accessible when the platform has no
/// split storage, or when the user has unlocked since boot.
pub fn storage_unlocked(platform: &dyn Platform) -> bool {
    !platform.supports_split_storage() || platform.is_user_unlocked()
}

/// Process-wide storage access state.
#[derive(Debug, Default)]
pub struct StorageGate {
    sampled: OnceLock<StorageAccess>,
    unlocked: AtomicBool,
}

impl StorageGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate the gate. Only the first call samples the platform; later
    /// calls return that first answer.
    pub fn evaluate(&self, platform: &dyn Platform) -> StorageAccess {
        *self.sampled.get_or_init(|| {
            let access = if storage_unlocked(platform) {
                self.unlocked.store(true, Ordering::SeqCst);
                StorageAccess::Unlocked
            } else {
                StorageAccess::Locked
            };
            info!(
                split_storage = platform.supports_split_storage(),
                access = ?access,
                "Storage gate evaluated"
            );
            access
        })
    }

    /// The value sampled at start, if evaluated.
    pub fn initial(&self) -> Option<StorageAccess> {
        self.sampled.get().copied()
    }

    /// Whether credential storage is accessible now.
    pub fn is_unlocked(&self) -> bool {
        self.unlocked.load(Ordering::SeqCst)
    }

    /// Record the locked -> unlocked transition.
    ///
    /// Returns `true` only for the call that performed the transition.
    pub fn mark_unlocked(&self) -> bool {
        let transitioned = self
            .unlocked
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();
        if transitioned {
            info!("Credential-protected storage unlocked");
        } else {
            debug!("Storage already unlocked");
        }
        transitioned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::BootConfig;
    use crate::platform::DirPlatform;

    #[test]
    fn test_unsplit_platform_is_always_unlocked() {
        let config = BootConfig::new("/data").with_split_storage(false);
        let platform = DirPlatform::from_config(&config).locked();
        assert!(storage_unlocked(&platform));
        assert_eq!(StorageGate::new().evaluate(&platform), StorageAccess::Unlocked);
    }

    #[test]
    fn test_split_platform_follows_user_unlock() {
        let config = BootConfig::new("/data");
        let platform = DirPlatform::from_config(&config).locked();
        assert!(!storage_unlocked(&platform));
        platform.unlock();
        assert!(storage_unlocked(&platform));
    }

    #[test]
    fn test_evaluate_samples_once() {
        let config = BootConfig::new("/data");
        let platform = DirPlatform::from_config(&config).locked();
        let gate = StorageGate::new();

        assert_eq!(gate.evaluate(&platform), StorageAccess::Locked);
        platform.unlock();
        assert_eq!(gate.evaluate(&platform), StorageAccess::Locked);
        assert_eq!(gate.initial(), Some(StorageAccess::Locked));
        assert!(!gate.is_unlocked());
    }

    #[test]
    fn test_mark_unlocked_transitions_once() {
        let gate = StorageGate::new();
        assert!(gate.mark_unlocked());
        assert!(!gate.mark_unlocked());
        assert!(gate.is_unlocked());
    }

    #[test]
    fn test_unlocked_start_cannot_transition_again() {
        let config = BootConfig::new("/data");
        let platform = DirPlatform::from_config(&config);
        let gate = StorageGate::new();
        assert_eq!(gate.evaluate(&platform), StorageAccess::Unlocked);
        assert!(!gate.mark_unlocked());
    }
}
