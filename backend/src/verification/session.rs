use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Tracks the one active verification chain per user.
///
/// Starting a chain supersedes whatever chain the user had running; the old
/// chain notices through its ticket and drops its result.
#[derive(Clone, Default)]
pub struct VerificationSessions {
    active: Arc<Mutex<HashMap<Uuid, Uuid>>>,
}

impl VerificationSessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self, user_id: Uuid) -> SessionTicket {
        let session_id = Uuid::new_v4();
        let previous = self
            .active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(user_id, session_id);
        if let Some(previous) = previous {
            log::info!(
                "Verification {} for user {} superseded by {}",
                previous,
                user_id,
                session_id
            );
        }
        SessionTicket {
            user_id,
            session_id,
            sessions: self.clone(),
        }
    }

    fn current(&self, user_id: Uuid) -> Option<Uuid> {
        self.active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&user_id)
            .copied()
    }
}

pub struct SessionTicket {
    pub user_id: Uuid,
    pub session_id: Uuid,
    sessions: VerificationSessions,
}

impl SessionTicket {
    pub fn is_current(&self) -> bool {
        self.sessions.current(self.user_id) == Some(self.session_id)
    }

    /// Releases the slot, unless a newer chain already took it.
    pub fn finish(self) {
        let mut active = self
            .sessions
            .active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if active.get(&self.user_id) == Some(&self.session_id) {
            active.remove(&self.user_id);
        }
    }

    #[cfg(test)]
    pub fn detached(user_id: Uuid) -> Self {
        VerificationSessions::new().begin(user_id)
    }
}
