use futures::Stream;
use shared::ServerEvent;
use tokio::sync::broadcast::{self, error::RecvError};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct UserEvent {
    pub user_id: Uuid,
    pub event: ServerEvent,
}

/// Typed fan-out of server events to the browsers of the user they concern.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<UserEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn publish(&self, user_id: Uuid, event: ServerEvent) {
        // No subscribers is not an error, the event just has nobody to reach.
        if self.sender.send(UserEvent { user_id, event }).is_err() {
            log::trace!("No event subscribers for user {}", user_id);
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UserEvent> {
        self.sender.subscribe()
    }

    /// Events for a single user, in publish order. Ends when the bus is dropped.
    pub fn user_stream(&self, user_id: Uuid) -> impl Stream<Item = ServerEvent> + use<> {
        futures::stream::unfold(self.subscribe(), move |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(user_event) if user_event.user_id == user_id => {
                        return Some((user_event.event, rx));
                    }
                    Ok(_) => continue,
                    Err(RecvError::Lagged(skipped)) => {
                        log::warn!("Event stream for {} lagged by {} events", user_id, skipped);
                    }
                    Err(RecvError::Closed) => return None,
                }
            }
        })
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

pub fn spawn_event_logger(bus: &EventBus) {
    let mut rx = bus.subscribe();
    actix_web::rt::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(UserEvent { user_id, event }) => match &event {
                    ServerEvent::Notice { notice } => {
                        log::info!("[{}] {}: {}", user_id, notice.level, notice.message)
                    }
                    ServerEvent::VerificationStateChanged { session_id, state } => {
                        log::debug!("[{}] verification {} -> {}", user_id, session_id, state)
                    }
                    ServerEvent::BalanceUpdated { balance } => {
                        log::info!("[{}] balance is now {}", user_id, balance)
                    }
                    ServerEvent::LoggedOut => log::info!("[{}] logged out", user_id),
                },
                Err(RecvError::Lagged(skipped)) => {
                    log::warn!("Event logger skipped {} events", skipped)
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn user_stream_only_sees_own_events() {
        let bus = EventBus::new(16);
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let mut stream = Box::pin(bus.user_stream(alice));

        bus.publish(bob, ServerEvent::BalanceUpdated { balance: 99 });
        bus.publish(alice, ServerEvent::BalanceUpdated { balance: 10 });
        bus.publish(alice, ServerEvent::LoggedOut);

        assert_eq!(
            stream.next().await,
            Some(ServerEvent::BalanceUpdated { balance: 10 })
        );
        assert_eq!(stream.next().await, Some(ServerEvent::LoggedOut));
    }

    #[test]
    fn publish_without_subscribers_is_silent() {
        let bus = EventBus::default();
        bus.publish(Uuid::new_v4(), ServerEvent::LoggedOut);
    }
}
