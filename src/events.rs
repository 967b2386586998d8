//! External change notifications.
//!
//! The wallet can switch accounts or networks under the UI at any moment.
//! The subscriber drains the provider's notification inbox one event at a
//! time — each handler completes before the next event is looked at, so
//! event-driven mutations obey the same exclusivity rules as user-driven
//! ones.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::Web3Error;
use crate::provider::ProviderEvent;
use crate::session::Session;

/// Consumes wallet notifications and re-synchronizes the session.
pub struct EventSubscriber {
    session: Session,
    inbox: mpsc::UnboundedReceiver<ProviderEvent>,
}

impl EventSubscriber {
    /// Subscribe to the session's provider. Returns `None` when the session
    /// has no provider (nothing will ever notify).
    pub fn attach(session: &Session) -> Option<Self> {
        let inbox = session.provider()?.subscribe();
        Some(Self {
            session: session.clone(),
            inbox,
        })
    }

    /// Drain the inbox until the provider closes it.
    pub async fn run(mut self) {
        while let Some(event) = self.inbox.recv().await {
            if let Err(e) = self.handle(event).await {
                match e {
                    // Lost the flag race against a user-driven operation;
                    // its completion path re-reads external state anyway.
                    Web3Error::Busy => log::warn!("dropping wallet event, session busy"),
                    other => log::warn!("wallet event handling failed: {}", other),
                }
            }
        }
        log::debug!("provider notification channel closed");
    }

    async fn handle(&self, event: ProviderEvent) -> Result<(), Web3Error> {
        match event {
            ProviderEvent::AccountsChanged(accounts) => {
                self.session.handle_accounts_changed(accounts).await
            }
            ProviderEvent::ChainChanged(chain_id) => {
                self.session.handle_chain_changed(chain_id).await
            }
        }
    }
}

/// Attach and run the subscriber on the current tokio runtime.
pub fn spawn(session: &Session) -> Option<JoinHandle<()>> {
    EventSubscriber::attach(session).map(|subscriber| tokio::spawn(subscriber.run()))
}
