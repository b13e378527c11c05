//! Ordered asynchronous publish/subscribe
//!
//! Listeners run one at a time, in subscription order, and `emit` only returns
//! after the last listener's future has completed. A listener registered after
//! another therefore always observes the earlier listener's effects.

use crate::contract::CfgError;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Handle returned by [`EventDispatcher::on`], used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Event listener
#[async_trait]
pub trait Listener<E: Send + Sync>: Send + Sync {
    /// Handle one firing; an error stops the remaining listeners of this firing
    async fn handle(&self, event: &E) -> Result<(), CfgError>;
}

/// Adapter turning an async closure into a [`Listener`]
pub struct FnListener<F>(F);

#[async_trait]
impl<E, F, Fut> Listener<E> for FnListener<F>
where
    E: Clone + Send + Sync + 'static,
    F: Fn(E) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), CfgError>> + Send,
{
    async fn handle(&self, event: &E) -> Result<(), CfgError> {
        (self.0)(event.clone()).await
    }
}

struct Registration<E> {
    id: ListenerId,
    owner: Option<Uuid>,
    listener: Arc<dyn Listener<E>>,
}

/// Sequential event dispatcher for one event type
pub struct EventDispatcher<E> {
    listeners: RwLock<Vec<Registration<E>>>,
    next_id: AtomicU64,
}

impl<E: Send + Sync + 'static> EventDispatcher<E> {
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Subscribe a listener at the end of the order
    pub fn on<L>(&self, listener: L) -> ListenerId
    where
        L: Listener<E> + 'static,
    {
        self.register(None, Arc::new(listener))
    }

    /// Subscribe an async closure at the end of the order
    pub fn on_fn<F, Fut>(&self, f: F) -> ListenerId
    where
        E: Clone,
        F: Fn(E) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), CfgError>> + Send + 'static,
    {
        self.register(None, Arc::new(FnListener(f)))
    }

    /// Subscribe on behalf of `owner`, dropping any listener the same owner
    /// registered before. Repeated calls never accumulate bindings.
    pub fn on_owned(&self, owner: Uuid, listener: Arc<dyn Listener<E>>) -> ListenerId {
        self.listeners.write().retain(|r| r.owner != Some(owner));
        self.register(Some(owner), listener)
    }

    /// Unsubscribe; returns false when the id was not registered
    pub fn off(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|r| r.id != id);
        listeners.len() != before
    }

    /// Unsubscribe whatever `owner` registered
    pub fn off_owner(&self, owner: Uuid) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|r| r.owner != Some(owner));
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Fire an event and wait for every listener in turn.
    ///
    /// The listener list is captured when the firing starts; subscriptions made
    /// by a running listener take effect from the next firing.
    pub async fn emit(&self, event: E) -> Result<(), CfgError> {
        let listeners: Vec<Arc<dyn Listener<E>>> = self
            .listeners
            .read()
            .iter()
            .map(|r| r.listener.clone())
            .collect();

        for listener in listeners {
            listener.handle(&event).await?;
        }
        Ok(())
    }

    fn register(&self, owner: Option<Uuid>, listener: Arc<dyn Listener<E>>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push(Registration {
            id,
            owner,
            listener,
        });
        id
    }
}

impl<E: Send + Sync + 'static> Default for EventDispatcher<E> {
    fn default() -> Self {
        Self::new()
    }
}
