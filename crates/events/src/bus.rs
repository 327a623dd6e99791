//! Publish/subscribe abstraction (mechanics only).
//!
//! The billing gateway delivers its results from whatever thread the native
//! layer happens to call back on. Those deliveries are published onto a bus
//! and the reconciliation core drains its [`Subscription`] from its own
//! update loop, so entitlement state is only ever touched from one thread.
//!
//! Delivery is in publish order per publisher. Nothing is persisted; a
//! subscription only sees messages published after it was created.

use std::sync::Arc;
use std::sync::mpsc::Receiver;

/// Receiving end of a bus.
///
/// Intended for single-threaded consumption: one owner drains it, typically
/// once per tick via [`Subscription::drain`].
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Take every message queued so far, in arrival order, without blocking.
    ///
    /// Messages published while the drain is in progress may or may not be
    /// included; anything missed is picked up by the next drain.
    pub fn drain(&self) -> Vec<M> {
        self.receiver.try_iter().collect()
    }
}

/// Pub/sub bus. Each subscriber receives a copy of every published message.
///
/// Implementations must be `Send + Sync`: publishers live on gateway
/// callback threads while the subscriber lives on the update loop.
pub trait EventBus<M>: Send + Sync {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    fn publish(&self, message: M) -> Result<(), Self::Error>;

    fn subscribe(&self) -> Subscription<M>;
}

impl<M, B> EventBus<M> for Arc<B>
where
    B: EventBus<M> + ?Sized,
{
    type Error = B::Error;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        (**self).publish(message)
    }

    fn subscribe(&self) -> Subscription<M> {
        (**self).subscribe()
    }
}
