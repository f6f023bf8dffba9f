//! Single-assignment result cells shared by concurrent callers.
//!
//! A [`Flight`] is held by the one caller that performs a computation; every
//! other caller holds a [`FlightWaiter`] and awaits the same outcome. The
//! outcome is written exactly once. If the owner is dropped without
//! completing, waiters observe [`RenderError::Abandoned`].

use super::error::{RenderError, RenderResult};
use tokio::sync::watch;

/// Owning side of an in-flight computation.
pub struct Flight<T> {
    tx: watch::Sender<Option<RenderResult<T>>>,
}

/// Awaiting side of an in-flight computation. Cheap to clone.
pub struct FlightWaiter<T> {
    rx: watch::Receiver<Option<RenderResult<T>>>,
}

impl<T> Clone for FlightWaiter<T> {
    fn clone(&self) -> Self {
        Self {
            rx: self.rx.clone(),
        }
    }
}

impl<T: Clone> Flight<T> {
    /// Creates a new unresolved flight and its first waiter.
    pub fn new() -> (Self, FlightWaiter<T>) {
        let (tx, rx) = watch::channel(None);
        (Self { tx }, FlightWaiter { rx })
    }

    /// Publishes the outcome to all current and future waiters.
    pub fn complete(self, result: RenderResult<T>) {
        // send_replace stores the value even when nobody is subscribed.
        self.tx.send_replace(Some(result));
    }
}

impl<T: Clone> FlightWaiter<T> {
    /// Returns true once the owner has published an outcome.
    pub fn is_settled(&self) -> bool {
        self.rx.borrow().is_some()
    }

    /// Waits for the outcome of the flight.
    pub async fn wait(mut self) -> RenderResult<T> {
        match self.rx.wait_for(Option::is_some).await {
            Ok(settled) => settled.clone().unwrap_or(Err(RenderError::Abandoned)),
            Err(_) => Err(RenderError::Abandoned),
        }
    }
}
