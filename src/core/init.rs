//! One-time lazy initialization shared across concurrent callers.

use super::error::RenderResult;
use super::flight::{Flight, FlightWaiter};
use log::{debug, error};
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Observable phase of an [`InitCell`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitPhase {
    Uninitialized,
    Initializing,
    Ready,
}

enum InitState {
    Uninitialized,
    Initializing(FlightWaiter<()>),
    Ready,
}

/// Three-state initialization machine.
///
/// The `Initializing` state stores the in-flight computation, so late
/// callers await it instead of starting a second initialization. Success is
/// permanent; failure resets the cell to `Uninitialized` so a later call can
/// retry.
pub struct InitCell {
    state: Mutex<InitState>,
}

enum Role {
    Ready,
    Join(FlightWaiter<()>),
    Own(Flight<()>),
}

impl InitCell {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(InitState::Uninitialized),
        }
    }

    fn lock(&self) -> MutexGuard<'_, InitState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn phase(&self) -> InitPhase {
        match &*self.lock() {
            InitState::Uninitialized => InitPhase::Uninitialized,
            InitState::Initializing(_) => InitPhase::Initializing,
            InitState::Ready => InitPhase::Ready,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.phase() == InitPhase::Ready
    }

    /// Runs `init` unless the cell is ready or another caller is already
    /// initializing, in which case that caller's outcome is awaited.
    pub async fn ensure<F, Fut>(&self, init: F) -> RenderResult<()>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = RenderResult<()>>,
    {
        let role = {
            let mut state = self.lock();
            match &*state {
                InitState::Ready => Role::Ready,
                InitState::Initializing(waiter) => Role::Join(waiter.clone()),
                InitState::Uninitialized => {
                    let (flight, waiter) = Flight::new();
                    *state = InitState::Initializing(waiter);
                    Role::Own(flight)
                }
            }
        };

        let flight = match role {
            Role::Ready => return Ok(()),
            Role::Join(waiter) => {
                debug!("joining in-flight backend initialization");
                return waiter.wait().await;
            }
            Role::Own(flight) => flight,
        };

        debug!("starting backend initialization");
        let guard = InitGuard {
            cell: self,
            flight: Some(flight),
        };
        let result = init().await;
        guard.finish(result.clone());
        result
    }
}

impl Default for InitCell {
    fn default() -> Self {
        Self::new()
    }
}

/// Resets the cell if the initializing future is dropped mid-way.
struct InitGuard<'a> {
    cell: &'a InitCell,
    flight: Option<Flight<()>>,
}

impl InitGuard<'_> {
    fn finish(mut self, result: RenderResult<()>) {
        {
            let mut state = self.cell.lock();
            match &result {
                Ok(()) => *state = InitState::Ready,
                Err(err) => {
                    error!("backend initialization failed: {}", err);
                    *state = InitState::Uninitialized;
                }
            }
        }
        if let Some(flight) = self.flight.take() {
            flight.complete(result);
        }
    }
}

impl Drop for InitGuard<'_> {
    fn drop(&mut self) {
        if self.flight.is_some() {
            *self.cell.lock() = InitState::Uninitialized;
            debug!("backend initialization abandoned");
        }
    }
}
