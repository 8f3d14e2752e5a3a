//! Cooperative cancellation of agent runs.

use std::future::pending;
use std::sync::Arc;

use tokio::sync::watch;

/// Creates a connected pair of [`CancelHandle`] and [`CancelSignal`].
pub fn cancel_pair() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle(Arc::new(tx)), CancelSignal(Some(rx)))
}

/// Requests cancellation of the runs observing the paired signal.
#[derive(Clone, Debug)]
pub struct CancelHandle(Arc<watch::Sender<bool>>);

impl CancelHandle {
    /// Requests cancellation. Calling this more than once has no effect.
    #[inline]
    pub fn cancel(&self) {
        self.0.send_replace(true);
    }
}

/// Observes a cancellation request.
///
/// The agent checks the signal before each model call and races it with
/// the in-flight request. Running tools are never interrupted.
#[derive(Clone, Debug)]
pub struct CancelSignal(Option<watch::Receiver<bool>>);

impl CancelSignal {
    /// A signal that is never raised.
    #[inline]
    pub fn never() -> Self {
        Self(None)
    }

    /// Returns `true` if cancellation has been requested.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.0.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Waits until cancellation is requested.
    ///
    /// If the handle is dropped without cancelling, this waits forever.
    pub async fn cancelled(&self) {
        let Some(rx) = &self.0 else {
            return pending().await;
        };
        let mut rx = rx.clone();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            pending::<()>().await;
        }
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::never()
    }
}
