//! One-shot suspend/resume handles used at every point where the
//! orchestrator waits on the outside world.

use tokio::sync::oneshot;

/// Create a connected resumer/suspension pair.
pub fn suspension<T>() -> (Resumer<T>, Suspension<T>) {
    let (tx, rx) = oneshot::channel();
    (Resumer { tx }, Suspension { rx })
}

/// The waiting half, held by the orchestrator.
#[must_use = "a suspension does nothing unless awaited"]
pub struct Suspension<T> {
    rx: oneshot::Receiver<T>,
}

impl<T> Suspension<T> {
    /// A suspension that is already resumed with `value`.
    pub fn ready(value: T) -> Self {
        let (resumer, suspension) = suspension();
        resumer.resume(value);
        suspension
    }

    /// Wait for the single resumption.
    ///
    /// If the resumer is dropped without answering, this never completes;
    /// the attempt stays suspended until its owner drops it.
    pub async fn resumed(self) -> T {
        match self.rx.await {
            Ok(value) => value,
            Err(_) => {
                tracing::debug!("resumer dropped without answering; attempt stays suspended");
                std::future::pending().await
            }
        }
    }
}

/// The answering half, handed to a collaborator.
pub struct Resumer<T> {
    tx: oneshot::Sender<T>,
}

impl<T> Resumer<T> {
    /// Resume the waiting attempt. Consumes the resumer, so this happens
    /// at most once.
    pub fn resume(self, value: T) {
        if self.tx.send(value).is_err() {
            tracing::debug!("attempt was dropped before it could be resumed");
        }
    }

    /// Whether the waiting side is gone.
    pub fn is_abandoned(&self) -> bool {
        self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn ready_suspension_resolves_immediately() {
        assert_eq!(Suspension::ready(7).resumed().await, 7);
    }

    #[tokio::test]
    async fn resumed_from_another_task() {
        let (resumer, suspension) = suspension::<&str>();
        tokio::spawn(async move { resumer.resume("ok") });
        assert_eq!(suspension.resumed().await, "ok");
    }

    #[tokio::test]
    async fn dropped_resumer_keeps_waiting() {
        let (resumer, suspension) = suspension::<u8>();
        drop(resumer);
        let waited = tokio::time::timeout(Duration::from_millis(50), suspension.resumed()).await;
        assert!(waited.is_err());
    }

    #[tokio::test]
    async fn resumer_sees_abandonment() {
        let (resumer, suspension) = suspension::<u8>();
        drop(suspension);
        assert!(resumer.is_abandoned());
        resumer.resume(1);
    }
}
