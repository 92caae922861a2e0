// Observable state holder
//
// A thin wrapper over tokio's watch channel: a mutable current value plus a
// change-notification mechanism, without pulling in a reactive framework.
// The owner keeps the Signal and mutates it; consumers either read the
// current value or subscribe for changes.

use tokio::sync::watch;

/// Observable value
///
/// Cloning the signal clones the handle, not the value; all clones share the
/// same underlying state.
#[derive(Debug, Clone)]
pub struct Signal<T> {
    tx: watch::Sender<T>,
}

impl<T: Clone> Signal<T> {
    /// Create a signal holding `initial`
    pub fn new(initial: T) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    /// Read the current value
    pub fn get(&self) -> T {
        self.tx.borrow().clone()
    }

    /// Replace the value and notify subscribers
    pub fn set(&self, value: T) {
        self.tx.send_replace(value);
    }

    /// Mutate the value in place and notify subscribers
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        self.tx.send_modify(f);
    }

    /// Subscribe to changes
    ///
    /// The receiver observes the value as of subscription time and every
    /// subsequent change.
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.tx.subscribe()
    }
}

impl<T: Clone + Default> Default for Signal<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_set_update() {
        let signal = Signal::new(1u32);
        assert_eq!(signal.get(), 1);

        signal.set(5);
        assert_eq!(signal.get(), 5);

        signal.update(|v| *v += 1);
        assert_eq!(signal.get(), 6);
    }

    #[tokio::test]
    async fn test_subscribers_observe_changes() {
        let signal = Signal::new("idle".to_string());
        let mut rx = signal.subscribe();

        signal.set("busy".to_string());
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), "busy");
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let a = Signal::new(0i32);
        let b = a.clone();
        b.set(9);
        assert_eq!(a.get(), 9);
    }
}
