use crate::element::Subscription;
use tracing::trace;

/// Subscriptions of one strategy, released newest first
#[derive(Debug, Default)]
pub struct TeardownList {
    subscriptions: Vec<Subscription>,
}

impl TeardownList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, subscription: Subscription) {
        self.subscriptions.push(subscription);
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Release everything in reverse order of registration
    pub fn release_all(&mut self) {
        while let Some(mut subscription) = self.subscriptions.pop() {
            trace!("Releasing {}", subscription.label());
            subscription.release();
        }
    }
}

impl Drop for TeardownList {
    fn drop(&mut self) {
        self.release_all();
    }
}
