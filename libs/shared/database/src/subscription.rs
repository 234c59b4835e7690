use futures::stream::{self, Stream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::StoreError;
use crate::store::Document;

/// Full result set of a live query at one point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub documents: Vec<Document>,
}

impl Snapshot {
    pub fn new(documents: Vec<Document>) -> Self {
        Self { documents }
    }
}

pub type SnapshotSender = mpsc::Sender<Result<Snapshot, StoreError>>;

/// Handle to a live query. Dropping it tears the feeding task down.
#[derive(Debug)]
pub struct Subscription {
    receiver: mpsc::Receiver<Result<Snapshot, StoreError>>,
    task: JoinHandle<()>,
}

impl Subscription {
    pub const BUFFER: usize = 32;

    /// Spawn `feed` with the sending half of a fresh channel.
    pub fn spawn<F, Fut>(feed: F) -> Self
    where
        F: FnOnce(SnapshotSender) -> Fut,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let (sender, receiver) = mpsc::channel(Self::BUFFER);
        let task = tokio::spawn(feed(sender));
        Self { receiver, task }
    }

    /// Next snapshot, or `None` once the feed has stopped.
    pub async fn next(&mut self) -> Option<Result<Snapshot, StoreError>> {
        self.receiver.recv().await
    }

    pub fn into_stream(self) -> impl Stream<Item = Result<Snapshot, StoreError>> {
        stream::unfold(self, |mut sub| async move {
            sub.next().await.map(|item| (item, sub))
        })
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}
