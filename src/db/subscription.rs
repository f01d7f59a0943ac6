use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::documents::Document;
use super::query::Query;
use super::Database;
use crate::error::MonitorError;

/// Handle to a live listener. The listener stops on [`Subscription::unsubscribe`]
/// or when the handle is dropped.
pub struct Subscription {
    cancel_token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl Subscription {
    pub(crate) fn new(cancel_token: CancellationToken, handle: JoinHandle<()>) -> Self {
        Self {
            cancel_token,
            handle: Some(handle),
        }
    }

    pub fn is_active(&self) -> bool {
        !self.cancel_token.is_cancelled()
            && self.handle.as_ref().map(|h| !h.is_finished()).unwrap_or(false)
    }

    /// Stops the listener and waits for it to exit.
    pub async fn unsubscribe(mut self) {
        self.cancel_token.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel_token.cancel();
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Database {
    /// Delivers the query result now and again after every write to the
    /// query's collection.
    pub fn subscribe<D, E>(&self, query: Query, on_data: D, on_error: E) -> Subscription
    where
        D: Fn(Vec<Document>) + Send + Sync + 'static,
        E: Fn(MonitorError) + Send + Sync + 'static,
    {
        let cancel_token = CancellationToken::new();
        let token = cancel_token.clone();
        let db = self.clone();
        let mut changes = self.watch_changes();

        let handle = tokio::spawn(async move {
            let deliver = |result: Result<Vec<Document>, MonitorError>| match result {
                Ok(documents) => on_data(documents),
                Err(err) => on_error(err),
            };

            deliver(db.query(&query).await);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    change = changes.recv() => match change {
                        Ok(collection) if collection == query.collection => {
                            deliver(db.query(&query).await);
                        }
                        Ok(_) => {}
                        Err(RecvError::Lagged(skipped)) => {
                            log::debug!("subscription on {} lagged by {skipped} changes", query.collection);
                            deliver(db.query(&query).await);
                        }
                        Err(RecvError::Closed) => break,
                    },
                }
            }
        });

        Subscription::new(cancel_token, handle)
    }
}
