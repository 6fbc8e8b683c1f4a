//! Best-effort background removal of demo objects for bulk-deleted matches.
//!
//! Bulk deletes must not block on the storage backend, so the request path
//! only appends a batch of match ids here and a background task issues the
//! actual object deletions, tolerating individual failures.

use crate::storage::DemoStorage;

/// Handle for enqueueing batches of match ids whose demo objects should be
/// removed. Cheap to clone, backed by a bounded channel.
#[derive(Clone)]
pub struct DeletionQueue {
    tx: tokio::sync::mpsc::Sender<Vec<String>>,
}

impl DeletionQueue {
    pub fn new(capacity: usize) -> (Self, tokio::sync::mpsc::Receiver<Vec<String>>) {
        let (tx, rx) = tokio::sync::mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Appends a batch without blocking. A full queue drops the batch, the
    /// corresponding objects stay in storage until a manual cleanup.
    pub fn enqueue(&self, match_ids: Vec<String>) {
        if match_ids.is_empty() {
            return;
        }

        if let Err(e) = self.tx.try_send(match_ids) {
            tracing::warn!("Dropping demo deletion batch: {:?}", e);
        }
    }
}

/// Drains the queue and deletes the matching demo objects. Runs until every
/// `DeletionQueue` handle is dropped.
#[tracing::instrument(skip(rx, storage, demo_pathway))]
pub async fn run_consumer(
    mut rx: tokio::sync::mpsc::Receiver<Vec<String>>,
    storage: Box<dyn DemoStorage>,
    demo_pathway: String,
) {
    while let Some(batch) = rx.recv().await {
        tracing::info!("Deleting {} demo objects", batch.len());

        for match_id in batch {
            let object_path = crate::matches::demo_object_path(&demo_pathway, &match_id);

            if let Err(e) = storage.delete(object_path).await {
                tracing::warn!(match_id, "Demo object deletion failed: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::DemoUpload;
    use futures::future::BoxFuture;
    use futures::FutureExt;
    use pretty_assertions::assert_eq;
    use std::sync::{Arc, Mutex};

    #[derive(Default, Clone)]
    struct RecordingStorage {
        deleted: Arc<Mutex<Vec<String>>>,
    }

    impl DemoStorage for RecordingStorage {
        fn duplicate(&self) -> Box<dyn DemoStorage> {
            Box::new(self.clone())
        }

        fn begin_upload<'f, 'own>(
            &'own self,
            _object_path: String,
        ) -> BoxFuture<'f, Result<Box<dyn DemoUpload>, String>>
        where
            'own: 'f,
        {
            async { Err("not used".to_string()) }.boxed()
        }

        fn delete<'f, 'own>(&'own self, object_path: String) -> BoxFuture<'f, Result<(), String>>
        where
            'own: 'f,
        {
            let deleted = self.deleted.clone();
            async move {
                deleted.lock().unwrap().push(object_path);
                Ok(())
            }
            .boxed()
        }
    }

    #[tokio::test]
    async fn consumer_deletes_every_enqueued_id() {
        let storage = RecordingStorage::default();
        let deleted = storage.deleted.clone();

        let (queue, rx) = DeletionQueue::new(8);
        queue.enqueue(vec!["match-a".to_string(), "match-b".to_string()]);
        queue.enqueue(vec!["match-c".to_string()]);
        drop(queue);

        run_consumer(rx, Box::new(storage), "demos".to_string()).await;

        assert_eq!(
            vec![
                "demos/match-a.dem".to_string(),
                "demos/match-b.dem".to_string(),
                "demos/match-c.dem".to_string(),
            ],
            *deleted.lock().unwrap()
        );
    }

    #[tokio::test]
    async fn full_queue_drops_batch_without_blocking() {
        let (queue, rx) = DeletionQueue::new(1);

        queue.enqueue(vec!["match-a".to_string()]);
        // Queue is full, this one gets dropped.
        queue.enqueue(vec!["match-b".to_string()]);

        let storage = RecordingStorage::default();
        let deleted = storage.deleted.clone();
        drop(queue);

        run_consumer(rx, Box::new(storage), "demos".to_string()).await;

        assert_eq!(
            vec!["demos/match-a.dem".to_string()],
            *deleted.lock().unwrap()
        );
    }

    #[test]
    fn empty_batch_is_ignored() {
        let (queue, mut rx) = DeletionQueue::new(1);
        queue.enqueue(Vec::new());

        assert!(rx.try_recv().is_err());
    }
}
