//! Chunked demo ingestion.
//!
//! The inbound body is accumulated into a buffer which is flushed to the
//! storage backend as one part every time it reaches [`PART_SIZE`]. Once the
//! stream is exhausted the object is either committed or aborted depending on
//! the accumulated total.

use axum::body::Bytes;
use futures_util::{Stream, StreamExt};

use crate::storage::DemoUpload;

/// Buffer threshold at which a part is flushed to storage.
pub const PART_SIZE: usize = 5_000_000;

#[derive(Debug, Clone)]
pub struct UploadLimits {
    /// Ceiling on the accumulated upload size. Anything past this aborts the
    /// object instead of committing it.
    pub max_size: u64,
    /// Pacing delay applied after every received body chunk.
    pub part_delay: std::time::Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    /// The object was committed; the caller should mark the demo as stored.
    Stored { total: u64 },
    /// The object was aborted because the upload was empty or oversized.
    Cancelled { total: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PipelineState {
    Accumulating,
    Flushing,
    Finalizing,
    Cancelling,
}

/// Drains `stream` into `upload` part by part.
///
/// A single chunk smaller than [`PART_SIZE`] is never flushed: the trailing
/// remainder is only written once at least one full part went out, so such an
/// upload counts as empty and is cancelled. A stream or part-write error
/// aborts the remote object before the error is returned, so no dangling
/// multipart object is left behind.
#[tracing::instrument(skip(upload, stream, limits))]
pub async fn stream_demo<S, E>(
    upload: &mut dyn DemoUpload,
    mut stream: S,
    limits: &UploadLimits,
) -> Result<UploadOutcome, String>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: std::fmt::Display,
{
    let mut state = PipelineState::Accumulating;
    let mut buffer: Vec<u8> = Vec::new();
    let mut total: u64 = 0;
    let mut parts_written: u32 = 0;
    let mut drained = false;
    let mut failure: Option<String> = None;

    loop {
        state = match state {
            PipelineState::Accumulating => match stream.next().await {
                Some(Ok(chunk)) => {
                    buffer.extend_from_slice(&chunk);
                    tokio::time::sleep(limits.part_delay).await;

                    if buffer.len() >= PART_SIZE {
                        PipelineState::Flushing
                    } else {
                        PipelineState::Accumulating
                    }
                }
                Some(Err(e)) => {
                    failure = Some(format!("Reading demo stream: {}", e));
                    PipelineState::Cancelling
                }
                None => {
                    drained = true;

                    if !buffer.is_empty() && parts_written != 0 {
                        PipelineState::Flushing
                    } else {
                        settle(total, limits.max_size)
                    }
                }
            },
            PipelineState::Flushing => {
                let part = std::mem::take(&mut buffer);
                total += part.len() as u64;

                tracing::trace!(part = parts_written + 1, len = part.len(), "Flushing part");

                match upload.write_part(part).await {
                    Ok(()) => {
                        parts_written += 1;

                        if drained {
                            settle(total, limits.max_size)
                        } else {
                            PipelineState::Accumulating
                        }
                    }
                    Err(e) => {
                        failure = Some(e);
                        PipelineState::Cancelling
                    }
                }
            }
            PipelineState::Finalizing => {
                tracing::debug!(total, parts = parts_written, "Finalizing demo upload");

                upload.finish().await?;
                return Ok(UploadOutcome::Stored { total });
            }
            PipelineState::Cancelling => {
                tracing::debug!(total, parts = parts_written, "Cancelling demo upload");

                let cancel_result = upload.cancel().await;
                match failure.take() {
                    Some(e) => {
                        if let Err(cancel_err) = cancel_result {
                            tracing::error!("Aborting failed upload: {}", cancel_err);
                        }
                        return Err(e);
                    }
                    None => {
                        cancel_result?;
                        return Ok(UploadOutcome::Cancelled { total });
                    }
                }
            }
        };
    }
}

fn settle(total: u64, max_size: u64) -> PipelineState {
    if total > max_size || total == 0 {
        PipelineState::Cancelling
    } else {
        PipelineState::Finalizing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::BoxFuture;
    use futures::FutureExt;
    use pretty_assertions::assert_eq;

    #[derive(Debug, Default)]
    struct RecordingUpload {
        parts: Vec<usize>,
        finished: bool,
        cancelled: bool,
        fail_writes: bool,
    }

    impl DemoUpload for RecordingUpload {
        fn write_part(&mut self, data: Vec<u8>) -> BoxFuture<'_, Result<(), String>> {
            async move {
                if self.fail_writes {
                    return Err("part write failed".to_string());
                }
                self.parts.push(data.len());
                Ok(())
            }
            .boxed()
        }

        fn finish(&mut self) -> BoxFuture<'_, Result<(), String>> {
            async move {
                self.finished = true;
                Ok(())
            }
            .boxed()
        }

        fn cancel(&mut self) -> BoxFuture<'_, Result<(), String>> {
            async move {
                self.cancelled = true;
                Ok(())
            }
            .boxed()
        }
    }

    fn limits(max_size: u64) -> UploadLimits {
        UploadLimits {
            max_size,
            part_delay: std::time::Duration::ZERO,
        }
    }

    fn body(
        chunks: Vec<Vec<u8>>,
    ) -> impl Stream<Item = Result<Bytes, std::convert::Infallible>> + Unpin {
        futures::stream::iter(chunks.into_iter().map(|c| Ok(Bytes::from(c))))
    }

    #[tokio::test]
    async fn exact_part_size_stores_single_part() {
        let mut upload = RecordingUpload::default();

        let outcome = stream_demo(
            &mut upload,
            body(vec![vec![0u8; PART_SIZE]]),
            &limits(100_000_000),
        )
        .await
        .unwrap();

        assert_eq!(
            UploadOutcome::Stored {
                total: PART_SIZE as u64
            },
            outcome
        );
        assert_eq!(vec![PART_SIZE], upload.parts);
        assert!(upload.finished);
        assert!(!upload.cancelled);
    }

    #[tokio::test]
    async fn single_chunk_below_part_size_is_cancelled() {
        // The trailing remainder is only flushed after a full part went out,
        // so a lone sub-threshold chunk counts as an empty upload.
        let mut upload = RecordingUpload::default();

        let outcome = stream_demo(
            &mut upload,
            body(vec![vec![0u8; PART_SIZE - 1]]),
            &limits(100_000_000),
        )
        .await
        .unwrap();

        assert_eq!(UploadOutcome::Cancelled { total: 0 }, outcome);
        assert!(upload.parts.is_empty());
        assert!(upload.cancelled);
        assert!(!upload.finished);
    }

    #[tokio::test]
    async fn empty_stream_is_cancelled() {
        let mut upload = RecordingUpload::default();

        let outcome = stream_demo(&mut upload, body(vec![]), &limits(100_000_000))
            .await
            .unwrap();

        assert_eq!(UploadOutcome::Cancelled { total: 0 }, outcome);
        assert!(upload.cancelled);
        assert!(!upload.finished);
    }

    #[tokio::test]
    async fn full_part_plus_remainder_stores_both() {
        let mut upload = RecordingUpload::default();

        let outcome = stream_demo(
            &mut upload,
            body(vec![vec![0u8; PART_SIZE], vec![0u8; 3_000_000]]),
            &limits(100_000_000),
        )
        .await
        .unwrap();

        assert_eq!(
            UploadOutcome::Stored {
                total: PART_SIZE as u64 + 3_000_000
            },
            outcome
        );
        assert_eq!(vec![PART_SIZE, 3_000_000], upload.parts);
        assert!(upload.finished);
    }

    #[tokio::test]
    async fn oversized_upload_is_cancelled_after_flushing() {
        let mut upload = RecordingUpload::default();

        // 12MB in 1MB chunks against a 10MB ceiling. Parts still get flushed
        // on the way, the object is aborted at the end.
        let chunks = (0..12).map(|_| vec![0u8; 1_000_000]).collect();

        let outcome = stream_demo(&mut upload, body(chunks), &limits(10_000_000))
            .await
            .unwrap();

        assert_eq!(UploadOutcome::Cancelled { total: 12_000_000 }, outcome);
        assert_eq!(vec![PART_SIZE, PART_SIZE, 2_000_000], upload.parts);
        assert!(upload.cancelled);
        assert!(!upload.finished);
    }

    #[tokio::test]
    async fn stream_error_aborts_upload() {
        let mut upload = RecordingUpload::default();

        let chunks: Vec<Result<Bytes, String>> = vec![
            Ok(Bytes::from(vec![0u8; 1_000_000])),
            Err("connection reset".to_string()),
        ];

        let result = stream_demo(
            &mut upload,
            futures::stream::iter(chunks),
            &limits(100_000_000),
        )
        .await;

        assert!(result.is_err());
        assert!(upload.cancelled);
        assert!(!upload.finished);
    }

    #[tokio::test]
    async fn part_write_error_aborts_upload() {
        let mut upload = RecordingUpload {
            fail_writes: true,
            ..Default::default()
        };

        let result = stream_demo(
            &mut upload,
            body(vec![vec![0u8; PART_SIZE]]),
            &limits(100_000_000),
        )
        .await;

        assert!(result.is_err());
        assert!(upload.cancelled);
        assert!(!upload.finished);
    }
}
