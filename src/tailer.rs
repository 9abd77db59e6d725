//! Per-file follower: the async task that turns filesystem write
//! notifications for one file into a stream of physical lines.
//!
//! Generalizes the teacher's `read_stream`/`read_stream_with_prefix`
//! pattern in `runner.rs` (`tokio::io::BufReader` + `AsyncBufReadExt::lines()`
//! over a child process's stdout pipe) to a `tokio::fs::File` seeked to a
//! resume offset, woken by `Write`/`Remove` notifications instead of pipe
//! readiness.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};
use tokio::sync::{mpsc, watch};

use crate::events::{Event, Op};
use crate::fileid::FileId;
use crate::metrics::MetricsFacade;
use crate::offsets::{OffsetCache, SeekPosition};

/// A physical line read from a tailed file, with its resulting byte offset
/// and 1-based line number within this run. `err` is set only on the
/// terminal sentinel sent when a read fails — `text` is empty in that case
/// and the reassembler must not try to accumulate it as content.
#[derive(Debug, Clone)]
pub struct Line {
    pub file_id: FileId,
    pub text: String,
    pub offset: u64,
    pub line_num: u64,
    pub err: Option<String>,
}

/// Follows one file: seeks to its cached offset, reads whatever is
/// available, and re-reads on every subsequent `Write` notification until
/// cancelled or the file is removed. Exits silently if the file cannot be
/// opened (a `Create` notification can race with unlink).
pub async fn follow(
    file_id: FileId,
    path: std::path::PathBuf,
    offsets: Arc<OffsetCache>,
    mut event_rx: mpsc::Receiver<Event>,
    line_tx: mpsc::Sender<Line>,
    metrics: Arc<dyn MetricsFacade>,
    mut shutdown: watch::Receiver<bool>,
) {
    let Ok(file) = tokio::fs::File::open(&path).await else {
        tracing::warn!(path = %path.display(), "follower could not open file");
        return;
    };

    let start = offsets.get(file_id).unwrap_or(SeekPosition(0)).0;
    let mut reader = BufReader::new(file);
    if reader.seek(std::io::SeekFrom::Start(start)).await.is_err() {
        tracing::warn!(path = %path.display(), "follower could not seek to resume offset");
        return;
    }

    let mut offset = start;
    let mut line_num = 0u64;

    if read_available(&mut reader, file_id, &mut offset, &mut line_num, &offsets, &line_tx, &metrics, &path)
        .await
    {
        return;
    }

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    return;
                }
            }
            event = event_rx.recv() => {
                match event {
                    Some(event) if event.op == Op::Remove => {
                        return;
                    }
                    Some(_) => {
                        if read_available(&mut reader, file_id, &mut offset, &mut line_num, &offsets, &line_tx, &metrics, &path)
                            .await
                        {
                            return;
                        }
                    }
                    None => return,
                }
            }
        }
    }
}

/// Reads whatever is currently available. Returns `true` when the follower
/// should stop: the terminal channel closed, or a read error occurred (in
/// which case an error-carrying sentinel `Line` is sent before stopping).
#[allow(clippy::too_many_arguments)]
async fn read_available(
    reader: &mut BufReader<tokio::fs::File>,
    file_id: FileId,
    offset: &mut u64,
    line_num: &mut u64,
    offsets: &OffsetCache,
    line_tx: &mpsc::Sender<Line>,
    metrics: &Arc<dyn MetricsFacade>,
    path: &std::path::Path,
) -> bool {
    loop {
        let mut buf = String::new();
        match reader.read_line(&mut buf).await {
            Ok(0) => return false,
            Ok(n) => {
                *offset += n as u64;
                *line_num += 1;
                offsets.set(file_id, SeekPosition(*offset));
                let filename = path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
                metrics.lines_received_total(&filename, &file_id.to_string());
                let text = buf.trim_end_matches(['\n', '\r']).to_string();
                if line_tx
                    .send(Line {
                        file_id,
                        text,
                        offset: *offset,
                        line_num: *line_num,
                        err: None,
                    })
                    .await
                    .is_err()
                {
                    return true;
                }
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "follower read error");
                metrics.follower_read_errors_total();
                let _ = line_tx
                    .send(Line {
                        file_id,
                        text: String::new(),
                        offset: *offset,
                        line_num: *line_num,
                        err: Some(err.to_string()),
                    })
                    .await;
                return true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_lines_present_at_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.log");
        std::fs::write(&path, "one\ntwo\n").unwrap();
        let file_id = FileId::for_path(&path).unwrap();
        let offsets = Arc::new(OffsetCache::new());
        let (_event_tx, event_rx) = mpsc::channel(4);
        let (line_tx, mut line_rx) = mpsc::channel(4);
        let metrics: Arc<dyn MetricsFacade> = crate::metrics::PrometheusMetrics::new();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(follow(
            file_id,
            path.clone(),
            offsets.clone(),
            event_rx,
            line_tx,
            metrics,
            shutdown_rx,
        ));

        let first = line_rx.recv().await.unwrap();
        assert_eq!(first.text, "one");
        let second = line_rx.recv().await.unwrap();
        assert_eq!(second.text, "two");

        let _ = shutdown_tx.send(true);
        handle.await.unwrap();
    }
}
