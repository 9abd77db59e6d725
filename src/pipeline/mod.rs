//! Wires the scanner, resolver, pending queue, tailers, and reassemblers
//! into the running pipeline, and the `Bridge` that fans every tailer's
//! output into one record stream.

pub mod fs_events;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{mpsc, watch};

use crate::config::AppConfig;
use crate::events::{Event, Op};
use crate::fileid::FileId;
use crate::metrics::MetricsFacade;
use crate::offsets::OffsetCache;
use crate::pending::{self, PendingQueue};
use crate::reassembler::Reassembler;
use crate::record::LogRecord;
use crate::resolver::ProcessInstance;
use crate::scanner;
use crate::tailer;
use crate::tailing::{TailedFile, TailingSet};

/// Hands out clones of the single record sender every follower/reassembler
/// task writes into. Because `tokio::sync::mpsc::Sender` is itself a
/// multi-producer handle, a dynamically-spawned tailer joining the stream
/// is exactly a new clone — no separate channel-of-channels combinator
/// task is needed to get the "many producers, one consumer" behavior the
/// original's `pipeline.Bridge` provides.
#[derive(Clone)]
pub struct Bridge {
    sender: mpsc::Sender<LogRecord>,
}

impl Bridge {
    pub fn new(sender: mpsc::Sender<LogRecord>) -> Self {
        Self { sender }
    }

    pub fn sender(&self) -> mpsc::Sender<LogRecord> {
        self.sender.clone()
    }
}

struct PipelineState {
    config: Arc<AppConfig>,
    offsets: Arc<OffsetCache>,
    tailing: Arc<TailingSet>,
    pending: Arc<PendingQueue>,
    metrics: Arc<dyn MetricsFacade>,
    dispatch: DashMap<FileId, mpsc::Sender<Event>>,
    bridge: Bridge,
    shutdown: watch::Receiver<bool>,
    watcher: Mutex<RecommendedWatcher>,
}

/// Runs the pipeline until `shutdown` is signalled. Performs the startup
/// walk, starts the fs and config watchers, and processes events until
/// cancellation.
pub async fn run(
    config: Arc<AppConfig>,
    metrics: Arc<dyn MetricsFacade>,
    bridge: Bridge,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let (raw_tx, mut raw_rx) = mpsc::channel::<notify::Result<notify::Event>>(1024);
    let mut watcher = RecommendedWatcher::new(
        move |res| {
            let _ = raw_tx.blocking_send(res);
        },
        notify::Config::default(),
    )?;

    let offsets = Arc::new(OffsetCache::new());
    let initial_files = scanner::scan(
        &config.logs_dir,
        &mut watcher,
        &offsets,
        config.read_existing_logs,
    )?;

    let state = Arc::new(PipelineState {
        config: config.clone(),
        offsets,
        tailing: Arc::new(TailingSet::new()),
        pending: Arc::new(PendingQueue::new()),
        metrics: metrics.clone(),
        dispatch: DashMap::new(),
        bridge,
        shutdown: shutdown.clone(),
        watcher: Mutex::new(watcher),
    });

    let (retry_tx, mut retry_rx) = mpsc::channel::<Event>(100);
    tokio::spawn(pending::watch_config_dir(
        config.config_dir.clone(),
        state.pending.clone(),
        retry_tx,
        metrics.clone(),
        shutdown.clone(),
    ));

    for path in initial_files {
        if let Ok(file_id) = FileId::for_path(&path) {
            handle_event(&state, Event::new(path, Op::Create, file_id)).await;
        }
    }

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    return Ok(());
                }
            }
            raw = raw_rx.recv() => {
                let Some(raw) = raw else { return Ok(()) };
                let Ok(raw) = raw else { continue };
                for path in raw.paths {
                    state.metrics.events_total();
                    let op = crate::events::Op::from(raw.kind);
                    let file_id = FileId::for_path(&path).unwrap_or(FileId::INVALID);
                    route_or_handle(&state, Event::new(path, op, file_id)).await;
                }
            }
            retried = retry_rx.recv() => {
                let Some(event) = retried else { continue };
                handle_event(&state, event).await;
            }
        }
    }
}

/// Routes an event either to an already-running follower (via its
/// dedicated dispatch channel) or through the full resolution pipeline for
/// a not-yet-tailed path.
async fn route_or_handle(state: &Arc<PipelineState>, event: Event) {
    if let Some(sender) = state.dispatch.get(&event.file_id) {
        let _ = sender.try_send(event);
        return;
    }
    handle_event(state, event).await;
}

async fn handle_event(state: &Arc<PipelineState>, event: Event) {
    if !fs_events::is_actionable(&event, &state.tailing, &state.config.skip_files) {
        return;
    }
    state.metrics.actionable_events_total();

    if fs_events::is_dir_event(&event) {
        handle_dir(state, &event.path);
    } else {
        handle_file(state, event).await;
    }
}

fn handle_dir(state: &Arc<PipelineState>, path: &Path) {
    state.metrics.dir_events_total();
    match state.watcher.lock() {
        Ok(mut watcher) => {
            if let Err(err) = watcher.watch(path, RecursiveMode::NonRecursive) {
                tracing::warn!(error = %err, path = %path.display(), "failed to watch new directory");
            }
        }
        Err(_) => tracing::warn!(path = %path.display(), "watcher mutex poisoned"),
    }
}

async fn handle_file(state: &Arc<PipelineState>, event: Event) {
    state.metrics.file_events_total();

    let process_name = crate::resolver::get_process_name(&state.config.logs_dir, &event.path);
    let segment = event
        .path
        .strip_prefix(&state.config.logs_dir)
        .unwrap_or(&event.path)
        .components()
        .next()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .unwrap_or_default();
    let process_id = crate::resolver::get_process_id(&segment);
    let component = crate::resolver::get_component(&event.path.to_string_lossy());

    let key = format!("{process_name}_{process_id}");

    let instance = ProcessInstance::for_process(&process_name, process_id, &state.config.config_dir);
    let instance = match instance {
        Ok(instance) => instance,
        Err(err) if err.is_pending() => {
            state.pending.insert(key, event);
            state.metrics.pending_files_total();
            return;
        }
        Err(err) => {
            tracing::warn!(error = %err, path = %event.path.display(), "failed to resolve process config");
            return;
        }
    };

    let log_format = instance.get_log_format(&event.path);

    let tailed = TailedFile {
        file_id: event.file_id,
        path: event.path.clone(),
        process_name: process_name.clone(),
        process_id,
        component: component.clone(),
        log_format: log_format.clone(),
    };

    if !state.tailing.claim(tailed) {
        return;
    }
    state.metrics.tails_total();

    let (event_tx, event_rx) = mpsc::channel(32);
    state.dispatch.insert(event.file_id, event_tx);

    spawn_follower_and_reassembler(state.clone(), event, process_name, process_id, component, log_format, event_rx);
}

#[allow(clippy::too_many_arguments)]
fn spawn_follower_and_reassembler(
    state: Arc<PipelineState>,
    event: Event,
    process_name: String,
    process_id: u8,
    component: String,
    log_format: crate::resolver::LogFormat,
    event_rx: mpsc::Receiver<Event>,
) {
    let (line_tx, mut line_rx) = mpsc::channel::<tailer::Line>(256);
    let offsets = state.offsets.clone();
    let metrics = state.metrics.clone();
    let path = event.path.clone();
    let file_id = event.file_id;
    let shutdown_rx = state.shutdown.clone();

    tokio::spawn(tailer::follow(
        file_id,
        path.clone(),
        offsets.clone(),
        event_rx,
        line_tx,
        metrics.clone(),
        shutdown_rx,
    ));

    let node = state.config.node.clone();
    let parse = state.config.parse;
    let bridge_tx = state.bridge.sender();
    let tailing = state.tailing.clone();
    let dispatch_path = path.clone();
    let state_for_cleanup = state.clone();

    tokio::spawn(async move {
        let mut reassembler = Reassembler::new(log_format);
        loop {
            let line = tokio::time::timeout(crate::reassembler::IDLE_TIMEOUT, line_rx.recv()).await;
            match line {
                Ok(Some(line)) if line.err.is_some() => {
                    if let Some(entry) = reassembler.flush_pending() {
                        emit(&bridge_tx, &entry, &dispatch_path, file_id, &process_name, process_id, &component, &node, parse, &metrics)
                            .await;
                    }
                    let error_entry = crate::reassembler::RawEntry {
                        text: String::new(),
                        line_num: line.line_num,
                        offset: line.offset,
                        received_at: crate::reassembler::now_rfc3339(),
                        err: line.err,
                    };
                    emit(&bridge_tx, &error_entry, &dispatch_path, file_id, &process_name, process_id, &component, &node, parse, &metrics)
                        .await;
                    break;
                }
                Ok(Some(line)) => {
                    for entry in reassembler.push(line) {
                        emit(&bridge_tx, &entry, &dispatch_path, file_id, &process_name, process_id, &component, &node, parse, &metrics)
                            .await;
                    }
                }
                Ok(None) => {
                    if let Some(entry) = reassembler.flush_pending() {
                        emit(&bridge_tx, &entry, &dispatch_path, file_id, &process_name, process_id, &component, &node, parse, &metrics)
                            .await;
                    }
                    break;
                }
                Err(_timeout) => {
                    if let Some(entry) = reassembler.flush_pending() {
                        emit(&bridge_tx, &entry, &dispatch_path, file_id, &process_name, process_id, &component, &node, parse, &metrics)
                            .await;
                    }
                    break;
                }
            }
        }
        tailing.release(file_id);
        state_for_cleanup.dispatch.remove(&file_id);
    });
}

#[allow(clippy::too_many_arguments)]
async fn emit(
    bridge_tx: &mpsc::Sender<LogRecord>,
    entry: &crate::reassembler::RawEntry,
    path: &PathBuf,
    file_id: FileId,
    process_name: &str,
    process_id: u8,
    component: &str,
    node: &str,
    _parse: bool,
    metrics: &Arc<dyn MetricsFacade>,
) {
    let level = crate::level::extract_level(&entry.text);
    metrics.entries_total(process_name, node, component, &level);

    let record = LogRecord {
        path: path.clone(),
        file_id,
        process_name: process_name.to_string(),
        process_id,
        component: component.to_string(),
        line_num: entry.line_num,
        offset: entry.offset,
        time: entry.received_at.clone(),
        text: entry.text.clone(),
        level,
        err: entry.err.clone(),
    };

    if bridge_tx.send(record).await.is_err() {
        metrics.lines_processed_error_total(process_name, node, component);
    }
}
