//! C6 — Streaming Dispatcher: one background worker consuming the group's
//! upstream topic and fanning out to subscriber queues.
//!
//! The worker is a dedicated `std::thread` running a blocking poll loop,
//! not a Tokio task — `BaseConsumer::poll` blocks, and running it on a
//! Tokio worker thread would starve the runtime. Handoff into the
//! subscriber queues crosses the thread boundary via
//! `mpsc::Sender::blocking_send`, tokio's primitive for exactly this:
//! scheduling work from a thread that isn't running the runtime.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rdkafka::consumer::{BaseConsumer, Consumer};
use rdkafka::{ClientConfig, Message};

use crate::error::StreamApiError;
use crate::fanout::FanoutIndex;

const PARTITION_ASSIGNMENT_TIMEOUT: Duration = Duration::from_secs(100);
const POLL_INTERVAL: Duration = Duration::from_millis(200);
const SHUTDOWN_JOIN_TIMEOUT: Duration = Duration::from_secs(10);

pub struct DispatcherHandle {
    stop: Arc<AtomicBool>,
    assigned: Arc<AtomicBool>,
    worker_alive: Arc<AtomicBool>,
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl DispatcherHandle {
    /// Readiness predicate: worker alive AND consumer has at least one
    /// assigned partition.
    pub fn ready(&self) -> bool {
        self.worker_alive.load(Ordering::SeqCst) && self.assigned.load(Ordering::SeqCst)
    }

    /// Builds a handle with no backing consumer, for exercising the HTTP
    /// layer's readiness wiring in tests without a Kafka broker.
    pub fn stub(ready: bool) -> Self {
        Self {
            stop: Arc::new(AtomicBool::new(false)),
            assigned: Arc::new(AtomicBool::new(ready)),
            worker_alive: Arc::new(AtomicBool::new(ready)),
            join_handle: None,
        }
    }

    /// Signals the worker to stop and waits up to 10s for it to drain and
    /// close the consumer. The worker is abandoned (not killed) if it
    /// doesn't exit in time.
    pub async fn stop(mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.join_handle.take() {
            let joined = tokio::time::timeout(
                SHUTDOWN_JOIN_TIMEOUT,
                tokio::task::spawn_blocking(move || handle.join()),
            )
            .await;
            if joined.is_err() {
                tracing::warn!("dispatcher worker did not exit within the shutdown deadline");
            }
        }
    }
}

/// Starts the consumer and background worker. Returns once a partition
/// assignment has been observed or `PARTITION_ASSIGNMENT_TIMEOUT` elapses
/// (a fatal startup error in the latter case).
pub async fn start(
    bootstrap_servers: &str,
    group_id: &str,
    topic: &str,
    fanout: FanoutIndex,
    drop_slow_consumers: bool,
) -> Result<DispatcherHandle, StreamApiError> {
    let consumer: BaseConsumer = ClientConfig::new()
        .set("bootstrap.servers", bootstrap_servers)
        .set("group.id", group_id)
        .set("auto.offset.reset", "latest")
        .set("enable.auto.commit", "false")
        .create()?;

    consumer.subscribe(&[topic])?;

    let stop = Arc::new(AtomicBool::new(false));
    let assigned = Arc::new(AtomicBool::new(false));
    let worker_alive = Arc::new(AtomicBool::new(false));

    let deadline = Instant::now() + PARTITION_ASSIGNMENT_TIMEOUT;
    loop {
        consumer.poll(Duration::from_millis(200));
        if !consumer.assignment().map(|a| a.count() == 0).unwrap_or(true) {
            assigned.store(true, Ordering::SeqCst);
            break;
        }
        if Instant::now() >= deadline {
            return Err(StreamApiError::PartitionAssignmentTimeout);
        }
    }

    let thread_stop = stop.clone();
    let thread_assigned = assigned.clone();
    let thread_worker_alive = worker_alive.clone();

    let join_handle = std::thread::Builder::new()
        .name("stream-dispatcher".to_string())
        .spawn(move || {
            thread_worker_alive.store(true, Ordering::SeqCst);
            run_poll_loop(consumer, fanout, thread_stop, thread_assigned, drop_slow_consumers);
            thread_worker_alive.store(false, Ordering::SeqCst);
        })
        .expect("failed to spawn dispatcher thread");

    Ok(DispatcherHandle {
        stop,
        assigned,
        worker_alive,
        join_handle: Some(join_handle),
    })
}

fn run_poll_loop(
    consumer: BaseConsumer,
    fanout: FanoutIndex,
    stop: Arc<AtomicBool>,
    assigned: Arc<AtomicBool>,
    drop_slow_consumers: bool,
) {
    while !stop.load(Ordering::SeqCst) {
        assigned.store(
            consumer.assignment().map(|a| a.count() > 0).unwrap_or(false),
            Ordering::SeqCst,
        );

        let Some(message) = consumer.poll(POLL_INTERVAL) else {
            continue;
        };

        let message = match message {
            Ok(message) => message,
            Err(err) => {
                tracing::warn!(error = %err, "kafka poll error");
                continue;
            }
        };

        let key = match message.key_view::<str>() {
            Some(Ok(key)) => key.to_string(),
            Some(Err(err)) => {
                tracing::warn!(error = %err, "message key was not valid UTF-8, skipping");
                continue;
            }
            None => {
                tracing::warn!("message had no key, skipping");
                continue;
            }
        };

        let payload = match message.payload_view::<str>() {
            Some(Ok(payload)) => payload.to_string(),
            Some(Err(err)) => {
                tracing::warn!(error = %err, "message payload was not valid UTF-8, skipping");
                continue;
            }
            None => {
                tracing::warn!(key, "message had no payload, skipping");
                continue;
            }
        };

        let subscribers = fanout.snapshot(&key);
        let mut dispatched = false;
        for sender in subscribers {
            let outcome = if drop_slow_consumers {
                sender.try_send(payload.clone()).is_ok()
            } else {
                sender.blocking_send(payload.clone()).is_ok()
            };
            dispatched |= outcome;
        }

        if dispatched {
            if let Err(err) = consumer.commit_message(&message, rdkafka::consumer::CommitMode::Sync) {
                tracing::error!(error = %err, "failed to commit offset after dispatch");
            }
        } else {
            // No subscribers: still commit, this message had no observable
            // side effect and would otherwise be redelivered forever.
            if let Err(err) = consumer.commit_message(&message, rdkafka::consumer::CommitMode::Sync) {
                tracing::error!(error = %err, "failed to commit offset for unsubscribed message");
            }
        }
    }
}
