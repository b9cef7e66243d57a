//! Event queue feeding the engine
//!
//! Built on a tokio mpsc channel. Producers never block; the receiver drains
//! whatever has arrived and, once more than `backlog` samples are waiting,
//! discards the oldest samples. Control events (boundaries, stats, shutdown)
//! are always kept.

use crate::snapshot::StatsUpdate;
use crate::{RealtimeError, RealtimeResult};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;
use weex_core::{Timestamp, WeatherPacket};

/// Inbound engine events, processed strictly in arrival order
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// A (possibly partial) loop packet
    Sample(WeatherPacket),
    /// Records up to (excluding) `timestamp` are archived
    PeriodBoundary { timestamp: Timestamp },
    Stats(StatsUpdate),
    Shutdown,
}

impl EngineEvent {
    fn is_sample(&self) -> bool {
        matches!(self, EngineEvent::Sample(_))
    }
}

/// Create a queue that keeps at most `backlog` pending samples
pub fn event_queue(backlog: usize) -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    let dropped = Arc::new(AtomicU64::new(0));
    (
        EventSender {
            tx,
            dropped: dropped.clone(),
        },
        EventReceiver {
            rx,
            pending: VecDeque::new(),
            backlog: backlog.max(1),
            dropped,
        },
    )
}

#[derive(Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<EngineEvent>,
    dropped: Arc<AtomicU64>,
}

impl EventSender {
    pub fn push(&self, event: EngineEvent) {
        if let Err(mpsc::error::SendError(event)) = self.tx.send(event) {
            debug!(?event, "engine gone, event discarded");
        }
    }

    pub fn sample(&self, packet: WeatherPacket) {
        self.push(EngineEvent::Sample(packet));
    }

    pub fn shutdown(&self) {
        self.push(EngineEvent::Shutdown);
    }

    /// Samples discarded so far because the backlog was full
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

pub struct EventReceiver {
    rx: mpsc::UnboundedReceiver<EngineEvent>,
    pending: VecDeque<EngineEvent>,
    backlog: usize,
    dropped: Arc<AtomicU64>,
}

impl EventReceiver {
    /// Next event, `Ok(None)` if none arrives within `timeout`.
    ///
    /// Fails with [`RealtimeError::QueueClosed`] once every queued event has
    /// been delivered and all senders are gone.
    pub async fn recv_timeout(&mut self, timeout: Duration) -> RealtimeResult<Option<EngineEvent>> {
        if self.pending.is_empty() {
            match tokio::time::timeout(timeout, self.rx.recv()).await {
                Err(_) => return Ok(None),
                Ok(None) => return Err(RealtimeError::QueueClosed),
                Ok(Some(event)) => self.pending.push_back(event),
            }
        }
        while let Ok(event) = self.rx.try_recv() {
            self.pending.push_back(event);
        }
        self.shed_samples();
        Ok(self.pending.pop_front())
    }

    /// Drop the oldest samples beyond the backlog
    fn shed_samples(&mut self) {
        let samples = self.pending.iter().filter(|e| e.is_sample()).count();
        let excess = samples.saturating_sub(self.backlog);
        if excess == 0 {
            return;
        }
        let mut remaining = excess;
        self.pending.retain(|event| {
            if remaining > 0 && event.is_sample() {
                remaining -= 1;
                false
            } else {
                true
            }
        });
        let total = self.dropped.fetch_add(excess as u64, Ordering::Relaxed) + excess as u64;
        debug!(excess, dropped = total, "backlog full, dropped oldest samples");
    }
}
