//! Refresh progress reporting and cooperative cancellation.
//!
//! Progress updates are advisory and droppable: a slow consumer loses
//! intermediate ticks, never correctness. The cancellation token is the
//! only channel back into a running refresh, and it is strictly
//! cooperative - in-flight fetches finish, their results are discarded.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::debug;

use crate::models::Category;

/// One progress tick. `panels` lists the categories the active stage is
/// touching; their per-panel progress mirrors the global percentage.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    pub percent: u8,
    pub status: String,
    pub panels: Vec<Category>,
}

/// Cooperative cancellation flag shared between the engine and its
/// caller. Cloning hands out another handle to the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    pub(crate) fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Non-blocking sender for progress ticks.
#[derive(Clone)]
pub struct ProgressSender {
    tx: Option<mpsc::Sender<ProgressUpdate>>,
}

impl ProgressSender {
    pub fn new(tx: Option<mpsc::Sender<ProgressUpdate>>) -> Self {
        Self { tx }
    }

    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn send(&self, percent: u8, status: impl Into<String>, panels: &[Category]) {
        if let Some(ref tx) = self.tx {
            let update = ProgressUpdate {
                percent,
                status: status.into(),
                panels: panels.to_vec(),
            };
            if let Err(e) = tx.try_send(update) {
                debug!(error = %e, "Dropping progress update");
            }
        }
    }
}

/// Fine-grained sub-progress for the match-detail stage, which can span
/// hundreds of fetches. Interpolates over its own percent span as items
/// complete; clones share the counter so pool workers can tick it.
#[derive(Clone)]
pub struct SubProgress {
    sender: ProgressSender,
    done: Arc<AtomicUsize>,
    total: usize,
    span: (u8, u8),
    panels: Vec<Category>,
}

impl SubProgress {
    pub fn new(sender: ProgressSender, total: usize, span: (u8, u8), panels: Vec<Category>) -> Self {
        Self {
            sender,
            done: Arc::new(AtomicUsize::new(0)),
            total,
            span,
            panels,
        }
    }

    pub fn tick(&self, status: &str) {
        let done = self.done.fetch_add(1, Ordering::SeqCst) + 1;
        let total = self.total.max(1);
        let (low, high) = self.span;
        let percent = low + (usize::from(high - low) * done.min(total) / total) as u8;
        self.sender.send(
            percent,
            format!("{} ({}/{})", status, done, self.total),
            &self.panels,
        );
    }
}
