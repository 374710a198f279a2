use crate::Transaction;
use parking_lot::Mutex;
use std::collections::VecDeque;
use tracing::debug;

/// Unbounded FIFO of transactions waiting for a block.
#[derive(Debug, Default)]
pub struct Mempool {
    queue: Mutex<VecDeque<Transaction>>,
}

impl Mempool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submit(&self, tx: Transaction) {
        let mut queue = self.queue.lock();
        queue.push_back(tx);
        debug!("mempool size {}", queue.len());
    }

    /// Takes every queued transaction in arrival order, leaving the pool empty.
    pub fn drain_all(&self) -> Vec<Transaction> {
        let drained = std::mem::take(&mut *self.queue.lock());
        drained.into()
    }

    /// Puts transactions back at the head, ahead of anything submitted since.
    pub fn requeue_front(&self, txs: Vec<Transaction>) {
        if txs.is_empty() {
            return;
        }
        let mut queue = self.queue.lock();
        for tx in txs.into_iter().rev() {
            queue.push_front(tx);
        }
    }

    /// Advisory; may be stale as soon as it returns.
    pub fn size(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn pending(&self) -> Vec<Transaction> {
        self.queue.lock().iter().cloned().collect()
    }
}
