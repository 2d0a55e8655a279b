//! Serialized command execution
//!
//! One worker drains a FIFO of utterances. For each it awaits the parse call,
//! hands the command to the assistant and waits for the execution to finish
//! before taking the next, so two commands never interleave.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use super::{CommandParser, ParseOutcome};
use crate::events::{Event, Inbox};
use crate::{Error, Result};

/// FIFO of utterances awaiting parse and execution
#[derive(Debug)]
pub struct ActionQueue {
    tx: mpsc::UnboundedSender<String>,
    pending: Arc<AtomicUsize>,
    worker: JoinHandle<()>,
}

impl ActionQueue {
    /// Start the worker
    #[must_use]
    pub fn spawn(parser: Arc<dyn CommandParser>, inbox: Inbox) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let pending = Arc::new(AtomicUsize::new(0));
        let worker = tokio::spawn(drain(parser, inbox, rx, Arc::clone(&pending)));

        Self { tx, pending, worker }
    }

    /// Queue an utterance
    ///
    /// # Errors
    ///
    /// Returns error if the worker has exited
    pub fn push(&self, text: &str) -> Result<()> {
        self.pending.fetch_add(1, Ordering::AcqRel);
        self.tx.send(text.to_string()).map_err(|_| {
            self.pending.fetch_sub(1, Ordering::AcqRel);
            Error::Stopped
        })?;

        tracing::debug!(text, pending = self.pending(), "command queued");
        Ok(())
    }

    /// Utterances queued or in flight
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }
}

impl Drop for ActionQueue {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

async fn drain(
    parser: Arc<dyn CommandParser>,
    inbox: Inbox,
    mut rx: mpsc::UnboundedReceiver<String>,
    pending: Arc<AtomicUsize>,
) {
    while let Some(text) = rx.recv().await {
        let keep_going = process(parser.as_ref(), &inbox, text).await;
        pending.fetch_sub(1, Ordering::AcqRel);

        if !keep_going {
            break;
        }
    }
    tracing::debug!("action queue stopped");
}

/// Parse and execute one utterance; returns false once the assistant is gone
async fn process(parser: &dyn CommandParser, inbox: &Inbox, text: String) -> bool {
    let command = match parser.parse(&text).await {
        Ok(ParseOutcome::Command(command)) => command,
        Ok(ParseOutcome::NotUnderstood) => {
            tracing::info!(text, "unknown command");
            return true;
        }
        Err(e) => {
            tracing::warn!(text, error = %e, "parse failed, command dropped");
            return true;
        }
    };

    let (done_tx, done_rx) = oneshot::channel();
    let sent = inbox.send(Event::Execute {
        text,
        command,
        done: done_tx,
    });
    if sent.is_err() {
        return false;
    }

    // Dropped without a signal means the assistant discarded it
    let _ = done_rx.await;
    true
}
