use super::state::{ Conversation, Settlement, SubmitError };
use super::ConversationEvent;
use crate::backend::{ BackendError, ChatBackend };
use crate::models::chat::Turn;
use log::{ debug, error, info, warn };
use std::sync::{ Arc, Mutex, MutexGuard, PoisonError };
use std::time::{ Duration, Instant };
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

struct Inner {
    conversation: Conversation,
    in_flight: Option<CancellationToken>,
    events: mpsc::UnboundedSender<ConversationEvent>,
}

impl Inner {
    fn publish(&self, event: ConversationEvent) {
        let _ = self.events.send(event);
    }
}

fn lock(shared: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConversationSnapshot {
    pub turns: Vec<Turn>,
    pub draft: String,
    pub pending: bool,
    pub last_error: Option<String>,
}

/// Owns one session's conversation and runs at most one backend exchange at
/// a time.
#[derive(Clone)]
pub struct ConversationStore {
    shared: Arc<Mutex<Inner>>,
    backend: Arc<dyn ChatBackend>,
    request_timeout: Duration,
}

impl ConversationStore {
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        request_timeout: Duration,
        allow_blank: bool
    ) -> (Self, mpsc::UnboundedReceiver<ConversationEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let inner = Inner {
            conversation: Conversation::new(allow_blank),
            in_flight: None,
            events: tx,
        };
        let store = Self {
            shared: Arc::new(Mutex::new(inner)),
            backend,
            request_timeout,
        };
        (store, rx)
    }

    pub fn snapshot(&self) -> ConversationSnapshot {
        let inner = lock(&self.shared);
        ConversationSnapshot {
            turns: inner.conversation.turns().to_vec(),
            draft: inner.conversation.draft().to_string(),
            pending: inner.conversation.is_pending(),
            last_error: inner.conversation.last_error().map(str::to_string),
        }
    }

    pub fn is_pending(&self) -> bool {
        lock(&self.shared).conversation.is_pending()
    }

    pub fn allows_blank(&self) -> bool {
        lock(&self.shared).conversation.allows_blank()
    }

    pub fn set_draft(&self, text: impl Into<String>) {
        lock(&self.shared).conversation.set_draft(text);
    }

    pub fn apply_suggestion(&self, suggestion: &str) {
        lock(&self.shared).conversation.apply_suggestion(suggestion);
    }

    /// Submits the current draft and spawns the exchange on the current Tokio
    /// runtime.
    pub fn submit(&self) -> Result<SubmitHandle, SubmitError> {
        let cancel = CancellationToken::new();
        let outgoing = {
            let mut inner = lock(&self.shared);
            let outgoing = inner.conversation.begin_submit()?;
            inner.in_flight = Some(cancel.clone());
            if let Some(turn) = inner.conversation.turns().last().cloned() {
                inner.publish(ConversationEvent::TurnAppended(turn));
            }
            inner.publish(ConversationEvent::PendingChanged(true));
            outgoing
        };
        info!("Submitting message {} to {}", outgoing.id, self.backend.endpoint());

        let request_id = outgoing.id.clone();
        let permit = InFlightPermit {
            shared: self.shared.clone(),
            request_id: request_id.clone(),
            released: false,
        };
        let backend = self.backend.clone();
        let deadline = self.request_timeout;
        let token = cancel.clone();

        let join = tokio::spawn(async move {
            let started = Instant::now();
            let settlement = tokio::select! {
                _ = token.cancelled() => {
                    info!("Message {} cancelled after {:?}", outgoing.id, started.elapsed());
                    Settlement::Cancelled
                }
                result = tokio::time::timeout(deadline, backend.send(&outgoing)) => {
                    match result {
                        Ok(Ok(reply)) => {
                            debug!("Message {} answered in {:?}", outgoing.id, started.elapsed());
                            Settlement::Replied(Turn::from(reply))
                        }
                        Ok(Err(e)) => {
                            error!("Exchange for message {} failed: {}", outgoing.id, e);
                            Settlement::Failed(e.to_string())
                        }
                        Err(_) => {
                            let e = BackendError::Timeout(deadline);
                            error!("Exchange for message {} failed: {}", outgoing.id, e);
                            Settlement::Failed(e.to_string())
                        }
                    }
                }
            };
            permit.release(settlement.clone());
            settlement
        });

        Ok(SubmitHandle { request_id, cancel, join })
    }

    /// Sets the draft and submits it in one step.
    pub fn submit_text(&self, text: impl Into<String>) -> Result<SubmitHandle, SubmitError> {
        {
            let inner = lock(&self.shared);
            if inner.conversation.is_pending() {
                return Err(SubmitError::Busy);
            }
        }
        self.set_draft(text);
        self.submit()
    }

    /// Cancels the in-flight exchange. Returns false when nothing was pending.
    pub fn stop(&self) -> bool {
        let inner = lock(&self.shared);
        match &inner.in_flight {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }
}

/// Single-flight permit held by the exchange task. Dropping it without an
/// explicit release (abort, panic) settles the request as cancelled.
struct InFlightPermit {
    shared: Arc<Mutex<Inner>>,
    request_id: String,
    released: bool,
}

impl InFlightPermit {
    fn release(mut self, settlement: Settlement) {
        self.apply(settlement);
    }

    fn apply(&mut self, settlement: Settlement) {
        if self.released {
            return;
        }
        self.released = true;

        let mut inner = lock(&self.shared);
        let event = match &settlement {
            Settlement::Replied(turn) => ConversationEvent::TurnAppended(turn.clone()),
            Settlement::Failed(message) => ConversationEvent::ExchangeFailed(message.clone()),
            Settlement::Cancelled => ConversationEvent::ExchangeCancelled,
        };
        if !inner.conversation.settle(&self.request_id, settlement) {
            warn!("Ignoring settlement for stale message {}", self.request_id);
            return;
        }
        inner.in_flight = None;
        inner.publish(event);
        inner.publish(ConversationEvent::PendingChanged(false));
    }
}

impl Drop for InFlightPermit {
    fn drop(&mut self) {
        if !self.released {
            self.apply(Settlement::Cancelled);
        }
    }
}

/// Handle to one in-flight exchange.
pub struct SubmitHandle {
    request_id: String,
    cancel: CancellationToken,
    join: JoinHandle<Settlement>,
}

impl SubmitHandle {
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Tears the exchange task down without waiting for it to observe
    /// cancellation.
    pub fn abort(&self) {
        self.join.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    pub async fn wait(self) -> Settlement {
        match self.join.await {
            Ok(settlement) => settlement,
            Err(e) => {
                if !e.is_cancelled() {
                    error!("Exchange task for message {} failed: {}", self.request_id, e);
                }
                Settlement::Cancelled
            }
        }
    }
}
