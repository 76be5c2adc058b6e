mod state;
mod store;

pub use state::{ Conversation, Phase, Settlement, SubmitError };
pub use store::{ ConversationSnapshot, ConversationStore, SubmitHandle };

use crate::models::chat::Turn;

/// Change notifications published by [`ConversationStore`], in the order the
/// changes were applied.
#[derive(Debug, Clone, PartialEq)]
pub enum ConversationEvent {
    TurnAppended(Turn),
    PendingChanged(bool),
    ExchangeFailed(String),
    ExchangeCancelled,
}
