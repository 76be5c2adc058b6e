use crate::conversation::{ ConversationStore, SubmitError, SubmitHandle };
use log::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputAction {
    /// Replace the draft with this text and send it.
    Send(String),
    /// Send whatever is in the draft (an empty line).
    SendDraft,
    Stop,
    ToggleTheme,
    Suggest(usize),
    ShowDraft,
    Help,
    Quit,
    Unknown(String),
}

pub const HELP: &str = "\
/1, /2 or /suggest N  prefill the draft with a starter question (Enter sends it)
/draft                show the current draft
/stop                 cancel the request in flight
/theme                toggle light/dark
/quit                 leave";

pub fn parse_line(line: &str) -> InputAction {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return InputAction::SendDraft;
    }
    let Some(command) = trimmed.strip_prefix('/') else {
        return InputAction::Send(line.to_string());
    };

    let mut parts = command.split_whitespace();
    let name = parts.next().unwrap_or_default();
    match name {
        "stop" => InputAction::Stop,
        "theme" => InputAction::ToggleTheme,
        "draft" => InputAction::ShowDraft,
        "help" | "?" => InputAction::Help,
        "quit" | "exit" | "q" => InputAction::Quit,
        "suggest" =>
            match parts.next().and_then(|n| n.parse::<usize>().ok()) {
                Some(n) => InputAction::Suggest(n),
                None => InputAction::Unknown(trimmed.to_string()),
            }
        other =>
            match other.parse::<usize>() {
                Ok(n) => InputAction::Suggest(n),
                Err(_) => InputAction::Unknown(trimmed.to_string()),
            }
    }
}

/// The prompt that feeds the conversation store. Submission is refused while
/// an exchange is outstanding; typed text is still kept as the draft.
#[derive(Debug, Default)]
pub struct InputControl {
    disabled: bool,
}

impl InputControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_pending(&mut self, pending: bool) {
        self.disabled = pending;
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn prompt(&self) -> &'static str {
        if self.disabled { "… " } else { "> " }
    }

    /// Submits `text` (or the existing draft when `None`) through `store`.
    pub fn submit(
        &self,
        store: &ConversationStore,
        text: Option<String>
    ) -> Result<SubmitHandle, SubmitError> {
        if let Some(text) = text {
            store.set_draft(text);
        }
        if self.disabled || store.is_pending() {
            debug!("Submit refused: request in flight");
            return Err(SubmitError::Busy);
        }
        store.submit()
    }

    pub fn stop(&self, store: &ConversationStore) -> bool {
        store.stop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ BackendError, ChatBackend };
    use crate::models::chat::{ OutgoingMessage, ReplyMessage };
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::time::Duration;

    struct NeverBackend;

    #[async_trait]
    impl ChatBackend for NeverBackend {
        async fn send(&self, _message: &OutgoingMessage) -> Result<ReplyMessage, BackendError> {
            std::future::pending().await
        }

        fn endpoint(&self) -> String {
            "never://".to_string()
        }
    }

    #[test]
    fn parses_commands_and_text() {
        assert_eq!(parse_line(""), InputAction::SendDraft);
        assert_eq!(parse_line("  "), InputAction::SendDraft);
        assert_eq!(parse_line("hello"), InputAction::Send("hello".to_string()));
        assert_eq!(parse_line("/stop"), InputAction::Stop);
        assert_eq!(parse_line("/theme"), InputAction::ToggleTheme);
        assert_eq!(parse_line("/2"), InputAction::Suggest(2));
        assert_eq!(parse_line("/suggest 1"), InputAction::Suggest(1));
        assert_eq!(parse_line("/suggest x"), InputAction::Unknown("/suggest x".to_string()));
        assert_eq!(parse_line("/q"), InputAction::Quit);
        assert_eq!(parse_line("/nope"), InputAction::Unknown("/nope".to_string()));
    }

    #[tokio::test]
    async fn disabled_control_keeps_draft_but_refuses_submit() {
        let (store, _events) = ConversationStore::new(
            Arc::new(NeverBackend),
            Duration::from_secs(30),
            false
        );
        let mut control = InputControl::new();

        let handle = control.submit(&store, Some("first".to_string())).unwrap();
        control.set_pending(true);
        assert_eq!(control.prompt(), "… ");

        let refused = control.submit(&store, Some("second".to_string()));
        assert!(matches!(refused, Err(SubmitError::Busy)));
        let snap = store.snapshot();
        assert_eq!(snap.turns.len(), 1);
        assert_eq!(snap.draft, "second");

        assert!(control.stop(&store));
        handle.wait().await;
        control.set_pending(false);

        let handle = control.submit(&store, None).unwrap();
        assert_eq!(store.snapshot().turns[1].content, "second");
        handle.abort();
    }
}
