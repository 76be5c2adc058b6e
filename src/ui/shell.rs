use super::input::{ parse_line, InputAction, InputControl, HELP };
use super::render::{ render_turn, Palette };
use super::theme::{ Theme, ThemeState };
use crate::conversation::{ ConversationEvent, ConversationStore, SubmitError, SubmitHandle };
use log::{ info, warn };
use std::error::Error;
use std::io::Write;
use tokio::io::{ AsyncBufRead, AsyncBufReadExt };
use tokio::sync::mpsc;

pub const TITLE: &str = "Research Trend Analysis";

const OVERVIEW: &str = "\
Explore citation patterns in the OpenCitations dataset, enriched with Wikidata
and DBpedia: track how research areas grow, find influential publications and
authors, and follow how fields evolve over time. Ask a question to begin.";

#[derive(Debug, Clone, Copy)]
pub struct Suggestion {
    pub title: &'static str,
    pub label: &'static str,
    pub action: &'static str,
}

pub const SUGGESTIONS: [Suggestion; 2] = [
    Suggestion {
        title: "How many",
        label: "publications?",
        action: "How many publications were authored in 2016?",
    },
    Suggestion {
        title: "Find the article",
        label: "about oxidative stress",
        action: "find articles about oxidative stress. Return the title of the most relevant article",
    },
];

/// Looks up a starter by its 1-based position as shown on the landing page.
pub fn suggestion(index: usize) -> Option<&'static Suggestion> {
    index.checked_sub(1).and_then(|i| SUGGESTIONS.get(i))
}

/// Terminal input is not guaranteed to be UTF-8; invalid bytes are replaced
/// rather than ending the session.
fn decode_line(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    if text.contains(char::REPLACEMENT_CHARACTER) {
        warn!("Input line was not valid UTF-8; invalid bytes replaced");
    }
    text.trim_end_matches(['\n', '\r']).to_string()
}

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

/// Terminal page: navbar, landing blurb with starters, message list and the
/// input prompt, all driven from one event loop.
pub struct PageShell {
    store: ConversationStore,
    events: mpsc::UnboundedReceiver<ConversationEvent>,
    theme: ThemeState,
    styled: bool,
    input: InputControl,
    in_flight: Option<SubmitHandle>,
}

impl PageShell {
    pub fn new(
        store: ConversationStore,
        events: mpsc::UnboundedReceiver<ConversationEvent>,
        theme: ThemeState,
        styled: bool
    ) -> Self {
        Self {
            store,
            events,
            theme,
            styled,
            input: InputControl::new(),
            in_flight: None,
        }
    }

    fn palette(&self) -> Palette {
        Palette::new(self.theme.current(), self.styled)
    }

    pub fn navbar(&self) -> String {
        let palette = self.palette();
        let toggle = match self.theme.current() {
            Theme::Dark => "☀ /theme",
            Theme::Light => "☾ /theme",
        };
        format!("{}  {}", palette.strong(TITLE), palette.muted(toggle))
    }

    pub fn landing(&self) -> String {
        let palette = self.palette();
        let mut out = format!("\n{}\n\n", palette.muted(OVERVIEW));
        for (i, s) in SUGGESTIONS.iter().enumerate() {
            out.push_str(&format!("  /{}  {} {}\n", i + 1, palette.strong(s.title), palette.muted(s.label)));
        }
        out
    }

    pub async fn run<R, W>(mut self, input: R, out: &mut W) -> Result<(), Box<dyn Error + Send + Sync>>
        where R: AsyncBufRead + Unpin, W: Write
    {
        writeln!(out, "{}", self.navbar())?;
        if self.store.snapshot().turns.is_empty() {
            write!(out, "{}", self.landing())?;
        }
        self.prompt(out)?;

        let mut input = input;
        // Partial reads survive a cancelled select branch, so the buffer is
        // only cleared once a whole line has been handled.
        let mut buf = Vec::new();
        loop {
            tokio::select! {
                read = input.read_until(b'\n', &mut buf) => {
                    let eof = read? == 0;
                    if !buf.is_empty() {
                        let line = decode_line(&buf);
                        buf.clear();
                        if self.handle_line(&line, out)? == Flow::Quit {
                            break;
                        }
                    }
                    if eof {
                        self.finish_in_flight(out).await?;
                        break;
                    }
                }
                Some(event) = self.events.recv() => {
                    self.handle_event(event, out)?;
                }
            }
        }
        info!("Chat session closed with {} turns", self.store.snapshot().turns.len());
        Ok(())
    }

    fn prompt<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        write!(out, "{}", self.input.prompt())?;
        out.flush()
    }

    fn handle_line<W: Write>(&mut self, line: &str, out: &mut W) -> std::io::Result<Flow> {
        let palette = self.palette();
        match parse_line(line) {
            InputAction::Send(text) => self.submit(Some(text), out)?,
            InputAction::SendDraft => {
                if self.store.allows_blank() || !self.store.snapshot().draft.trim().is_empty() {
                    self.submit(None, out)?;
                }
            }
            InputAction::Stop => {
                if !self.input.stop(&self.store) {
                    writeln!(out, "{}", palette.muted("nothing to stop"))?;
                }
            }
            InputAction::ToggleTheme => {
                let theme = self.theme.toggle();
                info!("Theme switched to {}", theme.label());
                writeln!(out, "{}", self.navbar())?;
            }
            InputAction::Suggest(n) =>
                match suggestion(n) {
                    Some(s) => {
                        self.store.apply_suggestion(s.action);
                        writeln!(out, "{} {}", palette.muted("draft:"), s.action)?;
                    }
                    None => writeln!(out, "{}", palette.error(&format!("no starter #{}", n)))?,
                }
            InputAction::ShowDraft => {
                writeln!(out, "{} {}", palette.muted("draft:"), self.store.snapshot().draft)?;
            }
            InputAction::Help => writeln!(out, "{}", HELP)?,
            InputAction::Quit => {
                if let Some(handle) = self.in_flight.take() {
                    handle.abort();
                }
                return Ok(Flow::Quit);
            }
            InputAction::Unknown(command) => {
                writeln!(out, "{}", palette.error(&format!("unknown command {} (try /help)", command)))?;
            }
        }
        self.prompt(out)?;
        Ok(Flow::Continue)
    }

    fn submit<W: Write>(&mut self, text: Option<String>, out: &mut W) -> std::io::Result<()> {
        let palette = self.palette();
        match self.input.submit(&self.store, text) {
            Ok(handle) => {
                self.in_flight = Some(handle);
            }
            Err(SubmitError::Busy) => {
                writeln!(
                    out,
                    "{}",
                    palette.muted("still waiting for a reply; draft kept (/stop to cancel)")
                )?;
            }
            Err(SubmitError::EmptyDraft) => {
                writeln!(out, "{}", palette.muted("nothing to send"))?;
            }
        }
        Ok(())
    }

    fn handle_event<W: Write>(&mut self, event: ConversationEvent, out: &mut W) -> std::io::Result<()> {
        let palette = self.palette();
        match event {
            ConversationEvent::TurnAppended(turn) => {
                writeln!(out, "{}", render_turn(&turn, &palette))?;
            }
            ConversationEvent::PendingChanged(pending) => {
                self.input.set_pending(pending);
                if pending {
                    writeln!(out, "{}", palette.muted("thinking… (/stop to cancel)"))?;
                } else {
                    self.in_flight = None;
                    self.prompt(out)?;
                }
            }
            ConversationEvent::ExchangeFailed(message) => {
                writeln!(out, "{}", palette.error(&format!("⚠ {}", message)))?;
            }
            ConversationEvent::ExchangeCancelled => {
                writeln!(out, "{}", palette.muted("request cancelled"))?;
            }
        }
        out.flush()
    }

    /// Input closed: let an outstanding exchange finish so its reply is shown.
    async fn finish_in_flight<W: Write>(&mut self, out: &mut W) -> std::io::Result<()> {
        if let Some(handle) = self.in_flight.take() {
            if !handle.is_finished() {
                info!("Input closed, waiting for message {}", handle.request_id());
            }
            handle.wait().await;
        }
        while let Ok(event) = self.events.try_recv() {
            self.handle_event(event, out)?;
        }
        if self.store.is_pending() {
            warn!("Exiting with a request still pending");
        }
        writeln!(out)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ BackendError, ChatBackend };
    use crate::models::chat::{ OutgoingMessage, ReplyMessage, Role };
    use crate::ui::theme::{ Theme, ThemePreference };
    use async_trait::async_trait;
    use std::sync::{ Arc, Mutex };
    use std::time::Duration;

    struct EchoBackend {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ChatBackend for EchoBackend {
        async fn send(&self, message: &OutgoingMessage) -> Result<ReplyMessage, BackendError> {
            self.seen.lock().unwrap().push(message.content.clone());
            if message.content.contains("fail") {
                return Err(BackendError::Transport("connection refused".to_string()));
            }
            Ok(ReplyMessage {
                id: format!("a-{}", message.id),
                role: Role::Assistant,
                content: format!("**answer** to {}", message.content),
                created_at: None,
            })
        }

        fn endpoint(&self) -> String {
            "echo://".to_string()
        }
    }

    async fn run_script(script: &str) -> (String, Vec<String>, ConversationStore) {
        run_bytes(script.as_bytes(), false).await
    }

    async fn run_bytes(
        script: &[u8],
        allow_blank: bool
    ) -> (String, Vec<String>, ConversationStore) {
        let backend = Arc::new(EchoBackend { seen: Mutex::new(Vec::new()) });
        let (store, events) = ConversationStore::new(
            backend.clone(),
            Duration::from_secs(5),
            allow_blank
        );
        let theme = ThemeState::init(ThemePreference::System, Theme::Dark);
        let shell = PageShell::new(store.clone(), events, theme, false);

        let mut out = Vec::new();
        shell.run(script, &mut out).await.unwrap();
        let seen = backend.seen.lock().unwrap().clone();
        (String::from_utf8(out).unwrap(), seen, store)
    }

    #[test]
    fn suggestions_are_one_based() {
        assert_eq!(suggestion(1).unwrap().action, "How many publications were authored in 2016?");
        assert!(suggestion(0).is_none());
        assert!(suggestion(3).is_none());
    }

    #[tokio::test]
    async fn landing_page_lists_title_and_starters() {
        let (out, seen, _) = run_script("").await;
        assert!(out.starts_with(TITLE));
        assert!(out.contains("/1  How many publications?"));
        assert!(out.contains("/2  Find the article about oxidative stress"));
        assert!(seen.is_empty());
    }

    #[tokio::test]
    async fn starter_then_enter_sends_the_suggestion() {
        let (out, seen, store) = run_script("/1\n\n").await;
        assert_eq!(seen, vec!["How many publications were authored in 2016?"]);
        assert!(out.contains("answer to How many publications were authored in 2016?"));

        let snap = store.snapshot();
        assert_eq!(snap.turns.len(), 2);
        assert!(!snap.pending);
    }

    #[tokio::test]
    async fn failed_request_shows_error_indicator() {
        let (out, _, store) = run_script("please fail\n").await;
        assert!(out.contains("⚠ request failed: connection refused"));
        assert!(!store.is_pending());
        assert_eq!(store.snapshot().turns.len(), 1);
    }

    #[tokio::test]
    async fn theme_toggle_redraws_navbar_and_unknown_commands_are_reported() {
        let (out, _, _) = run_script("/theme\n/bogus\n").await;
        assert!(out.contains("☀ /theme"));
        assert!(out.contains("☾ /theme"));
        assert!(out.contains("unknown command /bogus"));
    }

    #[tokio::test]
    async fn quit_stops_reading_input() {
        let (_, seen, _) = run_script("/quit\nnever sent\n").await;
        assert!(seen.is_empty());
    }

    #[tokio::test]
    async fn invalid_utf8_line_does_not_end_the_session() {
        let (out, seen, store) = run_bytes(b"/\xff\xfe\nhello\n", false).await;
        assert!(out.contains("unknown command /\u{FFFD}\u{FFFD}"));
        assert_eq!(seen, vec!["hello"]);
        assert!(out.contains("answer to hello"));
        assert!(!store.is_pending());
    }

    #[tokio::test]
    async fn last_line_without_newline_is_still_sent() {
        let (_, seen, _) = run_script("no newline").await;
        assert_eq!(seen, vec!["no newline"]);
    }

    #[tokio::test]
    async fn blank_lines_send_nothing_by_default() {
        let (_, seen, store) = run_script("   \n\n").await;
        assert!(seen.is_empty());
        assert!(store.snapshot().turns.is_empty());
    }

    #[tokio::test]
    async fn blank_lines_are_sent_when_allowed() {
        let (_, seen, store) = run_bytes(b"   \n", true).await;
        assert_eq!(seen, vec![""]);
        let snap = store.snapshot();
        assert_eq!(snap.turns.len(), 2);
        assert_eq!(snap.turns[0].content, "");
    }
}
