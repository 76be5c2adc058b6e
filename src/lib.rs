pub mod backend;
pub mod cli;
pub mod conversation;
pub mod models;
pub mod ui;

use backend::new_backend;
use cli::{ Args, ClientConfig };
use conversation::{ ConversationStore, Settlement };
use log::info;
use std::error::Error;
use std::io::IsTerminal;
use ui::render::{ render_turn, Palette };
use ui::shell::PageShell;
use ui::theme::ThemeState;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    let config = ClientConfig::try_from(&args)?;

    info!("--- Client Configuration ---");
    info!("Backend Endpoint: {}", config.backend.endpoint);
    info!("Request Timeout: {:?}", config.backend.request_timeout);
    info!("Allow Blank Messages: {}", config.allow_blank);
    info!("Theme Preference: {:?}", config.theme);
    info!("One-shot Query: {}", config.query.is_some());
    info!("----------------------------");

    let backend = new_backend(&config.backend)?;
    let (store, events) = ConversationStore::new(
        backend,
        config.backend.request_timeout,
        config.allow_blank
    );
    let theme = ThemeState::from_env(config.theme);
    let styled = !config.plain && std::io::stdout().is_terminal();

    match config.query {
        Some(query) => ask_once(&store, query, Palette::new(theme.current(), styled)).await,
        None => {
            let shell = PageShell::new(store, events, theme, styled);
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            let mut stdout = std::io::stdout();
            shell.run(stdin, &mut stdout).await
        }
    }
}

async fn ask_once(
    store: &ConversationStore,
    query: String,
    palette: Palette
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let handle = store.submit_text(query)?;
    match handle.wait().await {
        Settlement::Replied(turn) => {
            println!("{}", render_turn(&turn, &palette));
            Ok(())
        }
        Settlement::Failed(message) => Err(message.into()),
        Settlement::Cancelled => Err("request cancelled".into()),
    }
}
