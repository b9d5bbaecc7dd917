use assistant_client::config::get_configuration;
use assistant_client::context::{ConversationContext, FileStore};
use assistant_client::session::{ChatController, ChatSession, PageRenderer};
use assistant_client::HttpChatTransport;
use dotenvy::dotenv;
use service_core::observability::init_tracing;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Say(&'a str),
    Choose(usize),
    Clear,
    Quit,
}

fn parse_command(line: &str) -> Command<'_> {
    let trimmed = line.trim();
    match trimmed {
        "/clear" | "/new" => Command::Clear,
        "/quit" | "/exit" => Command::Quit,
        _ => match trimmed.strip_prefix('/').map(str::parse::<usize>) {
            Some(Ok(n)) => Command::Choose(n),
            _ => Command::Say(line),
        },
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let settings = get_configuration().map_err(|e| {
        eprintln!("Failed to read configuration: {}", e);
        anyhow::anyhow!("Configuration error: {}", e)
    })?;

    init_tracing(
        "pitchdesk-assistant",
        &settings.observability.log_level,
        settings.observability.otlp_endpoint.as_deref(),
    );

    let store = Arc::new(FileStore::new(&settings.storage.directory));
    tracing::info!(path = %store.path().display(), "Using conversation store");

    let transport = Arc::new(HttpChatTransport::new(&settings.api));
    tracing::info!(endpoint = %transport.endpoint(), "Initialized chat transport");

    let session = ChatSession::new(
        transport,
        ConversationContext::load(store),
        settings.api.bearer_token.clone(),
    );
    let page = ChatController::new(session.clone(), PageRenderer::new(std::io::stdout()));
    page.renderer().render_history(&session.messages());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match parse_command(&line) {
            Command::Quit => break,
            Command::Clear => page.clear(),
            Command::Choose(n) => match page.renderer().choice(n) {
                Some(choice) => {
                    page.activate(&choice).await;
                }
                None => println!("No option /{}", n),
            },
            Command::Say(text) => {
                page.send(text).await;
            }
        }
    }

    Ok(())
}
