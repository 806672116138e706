use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use site_assistant::agent_core::DEFAULT_SESSION;
use site_assistant::config::{load_config, AssistantConfig};
use site_assistant::{build_assistant, build_site, init_tracing, server};

#[derive(Parser, Debug)]
#[command(name = "site-assistant")]
#[command(version, about = "Chat assistant that answers questions from a website's own pages", long_about = None)]
struct Cli {
    /// Config file (defaults to $SITE_ASSISTANT_CONFIG or site-assistant.yaml found upward)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Write logs to assistant.log in the data directory instead of stderr
    #[arg(long, global = true)]
    log_file: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the HTTP chat API
    Serve {
        /// Port to listen on (overrides config and PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Interactive chat on stdin. `/reset` clears history, `/quit` exits
    Chat {
        /// Conversation session id
        #[arg(short, long, default_value = DEFAULT_SESSION)]
        session: String,
    },
    /// Search the URL index
    Search {
        query: String,

        /// Maximum results
        #[arg(short, long, default_value_t = 5)]
        limit: usize,
    },
    /// Fetch one page and print its extracted content
    Fetch { url: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.log_file)?;

    let config = load_config(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Commands::Serve { port } => serve(config, port).await,
        Commands::Chat { session } => chat_repl(config, &session).await,
        Commands::Search { query, limit } => search(config, &query, limit),
        Commands::Fetch { url } => fetch(config, &url).await,
    }
}

async fn serve(config: AssistantConfig, port: Option<u16>) -> Result<()> {
    let assistant = Arc::new(build_assistant(&config)?);
    let port = port.unwrap_or(config.server.port);
    server::serve(assistant, &config.server.host, port).await
}

async fn chat_repl(config: AssistantConfig, session: &str) -> Result<()> {
    let assistant = build_assistant(&config)?;
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    stdout
        .write_all(b"Ask about the website. /reset clears the conversation, /quit exits.\n")
        .await?;

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        match line {
            "" => continue,
            "/quit" | "/exit" => break,
            "/reset" => {
                assistant.reset_session(session);
                stdout.write_all(b"(conversation cleared)\n").await?;
            }
            message => {
                let answer = assistant.chat_in(session, message).await;
                stdout.write_all(format!("\n{answer}\n\n").as_bytes()).await?;
            }
        }
    }
    Ok(())
}

fn search(config: AssistantConfig, query: &str, limit: usize) -> Result<()> {
    let (index, _) = build_site(&config)?;
    let results = index.search(query, limit);
    if results.is_empty() {
        println!("no matching URLs");
    }
    for hit in results {
        println!(
            "{:>4}  {:<8} {}  ({})",
            hit.score,
            hit.record.category.as_str(),
            hit.record.url,
            hit.record.title
        );
    }
    Ok(())
}

async fn fetch(config: AssistantConfig, url: &str) -> Result<()> {
    let (_, fetcher) = build_site(&config)?;
    let page = fetcher
        .fetch_one(url)
        .await
        .with_context(|| format!("fetching {url}"))?;
    println!("{}", serde_json::to_string_pretty(&page)?);
    Ok(())
}
