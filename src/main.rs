use anyhow::Result;
use clap::Parser;
use std::io::Write;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use seeker::agent::{self, PipelineOutcome, ResearchEvent};
use seeker::cache::{CacheStore, SWEEP_INTERVAL};
use seeker::cli::{Cli, Commands};
use seeker::config::Settings;
use seeker::fetch::Fetcher;
use seeker::llm::{self, Message, ModelHandle};
use seeker::tools::{SearchRequest, ToolRegistry};
use seeker::ui::Console;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let settings = Settings::load()?;
    let console = Console::new();

    match cli.command {
        Some(Commands::Ask {
            query,
            skip_inquire,
        }) => {
            let app = App::start(&settings).await?;
            app.ask(&console, vec![Message::user(query)], skip_inquire)
                .await?;
        }
        Some(Commands::Search {
            query,
            max_results,
            include_domain,
            exclude_domain,
        }) => {
            let app = App::start(&settings).await?;
            let request = SearchRequest {
                query,
                max_results,
                include_domains: include_domain,
                exclude_domains: exclude_domain,
            };
            let results = app
                .tools
                .execute("search", &serde_json::to_value(&request)?)
                .await?;
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
        Some(Commands::Config) => {
            console.show_config(&settings);
        }
        None => {
            console.banner();
            let app = App::start(&settings).await?;
            app.repl(&console).await?;
        }
    }

    Ok(())
}

/// Long-lived pieces shared by every command: the resolved model and the
/// tool registry (which owns the HTTP client pools and the cache handle).
struct App {
    handle: ModelHandle,
    tools: Arc<ToolRegistry>,
}

impl App {
    async fn start(settings: &Settings) -> Result<Self> {
        llm::log_available(settings);
        let handle = llm::resolve(settings)?;

        let fetcher = Arc::new(Fetcher::new()?);
        let cache = CacheStore::connect(&settings.cache).await;
        cache.spawn_sweeper(SWEEP_INTERVAL, "search:*".to_string());

        let tools = Arc::new(ToolRegistry::from_settings(settings, fetcher, cache));
        Ok(Self { handle, tools })
    }

    /// Run one query through the pipeline, rendering events as they arrive.
    async fn ask(
        &self,
        console: &Console,
        history: Vec<Message>,
        skip_inquire: bool,
    ) -> Result<PipelineOutcome> {
        let (tx, mut rx) = mpsc::unbounded_channel::<ResearchEvent>();
        let renderer = tokio::spawn(async move {
            let console = Console::new();
            while let Some(event) = rx.recv().await {
                console.render(&event);
            }
        });

        let outcome = agent::run_pipeline(
            self.handle.clone(),
            self.tools.clone(),
            &tx,
            history,
            skip_inquire,
        )
        .await;
        drop(tx);
        if renderer.await.is_err() {
            console.warn("display task panicked");
        }
        outcome
    }

    async fn repl(&self, console: &Console) -> Result<()> {
        console.info("Type a question, or 'exit' to quit.");
        let mut history: Vec<Message> = Vec::new();
        // Set after a clarifying question; the next input answers it.
        let mut answering_inquiry = false;

        loop {
            let Some(line) = read_line("❯ ")? else {
                break;
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if line == "exit" || line == "quit" {
                break;
            }

            console.user_message(line);
            history.push(Message::user(line));

            let outcome = self
                .ask(console, history.clone(), answering_inquiry)
                .await?;
            match outcome {
                PipelineOutcome::Clarify(inquiry) => {
                    history.push(Message::assistant(&inquiry.question));
                    answering_inquiry = true;
                }
                PipelineOutcome::Answer(result) => {
                    history.push(Message::assistant(&result.answer));
                    answering_inquiry = false;
                }
            }
        }
        Ok(())
    }
}

fn read_line(prompt: &str) -> Result<Option<String>> {
    print!("\n{prompt}");
    std::io::stdout().flush()?;
    let mut input = String::new();
    let read = std::io::stdin().read_line(&mut input)?;
    if read == 0 {
        return Ok(None); // EOF
    }
    Ok(Some(input))
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "seeker=debug" } else { "seeker=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
