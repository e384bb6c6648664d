use colored::Colorize;
use std::io::Write;

use crate::agent::{ResearchEvent, StepKind};
use crate::config::Settings;

pub struct Console;

impl Console {
    pub fn new() -> Self {
        Self
    }

    pub fn banner(&self) {
        let version = env!("CARGO_PKG_VERSION");

        println!(
            r#"
{}
{}
{}
{}
{}
{}
"#,
            "███████╗███████╗███████╗██╗  ██╗███████╗██████╗ ".bright_cyan(),
            "██╔════╝██╔════╝██╔════╝██║ ██╔╝██╔════╝██╔══██╗".bright_cyan(),
            "███████╗█████╗  █████╗  █████╔╝ █████╗  ██████╔╝".bright_cyan(),
            "╚════██║██╔══╝  ██╔══╝  ██╔═██╗ ██╔══╝  ██╔══██╗".bright_cyan(),
            format!("███████║███████╗███████╗██║  ██╗███████╗██║  ██║  v{}", version).bright_cyan(),
            "         Ask anything, sources included".dimmed(),
        );
    }

    pub fn info(&self, message: &str) {
        println!("{} {}", "[INFO]".blue(), message);
    }

    pub fn warn(&self, message: &str) {
        println!("{} {}", "[WARN]".yellow(), message);
    }

    pub fn error(&self, message: &str) {
        println!("{} {}", "[ERROR]".red(), message);
    }

    pub fn user_message(&self, message: &str) {
        println!("\n{} {}", "▶".cyan().bold(), message);
    }

    /// Render one pipeline event. Text deltas print inline and flush so
    /// the answer appears as it streams.
    pub fn render(&self, event: &ResearchEvent) {
        match event {
            ResearchEvent::TextDelta(delta) => {
                print!("{delta}");
                std::io::stdout().flush().ok();
            }
            ResearchEvent::Step(step) => {
                let label = match step.kind {
                    StepKind::Initial => "searching",
                    StepKind::Continuation => "digging deeper",
                };
                println!(
                    "\n{} {}",
                    format!("[STEP {}]", step.step).magenta(),
                    label.dimmed()
                );
                for pair in &step.pairs {
                    let marker = if pair.is_error {
                        "✗".red().to_string()
                    } else {
                        "✓".green().to_string()
                    };
                    println!("  {} {}", marker, pair.name.cyan());
                }
            }
            ResearchEvent::Inquiry(inquiry) => {
                println!("\n{} {}", "?".yellow().bold(), inquiry.question.bold());
                for (i, option) in inquiry.options.iter().enumerate() {
                    println!("  {} {}", format!("{}.", i + 1).dimmed(), option);
                }
                if inquiry.allows_input {
                    let label = inquiry.input_label.as_deref().unwrap_or("Or type your own");
                    println!("  {}", label.dimmed());
                }
            }
            ResearchEvent::Related(related) => {
                if related.items.is_empty() {
                    return;
                }
                println!("\n{}", "RELATED".bold().underline());
                for item in &related.items {
                    println!("  {} {}", "•".cyan(), item.query);
                }
            }
            ResearchEvent::Done { .. } => {
                println!();
            }
        }
    }

    pub fn show_config(&self, settings: &Settings) {
        println!("\n{}", "CONFIGURATION".bold().underline());
        println!("{}", "─".repeat(50));

        println!("\n  {}", "Providers (in fallback order):".yellow());
        for provider in &settings.providers {
            let status = if provider.is_configured() {
                "configured".green()
            } else {
                "not configured".red()
            };
            println!(
                "    {} {} {}",
                provider.kind.as_str().cyan().bold(),
                format!("({})", provider.model).dimmed(),
                status
            );
        }

        println!("\n  {}", "Search:".yellow());
        println!(
            "    SearXNG: {}",
            match &settings.search.searxng_url {
                Some(url) => url.normal(),
                None => "not set".dimmed(),
            }
        );
        println!(
            "    Serper (video): {}",
            if settings.search.serper_api_key.is_some() {
                "configured".green()
            } else {
                "not set".dimmed()
            }
        );

        println!("\n  {}", "Cache:".yellow());
        if settings.cache.use_local_redis {
            println!("    redis: {}", settings.cache.local_redis_url.dimmed());
        } else if settings.cache.upstash_rest_url.is_some() {
            println!("    upstash REST");
        } else {
            println!("    {}", "in-memory (no persistence)".dimmed());
        }
        println!();
    }
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}
