use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "seeker")]
#[command(version)]
#[command(about = "Streaming research assistant - search, read, answer with sources", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Research a question and stream the answer
    Ask {
        /// The question to research
        #[arg(required = true)]
        query: String,

        /// Answer directly, never ask clarifying questions
        #[arg(long)]
        skip_inquire: bool,
    },

    /// Run a raw web search without the research loop
    Search {
        /// Search query
        #[arg(required = true)]
        query: String,

        /// Number of results to return
        #[arg(short = 'n', long, default_value = "10")]
        max_results: usize,

        /// Only include results from these domains
        #[arg(long)]
        include_domain: Vec<String>,

        /// Drop results from these domains
        #[arg(long)]
        exclude_domain: Vec<String>,
    },

    /// Show current configuration
    Config,
}
