mod cli;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use lia::config::LiaConfig;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "lia",
    version,
    about = "Natural language search over your personal knowledge base",
    args_conflicts_with_subcommands = true
)]
struct Cli {
    /// Question to ask. Prompts for one when omitted.
    query: Vec<String>,

    /// Also search this topic, whether or not the question names it
    #[arg(short, long)]
    topic: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// List topics or review groups
    List(ListArgs),
    /// Show the questions of a topic
    Show {
        /// Topic name (file name without .md)
        topic: String,
    },
    /// Review a topic group by group
    Review {
        /// Topic name (file name without .md)
        topic: String,
    },
    /// Show recent questions
    History {
        /// Number of entries
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,
    },
    /// Stop the matching service
    Stop,
    /// Run the matching service in the foreground
    Serve,
    /// Manage the embedding model
    Model {
        #[command(subcommand)]
        action: ModelAction,
    },
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct ListArgs {
    /// All topics
    #[arg(short, long)]
    topics: bool,
    /// All review groups, most urgent first
    #[arg(short, long)]
    review_groups: bool,
    /// Review groups due today
    #[arg(short, long)]
    due: bool,
}

#[derive(Subcommand)]
enum ModelAction {
    /// Download the embedding model
    Download,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = LiaConfig::load()?;

    // Log to stderr so stdout stays clean for answers. The service logs at the
    // configured level; interactive commands only report problems.
    let level = match cli.command {
        Some(Command::Serve) => config.server.log_level.as_str(),
        _ => "warn",
    };
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        None => {
            let query = (!cli.query.is_empty()).then(|| cli.query.join(" "));
            cli::search::search(&config, query, cli.topic.as_deref()).await?;
        }
        Some(Command::List(args)) => {
            if args.topics {
                cli::list::topics(&config)?;
            } else {
                cli::list::review_groups(&config, args.due)?;
            }
        }
        Some(Command::Show { topic }) => cli::show::show(&config, &topic)?,
        Some(Command::Review { topic }) => cli::review::review(&config, &topic)?,
        Some(Command::History { limit }) => cli::history::history(&config, limit).await?,
        Some(Command::Stop) => cli::stop::stop(&config).await?,
        Some(Command::Serve) => lia::service::serve(config).await?,
        Some(Command::Model { action }) => match action {
            ModelAction::Download => cli::model_download(&config.embedding).await?,
        },
    }

    Ok(())
}
