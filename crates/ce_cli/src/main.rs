use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use clap::Parser;
use tracing::{info, Level};
use ce_core::config::{DEFAULT_GEMINI_BASE_URL, DEFAULT_SEARCH_URL, DEFAULT_EXCLUDED_DOMAIN};
use ce_core::EnhancerConfig;
use ce_scrapers::cli::{EnhanceArgs, EnhanceCommands, handle_command};
use ce_scrapers::init_logging;

#[derive(Debug, Clone, Copy, PartialEq)]
struct HumanDuration(Duration);

impl FromStr for HumanDuration {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut total_seconds = 0u64;
        let mut current_number = String::new();
        let mut has_unit = false;

        for c in s.chars() {
            if c.is_ascii_digit() {
                current_number.push(c);
            } else if let Ok(num) = current_number.parse::<u64>() {
                let unit = match c {
                    's' => 1,
                    'm' => 60,
                    'h' => 3600,
                    'd' => 86400,
                    _ => return Err(format!("Invalid duration unit: {}", c)),
                };
                total_seconds = num
                    .checked_mul(unit)
                    .and_then(|secs| total_seconds.checked_add(secs))
                    .ok_or_else(|| format!("Duration too large: {}", s))?;
                current_number.clear();
                has_unit = true;
            } else if !c.is_whitespace() {
                return Err(format!("Invalid character in duration: {}", c));
            }
        }

        // bare number means seconds
        if !current_number.is_empty() {
            let num = current_number
                .parse::<u64>()
                .map_err(|_| "Invalid number in duration".to_string())?;
            total_seconds = total_seconds
                .checked_add(num)
                .ok_or_else(|| format!("Duration too large: {}", s))?;
            has_unit = true;
        }

        if !has_unit {
            return Err("Duration must include a number".to_string());
        }
        if total_seconds == 0 {
            return Err("Duration must be greater than zero".to_string());
        }

        Ok(HumanDuration(Duration::from_secs(total_seconds)))
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Rewrites pending blog articles using competitor research", long_about = None)]
pub struct Cli {
    /// Gemini API key
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true, default_value = "")]
    api_key: String,
    /// Base URL of the articles API, e.g. http://localhost:8000/api/articles
    #[arg(long, env = "ARTICLES_API_URL", default_value = "http://localhost:8000/api/articles")]
    storage_url: String,
    /// Storage backend: http, or memory for a dry run over --seed
    #[arg(long, default_value = "http")]
    storage: String,
    /// JSON array of articles for the memory backend
    #[arg(long)]
    seed: Option<PathBuf>,
    #[arg(long, env = "GEMINI_BASE_URL", default_value = DEFAULT_GEMINI_BASE_URL)]
    gemini_url: String,
    #[arg(long, default_value = DEFAULT_SEARCH_URL)]
    search_url: String,
    /// Domain kept out of competitor results
    #[arg(long, default_value = DEFAULT_EXCLUDED_DOMAIN)]
    exclude_domain: String,
    /// Number of competitor articles per rewrite
    #[arg(long, default_value_t = 2)]
    competitors: usize,
    /// Give up researching an article after this long (e.g. 3m)
    #[arg(long)]
    deadline: Option<HumanDuration>,
    /// Run the browser without a window
    #[arg(long)]
    headless: bool,
    #[arg(short, long)]
    verbose: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Enhance pending articles
    Run {
        /// Run in periodic mode with the specified interval (e.g. 1h, 30m, 1h15m30s)
        #[arg(long)]
        interval: Option<HumanDuration>,
        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// List generation models
    Models,
    /// Search competitors for a topic
    Search {
        topic: String,
    },
}

impl Cli {
    fn config(&self) -> EnhancerConfig {
        let mut config = EnhancerConfig::new(self.api_key.clone(), self.storage_url.clone());
        config.gemini_base_url = self.gemini_url.clone();
        config.search_url = self.search_url.clone();
        config.excluded_domain = self.exclude_domain.clone();
        config.competitor_limit = self.competitors;
        config.headless = self.headless;
        if let Some(deadline) = self.deadline {
            config.article_deadline = deadline.0;
        }
        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let logger = init_logging(if cli.verbose { Level::DEBUG } else { Level::INFO });

    let config = cli.config();
    config.validate()?;
    info!("⚙️ {:?}", config);

    let storage = ce_storage::create_storage(&cli.storage, Some(&config.storage_url), cli.seed.as_deref())?;
    info!("💾 Storage backend: {}", storage.name());

    let command = cli.command.unwrap_or(Commands::Run { interval: None, json: false });
    match command {
        Commands::Run { interval, json } => {
            let args = EnhanceArgs {
                command: EnhanceCommands::Run { json },
            };
            if let Some(interval) = interval {
                info!("Running in periodic mode with {}s interval", interval.0.as_secs());
                loop {
                    info!("Starting enhancement cycle");
                    if let Err(e) = handle_command(args.clone(), &config, storage.clone()).await {
                        logger.error(&format!("Error during enhancement: {}", e));
                    }
                    info!("Waiting {}s before next cycle", interval.0.as_secs());
                    tokio::time::sleep(interval.0).await;
                }
            } else {
                handle_command(args, &config, storage).await?;
            }
        }
        Commands::Models => {
            let args = EnhanceArgs {
                command: EnhanceCommands::Models,
            };
            handle_command(args, &config, storage).await?;
        }
        Commands::Search { topic } => {
            let args = EnhanceArgs {
                command: EnhanceCommands::Search { topic },
            };
            handle_command(args, &config, storage).await?;
        }
    }

    Ok(())
}
