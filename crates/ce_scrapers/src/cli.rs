use std::sync::Arc;
use clap::{Args, Subcommand};
use ce_core::{ArticleStore, EnhancerConfig, Result};
use ce_inference::select_model;
use crate::browser::{BrowserLauncher, ChromeLauncher};
use crate::manager::{EnhancementManager, RunSummary};
use crate::search::SearchHarvester;

#[derive(Args, Clone, Debug)]
pub struct EnhanceArgs {
    #[command(subcommand)]
    pub command: EnhanceCommands,
}

#[derive(Subcommand, Clone, Debug)]
pub enum EnhanceCommands {
    /// Enhance every pending article once
    Run {
        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the provider's models and show which one would be used
    Models,
    /// Run a competitor search for a topic without touching storage
    Search {
        topic: String,
    },
}

pub async fn handle_command(
    args: EnhanceArgs,
    config: &EnhancerConfig,
    storage: Arc<dyn ArticleStore>,
) -> Result<()> {
    match args.command {
        EnhanceCommands::Run { json } => {
            let manager = EnhancementManager::from_config(config.clone(), storage)?;
            let summary = manager.run().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print_summary(&summary);
            }
        }
        EnhanceCommands::Models => {
            let model = ce_inference::create_model(config)?;
            let models = model.list_models().await?;
            let selected = select_model(&models, &config.model_families);
            println!("Available models ({}):", models.len());
            for descriptor in &models {
                let marker = match &selected {
                    Some(s) if s.as_str() == descriptor.name => "👉",
                    _ => "  ",
                };
                println!(
                    "{} {} {}",
                    marker,
                    descriptor.name,
                    descriptor.supported_generation_methods.join(",")
                );
            }
            if selected.is_none() {
                println!("No matching model, {} would be used", config.default_model);
            }
        }
        EnhanceCommands::Search { topic } => {
            let harvester = SearchHarvester::new(config);
            let session = ChromeLauncher::new(config.headless).launch().await?;
            let result = harvester
                .search(session.page(), &topic, &config.excluded_domain)
                .await;
            if let Err(e) = session.close().await {
                tracing::warn!("⚠️ Failed to close the browser: {}", e);
            }
            let links = result?;
            println!("Found {} competitors for \"{}\"", links.len(), topic);
            for link in links {
                println!("  🦗 {}", link);
            }
        }
    }
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!("Run {}", summary.run_id);
    println!("  fetched:        {}", summary.fetched);
    println!("  pending:        {}", summary.pending);
    println!("  ✨ enhanced:    {}", summary.enhanced);
    println!("  ⚠️ fallback:    {}", summary.fallback);
    println!("  ⏭️ skipped:     {}", summary.skipped);
    println!("  💾 not saved:   {}", summary.persist_failed);
}
