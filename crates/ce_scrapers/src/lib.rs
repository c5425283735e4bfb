pub mod browser;
pub mod cli;
pub mod extractor;
pub mod logging;
pub mod manager;
pub mod search;

#[cfg(test)]
pub(crate) mod test_utils;

pub use browser::{BrowserLauncher, BrowserSession, ChromeLauncher, WebPage};
pub use cli::{handle_command, EnhanceArgs, EnhanceCommands};
pub use extractor::{ContentExtractor, Extraction};
pub use logging::{init_logging, Logger};
pub use manager::{ArticleOutcome, ArticleStage, EnhancementManager, RunSummary};
pub use search::SearchHarvester;

pub mod prelude {
    pub use super::manager::EnhancementManager;
    pub use ce_core::{Article, ArticleStore, EnhancerConfig, Error, Result};
}
