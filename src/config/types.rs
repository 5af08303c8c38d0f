use serde::Deserialize;

/// Main configuration structure for Ripple
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub seed: SeedConfig,
}

/// Engine sizing and crawl behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct CrawlerConfig {
    /// Slots in each of the four inter-stage queues
    #[serde(rename = "queue-capacity", default = "default_queue_capacity")]
    pub queue_capacity: u32,

    /// Number of downloaders, and separately of analyzers
    #[serde(rename = "pool-size", default = "default_pool_size")]
    pub pool_size: u32,

    /// Requests deeper than this are dropped; the seed is depth 0
    #[serde(rename = "max-depth", default = "default_max_depth")]
    pub max_depth: u32,

    /// Stop an item's processor chain at its first error
    #[serde(rename = "fail-fast", default)]
    pub fail_fast: bool,
}

fn default_queue_capacity() -> u32 {
    64
}

fn default_pool_size() -> u32 {
    4
}

fn default_max_depth() -> u32 {
    1
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            pool_size: default_pool_size(),
            max_depth: default_max_depth(),
            fail_fast: false,
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

/// Where the crawl begins
#[derive(Debug, Clone, Deserialize)]
pub struct SeedConfig {
    pub url: String,
}
