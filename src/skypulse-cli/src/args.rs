//! Command line arguments.

use clap::Parser;

use skypulse_jetstream::JetstreamConfig;

/// Live sample of the Bluesky Jetstream firehose.
///
/// Press Enter to connect or disconnect, `q` then Enter to quit.
#[derive(Debug, Parser)]
#[command(name = "skypulse")]
#[command(about = "Live sample of the Bluesky Jetstream firehose")]
#[command(version)]
pub struct Args {
    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<String>,

    /// Log level
    #[arg(long, default_value = "warn")]
    pub log_level: String,

    /// Enable JSON logging
    #[arg(long)]
    pub json_logs: bool,

    /// Connect immediately instead of waiting for the first toggle
    #[arg(long)]
    pub connect: bool,

    /// Endpoint host; repeat to build the pool (replaces the configured pool)
    #[arg(short, long = "endpoint", value_name = "HOST")]
    pub endpoints: Vec<String>,

    /// Collection NSID; repeat for several (replaces the configured list)
    #[arg(long = "collection", value_name = "NSID")]
    pub collections: Vec<String>,

    /// Only sample posts carrying this hashtag; repeat for several
    #[arg(long = "hashtag", value_name = "TAG")]
    pub hashtags: Vec<String>,

    /// Seed for endpoint and word selection
    #[arg(long)]
    pub seed: Option<u64>,

    /// Seconds before a session is closed
    #[arg(long, value_name = "SECS")]
    pub idle_timeout: Option<u64>,
}

impl Args {
    /// Override `config` with every flag that was given.
    pub fn apply_to(&self, config: &mut JetstreamConfig) {
        if !self.endpoints.is_empty() {
            config.endpoints = self.endpoints.clone();
        }
        if !self.collections.is_empty() {
            config.collections = self.collections.clone();
        }
        if !self.hashtags.is_empty() {
            config.hashtags = self
                .hashtags
                .iter()
                .map(|tag| tag.trim_start_matches('#').to_string())
                .collect();
        }
        if let Some(seed) = self.seed {
            config.seed = Some(seed);
        }
        if let Some(timeout) = self.idle_timeout {
            config.idle_timeout_secs = timeout;
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_args_defaults_keep_config() {
        let args = Args::parse_from(["skypulse"]);
        assert!(!args.connect);
        assert_eq!(args.log_level, "warn");

        let mut config = JetstreamConfig::default();
        args.apply_to(&mut config);
        assert_eq!(config, JetstreamConfig::default());
    }

    #[test]
    fn test_args_override_config() {
        let args = Args::parse_from([
            "skypulse",
            "--connect",
            "--endpoint",
            "a.example.com",
            "-e",
            "b.example.com",
            "--hashtag",
            "#Rust",
            "--seed",
            "3",
            "--idle-timeout",
            "30",
        ]);
        assert!(args.connect);

        let mut config = JetstreamConfig::default();
        args.apply_to(&mut config);
        assert_eq!(
            config.endpoints,
            vec!["a.example.com".to_string(), "b.example.com".to_string()]
        );
        assert_eq!(config.hashtags, vec!["Rust".to_string()]);
        assert_eq!(config.seed, Some(3));
        assert_eq!(config.idle_timeout_secs, 30);
        assert_eq!(config.collections, JetstreamConfig::default().collections);
    }
}
