use clap::Parser;

use crate::config::{DEFAULT_CHUNK_SIZE, ExtractConfig};
use crate::io::RetryPolicy;
use crate::session::ExtractRequest;

#[derive(Parser, Debug)]
#[command(name = "otazip")]
#[command(version)]
#[command(about = "Extract partition images from Android OTA payloads", long_about = None)]
#[command(after_help = "Examples:\n  \
  otazip ota.zip boot vbmeta        extract boot and vbmeta from ota.zip\n  \
  otazip -d out payload.bin         extract every partition into out/\n  \
  otazip -l https://example.com/ota.zip   list partitions of a remote OTA")]
pub struct Cli {
    /// OTA package, payload.bin path or HTTP URL
    #[arg(value_name = "SOURCE")]
    pub source: String,

    /// Partitions to extract (default: all)
    #[arg(value_name = "PARTITIONS")]
    pub partitions: Vec<String>,

    /// List partitions instead of extracting
    #[arg(short = 'l')]
    pub list: bool,

    /// Extract images into exdir
    #[arg(short = 'd', value_name = "DIR", default_value = ".")]
    pub extract_dir: String,

    /// Never overwrite existing files
    #[arg(short = 'n')]
    pub never_overwrite: bool,

    /// Overwrite files WITHOUT prompting
    #[arg(short = 'o')]
    pub overwrite: bool,

    /// Quiet mode, only errors are logged
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    pub quiet: u8,

    /// More log output (-v => debug, -vv => trace)
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Largest single range request, in bytes
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: u64,

    /// Attempts per range request before giving up
    #[arg(long, value_name = "N", default_value_t = 3)]
    pub retries: u32,

    /// Payload file name to look for inside ZIP packages (repeatable)
    #[arg(long = "payload-name", value_name = "NAME")]
    pub payload_names: Vec<String>,
}

impl Cli {
    pub fn is_http_url(&self) -> bool {
        self.source.starts_with("http://") || self.source.starts_with("https://")
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet > 0
    }

    pub fn config(&self) -> ExtractConfig {
        let defaults = ExtractConfig::default();

        ExtractConfig {
            chunk_size: self.chunk_size.max(1),
            retry: RetryPolicy::new(self.retries, defaults.retry.base_delay),
            payload_names: if self.payload_names.is_empty() {
                defaults.payload_names.clone()
            } else {
                self.payload_names.clone()
            },
            ..defaults
        }
    }

    pub fn request(&self, partitions: Vec<String>) -> ExtractRequest {
        ExtractRequest::new(self.source.clone(), partitions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_flags_onto_config() {
        let cli = Cli::parse_from([
            "otazip",
            "--chunk-size",
            "1024",
            "--retries",
            "5",
            "--payload-name",
            "update.bin",
            "https://example.com/ota.zip",
            "boot",
        ]);

        assert!(cli.is_http_url());
        assert_eq!(cli.partitions, vec!["boot"]);

        let config = cli.config();
        assert_eq!(config.chunk_size, 1024);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.payload_names, vec!["update.bin"]);
    }

    #[test]
    fn defaults_match_library() {
        let cli = Cli::parse_from(["otazip", "payload.bin"]);
        let config = cli.config();

        assert!(!cli.is_http_url());
        assert_eq!(cli.extract_dir, ".");
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(config.retry, RetryPolicy::default());
        assert_eq!(config.payload_names, vec!["payload.bin"]);
    }
}
