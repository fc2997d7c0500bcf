//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use mediahub_core::ContentKind;

/// Aggregate catalog providers and resolve playable streams.
///
/// Every command prints JSON on stdout; logs go to stderr.
#[derive(Parser, Debug)]
#[command(name = "mediahub")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Base-URL configuration document (overrides config file and MEDIAHUB_CONFIG_URL)
    #[arg(long, global = true)]
    pub config_url: Option<String>,

    /// Per-provider call timeout in seconds (1-300)
    #[arg(long, global = true, value_parser = clap::value_parser!(u64).range(1..=300))]
    pub timeout: Option<u64>,

    /// Config file path (default: $XDG_CONFIG_HOME/mediahub/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Engine operations.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Show registered providers and their state
    Providers,

    /// List one catalog page from every enabled provider
    Posts {
        /// Catalog filter token (unknown tokens use each provider's first filter)
        #[arg(long, default_value = "")]
        filter: String,

        /// Page number
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        page: u32,
    },

    /// Search every provider that supports search
    Search {
        /// Free-text query
        query: String,

        /// Page number
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        page: u32,
    },

    /// Fetch metadata, trying providers in priority order
    Meta {
        /// Detail link (`movie/<id>`, `tv/<id>` or a provider URL)
        link: String,

        /// Provider to try first
        #[arg(long)]
        provider: Option<String>,
    },

    /// Collect candidate streams from every enabled provider
    Streams {
        /// Content link (`movie/<id>`, `tv/<id>/<season>/<episode>` or a provider URL)
        link: String,

        /// Kind assumed for bare numeric ids
        #[arg(long, default_value = "movie")]
        kind: ContentKind,
    },

    /// List episodes behind a season link, trying providers in priority order
    Episodes {
        /// Season link
        url: String,

        /// Provider to try first
        #[arg(long)]
        provider: Option<String>,
    },

    /// Run one extractor directly against a landing page
    Extract {
        /// Landing-page URL
        url: String,

        /// Extractor to use
        #[arg(long, value_enum, default_value_t = ExtractMode::Generic)]
        mode: ExtractMode,
    },
}

/// Extractor selection for `extract`.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractMode {
    /// Scan the page for video tags, CDN iframes and inline media URLs
    Generic,
    /// Follow the landing page's redirect chain to download hosts
    Redirect,
}
