// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! CLI definitions for the tagstorm command-line interface.
//!
//! `inspect` decodes a captured search response offline. Everything else
//! talks to a running service: `search`, `tags`, `image` and `logs`.
//! Connection settings come from `--config`, then `--api-url`/`--token`
//! (or their env vars) on top.

pub mod display;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tagstorm::{OrderBy, SearchSelect, WireFormat};

#[derive(Parser)]
#[command(
    name = "tagstorm",
    about = "Client for the tagstorm image-tagging service",
    version
)]
pub struct Cli {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Raise log verbosity (-v info, -vv debug, -vvv trace). RUST_LOG wins.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Clone)]
pub struct ConnectionArgs {
    /// JSON config file; missing fields take their defaults
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Service base URL
    #[arg(long, env = "TAGSTORM_API_URL", global = true)]
    pub api_url: Option<String>,

    /// Bearer token
    #[arg(long, env = "TAGSTORM_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Decode a captured search response and show its structure
    Inspect {
        /// Path to the response bytes
        file: PathBuf,

        /// Response generation
        #[arg(long, value_enum, default_value_t = WireFormat::Flat)]
        format: WireFormat,

        /// Tag list (output of `tags --json`), used to resolve table-format tag names
        #[arg(long, value_name = "FILE")]
        tags: Option<PathBuf>,

        /// Print the decoded result as JSON instead of a diagram
        #[arg(long)]
        json: bool,
    },

    /// Run a search against the service
    Search(SearchArgs),

    /// List every tag
    Tags {
        #[arg(long)]
        json: bool,
    },

    /// Show one image by hash
    Image {
        /// 64-char hex hash
        hash: String,

        #[arg(long)]
        json: bool,
    },

    /// Print audit log entries, oldest first
    Logs {
        /// Only entries for this image
        #[arg(long)]
        image: Option<String>,

        /// Only entries with this action
        #[arg(long)]
        action: Option<String>,

        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Require this tag id (repeatable; all must match)
    #[arg(long = "tag", value_name = "ID")]
    pub tags: Vec<u64>,

    /// Exclude this tag id (repeatable)
    #[arg(long = "not-tag", value_name = "ID")]
    pub not_tags: Vec<u64>,

    /// Require an attribute, `KEY` or `KEY=VALUE` (repeatable)
    #[arg(long = "attr", value_name = "KEY[=VALUE]")]
    pub attributes: Vec<String>,

    #[arg(long)]
    pub min_id: Option<u64>,

    #[arg(long)]
    pub max_id: Option<u64>,

    /// Fields to return
    #[arg(long, value_enum, value_delimiter = ',', default_value = "id")]
    pub select: Vec<SearchSelect>,

    #[arg(long, value_enum, default_value = "id")]
    pub order_by: OrderBy,

    /// Stop after this many results
    #[arg(short, long)]
    pub limit: Option<u64>,

    /// Fetch every match page by page instead of one request
    #[arg(long, conflicts_with = "limit")]
    pub all: bool,

    #[arg(long)]
    pub json: bool,
}
