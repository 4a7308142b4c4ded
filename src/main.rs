// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use tagstorm::wire::{ResponseHeader, HEADER_LEN};
use tagstorm::{
    decode_as, ApiTag, ClientConfig, ImageHash, ImageRecord, LogFilter, ResultVariant,
    SearchOperator, SearchQuery, SearchSelect, TagDictionary, TagStormClient, WireFormat,
};

mod cli;
use cli::display::{self, row, section_bot, section_mid, section_top, themed, title};
use cli::{Cli, Commands, ConnectionArgs, SearchArgs};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("❌ {:#}", e);
        std::process::exit(1);
    }
}

/// `RUST_LOG` wins; otherwise warn, raised by each `-v`.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = match std::env::var("RUST_LOG") {
        Ok(_) => EnvFilter::from_default_env(),
        Err(_) => EnvFilter::default().add_directive(level.into()),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Inspect {
            file,
            format,
            tags,
            json,
        } => inspect(&file, format, tags.as_deref(), json),
        Commands::Search(args) => {
            let client = connect(&cli.connection)?;
            search(&client, args).await
        }
        Commands::Tags { json } => {
            let client = connect(&cli.connection)?;
            let tags = client.list_tags().await.context("listing tags")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&tags)?);
            } else {
                for tag in tags {
                    let name = if tag.active {
                        tag.name
                    } else {
                        format!("{} (inactive)", tag.name)
                    };
                    println!("{:>8}  {}", tag.id, name);
                }
            }
            Ok(())
        }
        Commands::Image { hash, json } => {
            let hash: ImageHash = hash.parse()?;
            let client = connect(&cli.connection)?;
            let Some(image) = client.image_by_hash(&hash).await? else {
                bail!("image {} not found", hash);
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&image)?);
                return Ok(());
            }
            let dict = client.tag_dictionary().await?;
            println!("id       {}", image.id);
            println!("hash     {}", image.hash);
            println!("active   {}", image.active);
            println!("tags     {}", image.tag_names(&dict).join(", "));
            for (key, values) in &image.attributes {
                println!("{:<8} {}", key, values.join(", "));
            }
            if let Some(caption) = &image.caption {
                println!("caption  {}", caption);
            }
            Ok(())
        }
        Commands::Logs {
            image,
            action,
            json,
        } => {
            let mut filter = LogFilter::default();
            if let Some(hash) = image {
                filter = filter.image(hash.parse()?);
            }
            if let Some(action) = action {
                filter = filter.action(action);
            }
            let client = connect(&cli.connection)?;
            let logs = client.list_logs(&filter).await.context("reading logs")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&logs)?);
            } else {
                for entry in logs {
                    let subject = entry
                        .image_hash
                        .map(|h| display::truncate(&h.to_hex(), 16))
                        .unwrap_or_default();
                    let detail = match (&entry.tag, &entry.attribute_key) {
                        (Some(tag), _) => tag.clone(),
                        (None, Some(key)) => format!(
                            "{}={}",
                            key,
                            entry.attribute_value.as_deref().unwrap_or("")
                        ),
                        (None, None) => String::new(),
                    };
                    println!(
                        "{:>8}  {:>10}  user {:<4} {:<20} {:<16} {}",
                        entry.id, entry.timestamp, entry.user_id, entry.action, subject, detail
                    );
                }
            }
            Ok(())
        }
    }
}

// ============================================================================
// CONNECTION
// ============================================================================

/// Defaults, then `--config`, then flags/env on top.
fn client_config(args: &ConnectionArgs) -> Result<ClientConfig> {
    let mut config = match &args.config {
        Some(path) => ClientConfig::load(path)?,
        None => ClientConfig::default(),
    };
    if let Some(url) = &args.api_url {
        config.api_url = url.clone();
    }
    if let Some(token) = &args.token {
        config.token = Some(token.clone());
    }
    config.validate()?;
    Ok(config)
}

fn connect(args: &ConnectionArgs) -> Result<TagStormClient<tagstorm::ReqwestPrimitive>> {
    let config = client_config(args)?;
    tracing::debug!(api_url = %config.api_url, format = %config.wire_format, "connecting");
    TagStormClient::connect(config).context("building HTTP client")
}

// ============================================================================
// SEARCH
// ============================================================================

/// `KEY=VALUE` or bare `KEY` (any value).
fn parse_attribute(spec: &str) -> Result<SearchOperator> {
    match spec.split_once('=') {
        Some(("", _)) => bail!("attribute filter {:?} has an empty key", spec),
        Some((key, value)) => Ok(SearchOperator::attribute(key, Some(value))),
        None if spec.is_empty() => bail!("empty attribute filter"),
        None => Ok(SearchOperator::attribute(spec, None)),
    }
}

fn build_operator(args: &SearchArgs) -> Result<Option<SearchOperator>> {
    let mut terms: Vec<SearchOperator> =
        args.tags.iter().map(|&t| SearchOperator::tag(t)).collect();
    terms.extend(args.not_tags.iter().map(|&t| SearchOperator::tag(t).not()));
    for spec in &args.attributes {
        terms.push(parse_attribute(spec)?);
    }
    terms.extend(args.min_id.map(SearchOperator::min_id));
    terms.extend(args.max_id.map(SearchOperator::max_id));
    Ok(SearchOperator::all_of(terms))
}

async fn search(
    client: &TagStormClient<tagstorm::ReqwestPrimitive>,
    args: SearchArgs,
) -> Result<()> {
    let operator = build_operator(&args)?;
    if let Some(op) = &operator {
        tracing::info!(query = %op, "searching");
    }

    let result = if args.all {
        let records = client
            .search_all(operator, &args.select, None)
            .await
            .context("paging through search results")?;
        ResultVariant::ImageRecordList(records)
    } else {
        let mut query = SearchQuery::new(args.select.iter().copied()).order_by(args.order_by);
        if let Some(op) = operator {
            query = query.operator(op);
        }
        if let Some(limit) = args.limit {
            query = query.limit(limit);
        }
        client.search(&query).await.context("search failed")?
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    let needs_names = args.select.contains(&SearchSelect::Tags);
    let dict = if needs_names {
        client.tag_dictionary().await?
    } else {
        TagDictionary::new()
    };
    print_result(&result, &dict);
    eprintln!("{} result(s)", result.len());
    Ok(())
}

fn print_result(result: &ResultVariant, dict: &TagDictionary) {
    match result {
        ResultVariant::IdList(ids) => ids.iter().for_each(|id| println!("{}", id)),
        ResultVariant::HashList(hashes) => hashes.iter().for_each(|h| println!("{}", h)),
        ResultVariant::ImageRecordList(records) => {
            for record in records {
                println!("{}", record_line(record, dict));
            }
        }
    }
}

fn record_line(record: &ImageRecord, dict: &TagDictionary) -> String {
    let mut parts = Vec::new();
    if let Some(id) = record.id {
        parts.push(format!("{:>8}", id));
    }
    if let Some(hash) = &record.hash {
        parts.push(hash.to_hex());
    }
    if record.tags.is_some() {
        parts.push(format!("[{}]", record.tag_names(dict).join(" ")));
    }
    if let Some(attributes) = &record.attributes {
        let attrs: Vec<String> = attributes
            .iter()
            .flat_map(|(k, values)| values.keys().map(move |v| format!("{}={}", k, v)))
            .collect();
        parts.push(format!("{{{}}}", attrs.join(", ")));
    }
    parts.join("  ")
}

// ============================================================================
// INSPECT
// ============================================================================

fn load_dictionary(path: Option<&Path>) -> Result<TagDictionary> {
    let Some(path) = path else {
        return Ok(TagDictionary::new());
    };
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let tags: Vec<ApiTag> =
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    Ok(tags.into_iter().map(|t| (t.id, t.name)).collect())
}

fn inspect(path: &Path, format: WireFormat, tags: Option<&Path>, json: bool) -> Result<()> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let dict = load_dictionary(tags)?;
    let result = decode_as(format, &bytes, &dict)
        .with_context(|| format!("decoding {} as {} response", path.display(), format))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    title(&format!("TAGSTORM RESPONSE: {}", path.display()));

    section_top("HEADER");
    row(&format!("  format     {}", format));
    row(&format!("  size       {}", display::format_size(bytes.len())));
    if format == WireFormat::Flat {
        let header = ResponseHeader::read(&bytes)?;
        row(&format!(
            "  flags      {:#06b}  {}",
            header.flags.bits(),
            display::flag_badges(header.flags)
        ));
        row(&format!(
            "  payload    {}",
            display::format_size(bytes.len().saturating_sub(HEADER_LEN))
        ));
    }

    section_mid("RESULT");
    row(&format!(
        "  kind       {}",
        themed(display::GREEN, &[display::BOLD], result.kind())
    ));
    row(&format!("  count      {}", result.len()));

    const PREVIEW: usize = 10;
    if !result.is_empty() {
        section_mid("FIRST ENTRIES");
        let lines: Vec<String> = match &result {
            ResultVariant::IdList(ids) => ids.iter().take(PREVIEW).map(u32::to_string).collect(),
            ResultVariant::HashList(hashes) => {
                hashes.iter().take(PREVIEW).map(|h| h.to_hex()).collect()
            }
            ResultVariant::ImageRecordList(records) => records
                .iter()
                .take(PREVIEW)
                .map(|r| record_line(r, &dict))
                .collect(),
        };
        for line in lines {
            row(&format!("  {}", display::truncate(&line, display::BOX_WIDTH - 4)));
        }
        if result.len() > PREVIEW {
            row(&themed(
                display::GRAY,
                &[display::DIM],
                &format!("  … {} more", result.len() - PREVIEW),
            ));
        }
    }
    section_bot();
    println!("{}", display::status(true, "decoded cleanly"));
    Ok(())
}
