use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use serde_json::to_string_pretty;
use article_sync::config;
use article_sync::source::{self, SourceFormat};

#[derive(Debug, Parser)]
#[command(about = "Parse an article source file and print what would be synced")]
struct Args {
    /// Path to YAML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Source file; overrides `source.path`
    #[arg(long)]
    source: Option<PathBuf>,

    /// Source format (default: inferred from the file extension)
    #[arg(long, value_enum)]
    format: Option<SourceFormat>,

    /// Print only slugs instead of full records
    #[arg(long)]
    slugs_only: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let cfg = config::load(args.config.as_deref())?;
    let path = args.source.unwrap_or_else(|| PathBuf::from(&cfg.source.path));
    let lists = source::read_articles(&path, args.format, &cfg.source.lists).await?;

    if args.slugs_only {
        for article in lists.es.iter().chain(lists.en.iter()) {
            println!("{}", article.key());
        }
    } else {
        let doc = serde_json::json!({
            "es": lists.es,
            "en": lists.en,
        });
        println!("{}", to_string_pretty(&doc)?);
    }
    eprintln!("{} es, {} en", lists.es.len(), lists.en.len());
    Ok(())
}
