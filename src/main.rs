use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use article_sync::config::{self, Credentials};
use article_sync::diff::KnownKeys;
use article_sync::pipeline::{self, SyncOptions};
use article_sync::sink::{ArticleSink, DryRunSink, SqlFileSink, SqliteSink};
use article_sync::source::{self, SourceFormat};
use article_sync::supabase::SupabaseClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SinkKind {
    /// Supabase table API
    Supabase,
    /// Generated upsert script
    SqlFile,
    /// Local SQLite mirror
    Sqlite,
}

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Upsert blog articles from a source file into the articles table"
)]
struct Args {
    /// Path to YAML config file (built-in defaults when omitted)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Source file; overrides `source.path`
    #[arg(long)]
    source: Option<PathBuf>,

    /// Source format (default: inferred from the file extension)
    #[arg(long, value_enum)]
    format: Option<SourceFormat>,

    /// Where rows are written
    #[arg(long, value_enum, default_value = "supabase")]
    sink: SinkKind,

    /// Script path for `--sink sql-file`; overrides `destination.sql_output`
    #[arg(long)]
    output: Option<PathBuf>,

    /// Database URL for `--sink sqlite`; overrides `destination.sqlite_url`
    #[arg(long)]
    database_url: Option<String>,

    /// Print rows as JSON instead of writing them
    #[arg(long)]
    dry_run: bool,

    /// Upsert every article, even ones that already exist
    #[arg(long)]
    force: bool,

    /// Delay between remote writes in milliseconds; overrides `sync.delay_ms`
    #[arg(long)]
    delay_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(args.config.as_deref())?;

    // Credentials are checked before anything is read or written.
    let supabase = match (args.sink, args.dry_run) {
        (SinkKind::Supabase, false) => {
            let creds = Credentials::from_env()?;
            Some(
                SupabaseClient::new(&creds, &cfg.destination.table)?
                    .with_batch_size(cfg.sync.batch_size),
            )
        }
        _ => None,
    };

    let source_path = args
        .source
        .clone()
        .unwrap_or_else(|| PathBuf::from(&cfg.source.path));
    let lists = source::read_articles(&source_path, args.format, &cfg.source.lists).await?;

    let sink: Box<dyn ArticleSink> = if args.dry_run {
        Box::new(DryRunSink)
    } else if let Some(client) = supabase {
        Box::new(client)
    } else if args.sink == SinkKind::SqlFile {
        let output = args
            .output
            .clone()
            .unwrap_or_else(|| PathBuf::from(&cfg.destination.sql_output));
        Box::new(SqlFileSink::create(&output, &cfg.destination.table).await?)
    } else {
        let url = args
            .database_url
            .clone()
            .unwrap_or_else(|| cfg.destination.resolved_sqlite_url());
        Box::new(SqliteSink::open(&url, cfg.sync.batch_size).await?)
    };

    let opts = SyncOptions {
        delay: Some(Duration::from_millis(
            args.delay_ms.unwrap_or(cfg.sync.delay_ms),
        )),
        check_existing: true,
        force: args.force,
    };
    let known = KnownKeys::from_slugs(cfg.sync.known_slugs.iter().cloned());

    info!(source = %source_path.display(), sink = ?args.sink, dry_run = args.dry_run, "starting article sync");
    let report = pipeline::run(lists.into_articles(), known, sink.as_ref(), &opts).await?;

    println!("Sync complete: {}", report);
    for (key, message) in &report.failures {
        println!("  failed {}: {}", key, message);
    }
    Ok(())
}
