use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use article_sync::config::{self, Credentials};
use article_sync::supabase::SupabaseClient;

#[derive(Parser, Debug)]
#[command(about = "List the (language, slug) keys present in the Supabase articles table")]
struct Args {
    /// Path to YAML config
    #[arg(long)]
    config: Option<PathBuf>,

    /// Table to inspect; overrides `destination.table`
    #[arg(long)]
    table: Option<String>,
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
    let creds = Credentials::from_env()?;
    let table = args.table.unwrap_or(cfg.destination.table);
    config::validate_table(&table)?;
    let client = SupabaseClient::new(&creds, &table)?;

    let keys = client.list_keys().await?;
    println!("Table: {}", table);
    println!("Articles: {}", keys.len());
    for key in keys {
        println!("  {}", key);
    }
    Ok(())
}
