use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use hookmirror::config;

#[derive(Parser, Debug)]
#[command(about = "Print the trigger counter and every registered repository")]
struct Args {
    /// Path to YAML config
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Emit one JSON object per repository instead of a table
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    let registry = hookmirror::open_registry(&cfg).await?;

    let count = registry.read_counter().await?;
    let repos = registry.list_all().await?;

    if args.json {
        println!("{}", serde_json::json!({ "trigger": registry.trigger_key(), "count": count }));
        for repo in &repos {
            println!("{}", serde_json::to_string(repo)?);
        }
        return Ok(());
    }

    println!("Trigger {} = {}", registry.trigger_key(), count);
    println!("Repositories ({}):", repos.len());
    for repo in repos {
        println!(
            "  {} @ {} by {}",
            repo.repo, repo.last_commit_id, repo.last_commit_user
        );
    }
    Ok(())
}
