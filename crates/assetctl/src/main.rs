mod cli;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use asset_index::{config_path_from_env, infer_tags, AssetLibrary, LibraryConfig, Result};
use clap::Parser;

use crate::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            log::error!("{error}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Scan { paths } => {
            let library = AssetLibrary::new(&config)?;
            for path in &paths {
                let report = library.scan_folder_report(path)?;
                println!(
                    "{}: {} assets ({} new, {} updated, {} unchanged, {} errors, {} pruned)",
                    report.root.display(),
                    report.assets_seen,
                    report.created,
                    report.updated,
                    report.unchanged,
                    report.errors,
                    report.pruned,
                );
            }
            println!("{}", serde_json::to_string_pretty(&library.stats())?);
            Ok(())
        }
        Commands::Watch {
            paths,
            stats_interval,
        } => {
            let roots = if paths.is_empty() {
                config.watch_roots.clone()
            } else {
                paths
            };
            watch(&config, &roots, Duration::from_secs(stats_interval.max(1))).await
        }
        Commands::Search {
            query,
            roots,
            filetype,
        } => {
            let library = AssetLibrary::new(&config)?;
            for root in &roots {
                library.scan_folder(root)?;
            }
            let mut hits = library.search_assets(&query);
            if let Some(filetype) = filetype {
                let wanted = format!(".{}", filetype.trim_start_matches('.')).to_lowercase();
                hits.retain(|asset| asset.filetype == wanted);
            }
            println!("{}", serde_json::to_string_pretty(&hits)?);
            Ok(())
        }
        Commands::Tags { paths } => {
            for path in &paths {
                let tags: Vec<String> = infer_tags(path).into_iter().collect();
                println!("{}\t{}", path.display(), tags.join(","));
            }
            Ok(())
        }
    }
}

fn load_config(explicit: Option<&Path>) -> Result<LibraryConfig> {
    let path: Option<PathBuf> = explicit.map(Path::to_path_buf).or_else(config_path_from_env);
    match path {
        Some(path) => {
            log::debug!("loading library config from {}", path.display());
            LibraryConfig::load_or_create(&path)
        }
        None => Ok(LibraryConfig::default()),
    }
}

async fn watch(config: &LibraryConfig, roots: &[PathBuf], stats_interval: Duration) -> Result<()> {
    if roots.is_empty() {
        return Err(asset_index::IndexError::InvalidInput(
            "no roots given and none configured in watch_roots".to_string(),
        ));
    }

    let library = AssetLibrary::new(config)?;
    for root in roots {
        // An unavailable root is kept as an unwatched folder; carry on with the rest.
        if let Err(error) = library.add_watch_folder(root) {
            log::warn!("not watching {}: {}", root.display(), error);
        }
    }
    if library.list_watched_folders().is_empty() {
        return Err(asset_index::IndexError::Watcher(
            "none of the requested roots could be watched".to_string(),
        ));
    }

    let mut ticker = tokio::time::interval(stats_interval);
    ticker.tick().await;
    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal?;
                log::info!("interrupt received, shutting down");
                break;
            }
            _ = ticker.tick() => {
                let stats = library.stats();
                log::info!(
                    "assets={} folders={} watched={} bytes={} watch_errors={}",
                    stats.assets,
                    stats.folders,
                    stats.watched_folders,
                    stats.total_bytes,
                    stats.watch_errors,
                );
            }
        }
    }

    for root in library.list_watched_folders() {
        library.remove_watch_folder(&root)?;
    }
    Ok(())
}
