//! `modfetch clean --days N` — vacuums terminal downloads older than N days
//! and removes orphaned `.part` staging files.

use chrono::Utc;
use tracing::info;

use modfetch_store::{DownloadStatus, Store};

use crate::cli::CleanArgs;
use crate::config::Settings;
use crate::exit::CliError;

pub fn run(settings: &Settings, args: &CleanArgs) -> Result<(), CliError> {
    let store = Store::open(settings.state_db_path())?;
    let cutoff = Utc::now() - chrono::Duration::days(args.days as i64);

    let mut removed_downloads = 0usize;
    let mut removed_parts = 0usize;

    for download in store.list_downloads()? {
        let terminal = matches!(
            download.status,
            DownloadStatus::Complete | DownloadStatus::Error | DownloadStatus::ChecksumMismatch
        );
        if !terminal || download.updated_at > cutoff {
            continue;
        }

        info!(url = download.url, dest = download.dest, "pruning terminal download older than cutoff");
        if !args.dry_run {
            store.delete_chunks(&download.url, &download.dest)?;
            store.delete_download(&download.url, &download.dest)?;
        }
        removed_downloads += 1;

        let part_path = format!("{}.part", download.dest);
        if std::path::Path::new(&part_path).exists() {
            info!(part_path, "removing orphaned staged file");
            if !args.dry_run {
                let _ = std::fs::remove_file(&part_path);
            }
            removed_parts += 1;
        }
    }

    if !args.dry_run {
        store.repair_orphans()?;
        store.vacuum()?;
    }

    println!(
        "{}{} download record(s), {} orphaned .part file(s)",
        if args.dry_run { "would remove " } else { "removed " },
        removed_downloads,
        removed_parts,
    );

    Ok(())
}
