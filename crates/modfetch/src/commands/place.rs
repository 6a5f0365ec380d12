//! `modfetch place --path <file>` — places an already-finalized artifact
//! into its application target directories.

use modfetch_classify::classify;

use crate::cli::PlaceArgs;
use crate::config::Settings;
use crate::exit::{self, CliError};
use crate::targets;

pub fn run(settings: &Settings, args: &PlaceArgs) -> Result<(), CliError> {
    if !args.path.is_file() {
        return Err(CliError::bad_input(format!("{} is not a file", args.path.display())));
    }

    let kind = classify(&args.path);
    let basename = args
        .path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let target_paths = targets::target_paths(
        &settings.general.app_dirs,
        &settings.general.download_root,
        kind,
        &basename,
    );

    if args.dry_run {
        for target in &target_paths {
            println!("would place ({:?} mode): {} -> {}", args.mode, args.path.display(), target.display());
        }
        return Ok(());
    }

    let placements = modfetch_fs::place(&args.path, &target_paths, args.mode.into())
        .map_err(|e| CliError::new(exit::FILESYSTEM, e.to_string()))?;

    for placement in placements {
        let verb = if placement.created { "created" } else { "already present" };
        println!("{} ({verb}): {}", placement.target.display(), args.path.display());
    }

    Ok(())
}
