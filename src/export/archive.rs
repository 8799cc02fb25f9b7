use crate::error::{ExportError, Result};
use std::path::{Path, PathBuf};
use tokio::task::spawn_blocking;
use tracing::{debug, info, warn};

fn extraction_error(archive_path: &Path, reason: String) -> ExportError {
    ExportError::Extraction {
        archive: archive_path.to_path_buf(),
        reason,
    }
}

/// Extract a single ZIP entry to disk, creating directories as needed
fn extract_zip_entry(
    mut file: zip::read::ZipFile,
    dest_path: &Path,
    archive_path: &Path,
) -> Result<Option<PathBuf>> {
    let file_path = match file.enclosed_name() {
        Some(path) => dest_path.join(path),
        None => {
            warn!(entry = file.name(), "skipping entry with unsafe path");
            return Ok(None);
        }
    };

    if file.is_dir() {
        std::fs::create_dir_all(&file_path).map_err(|e| {
            extraction_error(archive_path, format!("failed to create directory: {}", e))
        })?;
        return Ok(None);
    }

    if let Some(parent) = file_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            extraction_error(
                archive_path,
                format!("failed to create parent directories: {}", e),
            )
        })?;
    }

    let mut outfile = std::fs::File::create(&file_path).map_err(|e| {
        extraction_error(archive_path, format!("failed to create output file: {}", e))
    })?;

    std::io::copy(&mut file, &mut outfile).map_err(|e| {
        extraction_error(
            archive_path,
            format!("failed to extract {}: {}", file_path.display(), e),
        )
    })?;

    Ok(Some(file_path))
}

/// Unpack every entry of a ZIP archive into `dest_path`
pub(crate) fn extract_zip(archive_path: &Path, dest_path: &Path) -> Result<Vec<PathBuf>> {
    debug!(?archive_path, ?dest_path, "extracting export archive");

    let file = std::fs::File::open(archive_path).map_err(|e| {
        extraction_error(archive_path, format!("failed to open ZIP archive: {}", e))
    })?;

    let mut archive = zip::ZipArchive::new(file).map_err(|e| {
        extraction_error(archive_path, format!("failed to read ZIP archive: {}", e))
    })?;

    let mut extracted_files = Vec::new();

    for i in 0..archive.len() {
        let entry = archive.by_index(i).map_err(|e| {
            extraction_error(archive_path, format!("failed to read ZIP entry: {}", e))
        })?;

        if let Some(file_path) = extract_zip_entry(entry, dest_path, archive_path)? {
            extracted_files.push(file_path);
        }
    }

    info!(
        ?archive_path,
        extracted_count = extracted_files.len(),
        "ZIP extraction successful"
    );

    Ok(extracted_files)
}

/// Extract the archive off the async executor, then delete it
///
/// Removing the archive right away keeps peak disk usage at roughly the
/// archive size plus the extracted size.
pub(crate) async fn extract_and_remove(
    archive_path: &Path,
    dest_path: &Path,
) -> Result<Vec<PathBuf>> {
    let archive_owned = archive_path.to_path_buf();
    let dest_owned = dest_path.to_path_buf();

    let files = spawn_blocking(move || extract_zip(&archive_owned, &dest_owned))
        .await
        .map_err(|e| extraction_error(archive_path, format!("extraction task panicked: {}", e)))??;

    tokio::fs::remove_file(archive_path).await.map_err(|e| {
        extraction_error(archive_path, format!("failed to remove archive: {}", e))
    })?;
    debug!(?archive_path, "removed export archive after extraction");

    Ok(files)
}
