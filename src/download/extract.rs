use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use zip::ZipArchive;

use crate::ui::Ui;

/// Files that make up a shapefile
pub const SHAPEFILE_PARTS: &[&str] = &["shp", "shx", "dbf", "prj", "cpg"];

/// Extract the files with the given extensions to `dest_dir`.
///
/// Directory prefixes inside the archive are dropped. Returns the extracted
/// paths in archive order.
pub fn extract_zip(
    zip_path: &Path,
    dest_dir: &Path,
    extensions: &[&str],
    ui: &mut impl Ui,
) -> Result<Vec<PathBuf>> {
    let file = File::open(zip_path).context("Failed to open zip file")?;
    let reader = BufReader::new(file);
    let mut archive = ZipArchive::new(reader).context("Failed to read zip archive")?;

    fs::create_dir_all(dest_dir).context("Failed to create destination directory")?;

    let total_files = archive.len();
    let mut extracted = Vec::new();

    for i in 0..total_files {
        let mut file = archive
            .by_index(i)
            .context("Failed to read file from archive")?;

        // Get the file name, stripping any directory prefix
        let name = file.name();
        let file_name = Path::new(name)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(name)
            .to_string();

        let wanted = Path::new(&file_name)
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| extensions.iter().any(|w| w.eq_ignore_ascii_case(ext)));

        if file.is_dir() || !wanted {
            ui.set_progress(i as u64 + 1, total_files as u64, "Extracting");
            continue;
        }

        let dest_path = dest_dir.join(&file_name);
        let mut dest_file = File::create(&dest_path)
            .with_context(|| format!("Failed to create file: {:?}", dest_path))?;

        io::copy(&mut file, &mut dest_file)
            .with_context(|| format!("Failed to extract: {}", file_name))?;

        extracted.push(dest_path);
        ui.set_progress(i as u64 + 1, total_files as u64, "Extracting");
    }

    ui.log(format!("Extracted {} files", extracted.len()));
    Ok(extracted)
}

/// Find the `.shp` file among extracted paths
pub fn find_shapefile(paths: &[PathBuf]) -> Option<&Path> {
    paths
        .iter()
        .find(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("shp"))
        })
        .map(|p| p.as_path())
}
