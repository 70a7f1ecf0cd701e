use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

fn has_extension(path: &Path) -> bool {
    path.extension().is_some_and(|e| !e.is_empty())
}

/// Expand the command-line paths into the browsing order.
///
/// Files are taken as given. Directories are scanned one level deep, sorted
/// by name, skipping sub-directories and entries without an extension.
/// Paths that can't be read are logged and dropped.
pub fn collect_images(paths: &[PathBuf]) -> Vec<PathBuf> {
    log::info!("Scanning {} paths...", paths.len());
    let start_time = Instant::now();
    let mut files = Vec::new();

    for path in paths {
        match fs::metadata(path) {
            Err(e) => log::error!("Can't access {}: {}", path.display(), e),
            Ok(meta) if meta.is_dir() => scan_dir(path, &mut files),
            Ok(_) => files.push(path.clone()),
        }
    }

    log::info!(
        "Scan complete in {:.2}s. Found {} images.",
        start_time.elapsed().as_secs_f64(),
        files.len()
    );
    files
}

fn scan_dir(dir: &Path, dest: &mut Vec<PathBuf>) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            log::error!("Can't read directory {}: {}", dir.display(), e);
            return;
        }
    };

    let mut found = Vec::new();
    for entry in entries.filter_map(|e| e.ok()) {
        let p = entry.path();
        if p.is_dir() {
            log::debug!("Skipping directory {}", p.display());
            continue;
        }
        if has_extension(&p) {
            found.push(p);
        }
    }

    found.sort();
    log::debug!("Scanning {:?}... ({} entries)", dir, found.len());
    dest.extend(found);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("vimg-files-{}-{}", tag, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn directory_scan_is_sorted_flat_and_needs_extension() {
        let dir = scratch_dir("scan");
        for name in ["b.png", "a.jpg", "README", "c.txt"] {
            fs::write(dir.join(name), b"").unwrap();
        }
        fs::create_dir(dir.join("nested.d")).unwrap();
        fs::write(dir.join("nested.d").join("deep.png"), b"").unwrap();

        let files = collect_images(&[dir.clone()]);
        assert_eq!(
            files,
            vec![dir.join("a.jpg"), dir.join("b.png"), dir.join("c.txt")]
        );
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn explicit_files_keep_argument_order() {
        let dir = scratch_dir("explicit");
        let z = dir.join("z.png");
        let noext = dir.join("noext");
        fs::write(&z, b"").unwrap();
        fs::write(&noext, b"").unwrap();

        // explicitly named files are taken even without an extension
        let files = collect_images(&[z.clone(), noext.clone()]);
        assert_eq!(files, vec![z, noext]);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn inaccessible_paths_are_dropped() {
        let dir = scratch_dir("missing");
        let real = dir.join("real.png");
        fs::write(&real, b"").unwrap();

        let files = collect_images(&[dir.join("ghost.png"), real.clone()]);
        assert_eq!(files, vec![real]);
        let _ = fs::remove_dir_all(&dir);
    }
}
