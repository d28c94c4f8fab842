use indicatif::{ProgressBar, ProgressStyle};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::utils::registry::Transport;

/// Streams `url` into `dest_path`. A partially written file is removed
/// when the transfer fails.
pub fn download_file<T: Transport + ?Sized>(transport: &T, url: &str, dest_path: &Path) -> Result<u64> {
    println!("Downloading from {}", url);

    let fetched = transport.get(url)?.ok(url)?;

    let pb = match fetched.len {
        Some(total) => {
            let pb = ProgressBar::new(total);
            if let Ok(style) = ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
            {
                pb.set_style(style.progress_chars("#>-"));
            }
            pb
        }
        None => ProgressBar::new_spinner(),
    };

    if let Some(parent) = dest_path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::fs("create directory", parent, e))?;
    }
    let mut file = File::create(dest_path).map_err(|e| Error::fs("create", dest_path, e))?;

    let mut body = pb.wrap_read(fetched.body);
    let copied = io::copy(&mut body, &mut file).and_then(|n| file.flush().map(|_| n));

    match copied {
        Ok(bytes) => {
            pb.finish_with_message("Download complete");
            debug!(bytes, path = %dest_path.display(), "download finished");
            Ok(bytes)
        }
        Err(source) => {
            pb.abandon();
            drop(file);
            if let Err(e) = fs::remove_file(dest_path) {
                warn!(path = %dest_path.display(), error = %e, "could not remove partial download");
            }
            Err(Error::fs("download into", dest_path, source))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::registry::tests::FakeTransport;

    #[test]
    fn writes_body_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("nested").join("node.exe");
        let transport = FakeTransport::default().with("https://x/node.exe", b"MZ binary".to_vec());

        let bytes = download_file(&transport, "https://x/node.exe", &dest).unwrap();
        assert_eq!(bytes, 9);
        assert_eq!(fs::read(&dest).unwrap(), b"MZ binary");
    }

    #[test]
    fn http_failure_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("node.exe");
        let err = download_file(&FakeTransport::default(), "https://x/missing", &dest).unwrap_err();
        assert!(matches!(err, Error::HttpStatus { status: 404, .. }));
        assert!(!dest.exists());
    }
}
