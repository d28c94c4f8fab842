//! Inspection of installed executables.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::process::Command;
use tracing::debug;

use crate::error::{Error, Result};
use crate::utils::version::{Arch, ConcreteVersion};

/// `PE\0\0` followed by the low byte of the i386 machine type (0x014c).
const PE32_SIGNATURE: [u8; 5] = [0x50, 0x45, 0x00, 0x00, 0x4c];

/// Upper bound on single-byte reads before giving up.
const MAX_READS: usize = 500;

/// Guesses the architecture of a Windows executable.
///
/// This is a heuristic, not a PE parser: it looks for the 32-bit PE marker
/// within the first [`MAX_READS`] bytes and answers `x64` when it is absent,
/// including for files that are not executables at all.
pub fn architecture(path: &Path) -> Result<Arch> {
    let file = File::open(path).map_err(|e| Error::fs("open", path, e))?;

    let mut window = [0u8; PE32_SIGNATURE.len()];
    let mut filled = 0usize;

    for byte in BufReader::new(file).bytes().take(MAX_READS) {
        let byte = byte.map_err(|e| Error::fs("read", path, e))?;
        if filled < window.len() {
            window[filled] = byte;
            filled += 1;
        } else {
            window.rotate_left(1);
            window[PE32_SIGNATURE.len() - 1] = byte;
        }

        if filled == window.len() && window == PE32_SIGNATURE {
            debug!(path = %path.display(), "found 32-bit PE marker");
            return Ok(Arch::X86);
        }
    }

    Ok(Arch::X64)
}

/// Executable file name of node for this platform.
pub fn node_executable() -> &'static str {
    if cfg!(target_os = "windows") {
        "node.exe"
    } else {
        "node"
    }
}

fn npm_executable() -> &'static str {
    if cfg!(target_os = "windows") {
        "npm.cmd"
    } else {
        "npm"
    }
}

/// Version reported by `<root>/node --version`.
pub fn global_node_version(root: &Path) -> Result<ConcreteVersion> {
    let node = root.join(node_executable());
    let output = Command::new(&node)
        .arg("--version")
        .output()
        .map_err(|_| Error::GlobalNodeMissing(root.to_path_buf()))?;
    if !output.status.success() {
        return Err(Error::GlobalNodeMissing(root.to_path_buf()));
    }

    let reported = String::from_utf8_lossy(&output.stdout);
    ConcreteVersion::parse(reported.trim())
}

/// Version of the npm launcher in `root`, `None` when there is none.
pub fn local_npm_version(root: &Path) -> Option<String> {
    let output = Command::new(root.join(npm_executable())).arg("-v").output().ok()?;
    if !output.status.success() {
        return None;
    }
    Some(String::from_utf8_lossy(&output.stdout).trim().to_string()).filter(|v| !v.is_empty())
}
