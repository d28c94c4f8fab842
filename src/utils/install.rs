//! npm package installation into the node root.
//!
//! One [`NpmInstall`] value drives one run of
//! download -> pre-clean -> extract -> rename -> copy launchers -> post-clean.
//! A failed rename or copy is not rolled back; the next run's pre-clean
//! clears whatever was left behind.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::error::{ArchiveErrorKind, Error};
use crate::utils::download;
use crate::utils::extract;
use crate::utils::mirror::MirrorTarget;
use crate::utils::registry::Transport;

/// Launchers copied from `node_modules/npm/bin` into the root.
pub const LAUNCHERS: [&str; 2] = ["npm", "npm.cmd"];

/// Where npm lives under a node root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallLayout {
    pub root: PathBuf,
    pub modules: PathBuf,
    pub npm_path: PathBuf,
    pub npm_bin: PathBuf,
}

impl InstallLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let modules = root.join("node_modules");
        let npm_path = modules.join("npm");
        let npm_bin = npm_path.join("bin");
        Self {
            root,
            modules,
            npm_path,
            npm_bin,
        }
    }

    pub fn launcher_paths(&self) -> impl Iterator<Item = PathBuf> + '_ {
        LAUNCHERS.iter().map(|name| self.root.join(name))
    }

    pub fn create_modules(&self) -> Result<(), Error> {
        if !self.modules.is_dir() {
            fs::create_dir_all(&self.modules).map_err(|e| Error::fs("create directory", &self.modules, e))?;
            debug!(path = %self.modules.display(), "created node_modules");
        }
        Ok(())
    }

    /// Removes `node_modules/npm` and both root launchers. Paths that do not
    /// exist are skipped.
    pub fn clean_all(&self) -> Result<(), Error> {
        remove_path(&self.npm_path)?;
        for launcher in self.launcher_paths() {
            remove_path(&launcher)?;
        }
        Ok(())
    }
}

fn remove_path(path: &Path) -> Result<(), Error> {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(Error::fs("inspect", path, e)),
    };
    let removed = if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    match removed {
        Ok(()) => {
            debug!(path = %path.display(), "removed");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::fs("remove", path, e)),
    }
}

/// Progress of one install run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Idle,
    Downloaded,
    PreCleaned,
    Extracted,
    RootIdentified,
    Renamed,
    Copied,
    PostCleaned,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Idle => "download",
            Stage::Downloaded => "pre-install clean",
            Stage::PreCleaned => "extract",
            Stage::Extracted => "archive root lookup",
            Stage::RootIdentified => "rename",
            Stage::Renamed => "launcher copy",
            Stage::Copied => "archive removal",
            Stage::PostCleaned | Stage::Done => "finish",
        };
        f.write_str(s)
    }
}

/// The run stopped; `stage` is the last state reached, the error belongs to
/// the step that follows it.
#[derive(Debug, Error)]
#[error("npm install failed during {stage}")]
pub struct InstallFailure {
    pub stage: Stage,
    #[source]
    pub source: Error,
}

pub struct NpmInstall {
    layout: InstallLayout,
    target: MirrorTarget,
    stage: Stage,
}

impl NpmInstall {
    pub fn new(layout: InstallLayout, target: MirrorTarget) -> Self {
        Self {
            layout,
            target,
            stage: Stage::Idle,
        }
    }

    /// `<root>/<archive name>` while the install is running.
    pub fn archive_path(&self) -> PathBuf {
        self.layout.root.join(&self.target.file_name)
    }

    fn fail(&self, source: Error) -> InstallFailure {
        InstallFailure {
            stage: self.stage,
            source,
        }
    }

    fn advance(&mut self, next: Stage) {
        debug!(from = ?self.stage, to = ?next, "npm install stage");
        self.stage = next;
    }

    pub fn download<T: Transport + ?Sized>(&mut self, transport: &T) -> Result<(), InstallFailure> {
        let archive = self.archive_path();
        download::download_file(transport, &self.target.url, &archive).map_err(|e| self.fail(e))?;
        self.advance(Stage::Downloaded);
        Ok(())
    }

    pub fn pre_clean(&mut self) -> Result<(), InstallFailure> {
        self.layout.create_modules().map_err(|e| self.fail(e))?;
        self.layout.clean_all().map_err(|e| self.fail(e))?;
        self.advance(Stage::PreCleaned);
        Ok(())
    }

    pub fn extract(&mut self) -> Result<(), InstallFailure> {
        let archive = self.archive_path();
        let root = extract::extract_archive(self.target.kind, &archive, &self.layout.modules)
            .map_err(|e| self.fail(e))?;
        self.advance(Stage::Extracted);

        let root = root.ok_or_else(|| {
            self.fail(Error::archive(
                ArchiveErrorKind::EntryOpenFailed,
                &archive,
                "archive has no entries",
            ))
        })?;
        debug!(root = %root, "archive root");
        self.target.root = Some(root);
        self.advance(Stage::RootIdentified);
        Ok(())
    }

    pub fn rename(&mut self) -> Result<(), InstallFailure> {
        let Some(root) = self.target.root.as_deref() else {
            return Err(self.fail(Error::archive(
                ArchiveErrorKind::EntryOpenFailed,
                self.archive_path(),
                "archive root is unknown",
            )));
        };
        let from = self.layout.modules.join(root);
        fs::rename(&from, &self.layout.npm_path).map_err(|e| self.fail(Error::fs("rename", &from, e)))?;
        self.advance(Stage::Renamed);
        Ok(())
    }

    pub fn copy_launchers(&mut self) -> Result<(), InstallFailure> {
        for name in LAUNCHERS {
            let from = self.layout.npm_bin.join(name);
            let to = self.layout.root.join(name);
            fs::copy(&from, &to).map_err(|e| self.fail(Error::fs("copy", &from, e)))?;
        }
        self.advance(Stage::Copied);
        Ok(())
    }

    pub fn post_clean(&mut self) -> Result<(), InstallFailure> {
        remove_path(&self.archive_path()).map_err(|e| self.fail(e))?;
        self.advance(Stage::PostCleaned);
        Ok(())
    }

    /// Runs every step in order, stopping at the first failure.
    pub fn run<T: Transport + ?Sized>(mut self, transport: &T) -> Result<MirrorTarget, InstallFailure> {
        self.download(transport)?;
        self.pre_clean()?;
        self.extract()?;
        self.rename()?;
        self.copy_launchers()?;
        self.post_clean()?;
        self.advance(Stage::Done);
        info!(path = %self.layout.npm_path.display(), "npm installed");
        Ok(self.target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::extract::tests::{build_tgz, build_zip};
    use crate::utils::mirror::{ArchiveKind, Registry};
    use crate::utils::registry::tests::FakeTransport;
    use std::collections::BTreeMap;

    const ZIP_ENTRIES: &[(&str, &str)] = &[
        ("npm-3.8.5/", ""),
        ("npm-3.8.5/bin/", ""),
        ("npm-3.8.5/bin/npm", "#!/bin/sh\nnode npm-cli.js"),
        ("npm-3.8.5/bin/npm.cmd", "@node npm-cli.js %*"),
        ("npm-3.8.5/package.json", "{\"version\":\"3.8.5\"}"),
        ("npm-3.8.5/lib/npm.js", "module.exports = {}"),
    ];

    fn zip_transport(dir: &Path, target: &MirrorTarget, entries: &[(&str, &str)]) -> FakeTransport {
        let fixture = dir.join("fixture.zip");
        build_zip(&fixture, entries);
        FakeTransport::default().with(&target.url, fs::read(&fixture).unwrap())
    }

    /// Relative path -> contents for every file under `dir`.
    fn snapshot(dir: &Path) -> BTreeMap<String, Vec<u8>> {
        fn walk(base: &Path, dir: &Path, out: &mut BTreeMap<String, Vec<u8>>) {
            for entry in fs::read_dir(dir).unwrap() {
                let path = entry.unwrap().path();
                if path.is_dir() {
                    walk(base, &path, out);
                } else {
                    let rel = path.strip_prefix(base).unwrap().to_string_lossy().replace('\\', "/");
                    out.insert(rel, fs::read(&path).unwrap());
                }
            }
        }
        let mut out = BTreeMap::new();
        walk(dir, dir, &mut out);
        out
    }

    #[test]
    fn zip_install_produces_layout() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("nodejs");
        fs::create_dir(&root).unwrap();
        let target = MirrorTarget::npm(Registry::Taobao, "3.8.5");
        let transport = zip_transport(tmp.path(), &target, ZIP_ENTRIES);

        let done = NpmInstall::new(InstallLayout::new(&root), target).run(&transport).unwrap();
        assert_eq!(done.root.as_deref(), Some("npm-3.8.5"));

        let layout = InstallLayout::new(&root);
        let installed = snapshot(&layout.npm_path);
        let expected: BTreeMap<String, Vec<u8>> = ZIP_ENTRIES
            .iter()
            .filter(|(name, _)| !name.ends_with('/'))
            .map(|(name, body)| (name.trim_start_matches("npm-3.8.5/").to_string(), body.as_bytes().to_vec()))
            .collect();
        assert_eq!(installed, expected);

        assert_eq!(fs::read_to_string(root.join("npm.cmd")).unwrap(), "@node npm-cli.js %*");
        assert!(root.join("npm").is_file());
        assert!(!root.join("v3.8.5.zip").exists());
        assert!(!layout.modules.join("npm-3.8.5").exists());
    }

    #[test]
    fn tgz_install_uses_package_root() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("nodejs");
        fs::create_dir(&root).unwrap();
        let target = MirrorTarget::npm(Registry::Default, "6.4.1");
        assert_eq!(target.kind, ArchiveKind::Tgz);

        let fixture = tmp.path().join("fixture.tgz");
        build_tgz(
            &fixture,
            &[
                ("package/package.json", "{\"version\":\"6.4.1\"}"),
                ("package/bin/npm", "#!/bin/sh"),
                ("package/bin/npm.cmd", "@echo off"),
            ],
        );
        let transport = FakeTransport::default().with(&target.url, fs::read(&fixture).unwrap());

        let done = NpmInstall::new(InstallLayout::new(&root), target).run(&transport).unwrap();
        assert_eq!(done.root.as_deref(), Some("package"));
        assert!(root.join("node_modules/npm/package.json").is_file());
        assert_eq!(fs::read_to_string(root.join("npm.cmd")).unwrap(), "@echo off");
        assert!(!root.join("npm-6.4.1.tgz").exists());
    }

    #[test]
    fn reinstall_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("nodejs");
        fs::create_dir(&root).unwrap();
        let target = MirrorTarget::npm(Registry::Huawei, "3.8.5");
        let transport = zip_transport(tmp.path(), &target, ZIP_ENTRIES);

        NpmInstall::new(InstallLayout::new(&root), target.clone()).run(&transport).unwrap();
        let first = snapshot(&root);
        NpmInstall::new(InstallLayout::new(&root), target).run(&transport).unwrap();
        assert_eq!(snapshot(&root), first);
    }

    #[test]
    fn pre_clean_replaces_previous_npm() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("nodejs");
        let layout = InstallLayout::new(&root);
        fs::create_dir_all(layout.npm_bin.join("old")).unwrap();
        fs::write(layout.npm_path.join("stale.js"), "old").unwrap();
        fs::write(root.join("npm"), "old launcher").unwrap();

        let target = MirrorTarget::npm(Registry::Taobao, "3.8.5");
        let transport = zip_transport(tmp.path(), &target, ZIP_ENTRIES);
        NpmInstall::new(layout.clone(), target).run(&transport).unwrap();

        assert!(!layout.npm_path.join("stale.js").exists());
        assert_ne!(fs::read_to_string(root.join("npm")).unwrap(), "old launcher");
    }

    #[test]
    fn download_failure_touches_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("nodejs");
        let layout = InstallLayout::new(&root);
        fs::create_dir_all(&layout.npm_bin).unwrap();
        fs::write(root.join("npm.cmd"), "working").unwrap();

        let target = MirrorTarget::npm(Registry::Taobao, "9.9.9");
        let failure = NpmInstall::new(layout, target).run(&FakeTransport::default()).unwrap_err();
        assert_eq!(failure.stage, Stage::Idle);
        assert!(matches!(failure.source, Error::HttpStatus { status: 404, .. }));
        assert_eq!(fs::read_to_string(root.join("npm.cmd")).unwrap(), "working");
    }

    #[test]
    fn missing_launchers_leave_extraction_in_place() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("nodejs");
        fs::create_dir(&root).unwrap();
        let target = MirrorTarget::npm(Registry::Taobao, "3.8.5");
        let transport = zip_transport(tmp.path(), &target, &[("npm-3.8.5/package.json", "{}")]);

        let layout = InstallLayout::new(&root);
        let failure = NpmInstall::new(layout.clone(), target).run(&transport).unwrap_err();
        assert_eq!(failure.stage, Stage::Renamed);
        assert!(matches!(failure.source, Error::Filesystem { op: "copy", .. }));
        // no rollback: renamed package and the archive stay on disk
        assert!(layout.npm_path.join("package.json").is_file());
        assert!(root.join("v3.8.5.zip").is_file());
    }

    #[test]
    fn misleading_first_entry_is_renamed() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("nodejs");
        fs::create_dir(&root).unwrap();
        let target = MirrorTarget::npm(Registry::Taobao, "3.8.5");
        let transport = zip_transport(
            tmp.path(),
            &target,
            &[("LICENSE", "MIT"), ("npm-3.8.5/bin/npm", "x"), ("npm-3.8.5/bin/npm.cmd", "x")],
        );

        let layout = InstallLayout::new(&root);
        let failure = NpmInstall::new(layout.clone(), target).run(&transport).unwrap_err();
        assert_eq!(failure.stage, Stage::Renamed);
        assert!(matches!(failure.source, Error::Filesystem { op: "copy", .. }));
        assert_eq!(fs::read_to_string(&layout.npm_path).unwrap(), "MIT");
        assert!(layout.modules.join("npm-3.8.5/bin/npm").is_file());
    }

    #[test]
    fn missing_root_folder_fails_rename() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("nodejs");
        let layout = InstallLayout::new(&root);
        let mut target = MirrorTarget::npm(Registry::Taobao, "3.8.5");
        target.root = Some("npm-3.8.5".to_string());

        let mut install = NpmInstall::new(layout, target);
        install.pre_clean().unwrap();
        let failure = install.rename().unwrap_err();
        assert_eq!(failure.stage, Stage::PreCleaned);
        assert!(matches!(failure.source, Error::Filesystem { op: "rename", .. }));
    }

    #[test]
    fn corrupt_archive_reports_open_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("nodejs");
        fs::create_dir(&root).unwrap();
        let target = MirrorTarget::npm(Registry::Taobao, "3.8.5");
        let transport = FakeTransport::default().with(&target.url, b"<html>503</html>".to_vec());

        let failure = NpmInstall::new(InstallLayout::new(&root), target).run(&transport).unwrap_err();
        assert_eq!(failure.stage, Stage::PreCleaned);
        assert_eq!(failure.source.archive_kind(), Some(ArchiveErrorKind::OpenFailed));
    }

    #[test]
    fn escaping_entry_stops_before_rename() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("nodejs");
        fs::create_dir(&root).unwrap();
        let target = MirrorTarget::npm(Registry::Taobao, "3.8.5");
        let transport = zip_transport(tmp.path(), &target, &[("../evil", "x"), ("npm-3.8.5/bin/npm", "x")]);

        let layout = InstallLayout::new(&root);
        let failure = NpmInstall::new(layout.clone(), target).run(&transport).unwrap_err();
        assert_eq!(failure.stage, Stage::PreCleaned);
        assert_eq!(failure.source.archive_kind(), Some(ArchiveErrorKind::EntryOpenFailed));
        assert!(!root.join("evil").exists());
        assert!(!layout.npm_path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn locked_npm_folder_stops_the_run() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("nodejs");
        let layout = InstallLayout::new(&root);
        fs::create_dir_all(&layout.npm_bin).unwrap();
        fs::write(layout.npm_bin.join("npm"), "old").unwrap();

        let target = MirrorTarget::npm(Registry::Taobao, "3.8.5");
        let transport = zip_transport(tmp.path(), &target, ZIP_ENTRIES);

        // node_modules read-only: npm inside it cannot be unlinked
        fs::set_permissions(&layout.modules, fs::Permissions::from_mode(0o555)).unwrap();
        let privileged = fs::write(layout.modules.join("canary"), "").is_ok();
        if privileged {
            // permission bits do not bind this user
            fs::set_permissions(&layout.modules, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let result = NpmInstall::new(layout.clone(), target).run(&transport);
        fs::set_permissions(&layout.modules, fs::Permissions::from_mode(0o755)).unwrap();

        let failure = result.unwrap_err();
        assert_eq!(failure.stage, Stage::Downloaded);
        assert!(matches!(
            failure.source,
            Error::Filesystem { op: "remove" | "inspect", .. }
        ));
        assert!(!layout.modules.join("npm-3.8.5").exists());
        assert!(layout.npm_path.is_dir());
        // the archive was downloaded but never extracted
        assert!(root.join("v3.8.5.zip").is_file());
    }

    #[test]
    fn clean_all_tolerates_missing_paths() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = InstallLayout::new(tmp.path());
        layout.clean_all().unwrap();

        fs::create_dir_all(&layout.npm_bin).unwrap();
        fs::write(tmp.path().join("npm"), "x").unwrap();
        layout.clean_all().unwrap();
        assert!(!layout.npm_path.exists());
        assert!(!tmp.path().join("npm").exists());
        assert!(layout.modules.exists());
    }
}
