//! End-to-end resolution tests over real zip bundles.

use std::fs::{self, File};
use std::io::{self, BufRead, Write};
use std::os::fd::AsRawFd;
use std::path::PathBuf;

use zipext::{expose_file, resolve_extension, LoaderContext, ResolveError};

/// Write a zip bundle with the given entries into a fresh temp directory.
///
/// Returns the temp dir guard, the loader context pointing at the bundle,
/// and the full archive path.
fn make_bundle(entries: &[(&str, &[u8])]) -> (tempfile::TempDir, LoaderContext, PathBuf) {
    let temp = tempfile::tempdir().unwrap();
    let archive_path = temp.path().join("bundle.zip");

    let file = File::create(&archive_path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);

    for (name, bytes) in entries {
        zip.start_file(*name, options).unwrap();
        zip.write_all(bytes).unwrap();
    }
    zip.finish().unwrap();

    let ctx = LoaderContext::archive(temp.path(), "bundle.zip");
    (temp, ctx, archive_path)
}

/// Find the on-disk path of a shared library already mapped into this
/// process, so load tests can use a real native object without shipping
/// one.
fn mapped_library(names: &[&str]) -> Option<PathBuf> {
    let maps = File::open("/proc/self/maps").ok()?;
    for line in io::BufReader::new(maps).lines() {
        let line = line.ok()?;
        if let Some(idx) = line.find('/') {
            let path = &line[idx..];
            if names.iter().any(|n| path.ends_with(n)) {
                return Some(PathBuf::from(path));
            }
        }
    }
    None
}

#[test]
fn test_expose_file_from_archive_matches_entry_bytes() {
    let payload: Vec<u8> = (0..=255u8).cycle().take(4096).collect();
    let (_temp, ctx, archive_path) = make_bundle(&[("data/table.bin", payload.as_slice())]);

    let reference = archive_path.join("data/mod.src");
    let exposed = expose_file(&ctx, "table", &reference, "table.bin", true).unwrap();

    assert!(exposed.is_extracted());
    let read_back = fs::read(exposed.path()).unwrap();
    assert_eq!(read_back, payload);
}

#[test]
fn test_expose_file_at_archive_root() {
    let (_temp, ctx, archive_path) = make_bundle(&[("plain.txt", b"root level")]);

    // Reference file directly at the archive root: the entry must be looked
    // up as "plain.txt", never "./plain.txt".
    let reference = archive_path.join("mod.src");
    let exposed = expose_file(&ctx, "plain", &reference, "plain.txt", true).unwrap();

    assert_eq!(fs::read(exposed.path()).unwrap(), b"root level");
}

#[test]
fn test_expose_file_disk_mode_returns_direct_path() {
    let ctx = LoaderContext::filesystem();
    let reference = PathBuf::from("/opt/app/pkg/mod.src");

    let exposed = expose_file(&ctx, "asset", &reference, "asset.bin", true).unwrap();

    assert!(!exposed.is_extracted());
    assert!(exposed.backing_file().is_none());
    assert_eq!(exposed.path(), PathBuf::from("/opt/app/pkg/asset.bin"));
}

#[test]
fn test_expose_file_missing_entry() {
    let (_temp, ctx, archive_path) = make_bundle(&[("present.txt", b"x")]);

    let reference = archive_path.join("sub/mod.src");
    let result = expose_file(&ctx, "gone", &reference, "gone.txt", true);

    match result {
        Err(ResolveError::ArchiveEntryNotFound { entry, .. }) => {
            assert_eq!(entry, "sub/gone.txt");
        }
        other => panic!("expected ArchiveEntryNotFound, got {:?}", other),
    }
}

#[test]
fn test_reference_file_outside_archive_tree() {
    let (_temp, ctx, _archive_path) = make_bundle(&[("a.txt", b"x")]);

    let reference = PathBuf::from("/somewhere/unrelated/mod.src");
    let result = expose_file(&ctx, "a", &reference, "a.txt", true);

    assert!(matches!(result, Err(ResolveError::OutsideArchive { .. })));
}

#[test]
fn test_dropping_exposed_file_keeps_archive_intact() {
    let (_temp, ctx, archive_path) = make_bundle(&[("data.bin", b"payload")]);

    let reference = archive_path.join("mod.src");
    let exposed = expose_file(&ctx, "data", &reference, "data.bin", true).unwrap();
    assert_eq!(fs::read(exposed.path()).unwrap(), b"payload");
    drop(exposed);

    // The source archive is untouched and the entry can be exposed again.
    assert!(archive_path.exists());
    let again = expose_file(&ctx, "data", &reference, "data.bin", true).unwrap();
    assert_eq!(fs::read(again.path()).unwrap(), b"payload");
}

#[test]
fn test_expose_file_close_on_exec() {
    let (_temp, ctx, archive_path) = make_bundle(&[("a.bin", b"x"), ("b.bin", b"y")]);
    let reference = archive_path.join("mod.src");

    let exposed = expose_file(&ctx, "a", &reference, "a.bin", true).unwrap();
    let fd = exposed.backing_file().unwrap().as_raw_fd();
    let fd_flags = unsafe { libc::fcntl(fd, libc::F_GETFD) };
    assert_ne!(fd_flags & libc::FD_CLOEXEC, 0);

    let exposed = expose_file(&ctx, "b", &reference, "b.bin", false).unwrap();
    let fd = exposed.backing_file().unwrap().as_raw_fd();
    let fd_flags = unsafe { libc::fcntl(fd, libc::F_GETFD) };
    assert_eq!(fd_flags & libc::FD_CLOEXEC, 0);
}

#[test]
fn test_resolve_extension_rejects_garbage_bytes() {
    let (_temp, ctx, archive_path) = make_bundle(&[("fake.so", b"this is not an ELF object")]);

    let reference = archive_path.join("mod.src");
    let result = resolve_extension(&ctx, "fake", &reference, "fake.so");

    assert!(matches!(result, Err(ResolveError::Load(_))));
}

#[test]
fn test_resolve_extension_missing_entry_uses_relative_name() {
    let (_temp, ctx, archive_path) = make_bundle(&[("other.so", b"x")]);

    let reference = archive_path.join("pkg/sub/mod.src");
    let result = resolve_extension(&ctx, "ext", &reference, "ext.so");

    match result {
        Err(ResolveError::ArchiveEntryNotFound { entry, .. }) => {
            assert_eq!(entry, "pkg/sub/ext.so");
        }
        other => panic!("expected ArchiveEntryNotFound, got {:?}", other),
    }
}

#[test]
fn test_resolve_extension_disk_mode_missing_file() {
    let ctx = LoaderContext::filesystem();
    let reference = PathBuf::from("/nonexistent/tree/mod.src");

    let result = resolve_extension(&ctx, "ext", &reference, "ext.so");
    assert!(matches!(result, Err(ResolveError::Load(_))));
}

#[test]
fn test_resolve_extension_disk_mode_reports_reference_directory() {
    // Re-load a library this process already has mapped; dlopen by full
    // path just bumps its reference count.
    let Some(lib_path) = mapped_library(&["libm.so.6", "libgcc_s.so.1", "libc.so.6"]) else {
        return;
    };
    let dir = lib_path.parent().unwrap().to_path_buf();
    let filename = lib_path.file_name().unwrap().to_str().unwrap();

    let ctx = LoaderContext::filesystem();
    let reference = dir.join("mod.src");
    let loaded = resolve_extension(&ctx, "host-lib", &reference, filename).unwrap();

    assert_eq!(loaded.location(), dir);
    assert_eq!(loaded.name(), "host-lib");
    assert!(loaded.backing_file().is_none());
}

#[test]
fn test_resolve_extension_from_archive() {
    // Bundle a real shared object and load it back out of the archive
    // through a memory file.
    let Some(lib_path) = mapped_library(&["libm.so.6", "libgcc_s.so.1"]) else {
        return;
    };
    let lib_bytes = fs::read(&lib_path).unwrap();
    let (_temp, ctx, archive_path) = make_bundle(&[("sub/ext.so", lib_bytes.as_slice())]);

    let reference = archive_path.join("sub/mod.src");
    let loaded = resolve_extension(&ctx, "ext", &reference, "ext.so").unwrap();

    // The handle reports the reference directory, not the memfd it was
    // actually loaded from.
    assert_eq!(loaded.location(), archive_path.join("sub"));
    let backing = loaded.backing_file().expect("archive load keeps a memory file");
    assert_eq!(fs::read(backing.path()).unwrap(), lib_bytes);

    if lib_path.ends_with("libm.so.6") {
        let cos: unsafe extern "C" fn(f64) -> f64 =
            unsafe { loaded.symbol("cos") }.unwrap();
        let value = unsafe { cos(0.0) };
        assert!((value - 1.0).abs() < f64::EPSILON);
    }
}
