//! End-to-end scenarios driven through the public API the way a test
//! harness external to this crate would.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};

use minifs::{FileSystem, FsError, OpenFlags};

/// Host paths for image round-trip tests must be unique per test (tests
/// run concurrently) and per process; a simple counter over the process
/// id keeps this crate free of an extra dependency for temp files.
fn scratch_image_path(tag: &str) -> PathBuf {
    static COUNTER: AtomicU32 = AtomicU32::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("minifs_test_{}_{}_{tag}.img", std::process::id(), n))
}

#[test]
fn format_and_list_root_scenario() {
    let fs = FileSystem::formatted();
    let entries = fs.list(1).unwrap();
    assert_eq!(entries, vec![(".".to_string(), 1), ("..".to_string(), 1)]);
}

#[test]
fn create_resolve_remove_scenario() {
    let mut fs = FileSystem::formatted();
    let a = fs.mkdir(1, "a").unwrap();
    assert_eq!(a, 2);
    let b = fs.mkdir(a, "b").unwrap();
    assert_eq!(b, 3);
    assert_eq!(fs.resolve("/a/b", 1).unwrap(), 3);
    assert_eq!(fs.resolve("/a/b/../..", 1).unwrap(), 1);
    fs.rmdir(a, "b").unwrap();
    fs.rmdir(1, "a").unwrap();
}

#[test]
fn read_write_round_trip_scenario() {
    let mut fs = FileSystem::formatted();
    fs.create(1, "f").unwrap();
    let fd = fs.open(1, "f", OpenFlags::RDWR).unwrap();
    assert_eq!(fs.write(fd, b"hello", 5).unwrap(), 5);
    fs.close(fd).unwrap();

    let fd2 = fs.open(1, "f", OpenFlags::RDONLY).unwrap();
    let mut buf = [0u8; 5];
    assert_eq!(fs.read(fd2, &mut buf, 5).unwrap(), 5);
    assert_eq!(&buf, b"hello");
}

#[test]
fn oversize_write_clamp_scenario() {
    let mut fs = FileSystem::formatted();
    fs.create(1, "f").unwrap();
    let fd = fs.open(1, "f", OpenFlags::RDWR).unwrap();
    let x = vec![0x42u8; 5000];
    assert_eq!(fs.write(fd, &x, 5000).unwrap(), 4096);
    fs.close(fd).unwrap();

    let fd2 = fs.open(1, "f", OpenFlags::RDONLY).unwrap();
    let mut buf = vec![0u8; 4096];
    assert_eq!(fs.read(fd2, &mut buf, 4096).unwrap(), 4096);
    assert_eq!(buf, &x[..4096]);
}

#[test]
fn busy_unlink_scenario() {
    let mut fs = FileSystem::formatted();
    fs.create(1, "g").unwrap();
    let fd = fs.open(1, "g", OpenFlags::RDONLY).unwrap();
    assert!(matches!(fs.unlink(1, "g"), Err(FsError::Busy)));
    fs.close(fd).unwrap();
    fs.unlink(1, "g").unwrap();
}

#[test]
fn persistence_scenario_reproduces_every_observable_result() {
    let mut fs = FileSystem::formatted();
    let a = fs.mkdir(1, "a").unwrap();
    fs.mkdir(a, "b").unwrap();
    fs.create(a, "notes").unwrap();
    let fd = fs.open(a, "notes", OpenFlags::RDWR).unwrap();
    fs.write(fd, b"persisted", 9).unwrap();
    fs.close(fd).unwrap();

    let path = scratch_image_path("persistence");
    fs.save(&path).unwrap();

    let mut reloaded = FileSystem::load(&path).unwrap();
    assert_eq!(reloaded.list(1).unwrap(), fs.list(1).unwrap());
    assert_eq!(reloaded.resolve("/a/b", 1).unwrap(), fs.resolve("/a/b", 1).unwrap());

    let fd2 = reloaded.open(a, "notes", OpenFlags::RDONLY).unwrap();
    let mut buf = [0u8; 9];
    assert_eq!(reloaded.read(fd2, &mut buf, 9).unwrap(), 9);
    assert_eq!(&buf, b"persisted");

    std::fs::remove_file(&path).ok();
}

#[test]
fn save_backs_up_existing_image() {
    let mut fs = FileSystem::formatted();
    let path = scratch_image_path("backup");
    fs.save(&path).unwrap();
    fs.save(&path).unwrap();
    let backup = PathBuf::from(format!("{}.bak", path.display()));
    assert!(backup.exists());
    std::fs::remove_file(&path).ok();
    std::fs::remove_file(&backup).ok();
}

#[test]
fn load_rejects_wrong_size_image_as_corrupt() {
    let path = scratch_image_path("corrupt");
    std::fs::write(&path, vec![0u8; 10]).unwrap();
    let err = FileSystem::load(&path).unwrap_err();
    assert!(matches!(err, FsError::CorruptImage(_)));
    std::fs::remove_file(&path).ok();
}

#[test]
fn directory_capacity_exhaustion_then_recovery() {
    // The root directory's single data block holds a fixed number of
    // entries (including "." and ".."), so this is the first allocator
    // limit a flat burst of creates actually hits.
    let mut fs = FileSystem::formatted();
    let mut created = Vec::new();
    loop {
        match fs.create(1, &format!("f{}", created.len())) {
            Ok(inum) => created.push(inum),
            Err(FsError::NoSpace) => break,
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
    assert!(matches!(fs.create(1, "overflow"), Err(FsError::NoSpace)));

    let victim_name = "f0";
    fs.unlink(1, victim_name).unwrap();
    assert!(fs.create(1, "reclaimed").is_ok());
}

#[test]
fn seeked_reads_toggle_honors_descriptor_position() {
    let mut fs = FileSystem::with_seeked_reads();
    fs.create(1, "f").unwrap();
    let fd = fs.open(1, "f", OpenFlags::RDWR).unwrap();
    fs.write(fd, b"0123456789", 10).unwrap();
    fs.close(fd).unwrap();

    // A fresh write-then-read on the same descriptor advances `position`
    // past the two bytes just written; the seeked-reads variant continues
    // from there instead of restarting at offset 0.
    let fd2 = fs.open(1, "f", OpenFlags::RDWR).unwrap();
    fs.write(fd2, b"XY", 2).unwrap();
    let mut buf = [0u8; 8];
    assert_eq!(fs.read(fd2, &mut buf, 8).unwrap(), 8);
    assert_eq!(&buf, b"23456789");
}

#[test]
fn legacy_reads_always_restart_at_offset_zero() {
    let mut fs = FileSystem::formatted();
    fs.create(1, "f").unwrap();
    let fd = fs.open(1, "f", OpenFlags::RDWR).unwrap();
    fs.write(fd, b"0123456789", 10).unwrap();
    fs.close(fd).unwrap();

    let fd2 = fs.open(1, "f", OpenFlags::RDWR).unwrap();
    fs.write(fd2, b"XY", 2).unwrap();
    let mut buf = [0u8; 10];
    assert_eq!(fs.read(fd2, &mut buf, 10).unwrap(), 10);
    assert_eq!(&buf, b"XY23456789");
}
