//! End-to-end scenarios over a real backing image, one fresh `tempfile`
//! image per test, exercising `FileSystem` the way a FUSE bridge would
//! dispatch to it.

use duofs::{Config, Error, FileSystem};

fn fresh_fs() -> (tempfile::TempDir, FileSystem) {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::new(dir.path().join(".disk"));
    let fs = FileSystem::format(&config).unwrap();
    (dir, fs)
}

#[test]
fn fresh_image_root_lists_only_dot_entries() {
    let (_dir, mut fs) = fresh_fs();
    assert_eq!(fs.readdir("/").unwrap(), vec![".".to_string(), "..".to_string()]);
}

#[test]
fn mkdir_then_readdir_shows_new_directory() {
    let (_dir, mut fs) = fresh_fs();
    fs.mkdir("/docs").unwrap();
    assert_eq!(
        fs.readdir("/").unwrap(),
        vec![".".to_string(), "..".to_string(), "docs".to_string()]
    );
    let attrs = fs.getattr("/docs").unwrap();
    assert_eq!(attrs.kind, duofs::FileKind::Directory);
}

#[test]
fn mknod_then_read_on_empty_file_returns_nothing() {
    let (_dir, mut fs) = fresh_fs();
    fs.mkdir("/docs").unwrap();
    fs.mknod("/docs/readme.txt").unwrap();

    let attrs = fs.getattr("/docs/readme.txt").unwrap();
    assert_eq!(attrs.kind, duofs::FileKind::RegularFile);
    assert_eq!(attrs.size, 0);

    let bytes = fs.read("/docs/readme.txt", 100, 0).unwrap();
    assert!(bytes.is_empty());
}

#[test]
fn write_within_a_single_block_round_trips() {
    let (_dir, mut fs) = fresh_fs();
    fs.mkdir("/docs").unwrap();
    fs.mknod("/docs/readme.txt").unwrap();

    let written = fs.write("/docs/readme.txt", b"hello", 0).unwrap();
    assert_eq!(written, 5);
    assert_eq!(fs.getattr("/docs/readme.txt").unwrap().size, 5);

    let bytes = fs.read("/docs/readme.txt", 10, 0).unwrap();
    assert_eq!(bytes, b"hello");
}

#[test]
fn write_spanning_two_blocks_round_trips() {
    let (_dir, mut fs) = fresh_fs();
    fs.mkdir("/docs").unwrap();
    fs.mknod("/docs/big.bin").unwrap();

    let payload = vec![b'A'; 600];
    let written = fs.write("/docs/big.bin", &payload, 0).unwrap();
    assert_eq!(written, 600);
    assert_eq!(fs.getattr("/docs/big.bin").unwrap().size, 600);

    let bytes = fs.read("/docs/big.bin", 600, 0).unwrap();
    assert_eq!(bytes, payload);
}

#[test]
fn nine_character_directory_name_is_rejected_and_root_is_unchanged() {
    let (_dir, mut fs) = fresh_fs();
    assert!(matches!(fs.mkdir("/directoryX"), Err(Error::NameTooLong)));
    assert_eq!(fs.readdir("/").unwrap(), vec![".".to_string(), "..".to_string()]);
}

#[test]
fn append_exactly_at_a_block_boundary_extends_the_chain() {
    let (_dir, mut fs) = fresh_fs();
    fs.mkdir("/docs").unwrap();
    fs.mknod("/docs/exact.bin").unwrap();

    let first = vec![b'A'; 504];
    fs.write("/docs/exact.bin", &first, 0).unwrap();
    assert_eq!(fs.getattr("/docs/exact.bin").unwrap().size, 504);

    let second = vec![b'B'; 10];
    let written = fs.write("/docs/exact.bin", &second, 504).unwrap();
    assert_eq!(written, 10);
    assert_eq!(fs.getattr("/docs/exact.bin").unwrap().size, 514);

    let bytes = fs.read("/docs/exact.bin", 514, 0).unwrap();
    assert_eq!(&bytes[..504], first.as_slice());
    assert_eq!(&bytes[504..], second.as_slice());
}

#[test]
fn read_at_offset_equal_to_size_returns_empty() {
    let (_dir, mut fs) = fresh_fs();
    fs.mkdir("/docs").unwrap();
    fs.mknod("/docs/a.txt").unwrap();
    fs.write("/docs/a.txt", b"hello", 0).unwrap();

    let bytes = fs.read("/docs/a.txt", 100, 5).unwrap();
    assert!(bytes.is_empty());
}

#[test]
fn read_past_end_of_file_is_file_too_large() {
    let (_dir, mut fs) = fresh_fs();
    fs.mkdir("/docs").unwrap();
    fs.mknod("/docs/a.txt").unwrap();
    fs.write("/docs/a.txt", b"hello", 0).unwrap();

    assert!(matches!(fs.read("/docs/a.txt", 10, 6), Err(Error::FileTooLarge)));
}

#[test]
fn write_past_end_of_file_is_file_too_large() {
    let (_dir, mut fs) = fresh_fs();
    fs.mkdir("/docs").unwrap();
    fs.mknod("/docs/a.txt").unwrap();

    assert!(matches!(fs.write("/docs/a.txt", b"x", 1), Err(Error::FileTooLarge)));
}

#[test]
fn duplicate_mkdir_is_already_exists() {
    let (_dir, mut fs) = fresh_fs();
    fs.mkdir("/docs").unwrap();
    assert!(matches!(fs.mkdir("/docs"), Err(Error::AlreadyExists)));
}

#[test]
fn duplicate_mknod_is_already_exists() {
    let (_dir, mut fs) = fresh_fs();
    fs.mkdir("/docs").unwrap();
    fs.mknod("/docs/a.txt").unwrap();
    assert!(matches!(fs.mknod("/docs/a.txt"), Err(Error::AlreadyExists)));
}

#[test]
fn mknod_in_missing_directory_is_not_found() {
    let (_dir, mut fs) = fresh_fs();
    assert!(matches!(fs.mknod("/nope/a.txt"), Err(Error::NotFound)));
}

#[test]
fn root_reports_no_space_left_once_full() {
    let (_dir, mut fs) = fresh_fs();
    for i in 0..duofs::disk_layout::ROOT_ENTRY_CAPACITY {
        fs.mkdir(&format!("/d{i}")).unwrap();
    }
    assert!(matches!(fs.mkdir("/overflow"), Err(Error::NoSpaceLeft)));
}

#[test]
fn directory_reports_no_space_left_once_full() {
    let (_dir, mut fs) = fresh_fs();
    fs.mkdir("/docs").unwrap();
    for i in 0..duofs::disk_layout::DIR_ENTRY_CAPACITY {
        fs.mknod(&format!("/docs/f{i}.txt")).unwrap();
    }
    assert!(matches!(fs.mknod("/docs/overflow.txt"), Err(Error::NoSpaceLeft)));
}

#[test]
fn rmdir_unlink_and_truncate_are_no_ops() {
    let (_dir, mut fs) = fresh_fs();
    fs.mkdir("/docs").unwrap();
    fs.mknod("/docs/a.txt").unwrap();
    fs.write("/docs/a.txt", b"hello", 0).unwrap();

    fs.rmdir("/docs").unwrap();
    fs.unlink("/docs/a.txt").unwrap();
    fs.truncate("/docs/a.txt", 0).unwrap();

    assert_eq!(fs.getattr("/docs/a.txt").unwrap().size, 5);
    assert_eq!(
        fs.readdir("/").unwrap(),
        vec![".".to_string(), "..".to_string(), "docs".to_string()]
    );
}

#[test]
fn reopening_an_existing_image_preserves_contents() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::new(dir.path().join(".disk"));
    {
        let mut fs = FileSystem::format(&config).unwrap();
        fs.mkdir("/docs").unwrap();
        fs.mknod("/docs/a.txt").unwrap();
        fs.write("/docs/a.txt", b"hello", 0).unwrap();
    }
    let mut fs = FileSystem::open(&config).unwrap();
    assert_eq!(fs.read("/docs/a.txt", 10, 0).unwrap(), b"hello");
}
