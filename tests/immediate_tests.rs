//! Immediate operations against the real disk: they bypass the queue, but
//! only after proving no queued operation depends on the paths they touch.

mod common;

use std::fs;

use common::{disk_fs, std_path};
use stagefs::StageError;

#[test]
fn delete_file_immediately_removes_from_disk() {
    let (temp, mut tfs) = disk_fs();
    let file = std_path(&mut tfs, &temp, "gone.txt");
    tfs.write_file(&file, "x").unwrap();

    tfs.delete_file_immediately(&file).unwrap();
    assert!(!temp.path().join("gone.txt").exists());
}

#[test]
fn delete_file_immediately_cancels_queued_delete_of_same_file() {
    let (temp, mut tfs) = disk_fs();
    let file = std_path(&mut tfs, &temp, "file.txt");
    tfs.write_file(&file, "x").unwrap();

    tfs.queue_file_delete(&file);
    tfs.delete_file_immediately(&file).unwrap();

    // the flush has nothing left to do for this file
    tfs.flush().unwrap();
    assert!(!temp.path().join("file.txt").exists());
}

#[test]
fn move_file_immediately_rewrites_at_destination() {
    let (temp, mut tfs) = disk_fs();
    let old = std_path(&mut tfs, &temp, "src/old.rs");
    let new = std_path(&mut tfs, &temp, "src/new.rs");
    tfs.write_file(&old, "fn old() {}").unwrap();

    tfs.move_file_immediately(&old, &new, "fn new() {}").unwrap();

    assert!(!temp.path().join("src/old.rs").exists());
    assert_eq!(
        fs::read_to_string(temp.path().join("src/new.rs")).unwrap(),
        "fn new() {}"
    );
}

#[test]
fn immediate_ops_conflict_with_queued_moves() {
    let (temp, mut tfs) = disk_fs();
    let file = std_path(&mut tfs, &temp, "dir/file.txt");
    let dir = std_path(&mut tfs, &temp, "dir");
    let dir2 = std_path(&mut tfs, &temp, "dir2");
    tfs.write_file(&file, "x").unwrap();

    tfs.queue_move_directory(&dir, &dir2);

    let landed = std_path(&mut tfs, &temp, "dir2/file.txt");
    let err = tfs.delete_file_immediately(&landed).unwrap_err();
    assert!(matches!(err, StageError::Conflict { .. }));
    // nothing happened on disk
    assert!(temp.path().join("dir/file.txt").is_file());
}

#[test]
fn move_directory_immediately_relocates_on_disk() {
    let (temp, mut tfs) = disk_fs();
    let file = std_path(&mut tfs, &temp, "from/file.txt");
    let from = std_path(&mut tfs, &temp, "from");
    let to = std_path(&mut tfs, &temp, "to");
    tfs.write_file(&file, "x").unwrap();

    tfs.move_directory_immediately(&from, &to).unwrap();

    assert!(!temp.path().join("from").exists());
    assert!(temp.path().join("to/file.txt").is_file());
    assert!(tfs.directory_exists(&to));
}

#[test]
fn copy_directory_immediately_duplicates_on_disk() {
    let (temp, mut tfs) = disk_fs();
    let file = std_path(&mut tfs, &temp, "src/file.txt");
    let src = std_path(&mut tfs, &temp, "src");
    let dest = std_path(&mut tfs, &temp, "dest");
    tfs.write_file(&file, "x").unwrap();

    tfs.copy_directory_immediately(&src, &dest).unwrap();

    assert!(temp.path().join("src/file.txt").is_file());
    assert!(temp.path().join("dest/file.txt").is_file());
}

#[test]
fn clear_directory_immediately_leaves_an_empty_directory() {
    let (temp, mut tfs) = disk_fs();
    let file = std_path(&mut tfs, &temp, "dir/file.txt");
    let dir = std_path(&mut tfs, &temp, "dir");
    tfs.write_file(&file, "x").unwrap();

    tfs.clear_directory_immediately(&dir).unwrap();

    assert!(temp.path().join("dir").is_dir());
    assert_eq!(fs::read_dir(temp.path().join("dir")).unwrap().count(), 0);
}

#[test]
fn write_file_cancels_queued_delete() {
    let (temp, mut tfs) = disk_fs();
    let file = std_path(&mut tfs, &temp, "file.txt");
    tfs.write_file(&file, "old").unwrap();

    tfs.queue_file_delete(&file);
    tfs.write_file(&file, "new").unwrap();
    tfs.flush().unwrap();

    assert_eq!(
        fs::read_to_string(temp.path().join("file.txt")).unwrap(),
        "new"
    );
}
