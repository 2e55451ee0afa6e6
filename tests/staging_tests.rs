//! End-to-end staging behavior against the real disk: operations queue in
//! memory, the disk only changes on flush, and flushes replay the queue in
//! staging order.

mod common;

use std::fs;

use common::{disk_fs, std_path};

#[test]
fn queued_delete_leaves_disk_untouched_until_flush() {
    let (temp, mut tfs) = disk_fs();
    let file = std_path(&mut tfs, &temp, "notes.txt");
    tfs.write_file(&file, "keep me for now").unwrap();

    tfs.queue_file_delete(&file);
    assert!(!tfs.file_exists(&file));
    assert!(temp.path().join("notes.txt").is_file());

    tfs.flush().unwrap();
    assert!(!temp.path().join("notes.txt").exists());
}

#[test]
fn queued_directory_move_applies_on_flush() {
    let (temp, mut tfs) = disk_fs();
    let file = std_path(&mut tfs, &temp, "old/mod.rs");
    let old_dir = std_path(&mut tfs, &temp, "old");
    let new_dir = std_path(&mut tfs, &temp, "new");
    tfs.write_file(&file, "pub fn f() {}").unwrap();

    tfs.queue_move_directory(&old_dir, &new_dir);
    assert!(!tfs.directory_exists(&old_dir));
    assert!(tfs.directory_exists(&new_dir));
    assert!(temp.path().join("old").is_dir());

    tfs.flush().unwrap();
    assert!(!temp.path().join("old").exists());
    assert_eq!(
        fs::read_to_string(temp.path().join("new/mod.rs")).unwrap(),
        "pub fn f() {}"
    );
}

#[test]
fn queued_copy_duplicates_directory_on_flush() {
    let (temp, mut tfs) = disk_fs();
    let file = std_path(&mut tfs, &temp, "src/lib.rs");
    let src = std_path(&mut tfs, &temp, "src");
    let backup = std_path(&mut tfs, &temp, "backup");
    tfs.write_file(&file, "// original").unwrap();

    tfs.queue_copy_directory(&src, &backup);
    tfs.flush().unwrap();

    assert_eq!(
        fs::read_to_string(temp.path().join("src/lib.rs")).unwrap(),
        "// original"
    );
    assert_eq!(
        fs::read_to_string(temp.path().join("backup/lib.rs")).unwrap(),
        "// original"
    );
}

#[test]
fn delete_staged_before_move_runs_first() {
    let (temp, mut tfs) = disk_fs();
    let doomed = std_path(&mut tfs, &temp, "dir/doomed.txt");
    let kept = std_path(&mut tfs, &temp, "dir/kept.txt");
    let dir = std_path(&mut tfs, &temp, "dir");
    let moved = std_path(&mut tfs, &temp, "moved");
    tfs.write_file(&doomed, "x").unwrap();
    tfs.write_file(&kept, "y").unwrap();

    tfs.queue_file_delete(&doomed);
    tfs.queue_move_directory(&dir, &moved);
    tfs.flush().unwrap();

    assert!(!temp.path().join("moved/doomed.txt").exists());
    assert!(temp.path().join("moved/kept.txt").is_file());
}

#[test]
fn flush_tolerates_deletes_of_paths_that_never_existed() {
    let (temp, mut tfs) = disk_fs();
    let ghost_file = std_path(&mut tfs, &temp, "ghost.txt");
    let ghost_dir = std_path(&mut tfs, &temp, "ghost-dir");

    tfs.queue_file_delete(&ghost_file);
    tfs.queue_directory_delete(&ghost_dir);
    tfs.flush().unwrap();
}

#[test]
fn queued_mkdir_materializes_nested_path() {
    let (temp, mut tfs) = disk_fs();
    let deep = std_path(&mut tfs, &temp, "a/b/c");
    tfs.queue_mkdir(&deep);

    assert!(tfs.directory_exists(&deep));
    assert!(!temp.path().join("a").exists());

    tfs.flush().unwrap();
    assert!(temp.path().join("a/b/c").is_dir());
}

#[test]
fn save_for_directory_commits_only_its_subtree() {
    let (temp, mut tfs) = disk_fs();
    let inside = std_path(&mut tfs, &temp, "scoped/inside.txt");
    let outside = std_path(&mut tfs, &temp, "other/outside.txt");
    let scoped = std_path(&mut tfs, &temp, "scoped");
    tfs.write_file(&inside, "a").unwrap();
    tfs.write_file(&outside, "b").unwrap();

    tfs.queue_file_delete(&inside);
    tfs.queue_file_delete(&outside);
    tfs.save_for_directory(&scoped).unwrap();

    assert!(!temp.path().join("scoped/inside.txt").exists());
    assert!(temp.path().join("other/outside.txt").is_file());
    assert!(!tfs.file_exists(&outside));

    tfs.flush().unwrap();
    assert!(!temp.path().join("other/outside.txt").exists());
}

#[test]
fn save_for_directory_creates_the_directory_if_missing() {
    let (temp, mut tfs) = disk_fs();
    let fresh = std_path(&mut tfs, &temp, "fresh/deep");
    tfs.queue_mkdir(&fresh);

    tfs.save_for_directory(&fresh).unwrap();
    assert!(temp.path().join("fresh/deep").is_dir());
}
