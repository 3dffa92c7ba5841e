use dupescan::duplicates::{DuplicateFinder, DuplicateGroup, FinderConfig, FinderError};
use dupescan::progress::ProgressCallback;
use dupescan::scanner::{Fingerprint, HashError, ScanError};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::tempdir;

fn write_file(root: &Path, rel: &str, content: &[u8]) -> PathBuf {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    File::create(&path).unwrap().write_all(content).unwrap();
    path
}

fn paths_of(groups: &[DuplicateGroup]) -> Vec<Vec<PathBuf>> {
    groups
        .iter()
        .map(|g| g.files.iter().map(|f| f.path.clone()).collect())
        .collect()
}

/// True when the current user can read a directory with no permissions,
/// which is the case for root.
#[cfg(unix)]
fn permissions_are_bypassed(dir: &Path) -> bool {
    fs::read_dir(dir).is_ok()
}

#[test]
fn test_scan_empty_directory() {
    let dir = tempdir().unwrap();
    let finder = DuplicateFinder::with_defaults();

    let (groups, summary) = finder.find_duplicates(dir.path()).unwrap();

    assert!(groups.is_empty());
    assert_eq!(summary.total_files, 0);
    assert_eq!(summary.duplicate_groups, 0);
}

#[test]
fn test_scan_unique_files() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "a.txt", b"content a");
    write_file(dir.path(), "b.txt", b"content b");
    write_file(dir.path(), "c.txt", b"content c");

    let (groups, summary) = DuplicateFinder::with_defaults()
        .find_duplicates(dir.path())
        .unwrap();

    assert!(groups.is_empty());
    assert_eq!(summary.total_files, 3);
    assert_eq!(summary.duplicate_groups, 0);
}

#[test]
fn test_scan_hello_world_example() {
    let dir = tempdir().unwrap();
    let a = write_file(dir.path(), "a.txt", b"hello");
    let b = write_file(dir.path(), "b.txt", b"hello");
    write_file(dir.path(), "c.txt", b"world");

    let (groups, summary) = DuplicateFinder::new(FinderConfig::default().with_max_concurrent(2))
        .find_duplicates(dir.path())
        .unwrap();

    assert_eq!(paths_of(&groups), vec![vec![a, b]]);
    assert_eq!(groups[0].size, 5);
    assert_eq!(groups[0].fingerprint, Fingerprint::of_bytes(b"hello"));
    assert_eq!(summary.duplicate_groups, 1);
    assert_eq!(summary.duplicate_files, 2);
    assert_eq!(summary.reclaimable_space, 5);
}

#[test]
fn test_scan_every_file_accounted_for() {
    let dir = tempdir().unwrap();
    let mut expected = 0;
    for d in 0..4 {
        for f in 0..6 {
            write_file(
                dir.path(),
                &format!("dir{d}/sub/file{f}.bin"),
                format!("payload {}", f % 3).as_bytes(),
            );
            expected += 1;
        }
    }

    let (groups, summary) = DuplicateFinder::new(FinderConfig::default().with_max_concurrent(3))
        .find_duplicates(dir.path())
        .unwrap();

    assert_eq!(summary.total_files, expected);
    assert_eq!(summary.failed_files, 0);
    // Three distinct payloads, each shared by eight files
    assert_eq!(groups.len(), 3);
    assert!(groups.iter().all(|g| g.len() == 8));

    let mut all: Vec<PathBuf> = groups
        .iter()
        .flat_map(|g| g.files.iter().map(|f| f.path.clone()))
        .collect();
    let before = all.len();
    all.sort();
    all.dedup();
    assert_eq!(all.len(), before, "a path appeared in more than one group");
}

#[test]
fn test_scan_groups_share_content() {
    let dir = tempdir().unwrap();
    for i in 0..30 {
        write_file(dir.path(), &format!("f{i:02}"), &vec![(i % 5) as u8; 100 + (i % 5)]);
    }

    let (groups, _) = DuplicateFinder::with_defaults()
        .find_duplicates(dir.path())
        .unwrap();

    assert_eq!(groups.len(), 5);
    for group in &groups {
        let first = fs::read(&group.files[0].path).unwrap();
        for file in &group.files[1..] {
            assert_eq!(fs::read(&file.path).unwrap(), first);
        }
        assert_eq!(group.size, first.len() as u64);
    }
}

#[test]
fn test_scan_is_idempotent() {
    let dir = tempdir().unwrap();
    for i in 0..12 {
        write_file(dir.path(), &format!("n{}/f{i}", i % 3), format!("{}", i % 4).as_bytes());
    }

    let finder = DuplicateFinder::new(FinderConfig::default().with_max_concurrent(4));
    let (first, _) = finder.find_duplicates(dir.path()).unwrap();
    let (second, _) = finder.find_duplicates(dir.path()).unwrap();

    assert_eq!(paths_of(&first), paths_of(&second));
    let fps = |g: &[DuplicateGroup]| g.iter().map(|g| g.fingerprint).collect::<Vec<_>>();
    assert_eq!(fps(&first), fps(&second));
}

#[test]
fn test_scan_result_independent_of_limit() {
    let dir = tempdir().unwrap();
    for i in 0..25 {
        write_file(dir.path(), &format!("f{i:02}"), format!("{}", i % 6).as_bytes());
    }

    let run = |limit| {
        DuplicateFinder::new(FinderConfig::default().with_max_concurrent(limit))
            .find_duplicates(dir.path())
            .unwrap()
            .0
    };

    let serial = paths_of(&run(1));
    assert_eq!(paths_of(&run(4)), serial);
    assert_eq!(paths_of(&run(16)), serial);
}

#[test]
fn test_skip_filter() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "small_a", &[1u8; 100]);
    write_file(dir.path(), "small_b", &[1u8; 100]);
    let big_a = write_file(dir.path(), "big_a", &[2u8; 4096]);
    let big_b = write_file(dir.path(), "big_b", &[2u8; 4096]);

    // --skip 1 (KiB)
    let (groups, summary) = DuplicateFinder::new(FinderConfig::default().with_min_size(1024))
        .find_duplicates(dir.path())
        .unwrap();

    assert_eq!(paths_of(&groups), vec![vec![big_a, big_b]]);
    assert_eq!(summary.skipped_small, 2);
    assert_eq!(summary.total_files, 2);
}

#[test]
fn test_empty_files_are_grouped() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "empty1", b"");
    write_file(dir.path(), "empty2", b"");

    let (groups, _) = DuplicateFinder::with_defaults()
        .find_duplicates(dir.path())
        .unwrap();

    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].size, 0);
    assert_eq!(groups[0].wasted_space(), 0);
}

#[test]
fn test_large_files_use_chunked_strategy() {
    let dir = tempdir().unwrap();
    let payload: Vec<u8> = (0..64 * 1024u32).map(|i| (i * 31 % 256) as u8).collect();
    let x = write_file(dir.path(), "x.bin", &payload);
    let y = write_file(dir.path(), "y.bin", &payload);
    let mut other = payload.clone();
    other[1000] ^= 0xff;
    write_file(dir.path(), "z.bin", &other);

    // Threshold lowered so the 64 KiB files take the streaming path
    let (groups, _) = DuplicateFinder::new(
        FinderConfig::default()
            .with_large_file_threshold(16 * 1024)
            .with_chunk_size(8 * 1024),
    )
    .find_duplicates(dir.path())
    .unwrap();

    assert_eq!(paths_of(&groups), vec![vec![x, y]]);
    assert_eq!(groups[0].fingerprint, Fingerprint::of_bytes(&payload));
}

#[cfg(unix)]
#[test]
fn test_symlinks_are_not_followed() {
    let dir = tempdir().unwrap();
    let target = write_file(dir.path(), "target.txt", b"linked content");
    std::os::unix::fs::symlink(&target, dir.path().join("link.txt")).unwrap();

    let (groups, summary) = DuplicateFinder::with_defaults()
        .find_duplicates(dir.path())
        .unwrap();

    assert!(groups.is_empty());
    assert_eq!(summary.total_files, 1);
}

#[cfg(unix)]
#[test]
fn test_unreadable_subdirectory_tolerated() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    let a = write_file(dir.path(), "ok/a.txt", b"same");
    let b = write_file(dir.path(), "ok/b.txt", b"same");
    write_file(dir.path(), "locked/c.txt", b"same");
    let locked = dir.path().join("locked");
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

    if permissions_are_bypassed(&locked) {
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        return;
    }

    let result = DuplicateFinder::new(FinderConfig::default().with_ignore_errors(true))
        .find_duplicates(dir.path());
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

    let (groups, summary) = result.unwrap();
    assert_eq!(paths_of(&groups), vec![vec![a, b]]);
    assert_eq!(summary.walk_errors, 1);
}

#[cfg(unix)]
#[test]
fn test_unreadable_subdirectory_aborts_when_strict() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    write_file(dir.path(), "a.txt", b"same");
    write_file(dir.path(), "locked/c.txt", b"same");
    let locked = dir.path().join("locked");
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

    if permissions_are_bypassed(&locked) {
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        return;
    }

    let result = DuplicateFinder::new(FinderConfig::default().with_ignore_errors(false))
        .find_duplicates(dir.path());
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

    match result {
        Err(FinderError::Scan(ScanError::PermissionDenied(path))) => assert_eq!(path, locked),
        other => panic!("Expected PermissionDenied, got {other:?}"),
    }
}

#[cfg(unix)]
#[test]
fn test_unreadable_file_skipped_or_fatal() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    write_file(dir.path(), "a.txt", b"dup");
    write_file(dir.path(), "b.txt", b"dup");
    let secret = write_file(dir.path(), "secret.txt", b"dup");
    fs::set_permissions(&secret, fs::Permissions::from_mode(0o000)).unwrap();

    if File::open(&secret).is_ok() {
        return;
    }

    let (groups, summary) = DuplicateFinder::new(FinderConfig::default().with_ignore_errors(true))
        .find_duplicates(dir.path())
        .unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].len(), 2);
    assert_eq!(summary.failed_files, 1);
    assert!(matches!(summary.errors[0], HashError::PermissionDenied(_)));

    let strict = DuplicateFinder::new(FinderConfig::default().with_ignore_errors(false))
        .find_duplicates(dir.path());
    match strict {
        Err(FinderError::Hash(HashError::PermissionDenied(path))) => assert_eq!(path, secret),
        other => panic!("Expected PermissionDenied, got {other:?}"),
    }
}

#[test]
fn test_scan_nonexistent_root() {
    let dir = tempdir().unwrap();
    let result = DuplicateFinder::with_defaults().find_duplicates(&dir.path().join("missing"));
    assert!(matches!(result, Err(FinderError::Scan(ScanError::NotFound(_)))));
}

/// Removes a directory when the first result reaches the collector.
///
/// With one worker and a one-slot channel the walker cannot get more than
/// a couple of files ahead of the collector, so the directory is gone
/// before the walker reaches it.
struct RemoveDirOnFirstResult {
    dir: PathBuf,
}

impl ProgressCallback for RemoveDirOnFirstResult {
    fn on_phase_start(&self, _phase: &str, _total: usize) {}
    fn on_progress(&self, current: usize, _path: &str) {
        if current == 1 {
            fs::remove_dir_all(&self.dir).unwrap();
        }
    }
    fn on_phase_end(&self, _phase: &str) {}
}

/// `a_dir` holds 40 files in two content groups; `z_gone` vanishes mid-scan.
fn vanishing_tree(root: &Path) -> PathBuf {
    for i in 0..40 {
        write_file(root, &format!("a_dir/f{i:02}"), format!("payload {}", i % 2).as_bytes());
    }
    write_file(root, "z_gone/late.txt", b"payload 0");
    root.join("z_gone")
}

fn vanishing_config(doomed: PathBuf, ignore_errors: bool) -> FinderConfig {
    FinderConfig::default()
        .with_max_concurrent(1)
        .with_ignore_errors(ignore_errors)
        .with_progress_callback(Arc::new(RemoveDirOnFirstResult { dir: doomed }))
}

#[test]
fn test_vanished_subdirectory_tolerated() {
    let dir = tempdir().unwrap();
    let doomed = vanishing_tree(dir.path());

    let (groups, summary) = DuplicateFinder::new(vanishing_config(doomed, true))
        .find_duplicates(dir.path())
        .unwrap();

    assert_eq!(summary.total_files, 40);
    assert_eq!(summary.walk_errors, 1);
    assert_eq!(groups.len(), 2);
    assert!(groups.iter().all(|g| g.len() == 20));
}

#[test]
fn test_vanished_subdirectory_aborts_when_strict() {
    let dir = tempdir().unwrap();
    let doomed = vanishing_tree(dir.path());

    let result = DuplicateFinder::new(vanishing_config(doomed.clone(), false))
        .find_duplicates(dir.path());

    match result {
        Err(FinderError::Scan(ScanError::NotFound(path))) => assert_eq!(path, doomed),
        other => panic!("Expected NotFound, got {other:?}"),
    }
}
