use dupescan::duplicates::{
    DuplicateFinder, DuplicateGroup, FinderConfig, FinderError, SpillMode, SpillWriter,
};
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

fn spill_config(spill_dir: &Path) -> FinderConfig {
    FinderConfig::default()
        .with_spill(SpillMode::File)
        .with_spill_dir(spill_dir.to_path_buf())
}

#[test]
fn test_spill_mode_equivalent_to_memory() {
    let dir = tempdir().unwrap();
    let spill_dir = tempdir().unwrap();
    for i in 0..40 {
        write_file(
            dir.path(),
            &format!("d{}/f{i:02}.dat", i % 5),
            format!("content {}", i % 7).as_bytes(),
        );
    }

    let (memory, memory_summary) = DuplicateFinder::with_defaults()
        .find_duplicates(dir.path())
        .unwrap();
    let (spilled, spill_summary) = DuplicateFinder::new(spill_config(spill_dir.path()))
        .find_duplicates(dir.path())
        .unwrap();

    assert_eq!(paths_of(&memory), paths_of(&spilled));
    for (m, s) in memory.iter().zip(&spilled) {
        assert_eq!(m.fingerprint, s.fingerprint);
        assert_eq!(m.size, s.size);
    }
    assert!(!memory_summary.spilled);
    assert!(spill_summary.spilled);
    assert_eq!(memory_summary.total_files, spill_summary.total_files);
}

#[test]
fn test_spill_file_removed_after_run() {
    let dir = tempdir().unwrap();
    let spill_dir = tempdir().unwrap();
    write_file(dir.path(), "a", b"x");
    write_file(dir.path(), "b", b"x");

    DuplicateFinder::new(spill_config(spill_dir.path()))
        .find_duplicates(dir.path())
        .unwrap();

    assert_eq!(fs::read_dir(spill_dir.path()).unwrap().count(), 0);
}

#[test]
fn test_spill_dir_missing_is_an_error() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "a", b"x");

    let result = DuplicateFinder::new(spill_config(&dir.path().join("no-such-dir")))
        .find_duplicates(dir.path());
    assert!(matches!(result, Err(FinderError::Spill(_))));
}

#[cfg(unix)]
#[test]
fn test_spill_round_trips_hostile_file_names() {
    let dir = tempdir().unwrap();
    let spill_dir = tempdir().unwrap();
    let names = [
        "pipes||in||name",
        "ends with pipe|",
        "line\nbreak",
        "carriage\rreturn",
        "back\\slash",
        "trailing\\",
        "plain",
    ];
    let mut expected: Vec<PathBuf> = names
        .iter()
        .map(|n| write_file(dir.path(), n, b"identical bytes"))
        .collect();
    expected.sort();

    let (groups, _) = DuplicateFinder::new(spill_config(spill_dir.path()))
        .find_duplicates(dir.path())
        .unwrap();

    assert_eq!(paths_of(&groups), vec![expected]);
}

#[cfg(unix)]
#[test]
fn test_spill_round_trips_non_utf8_names() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let dir = tempdir().unwrap();
    let spill_dir = tempdir().unwrap();
    let odd = dir.path().join(OsStr::from_bytes(b"latin1-\xe9t\xe9"));
    if File::create(&odd).and_then(|mut f| f.write_all(b"same")).is_err() {
        // Filesystem refuses non-UTF-8 names
        return;
    }
    let plain = write_file(dir.path(), "plain", b"same");

    let (groups, _) = DuplicateFinder::new(spill_config(spill_dir.path()))
        .find_duplicates(dir.path())
        .unwrap();

    let mut expected = vec![odd, plain];
    expected.sort();
    assert_eq!(paths_of(&groups), vec![expected]);
}

#[test]
fn test_spill_writer_rebuild_matches_appends() {
    let spill_dir = tempdir().unwrap();
    let mut writer = SpillWriter::create_in(spill_dir.path()).unwrap();
    let fp = Fingerprint::of_bytes(b"dup");
    writer.append(Path::new("/r/one"), &fp, 3).unwrap();
    writer.append(Path::new("/r/two"), &fp, 3).unwrap();
    writer
        .append(Path::new("/r/three"), &Fingerprint::of_bytes(b"solo"), 4)
        .unwrap();
    assert_eq!(writer.records(), 3);

    let index = writer.finish().unwrap().rebuild_index().unwrap();
    assert_eq!(index.len(), 3);
    assert_eq!(index.size_of(&fp), Some(3));

    let groups = index.into_groups();
    assert_eq!(
        paths_of(&groups),
        vec![vec![PathBuf::from("/r/one"), PathBuf::from("/r/two")]]
    );
}

#[cfg(unix)]
#[test]
fn test_spill_kept_when_strict_run_aborts() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    let spill_dir = tempdir().unwrap();
    write_file(dir.path(), "a", b"x");
    let secret = write_file(dir.path(), "secret", b"x");
    fs::set_permissions(&secret, fs::Permissions::from_mode(0o000)).unwrap();
    if File::open(&secret).is_ok() {
        return;
    }

    let result = DuplicateFinder::new(
        spill_config(spill_dir.path())
            .with_ignore_errors(false)
            .with_keep_spill_on_error(true),
    )
    .find_duplicates(dir.path());

    assert!(matches!(
        result,
        Err(FinderError::Hash(HashError::PermissionDenied(_)))
    ));
    assert_eq!(fs::read_dir(spill_dir.path()).unwrap().count(), 1);
}

/// Removes a directory when the first result reaches the collector.
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

fn strict_walk_abort(keep: bool) -> (Result<(), FinderError>, usize) {
    let dir = tempdir().unwrap();
    let spill_dir = tempdir().unwrap();
    for i in 0..40 {
        write_file(dir.path(), &format!("a_dir/f{i:02}"), b"same");
    }
    write_file(dir.path(), "z_gone/late", b"same");
    let callback = Arc::new(RemoveDirOnFirstResult {
        dir: dir.path().join("z_gone"),
    });

    let result = DuplicateFinder::new(
        spill_config(spill_dir.path())
            .with_max_concurrent(1)
            .with_ignore_errors(false)
            .with_keep_spill_on_error(keep)
            .with_progress_callback(callback),
    )
    .find_duplicates(dir.path())
    .map(|_| ());

    let left = fs::read_dir(spill_dir.path()).unwrap().count();
    (result, left)
}

#[test]
fn test_spill_kept_when_walk_aborts() {
    let (result, left) = strict_walk_abort(true);

    assert!(matches!(
        result,
        Err(FinderError::Scan(ScanError::NotFound(_)))
    ));
    assert_eq!(left, 1);
}

#[test]
fn test_spill_removed_when_walk_aborts() {
    let (result, left) = strict_walk_abort(false);

    assert!(matches!(
        result,
        Err(FinderError::Scan(ScanError::NotFound(_)))
    ));
    assert_eq!(left, 0);
}
