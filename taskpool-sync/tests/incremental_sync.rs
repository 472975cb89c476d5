use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use filetime::{set_file_mtime, FileTime};
use taskpool_core::{StatusBus, StatusEvent};
use taskpool_sync::{plan, sync, CopyReason, PlanAction, SyncError, SyncOptions};
use tempfile::TempDir;

struct Trees {
    _root: TempDir,
    src: PathBuf,
    dst: PathBuf,
}

fn trees() -> Trees {
    let root = TempDir::new().expect("tempdir");
    let src = root.path().join("src");
    let dst = root.path().join("dst");
    fs::create_dir_all(&src).expect("mkdir src");
    fs::create_dir_all(&dst).expect("mkdir dst");
    Trees {
        _root: root,
        src,
        dst,
    }
}

fn write(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("mkdir parent");
    }
    fs::write(path, content).expect("write");
}

fn set_age(path: &Path, when: SystemTime) {
    set_file_mtime(path, FileTime::from_system_time(when)).expect("set mtime");
}

fn copied_events(events: &[StatusEvent]) -> Vec<PathBuf> {
    events
        .iter()
        .filter_map(|e| match e {
            StatusEvent::Copied { relative } => Some(relative.clone()),
            _ => None,
        })
        .collect()
}

fn run(src: &Path, dst: &Path, force: bool) -> (Result<taskpool_sync::SyncReport, SyncError>, Vec<StatusEvent>) {
    let (bus, mut rx) = StatusBus::channel();
    let result = sync(src, dst, &SyncOptions::force(force), &bus);
    (result, rx.drain())
}

#[test]
fn copies_new_files_once_with_identical_content() {
    let t = trees();
    write(&t.src.join("index.html"), "<h1>hi</h1>");
    write(&t.src.join("assets").join("img").join("logo.png"), "\u{1}\u{2}png");

    let (result, events) = run(&t.src, &t.dst, false);
    let report = result.expect("sync");

    let expected = vec![
        PathBuf::from("assets").join("img").join("logo.png"),
        PathBuf::from("index.html"),
    ];
    assert_eq!(report.copied, expected);
    assert_eq!(copied_events(&events), expected);
    assert_eq!(
        fs::read(t.dst.join("assets").join("img").join("logo.png")).unwrap(),
        fs::read(t.src.join("assets").join("img").join("logo.png")).unwrap()
    );
    assert_eq!(fs::read_to_string(t.dst.join("index.html")).unwrap(), "<h1>hi</h1>");
}

#[test]
fn second_run_is_idempotent() {
    let t = trees();
    write(&t.src.join("a.txt"), "a");
    write(&t.src.join("nested").join("b.txt"), "bb");

    let (first, _) = run(&t.src, &t.dst, false);
    assert_eq!(first.expect("first sync").copied.len(), 2);

    let (second, events) = run(&t.src, &t.dst, false);
    let report = second.expect("second sync");
    assert!(report.is_noop(), "second run copied: {:?}", report.copied);
    assert_eq!(report.skipped, 2);
    assert!(copied_events(&events).is_empty());
}

#[test]
fn older_destination_within_tolerance_is_skipped() {
    let t = trees();
    let now = SystemTime::now();
    write(&t.src.join("page.md"), "same");
    write(&t.dst.join("page.md"), "same");
    set_age(&t.src.join("page.md"), now);
    set_age(&t.dst.join("page.md"), now - Duration::from_secs(1));

    let (result, events) = run(&t.src, &t.dst, false);
    assert!(result.expect("sync").is_noop());
    assert!(copied_events(&events).is_empty());
}

#[test]
fn older_destination_beyond_tolerance_is_copied() {
    let t = trees();
    let now = SystemTime::now();
    write(&t.src.join("page.md"), "new!");
    write(&t.dst.join("page.md"), "old!");
    set_age(&t.src.join("page.md"), now);
    set_age(&t.dst.join("page.md"), now - Duration::from_secs(60));

    let (result, _) = run(&t.src, &t.dst, false);
    assert_eq!(result.expect("sync").copied, vec![PathBuf::from("page.md")]);
    assert_eq!(fs::read_to_string(t.dst.join("page.md")).unwrap(), "new!");
}

#[test]
fn size_change_copies_even_when_destination_is_newer() {
    let t = trees();
    let now = SystemTime::now();
    write(&t.src.join("data.json"), "{\"v\":1}");
    write(&t.dst.join("data.json"), "{\"v\":100000}");
    set_age(&t.src.join("data.json"), now - Duration::from_secs(3600));
    set_age(&t.dst.join("data.json"), now);

    let (result, _) = run(&t.src, &t.dst, false);
    assert_eq!(result.expect("sync").copied, vec![PathBuf::from("data.json")]);
    assert_eq!(fs::read_to_string(t.dst.join("data.json")).unwrap(), "{\"v\":1}");
}

#[test]
fn directory_in_place_of_file_aborts_without_force() {
    let t = trees();
    write(&t.src.join("a"), "file in source");
    write(&t.src.join("z.txt"), "later");
    write(&t.dst.join("a").join("inner.txt"), "keep me");

    let (result, events) = run(&t.src, &t.dst, false);
    match result {
        Err(SyncError::Conflict { relative, .. }) => assert_eq!(relative, PathBuf::from("a")),
        other => panic!("expected conflict, got {other:?}"),
    }
    assert!(t.dst.join("a").is_dir());
    assert_eq!(
        fs::read_to_string(t.dst.join("a").join("inner.txt")).unwrap(),
        "keep me"
    );
    assert!(!t.dst.join("z.txt").exists(), "no file after the conflict may be copied");
    assert!(copied_events(&events).is_empty());
}

#[test]
fn conflict_error_names_the_path() {
    let t = trees();
    write(&t.src.join("docs"), "file");
    fs::create_dir_all(t.dst.join("docs")).unwrap();

    let (result, _) = run(&t.src, &t.dst, false);
    let err = result.unwrap_err();
    assert!(err.is_conflict());
    assert!(err.to_string().contains("conflict at path docs"), "got: {err}");
}

#[test]
fn force_replaces_directory_with_file() {
    let t = trees();
    write(&t.src.join("a"), "file in source");
    write(&t.dst.join("a").join("inner.txt"), "doomed");

    let (result, events) = run(&t.src, &t.dst, true);
    let report = result.expect("forced sync");
    assert_eq!(report.replaced, vec![PathBuf::from("a")]);
    assert_eq!(report.copied, vec![PathBuf::from("a")]);
    assert!(t.dst.join("a").is_file());
    assert_eq!(fs::read_to_string(t.dst.join("a")).unwrap(), "file in source");
    assert!(events.contains(&StatusEvent::Replaced {
        relative: PathBuf::from("a")
    }));
}

#[test]
fn file_in_place_of_directory_is_an_ancestor_conflict() {
    let t = trees();
    write(&t.src.join("site").join("index.html"), "index");
    write(&t.dst.join("site"), "stale file");

    let (result, _) = run(&t.src, &t.dst, false);
    match result {
        Err(SyncError::Conflict { relative, .. }) => assert_eq!(relative, PathBuf::from("site")),
        other => panic!("expected conflict, got {other:?}"),
    }

    let (forced, _) = run(&t.src, &t.dst, true);
    let report = forced.expect("forced sync");
    assert_eq!(report.replaced, vec![PathBuf::from("site")]);
    assert_eq!(
        fs::read_to_string(t.dst.join("site").join("index.html")).unwrap(),
        "index"
    );
}

#[test]
fn destination_root_that_is_a_file_is_a_conflict() {
    let t = trees();
    write(&t.src.join("a.txt"), "a");
    fs::remove_dir_all(&t.dst).unwrap();
    fs::write(&t.dst, "not a directory").unwrap();

    let (result, events) = run(&t.src, &t.dst, false);
    match result {
        Err(SyncError::Conflict {
            relative,
            destination,
        }) => {
            assert_eq!(relative, PathBuf::new());
            assert_eq!(destination, t.dst);
        }
        other => panic!("expected conflict, got {other:?}"),
    }
    assert!(t.dst.is_file(), "conflict must leave the destination alone");
    assert!(copied_events(&events).is_empty());

    let (forced, events) = run(&t.src, &t.dst, true);
    let report = forced.expect("forced sync");
    assert_eq!(report.replaced, vec![PathBuf::from(".")]);
    assert_eq!(report.copied, vec![PathBuf::from("a.txt")]);
    assert_eq!(fs::read_to_string(t.dst.join("a.txt")).unwrap(), "a");
    assert!(events.contains(&StatusEvent::Replaced {
        relative: PathBuf::from(".")
    }));
}

#[test]
fn root_conflict_message_names_the_root() {
    let t = trees();
    write(&t.src.join("a.txt"), "a");
    fs::remove_dir_all(&t.dst).unwrap();
    fs::write(&t.dst, "x").unwrap();

    let err = sync(&t.src, &t.dst, &SyncOptions::default(), &StatusBus::detached()).unwrap_err();
    assert!(err.is_conflict());
    assert!(err.to_string().starts_with("conflict at path .:"), "got: {err}");

    let entries = plan(&t.src, &t.dst, &SyncOptions::force(true)).expect("plan");
    assert_eq!(entries[0].action, PlanAction::Replace { at: PathBuf::new() });
}

#[test]
fn missing_source_is_a_noop() {
    let t = trees();
    let (result, events) = run(&t.src.join("nope"), &t.dst, false);
    assert!(result.expect("sync").is_noop());
    assert!(events.is_empty());
}

#[test]
fn existing_extra_destination_files_are_left_alone() {
    let t = trees();
    write(&t.src.join("a.txt"), "a");
    write(&t.dst.join("only-here.txt"), "keep");

    let (result, _) = run(&t.src, &t.dst, false);
    result.expect("sync");
    assert_eq!(fs::read_to_string(t.dst.join("only-here.txt")).unwrap(), "keep");
}

#[test]
fn empty_source_directories_are_not_created() {
    let t = trees();
    fs::create_dir_all(t.src.join("empty").join("deeper")).unwrap();

    let (result, _) = run(&t.src, &t.dst, false);
    assert!(result.expect("sync").is_noop());
    assert!(!t.dst.join("empty").exists());
}

#[test]
fn plan_classifies_without_writing() {
    let t = trees();
    let now = SystemTime::now();
    write(&t.src.join("new.txt"), "n");
    write(&t.src.join("same.txt"), "s");
    write(&t.dst.join("same.txt"), "s");
    set_age(&t.src.join("same.txt"), now - Duration::from_secs(100));
    set_age(&t.dst.join("same.txt"), now);
    write(&t.src.join("clash"), "c");
    fs::create_dir_all(t.dst.join("clash")).unwrap();

    let entries = plan(&t.src, &t.dst, &SyncOptions::default()).expect("plan");
    let actions: Vec<(PathBuf, PlanAction)> = entries
        .into_iter()
        .map(|e| (e.relative_path, e.action))
        .collect();
    assert_eq!(
        actions,
        vec![
            (
                PathBuf::from("clash"),
                PlanAction::Conflict {
                    at: PathBuf::from("clash")
                }
            ),
            (PathBuf::from("new.txt"), PlanAction::Copy(CopyReason::Missing)),
            (PathBuf::from("same.txt"), PlanAction::Skip),
        ]
    );
    assert!(!t.dst.join("new.txt").exists(), "plan must not write");
    assert!(t.dst.join("clash").is_dir(), "plan must not remove");

    let forced = plan(&t.src, &t.dst, &SyncOptions::force(true)).expect("plan");
    assert!(matches!(forced[0].action, PlanAction::Replace { .. }));
}

#[cfg(unix)]
#[test]
fn symlinked_file_is_copied_as_content_and_dir_link_skipped() {
    use std::os::unix::fs::symlink;

    let t = trees();
    write(&t.src.join("real.txt"), "target content");
    symlink(t.src.join("real.txt"), t.src.join("link.txt")).unwrap();
    fs::create_dir_all(t.src.join("realdir")).unwrap();
    symlink(t.src.join("realdir"), t.src.join("linkdir")).unwrap();
    symlink(t.src.join("missing"), t.src.join("dangling")).unwrap();

    let (result, _) = run(&t.src, &t.dst, false);
    let report = result.expect("sync");
    assert_eq!(
        report.copied,
        vec![PathBuf::from("link.txt"), PathBuf::from("real.txt")]
    );
    let link_meta = fs::symlink_metadata(t.dst.join("link.txt")).unwrap();
    assert!(link_meta.is_file(), "destination gets a regular file");
    assert_eq!(
        fs::read_to_string(t.dst.join("link.txt")).unwrap(),
        "target content"
    );
    assert!(!t.dst.join("linkdir").exists());
    assert!(!t.dst.join("dangling").exists());
}

#[cfg(unix)]
#[test]
fn destination_symlink_is_replaced_not_written_through() {
    use std::os::unix::fs::symlink;

    let t = trees();
    let outside = t._root.path().join("outside");
    fs::create_dir_all(&outside).unwrap();
    write(&t.src.join("dangling.txt"), "inside");
    write(&t.src.join("live.txt"), "new content");
    write(&outside.join("live-target.txt"), "old");
    symlink(outside.join("nowhere.txt"), t.dst.join("dangling.txt")).unwrap();
    symlink(outside.join("live-target.txt"), t.dst.join("live.txt")).unwrap();

    let (result, _) = run(&t.src, &t.dst, false);
    let report = result.expect("sync");
    assert_eq!(
        report.copied,
        vec![PathBuf::from("dangling.txt"), PathBuf::from("live.txt")]
    );

    assert!(!outside.join("nowhere.txt").exists(), "write escaped the destination");
    assert_eq!(
        fs::read_to_string(outside.join("live-target.txt")).unwrap(),
        "old"
    );
    for name in ["dangling.txt", "live.txt"] {
        let meta = fs::symlink_metadata(t.dst.join(name)).unwrap();
        assert!(meta.file_type().is_file(), "{name} should be a regular file");
    }
    assert_eq!(
        fs::read_to_string(t.dst.join("live.txt")).unwrap(),
        "new content"
    );
}

#[cfg(unix)]
#[test]
fn unreadable_source_file_aborts_with_io_error() {
    use std::os::unix::fs::PermissionsExt;

    let t = trees();
    let locked = t.src.join("locked.txt");
    write(&locked, "secret");
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

    // Root ignores permission bits; nothing to assert there.
    if fs::File::open(&locked).is_ok() {
        return;
    }

    let (result, _) = run(&t.src, &t.dst, false);
    match result {
        Err(SyncError::Io { path, .. }) => assert!(path.ends_with("locked.txt")),
        other => panic!("expected io error, got {other:?}"),
    }

    fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();
}
