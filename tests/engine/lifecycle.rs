//! Record lifecycle: save outcomes, rename, sessions, persistence.

use crate::common::*;

// ============================================================================
// Repo open and discover
// ============================================================================

#[test]
fn init_twice_is_rejected() {
    let t = TestRepo::new();
    let err = Repo::init(t.dir.path()).unwrap_err();
    assert!(matches!(err, Error::RepoAlreadyExists(_)));
}

#[test]
fn open_without_marker_fails() {
    let dir = tempfile::tempdir().unwrap();
    let err = Repo::open(dir.path()).unwrap_err();
    assert!(matches!(err, Error::NoRepoFound(_)));
}

#[test]
fn discover_walks_up_from_nested_dir() {
    let t = TestRepo::new();
    let nested = t.dir.path().join("a/b/c");
    std::fs::create_dir_all(&nested).unwrap();

    let found = Repo::discover(&nested).unwrap();
    assert_eq!(found.store_id(), t.repo.store_id());
}

#[test]
fn discover_outside_any_repo_fails() {
    let dir = tempfile::tempdir().unwrap();
    let err = Repo::discover(dir.path()).unwrap_err();
    assert!(matches!(err, Error::NoRepoFound(_)));
}

// ============================================================================
// Save outcomes
// ============================================================================

#[test]
fn first_save_assigns_generated_key() {
    let t = TestRepo::new();
    let file = t.saved_file("r1", "data/r1.fastq");

    let key = file.key().expect("saved record must hold a key");
    assert_eq!(key.as_str().len(), 20);
    assert!(key
        .as_str()
        .bytes()
        .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit()));
    assert!(t.repo.files().exists("r1").unwrap());
}

#[test]
fn save_outside_session_is_rejected() {
    let t = TestRepo::new();
    let path = t.make_file("data/r1.fastq", b"acgt");
    let mut file = FileRecord::new(&t.repo, "r1", &path, "fastq").unwrap();

    let err = file.save(false).unwrap_err();
    assert!(err.is_read_only());
}

#[test]
fn save_without_modify_rejects_a_taken_name() {
    let t = TestRepo::new();
    t.saved_sample("s1", &[]);

    let err = t
        .repo
        .with_write(|repo| {
            let mut draft = SampleRecord::new(repo, "s1", "stool", &[])?;
            draft.save(false)
        })
        .unwrap_err();
    assert!(err.is_record_exists());
    assert_eq!(t.repo.samples().len(), 1);
}

#[test]
fn save_with_modify_merges_draft_into_named_row() {
    let t = TestRepo::new();
    let result = t.saved_reads_result("assembly");
    let first = t.saved_sample("s1", &[result.name()]);

    // An upsert: the stored identity persists, incoming fields win.
    let merged = t
        .repo
        .with_write(|repo| {
            let mut draft = SampleRecord::new(repo, "s1", "stool", &[])?;
            draft.metadata_mut().insert(
                "site".to_string(),
                serde_json::Value::String("gut".to_string()),
            );
            draft.save(true)
        })
        .unwrap();

    assert_eq!(merged.key(), first.key());
    assert_eq!(merged.metadata()["site"], "gut");
    assert_eq!(t.repo.samples().len(), 1);
}

#[test]
fn cross_kind_name_collision_is_rejected() {
    let t = TestRepo::new();
    t.saved_sample("shared-name", &[]);

    let path = t.make_file("data/x.fastq", b"acgt");
    let err = t
        .repo
        .with_write(|repo| {
            let mut file = FileRecord::new(repo, "shared-name", &path, "fastq")?;
            file.save(false)
        })
        .unwrap_err();
    assert!(err.is_record_exists());
}

#[test]
fn save_without_modify_rejects_a_saved_record() {
    let t = TestRepo::new();
    let sample = t.saved_sample("s1", &[]);

    let err = t
        .repo
        .with_write(|repo| {
            let mut sample = repo.samples().get(sample.key().unwrap())?;
            sample.save(false)
        })
        .unwrap_err();
    assert!(err.is_record_exists());
}

#[test]
fn invalid_record_is_never_written() {
    let t = TestRepo::new();
    let file = t.saved_file("r1", "data/r1.fastq");

    // Break the file on disk, then try to re-save a fresh handle: the
    // pre-write validity check rejects it.
    std::fs::remove_file(file.path()).unwrap();
    let err = t
        .repo
        .with_write(|repo| {
            let mut fetched = repo.files().get("r1")?;
            fetched.save(true)
        })
        .unwrap_err();
    assert!(matches!(err, Error::InvalidRecordState(_)));
}

#[test]
fn save_with_modify_persists_changes() {
    let t = TestRepo::new();
    let result = t.saved_reads_result("assembly");
    let sample = t.saved_sample("s1", &[]);
    let result_key = result.key().unwrap().as_str().to_string();

    t.repo
        .with_write(|repo| {
            let mut sample = repo.samples().get(sample.key().unwrap())?;
            sample.add_result(result.name())?;
            sample.save(true)
        })
        .unwrap();

    let stored = t.repo.samples().get("s1").unwrap();
    assert!(stored.contains_result(&result_key));
}

// ============================================================================
// Rename
// ============================================================================

#[test]
fn rename_keeps_key_and_frees_old_name() {
    let t = TestRepo::new();
    let sample = t.saved_sample("old-name", &[]);
    let key = sample.key().unwrap().clone();

    t.repo
        .with_write(|repo| {
            let mut sample = repo.samples().get("old-name")?;
            sample.rename("new-name")
        })
        .unwrap();

    assert_eq!(t.repo.resolve_key("new-name").unwrap(), key);
    assert!(t.repo.name_is_free("old-name"));
    let err = t.repo.samples().get("old-name").unwrap_err();
    assert!(err.is_no_such_record());
}

#[test]
fn rename_to_taken_name_is_rejected() {
    let t = TestRepo::new();
    t.saved_sample("s1", &[]);
    t.saved_sample("s2", &[]);

    let err = t
        .repo
        .with_write(|repo| {
            let mut sample = repo.samples().get("s1")?;
            sample.rename("s2")
        })
        .unwrap_err();
    assert!(err.is_record_exists());
}

#[test]
fn rename_before_save_is_rejected() {
    let t = TestRepo::new();
    let err = t
        .repo
        .with_write(|repo| {
            let mut sample = SampleRecord::new(repo, "draft", "stool", &[])?;
            sample.rename("other")
        })
        .unwrap_err();
    assert!(matches!(err, Error::InvalidRecordState(_)));
}

// ============================================================================
// Writable sessions
// ============================================================================

#[test]
fn session_restores_read_only_flag() {
    let t = TestRepo::new();
    assert!(t.repo.is_read_only());
    t.repo
        .with_write(|repo| {
            assert!(!repo.is_read_only());
            Ok(())
        })
        .unwrap();
    assert!(t.repo.is_read_only());
}

#[test]
fn session_restores_flag_on_error_path() {
    let t = TestRepo::new();
    let err: Result<()> = t
        .repo
        .with_write(|repo| repo.samples().get("missing").map(|_| ()));
    assert!(err.is_err());
    assert!(t.repo.is_read_only());
}

#[test]
fn mutation_outside_session_is_rejected() {
    let t = TestRepo::new();
    let err = t.repo.add_sample_type("soil").unwrap_err();
    assert!(err.is_read_only());
}

// ============================================================================
// Persistence
// ============================================================================

#[test]
fn records_and_registries_survive_reopen() {
    let t = TestRepo::new();
    let result = t.saved_reads_result("assembly");
    t.saved_sample("s1", &[result.name()]);

    let reopened = Repo::open(t.dir.path()).unwrap();
    assert_eq!(reopened.store_id(), t.repo.store_id());
    assert_eq!(reopened.sample_types(), vec!["stool".to_string()]);
    assert!(reopened.result_schema("reads").is_ok());

    let sample = reopened.samples().get("s1").unwrap();
    assert_eq!(sample.results().len(), 1);
    let file = reopened.files().get("assembly-r1").unwrap();
    assert!(file.valid_status());
}

#[test]
fn delete_removes_row_and_frees_name() {
    let t = TestRepo::new();
    let sample = t.saved_sample("s1", &[]);

    t.repo
        .with_write(|_| {
            let fetched = t.repo.samples().get("s1")?;
            fetched.atomic_delete()
        })
        .unwrap();

    assert!(t.repo.name_is_free("s1"));
    assert!(t.repo.key_is_free(sample.key().unwrap().as_str()));
    assert_eq!(t.repo.samples().len(), 0);
}

#[test]
fn get_or_make_is_idempotent() {
    let t = TestRepo::new();

    let first = t
        .repo
        .with_write(|repo| repo.get_or_make_sample("s1", "stool"))
        .unwrap();
    let second = t
        .repo
        .with_write(|repo| repo.get_or_make_sample("s1", "stool"))
        .unwrap();

    assert_eq!(first.key(), second.key());
    assert_eq!(t.repo.samples().len(), 1);
}
