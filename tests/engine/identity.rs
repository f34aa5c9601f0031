//! Identity index behavior across kinds.

use crate::common::*;

#[test]
fn names_resolve_across_kinds() {
    let t = TestRepo::new();
    let file = t.saved_file("r1", "data/r1.fastq");
    let sample = t.saved_sample("s1", &[]);

    assert_eq!(t.repo.resolve_key("r1").unwrap(), *file.key().unwrap());
    assert_eq!(t.repo.resolve_key("s1").unwrap(), *sample.key().unwrap());
    assert_eq!(
        t.repo.resolve_name(sample.key().unwrap()).unwrap(),
        "s1"
    );
}

#[test]
fn key_token_resolves_to_itself() {
    let t = TestRepo::new();
    let sample = t.saved_sample("s1", &[]);
    let key = sample.key().unwrap().as_str().to_string();

    // A bare key string passed as a token resolves to that key.
    assert_eq!(t.repo.resolve_key(key.as_str()).unwrap().as_str(), key);
}

#[test]
fn name_shadows_key() {
    let t = TestRepo::new();
    let sample = t.saved_sample("s1", &[]);
    let sample_key = sample.key().unwrap().as_str().to_string();

    // A record whose name equals another record's key wins resolution.
    let shadow = t
        .repo
        .with_write(|repo| {
            let mut group = SampleGroupRecord::new(repo, &sample_key);
            group.save(false)
        })
        .unwrap();

    let resolved = t.repo.resolve_key(sample_key.as_str()).unwrap();
    assert_eq!(resolved, *shadow.key().unwrap());
    assert_ne!(resolved.as_str(), sample_key);

    // The shadowed sample stays reachable through its handle key.
    let fetched = t.repo.samples().get(sample.key().unwrap()).unwrap();
    assert_eq!(fetched.name(), "s1");
}

#[test]
fn unknown_token_is_no_such_record() {
    let t = TestRepo::new();
    let err = t.repo.resolve_key("ghost").unwrap_err();
    assert!(err.is_no_such_record());
}

#[test]
fn exists_is_kind_scoped() {
    let t = TestRepo::new();
    t.saved_sample("s1", &[]);

    assert!(t.repo.samples().exists("s1").unwrap());
    assert!(!t.repo.files().exists("s1").unwrap());
    assert!(!t.repo.files().exists("ghost").unwrap());
}

#[test]
fn names_are_globally_unique_not_per_kind() {
    let t = TestRepo::new();
    t.saved_sample("taken", &[]);

    let err = t
        .repo
        .with_write(|repo| {
            let mut group = SampleGroupRecord::new(repo, "taken");
            group.save(false)
        })
        .unwrap_err();
    assert!(err.is_record_exists());
}

#[test]
fn index_incorporates_unflushed_inserts() {
    let t = TestRepo::new();

    // Resolution works inside the session that created the record.
    t.repo
        .with_write(|repo| {
            let mut sample = SampleRecord::new(repo, "s1", "stool", &[])?;
            sample.save(false)?;
            assert_eq!(repo.resolve_name("s1")?, "s1");
            assert!(!repo.name_is_free("s1"));
            Ok(())
        })
        .unwrap();
}
