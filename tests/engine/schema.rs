//! Result schemas: construction shaping and drift detection.

use crate::common::*;
use std::collections::BTreeMap;

fn map_of(pairs: &[(&str, &str)]) -> FileCollection {
    FileCollection::Map(
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<BTreeMap<_, _>>(),
    )
}

#[test]
fn unregistered_result_type_is_rejected() {
    let t = TestRepo::new();
    let err =
        ResultRecord::new(&t.repo, "x", "nonexistent", FileCollection::Scalar("r1".into()))
            .unwrap_err();
    assert!(matches!(err, Error::TypeNotFound(_)));
}

#[test]
fn list_arity_is_enforced_at_construction() {
    let t = TestRepo::new();
    t.saved_file("r1", "data/r1.fastq");

    let err = ResultRecord::new(
        &t.repo,
        "short",
        "reads",
        FileCollection::List(vec!["r1".into()]),
    )
    .unwrap_err();
    assert!(matches!(err, Error::SchemaMismatch { .. }));
}

#[test]
fn unresolvable_file_token_is_rejected() {
    let t = TestRepo::new();
    let err = ResultRecord::new(
        &t.repo,
        "x",
        "summary",
        FileCollection::Scalar("ghost".into()),
    )
    .unwrap_err();
    assert!(err.is_no_such_record());
}

#[test]
fn lenient_map_drops_unknown_keys() {
    let t = TestRepo::new();
    t.saved_file("a", "data/a.fastq");
    t.saved_file("b", "data/b.fastq");
    t.saved_file("c", "data/c.fastq");

    let result = t
        .repo
        .with_write(|repo| {
            let mut result = ResultRecord::new(
                repo,
                "pair",
                "paired",
                map_of(&[("r1", "a"), ("r2", "b"), ("extra", "c")]),
            )?;
            result.save(false)
        })
        .unwrap();

    match result.files() {
        FileCollection::Map(m) => {
            assert_eq!(m.len(), 2);
            assert!(!m.contains_key("extra"));
        }
        other => panic!("expected map collection, got {other}"),
    }
    assert!(result.valid_status());
}

#[test]
fn strict_map_rejects_unknown_keys() {
    let t = TestRepo::new();
    t.saved_file("a", "data/a.fastq");

    let err = ResultRecord::new_strict(&t.repo, "pair", "paired", map_of(&[("bogus", "a")]))
        .unwrap_err();
    assert!(matches!(err, Error::SchemaMismatch { .. }));
}

#[test]
fn partial_map_constructs_but_is_invalid() {
    let t = TestRepo::new();
    t.saved_file("a", "data/a.fastq");

    // Construction allows a subset of the declared keys; validity
    // requires the full key-set, so the draft reports drift and the
    // pre-write check refuses to store it.
    let draft = ResultRecord::new(&t.repo, "pair", "paired", map_of(&[("r1", "a")])).unwrap();
    let status = draft.detailed_status();
    assert!(!status.ok);
    assert!(status.message.starts_with("schema_drift:"));

    let err = t
        .repo
        .with_write(|repo| {
            let mut draft =
                ResultRecord::new(repo, "pair", "paired", map_of(&[("r1", "a")]))?;
            draft.save(false)
        })
        .unwrap_err();
    assert!(matches!(err, Error::InvalidRecordState(_)));
}

#[test]
fn scalar_schema_holds_a_single_reference() {
    let t = TestRepo::new();
    let report = t.saved_file_of("run-report", "reports/run.pdf", "report");

    let result = t
        .repo
        .with_write(|repo| {
            let mut result = ResultRecord::new(
                repo,
                "summary-1",
                "summary",
                FileCollection::Scalar("run-report".into()),
            )?;
            result.save(false)
        })
        .unwrap();

    assert_eq!(
        result.files().keys(),
        vec![report.key().unwrap().as_str()]
    );
    assert!(result.valid_status());
}

#[test]
fn file_references_are_stored_as_keys_and_survive_rename() {
    let t = TestRepo::new();
    let result = t.saved_reads_result("assembly");

    t.repo
        .with_write(|repo| {
            let mut file = repo.files().get("assembly-r1")?;
            file.rename("assembly-r1-renamed")?;
            Ok(())
        })
        .unwrap();

    let reloaded = t.repo.results().get(result.key().unwrap()).unwrap();
    assert!(reloaded.valid_status());
    let names: Vec<String> = reloaded
        .file_records()
        .unwrap()
        .iter()
        .map(|f| f.name().to_string())
        .collect();
    assert!(names.contains(&"assembly-r1-renamed".to_string()));
}

#[test]
fn replacing_a_schema_invalidates_existing_results() {
    let t = TestRepo::new();
    let result = t.saved_reads_result("assembly");
    assert!(result.valid_status());

    // Re-registering `reads` with a different shape is an upsert; rows
    // saved under the old shape now report drift.
    t.repo
        .with_write(|repo| {
            repo.add_result_schema("reads", ResultSchema::Scalar("fastq".into()))
        })
        .unwrap();

    let reloaded = t.repo.results().get("assembly").unwrap();
    let status = reloaded.detailed_status();
    assert!(!status.ok);
    assert!(status.message.starts_with("schema_drift:"));
}
