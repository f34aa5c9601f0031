//! Sample groups: linking, flattening, cycles, display tree.

use crate::common::*;

fn saved_group(t: &TestRepo, name: &str) -> SampleGroupRecord {
    t.repo
        .with_write(|repo| {
            let mut group = SampleGroupRecord::new(repo, name);
            group.save(false)
        })
        .unwrap()
}

#[test]
fn empty_group_is_valid() {
    let t = TestRepo::new();
    let group = saved_group(&t, "cohort");
    assert!(group.valid_status());
    assert_eq!(group.detailed_status().message, "all_good");
}

#[test]
fn linking_unknown_members_is_rejected() {
    let t = TestRepo::new();
    let err = t
        .repo
        .with_write(|repo| {
            let mut group = SampleGroupRecord::new(repo, "cohort");
            group.add_sample("ghost")
        })
        .unwrap_err();
    assert!(err.is_no_such_record());
}

#[test]
fn a_sample_is_not_a_subgroup() {
    let t = TestRepo::new();
    let sample = t.saved_sample("s1", &[]);

    let err = t
        .repo
        .with_write(|repo| {
            let mut group = SampleGroupRecord::new(repo, "cohort");
            group.add_subgroup(sample.key().unwrap())
        })
        .unwrap_err();
    assert!(err.is_no_such_record());
}

#[test]
fn group_cannot_contain_itself() {
    let t = TestRepo::new();
    saved_group(&t, "cohort");

    let err = t
        .repo
        .with_write(|repo| {
            let mut group = repo.groups().get("cohort")?;
            group.add_subgroup("cohort")
        })
        .unwrap_err();
    assert!(matches!(err, Error::InvalidRecordState(_)));
}

#[test]
fn flattening_walks_the_subgroup_closure() {
    let t = TestRepo::new();
    t.saved_sample("inner-sample", &[]);
    t.saved_sample("outer-sample", &[]);
    let result = t.saved_reads_result("assembly");
    saved_group(&t, "inner");
    saved_group(&t, "outer");

    t.repo
        .with_write(|repo| {
            let mut inner = repo.groups().get("inner")?;
            inner.add_sample("inner-sample")?;
            inner.add_result(result.name())?;
            inner.save(true)?;

            let mut outer = repo.groups().get("outer")?;
            outer.add_sample("outer-sample")?;
            outer.add_subgroup("inner")?;
            outer.save(true)?;
            Ok(())
        })
        .unwrap();

    let outer = t.repo.groups().get("outer").unwrap();
    let mut sample_names: Vec<String> = outer
        .all_samples()
        .unwrap()
        .iter()
        .map(|s| s.name().to_string())
        .collect();
    sample_names.sort();
    assert_eq!(sample_names, vec!["inner-sample", "outer-sample"]);

    let result_names: Vec<String> = outer
        .all_results()
        .unwrap()
        .iter()
        .map(|r| r.name().to_string())
        .collect();
    assert_eq!(result_names, vec!["assembly"]);
}

#[test]
fn mutual_cycle_terminates_and_stays_checkable() {
    let t = TestRepo::new();
    t.saved_sample("s1", &[]);
    saved_group(&t, "g1");
    saved_group(&t, "g2");

    t.repo
        .with_write(|repo| {
            let mut g1 = repo.groups().get("g1")?;
            g1.add_subgroup("g2")?;
            g1.add_sample("s1")?;
            g1.save(true)?;

            let mut g2 = repo.groups().get("g2")?;
            g2.add_subgroup("g1")?;
            g2.save(true)?;
            Ok(())
        })
        .unwrap();

    // Traversal and validity both terminate on the cycle.
    let g1 = t.repo.groups().get("g1").unwrap();
    assert_eq!(g1.all_samples().unwrap().len(), 1);
    assert!(g1.valid_status());

    let sweep = t.repo.check_all();
    assert!(sweep.sample_groups.values().all(|s| s.ok));
}

#[test]
fn group_with_invalid_member_is_invalid() {
    let t = TestRepo::new();
    let result = t.saved_reads_result("assembly");
    let sample = t.saved_sample("s1", &[result.name()]);
    saved_group(&t, "cohort");

    t.repo
        .with_write(|repo| {
            let mut group = repo.groups().get("cohort")?;
            group.add_sample(sample.key().unwrap())?;
            group.save(true)?;
            // Breaking the result's row leaves the sample, then the
            // group, invalid.
            repo.results().remove("assembly")
        })
        .unwrap();

    let group = t.repo.groups().get("cohort").unwrap();
    let status = group.detailed_status();
    assert!(!status.ok);
    assert!(status.message.starts_with("invalid_sample:"));
}

#[test]
fn tree_renders_sections_and_subgroups() {
    let t = TestRepo::new();
    t.saved_sample("s1", &[]);
    saved_group(&t, "inner");
    saved_group(&t, "outer");

    t.repo
        .with_write(|repo| {
            let mut inner = repo.groups().get("inner")?;
            inner.add_sample("s1")?;
            inner.save(true)?;

            let mut outer = repo.groups().get("outer")?;
            outer.add_subgroup("inner")?;
            outer.save(true)?;
            Ok(())
        })
        .unwrap();

    let tree = t.repo.groups().get("outer").unwrap().tree().unwrap();
    assert_eq!(tree.label, "outer");
    assert_eq!(tree.nodes.len(), 1);
    assert_eq!(tree.nodes[0].label, "inner");

    let rendered = tree.to_string();
    assert!(rendered.contains("samples"));
    assert!(rendered.contains("s1"));
}
