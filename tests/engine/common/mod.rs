//! Shared test utilities for the engine suite.
//!
//! Import via `mod common;` from the suite's main.rs.

#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;
use std::sync::Once;
use tempfile::TempDir;

pub use specimen::prelude::*;

static INIT_TRACING: Once = Once::new();

fn ensure_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    });
}

/// A throwaway store with the standard test registries loaded:
///
/// - sample type `stool`
/// - file types `fastq`, `bam`, and `report` (extension `pdf`)
/// - result schemas `reads` (list of two fastq), `paired` (map with
///   keys `r1`/`r2`), `summary` (scalar report)
pub struct TestRepo {
    pub dir: TempDir,
    pub repo: Repo,
}

impl TestRepo {
    pub fn new() -> Self {
        ensure_tracing();
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let repo = Repo::init(dir.path()).expect("failed to initialize repo");
        repo.with_write(|repo| {
            repo.add_sample_type("stool")?;
            repo.add_file_type("fastq")?;
            repo.add_file_type("bam")?;
            repo.add_file_type_ext("report", "pdf")?;
            repo.add_result_schema(
                "reads",
                ResultSchema::List(vec!["fastq".into(), "fastq".into()]),
            )?;
            repo.add_result_schema(
                "paired",
                ResultSchema::Map(
                    [
                        ("r1".to_string(), "fastq".to_string()),
                        ("r2".to_string(), "fastq".to_string()),
                    ]
                    .into_iter()
                    .collect(),
                ),
            )?;
            repo.add_result_schema("summary", ResultSchema::Scalar("report".into()))?;
            Ok(())
        })
        .expect("failed to register test types");
        TestRepo { dir, repo }
    }

    /// Write a file under the repo base and return its absolute path.
    pub fn make_file(&self, rel: &str, content: &[u8]) -> PathBuf {
        let path = self.dir.path().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("failed to create parent dirs");
        }
        fs::write(&path, content).expect("failed to write test file");
        path
    }

    /// Create, register, and save a fastq file record in one step.
    pub fn saved_file(&self, name: &str, rel: &str) -> FileRecord {
        self.saved_file_of(name, rel, "fastq")
    }

    /// Like [`TestRepo::saved_file`] with an explicit file type.
    pub fn saved_file_of(&self, name: &str, rel: &str, file_type: &str) -> FileRecord {
        let path = self.make_file(rel, format!("content of {name}\n").as_bytes());
        self.repo
            .with_write(|repo| {
                let mut file = FileRecord::new(repo, name, &path, file_type)?;
                file.save(false)
            })
            .expect("failed to save file record")
    }

    /// A saved `reads` result over two fresh fastq files.
    pub fn saved_reads_result(&self, name: &str) -> ResultRecord {
        let f1 = self.saved_file(&format!("{name}-r1"), &format!("data/{name}-r1.fastq"));
        let f2 = self.saved_file(&format!("{name}-r2"), &format!("data/{name}-r2.fastq"));
        self.repo
            .with_write(|repo| {
                let mut result = ResultRecord::new(
                    repo,
                    name,
                    "reads",
                    FileCollection::List(vec![
                        f1.name().to_string(),
                        f2.name().to_string(),
                    ]),
                )?;
                result.save(false)
            })
            .expect("failed to save result record")
    }

    /// A saved sample of type `stool` linked to the given results.
    pub fn saved_sample(&self, name: &str, results: &[&str]) -> SampleRecord {
        self.repo
            .with_write(|repo| {
                let mut sample = SampleRecord::new(repo, name, "stool", results)?;
                sample.save(false)
            })
            .expect("failed to save sample record")
    }
}
