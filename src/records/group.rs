//! Sample groups: recursive groupings of samples, results, and subgroups
//!
//! Groups form the top of the reference DAG. A group may hold direct
//! samples, direct results, and subgroups. Every walk over the subgroup
//! closure — the flattening traversals, the display tree, and the
//! validity check — carries a visited set, so all of them terminate even
//! on a store whose groups form a cycle. Direct self-reference is
//! rejected at link time and flagged by the validity check; longer
//! cycles are tolerated structurally.

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use specimen_core::{Error, KindTag, Metadata, RecordKey, RecordRef, Result, Status};
use std::collections::BTreeSet;
use std::fmt;

use crate::record::{Record, RecordCore};
use crate::records::{ResultRecord, SampleRecord};
use crate::repo::Repo;

/// A recursive grouping of samples, results, and subgroups
#[derive(Debug, Clone)]
pub struct SampleGroupRecord {
    core: RecordCore,
    subgroups: BTreeSet<String>,
    direct_samples: BTreeSet<String>,
    direct_results: BTreeSet<String>,
}

#[derive(Serialize, Deserialize)]
struct GroupRow {
    primary_key: Option<String>,
    name: String,
    #[serde(default)]
    metadata: Metadata,
    #[serde(default)]
    subgroups: BTreeSet<String>,
    #[serde(default)]
    direct_samples: BTreeSet<String>,
    #[serde(default)]
    direct_results: BTreeSet<String>,
}

impl SampleGroupRecord {
    /// Build an empty group. A group with no members is valid.
    pub fn new(repo: &Repo, name: &str) -> Self {
        SampleGroupRecord {
            core: RecordCore::new(repo, name),
            subgroups: BTreeSet::new(),
            direct_samples: BTreeSet::new(),
            direct_results: BTreeSet::new(),
        }
    }

    /// Keys of the direct subgroups.
    pub fn subgroups(&self) -> &BTreeSet<String> {
        &self.subgroups
    }

    /// Keys of the directly held samples.
    pub fn direct_samples(&self) -> &BTreeSet<String> {
        &self.direct_samples
    }

    /// Keys of the directly held results.
    pub fn direct_results(&self) -> &BTreeSet<String> {
        &self.direct_results
    }

    /// Link a stored group as a subgroup. A group cannot contain itself.
    pub fn add_subgroup(&mut self, token: impl Into<RecordRef>) -> Result<()> {
        let key = self.core.repo.resolve_key(token)?;
        if self.core.key.as_ref() == Some(&key) {
            return Err(Error::InvalidRecordState(format!(
                "group_references_itself:{}",
                self.core.name
            )));
        }
        if !self.core.repo.groups().exists(&key)? {
            return Err(Error::NoSuchRecord(key.to_string()));
        }
        self.subgroups.insert(key.as_str().to_string());
        self.core.status = OnceCell::new();
        Ok(())
    }

    /// Link a stored sample directly to this group.
    pub fn add_sample(&mut self, token: impl Into<RecordRef>) -> Result<()> {
        let key = self.core.repo.resolve_key(token)?;
        if !self.core.repo.samples().exists(&key)? {
            return Err(Error::NoSuchRecord(key.to_string()));
        }
        self.direct_samples.insert(key.as_str().to_string());
        self.core.status = OnceCell::new();
        Ok(())
    }

    /// Link a stored result directly to this group.
    pub fn add_result(&mut self, token: impl Into<RecordRef>) -> Result<()> {
        let key = self.core.repo.resolve_key(token)?;
        if !self.core.repo.results().exists(&key)? {
            return Err(Error::NoSuchRecord(key.to_string()));
        }
        self.direct_results.insert(key.as_str().to_string());
        self.core.status = OnceCell::new();
        Ok(())
    }

    /// Every sample in this group's subgroup closure, deduplicated.
    pub fn all_samples(&self) -> Result<Vec<SampleRecord>> {
        let mut sample_keys = BTreeSet::new();
        let mut visited = BTreeSet::new();
        self.collect(&mut visited, &mut |group| {
            sample_keys.extend(group.direct_samples.iter().cloned());
        })?;
        let table = self.core.repo.samples();
        sample_keys
            .into_iter()
            .map(|k| table.get(RecordKey::new(k)))
            .collect()
    }

    /// Every result in this group's subgroup closure, deduplicated:
    /// direct results plus the results of every gathered sample.
    pub fn all_results(&self) -> Result<Vec<ResultRecord>> {
        let mut result_keys = BTreeSet::new();
        let mut sample_keys = BTreeSet::new();
        let mut visited = BTreeSet::new();
        self.collect(&mut visited, &mut |group| {
            result_keys.extend(group.direct_results.iter().cloned());
            sample_keys.extend(group.direct_samples.iter().cloned());
        })?;

        let samples = self.core.repo.samples();
        for key in sample_keys {
            let sample = samples.get(RecordKey::new(key))?;
            result_keys.extend(sample.results().iter().cloned());
        }
        let table = self.core.repo.results();
        result_keys
            .into_iter()
            .map(|k| table.get(RecordKey::new(k)))
            .collect()
    }

    /// Depth-first walk over the subgroup closure, self included.
    fn collect(
        &self,
        visited: &mut BTreeSet<String>,
        visit: &mut impl FnMut(&SampleGroupRecord),
    ) -> Result<()> {
        if let Some(key) = &self.core.key {
            if !visited.insert(key.as_str().to_string()) {
                return Ok(());
            }
        }
        visit(self);
        let table = self.core.repo.groups();
        for key in &self.subgroups {
            if visited.contains(key) {
                continue;
            }
            let subgroup = table.get(RecordKey::new(key.clone()))?;
            subgroup.collect(visited, visit)?;
        }
        Ok(())
    }

    /// A display tree of this group's contents, by name.
    pub fn tree(&self) -> Result<GroupTree> {
        let mut visited = BTreeSet::new();
        self.tree_inner(&mut visited)
    }

    fn tree_inner(&self, visited: &mut BTreeSet<String>) -> Result<GroupTree> {
        if let Some(key) = &self.core.key {
            if !visited.insert(key.as_str().to_string()) {
                return Ok(GroupTree::leaf(format!("{} (revisited)", self.core.name)));
            }
        }
        let repo = &self.core.repo;
        let mut nodes = Vec::new();

        if !self.direct_samples.is_empty() {
            let mut section = GroupTree::leaf("samples");
            for key in &self.direct_samples {
                section.nodes.push(GroupTree::leaf(repo.resolve_name(RecordKey::new(key.clone()))?));
            }
            nodes.push(section);
        }
        if !self.direct_results.is_empty() {
            let mut section = GroupTree::leaf("results");
            for key in &self.direct_results {
                section.nodes.push(GroupTree::leaf(repo.resolve_name(RecordKey::new(key.clone()))?));
            }
            nodes.push(section);
        }
        let table = repo.groups();
        for key in &self.subgroups {
            let subgroup = table.get(RecordKey::new(key.clone()))?;
            nodes.push(subgroup.tree_inner(visited)?);
        }

        Ok(GroupTree {
            label: self.core.name.clone(),
            nodes,
        })
    }
}

impl Record for SampleGroupRecord {
    const KIND: KindTag = KindTag::SampleGroup;

    fn from_row(repo: &Repo, row: Value) -> Result<Self> {
        let row: GroupRow = serde_json::from_value(row)?;
        Ok(SampleGroupRecord {
            core: RecordCore::from_stored(repo, row.primary_key, row.name, row.metadata),
            subgroups: row.subgroups,
            direct_samples: row.direct_samples,
            direct_results: row.direct_results,
        })
    }

    fn to_row(&self) -> Result<Value> {
        let row = GroupRow {
            primary_key: self.core.key.as_ref().map(|k| k.as_str().to_string()),
            name: self.core.name.clone(),
            metadata: self.core.metadata.clone(),
            subgroups: self.subgroups.clone(),
            direct_samples: self.direct_samples.clone(),
            direct_results: self.direct_results.clone(),
        };
        serde_json::to_value(row).map_err(Error::from)
    }

    fn core(&self) -> &RecordCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut RecordCore {
        &mut self.core
    }

    fn compute_status(&self) -> Status {
        let direct = self.direct_status();
        if !direct.ok {
            return direct;
        }

        let table = self.core.repo.groups();
        let mut visited = BTreeSet::new();
        if let Some(key) = &self.core.key {
            visited.insert(key.as_str().to_string());
        }
        let mut pending: Vec<String> = self.subgroups.iter().cloned().collect();
        while let Some(key) = pending.pop() {
            if !visited.insert(key.clone()) {
                continue;
            }
            match table.get(RecordKey::new(key.clone())) {
                Ok(subgroup) => {
                    if !subgroup.direct_status().ok {
                        return Status::fail(format!("invalid_subgroup:{key}"));
                    }
                    pending.extend(subgroup.subgroups.iter().cloned());
                }
                Err(e) if e.is_no_such_record() => {
                    return Status::fail(format!("missing_subgroup:{key}"));
                }
                Err(e) => return Status::fail(e.to_string()),
            }
        }
        Status::all_good()
    }
}

impl SampleGroupRecord {
    /// Validity of this group's own members, subgroup closure excluded.
    fn direct_status(&self) -> Status {
        if let Some(key) = &self.core.key {
            if self.subgroups.contains(key.as_str()) {
                return Status::fail(format!("group_references_itself:{}", self.core.name));
            }
        }
        let groups = self.core.repo.groups();
        for key in &self.subgroups {
            match groups.exists(RecordKey::new(key.clone())) {
                Ok(true) => {}
                Ok(false) => return Status::fail(format!("missing_subgroup:{key}")),
                Err(e) => return Status::fail(e.to_string()),
            }
        }
        let samples = self.core.repo.samples();
        for key in &self.direct_samples {
            match samples.get(RecordKey::new(key.clone())) {
                Ok(sample) => {
                    if !sample.detailed_status().ok {
                        return Status::fail(format!("invalid_sample:{key}"));
                    }
                }
                Err(e) if e.is_no_such_record() => {
                    return Status::fail(format!("missing_sample:{key}"));
                }
                Err(e) => return Status::fail(e.to_string()),
            }
        }
        let results = self.core.repo.results();
        for key in &self.direct_results {
            match results.get(RecordKey::new(key.clone())) {
                Ok(result) => {
                    if !result.detailed_status().ok {
                        return Status::fail(format!("invalid_result:{key}"));
                    }
                }
                Err(e) if e.is_no_such_record() => {
                    return Status::fail(format!("missing_result:{key}"));
                }
                Err(e) => return Status::fail(e.to_string()),
            }
        }
        Status::all_good()
    }
}

/// A printable tree of group contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupTree {
    /// Node label: a group, section, or record name
    pub label: String,
    /// Child nodes
    pub nodes: Vec<GroupTree>,
}

impl GroupTree {
    fn leaf(label: impl Into<String>) -> Self {
        GroupTree {
            label: label.into(),
            nodes: Vec::new(),
        }
    }

    fn render(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        writeln!(f, "{:indent$}{}", "", self.label, indent = depth * 2)?;
        for node in &self.nodes {
            node.render(f, depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for GroupTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.render(f, 0)
    }
}
