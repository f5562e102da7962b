use std::collections::BTreeSet;

use crate::error::{AnalysisError, Result};
use crate::models::{BranchEntry, CaseRecord};
use crate::source;

/// Branch to district mapping, in directory order.
#[derive(Debug, Clone, Default)]
pub struct BranchDirectory {
    entries: Vec<BranchEntry>,
}

impl BranchDirectory {
    pub fn new(entries: Vec<BranchEntry>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every district served by at least one branch.
    pub fn districts(&self) -> BTreeSet<String> {
        self.entries
            .iter()
            .map(|entry| entry.district.clone())
            .collect()
    }

    pub fn branches_in(&self, district: &str) -> Vec<&BranchEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.district == district)
            .collect()
    }

    pub fn entries_in(&self, districts: &BTreeSet<String>) -> Vec<&BranchEntry> {
        self.entries
            .iter()
            .filter(|entry| districts.contains(&entry.district))
            .collect()
    }

    /// Entries for the named branches; every entry when `names` is empty.
    /// A name given more than once is selected once.
    pub fn select(&self, names: &[String]) -> Result<Vec<&BranchEntry>> {
        if names.is_empty() {
            return Ok(self.entries.iter().collect());
        }

        let mut seen = BTreeSet::new();
        names
            .iter()
            .filter(|name| seen.insert(*name))
            .map(|name| {
                self.entries
                    .iter()
                    .find(|entry| &entry.branch == name)
                    .ok_or_else(|| AnalysisError::UnknownBranch(name.clone()))
            })
            .collect()
    }
}

pub fn districts_of(entries: &[&BranchEntry]) -> BTreeSet<String> {
    entries.iter().map(|entry| entry.district.clone()).collect()
}

/// Which branches to analyse. An empty branch list means all of them.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub state: Option<String>,
    pub branches: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ResolvedSelection {
    pub branches: Vec<BranchEntry>,
    pub districts: BTreeSet<String>,
    pub cases: Vec<CaseRecord>,
}

impl Selection {
    /// Narrows `cases` to the state and branches picked.
    ///
    /// With no explicit branches, branches whose district has no case rows
    /// are left out. An explicitly named branch without case rows is an error.
    pub fn resolve(
        &self,
        directory: &BranchDirectory,
        cases: Vec<CaseRecord>,
    ) -> Result<ResolvedSelection> {
        let cases = match &self.state {
            Some(state) => source::filter_state(cases, state),
            None => cases,
        };
        let available: BTreeSet<String> =
            cases.iter().map(|record| record.district.clone()).collect();

        let chosen = if self.branches.is_empty() {
            directory.entries_in(&available)
        } else {
            let chosen = directory.select(&self.branches)?;
            if let Some(entry) = chosen
                .iter()
                .find(|entry| !available.contains(&entry.district))
            {
                return Err(AnalysisError::MissingDistrict {
                    district: entry.district.clone(),
                });
            }
            chosen
        };

        let districts = districts_of(&chosen);
        let cases = cases
            .into_iter()
            .filter(|record| districts.contains(&record.district))
            .collect();

        Ok(ResolvedSelection {
            branches: chosen.into_iter().cloned().collect(),
            districts,
            cases,
        })
    }
}
