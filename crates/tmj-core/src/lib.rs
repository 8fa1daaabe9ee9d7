use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

pub mod backend;
pub mod config_file;
pub mod task;

// Re-export for convenience
pub use backend::{BackendError, PageSource, PdfBackend};
pub use task::{DEFAULT_TASK_RETENTION, TaskError, TaskSnapshot, TaskStatus, TaskStore};

/// A named region of a trade marks journal with its own number rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    Advertisement,
    Corrigenda,
    /// Renewal confirmation tables (rows of five numbers).
    Rc,
    Renewal,
    PrSection,
}

impl Section {
    /// Every section, in processing order.
    pub const ALL: [Section; 5] = [
        Section::Advertisement,
        Section::Corrigenda,
        Section::Rc,
        Section::Renewal,
        Section::PrSection,
    ];

    /// Name used on the wire and in config files.
    pub fn as_str(self) -> &'static str {
        match self {
            Section::Advertisement => "advertisement",
            Section::Corrigenda => "corrigenda",
            Section::Rc => "rc",
            Section::Renewal => "renewal",
            Section::PrSection => "pr_section",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown section '{0}'")]
pub struct UnknownSection(pub String);

impl FromStr for Section {
    type Err = UnknownSection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Section::ALL
            .into_iter()
            .find(|section| section.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownSection(s.to_string()))
    }
}

/// Numbers found in a document, grouped by section.
///
/// Serialises as a JSON object keyed by section name, in [`Section::ALL`] order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionNumbers {
    lists: [Vec<String>; 5],
}

impl SectionNumbers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, section: Section) -> &[String] {
        &self.lists[section.index()]
    }

    /// Append numbers to a section without deduplicating.
    pub fn extend<I>(&mut self, section: Section, numbers: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.lists[section.index()].extend(numbers);
    }

    /// Drop repeated numbers in every section, keeping first occurrences.
    pub fn dedup(&mut self) {
        for list in &mut self.lists {
            *list = dedup_first_seen(std::mem::take(list));
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Section, &[String])> {
        Section::ALL
            .into_iter()
            .map(move |section| (section, self.get(section)))
    }

    /// Total count of numbers across all sections.
    pub fn total(&self) -> usize {
        self.lists.iter().map(Vec::len).sum()
    }
}

impl Serialize for SectionNumbers {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(Section::ALL.len()))?;
        for (section, numbers) in self.iter() {
            map.serialize_entry(section.as_str(), numbers)?;
        }
        map.end()
    }
}

/// Remove duplicates while keeping the first occurrence of each value.
pub fn dedup_first_seen(values: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::with_capacity(values.len());
    values
        .into_iter()
        .filter(|value| seen.insert(value.clone()))
        .collect()
}

/// Progress events emitted while a document is processed.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    SectionStarted {
        section: Section,
    },
    /// One page of one section is done. `completed` counts page×section units.
    PageProcessed {
        section: Section,
        page_index: usize,
        completed: usize,
        total: usize,
    },
}

impl ProgressEvent {
    /// Percentage of work done, if this event carries one.
    pub fn percent(&self) -> Option<f64> {
        match self {
            ProgressEvent::PageProcessed {
                completed, total, ..
            } if *total > 0 => Some(*completed as f64 / *total as f64 * 100.0),
            _ => None,
        }
    }
}
