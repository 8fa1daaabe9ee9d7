use serde::ser::{Serialize, SerializeMap, Serializer};

use tmj_core::{Section, SectionNumbers};

/// Extraction results for every processed file, in command-line order.
pub struct Report {
    files: Vec<(String, SectionNumbers)>,
    sections: Vec<Section>,
}

impl Report {
    /// An empty `sections` list selects every section.
    pub fn new(sections: &[Section]) -> Self {
        let sections = if sections.is_empty() {
            Section::ALL.to_vec()
        } else {
            Section::ALL
                .into_iter()
                .filter(|s| sections.contains(s))
                .collect()
        };
        Self {
            files: Vec::new(),
            sections,
        }
    }

    pub fn push(&mut self, file: String, numbers: SectionNumbers) {
        self.files.push((file, numbers));
    }

    pub fn render(&self, pretty: bool) -> serde_json::Result<String> {
        if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        }
    }
}

struct FileEntry<'a> {
    numbers: &'a SectionNumbers,
    sections: &'a [Section],
}

impl Serialize for FileEntry<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.sections.len()))?;
        for section in self.sections {
            map.serialize_entry(section.as_str(), self.numbers.get(*section))?;
        }
        map.end()
    }
}

impl Serialize for Report {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.files.len()))?;
        for (file, numbers) in &self.files {
            let entry = FileEntry {
                numbers,
                sections: &self.sections,
            };
            map.serialize_entry(file, &entry)?;
        }
        map.end()
    }
}
