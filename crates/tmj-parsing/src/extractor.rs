use once_cell::sync::Lazy;
use regex::Regex;
use tokio_util::sync::CancellationToken;

use tmj_core::{Section, dedup_first_seen};

use crate::config::{ExtractorConfig, ExtractorConfigError};

static CORRIGENDA_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)CORRIGENDA").unwrap());

static RENEWAL_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)FOLLOWING TRADE MARKS REGISTRATION RENEWED").unwrap()
});

static PR_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)PR SECTION").unwrap());

static DIGIT_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").unwrap());

/// A `DD/MM/YYYY` date right after an advertisement number. Matched and dropped.
static TRAILING_DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s+\d{2}/\d{2}/\d{4}").unwrap());

static NUMERIC_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+$").unwrap());

/// Number of columns in a renewal confirmation row.
const RC_COLUMNS: usize = 5;

/// Where a scan stands relative to its section's markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    BeforeMarker,
    Inside,
    AfterTerminator,
}

impl ScanState {
    fn initial(section: Section) -> Self {
        match section {
            // No markers: every line is in scope.
            Section::Advertisement | Section::Rc => ScanState::Inside,
            Section::Corrigenda | Section::Renewal | Section::PrSection => {
                ScanState::BeforeMarker
            }
        }
    }
}

/// What a single line does to the scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transition {
    /// Marker line: start (or keep) collecting, skip the line itself.
    Enter,
    /// Terminator line: stop scanning this page text.
    Terminate,
    /// Ordinary line.
    Stay,
}

/// Extracts numbers from one page of journal text, one section at a time.
///
/// All patterns are compiled when the extractor is built and reused across
/// calls; build one per process (or per configuration) and share it.
#[derive(Debug, Clone)]
pub struct SectionExtractor {
    corrigenda_marker: Regex,
    renewal_marker: Regex,
    pr_marker: Regex,
    application_no: Regex,
    pr_number: Regex,
    min_digits: usize,
}

impl Default for SectionExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl SectionExtractor {
    pub fn new() -> Self {
        Self::with_config(&ExtractorConfig::default())
            .expect("built-in extraction patterns are valid")
    }

    pub fn with_config(config: &ExtractorConfig) -> Result<Self, ExtractorConfigError> {
        let min = config.min_digits;
        let compile = |field: &'static str, pattern: String| {
            Regex::new(&pattern)
                .map_err(|source| ExtractorConfigError::InvalidPattern { field, source })
        };

        Ok(Self {
            corrigenda_marker: config
                .corrigenda_marker_re
                .clone()
                .unwrap_or_else(|| CORRIGENDA_MARKER.clone()),
            renewal_marker: config
                .renewal_marker_re
                .clone()
                .unwrap_or_else(|| RENEWAL_MARKER.clone()),
            pr_marker: config
                .pr_marker_re
                .clone()
                .unwrap_or_else(|| PR_MARKER.clone()),
            application_no: compile(
                "application_no",
                format!(r"Application No\s*:?\s*(\d{{{min},}})"),
            )?,
            pr_number: compile("pr_number", format!(r"(\d{{{min},}})\s*[-–]"))?,
            min_digits: min,
        })
    }

    pub fn min_digits(&self) -> usize {
        self.min_digits
    }

    /// Extract the numbers of `section` from one page's text.
    ///
    /// Results are deduplicated across the whole page text, first occurrence
    /// first. Returns an empty list for empty text, and as soon as `cancel` is
    /// observed (checked before the scan and before every line).
    pub fn extract(
        &self,
        page_text: &str,
        section: Section,
        cancel: &CancellationToken,
    ) -> Vec<String> {
        if cancel.is_cancelled() || page_text.is_empty() {
            return Vec::new();
        }

        let mut numbers = Vec::new();
        let mut state = ScanState::initial(section);

        for line in page_text.split('\n') {
            if cancel.is_cancelled() {
                return Vec::new();
            }

            match self.transition(section, line) {
                Transition::Enter => {
                    state = ScanState::Inside;
                    continue;
                }
                Transition::Terminate => {
                    state = ScanState::AfterTerminator;
                    break;
                }
                Transition::Stay => {}
            }

            if state == ScanState::Inside {
                self.collect(section, line, &mut numbers);
            }
        }

        tracing::trace!(section = %section, found = numbers.len(), ?state, "page scanned");
        dedup_first_seen(numbers)
    }

    fn transition(&self, section: Section, line: &str) -> Transition {
        match section {
            Section::Advertisement | Section::Rc => Transition::Stay,
            Section::Corrigenda => {
                // The opening marker is tested first.
                if self.corrigenda_marker.is_match(line) {
                    Transition::Enter
                } else if self.renewal_marker.is_match(line) {
                    Transition::Terminate
                } else {
                    Transition::Stay
                }
            }
            Section::Renewal if self.renewal_marker.is_match(line) => Transition::Enter,
            Section::PrSection if self.pr_marker.is_match(line) => Transition::Enter,
            Section::Renewal | Section::PrSection => Transition::Stay,
        }
    }

    fn collect(&self, section: Section, line: &str, out: &mut Vec<String>) {
        match section {
            Section::Advertisement => self.collect_advertisement(line, out),
            Section::Corrigenda => self.collect_digit_runs(line, out),
            Section::Rc => collect_rc_row(line, out),
            Section::Renewal => {
                self.collect_digit_runs(line, out);
                out.extend(
                    self.application_no
                        .captures_iter(line)
                        .map(|caps| caps[1].to_string()),
                );
            }
            Section::PrSection => out.extend(
                self.pr_number
                    .captures_iter(line)
                    .map(|caps| caps[1].to_string()),
            ),
        }
    }

    /// Every maximal digit run at least `min_digits` long.
    fn collect_digit_runs(&self, line: &str, out: &mut Vec<String>) {
        out.extend(
            DIGIT_RUN
                .find_iter(line)
                .map(|m| m.as_str())
                .filter(|run| self.long_enough(run))
                .map(String::from),
        );
    }

    /// Digit runs not preceded by a digit, each optionally followed by a date
    /// that is consumed but not reported. Digits glued to the end of a consumed
    /// date are therefore never a match start.
    fn collect_advertisement(&self, line: &str, out: &mut Vec<String>) {
        let mut pos = 0;
        let mut after_date = false;

        while let Some(run) = DIGIT_RUN.find_at(line, pos) {
            let glued_to_date = after_date && run.start() == pos;
            after_date = false;
            pos = run.end();

            if glued_to_date || !self.long_enough(run.as_str()) {
                continue;
            }
            out.push(run.as_str().to_string());

            if let Some(date) = TRAILING_DATE.find(&line[pos..]) {
                pos += date.end();
                after_date = true;
            }
        }
    }

    fn long_enough(&self, run: &str) -> bool {
        run.chars().count() >= self.min_digits
    }
}

/// A renewal confirmation row is exactly five all-digit columns.
fn collect_rc_row(line: &str, out: &mut Vec<String>) {
    let columns: Vec<&str> = line.split_whitespace().collect();
    if columns.len() == RC_COLUMNS && columns.iter().all(|c| NUMERIC_TOKEN.is_match(c)) {
        out.extend(columns.into_iter().map(String::from));
    }
}
