use regex::{Regex, RegexBuilder};
use thiserror::Error;

use tmj_core::config_file::ExtractionConfig;

/// Default shortest digit run treated as a registration/application number.
pub const DEFAULT_MIN_DIGITS: usize = 5;

#[derive(Error, Debug)]
pub enum ExtractorConfigError {
    #[error("invalid {field} pattern: {source}")]
    InvalidPattern {
        field: &'static str,
        #[source]
        source: regex::Error,
    },
    #[error("min_digits must be at least 1")]
    ZeroMinDigits,
}

/// Configuration for the section extractor.
///
/// Marker fields are `Option<Regex>`; `None` means "use the built-in marker".
/// Use [`ExtractorConfigBuilder`] to construct with string patterns.
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// Line marker that opens the corrigenda section.
    pub(crate) corrigenda_marker_re: Option<Regex>,
    /// Line marker that opens the renewal section and closes corrigenda.
    pub(crate) renewal_marker_re: Option<Regex>,
    /// Line marker that opens the PR section.
    pub(crate) pr_marker_re: Option<Regex>,
    pub(crate) min_digits: usize,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            corrigenda_marker_re: None,
            renewal_marker_re: None,
            pr_marker_re: None,
            min_digits: DEFAULT_MIN_DIGITS,
        }
    }
}

impl ExtractorConfig {
    pub fn min_digits(&self) -> usize {
        self.min_digits
    }
}

/// Builder for [`ExtractorConfig`].
///
/// Marker patterns are compiled case-insensitively in [`build()`](Self::build),
/// matching the built-in markers. Fails fast if any pattern is invalid.
#[derive(Debug, Clone, Default)]
pub struct ExtractorConfigBuilder {
    corrigenda_marker: Option<String>,
    renewal_marker: Option<String>,
    pr_marker: Option<String>,
    min_digits: Option<usize>,
}

impl ExtractorConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a builder from the `[extraction]` table of a config file.
    pub fn from_config_file(config: &ExtractionConfig) -> Self {
        Self {
            corrigenda_marker: config.corrigenda_marker.clone(),
            renewal_marker: config.renewal_marker.clone(),
            pr_marker: config.pr_marker.clone(),
            min_digits: config.min_digits,
        }
    }

    pub fn corrigenda_marker(mut self, pattern: &str) -> Self {
        self.corrigenda_marker = Some(pattern.to_string());
        self
    }

    pub fn renewal_marker(mut self, pattern: &str) -> Self {
        self.renewal_marker = Some(pattern.to_string());
        self
    }

    pub fn pr_marker(mut self, pattern: &str) -> Self {
        self.pr_marker = Some(pattern.to_string());
        self
    }

    pub fn min_digits(mut self, min_digits: usize) -> Self {
        self.min_digits = Some(min_digits);
        self
    }

    pub fn build(self) -> Result<ExtractorConfig, ExtractorConfigError> {
        let min_digits = self.min_digits.unwrap_or(DEFAULT_MIN_DIGITS);
        if min_digits == 0 {
            return Err(ExtractorConfigError::ZeroMinDigits);
        }

        Ok(ExtractorConfig {
            corrigenda_marker_re: compile_marker("corrigenda_marker", self.corrigenda_marker)?,
            renewal_marker_re: compile_marker("renewal_marker", self.renewal_marker)?,
            pr_marker_re: compile_marker("pr_marker", self.pr_marker)?,
            min_digits,
        })
    }
}

fn compile_marker(
    field: &'static str,
    pattern: Option<String>,
) -> Result<Option<Regex>, ExtractorConfigError> {
    pattern
        .map(|p| {
            RegexBuilder::new(&p)
                .case_insensitive(true)
                .build()
                .map_err(|source| ExtractorConfigError::InvalidPattern { field, source })
        })
        .transpose()
}
