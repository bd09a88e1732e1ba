use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Wire-level tag accompanying a `source` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    #[default]
    File,
    Url,
    Inline,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::File => "file",
            SourceType::Url => "url",
            SourceType::Inline => "inline",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a dataset comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetSource {
    File(PathBuf),
    Url(String),
    Inline(String),
}

impl DatasetSource {
    pub fn new(source: String, source_type: SourceType) -> Self {
        match source_type {
            SourceType::File => DatasetSource::File(PathBuf::from(source)),
            SourceType::Url => DatasetSource::Url(source),
            SourceType::Inline => DatasetSource::Inline(source),
        }
    }

    pub fn source_type(&self) -> SourceType {
        match self {
            DatasetSource::File(_) => SourceType::File,
            DatasetSource::Url(_) => SourceType::Url,
            DatasetSource::Inline(_) => SourceType::Inline,
        }
    }
}
