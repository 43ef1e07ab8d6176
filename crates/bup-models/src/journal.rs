//! Publish journal record.

use serde::{Deserialize, Serialize};

use crate::route::CdnConfig;

/// Journal file name used when `logName` is not configured.
pub const DEFAULT_JOURNAL_NAME: &str = "wp.previous.json";

/// Record of what one run published, driving the next run's cleanup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishJournal {
    /// Route configuration(s) the files were published with
    pub cdn: CdnConfig,
    /// Successfully uploaded file names, in settlement order
    pub files: Vec<JournalEntry>,
}

/// One published file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntry {
    pub file_name: String,
}

impl PublishJournal {
    pub fn new(cdn: CdnConfig) -> Self {
        Self {
            cdn,
            files: Vec::new(),
        }
    }

    pub fn push(&mut self, file_name: impl Into<String>) {
        self.files.push(JournalEntry {
            file_name: file_name.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Recorded file names in order.
    pub fn file_names(&self) -> Vec<String> {
        self.files.iter().map(|f| f.file_name.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendKind;
    use crate::route::RouteConfig;

    #[test]
    fn test_journal_wire_format() {
        let mut journal = PublishJournal::new(RouteConfig::new(BackendKind::S3).into());
        journal.push("a.js");
        journal.push("css/b.css");

        let value = serde_json::to_value(&journal).unwrap();
        assert_eq!(value["cdn"]["type"], "s3");
        assert_eq!(value["files"][0]["fileName"], "a.js");
        assert_eq!(value["files"][1]["fileName"], "css/b.css");
    }

    #[test]
    fn test_journal_rejects_missing_files() {
        let parsed = serde_json::from_str::<PublishJournal>(r#"{"cdn":{"type":"s3"}}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_journal_multi_route_parse() {
        let json = r#"{"cdn":[{"type":"s3","test":"/\\.js$/"}],"files":[{"fileName":"a.js"}]}"#;
        let journal: PublishJournal = serde_json::from_str(json).unwrap();
        assert!(journal.cdn.is_multiple());
        assert_eq!(journal.file_names(), vec!["a.js".to_string()]);
    }
}
