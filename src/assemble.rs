//! Result assembly for presentation
//!
//! Snippets are attached at search time; this adds the optional archive
//! summary to top results. A summary is a sidecar file next to the source
//! archive (`{archive_path}.summary.md`). A missing or empty sidecar is
//! not an error - the field is simply absent.

use std::path::PathBuf;

use crate::search::SearchResult;

/// A search result plus its optional archive summary
#[derive(Debug)]
pub struct AssembledResult {
    pub result: SearchResult,
    pub summary: Option<String>,
}

/// Attach archive summaries to results, where a sidecar file exists
pub fn attach_summaries(results: Vec<SearchResult>) -> Vec<AssembledResult> {
    results
        .into_iter()
        .map(|result| {
            let summary = read_summary(&result.exchange.archive_path);
            AssembledResult { result, summary }
        })
        .collect()
}

fn read_summary(archive_path: &str) -> Option<String> {
    let sidecar = PathBuf::from(format!("{}.summary.md", archive_path));
    std::fs::read_to_string(sidecar)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Exchange;
    use tempfile::TempDir;

    fn result_for(archive_path: &str) -> SearchResult {
        SearchResult {
            exchange: Exchange {
                id: "e1".to_string(),
                project: "demo".to_string(),
                timestamp: "2025-01-01T00:00:00".to_string(),
                user_message: "message".to_string(),
                assistant_message: "reply".to_string(),
                archive_path: archive_path.to_string(),
                line_start: 1,
                line_end: 5,
                tool_calls: vec![],
            },
            similarity: Some(0.8),
            snippet: "message".to_string(),
        }
    }

    #[test]
    fn missing_sidecar_is_not_an_error() {
        let assembled = attach_summaries(vec![result_for("/nonexistent/archive.jsonl")]);
        assert_eq!(assembled.len(), 1);
        assert!(assembled[0].summary.is_none());
    }

    #[test]
    fn sidecar_summary_is_attached() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("session.jsonl");
        std::fs::write(&archive, "{}").unwrap();
        std::fs::write(
            temp.path().join("session.jsonl.summary.md"),
            "Debugged the deploy pipeline.\n",
        )
        .unwrap();

        let assembled = attach_summaries(vec![result_for(archive.to_str().unwrap())]);
        assert_eq!(
            assembled[0].summary.as_deref(),
            Some("Debugged the deploy pipeline.")
        );
    }

    #[test]
    fn empty_sidecar_yields_no_summary() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("session.jsonl");
        std::fs::write(temp.path().join("session.jsonl.summary.md"), "  \n").unwrap();

        let assembled = attach_summaries(vec![result_for(archive.to_str().unwrap())]);
        assert!(assembled[0].summary.is_none());
    }
}
