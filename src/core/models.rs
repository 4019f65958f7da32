use std::collections::HashMap;

use serde::Deserialize;

/// An outline block in the graph that carries a cloze pattern property.
///
/// Read-only to the sync engine except for the one-time persistence of its
/// own uuid as an `id` property.
#[derive(Debug, Clone)]
pub struct SourceItem {
    pub uuid: String,
    pub content: String,
    pub cloze_spec: String,
    pub page_id: Option<u64>,
    pub has_persisted_id: bool,
}

/// Page attributes relevant to card placement. `deck` and `tags` are
/// optional properties on the page; the accessors apply the defaults.
#[derive(Debug, Clone, Default)]
pub struct PageInfo {
    pub original_name: String,
    pub deck: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl PageInfo {
    pub fn deck(&self) -> &str {
        self.deck.as_deref().unwrap_or("Default")
    }

    pub fn tags(&self) -> &[String] {
        self.tags.as_deref().unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphInfo {
    pub name: String,
    pub path: String,
}

impl GraphInfo {
    /// Model owning every card synced from this graph.
    pub fn model_name(&self) -> String {
        format!("{}Model", self.name)
    }
}

/// Field map for a remote card. `extra` is currently always empty but kept
/// as a field so existing notes keep their schema.
#[derive(Debug, Clone)]
pub struct NoteFields {
    pub uuid: String,
    pub text: String,
    pub extra: String,
    pub breadcrumb: String,
}

impl NoteFields {
    pub fn to_map(&self) -> HashMap<String, String> {
        HashMap::from([
            ("uuid".to_string(), self.uuid.clone()),
            ("Text".to_string(), self.text.clone()),
            ("Extra".to_string(), self.extra.clone()),
            ("Breadcrumb".to_string(), self.breadcrumb.clone()),
        ])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageLevel {
    Success,
    Warning,
    Error,
}

impl MessageLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageLevel::Success => "success",
            MessageLevel::Warning => "warning",
            MessageLevel::Error => "error",
        }
    }
}

/// Outcome counters for one sync run. Partial completion is expected; the
/// report carries it instead of any rollback.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub failed_created: usize,
    pub failed_updated: usize,
    pub failed_deleted: usize,
    pub failed_items: Vec<String>,
}

impl SyncReport {
    pub fn has_failures(&self) -> bool {
        self.failed_created > 0 || self.failed_updated > 0 || self.failed_deleted > 0
    }

    pub fn severity(&self) -> MessageLevel {
        if self.has_failures() {
            MessageLevel::Warning
        } else {
            MessageLevel::Success
        }
    }

    pub fn summary(&self) -> String {
        let mut summary = format!(
            "Sync Completed! Created Blocks: {} Updated Blocks: {} Deleted Blocks: {} ",
            self.created, self.updated, self.deleted
        );
        if self.failed_created > 0 {
            summary.push_str(&format!("Failed Created Blocks: {} ", self.failed_created));
        }
        if self.failed_updated > 0 {
            summary.push_str(&format!("Failed Updated Blocks: {} ", self.failed_updated));
        }
        if self.failed_deleted > 0 {
            summary.push_str(&format!("Failed Deleted Blocks: {} ", self.failed_deleted));
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_defaults_apply_when_properties_missing() {
        let page = PageInfo::default();
        assert_eq!(page.deck(), "Default");
        assert!(page.tags().is_empty());

        let page = PageInfo {
            original_name: "Analysis".to_string(),
            deck: Some("Math".to_string()),
            tags: Some(vec!["proofs".to_string()]),
        };
        assert_eq!(page.deck(), "Math");
        assert_eq!(page.tags(), ["proofs".to_string()]);
    }

    #[test]
    fn report_severity_escalates_on_any_failure() {
        let mut report = SyncReport { created: 2, ..Default::default() };
        assert_eq!(report.severity(), MessageLevel::Success);
        assert!(!report.summary().contains("Failed"));

        report.failed_deleted = 1;
        assert_eq!(report.severity(), MessageLevel::Warning);
        assert!(report.summary().contains("Failed Deleted Blocks: 1"));
    }
}
