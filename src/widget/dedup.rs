//! Duplicate detection for incoming widgets.
//!
//! Three tiers, first match wins: shared `documentId`, shared `slug` + `name`,
//! and finally a content fingerprint over `{slug, kind, name, data length,
//! first row}`. The fingerprint catches re-exports of the same widget whose
//! identity fields were stripped or regenerated.

use super::Widget;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DuplicateReason {
    DocumentId,
    SlugName,
    ContentHash,
}

impl std::fmt::Display for DuplicateReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DocumentId => write!(f, "documentId"),
            Self::SlugName => write!(f, "slug"),
            Self::ContentHash => write!(f, "contentHash"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateMatch {
    /// Label of the widget that was already known.
    pub duplicate_of: String,
    pub reason: DuplicateReason,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateEntry {
    pub widget: Widget,
    pub duplicate_of: String,
    pub reason: DuplicateReason,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DuplicateReport {
    pub unique: Vec<Widget>,
    pub duplicates: Vec<DuplicateEntry>,
}

/// Content fingerprint: SHA-256 over the serialized identity summary.
pub fn fingerprint(widget: &Widget) -> String {
    let summary = serde_json::json!({
        "slug": widget.slug,
        "kind": widget.kind,
        "name": widget.name,
        "dataLength": widget.data.len(),
        "firstDataPoint": widget.data.first(),
    });
    let digest = Sha256::digest(summary.to_string().as_bytes());
    hex::encode(digest)
}

fn matched_label(widget: &Widget) -> String {
    widget.name.clone().unwrap_or_else(|| "unknown".into())
}

/// Lookup tables over every widget accepted so far. The first widget
/// registered under a key keeps it, mirroring a linear first-match scan.
#[derive(Debug, Default)]
pub struct DuplicateIndex {
    by_document_id: HashMap<String, String>,
    by_slug_name: HashMap<(String, Option<String>), String>,
    by_fingerprint: HashMap<String, String>,
}

impl DuplicateIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_widgets<'a>(widgets: impl IntoIterator<Item = &'a Widget>) -> Self {
        let mut index = Self::new();
        for widget in widgets {
            index.insert(widget);
        }
        index
    }

    pub fn insert(&mut self, widget: &Widget) {
        let label = matched_label(widget);
        if let Some(id) = &widget.document_id {
            self.by_document_id
                .entry(id.clone())
                .or_insert_with(|| label.clone());
        }
        if let Some(slug) = &widget.slug {
            self.by_slug_name
                .entry((slug.clone(), widget.name.clone()))
                .or_insert_with(|| label.clone());
        }
        self.by_fingerprint
            .entry(fingerprint(widget))
            .or_insert(label);
    }

    pub fn check(&self, widget: &Widget) -> Option<DuplicateMatch> {
        if let Some(of) = widget
            .document_id
            .as_ref()
            .and_then(|id| self.by_document_id.get(id))
        {
            return Some(DuplicateMatch {
                duplicate_of: of.clone(),
                reason: DuplicateReason::DocumentId,
            });
        }

        if let Some(of) = widget
            .slug
            .as_ref()
            .and_then(|slug| self.by_slug_name.get(&(slug.clone(), widget.name.clone())))
        {
            return Some(DuplicateMatch {
                duplicate_of: of.clone(),
                reason: DuplicateReason::SlugName,
            });
        }

        self.by_fingerprint
            .get(&fingerprint(widget))
            .map(|of| DuplicateMatch {
                duplicate_of: of.clone(),
                reason: DuplicateReason::ContentHash,
            })
    }
}

/// Check a single widget against a set of known widgets.
pub fn check_duplicate(widget: &Widget, existing: &[Widget]) -> Option<DuplicateMatch> {
    DuplicateIndex::from_widgets(existing).check(widget)
}

/// Split `candidates` into unique widgets and duplicates of `existing`.
///
/// Each accepted candidate joins the comparison set immediately, so two
/// identical widgets in the same batch cannot both be accepted.
pub fn filter_duplicates(candidates: Vec<Widget>, existing: &[Widget]) -> DuplicateReport {
    let mut index = DuplicateIndex::from_widgets(existing);
    filter_with_index(candidates, &mut index)
}

/// Same as [`filter_duplicates`] against a caller-maintained index.
pub fn filter_with_index(candidates: Vec<Widget>, index: &mut DuplicateIndex) -> DuplicateReport {
    let mut report = DuplicateReport::default();

    for widget in candidates {
        match index.check(&widget) {
            Some(found) => {
                debug!(
                    id = %widget.id,
                    duplicate_of = %found.duplicate_of,
                    reason = %found.reason,
                    "duplicate widget skipped"
                );
                report.duplicates.push(DuplicateEntry {
                    widget,
                    duplicate_of: found.duplicate_of,
                    reason: found.reason,
                });
            }
            None => {
                index.insert(&widget);
                report.unique.push(widget);
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::widget::normalize;
    use serde_json::json;

    fn widget(raw: serde_json::Value) -> Widget {
        normalize(&raw).unwrap().remove(0)
    }

    #[test]
    fn document_id_match_first() {
        let existing = vec![widget(json!({"documentId": "d1", "name": "Old", "kind": "bar"}))];
        let candidate = widget(json!({"documentId": "d1", "name": "Renamed", "kind": "pie"}));
        let found = check_duplicate(&candidate, &existing).unwrap();
        assert_eq!(found.reason, DuplicateReason::DocumentId);
        assert_eq!(found.duplicate_of, "Old");
    }

    #[test]
    fn slug_and_name_must_both_match() {
        let existing = vec![widget(json!({"slug": "installs", "name": "Installs", "kind": "area",
            "data": {"a": [{"x": 1}]}}))];

        let same = widget(json!({"slug": "installs", "name": "Installs", "kind": "bar"}));
        assert_eq!(
            check_duplicate(&same, &existing).unwrap().reason,
            DuplicateReason::SlugName
        );

        let other_name = widget(json!({"slug": "installs", "name": "Uninstalls", "kind": "bar"}));
        assert!(check_duplicate(&other_name, &existing).is_none());
    }

    #[test]
    fn slug_name_catches_regenerated_document_ids() {
        let a = widget(json!({"documentId": "one", "slug": "s", "name": "N", "kind": "area",
            "data": {"app": [{"date": "2024-01-01", "y": 1}, {"date": "2024-01-02", "y": 2}]}}));
        let mut c = a.clone();
        c.document_id = Some("two".into());
        c.id = "two-0".into();

        let report = filter_duplicates(vec![a, c], &[]);
        assert_eq!(report.unique.len(), 1);
        assert_eq!(report.duplicates.len(), 1);
        assert_eq!(report.duplicates[0].reason, DuplicateReason::SlugName);
    }

    #[test]
    fn structurally_identical_widgets_in_one_batch() {
        let w = widget(json!({"documentId": "x", "kind": "bar", "data": {"a": [{"v": 1}]}}));
        let mut w2 = w.clone();
        w2.document_id = Some("y".into());
        let report = filter_duplicates(vec![w, w2], &[]);
        assert_eq!(report.unique.len(), 1);
        assert_eq!(report.duplicates[0].reason, DuplicateReason::ContentHash);
    }

    #[test]
    fn existing_widgets_layered_before_batch() {
        let a = widget(json!({"documentId": "a", "name": "A", "kind": "bar"}));
        let b = widget(json!({"documentId": "b", "name": "B", "kind": "line"}));
        let report = filter_duplicates(vec![a.clone(), b.clone()], &[a]);
        assert_eq!(report.unique, vec![b]);
        assert_eq!(report.duplicates.len(), 1);
        assert_eq!(report.duplicates[0].duplicate_of, "A");
        assert_eq!(report.duplicates[0].reason, DuplicateReason::DocumentId);
    }

    #[test]
    fn anonymous_irregular_widgets_fall_through_to_hash() {
        let a = widget(json!({"kind": "table", "data": [1, "two", null]}));
        let b = widget(json!({"kind": "table", "data": [1, "two", null]}));
        let c = widget(json!({"kind": "table", "data": [1, "three", null]}));
        let report = filter_duplicates(vec![a, b, c], &[]);
        assert_eq!(report.unique.len(), 2);
        assert_eq!(report.duplicates[0].duplicate_of, "unknown");
        assert_eq!(report.duplicates[0].reason, DuplicateReason::ContentHash);
    }

    #[test]
    fn fingerprint_ignores_rows_after_the_first() {
        let a = widget(json!({"kind": "bar", "data": [{"v": 1}, {"v": 2}]}));
        let b = widget(json!({"kind": "bar", "data": [{"v": 1}, {"v": 99}]}));
        assert_eq!(fingerprint(&a), fingerprint(&b));

        let c = widget(json!({"kind": "bar", "data": [{"v": 1}]}));
        assert_ne!(fingerprint(&a), fingerprint(&c));
    }

    #[test]
    fn tables_differing_only_in_row_id_are_distinct() {
        let table = |row_id: &str| {
            widget(json!({"kind": "table", "data": [{
                "rowId": row_id,
                "columns": [{"field": "keyword", "value": "yoga"}]
            }]}))
        };
        let a = table("r-1");
        let b = table("r-2");
        assert_ne!(fingerprint(&a), fingerprint(&b));

        let report = filter_duplicates(vec![a, b], &[]);
        assert_eq!(report.unique.len(), 2);
        assert!(report.duplicates.is_empty());
    }
}
