//! Tour attachments — semantic id → selectors, applied to the live surface
//! before a tour starts so anchors can refer to stable ids.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::surface::Surface;
use crate::error::ConfigError;

static SEMANTIC_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z][a-z0-9]*(?:[-_][a-z0-9]+)*$").expect("valid semantic id pattern")
});

/// Ordered table of semantic ids and the selectors that may match them.
#[derive(Debug, Clone, Default)]
pub struct TourAttachments {
    entries: Vec<(String, Vec<String>)>,
}

/// What an `apply` pass managed to tag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttachmentReport {
    /// Semantic id → number of elements tagged.
    pub attached: BTreeMap<String, usize>,
    /// Ids with no matching element right now.
    pub missing: Vec<String>,
}

impl TourAttachments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry. Selectors are tried in order; all matches are tagged.
    pub fn attach(
        mut self,
        semantic_id: &str,
        selectors: &[&str],
    ) -> Result<Self, ConfigError> {
        if !SEMANTIC_ID.is_match(semantic_id) {
            return Err(ConfigError::InvalidSemanticId(semantic_id.to_string()));
        }
        self.entries.push((
            semantic_id.to_string(),
            selectors.iter().map(|s| s.to_string()).collect(),
        ));
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Tag matching elements. Safe to call repeatedly; elements mounted after
    /// the first pass are picked up by the next one.
    pub fn apply(&self, surface: &dyn Surface) -> AttachmentReport {
        let mut report = AttachmentReport::default();
        for (id, selectors) in &self.entries {
            let tagged: usize = selectors
                .iter()
                .map(|selector| surface.annotate(selector, id))
                .sum();
            if tagged == 0 {
                debug!(semantic_id = %id, "No element matched tour attachment");
                report.missing.push(id.clone());
            } else {
                report.attached.insert(id.clone(), tagged);
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::geometry::{Rect, Size};
    use crate::locator::surface::VirtualSurface;
    use crate::step::Anchor;

    #[test]
    fn rejects_malformed_ids() {
        assert!(TourAttachments::new().attach("Primary Action", &["#x"]).is_err());
        assert!(TourAttachments::new().attach("-lead", &["#x"]).is_err());
        assert!(TourAttachments::new().attach("primary-action", &["#x"]).is_ok());
        assert!(TourAttachments::new().attach("bestie_list2", &["#x"]).is_ok());
    }

    #[test]
    fn apply_tags_any_matching_selector() {
        let surface = VirtualSurface::new(Size::new(1200.0, 800.0));
        surface.mount(&[".fab"], Rect::new(700.0, 1100.0, 56.0, 56.0));

        let table = TourAttachments::new()
            .attach("primary-action", &["#create-checkin", ".fab"])
            .unwrap()
            .attach("bestie-list", &["#besties"])
            .unwrap();

        let report = table.apply(&surface);
        assert_eq!(report.attached.get("primary-action"), Some(&1));
        assert_eq!(report.missing, vec!["bestie-list".to_string()]);
        assert!(surface.locate(&Anchor::attachment("primary-action")).is_some());
    }
}
