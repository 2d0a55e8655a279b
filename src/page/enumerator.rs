//! Numbered field badges
//!
//! `show numbers` overlays a 1-based badge on every visible, enabled input so
//! the user can pick a field by saying its number. The number map is a
//! snapshot of handles; it is never re-queried and is cleared on navigation.

use std::collections::BTreeMap;

use serde::Serialize;

use super::{ElementId, ElementKind, FieldEvent, Page, match_option};
use crate::Result;

/// Minimum badge offset from the page edge
const BADGE_MARGIN: f64 = 4.0;

/// A rendered number badge
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Badge {
    /// Spoken number
    pub number: u32,
    /// Element it labels
    pub element: ElementId,
    /// Left position in page coordinates
    pub x: f64,
    /// Top position in page coordinates
    pub y: f64,
    /// Chosen for dictation
    pub selected: bool,
}

/// Assigns numbers to fields and resolves spoken numbers
#[derive(Debug, Default)]
pub struct FieldEnumerator {
    numbers: BTreeMap<u32, ElementId>,
    selected: Option<u32>,
    tracking_layout: bool,
}

impl FieldEnumerator {
    /// Create an empty enumerator
    #[must_use]
    pub const fn new() -> Self {
        Self {
            numbers: BTreeMap::new(),
            selected: None,
            tracking_layout: false,
        }
    }

    /// Number every enumerable field and render badges
    ///
    /// Returns how many fields were numbered.
    pub fn enumerate(&mut self, page: &mut dyn Page) -> usize {
        self.clear(page);

        let mut number = 1;
        for id in page.elements() {
            if page.element(id).is_some_and(super::Element::is_enumerable) {
                self.numbers.insert(number, id);
                number += 1;
            }
        }

        self.tracking_layout = true;
        self.render(page);

        tracing::info!(fields = self.numbers.len(), "fields numbered");
        self.numbers.len()
    }

    /// Resolve a spoken number to its field
    ///
    /// On success all other badges are removed, the chosen badge is marked,
    /// and the field is focused.
    pub fn select_by_number(&mut self, page: &mut dyn Page, number: u32) -> Option<ElementId> {
        let Some(&id) = self.numbers.get(&number) else {
            tracing::warn!(
                number,
                available = ?self.numbers.keys().collect::<Vec<_>>(),
                "no field for number"
            );
            return None;
        };

        if let Err(e) = page.focus(id) {
            tracing::warn!(number, error = %e, "numbered field is gone");
            return None;
        }

        self.selected = Some(number);
        self.render(page);

        tracing::info!(
            number,
            field = page.element(id).and_then(super::Element::label).unwrap_or("?"),
            "field selected for dictation"
        );
        Some(id)
    }

    /// Remove all badges and forget the numbering
    pub fn clear(&mut self, page: &mut dyn Page) {
        let had_badges = !self.numbers.is_empty();

        self.numbers.clear();
        self.selected = None;
        self.tracking_layout = false;

        if had_badges {
            page.render_badges(&[]);
        }
    }

    /// Realign badges after scroll or resize
    pub fn reposition(&self, page: &mut dyn Page) {
        if self.tracking_layout {
            self.render(page);
        }
    }

    /// Whether badges are currently shown
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.numbers.is_empty()
    }

    /// Current number map
    #[must_use]
    pub const fn numbers(&self) -> &BTreeMap<u32, ElementId> {
        &self.numbers
    }

    fn render(&self, page: &mut dyn Page) {
        let (scroll_x, scroll_y) = page.scroll_offset();

        let badges: Vec<Badge> = self
            .numbers
            .iter()
            .filter(|(n, _)| self.selected.is_none_or(|s| s == **n))
            .filter_map(|(&number, &element)| {
                let rect = page.bounding_rect(element)?;
                Some(Badge {
                    number,
                    element,
                    x: (rect.x + scroll_x).max(BADGE_MARGIN),
                    y: (rect.y + scroll_y).max(BADGE_MARGIN),
                    selected: self.selected == Some(number),
                })
            })
            .collect();

        page.render_badges(&badges);
    }
}

/// Commit dictated text into a field
///
/// Selects use the fuzzy option match; other fields receive the text as-is.
/// Dispatches input, change and blur.
///
/// # Errors
///
/// Returns error if the handle is stale
pub fn apply_dictation(page: &mut dyn Page, target: ElementId, text: &str) -> Result<()> {
    let element = page
        .element(target)
        .ok_or_else(|| crate::Error::Page("dictation target is gone".to_string()))?;

    let value = if element.kind == ElementKind::Select {
        match match_option(&element.options, text) {
            Some(opt) => opt.value.clone(),
            None => {
                tracing::warn!(text, "no option matches dictation");
                return Ok(());
            }
        }
    } else {
        text.to_string()
    };

    page.set_value(target, &value)?;
    for event in [FieldEvent::Input, FieldEvent::Change, FieldEvent::Blur] {
        page.dispatch(target, event)?;
    }

    tracing::info!(value, "dictation applied");
    Ok(())
}
