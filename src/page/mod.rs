//! Page model
//!
//! Commands act on a [`Page`]: an arena of form elements addressed by opaque
//! [`ElementId`] handles. A handle carries the arena generation it was issued
//! in; navigation and reload bump the generation, so handles held across a page
//! transition stop resolving instead of aliasing new elements.
//!
//! [`Document`] is the in-memory implementation used by the CLI and tests. A
//! host bridging to a real browser implements [`Page`] over its own DOM.

mod enumerator;

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

pub use enumerator::{Badge, FieldEnumerator, apply_dictation};

/// Opaque handle to an element on the current page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ElementId {
    generation: u32,
    index: u32,
}

impl ElementId {
    /// Arena generation the handle was issued in
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

/// Element tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    /// `<input>`
    Input,
    /// `<textarea>`
    Textarea,
    /// `<select>`
    Select,
    /// `<button>`
    Button,
}

/// Layout box in viewport coordinates
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge
    #[serde(default)]
    pub x: f64,
    /// Top edge
    #[serde(default)]
    pub y: f64,
    /// Width
    #[serde(default)]
    pub width: f64,
    /// Height
    #[serde(default)]
    pub height: f64,
}

/// One `<option>` of a select
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    /// Submitted value
    pub value: String,
    /// Visible label
    #[serde(default)]
    pub text: String,
}

/// A form element and its current state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    /// Tag
    pub kind: ElementKind,
    /// `name` attribute
    #[serde(default)]
    pub name: Option<String>,
    /// `id` attribute
    #[serde(default)]
    pub id: Option<String>,
    /// `type` attribute of inputs
    #[serde(default, rename = "type")]
    pub input_type: Option<String>,
    /// Disabled elements are never enumerated
    #[serde(default)]
    pub disabled: bool,
    /// Computed `display: none`
    #[serde(default)]
    pub display_none: bool,
    /// Computed `visibility: hidden`
    #[serde(default)]
    pub visibility_hidden: bool,
    /// Layout box relative to the page origin
    #[serde(default = "default_rect")]
    pub rect: Rect,
    /// Current value
    #[serde(default)]
    pub value: String,
    /// Options of a select
    #[serde(default)]
    pub options: Vec<SelectOption>,
}

const fn default_rect() -> Rect {
    Rect {
        x: 0.0,
        y: 0.0,
        width: 120.0,
        height: 24.0,
    }
}

impl Element {
    /// Create an element with the given tag and name
    #[must_use]
    pub fn new(kind: ElementKind, name: &str) -> Self {
        Self {
            kind,
            name: Some(name.to_string()),
            id: None,
            input_type: None,
            disabled: false,
            display_none: false,
            visibility_hidden: false,
            rect: default_rect(),
            value: String::new(),
            options: Vec::new(),
        }
    }

    /// Input, textarea or select
    #[must_use]
    pub const fn is_input_like(&self) -> bool {
        matches!(
            self.kind,
            ElementKind::Input | ElementKind::Textarea | ElementKind::Select
        )
    }

    /// `<input type="hidden">`
    #[must_use]
    pub fn is_hidden_input(&self) -> bool {
        self.kind == ElementKind::Input
            && self
                .input_type
                .as_deref()
                .is_some_and(|t| t.eq_ignore_ascii_case("hidden"))
    }

    /// Can receive voice input: input-like, enabled, rendered and non-empty
    #[must_use]
    pub fn is_enumerable(&self) -> bool {
        self.is_input_like()
            && !self.is_hidden_input()
            && !self.disabled
            && !self.display_none
            && !self.visibility_hidden
            && !(self.rect.width <= 0.0 && self.rect.height <= 0.0)
    }

    /// Name, then id, as a display label
    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.name.as_deref().or(self.id.as_deref())
    }
}

/// Notifications dispatched after programmatic changes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldEvent {
    /// Value edited
    Input,
    /// Value committed
    Change,
    /// Focus left
    Blur,
    /// Activated (opens a select)
    Click,
}

/// A page the assistant can act on
pub trait Page: Send {
    /// Current route (e.g. "/Appointments")
    fn route(&self) -> &str;

    /// Move to another route; invalidates every handle
    fn navigate(&mut self, route: &str);

    /// Reload the current route; invalidates every handle
    fn reload(&mut self);

    /// Form elements in document order
    fn elements(&self) -> Vec<ElementId>;

    /// Resolve a handle
    fn element(&self, id: ElementId) -> Option<&Element>;

    /// Layout box in viewport coordinates
    fn bounding_rect(&self, id: ElementId) -> Option<Rect>;

    /// Current scroll offset `(x, y)`
    fn scroll_offset(&self) -> (f64, f64);

    /// Scroll the viewport vertically
    fn scroll_by(&mut self, dy: f64, smooth: bool);

    /// Set an element's value through the framework-visible setter
    ///
    /// # Errors
    ///
    /// Returns error if the handle is stale
    fn set_value(&mut self, id: ElementId, value: &str) -> Result<()>;

    /// Dispatch a notification on an element
    ///
    /// # Errors
    ///
    /// Returns error if the handle is stale
    fn dispatch(&mut self, id: ElementId, event: FieldEvent) -> Result<()>;

    /// Move focus to an element
    ///
    /// # Errors
    ///
    /// Returns error if the handle is stale
    fn focus(&mut self, id: ElementId) -> Result<()>;

    /// Currently focused element
    fn focused(&self) -> Option<ElementId>;

    /// Toggle the transient highlight on an element
    fn set_highlight(&mut self, id: ElementId, on: bool);

    /// Submit the first form; returns false when the page has none
    fn submit_first_form(&mut self) -> bool;

    /// Replace the numbered badges overlay
    fn render_badges(&mut self, badges: &[Badge]);

    /// First input-like element whose `name` equals `name`
    fn find_by_name(&self, name: &str) -> Option<ElementId> {
        self.elements().into_iter().find(|&id| {
            self.element(id)
                .is_some_and(|e| e.is_input_like() && e.name.as_deref() == Some(name))
        })
    }

    /// First select whose `name` equals `field` or whose `id` contains it
    fn find_select(&self, field: &str) -> Option<ElementId> {
        let lower = field.to_lowercase();
        let by = |pred: &dyn Fn(&Element) -> bool| {
            self.elements().into_iter().find(|&id| {
                self.element(id)
                    .is_some_and(|e| e.kind == ElementKind::Select && pred(e))
            })
        };

        by(&|e| e.name.as_deref() == Some(field)).or_else(|| {
            by(&|e| {
                e.id
                    .as_deref()
                    .is_some_and(|id| id.to_lowercase().contains(&lower))
            })
        })
    }

    /// Current value of the first input-like element named `name`
    fn value_of(&self, name: &str) -> Option<String> {
        self.find_by_name(name)
            .and_then(|id| self.element(id))
            .map(|e| e.value.clone())
    }
}

/// Fuzzy option match: case-insensitive substring in either direction
///
/// Tries the option label containing the spoken value, then the option value
/// containing it, then the spoken value containing the option value.
#[must_use]
pub fn match_option<'a>(options: &'a [SelectOption], spoken: &str) -> Option<&'a SelectOption> {
    let spoken = spoken.trim().to_lowercase();
    if spoken.is_empty() {
        return None;
    }

    options.iter().find(|opt| {
        let text = opt.text.to_lowercase();
        let value = opt.value.to_lowercase();
        (!text.is_empty() && text.contains(&spoken))
            || (!value.is_empty() && (value.contains(&spoken) || spoken.contains(&value)))
    })
}

/// Template for one route of a [`Document`]
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageSpec {
    /// Elements in document order
    #[serde(default)]
    pub elements: Vec<Element>,
    /// Number of forms on the page
    #[serde(default)]
    pub forms: usize,
}

/// A set of routes loaded from JSON
#[derive(Debug, Clone, Deserialize)]
pub struct SiteSpec {
    /// Initial route
    #[serde(default = "default_route")]
    pub start: String,
    /// Route templates
    #[serde(default)]
    pub pages: HashMap<String, PageSpec>,
}

fn default_route() -> String {
    "/".to_string()
}

/// A dispatched notification, recorded for the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DomEvent {
    /// Target element
    pub element: ElementId,
    /// Notification kind
    pub kind: FieldEvent,
}

/// In-memory page arena
#[derive(Debug)]
pub struct Document {
    site: HashMap<String, PageSpec>,
    route: String,
    generation: u32,
    elements: Vec<Element>,
    forms: usize,
    focused: Option<ElementId>,
    highlighted: HashSet<ElementId>,
    badges: Vec<Badge>,
    scroll: (f64, f64),
    events: Vec<DomEvent>,
    submissions: usize,
    reloads: usize,
}

impl Document {
    /// A single-route document
    #[must_use]
    pub fn new(route: &str, page: PageSpec) -> Self {
        let mut site = HashMap::new();
        site.insert(route.to_string(), page);
        Self::from_site(SiteSpec {
            start: route.to_string(),
            pages: site,
        })
    }

    /// A multi-route document
    #[must_use]
    pub fn from_site(site: SiteSpec) -> Self {
        let mut doc = Self {
            site: site.pages,
            route: String::new(),
            generation: 0,
            elements: Vec::new(),
            forms: 0,
            focused: None,
            highlighted: HashSet::new(),
            badges: Vec::new(),
            scroll: (0.0, 0.0),
            events: Vec::new(),
            submissions: 0,
            reloads: 0,
        };
        doc.load(&site.start);
        doc
    }

    /// Parse a [`SiteSpec`] from JSON
    ///
    /// # Errors
    ///
    /// Returns error if the JSON does not describe a site
    pub fn from_json(json: &str) -> Result<Self> {
        let site: SiteSpec = serde_json::from_str(json)?;
        Ok(Self::from_site(site))
    }

    fn load(&mut self, route: &str) {
        let spec = self.site.get(route).cloned().unwrap_or_default();

        self.route = route.to_string();
        self.generation = self.generation.wrapping_add(1);
        self.elements = spec.elements;
        self.forms = spec.forms;
        self.focused = None;
        self.highlighted.clear();
        self.badges.clear();
        self.scroll = (0.0, 0.0);

        tracing::debug!(
            route,
            elements = self.elements.len(),
            generation = self.generation,
            "page loaded"
        );
    }

    fn index(&self, id: ElementId) -> Result<usize> {
        let index = id.index as usize;
        if id.generation != self.generation || index >= self.elements.len() {
            return Err(Error::Page(format!("stale element handle {id:?}")));
        }
        Ok(index)
    }

    /// Move an element (host layout change)
    ///
    /// # Errors
    ///
    /// Returns error if the handle is stale
    pub fn set_rect(&mut self, id: ElementId, rect: Rect) -> Result<()> {
        let index = self.index(id)?;
        self.elements[index].rect = rect;
        Ok(())
    }

    /// Notifications dispatched so far
    #[must_use]
    pub fn events(&self) -> &[DomEvent] {
        &self.events
    }

    /// Badges currently rendered
    #[must_use]
    pub fn badges(&self) -> &[Badge] {
        &self.badges
    }

    /// Whether an element is highlighted
    #[must_use]
    pub fn is_highlighted(&self, id: ElementId) -> bool {
        self.highlighted.contains(&id)
    }

    /// Number of form submissions
    #[must_use]
    pub const fn submissions(&self) -> usize {
        self.submissions
    }

    /// Number of reloads
    #[must_use]
    pub const fn reloads(&self) -> usize {
        self.reloads
    }
}

impl Page for Document {
    fn route(&self) -> &str {
        &self.route
    }

    fn navigate(&mut self, route: &str) {
        tracing::info!(from = %self.route, to = route, "navigate");
        self.load(route);
    }

    fn reload(&mut self) {
        self.reloads += 1;
        let route = self.route.clone();
        self.load(&route);
    }

    fn elements(&self) -> Vec<ElementId> {
        let generation = self.generation;
        (0..self.elements.len())
            .filter_map(|i| u32::try_from(i).ok())
            .map(|index| ElementId { generation, index })
            .collect()
    }

    fn element(&self, id: ElementId) -> Option<&Element> {
        self.index(id).ok().map(|i| &self.elements[i])
    }

    fn bounding_rect(&self, id: ElementId) -> Option<Rect> {
        self.element(id).map(|e| Rect {
            x: e.rect.x - self.scroll.0,
            y: e.rect.y - self.scroll.1,
            ..e.rect
        })
    }

    fn scroll_offset(&self) -> (f64, f64) {
        self.scroll
    }

    fn scroll_by(&mut self, dy: f64, smooth: bool) {
        self.scroll.1 = (self.scroll.1 + dy).max(0.0);
        tracing::debug!(dy, smooth, y = self.scroll.1, "scrolled");
    }

    fn set_value(&mut self, id: ElementId, value: &str) -> Result<()> {
        let index = self.index(id)?;
        self.elements[index].value = value.to_string();
        Ok(())
    }

    fn dispatch(&mut self, id: ElementId, event: FieldEvent) -> Result<()> {
        self.index(id)?;
        self.events.push(DomEvent { element: id, kind: event });
        Ok(())
    }

    fn focus(&mut self, id: ElementId) -> Result<()> {
        self.index(id)?;
        self.focused = Some(id);
        Ok(())
    }

    fn focused(&self) -> Option<ElementId> {
        self.focused.filter(|&id| self.index(id).is_ok())
    }

    fn set_highlight(&mut self, id: ElementId, on: bool) {
        if self.index(id).is_err() {
            return;
        }
        if on {
            self.highlighted.insert(id);
        } else {
            self.highlighted.remove(&id);
        }
    }

    fn submit_first_form(&mut self) -> bool {
        if self.forms == 0 {
            return false;
        }
        self.submissions += 1;
        true
    }

    fn render_badges(&mut self, badges: &[Badge]) {
        self.badges = badges.to_vec();
    }
}
