//! Applies parsed commands to the page
//!
//! The executor only touches the page and the field enumerator. Everything
//! that concerns the session (wake mode, highlights that expire, UI
//! broadcasts) is returned as [`Effect`]s for the assistant to apply.

use std::time::Duration;

use super::Command;
use crate::events::UiEvent;
use crate::format::{format_field_value, normalize_field_name};
use crate::page::{ElementId, ElementKind, FieldEnumerator, FieldEvent, Page, match_option};

/// Scroll distance of one scroll command
const SCROLL_STEP: f64 = 300.0;

const FILL_HIGHLIGHT: Duration = Duration::from_millis(1500);
const CLEAR_HIGHLIGHT: Duration = Duration::from_millis(1000);
const DROPDOWN_HIGHLIGHT: Duration = Duration::from_millis(2000);

/// Consequence of a command beyond the page itself
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Pause and wait for the wake word
    EnterWakeMode,
    /// Wait for the wake word and clear the transcript buffer
    StopListening,
    /// Fields are numbered; expect a spoken number
    AwaitNumber,
    /// The page was replaced; every handle is stale
    PageChanged,
    /// Highlight an element for a while
    Highlight {
        /// Element to highlight
        element: ElementId,
        /// How long it stays highlighted
        duration: Duration,
    },
    /// Publish to UI components
    Broadcast(UiEvent),
}

/// Executes commands against a [`Page`]
#[derive(Debug, Default)]
pub struct CommandExecutor {
    active_dropdown: Option<String>,
}

impl CommandExecutor {
    /// Create an executor with no open dropdown
    #[must_use]
    pub const fn new() -> Self {
        Self {
            active_dropdown: None,
        }
    }

    /// Forget page-specific state
    pub fn reset(&mut self) {
        self.active_dropdown = None;
    }

    /// Name of the dropdown opened by the last `open_dropdown`
    #[must_use]
    pub fn active_dropdown(&self) -> Option<&str> {
        self.active_dropdown.as_deref()
    }

    /// Run one command
    ///
    /// `text` is the utterance the command was parsed from. Failures (missing
    /// field, no matching option) are logged and produce no effects.
    pub fn execute(
        &mut self,
        text: &str,
        command: &Command,
        page: &mut dyn Page,
        enumerator: &mut FieldEnumerator,
    ) -> Vec<Effect> {
        tracing::info!(action = command.action(), text, "executing command");

        match command {
            Command::Navigate { page: name } => {
                let route = route_for(name);
                page.navigate(&route);
                vec![Effect::PageChanged, Effect::EnterWakeMode]
            }
            Command::FillField { field, value } => fill_field(page, field, value),
            Command::Fill {
                label,
                field,
                value,
            } => fill_labelled(page, label.as_deref().or(field.as_deref()), value),
            Command::ClearField { field } => clear_field(page, field),
            Command::SubmitForm => {
                if page.submit_first_form() {
                    tracing::info!(route = page.route(), "form submitted");
                    vec![Effect::EnterWakeMode]
                } else {
                    tracing::warn!(route = page.route(), "no form to submit");
                    Vec::new()
                }
            }
            Command::BookAppointment => {
                page.navigate("/Appointments");
                vec![Effect::PageChanged, Effect::EnterWakeMode]
            }
            Command::RefreshPage => {
                page.reload();
                vec![Effect::PageChanged, Effect::EnterWakeMode]
            }
            Command::StopListening => vec![Effect::StopListening],
            Command::ShowNumbers => {
                if enumerator.enumerate(page) == 0 {
                    tracing::warn!(route = page.route(), "no fields to number");
                    return vec![Effect::Broadcast(UiEvent::Error {
                        message: "No fields to number on this page".to_string(),
                    })];
                }
                vec![Effect::AwaitNumber]
            }
            Command::OpenDropdown { field } => self.open_dropdown(page, field),
            Command::SelectOption { value } => self.select_option(page, value),
            Command::DictationControl { op, area } => {
                tracing::info!(op = ?op, area = ?area, "dictation control");
                vec![Effect::Broadcast(UiEvent::Control {
                    op: op.clone(),
                    area: area.clone(),
                    text: text.to_string(),
                })]
            }
            Command::ScrollUp => {
                page.scroll_by(-SCROLL_STEP, true);
                Vec::new()
            }
            Command::ScrollDown => {
                page.scroll_by(SCROLL_STEP, true);
                Vec::new()
            }
            Command::ShowCommands => vec![Effect::Broadcast(UiEvent::CommandsPanel { visible: true })],
            Command::CloseCommands => {
                vec![Effect::Broadcast(UiEvent::CommandsPanel { visible: false })]
            }
            Command::Unknown { action } => {
                tracing::warn!(action, text, "unknown action");
                Vec::new()
            }
        }
    }

    fn open_dropdown(&mut self, page: &mut dyn Page, field: &str) -> Vec<Effect> {
        let field = normalize_field_name(field);

        let Some(id) = page.find_select(&field) else {
            tracing::warn!(field, "dropdown not found");
            return Vec::new();
        };

        if let Err(e) = page.focus(id).and_then(|()| page.dispatch(id, FieldEvent::Click)) {
            tracing::warn!(field, error = %e, "could not open dropdown");
            return Vec::new();
        }

        tracing::info!(field, "dropdown opened");
        self.active_dropdown = Some(field);
        vec![Effect::Highlight {
            element: id,
            duration: DROPDOWN_HIGHLIGHT,
        }]
    }

    fn select_option(&mut self, page: &mut dyn Page, value: &str) -> Vec<Effect> {
        let focused_select = page
            .focused()
            .filter(|&id| page.element(id).is_some_and(|e| e.kind == ElementKind::Select));
        let target = focused_select.or_else(|| {
            self.active_dropdown
                .as_deref()
                .and_then(|field| page.find_select(field))
        });

        let Some(id) = target else {
            tracing::warn!(value, "no open dropdown to select from");
            return Vec::new();
        };

        let Some(option) = page
            .element(id)
            .and_then(|e| match_option(&e.options, value))
            .cloned()
        else {
            tracing::warn!(
                value,
                available = ?page.element(id).map(|e| e.options.iter().map(|o| o.text.clone()).collect::<Vec<_>>()),
                "option not found"
            );
            return Vec::new();
        };

        let applied = page
            .set_value(id, &option.value)
            .and_then(|()| page.dispatch(id, FieldEvent::Change))
            .and_then(|()| page.dispatch(id, FieldEvent::Input));
        if let Err(e) = applied {
            tracing::warn!(error = %e, "could not select option");
            return Vec::new();
        }

        tracing::info!(option = %option.text, "option selected");
        self.active_dropdown = None;
        Vec::new()
    }
}

/// `/<Page>` with the first letter capitalized
fn route_for(page: &str) -> String {
    let page = page.trim().trim_start_matches('/');
    let mut chars = page.chars();
    chars.next().map_or_else(
        || "/".to_string(),
        |first| format!("/{}{}", first.to_uppercase(), chars.as_str()),
    )
}

/// Lowercase with whitespace runs replaced by underscores
fn snake_key(label: &str) -> String {
    label
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("_")
}

/// Find a field by its normalized name, then by its snake-cased spoken name
fn find_field(page: &dyn Page, spoken: &str) -> Option<(ElementId, String)> {
    let normalized = normalize_field_name(spoken);
    if let Some(id) = page.find_by_name(&normalized) {
        return Some((id, normalized));
    }

    let key = snake_key(spoken);
    page.find_by_name(&key).map(|id| (id, normalized))
}

/// Set a value the way a user edit would, then notify
fn write_value(page: &mut dyn Page, id: ElementId, value: &str) -> crate::Result<()> {
    let is_select = page.element(id).is_some_and(|e| e.kind == ElementKind::Select);

    if is_select {
        let option = page
            .element(id)
            .and_then(|e| match_option(&e.options, value))
            .map(|o| o.value.clone());
        match option {
            Some(option) => page.set_value(id, &option)?,
            None => tracing::warn!(value, "no option matches"),
        }
    } else {
        page.set_value(id, value)?;
    }

    for event in [FieldEvent::Input, FieldEvent::Change, FieldEvent::Blur] {
        page.dispatch(id, event)?;
    }
    Ok(())
}

fn fill_field(page: &mut dyn Page, field: &str, value: &str) -> Vec<Effect> {
    let Some((id, name)) = find_field(page, field) else {
        tracing::warn!(field, normalized = %normalize_field_name(field), "field not found");
        return Vec::new();
    };

    let value = format_field_value(&name, value);

    let written = page.focus(id).and_then(|()| write_value(page, id, &value));
    if let Err(e) = written {
        tracing::warn!(field = %name, error = %e, "fill failed");
        return Vec::new();
    }

    tracing::info!(field = %name, value, "field filled");
    vec![Effect::Highlight {
        element: id,
        duration: FILL_HIGHLIGHT,
    }]
}

fn fill_labelled(page: &mut dyn Page, label: Option<&str>, value: &str) -> Vec<Effect> {
    let label = label.unwrap_or_default().trim();
    if label.is_empty() || value.trim().is_empty() {
        tracing::warn!(label, value, "fill missing label or value");
        return Vec::new();
    }

    let key = snake_key(label);
    let lower = label.to_lowercase();
    let found = page.find_by_name(&key).or_else(|| {
        page.elements().into_iter().find(|&id| {
            page.element(id).is_some_and(|e| {
                e.kind == ElementKind::Input
                    && e.id.as_deref().is_some_and(|i| i.to_lowercase().contains(&lower))
            })
        })
    });

    let Some(id) = found else {
        tracing::warn!(label, "could not find field to fill");
        return Vec::new();
    };

    let written = write_value(page, id, value).and_then(|()| page.focus(id));
    if let Err(e) = written {
        tracing::warn!(label, error = %e, "fill failed");
        return Vec::new();
    }

    tracing::info!(label, value, "field filled");
    vec![Effect::Highlight {
        element: id,
        duration: FILL_HIGHLIGHT,
    }]
}

fn clear_field(page: &mut dyn Page, field: &str) -> Vec<Effect> {
    let Some((id, name)) = find_field(page, field) else {
        tracing::warn!(field, "field not found");
        return Vec::new();
    };

    let cleared = page
        .focus(id)
        .and_then(|()| page.set_value(id, ""))
        .and_then(|()| page.dispatch(id, FieldEvent::Input))
        .and_then(|()| page.dispatch(id, FieldEvent::Change));
    if let Err(e) = cleared {
        tracing::warn!(field = %name, error = %e, "clear failed");
        return Vec::new();
    }

    tracing::info!(field = %name, "field cleared");
    vec![Effect::Highlight {
        element: id,
        duration: CLEAR_HIGHLIGHT,
    }]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::{Document, Element, PageSpec, SelectOption};

    fn contact_page() -> Document {
        let mut doctor = Element::new(ElementKind::Select, "doctor");
        doctor.id = Some("doctor-select".to_string());
        doctor.options = vec![
            SelectOption {
                value: "smith".to_string(),
                text: "Dr. Smith".to_string(),
            },
            SelectOption {
                value: "jones".to_string(),
                text: "Dr. Jones".to_string(),
            },
        ];
        let mut first = Element::new(ElementKind::Input, "first_name");
        first.id = Some("firstName".to_string());

        Document::new(
            "/Contact",
            PageSpec {
                elements: vec![
                    Element::new(ElementKind::Input, "name"),
                    Element::new(ElementKind::Input, "email"),
                    Element::new(ElementKind::Input, "time"),
                    first,
                    doctor,
                    Element::new(ElementKind::Textarea, "notes"),
                ],
                forms: 1,
            },
        )
    }

    fn run(doc: &mut Document, command: Command) -> Vec<Effect> {
        let mut executor = CommandExecutor::new();
        let mut enumerator = FieldEnumerator::new();
        executor.execute("", &command, doc, &mut enumerator)
    }

    #[test]
    fn test_fill_field_formats_and_notifies() {
        let mut doc = contact_page();
        let effects = run(
            &mut doc,
            Command::FillField {
                field: "e-mail".to_string(),
                value: "tejas at google".to_string(),
            },
        );

        let id = doc.find_by_name("email").unwrap();
        assert_eq!(doc.value_of("email").as_deref(), Some("tejas@gmail.com"));
        assert_eq!(doc.focused(), Some(id));
        assert_eq!(
            effects,
            vec![Effect::Highlight {
                element: id,
                duration: FILL_HIGHLIGHT
            }]
        );

        let kinds: Vec<FieldEvent> = doc.events().iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![FieldEvent::Input, FieldEvent::Change, FieldEvent::Blur]);
    }

    #[test]
    fn test_fill_field_time_and_missing() {
        let mut doc = contact_page();
        run(
            &mut doc,
            Command::FillField {
                field: "appointment time".to_string(),
                value: "2 pm".to_string(),
            },
        );
        assert_eq!(doc.value_of("time").as_deref(), Some("14:00"));

        let effects = run(
            &mut doc,
            Command::FillField {
                field: "favourite colour".to_string(),
                value: "blue".to_string(),
            },
        );
        assert!(effects.is_empty());
    }

    #[test]
    fn test_fill_by_label() {
        let mut doc = contact_page();
        run(
            &mut doc,
            Command::Fill {
                label: Some("First Name".to_string()),
                field: None,
                value: "Ada".to_string(),
            },
        );
        assert_eq!(doc.value_of("first_name").as_deref(), Some("Ada"));

        let effects = run(
            &mut doc,
            Command::Fill {
                label: None,
                field: None,
                value: "Ada".to_string(),
            },
        );
        assert!(effects.is_empty());
    }

    #[test]
    fn test_clear_field() {
        let mut doc = contact_page();
        let id = doc.find_by_name("notes").unwrap();
        doc.set_value(id, "old").unwrap();

        let effects = run(
            &mut doc,
            Command::ClearField {
                field: "comments".to_string(),
            },
        );
        assert_eq!(doc.value_of("notes").as_deref(), Some(""));
        assert_eq!(
            effects,
            vec![Effect::Highlight {
                element: id,
                duration: CLEAR_HIGHLIGHT
            }]
        );
    }

    #[test]
    fn test_navigation_enters_wake_mode() {
        let mut doc = contact_page();
        let effects = run(
            &mut doc,
            Command::Navigate {
                page: "appointments".to_string(),
            },
        );
        assert_eq!(doc.route(), "/Appointments");
        assert_eq!(effects, vec![Effect::PageChanged, Effect::EnterWakeMode]);
    }

    #[test]
    fn test_submit_form() {
        let mut doc = contact_page();
        assert_eq!(run(&mut doc, Command::SubmitForm), vec![Effect::EnterWakeMode]);
        assert_eq!(doc.submissions(), 1);

        let mut empty = Document::new("/", PageSpec::default());
        assert!(run(&mut empty, Command::SubmitForm).is_empty());
    }

    #[test]
    fn test_dropdown_then_option() {
        let mut doc = contact_page();
        let mut executor = CommandExecutor::new();
        let mut enumerator = FieldEnumerator::new();

        let effects = executor.execute(
            "open doctor dropdown",
            &Command::OpenDropdown {
                field: "physician".to_string(),
            },
            &mut doc,
            &mut enumerator,
        );
        assert_eq!(effects.len(), 1);
        assert_eq!(executor.active_dropdown(), Some("doctor"));

        executor.execute(
            "jones",
            &Command::SelectOption {
                value: "jones".to_string(),
            },
            &mut doc,
            &mut enumerator,
        );
        assert_eq!(doc.value_of("doctor").as_deref(), Some("jones"));
        assert_eq!(executor.active_dropdown(), None);
    }

    #[test]
    fn test_show_numbers() {
        let mut doc = contact_page();
        let mut executor = CommandExecutor::new();
        let mut enumerator = FieldEnumerator::new();

        let effects = executor.execute("show numbers", &Command::ShowNumbers, &mut doc, &mut enumerator);
        assert_eq!(effects, vec![Effect::AwaitNumber]);
        assert_eq!(enumerator.numbers().len(), 6);

        let mut empty = Document::new("/", PageSpec::default());
        let effects = executor.execute("show numbers", &Command::ShowNumbers, &mut empty, &mut enumerator);
        assert!(matches!(effects.as_slice(), [Effect::Broadcast(UiEvent::Error { .. })]));
    }

    #[test]
    fn test_scroll_and_panels() {
        let mut doc = contact_page();
        run(&mut doc, Command::ScrollDown);
        run(&mut doc, Command::ScrollDown);
        run(&mut doc, Command::ScrollUp);
        assert!((doc.scroll_offset().1 - 300.0).abs() < f64::EPSILON);

        assert_eq!(
            run(&mut doc, Command::ShowCommands),
            vec![Effect::Broadcast(UiEvent::CommandsPanel { visible: true })]
        );
    }

    #[test]
    fn test_route_for() {
        assert_eq!(route_for("appointments"), "/Appointments");
        assert_eq!(route_for("/contact"), "/Contact");
        assert_eq!(route_for(""), "/");
    }
}
