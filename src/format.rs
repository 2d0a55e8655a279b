//! Field name normalization and spoken-value formatting
//!
//! The parse service returns field names the way the user said them ("doctor's
//! name", "e-mail") and values as raw speech ("tejas at google", "2 pm").
//! These helpers turn both into what a form expects.

use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;

/// Canonical field names and the phrases that refer to them, in match order
const FIELD_SYNONYMS: &[(&str, &[&str])] = &[
    (
        "doctor",
        &[
            "dr",
            "dr.",
            "doctor",
            "doctors name",
            "doctor name",
            "doc",
            "physician",
        ],
    ),
    ("name", &["name", "your name", "patient name", "full name"]),
    ("email", &["email", "e-mail", "email address", "mail"]),
    (
        "phone",
        &[
            "phone",
            "telephone",
            "mobile",
            "cell",
            "number",
            "contact number",
        ],
    ),
    ("date", &["date", "appointment date", "day"]),
    ("time", &["time", "appointment time", "hour"]),
    ("address", &["address", "street address", "location"]),
    ("city", &["city", "town"]),
    ("state", &["state", "province"]),
    ("zip", &["zip", "zip code", "postal code", "postcode"]),
    ("reason", &["reason", "reason for visit", "purpose"]),
    ("notes", &["notes", "comments", "remarks", "additional notes"]),
];

/// Spoken mail providers and their domains
const EMAIL_DOMAINS: &[(&str, &str)] = &[
    ("google", "gmail.com"),
    ("gmail", "gmail.com"),
    ("yahoo", "yahoo.com"),
    ("outlook", "outlook.com"),
    ("hotmail", "hotmail.com"),
    ("proton", "protonmail.com"),
    ("icloud", "icloud.com"),
    ("harris", "harriscomputer.com"),
    ("bizmatics", "bizmatics.com"),
];

static SPOKEN_AT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(.+?)\s+at\s+(.+?)$").expect("valid regex"));

static SPOKEN_DOT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s+dot\s+").expect("valid regex"));

static ORDINAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(\d{1,2})(st|nd|rd|th)\b").expect("valid regex"));

static TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d{1,2})(?::(\d{2}))?\s*(a\.?\s*m\.?|p\.?\s*m\.?)?").expect("valid regex")
});

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%m/%d/%Y",
    "%m-%d-%Y",
    "%d %B %Y",
    "%B %d %Y",
    "%d %b %Y",
    "%b %d %Y",
];

/// Lowercase words of `text`, split on anything that is not alphanumeric
fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn contains_phrase(haystack: &[String], phrase: &[String]) -> bool {
    !phrase.is_empty() && haystack.windows(phrase.len()).any(|w| w == phrase)
}

/// Map a spoken field name onto its canonical form
///
/// Synonyms match as whole words, so "email address" is `email` and
/// "doctor's name" is `doctor`. Unknown names are lowercased with
/// non-alphanumerics removed.
#[must_use]
pub fn normalize_field_name(field: &str) -> String {
    let heard = words(&field.replace('\'', ""));

    for (canonical, synonyms) in FIELD_SYNONYMS {
        if synonyms
            .iter()
            .any(|s| contains_phrase(&heard, &words(s)))
        {
            return (*canonical).to_string();
        }
    }

    heard.concat()
}

/// Format a spoken value for the field it is going into
#[must_use]
pub fn format_field_value(field: &str, value: &str) -> String {
    let value = value.trim();
    let key: String = field
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect::<String>()
        .to_lowercase();

    match key.as_str() {
        "email" | "emailaddress" => format_email(value),
        "date" | "appointmentdate" => format_date(value).unwrap_or_else(|| value.to_string()),
        "time" | "appointmenttime" => format_time(value).unwrap_or_else(|| title_case(value)),
        _ => title_case(value),
    }
}

fn domain_for(provider: &str) -> Option<&'static str> {
    EMAIL_DOMAINS
        .iter()
        .find(|(name, _)| *name == provider)
        .map(|(_, domain)| *domain)
}

/// Turn dictated speech into an email address
///
/// The spoken name keeps its case; only the domain is lowercased.
#[must_use]
pub fn format_email(spoken: &str) -> String {
    if let Some(caps) = SPOKEN_AT.captures(spoken) {
        let name: String = caps[1].split_whitespace().collect();
        let provider = SPOKEN_DOT
            .replace_all(&caps[2], ".")
            .split_whitespace()
            .collect::<String>()
            .to_lowercase();

        let domain = if provider.contains('.') {
            provider
        } else {
            domain_for(&provider).map_or_else(|| format!("{provider}.com"), str::to_string)
        };
        return format!("{name}@{domain}");
    }

    let parts: Vec<&str> = spoken.split_whitespace().collect();
    if let [name, provider] = parts.as_slice() {
        if let Some(domain) = domain_for(&provider.to_lowercase()) {
            return format!("{name}@{domain}");
        }
    }

    spoken
        .split_whitespace()
        .map(|w| match w.to_lowercase().as_str() {
            "at" => "@".to_string(),
            "dot" => ".".to_string(),
            "dash" => "-".to_string(),
            "underscore" => "_".to_string(),
            other => other.to_string(),
        })
        .collect()
}

/// Parse a spoken date into `YYYY-MM-DD`
///
/// Accepts numeric forms and month names with optional ordinals ("march 5th
/// 2025", "the 5th of march"). A missing year means the current one.
#[must_use]
pub fn format_date(spoken: &str) -> Option<String> {
    let cleaned = ORDINAL.replace_all(spoken, "$1").replace(',', " ");
    let cleaned: Vec<&str> = cleaned
        .split_whitespace()
        .filter(|w| !w.eq_ignore_ascii_case("of") && !w.eq_ignore_ascii_case("the"))
        .collect();
    let cleaned = cleaned.join(" ");

    let parse = |text: &str| {
        DATE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
    };

    let date = parse(&cleaned).or_else(|| {
        let year = chrono::Local::now().year();
        parse(&format!("{cleaned} {year}"))
    })?;

    Some(date.format("%Y-%m-%d").to_string())
}

/// Parse a spoken time into 24-hour `HH:MM`
#[must_use]
pub fn format_time(spoken: &str) -> Option<String> {
    let caps = TIME.captures(spoken)?;

    let mut hours: u32 = caps[1].parse().ok()?;
    let minutes: u32 = caps.get(2).map_or(Ok(0), |m| m.as_str().parse()).ok()?;

    if let Some(meridiem) = caps.get(3) {
        let pm = meridiem.as_str().to_lowercase().starts_with('p');
        if pm && hours < 12 {
            hours += 12;
        } else if !pm && hours == 12 {
            hours = 0;
        }
    }

    if hours > 23 || minutes > 59 {
        return None;
    }
    Some(format!("{hours:02}:{minutes:02}"))
}

/// Capitalize each space-separated word
#[must_use]
pub fn title_case(text: &str) -> String {
    text.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect()
            })
        })
        .collect::<Vec<_>>()
        .join(" ")
}
