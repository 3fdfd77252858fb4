//! Work and chapter records as supplied by the metadata client.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A work being archived. Immutable for the duration of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Work {
    pub id: u64,
    pub title: String,
    /// Free text, may carry BBCode/HTML markup.
    #[serde(default)]
    pub description: String,
    /// Number of chapters the caller intends to register.
    pub chapter_count: usize,
}

/// One chapter of a work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterRecord {
    pub id: u64,
    /// Volume number; an empty or missing volume is volume 0.
    #[serde(default, deserialize_with = "deserialize_volume")]
    pub volume: u32,
    pub chapter: ChapterNumber,
    #[serde(default, deserialize_with = "deserialize_title")]
    pub title: Option<String>,
    #[serde(default)]
    pub groups: Vec<String>,
    /// Page reference strings, in reading order.
    #[serde(default)]
    pub pages: Vec<String>,
    /// Prefix joined with each page reference to form its URL.
    pub page_base_url: String,
    #[serde(default)]
    pub language: String,
    /// Upload time as a unix timestamp.
    #[serde(default)]
    pub uploaded_at: Option<i64>,
}

impl ChapterRecord {
    /// Full URL of a page reference.
    #[must_use]
    pub fn page_url(&self, page_ref: &str) -> String {
        format!("{}{page_ref}", self.page_base_url)
    }

    /// Manifest ordering: volume, then chapter number.
    #[must_use]
    pub fn sort_key(&self) -> (u32, &ChapterNumber) {
        (self.volume, &self.chapter)
    }
}

/// A chapter number such as `12`, `7.1`, or the letter-coded `7x1`.
///
/// The first `x` and the first `p` are read as a `.` separator, and the
/// number splits at the first `.` into a primary and an optional secondary
/// part.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChapterNumber {
    raw: String,
    primary: String,
    secondary: Option<String>,
}

impl ChapterNumber {
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        let normalized = raw.replacen('x', ".", 1).replacen('p', ".", 1);
        let (primary, secondary) = match normalized.split_once('.') {
            Some((primary, secondary)) => (primary.to_string(), Some(secondary.to_string())),
            None => (normalized, None),
        };
        Self {
            raw: raw.to_string(),
            primary,
            secondary,
        }
    }

    /// The number exactly as supplied.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    #[must_use]
    pub fn primary(&self) -> &str {
        &self.primary
    }

    /// Secondary part; `Some("")` for a dangling separator such as `7.`.
    #[must_use]
    pub fn secondary(&self) -> Option<&str> {
        self.secondary.as_deref()
    }

    /// True for malformed input like `7.` whose secondary part is empty.
    #[must_use]
    pub fn has_trailing_separator(&self) -> bool {
        self.secondary.as_deref() == Some("")
    }

    fn present_secondary(&self) -> Option<&str> {
        self.secondary.as_deref().filter(|s| !s.is_empty())
    }
}

impl fmt::Display for ChapterNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:0>3}", self.primary)?;
        if let Some(secondary) = self.present_secondary() {
            write!(f, ".{secondary}")?;
        }
        Ok(())
    }
}

impl Ord for ChapterNumber {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_component(&self.primary, &other.primary)
            .then_with(
                || match (self.present_secondary(), other.present_secondary()) {
                    (None, None) => Ordering::Equal,
                    (None, Some(_)) => Ordering::Less,
                    (Some(_), None) => Ordering::Greater,
                    (Some(a), Some(b)) => compare_component(a, b),
                },
            )
            .then_with(|| self.raw.cmp(&other.raw))
    }
}

impl PartialOrd for ChapterNumber {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Numeric when both sides are integers; integers sort before text.
fn compare_component(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Unsigned(u64),
    Float(f64),
    Text(String),
}

impl<'de> Deserialize<'de> for ChapterNumber {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = match NumberOrText::deserialize(deserializer)? {
            NumberOrText::Unsigned(n) => n.to_string(),
            NumberOrText::Float(n) => n.to_string(),
            NumberOrText::Text(s) => s,
        };
        Ok(Self::parse(&raw))
    }
}

impl Serialize for ChapterNumber {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

fn deserialize_volume<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    use serde::de::Error;

    match Option::<NumberOrText>::deserialize(deserializer)? {
        None => Ok(0),
        Some(NumberOrText::Unsigned(n)) => u32::try_from(n).map_err(D::Error::custom),
        Some(NumberOrText::Float(n)) => Err(D::Error::custom(format!(
            "volume must be a whole number, got {n}"
        ))),
        Some(NumberOrText::Text(s)) if s.trim().is_empty() => Ok(0),
        Some(NumberOrText::Text(s)) => s
            .trim()
            .parse()
            .map_err(|_| D::Error::custom(format!("invalid volume '{s}'"))),
    }
}

fn deserialize_title<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.filter(|t| !t.trim().is_empty()))
}
