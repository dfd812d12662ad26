//! Axis labels and (possibly composite) keys.

use chrono::NaiveDate;
use std::fmt;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A single label on one level of an axis.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Label {
    Date(NaiveDate),
    Int(i64),
    Text(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LabelKind {
    Date,
    Int,
    Text,
}

impl Label {
    pub fn kind(&self) -> LabelKind {
        match self {
            Label::Date(_) => LabelKind::Date,
            Label::Int(_) => LabelKind::Int,
            Label::Text(_) => LabelKind::Text,
        }
    }

    /// Parse a raw cell: `YYYY-MM-DD` dates first, then integers, else text.
    pub fn parse(raw: &str) -> Label {
        let trimmed = raw.trim();
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, DATE_FORMAT) {
            return Label::Date(date);
        }
        if let Ok(n) = trimmed.parse::<i64>() {
            return Label::Int(n);
        }
        Label::Text(trimmed.to_string())
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Date(d) => write!(f, "{}", d.format(DATE_FORMAT)),
            Label::Int(n) => write!(f, "{}", n),
            Label::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<NaiveDate> for Label {
    fn from(date: NaiveDate) -> Self {
        Label::Date(date)
    }
}

impl From<i64> for Label {
    fn from(n: i64) -> Self {
        Label::Int(n)
    }
}

impl From<&str> for Label {
    fn from(s: &str) -> Self {
        Label::Text(s.to_string())
    }
}

impl From<String> for Label {
    fn from(s: String) -> Self {
        Label::Text(s)
    }
}

/// An ordered tuple of labels, one per axis level.
///
/// Keys order lexicographically, so sorting a panel axis sorts by time first
/// and asset second.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key(Vec<Label>);

impl Key {
    pub fn new(levels: Vec<Label>) -> Self {
        debug_assert!(!levels.is_empty(), "a key needs at least one level");
        Key(levels)
    }

    pub fn single(label: impl Into<Label>) -> Self {
        Key(vec![label.into()])
    }

    pub fn pair(outer: impl Into<Label>, inner: impl Into<Label>) -> Self {
        Key(vec![outer.into(), inner.into()])
    }

    pub fn levels(&self) -> &[Label] {
        &self.0
    }

    pub fn nlevels(&self) -> usize {
        self.0.len()
    }

    pub fn level(&self, level: usize) -> &Label {
        &self.0[level]
    }

    pub fn outer(&self) -> &Label {
        &self.0[0]
    }

    /// New key with `label` placed in front of the existing levels.
    pub fn prefixed(&self, label: Label) -> Key {
        let mut levels = Vec::with_capacity(self.0.len() + 1);
        levels.push(label);
        levels.extend(self.0.iter().cloned());
        Key(levels)
    }

    pub fn without_level(&self, level: usize) -> Key {
        let levels = self
            .0
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != level)
            .map(|(_, l)| l.clone())
            .collect();
        Key(levels)
    }
}

impl From<Label> for Key {
    fn from(label: Label) -> Self {
        Key(vec![label])
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.len() == 1 {
            return write!(f, "{}", self.0[0]);
        }
        write!(f, "(")?;
        for (i, label) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", label)?;
        }
        write!(f, ")")
    }
}
