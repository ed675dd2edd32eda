use core::fmt;
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::BindingError;

lazy_static! {
    // One field name or one bracketed index per match. Field names may
    // contain hyphens; dots and brackets are structural only.
    static ref SEGMENT_RE: Regex = Regex::new(r"^(?:\.?([^.\[\]]+)|\[(\d+)\])").unwrap();
}

/// One step of a data-model path.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Segment {
    Field(String),
    Index(usize),
}

/// Parsed data-model path.
///
/// Two textual notations exist: dot-bracket (`group[2].field`) used in
/// layouts and expressions, and JSON-Pointer-style slash notation
/// (`/group/2/field`) used toward the backend. Conversion between them is
/// lossless; all-digit pointer segments are read back as indices, so field
/// names are expected to be identifiers (they are in practice).
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct FieldPath(pub Vec<Segment>);

impl FieldPath {
    pub fn parse(input: &str) -> Result<FieldPath, BindingError> {
        if input.is_empty() {
            return Err(BindingError::EmptyPath);
        }
        let mut segments = Vec::new();
        let mut rest = input;
        while !rest.is_empty() {
            let caps = SEGMENT_RE
                .captures(rest)
                .ok_or_else(|| BindingError::PathParse {
                    path: input.to_string(),
                    at: input.len() - rest.len(),
                })?;
            if let Some(field) = caps.get(1) {
                if segments.is_empty() && rest.starts_with('.') {
                    return Err(BindingError::PathParse {
                        path: input.to_string(),
                        at: 0,
                    });
                }
                segments.push(Segment::Field(field.as_str().to_string()));
            } else if let Some(index) = caps.get(2) {
                let idx = index.as_str().parse::<usize>().map_err(|_| {
                    BindingError::PathParse {
                        path: input.to_string(),
                        at: input.len() - rest.len(),
                    }
                })?;
                segments.push(Segment::Index(idx));
            }
            rest = &rest[caps.get(0).unwrap().end()..];
        }
        Ok(FieldPath(segments))
    }

    /// Parses slash notation (`/group/2/field`). All-digit segments become
    /// indices.
    pub fn parse_pointer(input: &str) -> Result<FieldPath, BindingError> {
        let stripped = input
            .strip_prefix('/')
            .ok_or_else(|| BindingError::PathParse {
                path: input.to_string(),
                at: 0,
            })?;
        if stripped.is_empty() {
            return Err(BindingError::EmptyPath);
        }
        let mut segments = Vec::new();
        for part in stripped.split('/') {
            if part.is_empty() {
                return Err(BindingError::PathParse {
                    path: input.to_string(),
                    at: 0,
                });
            }
            if part.bytes().all(|b| b.is_ascii_digit()) {
                segments.push(Segment::Index(part.parse().map_err(|_| {
                    BindingError::PathParse {
                        path: input.to_string(),
                        at: 0,
                    }
                })?));
            } else {
                segments.push(Segment::Field(part.to_string()));
            }
        }
        Ok(FieldPath(segments))
    }

    pub fn to_dotted(&self) -> String {
        let mut out = String::new();
        for segment in &self.0 {
            match segment {
                Segment::Field(f) => {
                    if !out.is_empty() {
                        out.push('.');
                    }
                    out.push_str(f);
                }
                Segment::Index(i) => {
                    out.push('[');
                    out.push_str(&i.to_string());
                    out.push(']');
                }
            }
        }
        out
    }

    pub fn to_pointer(&self) -> String {
        let mut out = String::new();
        for segment in &self.0 {
            out.push('/');
            match segment {
                Segment::Field(f) => out.push_str(f),
                Segment::Index(i) => out.push_str(&i.to_string()),
            }
        }
        out
    }

    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn push(&mut self, segment: Segment) {
        self.0.push(segment);
    }

    /// Child path: `self` extended with one field segment.
    pub fn field(&self, name: &str) -> FieldPath {
        let mut segments = self.0.clone();
        segments.push(Segment::Field(name.to_string()));
        FieldPath(segments)
    }

    /// Row path: `self` extended with one index segment.
    pub fn index(&self, idx: usize) -> FieldPath {
        let mut segments = self.0.clone();
        segments.push(Segment::Index(idx));
        FieldPath(segments)
    }

    /// True when `other` starts with every segment of `self`.
    pub fn is_prefix_of(&self, other: &FieldPath) -> bool {
        other.0.len() >= self.0.len() && self.0[..] == other.0[..self.0.len()]
    }

    /// Overlap test used for dirty marking: either path is a prefix of the
    /// other, so a change at one can affect reads at the other.
    pub fn overlaps(&self, other: &FieldPath) -> bool {
        self.is_prefix_of(other) || other.is_prefix_of(self)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_dotted())
    }
}

impl FromStr for FieldPath {
    type Err = BindingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FieldPath::parse(s)
    }
}

impl Serialize for FieldPath {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_dotted())
    }
}

impl<'de> Deserialize<'de> for FieldPath {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        FieldPath::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// One repeating-row ancestor of a node: the container's (already
/// absolute) binding path plus the row the node sits in.
#[derive(Clone, Debug, PartialEq)]
pub struct RowEntry {
    pub binding: FieldPath,
    pub uuid: Uuid,
    pub index: usize,
}

/// Outer-to-inner chain of repeating-row ancestors.
///
/// Row-relative bindings declared inside repeating groups get the nearest
/// enclosing rows' indices substituted here. Because entries are ordered
/// outer-to-inner and each entry's own binding has already been substituted
/// by the entries before it, a plain prefix match per entry handles
/// arbitrarily nested groups.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RowContext(pub Vec<RowEntry>);

impl RowContext {
    pub fn empty() -> Self {
        RowContext(Vec::new())
    }

    pub fn extended(&self, entry: RowEntry) -> RowContext {
        let mut entries = self.0.clone();
        entries.push(entry);
        RowContext(entries)
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    pub fn entries(&self) -> &[RowEntry] {
        &self.0
    }

    pub fn innermost(&self) -> Option<&RowEntry> {
        self.0.last()
    }

    /// Substitutes enclosing row indices into a row-relative binding.
    ///
    /// For each entry, if the binding extends the entry's path and does not
    /// already carry an explicit index at that position, the row index is
    /// inserted. Bindings outside every repeating ancestor are returned
    /// unchanged.
    pub fn substitute(&self, binding: &FieldPath) -> FieldPath {
        let mut segments = binding.0.clone();
        for entry in &self.0 {
            let plen = entry.binding.0.len();
            if segments.len() < plen || segments[..plen] != entry.binding.0[..] {
                continue;
            }
            match segments.get(plen) {
                Some(Segment::Index(_)) => {}
                _ => segments.insert(plen, Segment::Index(entry.index)),
            }
        }
        FieldPath(segments)
    }
}
