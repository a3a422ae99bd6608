//! Metadata for objects and properties.
//!
//! Stored on disk as a single `key=value;key2=value2` blob where `\`, `;`
//! and `=` inside keys or values are backslash-escaped.

use smallvec::SmallVec;
use std::fmt;

/// Ordered string key/value pairs.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct MetaData {
    entries: SmallVec<[(String, String); 4]>,
}

impl MetaData {
    pub const SCHEMA_KEY: &'static str = "schema";
    pub const SCHEMA_BASE_KEY: &'static str = "schemaBaseType";
    pub const SCHEMA_OBJ_TITLE_KEY: &'static str = "schemaObjTitle";
    pub const INTERPRETATION_KEY: &'static str = "interpretation";

    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => *v = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let pos = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Copy every entry of `other` over this one.
    pub fn extend_from(&mut self, other: &MetaData) {
        for (k, v) in other.iter() {
            self.set(k, v);
        }
    }

    /// Serialize to the on-disk blob.
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        for (k, v) in &self.entries {
            if !out.is_empty() {
                out.push(';');
            }
            escape_into(&mut out, k);
            out.push('=');
            escape_into(&mut out, v);
        }
        out
    }

    /// Parse the on-disk blob. Malformed entries (no `=`, empty key) are skipped.
    pub fn parse(s: &str) -> Self {
        let mut meta = Self::new();
        for field in split_unescaped(s, ';') {
            let Some(eq) = find_unescaped(field, '=') else {
                continue;
            };
            let key = unescape(&field[..eq]);
            if !key.is_empty() {
                meta.set(key, unescape(&field[eq + 1..]));
            }
        }
        meta
    }

    pub fn schema(&self) -> Option<&str> {
        self.get(Self::SCHEMA_KEY)
    }

    pub fn set_schema(&mut self, schema: &str) {
        self.set(Self::SCHEMA_KEY, schema);
    }

    pub fn schema_base(&self) -> Option<&str> {
        self.get(Self::SCHEMA_BASE_KEY)
    }

    /// `"<schema>:<compound name>"` title written on schema-bearing objects.
    pub fn schema_obj_title(&self) -> Option<&str> {
        self.get(Self::SCHEMA_OBJ_TITLE_KEY)
    }

    pub fn interpretation(&self) -> Option<&str> {
        self.get(Self::INTERPRETATION_KEY)
    }
}

impl fmt::Debug for MetaData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MetaData {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut meta = Self::new();
        for (k, v) in iter {
            meta.set(k, v);
        }
        meta
    }
}

fn escape_into(out: &mut String, s: &str) {
    for c in s.chars() {
        if matches!(c, '\\' | ';' | '=') {
            out.push('\\');
        }
        out.push(c);
    }
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match (c, chars.peek()) {
            ('\\', Some(&next)) if matches!(next, '\\' | ';' | '=') => {
                out.push(next);
                chars.next();
            }
            _ => out.push(c),
        }
    }
    out
}

/// Byte offset of the first `sep` not consumed by a backslash escape.
fn find_unescaped(s: &str, sep: char) -> Option<usize> {
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == sep {
            return Some(i);
        }
    }
    None
}

fn split_unescaped(s: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut rest = s;
    while let Some(i) = find_unescaped(rest, sep) {
        parts.push(&rest[..i]);
        rest = &rest[i + sep.len_utf8()..];
    }
    if !rest.is_empty() {
        parts.push(rest);
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_basic() {
        let mut meta = MetaData::new();
        meta.set("schema", "AbcGeom_Xform_v3");
        meta.set("schema", "AbcGeom_Camera_v1");
        assert_eq!(meta.len(), 1);
        assert_eq!(meta.schema(), Some("AbcGeom_Camera_v1"));
        assert_eq!(meta.remove("schema").as_deref(), Some("AbcGeom_Camera_v1"));
        assert!(meta.is_empty());
    }

    #[test]
    fn test_metadata_parse() {
        let meta = MetaData::parse(
            "schema=AbcGeom_PolyMesh_v1;schemaObjTitle=AbcGeom_PolyMesh_v1:.geom;interpretation=",
        );
        assert_eq!(meta.schema(), Some("AbcGeom_PolyMesh_v1"));
        assert_eq!(meta.schema_obj_title(), Some("AbcGeom_PolyMesh_v1:.geom"));
        assert_eq!(meta.interpretation(), Some(""));
        assert!(MetaData::parse("").is_empty());
        assert!(MetaData::parse("novalue").is_empty());
    }

    #[test]
    fn test_metadata_escape_roundtrip() {
        let mut meta = MetaData::new();
        meta.set("key=with;special", "value=with;special\\");
        meta.set("plain", "a=b");
        let parsed = MetaData::parse(&meta.serialize());
        assert_eq!(parsed, meta);
    }
}
