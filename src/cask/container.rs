//! Ordered, name-keyed storage for child objects and properties.

/// Ordered `(name, id)` entries.
///
/// Entries keep insertion order, which for read-derived nodes is the
/// order stored in the archive. The `visited` flag records that the
/// container has been populated and must not be filled again from a
/// read handle.
#[derive(Clone, Debug)]
pub struct DeepContainer<Id> {
    entries: Vec<(String, Id)>,
    visited: bool,
}

impl<Id> Default for DeepContainer<Id> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            visited: false,
        }
    }
}

impl<Id: Copy + PartialEq> DeepContainer<Id> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Id> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, id)| *id)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Insert under `name`, replacing a same-named entry in place.
    /// Returns the replaced id. Marks the container visited.
    pub fn insert(&mut self, name: impl Into<String>, id: Id) -> Option<Id> {
        let name = name.into();
        self.visited = true;
        if let Some(slot) = self.entries.iter_mut().find(|(n, _)| *n == name) {
            return Some(std::mem::replace(&mut slot.1, id));
        }
        self.entries.push((name, id));
        None
    }

    pub fn remove(&mut self, name: &str) -> Option<Id> {
        let pos = self.entries.iter().position(|(n, _)| n == name)?;
        Some(self.entries.remove(pos).1)
    }

    /// Remove the entry with this id, wherever it is.
    pub fn remove_id(&mut self, id: Id) -> Option<String> {
        let pos = self.entries.iter().position(|(_, i)| *i == id)?;
        Some(self.entries.remove(pos).0)
    }

    /// Move the entry at `old` to `new`. A sibling already named `new` is
    /// displaced and returned.
    pub fn rename(&mut self, old: &str, new: &str) -> Option<Id> {
        if old == new {
            return None;
        }
        let id = self.remove(old)?;
        self.insert(new, id)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = Id> + '_ {
        self.entries.iter().map(|(_, id)| *id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Id)> {
        self.entries.iter().map(|(n, id)| (n.as_str(), *id))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop all entries. The container counts as populated afterwards.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.visited = true;
    }

    pub fn is_visited(&self) -> bool {
        self.visited
    }

    pub fn mark_visited(&mut self) {
        self.visited = true;
    }
}

/// Split a slash-delimited key into its first segment and the rest.
///
/// One leading and one trailing `/` are ignored.
pub fn split_path(key: &str) -> (&str, Option<&str>) {
    let key = key.strip_prefix('/').unwrap_or(key);
    let key = key.strip_suffix('/').unwrap_or(key);
    match key.split_once('/') {
        Some((head, rest)) => (head, Some(rest)),
        None => (key, None),
    }
}
