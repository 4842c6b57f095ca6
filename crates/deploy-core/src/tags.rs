//! Stack tags accumulated from the profile store and the override file.

use serde::{Deserialize, Serialize};

/// A tag declaration: either a bare key (value supplied at deploy time) or a
/// fixed key/value pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Tag {
    Name(String),
    Pair {
        #[serde(rename = "Key")]
        key: String,
        #[serde(rename = "Value")]
        value: String,
    },
}

impl Tag {
    pub fn pair(key: impl Into<String>, value: impl Into<String>) -> Self {
        Tag::Pair {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn key(&self) -> &str {
        match self {
            Tag::Name(key) => key,
            Tag::Pair { key, .. } => key,
        }
    }

    pub fn value(&self) -> Option<&str> {
        match self {
            Tag::Name(_) => None,
            Tag::Pair { value, .. } => Some(value),
        }
    }
}

/// Ordered tags, unique by key.
///
/// A key keeps the position of its first declaration. A later pair replaces
/// an earlier value; a later bare name never clears a known value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagSet {
    tags: Vec<Tag>,
}

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, tag: Tag) {
        match self.tags.iter_mut().find(|t| t.key() == tag.key()) {
            None => self.tags.push(tag),
            Some(existing) => {
                if let Tag::Pair { .. } = tag {
                    *existing = tag;
                }
            }
        }
    }

    pub fn extend<'a>(&mut self, tags: impl IntoIterator<Item = &'a Tag>) {
        for tag in tags {
            self.insert(tag.clone());
        }
    }

    pub fn get(&self, key: &str) -> Option<&Tag> {
        self.tags.iter().find(|t| t.key() == key)
    }

    /// Keys that still need a value before they can be applied to a stack.
    pub fn unvalued(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().filter_map(|t| match t {
            Tag::Name(key) => Some(key.as_str()),
            Tag::Pair { .. } => None,
        })
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Tag> {
        self.tags.iter()
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

impl<'a> IntoIterator for &'a TagSet {
    type Item = &'a Tag;
    type IntoIter = std::slice::Iter<'a, Tag>;

    fn into_iter(self) -> Self::IntoIter {
        self.tags.iter()
    }
}

impl FromIterator<Tag> for TagSet {
    fn from_iter<I: IntoIterator<Item = Tag>>(iter: I) -> Self {
        let mut set = TagSet::new();
        for tag in iter {
            set.insert(tag);
        }
        set
    }
}
