//! Data shared by nodes and edges: attributes, metadata, tags and flags.

use std::collections::BTreeSet;

use serde_json::Value;

use crate::types::{Attributes, Flag, MetadataEntry, Tags, Uuid};
use crate::{Error, Result};

/// Base record of every node and edge.
///
/// Destruction is not tracked here: a destroyed entity is removed from the
/// store arena, so no handle can reach it afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    uuid: Uuid,
    attributes: Attributes,
    metadata: Vec<MetadataEntry>,
    tags: Tags,
    flags: BTreeSet<Flag>,
}

impl Entity {
    pub fn new(uuid: Uuid) -> Self {
        Self {
            uuid,
            attributes: Attributes::new(),
            metadata: Vec::new(),
            tags: Tags::new(),
            flags: BTreeSet::new(),
        }
    }

    pub(crate) fn with_data(
        uuid: Uuid,
        attributes: Attributes,
        metadata: Vec<MetadataEntry>,
        tags: Tags,
        flags: impl IntoIterator<Item = Flag>,
    ) -> Self {
        Self {
            uuid,
            attributes,
            metadata,
            tags,
            flags: flags.into_iter().collect(),
        }
    }

    pub fn uuid(&self) -> &Uuid {
        &self.uuid
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn metadata(&self) -> &[MetadataEntry] {
        &self.metadata
    }

    pub fn tags(&self) -> &Tags {
        &self.tags
    }

    pub fn flags(&self) -> &BTreeSet<Flag> {
        &self.flags
    }

    /// Whether `key` is set, and when `value` is given, set to exactly that value.
    pub fn has_attribute(&self, key: &str, value: Option<&Value>) -> bool {
        match (self.attributes.get(key), value) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(current), Some(expected)) => current == expected,
        }
    }

    /// Add a new attribute; fails if the key is already present.
    pub fn add_attribute(&mut self, key: impl Into<String>, value: Value) -> Result<()> {
        let key = key.into();
        if self.attributes.contains_key(&key) {
            return Err(Error::duplicate_attribute(key).with_context("entity", self.uuid.to_string()));
        }
        self.attributes.insert(key, value);
        Ok(())
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: Value) {
        self.attributes.insert(key.into(), value);
    }

    pub fn get_attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn add_metadata(&mut self, kind: impl Into<String>, data: Value) {
        self.metadata.push(MetadataEntry::new(kind, data));
    }

    pub fn has_metadata(&self, kind: &str, data: &Value) -> bool {
        self.metadata
            .iter()
            .any(|entry| entry.kind == kind && &entry.data == data)
    }

    /// All metadata entries of the given type, in insertion order.
    pub fn find_metadata<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a MetadataEntry> {
        self.metadata.iter().filter(move |entry| entry.kind == kind)
    }

    /// Add a new tag; fails if the key is already present.
    pub fn add_tag(&mut self, key: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let key = key.into();
        if self.tags.contains_key(&key) {
            return Err(Error::duplicate_tag(key).with_context("entity", self.uuid.to_string()));
        }
        self.tags.insert(key, value.into());
        Ok(())
    }

    pub fn set_tag(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.tags.insert(key.into(), value.into());
    }

    pub fn has_tag(&self, key: &str, value: Option<&str>) -> bool {
        match (self.tags.get(key), value) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(current), Some(expected)) => current == expected,
        }
    }

    pub fn get_tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    pub fn add_flag(&mut self, flag: Flag) {
        self.flags.insert(flag);
    }

    pub fn has_flag(&self, flag: Flag) -> bool {
        self.flags.contains(&flag)
    }

    /// Merge another entity's data into this one.
    ///
    /// With `overwrite == false` existing attributes and tags win. Metadata
    /// entries already present (same type and payload) are not duplicated.
    /// Flags are only merged when `apply_flags` is set.
    pub fn apply_data(&mut self, other: &Entity, overwrite: bool, apply_flags: bool) {
        for (key, value) in &other.attributes {
            if overwrite || !self.attributes.contains_key(key) {
                self.attributes.insert(key.clone(), value.clone());
            }
        }

        for entry in &other.metadata {
            if !self.has_metadata(&entry.kind, &entry.data) {
                self.metadata.push(entry.clone());
            }
        }

        for (key, value) in &other.tags {
            if overwrite || !self.tags.contains_key(key) {
                self.tags.insert(key.clone(), value.clone());
            }
        }

        if apply_flags {
            self.flags.extend(other.flags.iter().copied());
        }
    }
}

/// Access to the shared entity record of a node or an edge.
pub trait GraphEntity {
    fn entity(&self) -> &Entity;

    fn uuid(&self) -> &Uuid {
        self.entity().uuid()
    }

    fn has_flag(&self, flag: Flag) -> bool {
        self.entity().has_flag(flag)
    }

    fn flags(&self) -> &BTreeSet<Flag> {
        self.entity().flags()
    }

    fn attributes(&self) -> &Attributes {
        self.entity().attributes()
    }

    fn get_attribute(&self, key: &str) -> Option<&Value> {
        self.entity().get_attribute(key)
    }

    fn has_attribute(&self, key: &str, value: Option<&Value>) -> bool {
        self.entity().has_attribute(key, value)
    }

    fn metadata(&self) -> &[MetadataEntry] {
        self.entity().metadata()
    }

    fn tags(&self) -> &Tags {
        self.entity().tags()
    }

    fn get_tag(&self, key: &str) -> Option<&str> {
        self.entity().get_tag(key)
    }

    fn is_mutated(&self) -> bool {
        self.entity().has_flag(Flag::Mutated)
    }
}
