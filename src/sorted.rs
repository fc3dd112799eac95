//! Display ordering for mods and a sorted, duplicate-free container built on it.
//!
//! Mods are ordered by display name using plain ordinal comparison (no locale
//! collation), with the folder name breaking ties. Because folder names are
//! unique within a mods root, the order is total and binary search lands on
//! exactly one element per identity.

use crate::library::Mod;
use std::cmp::Ordering;

pub fn compare_mods(a: &Mod, b: &Mod) -> Ordering {
    a.display_name()
        .cmp(b.display_name())
        .then_with(|| a.folder_name.cmp(&b.folder_name))
}

#[derive(Debug, Clone, Default)]
pub struct SortedMods {
    items: Vec<Mod>,
}

impl SortedMods {
    /// Sorts a freshly loaded batch. Later duplicates of a folder name are dropped.
    pub fn from_unsorted(mods: impl IntoIterator<Item = Mod>) -> Self {
        let mut items: Vec<Mod> = mods.into_iter().collect();
        items.sort_by(compare_mods);
        let mut seen = std::collections::HashSet::new();
        items.retain(|item| seen.insert(item.folder_name.clone()));
        Self { items }
    }

    /// `Ok(index)` of the matching element, or `Err(index)` where it would be inserted.
    pub fn locate(&self, item: &Mod) -> Result<usize, usize> {
        self.items
            .binary_search_by(|probe| compare_mods(probe, item))
    }

    /// Inserts in sorted position. Returns false if the mod is already present.
    pub fn insert(&mut self, item: Mod) -> bool {
        match self.locate(&item) {
            Ok(_) => false,
            // Same folder under a stale display name still counts as present.
            Err(_) if self.position_by_folder(&item.folder_name).is_some() => false,
            Err(index) => {
                self.items.insert(index, item);
                true
            }
        }
    }

    pub fn remove(&mut self, item: &Mod) -> Option<Mod> {
        match self.locate(item) {
            Ok(index) => Some(self.items.remove(index)),
            // Same folder, stale display name: fall back to identity.
            Err(_) => {
                let index = self.position_by_folder(&item.folder_name)?;
                Some(self.items.remove(index))
            }
        }
    }

    pub fn find_by_folder(&self, folder_name: &str) -> Option<&Mod> {
        self.position_by_folder(folder_name)
            .map(|index| &self.items[index])
    }

    fn position_by_folder(&self, folder_name: &str) -> Option<usize> {
        self.items
            .iter()
            .position(|item| item.folder_name == folder_name)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Mod> {
        self.items.iter()
    }

    pub fn folder_names(&self) -> Vec<&str> {
        self.items
            .iter()
            .map(|item| item.folder_name.as_str())
            .collect()
    }

    /// Mods whose display name contains `text`, ignoring case. Blank text matches all.
    pub fn search<'a>(&'a self, text: &str) -> Vec<&'a Mod> {
        let needle = text.trim().to_lowercase();
        if needle.is_empty() {
            return self.items.iter().collect();
        }
        self.items
            .iter()
            .filter(|item| item.display_name().to_lowercase().contains(&needle))
            .collect()
    }
}

impl<'a> IntoIterator for &'a SortedMods {
    type Item = &'a Mod;
    type IntoIter = std::slice::Iter<'a, Mod>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
