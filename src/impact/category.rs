// src/impact/category.rs
//! Which symbols make up each asset category.

use std::collections::BTreeMap;

use crate::market::{AssetType, INSTRUMENTS};

/// Category membership, in a fixed symbol order per category.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryMap {
    members: BTreeMap<AssetType, Vec<String>>,
}

impl CategoryMap {
    pub fn new(members: BTreeMap<AssetType, Vec<String>>) -> Self {
        Self { members }
    }

    pub fn members(&self, category: AssetType) -> &[String] {
        self.members
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

impl Default for CategoryMap {
    /// Groups the default instrument universe by asset type.
    fn default() -> Self {
        let mut members: BTreeMap<AssetType, Vec<String>> = BTreeMap::new();
        for ins in INSTRUMENTS {
            members
                .entry(ins.asset_type)
                .or_default()
                .push(ins.symbol.to_string());
        }
        Self { members }
    }
}
