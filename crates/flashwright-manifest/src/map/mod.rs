//! Immutable requirement lookups.

use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, BufRead};

use crate::parser::{RequirementLine, parse_line};

/// Key naming the boards a build supports.
pub const BOARD_KEY: &str = "board";

/// Legacy key naming the products a build supports. Superseded by
/// [`BOARD_KEY`] when both are present in a scope.
pub const PRODUCT_KEY: &str = "product";

type Entries = BTreeMap<String, Vec<String>>;

/// Parsed requirement document.
///
/// Entries are keyed by scope (global or a product identifier) and key. Each
/// entry holds the acceptable values in declaration order. Product scopes are
/// matched case-insensitively; keys are matched exactly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequirementMap {
    global: Entries,
    products: BTreeMap<String, Entries>,
}

impl RequirementMap {
    /// Parses a requirement document. Unrecognised lines are ignored.
    #[must_use]
    pub fn parse(document: &str) -> Self {
        let mut map = Self::default();
        for line in document.lines().filter_map(parse_line) {
            map.insert(line);
        }
        map
    }

    /// Reads and parses a requirement document.
    ///
    /// # Errors
    ///
    /// Returns any I/O error raised while reading lines.
    pub fn from_reader(reader: impl BufRead) -> io::Result<Self> {
        let mut map = Self::default();
        for line in reader.lines() {
            let text = line?;
            if let Some(parsed) = parse_line(&text) {
                map.insert(parsed);
            }
        }
        Ok(map)
    }

    /// Returns `true` when the document declared no requirements at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.global.is_empty() && self.products.is_empty()
    }

    /// Returns every acceptable value for `key`, consulting the product scope
    /// first and falling back to the global scope.
    #[must_use]
    pub fn required_values(&self, key: &str, product: Option<&str>) -> Option<&[String]> {
        product
            .and_then(|name| self.scoped(name))
            .and_then(|entries| entries.get(key))
            .or_else(|| self.global.get(key))
            .map(Vec::as_slice)
    }

    /// Returns the single required value for `key`.
    ///
    /// When several alternatives are declared the greatest under plain string
    /// ordering wins, so `"9"` outranks `"10"`.
    #[must_use]
    pub fn required_value(&self, key: &str, product: Option<&str>) -> Option<&str> {
        self.required_values(key, product)?
            .iter()
            .max()
            .map(String::as_str)
    }

    /// Returns the first declared value for `key`.
    #[must_use]
    pub fn preferred_value(&self, key: &str, product: Option<&str>) -> Option<&str> {
        self.required_values(key, product)?
            .first()
            .map(String::as_str)
    }

    /// Returns the lower-cased set of board identifiers the build accepts.
    ///
    /// A `board` entry supersedes a `product` entry in the same scope. The
    /// product scope is consulted before the global scope. Returns `None` when
    /// the document names no boards.
    #[must_use]
    pub fn required_boards(&self, product: Option<&str>) -> Option<BTreeSet<String>> {
        let scoped = product
            .and_then(|name| self.scoped(name))
            .and_then(board_entry);
        let values = scoped.or_else(|| board_entry(&self.global))?;
        Some(values.iter().map(|value| value.to_ascii_lowercase()).collect())
    }

    /// Returns `true` when `identifier` is one of the required boards.
    ///
    /// A document without board requirements accepts nothing; callers decide
    /// whether a missing requirement is acceptable.
    #[must_use]
    pub fn accepts_board(&self, identifier: &str) -> bool {
        let normalised = identifier.trim().to_ascii_lowercase();
        self.required_boards(Some(normalised.as_str()))
            .is_some_and(|boards| boards.contains(&normalised))
    }

    fn scoped(&self, product: &str) -> Option<&Entries> {
        self.products.get(&product.to_ascii_lowercase())
    }

    fn insert(&mut self, line: RequirementLine<'_>) {
        let entries = match line.product {
            Some(product) => self
                .products
                .entry(product.to_ascii_lowercase())
                .or_default(),
            None => &mut self.global,
        };
        let values = entries.entry(line.key.to_owned()).or_default();
        for value in line.values {
            if !values.iter().any(|existing| existing == value) {
                values.push(value.to_owned());
            }
        }
    }
}

fn board_entry(entries: &Entries) -> Option<&[String]> {
    entries
        .get(BOARD_KEY)
        .or_else(|| entries.get(PRODUCT_KEY))
        .map(Vec::as_slice)
}

#[cfg(test)]
mod tests;
