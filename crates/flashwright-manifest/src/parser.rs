//! Line-level parsing for requirement documents.

const REQUIRE_PREFIX: &str = "require";
const PRODUCT_SCOPE_PREFIX: &str = "require-for-product:";
const ALTERNATIVE_SEPARATOR: char = '|';

/// A single recognised requirement line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RequirementLine<'a> {
    pub(crate) product: Option<&'a str>,
    pub(crate) key: &'a str,
    pub(crate) values: Vec<&'a str>,
}

/// Parses one line, returning `None` for blanks, comments, and anything
/// unrecognised.
pub(crate) fn parse_line(raw: &str) -> Option<RequirementLine<'_>> {
    let line = raw.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    if let Some(rest) = line.strip_prefix(PRODUCT_SCOPE_PREFIX) {
        let (product, assignment) = rest.split_once(char::is_whitespace)?;
        if product.is_empty() {
            return None;
        }
        let (key, values) = split_alternatives(assignment.trim())?;
        return Some(RequirementLine {
            product: Some(product),
            key,
            values,
        });
    }

    if let Some(rest) = line.strip_prefix(REQUIRE_PREFIX) {
        if rest.starts_with(char::is_whitespace) {
            let (key, values) = split_alternatives(rest.trim())?;
            return Some(RequirementLine {
                product: None,
                key,
                values,
            });
        }
    }

    let (key, value) = split_assignment(line)?;
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    Some(RequirementLine {
        product: None,
        key,
        values: vec![value],
    })
}

fn split_alternatives(assignment: &str) -> Option<(&str, Vec<&str>)> {
    let (key, raw_values) = split_assignment(assignment)?;
    let values: Vec<&str> = raw_values
        .split(ALTERNATIVE_SEPARATOR)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .collect();
    if values.is_empty() {
        None
    } else {
        Some((key, values))
    }
}

fn split_assignment(text: &str) -> Option<(&str, &str)> {
    let (key, value) = text.split_once('=')?;
    let key = key.trim();
    if is_valid_key(key) {
        Some((key, value))
    } else {
        None
    }
}

fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.' | ':'))
}
