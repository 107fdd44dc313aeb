//! Unit tests for requirement lookups.

use std::collections::BTreeSet;
use std::io::Cursor;

use rstest::{fixture, rstest};

use super::*;

fn boards(values: &[&str]) -> BTreeSet<String> {
    values.iter().map(|value| (*value).to_owned()).collect()
}

#[fixture]
fn scoped_document() -> RequirementMap {
    RequirementMap::parse(
        "require board=b1|b2\n\
         require-for-product:b2 version-x=9|10\n",
    )
}

#[rstest]
fn product_scope_uses_plain_string_maximum(scoped_document: RequirementMap) {
    assert_eq!(scoped_document.required_value("version-x", Some("b2")), Some("9"));
}

#[rstest]
fn unscoped_product_without_global_entry_is_absent(scoped_document: RequirementMap) {
    assert_eq!(scoped_document.required_value("version-x", Some("b1")), None);
    assert_eq!(scoped_document.required_value("version-x", None), None);
}

#[rstest]
fn product_scope_matches_case_insensitively(scoped_document: RequirementMap) {
    assert_eq!(scoped_document.required_value("version-x", Some("B2")), Some("9"));
}

#[test]
fn product_scope_falls_back_to_global() {
    let map = RequirementMap::parse(
        "require version-bootloader=1.0\n\
         require-for-product:beta version-bootloader=2.0\n",
    );
    assert_eq!(map.required_value("version-bootloader", Some("beta")), Some("2.0"));
    assert_eq!(map.required_value("version-bootloader", Some("alpha")), Some("1.0"));
    assert_eq!(map.required_value("version-bootloader", None), Some("1.0"));
}

#[test]
fn board_supersedes_product_without_union() {
    let map = RequirementMap::parse("require board=g|d\nrequire product=a|b\n");
    assert_eq!(map.required_boards(None), Some(boards(&["g", "d"])));
}

#[test]
fn product_key_is_used_when_board_is_absent() {
    let map = RequirementMap::parse("require product=Alpha|beta\n");
    assert_eq!(map.required_boards(None), Some(boards(&["alpha", "beta"])));
    assert!(map.accepts_board("ALPHA"));
}

#[test]
fn scoped_boards_take_precedence_over_global_boards() {
    let map = RequirementMap::parse(
        "require board=alpha\n\
         require-for-product:beta board=beta|gamma\n",
    );
    assert_eq!(map.required_boards(Some("beta")), Some(boards(&["beta", "gamma"])));
    assert_eq!(map.required_boards(Some("delta")), Some(boards(&["alpha"])));
}

#[test]
fn missing_board_requirement_accepts_nothing() {
    let map = RequirementMap::parse("version-baseband=1.2\n");
    assert_eq!(map.required_boards(None), None);
    assert!(!map.accepts_board("alpha"));
}

#[test]
fn repeated_requirements_append_without_duplicates() {
    let map = RequirementMap::parse("require board=a|b\nrequire board=b|c\n");
    let values = map.required_values(BOARD_KEY, None).expect("board values");
    assert_eq!(values, ["a", "b", "c"]);
    assert_eq!(map.preferred_value(BOARD_KEY, None), Some("a"));
}

#[test]
fn parsing_is_deterministic() {
    let document = "require board=b1|b2\nrequire-for-product:b2 version-x=9|10\nnoise\n";
    assert_eq!(RequirementMap::parse(document), RequirementMap::parse(document));
}

#[test]
fn reader_and_string_parsing_agree() {
    let document = "# build info\nrequire board=alpha\nversion-bootloader=v1\n";
    let from_reader =
        RequirementMap::from_reader(Cursor::new(document)).expect("reader should parse");
    assert_eq!(from_reader, RequirementMap::parse(document));
}

#[test]
fn empty_document_has_no_requirements() {
    let map = RequirementMap::parse("\n# nothing here\n");
    assert!(map.is_empty());
    assert_eq!(map.required_values(BOARD_KEY, None), None);
}
