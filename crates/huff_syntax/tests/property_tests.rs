//! Property-based tests for the Huff parser
//!
//! Random edits of Huff sources must reparse to the same tree as a fresh
//! parse, and arbitrary bytes must always produce a tree that covers the
//! whole input.

use huff_syntax::huff;
use huff_syntax::incremental::InputEdit;
use huff_syntax::syntax::{SyntaxTree, TextRange, TextSize};
use proptest::prelude::*;

const SAMPLES: &[&str] = &[
    "#define constant OWNER = FREE_STORAGE_POINTER()\n#define constant ONE = 0x01\n",
    "#define macro MAIN() = takes(0) returns(0) {\n    0x00 calldataload 0xe0 shr\n    dup1 __FUNC_SIG(owner) eq owner jumpi\n    owner:\n        [OWNER] sload 0x00 mstore\n        0x20 0x00 return\n}\n",
    "/// @notice transfer\n#define function transfer(address to, uint256 amount) nonpayable returns (bool)\n#define event Transfer(address indexed, address indexed, uint256)\n",
    "/* tables */\n#define jumptable SWITCH {\n    a b c\n}\n#define table CODE {\n    0xdead_beef\n}\n",
    "#[calldata(\"0x01\")]\n#define test T() = {\n    ADD(0x01, 0x02) <x> pop // done\n}\n",
];

/// Pieces that are likely to change the parse in interesting ways
const FRAGMENTS: &[&str] = &[
    "", " ", "\n", "{", "}", "(", ")", "[", "]", "<", ">", ":", ",", "=", "0x", "0x1", "42", "_",
    "mstore", "add", "stop", "macro", "#define", "#define macro X() = takes(0) {}", "constant",
    "/*", "*/", "//", "///", "\"", "identifier", "uint256", "__FUNC_SIG(", "FREE_STORAGE_POINTER()",
    "$", "#",
];

fn reconstruct(tree: &SyntaxTree) -> Vec<u8> {
    let mut out = Vec::new();
    for leaf in tree.leaves() {
        out.extend_from_slice(tree.slice(leaf.text_range()));
    }
    out
}

fn full_range(source: &[u8]) -> TextRange {
    TextRange::new(TextSize::zero(), TextSize::of(source))
}

/// A replacement text made of fragments and stray bytes
fn replacement() -> impl Strategy<Value = Vec<u8>> {
    prop_oneof![
        3 => prop::sample::select(FRAGMENTS).prop_map(|s| s.as_bytes().to_vec()),
        1 => proptest::collection::vec(any::<u8>(), 0..4),
    ]
}

/// An edit as (start fraction, length, replacement), resolved against the
/// text it applies to.
fn edit() -> impl Strategy<Value = (f64, usize, Vec<u8>)> {
    (0.0f64..=1.0, 0usize..8, replacement())
}

fn resolve(text: &[u8], (fraction, len, replacement): &(f64, usize, Vec<u8>)) -> (Vec<u8>, InputEdit) {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    let start = ((text.len() as f64) * fraction) as usize;
    let start = start.min(text.len());
    let end = (start + len).min(text.len());
    InputEdit::splice(text, start..end, replacement)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn incremental_matches_fresh_parse(
        sample in 0..SAMPLES.len(),
        edits in proptest::collection::vec(edit(), 1..4),
    ) {
        let parser = huff::parser();
        let mut text = SAMPLES[sample].as_bytes().to_vec();
        let mut tree = parser.parse(&text, None, &[]);

        // reparse after each batch of edits, feeding the tree forward
        for chunk in edits.chunks(2) {
            let mut input_edits = Vec::new();
            for edit in chunk {
                let (next, input_edit) = resolve(&text, edit);
                text = next;
                input_edits.push(input_edit);
            }
            let incremental = parser.parse(&text, Some(&tree), &input_edits);
            let fresh = parser.parse(&text, None, &[]);
            prop_assert_eq!(&incremental, &fresh);
            prop_assert_eq!(reconstruct(&incremental), text.clone());
            tree = incremental;
        }
    }

    #[test]
    fn arbitrary_bytes_cover_input(source in proptest::collection::vec(any::<u8>(), 0..256)) {
        let tree = huff::parse(&source);
        prop_assert_eq!(tree.root_node().text_range(), full_range(&source));
        prop_assert_eq!(reconstruct(&tree), source.clone());
        for error in tree.errors() {
            prop_assert!(full_range(&source).contains_range(error.range));
        }
    }

    #[test]
    fn fragment_soup_covers_input(
        pieces in proptest::collection::vec(prop::sample::select(FRAGMENTS), 0..40),
    ) {
        let source = pieces.join(" ");
        let tree = huff::parse(source.as_bytes());
        prop_assert_eq!(tree.root_node().text_range(), full_range(source.as_bytes()));
        prop_assert_eq!(reconstruct(&tree), source.as_bytes().to_vec());
    }

    #[test]
    fn samples_parse_cleanly(sample in 0..SAMPLES.len(), copies in 1usize..4) {
        let source = SAMPLES[sample].repeat(copies);
        let tree = huff::parse(source.as_bytes());
        prop_assert!(tree.errors().is_empty(), "{}", tree.to_sexp());
    }
}
