#![no_main]
use huff_syntax::huff;
use huff_syntax::syntax::{TextRange, TextSize};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let tree = huff::parse(data);
    let full = TextRange::new(TextSize::zero(), TextSize::of(data));
    assert_eq!(tree.root_node().text_range(), full);

    let mut text = Vec::with_capacity(data.len());
    for leaf in tree.leaves() {
        text.extend_from_slice(tree.slice(leaf.text_range()));
    }
    assert_eq!(text, data);

    for error in tree.errors() {
        assert!(full.contains_range(error.range));
    }
});
