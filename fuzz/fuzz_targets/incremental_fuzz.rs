#![no_main]
use huff_syntax::huff;
use huff_syntax::incremental::InputEdit;
use libfuzzer_sys::fuzz_target;

// Input layout: two bytes of edit start, one byte of deleted length, one
// byte of inserted length, then the inserted bytes and the source text.
fuzz_target!(|data: &[u8]| {
    let [a, b, deleted, inserted, rest @ ..] = data else {
        return;
    };
    let inserted = usize::from(*inserted).min(rest.len());
    let (replacement, source) = rest.split_at(inserted);

    let start = usize::from(u16::from_le_bytes([*a, *b])).min(source.len());
    let end = (start + usize::from(*deleted)).min(source.len());

    let parser = huff::parser();
    let old = parser.parse(source, None, &[]);
    let (text, edit) = InputEdit::splice(source, start..end, replacement);
    let incremental = parser.parse(&text, Some(&old), &[edit]);
    let fresh = parser.parse(&text, None, &[]);
    assert_eq!(incremental, fresh);
});
