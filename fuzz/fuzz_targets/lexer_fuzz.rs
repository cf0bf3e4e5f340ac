#![no_main]
use huff_syntax::huff;
use huff_syntax::syntax::TextSize;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let language = huff::language();
    let tokens = language.lexer().tokenize(data);

    // tokens are contiguous and cover the input
    let mut offset = TextSize::zero();
    for token in &tokens {
        assert_eq!(token.range.start(), offset);
        assert!(!token.range.is_empty());
        offset = token.range.end();
    }
    assert_eq!(offset, TextSize::of(data));
});
