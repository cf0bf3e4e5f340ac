use super::opcodes::OPCODES;
use crate::error::GrammarError;
use crate::grammar::{DEFAULT_MODE, Expr, Grammar, GrammarBuilder, TokenDef};
use crate::lexer::{CharSet, Pattern};

const BLOCK_COMMENT_MODE: &str = "block_comment";

/// The Huff grammar.
///
/// # Errors
///
/// Returns a [`GrammarError`] only if the definition below is inconsistent.
pub fn grammar() -> Result<Grammar, GrammarError> {
    let builder = GrammarBuilder::new("huff")
        .version(env!("CARGO_PKG_VERSION"))
        .mode(BLOCK_COMMENT_MODE);
    let builder = tokens(builder);
    let builder = definitions(builder);
    let builder = declarations(builder);
    let builder = macro_bodies(builder);
    builder
        .extra("_whitespace")
        .word("identifier")
        .start("source_file")
        .build()
}

fn tokens(builder: GrammarBuilder) -> GrammarBuilder {
    let hex = CharSet::hex_digits();
    let digit = CharSet::digits();
    let decimal = Pattern::seq([
        Pattern::class(digit.clone()),
        Pattern::seq([Pattern::literal("_").optional(), Pattern::class(digit)]).repeat(),
    ]);
    let hexadecimal = Pattern::seq([
        Pattern::literal("0"),
        Pattern::class(CharSet::of("xX")),
        Pattern::class(hex.clone()),
        Pattern::seq([Pattern::literal("_").optional(), Pattern::class(hex)]).repeat(),
    ]);

    builder
        .token(TokenDef::new(
            "identifier",
            Pattern::seq([
                Pattern::class(CharSet::alphabetic().union(&CharSet::single(b'_'))),
                Pattern::class(CharSet::alphanumeric().union(&CharSet::single(b'_'))).repeat(),
            ]),
        ))
        .token(TokenDef::new("number", Pattern::alt([decimal, hexadecimal])))
        .token(TokenDef::new(
            "string_literal",
            Pattern::alt([quoted(b'"'), quoted(b'\'')]),
        ))
        .token(
            TokenDef::new(
                "natspec_line",
                Pattern::seq([Pattern::literal("///"), Pattern::class(CharSet::not_newline()).repeat()]),
            )
            .priority(1),
        )
        .token(TokenDef::new(
            "natspec_block",
            Pattern::seq([Pattern::literal("/**"), comment_body().optional(), comment_end()]),
        ))
        .token(TokenDef::new(
            "_comment_line",
            Pattern::seq([Pattern::literal("//"), Pattern::class(CharSet::not_newline()).repeat()]),
        ))
        .token(TokenDef::literal("/*").enter(BLOCK_COMMENT_MODE))
        .token(TokenDef::new("_comment_text", comment_body()).in_mode(BLOCK_COMMENT_MODE))
        .token(
            TokenDef::new("_comment_end", comment_end())
                .in_mode(BLOCK_COMMENT_MODE)
                .enter(DEFAULT_MODE),
        )
        .token(TokenDef::new(
            "_whitespace",
            Pattern::class(CharSet::whitespace()).repeat1(),
        ))
}

/// A string between `quote` bytes, with backslash escapes and no newline.
fn quoted(quote: u8) -> Pattern {
    let delimiter = Pattern::class(CharSet::single(quote));
    let plain = CharSet::new([(quote, quote), (b'\\', b'\\'), (b'\n', b'\n')]).negate();
    let escape = Pattern::seq([
        Pattern::literal("\\"),
        Pattern::class(CharSet::not_newline()),
    ]);
    Pattern::seq([
        delimiter.clone(),
        Pattern::alt([Pattern::class(plain), escape]).repeat(),
        delimiter,
    ])
}

/// Text of a block comment up to, not including, the closing `*/`.
fn comment_body() -> Pattern {
    let stars = Pattern::literal("*").repeat1();
    Pattern::alt([
        Pattern::class(CharSet::single(b'*').negate()),
        Pattern::seq([stars, Pattern::class(CharSet::of("*/").negate())]),
    ])
    .repeat1()
}

fn comment_end() -> Pattern {
    Pattern::seq([Pattern::literal("*").repeat1(), Pattern::literal("/")])
}

fn sized_type(prefix: &str, sizes: impl Iterator<Item = u32>) -> Expr {
    let sizes: Vec<String> = sizes.map(|size| size.to_string()).collect();
    Expr::pattern(Pattern::seq([
        Pattern::literal(prefix),
        Pattern::words(sizes.iter().map(String::as_str)),
    ]))
}

/// `items` between parentheses, possibly absent.
fn parenthesized(items: Expr) -> Expr {
    Expr::seq([Expr::string("("), items.optional(), Expr::string(")")])
}

fn comma_separated(item: Expr) -> Expr {
    Expr::sep1(item, Expr::string(","))
}

fn definitions(builder: GrammarBuilder) -> GrammarBuilder {
    builder
        .rule("source_file", Expr::sym("_definition").repeat())
        .rule(
            "_definition",
            Expr::choice([
                Expr::sym("comment"),
                Expr::sym("declaration"),
                Expr::sym("decorator"),
                Expr::sym("import"),
                Expr::sym("natspec"),
            ]),
        )
        .rule(
            "natspec",
            Expr::choice([Expr::sym("natspec_block"), Expr::sym("natspec_line")]),
        )
        .rule(
            "comment",
            Expr::choice([Expr::sym("_comment_line"), Expr::sym("_comment_block")]),
        )
        .rule(
            "_comment_block",
            Expr::seq([
                Expr::string("/*"),
                Expr::sym("_comment_text").optional(),
                Expr::sym("_comment_end"),
            ]),
        )
        .rule(
            "decorator",
            Expr::seq([
                Expr::string("#["),
                comma_separated(Expr::sym("decorator_item")),
                Expr::string("]"),
            ]),
        )
        .rule(
            "decorator_item",
            Expr::seq([
                Expr::field("name", Expr::sym("identifier")),
                Expr::seq([
                    Expr::string("("),
                    Expr::field(
                        "args",
                        comma_separated(Expr::choice([
                            Expr::sym("string_literal"),
                            Expr::sym("number"),
                            Expr::sym("identifier"),
                        ])),
                    ),
                    Expr::string(")"),
                ])
                .optional(),
            ]),
        )
        .rule(
            "import",
            Expr::seq([
                Expr::field("include_keyword", Expr::string("#include")),
                Expr::field("path", Expr::sym("string_literal")),
            ]),
        )
}

fn declarations(builder: GrammarBuilder) -> GrammarBuilder {
    let macro_like = |keyword: &str| {
        Expr::seq([
            Expr::string(keyword),
            Expr::field("name", Expr::sym("identifier")),
            parenthesized(Expr::field("parameters", comma_separated(Expr::sym("identifier")))),
            Expr::string("="),
            Expr::field("takes_keyword", Expr::string("takes")),
            Expr::string("("),
            Expr::field("takes_count", Expr::sym("number")),
            Expr::string(")"),
            Expr::seq([
                Expr::field("returns_keyword", Expr::string("returns")),
                Expr::string("("),
                Expr::field("returns_count", Expr::sym("number")),
                Expr::string(")"),
            ])
            .optional(),
            Expr::field("body", Expr::sym("macro_body")),
        ])
    };
    let signature = |keyword: &str| {
        Expr::seq([
            Expr::string(keyword),
            Expr::field("name", Expr::sym("identifier")),
            Expr::field("parameters", Expr::sym("parameter_list")),
        ])
    };
    let jumptable = |keyword: &str| {
        Expr::seq([
            Expr::string(keyword),
            Expr::field("name", Expr::sym("identifier")),
            Expr::field("body", Expr::sym("jumptable_body")),
        ])
    };

    builder
        .rule(
            "declaration",
            Expr::seq([
                Expr::field("define_keyword", Expr::string("#define")),
                Expr::choice([
                    Expr::sym("constant"),
                    Expr::sym("error"),
                    Expr::sym("event"),
                    Expr::sym("fn"),
                    Expr::sym("function"),
                    Expr::sym("jumptable"),
                    Expr::sym("jumptable_packed"),
                    Expr::sym("macro"),
                    Expr::sym("table"),
                    Expr::sym("test"),
                ]),
            ]),
        )
        .rule(
            "constant",
            Expr::seq([
                Expr::string("constant"),
                Expr::field("name", Expr::sym("identifier")),
                Expr::string("="),
                Expr::field(
                    "value",
                    Expr::choice([Expr::sym("number"), Expr::sym("builtin_function")]),
                ),
            ]),
        )
        .rule("error", signature("error"))
        .rule("event", signature("event"))
        .rule("macro", macro_like("macro"))
        .rule("fn", macro_like("fn"))
        .rule(
            "function",
            Expr::seq([
                Expr::string("function"),
                Expr::field("name", Expr::sym("identifier")),
                Expr::field("parameters", Expr::sym("parameter_list")),
                Expr::sym("visibility"),
                Expr::string("returns"),
                Expr::field("parameters", Expr::sym("parameter_list")),
            ]),
        )
        .rule("jumptable", jumptable("jumptable"))
        .rule("jumptable_packed", jumptable("jumptable__packed"))
        .rule(
            "jumptable_body",
            Expr::seq([
                Expr::string("{"),
                Expr::sym("jumpdest").repeat(),
                Expr::string("}"),
            ]),
        )
        .rule(
            "table",
            Expr::seq([
                Expr::string("table"),
                Expr::field("name", Expr::sym("identifier")),
                Expr::field("body", Expr::sym("macro_body")),
            ]),
        )
        .rule(
            "test",
            Expr::seq([
                Expr::string("test"),
                Expr::field("name", Expr::sym("identifier")),
                parenthesized(Expr::field("parameters", comma_separated(Expr::sym("identifier"))))
                    .optional(),
                Expr::string("="),
                Expr::field("body", Expr::sym("macro_body")),
            ]),
        )
        .rule(
            "parameter_list",
            parenthesized(comma_separated(Expr::sym("parameter"))),
        )
        .rule(
            "parameter",
            Expr::seq([
                Expr::sym("type"),
                Expr::sym("location").optional(),
                Expr::field("name", Expr::sym("identifier")).optional(),
            ]),
        )
        .rule(
            "type",
            Expr::seq([
                Expr::choice([
                    Expr::keywords(["address", "bool", "bytes", "int", "string", "uint"]),
                    sized_type("uint", (8..=256).step_by(8)),
                    sized_type("int", (8..=256).step_by(8)),
                    sized_type("bytes", 1..=32),
                ]),
                Expr::seq([
                    Expr::string("["),
                    Expr::field("array_size", Expr::sym("number")).optional(),
                    Expr::string("]"),
                ])
                .repeat(),
            ]),
        )
        .rule(
            "visibility",
            Expr::field(
                "visibility",
                Expr::keywords(["pure", "view", "nonpayable", "payable"]),
            ),
        )
        .rule(
            "location",
            Expr::field(
                "location",
                Expr::keywords(["calldata", "indexed", "memory", "storage"]),
            ),
        )
}

fn macro_bodies(builder: GrammarBuilder) -> GrammarBuilder {
    let call = |name: &str, argument: Expr| {
        Expr::seq([
            Expr::string(name),
            Expr::string("("),
            Expr::field("args", argument),
            Expr::string(")"),
        ])
    };
    let name_or_string = || Expr::choice([Expr::sym("identifier"), Expr::sym("string_literal")]);

    builder
        .rule(
            "macro_body",
            Expr::seq([
                Expr::string("{"),
                Expr::sym("_macro_body_item").repeat(),
                Expr::string("}"),
            ]),
        )
        .rule(
            "_macro_body_item",
            Expr::choice([
                Expr::sym("builtin_function"),
                Expr::sym("comment"),
                Expr::sym("jumpdest"),
                Expr::sym("jumpdest_label"),
                Expr::sym("macro_call"),
                Expr::sym("natspec"),
                Expr::sym("number"),
                Expr::sym("opcode"),
                Expr::sym("referenced_constant"),
                Expr::sym("referenced_parameter"),
            ]),
        )
        .rule(
            "opcode",
            Expr::field("opcode", Expr::keywords(OPCODES.iter().copied())),
        )
        .rule(
            "macro_call",
            Expr::seq([
                Expr::field("name", Expr::sym("identifier")),
                parenthesized(Expr::field(
                    "args",
                    comma_separated(Expr::choice([Expr::sym("number"), Expr::sym("identifier")])),
                )),
            ]),
        )
        .rule(
            "referenced_parameter",
            Expr::seq([
                Expr::string("<"),
                Expr::field("name", Expr::sym("identifier")),
                Expr::string(">"),
            ]),
        )
        .rule(
            "referenced_constant",
            Expr::seq([
                Expr::string("["),
                Expr::field("name", Expr::sym("identifier")),
                Expr::string("]"),
            ]),
        )
        .rule("jumpdest", Expr::field("name", Expr::sym("identifier")))
        .rule(
            "jumpdest_label",
            Expr::seq([
                Expr::field("name", Expr::sym("identifier")),
                Expr::string(":"),
            ]),
        )
        .rule(
            "builtin_function",
            Expr::choice([
                call("__codesize", Expr::sym("identifier")),
                call("__tablestart", Expr::sym("identifier")),
                call("__tablesize", Expr::sym("identifier")),
                call("__ERROR", name_or_string()),
                call("__EVENT_HASH", name_or_string()),
                call("__FUNC_SIG", name_or_string()),
                call("__RIGHTPAD", Expr::sym("number")),
                Expr::string("FREE_STORAGE_POINTER()"),
            ]),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::TableConfig;

    #[test]
    fn test_grammar_compiles_without_warnings() {
        let compiled = grammar().unwrap().compile(&TableConfig::default()).unwrap();
        assert!(compiled.warnings.is_empty(), "{:?}", compiled.warnings);
        let language = compiled.language;
        assert_eq!(language.name(), "huff");
        for name in ["source_file", "declaration", "macro", "macro_body", "opcode", "identifier"] {
            assert!(language.kind_for_name(name).is_some(), "missing {name}");
        }
        for field in ["takes_count", "returns_count", "takes_keyword", "args", "array_size", "location"] {
            assert!(language.field_id(field).is_some(), "missing field {field}");
        }
        assert!(language.field_id("inputs").is_none());
    }

    #[test]
    fn test_hex_number_is_one_token() {
        let compiled = grammar().unwrap().compile(&TableConfig::default()).unwrap();
        let language = compiled.language;
        let tokens = language.lexer().tokenize(b"0x1");
        assert_eq!(tokens.len(), 1);
        assert_eq!(language.kind_name(tokens[0].kind), "number");

        let tokens = language.lexer().tokenize(b"0xdead_beef 1_000");
        let kinds: Vec<_> = tokens.iter().map(|t| language.kind_name(t.kind)).collect();
        assert_eq!(kinds, vec!["number", "_whitespace", "number"]);
    }

    #[test]
    fn test_block_comment_mode() {
        let compiled = grammar().unwrap().compile(&TableConfig::default()).unwrap();
        let language = compiled.language;
        let tokens = language.lexer().tokenize(b"/* a * b **/x");
        let kinds: Vec<_> = tokens.iter().map(|t| language.kind_name(t.kind)).collect();
        assert_eq!(kinds, vec!["/*", "_comment_text", "_comment_end", "identifier"]);
    }

    #[test]
    fn test_natspec_beats_comment() {
        let compiled = grammar().unwrap().compile(&TableConfig::default()).unwrap();
        let language = compiled.language;
        let kinds: Vec<_> = language
            .lexer()
            .tokenize(b"/// doc\n/** block */")
            .iter()
            .map(|t| language.kind_name(t.kind).to_owned())
            .collect();
        assert_eq!(kinds, vec!["natspec_line", "_whitespace", "natspec_block"]);
    }

    #[test]
    fn test_sized_types_lex_whole() {
        let compiled = grammar().unwrap().compile(&TableConfig::default()).unwrap();
        let language = compiled.language;
        for text in ["uint256", "int8", "bytes32"] {
            let tokens = language.lexer().tokenize(text.as_bytes());
            assert_eq!(tokens.len(), 1, "{text}");
            assert!(!language.is_visible(tokens[0].kind), "{text}");
        }
    }
}
