//! Token-level combinators.
//!
//! The grammar is scannerless: JSX text is whitespace sensitive, so a
//! separate token stream would have to re-lex inside elements anyway. Every
//! token parser here consumes the trivia (whitespace and comments) that
//! follows it; parsers that must not do that (the JSX ones) use the raw
//! `just` forms directly.

use chumsky::prelude::*;

use super::Extra;
use super::ast::Name;

const RESERVED: &[&str] = &[
    "async", "await", "break", "case", "catch", "class", "const", "continue", "default",
    "delete", "do", "else", "export", "extends", "false", "finally", "for", "function", "if",
    "import", "in", "instanceof", "let", "new", "null", "return", "super", "switch", "this",
    "throw", "true", "try", "typeof", "undefined", "var", "void", "while", "with", "yield",
];

pub fn is_reserved(word: &str) -> bool {
    RESERVED.contains(&word)
}

pub fn is_ident_start(c: &char) -> bool {
    c.is_ascii_alphabetic() || *c == '_' || *c == '$' || (!c.is_ascii() && c.is_alphabetic())
}

pub fn is_ident_continue(c: &char) -> bool {
    is_ident_start(c) || c.is_ascii_digit()
}

/// Whitespace, `// line` and `/* block */` comments.
pub fn trivia<'src>() -> impl Parser<'src, &'src str, (), Extra<'src>> + Clone {
    let whitespace = any().filter(|c: &char| c.is_whitespace()).ignored();
    let line_comment = just("//")
        .then(any().and_is(text::newline().not()).repeated())
        .ignored();
    let block_comment = just("/*")
        .then(any().and_is(just("*/").not()).repeated())
        .then(just("*/"))
        .ignored();
    choice((whitespace, line_comment, block_comment))
        .repeated()
        .ignored()
}

/// Punctuation that is never a prefix of a longer operator.
pub fn punct<'src>(symbol: &'src str) -> impl Parser<'src, &'src str, (), Extra<'src>> + Clone {
    just(symbol).ignored().then_ignore(trivia())
}

/// Operator `symbol` that must not be directly followed by any character of
/// `not_followed_by` (so `=` does not eat the start of `==` or `=>`).
pub fn op<'src>(
    symbol: &'src str,
    not_followed_by: &'src str,
) -> impl Parser<'src, &'src str, (), Extra<'src>> + Clone {
    just(symbol)
        .then_ignore(one_of(not_followed_by).not())
        .ignored()
        .then_ignore(trivia())
}

pub fn keyword<'src>(word: &'src str) -> impl Parser<'src, &'src str, (), Extra<'src>> + Clone {
    just(word)
        .then_ignore(any().filter(is_ident_continue).not())
        .ignored()
        .then_ignore(trivia())
}

fn raw_identifier<'src>() -> impl Parser<'src, &'src str, &'src str, Extra<'src>> + Clone {
    any()
        .filter(is_ident_start)
        .then(any().filter(is_ident_continue).repeated())
        .to_slice()
}

/// A binding or reference name; reserved words are rejected.
pub fn identifier<'src>() -> impl Parser<'src, &'src str, Name, Extra<'src>> + Clone {
    raw_identifier()
        .try_map(|name: &str, span| {
            if is_reserved(name) {
                Err(Rich::custom(span, format!("unexpected keyword `{name}`")))
            } else {
                Ok(Name::from(name))
            }
        })
        .then_ignore(trivia())
}

/// A name after `.` or as an object key; reserved words are allowed.
pub fn property_name<'src>() -> impl Parser<'src, &'src str, Name, Extra<'src>> + Clone {
    raw_identifier().map(Name::from).then_ignore(trivia())
}

pub fn number<'src>() -> impl Parser<'src, &'src str, f64, Extra<'src>> + Clone {
    let hex = just("0x")
        .or(just("0X"))
        .ignore_then(text::digits(16).to_slice())
        .try_map(|digits: &str, span| {
            u64::from_str_radix(digits, 16)
                .map(|value| value as f64)
                .map_err(|error| Rich::custom(span, error.to_string()))
        });
    let exponent = one_of("eE").then(one_of("+-").or_not()).then(text::digits(10));
    let decimal = choice((
        text::digits(10)
            .then(just('.').then(text::digits(10).or_not()).or_not())
            .ignored(),
        just('.').then(text::digits(10)).ignored(),
    ))
    .then(exponent.or_not())
    .to_slice()
    .try_map(|literal: &str, span| {
        literal
            .parse::<f64>()
            .map_err(|error| Rich::custom(span, error.to_string()))
    });
    choice((hex, decimal))
        .then_ignore(any().filter(is_ident_start).not())
        .then_ignore(trivia())
}

fn hex_char<'src>(digits: usize) -> impl Parser<'src, &'src str, char, Extra<'src>> + Clone {
    text::digits(16)
        .exactly(digits)
        .to_slice()
        .try_map(|digits: &str, span| {
            u32::from_str_radix(digits, 16)
                .ok()
                .and_then(char::from_u32)
                .ok_or_else(|| Rich::custom(span, "invalid character escape"))
        })
}

/// Backslash escape inside string and template literals.
pub fn escape<'src>() -> impl Parser<'src, &'src str, char, Extra<'src>> + Clone {
    let braced = text::digits(16)
        .at_least(1)
        .at_most(6)
        .to_slice()
        .delimited_by(just('{'), just('}'))
        .try_map(|digits: &str, span| {
            u32::from_str_radix(digits, 16)
                .ok()
                .and_then(char::from_u32)
                .ok_or_else(|| Rich::custom(span, "invalid unicode escape"))
        });
    just('\\').ignore_then(choice((
        just('n').to('\n'),
        just('t').to('\t'),
        just('r').to('\r'),
        just('b').to('\u{8}'),
        just('f').to('\u{c}'),
        just('v').to('\u{b}'),
        just('0').to('\0'),
        just('u').ignore_then(braced.or(hex_char(4))),
        just('x').ignore_then(hex_char(2)),
        any(),
    )))
}

pub fn string_literal<'src>() -> impl Parser<'src, &'src str, Name, Extra<'src>> + Clone {
    let double = none_of("\\\"\n")
        .or(escape())
        .repeated()
        .collect::<String>()
        .delimited_by(just('"'), just('"'));
    let single = none_of("\\'\n")
        .or(escape())
        .repeated()
        .collect::<String>()
        .delimited_by(just('\''), just('\''));
    double
        .or(single)
        .map(|text| Name::from(text.as_str()))
        .then_ignore(trivia())
}

/// Tag and attribute names in JSX may contain `-` and `:`.
pub fn jsx_name<'src>() -> impl Parser<'src, &'src str, Name, Extra<'src>> + Clone {
    any()
        .filter(is_ident_start)
        .then(
            any()
                .filter(|c: &char| is_ident_continue(c) || *c == '-' || *c == ':')
                .repeated(),
        )
        .to_slice()
        .map(Name::from)
}

/// Raw JSX attribute string; no backslash escapes, entities are decoded later.
pub fn jsx_string<'src>() -> impl Parser<'src, &'src str, String, Extra<'src>> + Clone {
    let double = none_of("\"")
        .repeated()
        .to_slice()
        .delimited_by(just('"'), just('"'));
    let single = none_of("'")
        .repeated()
        .to_slice()
        .delimited_by(just('\''), just('\''));
    double.or(single).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse<'src, O>(
        parser: impl Parser<'src, &'src str, O, Extra<'src>>,
        input: &'src str,
    ) -> Option<O> {
        parser.then_ignore(end()).parse(input).into_result().ok()
    }

    #[test]
    fn trivia_skips_comments() {
        assert!(parse(trivia(), "  // line\n /* block\n */ ").is_some());
    }

    #[test]
    fn numbers() {
        assert_eq!(parse(number(), "42"), Some(42.0));
        assert_eq!(parse(number(), "3.5 "), Some(3.5));
        assert_eq!(parse(number(), ".25"), Some(0.25));
        assert_eq!(parse(number(), "1e3"), Some(1000.0));
        assert_eq!(parse(number(), "0xff"), Some(255.0));
        assert_eq!(parse(number(), "3px"), None);
    }

    #[test]
    fn strings_with_escapes() {
        assert_eq!(parse(string_literal(), r#""a\"b""#).as_deref(), Some("a\"b"));
        assert_eq!(parse(string_literal(), r"'line\n'").as_deref(), Some("line\n"));
        assert_eq!(parse(string_literal(), r"'\u0041\u{1F600}'").as_deref(), Some("A😀"));
        assert_eq!(parse(string_literal(), "'open"), None);
    }

    #[test]
    fn keywords_need_a_boundary() {
        assert!(parse(keyword("let"), "let ").is_some());
        assert!(parse(keyword("let"), "letter").is_none());
    }

    #[test]
    fn identifiers_reject_reserved_words() {
        assert_eq!(parse(identifier(), "count").as_deref(), Some("count"));
        assert_eq!(parse(identifier(), "$el_2").as_deref(), Some("$el_2"));
        assert!(parse(identifier(), "return").is_none());
        assert_eq!(parse(property_name(), "default").as_deref(), Some("default"));
    }

    #[test]
    fn operators_do_not_eat_longer_ones() {
        assert!(parse(op("=", "=>"), "= ").is_some());
        assert!(parse(op("=", "=>").then(any()), "==").is_none());
        assert!(parse(op("=", "=>").then(any()), "=>").is_none());
    }
}
