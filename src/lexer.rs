//! A hand-written cursor lexer for the option list inside a $expand or
//! $select term's parentheses.
//!
//! The cursor only ever moves forward. Option values are not tokenized at
//! all: [`OptionLexer::advance_through_balanced_value`] returns them as raw
//! text spans so that nested expressions (which follow their own grammars)
//! can be handed to the appropriate sub-parser untouched.

use crate::error::UriParseError;

/// The category of a single lexical token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Identifier,
    StringLiteral,
    NumberLiteral,
    OpenParen,
    CloseParen,
    Equal,
    Semicolon,
    Comma,
    /// Any other single character (operator punctuation such as `/` or `*`).
    Punctuation,
    End,
}

/// One lexical token: its kind, raw text, and byte offset in the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    pub position: usize,
}

/// A forward-only lexer over one option list's text.
pub struct OptionLexer<'a> {
    text: &'a str,
    /// Byte offset of the first character not yet consumed by `token`.
    pos: usize,
    token: Token<'a>,
}

impl<'a> OptionLexer<'a> {
    /// Creates a lexer positioned on the first token of `text`.
    pub fn new(text: &'a str) -> Result<Self, UriParseError> {
        let mut lexer = OptionLexer {
            text,
            pos: 0,
            token: Token {
                kind: TokenKind::End,
                text: "",
                position: 0,
            },
        };
        lexer.advance()?;
        Ok(lexer)
    }

    /// The full text this lexer was constructed over.
    pub fn text(&self) -> &'a str {
        self.text
    }

    /// The token at the cursor.
    pub fn current(&self) -> Token<'a> {
        self.token
    }

    /// Moves the cursor to the next token.
    pub fn advance(&mut self) -> Result<(), UriParseError> {
        let bytes = self.text.as_bytes();
        let mut i = self.pos;
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() {
            self.pos = self.text.len();
            self.token = Token {
                kind: TokenKind::End,
                text: "",
                position: self.text.len(),
            };
            return Ok(());
        }

        let start = i;
        let kind = match bytes[i] {
            b'(' => {
                i += 1;
                TokenKind::OpenParen
            }
            b')' => {
                i += 1;
                TokenKind::CloseParen
            }
            b'=' => {
                i += 1;
                TokenKind::Equal
            }
            b';' => {
                i += 1;
                TokenKind::Semicolon
            }
            b',' => {
                i += 1;
                TokenKind::Comma
            }
            b'\'' => {
                i = skip_quoted(self.text, i)?;
                TokenKind::StringLiteral
            }
            b'0'..=b'9' => {
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
                if bytes.get(i) == Some(&b'.')
                    && bytes.get(i + 1).is_some_and(|b| b.is_ascii_digit())
                {
                    i += 1;
                    while i < bytes.len() && bytes[i].is_ascii_digit() {
                        i += 1;
                    }
                }
                TokenKind::NumberLiteral
            }
            b if b.is_ascii_alphabetic() || b == b'_' || b == b'$' => {
                i += 1;
                while i < bytes.len()
                    && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_')
                {
                    i += 1;
                }
                TokenKind::Identifier
            }
            _ => {
                // Consume exactly one character, which may be multi-byte.
                let ch = self.text[i..].chars().next();
                i += ch.map(|c| c.len_utf8()).unwrap_or(1);
                TokenKind::Punctuation
            }
        };

        self.token = Token {
            kind,
            text: &self.text[start..i],
            position: start,
        };
        self.pos = i;
        Ok(())
    }

    /// Reads the raw text of an option value: everything after the current
    /// `=` token up to the first `;` or `)` at parenthesis-nesting depth
    /// zero relative to the scan start. Quoted literals and nested
    /// parenthesized regions are skipped as opaque spans, so a `;` inside a
    /// nested `$expand=...(...)` or inside a string does not terminate the
    /// value. Leaves the cursor on the terminating token.
    pub fn advance_through_balanced_value(&mut self) -> Result<&'a str, UriParseError> {
        if self.token.kind != TokenKind::Equal {
            return Err(UriParseError::MalformedOption(
                self.text.to_string(),
                format!(
                    "expected '=' before an option value, found '{}'",
                    self.token.text
                ),
            ));
        }
        let bytes = self.text.as_bytes();
        let start = self.pos;
        let mut depth = 0usize;
        let mut i = start;
        while i < bytes.len() {
            match bytes[i] {
                b'\'' => {
                    i = skip_quoted(self.text, i)?;
                    continue;
                }
                b'(' => depth += 1,
                b')' if depth == 0 => break,
                b')' => depth -= 1,
                b';' if depth == 0 => break,
                _ => {}
            }
            i += 1;
        }
        let value = self.text[start..i].trim();
        self.pos = i;
        self.advance()?;
        Ok(value)
    }
}

/// Returns the byte offset just past the closing quote of the string
/// literal opening at `open`. An embedded quote is escaped by doubling it.
pub(crate) fn skip_quoted(text: &str, open: usize) -> Result<usize, UriParseError> {
    let bytes = text.as_bytes();
    debug_assert_eq!(bytes.get(open), Some(&b'\''));
    let mut i = open + 1;
    while i < bytes.len() {
        if bytes[i] == b'\'' {
            if bytes.get(i + 1) == Some(&b'\'') {
                i += 2;
                continue;
            }
            return Ok(i + 1);
        }
        i += 1;
    }
    Err(UriParseError::Lexical(
        text.to_string(),
        format!("unterminated string literal starting at position {open}"),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(text: &str) -> Vec<TokenKind> {
        let mut lexer = OptionLexer::new(text).unwrap();
        let mut out = Vec::new();
        while lexer.current().kind != TokenKind::End {
            out.push(lexer.current().kind);
            lexer.advance().unwrap();
        }
        out
    }

    #[test]
    fn test_tokenize_option_list() {
        assert_eq!(
            kinds("($top=5;$count=true)"),
            vec![
                TokenKind::OpenParen,
                TokenKind::Identifier,
                TokenKind::Equal,
                TokenKind::NumberLiteral,
                TokenKind::Semicolon,
                TokenKind::Identifier,
                TokenKind::Equal,
                TokenKind::Identifier,
                TokenKind::CloseParen,
            ]
        );
    }

    #[test]
    fn test_identifier_text_and_position() {
        let mut lexer = OptionLexer::new("  $filter = x").unwrap();
        assert_eq!(lexer.current().kind, TokenKind::Identifier);
        assert_eq!(lexer.current().text, "$filter");
        assert_eq!(lexer.current().position, 2);
        lexer.advance().unwrap();
        assert_eq!(lexer.current().kind, TokenKind::Equal);
    }

    #[test]
    fn test_string_literal_with_doubled_quote() {
        let mut lexer = OptionLexer::new("'it''s' x").unwrap();
        assert_eq!(lexer.current().kind, TokenKind::StringLiteral);
        assert_eq!(lexer.current().text, "'it''s'");
        lexer.advance().unwrap();
        assert_eq!(lexer.current().text, "x");
    }

    #[test]
    fn test_unterminated_string_literal_fails() {
        let result = OptionLexer::new("'abc");
        assert!(matches!(result, Err(UriParseError::Lexical(_, _))));
    }

    #[test]
    fn test_number_with_fraction() {
        let mut lexer = OptionLexer::new("3.14)").unwrap();
        assert_eq!(lexer.current().kind, TokenKind::NumberLiteral);
        assert_eq!(lexer.current().text, "3.14");
        lexer.advance().unwrap();
        assert_eq!(lexer.current().kind, TokenKind::CloseParen);
    }

    #[test]
    fn test_punctuation_catch_all() {
        assert_eq!(
            kinds("a/b"),
            vec![
                TokenKind::Identifier,
                TokenKind::Punctuation,
                TokenKind::Identifier
            ]
        );
    }

    fn read_value(text: &str) -> (String, TokenKind) {
        let mut lexer = OptionLexer::new(text).unwrap();
        assert_eq!(lexer.current().kind, TokenKind::Equal);
        let value = lexer.advance_through_balanced_value().unwrap().to_string();
        (value, lexer.current().kind)
    }

    #[test]
    fn test_value_scan_stops_at_top_level_semicolon() {
        let (value, kind) = read_value("=Amount gt 10;$top=5");
        assert_eq!(value, "Amount gt 10");
        assert_eq!(kind, TokenKind::Semicolon);
    }

    #[test]
    fn test_value_scan_stops_at_top_level_close_paren() {
        let (value, kind) = read_value("=Amount gt 10)");
        assert_eq!(value, "Amount gt 10");
        assert_eq!(kind, TokenKind::CloseParen);
    }

    #[test]
    fn test_value_scan_skips_nested_parens() {
        let (value, kind) = read_value("=B($filter=x;$top=2))");
        assert_eq!(value, "B($filter=x;$top=2)");
        assert_eq!(kind, TokenKind::CloseParen);
    }

    #[test]
    fn test_value_scan_ignores_semicolon_inside_string() {
        let (value, kind) = read_value("=x eq 'a;b';$top=1");
        assert_eq!(value, "x eq 'a;b'");
        assert_eq!(kind, TokenKind::Semicolon);
    }

    #[test]
    fn test_value_scan_requires_equal_sign() {
        let mut lexer = OptionLexer::new("abc").unwrap();
        let result = lexer.advance_through_balanced_value();
        assert!(matches!(result, Err(UriParseError::MalformedOption(_, _))));
    }

    #[test]
    fn test_value_scan_runs_to_end_of_input() {
        let (value, kind) = read_value("=Amount gt 10");
        assert_eq!(value, "Amount gt 10");
        assert_eq!(kind, TokenKind::End);
    }
}
