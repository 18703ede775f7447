//! Lexer: source bytes to a token stream.

use std::fmt;

use crate::source::{SourceBuffer, SourceLocation};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    // literals / identifiers
    Int,
    Float,
    Str,
    Ident,
    // keywords
    Fn,
    Let,
    Const,
    Mut,
    If,
    Else,
    Return,
    Struct,
    Enum,
    Match,
    For,
    While,
    Loop,
    Import,
    Async,
    Await,
    Comptime,
    True,
    False,
    // punctuation
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Colon,
    Semicolon,
    Question,
    Arrow,
    FatArrow,
    // operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    EqEq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    AndAnd,
    OrOr,
    Amp,
    Eq,
    Bang,
    Eof,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LexError {
    InvalidCharacter { ch: char, location: SourceLocation },
    UnterminatedString { location: SourceLocation },
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LexError::InvalidCharacter { ch, location } => {
                write!(f, "invalid character '{}' at {}", ch, location)
            }
            LexError::UnterminatedString { location } => {
                write!(f, "unterminated string literal starting at {}", location)
            }
        }
    }
}

impl std::error::Error for LexError {}

impl From<&LexError> for crate::diagnostics::Diagnostic {
    fn from(err: &LexError) -> Self {
        match err {
            LexError::InvalidCharacter { location, .. } | LexError::UnterminatedString { location } => {
                crate::diagnostics::Diagnostic::error(err.to_string(), *location)
            }
        }
    }
}

fn keyword(ident: &str) -> Option<TokenKind> {
    Some(match ident {
        "fn" => TokenKind::Fn,
        "let" => TokenKind::Let,
        "const" => TokenKind::Const,
        "mut" => TokenKind::Mut,
        "if" => TokenKind::If,
        "else" => TokenKind::Else,
        "return" => TokenKind::Return,
        "struct" => TokenKind::Struct,
        "enum" => TokenKind::Enum,
        "match" => TokenKind::Match,
        "for" => TokenKind::For,
        "while" => TokenKind::While,
        "loop" => TokenKind::Loop,
        "import" => TokenKind::Import,
        "async" => TokenKind::Async,
        "await" => TokenKind::Await,
        "comptime" => TokenKind::Comptime,
        "true" => TokenKind::True,
        "false" => TokenKind::False,
        "and" => TokenKind::AndAnd,
        "or" => TokenKind::OrOr,
        _ => return None,
    })
}

/// Streams tokens out of a source buffer. Recoverable lexical errors are
/// accumulated rather than aborting the scan, matching the parser's own
/// error-continuation style one stage up.
pub struct Lexer<'s> {
    buf: &'s SourceBuffer,
    pos: usize,
    errors: Vec<LexError>,
}

impl<'s> Lexer<'s> {
    pub fn new(buf: &'s SourceBuffer) -> Self {
        Lexer {
            buf,
            pos: 0,
            errors: Vec::new(),
        }
    }

    pub fn tokenize(mut self) -> (Vec<Token>, Vec<LexError>) {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia();
            let start = self.pos;
            let location = self.buf.location_for_offset(start);
            let Some(ch) = self.peek() else {
                tokens.push(Token {
                    kind: TokenKind::Eof,
                    lexeme: String::new(),
                    location,
                });
                break;
            };

            let kind = if ch.is_ascii_digit() {
                self.lex_number()
            } else if is_ident_start(ch) {
                self.lex_ident_or_keyword()
            } else if ch == '"' {
                match self.lex_string(location) {
                    Some(kind) => kind,
                    None => continue,
                }
            } else {
                match self.lex_operator() {
                    Some(kind) => kind,
                    None => {
                        self.errors.push(LexError::InvalidCharacter { ch, location });
                        self.advance();
                        continue;
                    }
                }
            };

            let lexeme = self.buf.slice(start, self.pos).to_string();
            tokens.push(Token {
                kind,
                lexeme,
                location,
            });
        }
        (tokens, self.errors)
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('/') if self.peek_at(1) == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                Some('/') if self.peek_at(1) == Some('*') => {
                    self.advance();
                    self.advance();
                    while let Some(c) = self.peek() {
                        if c == '*' && self.peek_at(1) == Some('/') {
                            self.advance();
                            self.advance();
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn lex_number(&mut self) -> TokenKind {
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
        // A `.` only continues a float if followed by a digit; `3.foo()`
        // must tokenize as `3` `.` `foo`, not a malformed float.
        if self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
            return TokenKind::Float;
        }
        TokenKind::Int
    }

    fn lex_ident_or_keyword(&mut self) -> TokenKind {
        let start = self.pos;
        while self.peek().is_some_and(is_ident_continue) {
            self.advance();
        }
        let text = self.buf.slice(start, self.pos);
        keyword(text).unwrap_or(TokenKind::Ident)
    }

    fn lex_string(&mut self, location: SourceLocation) -> Option<TokenKind> {
        self.advance(); // opening quote
        loop {
            match self.peek() {
                None => {
                    self.errors.push(LexError::UnterminatedString { location });
                    return None;
                }
                Some('"') => {
                    self.advance();
                    return Some(TokenKind::Str);
                }
                Some('\\') => {
                    self.advance();
                    if self.peek().is_some() {
                        self.advance();
                    }
                }
                Some('\n') => {
                    self.errors.push(LexError::UnterminatedString { location });
                    return None;
                }
                Some(_) => {
                    self.advance();
                }
            }
        }
    }

    fn lex_operator(&mut self) -> Option<TokenKind> {
        let two = |a: char, b: Option<char>| b == Some(a);
        let c = self.peek()?;
        let kind = match c {
            '(' => {
                self.advance();
                TokenKind::LParen
            }
            ')' => {
                self.advance();
                TokenKind::RParen
            }
            '{' => {
                self.advance();
                TokenKind::LBrace
            }
            '}' => {
                self.advance();
                TokenKind::RBrace
            }
            '[' => {
                self.advance();
                TokenKind::LBracket
            }
            ']' => {
                self.advance();
                TokenKind::RBracket
            }
            ',' => {
                self.advance();
                TokenKind::Comma
            }
            '.' => {
                self.advance();
                TokenKind::Dot
            }
            ':' => {
                self.advance();
                TokenKind::Colon
            }
            ';' => {
                self.advance();
                TokenKind::Semicolon
            }
            '?' => {
                self.advance();
                TokenKind::Question
            }
            '+' => {
                self.advance();
                TokenKind::Plus
            }
            '-' => {
                self.advance();
                if two('>', self.peek()) {
                    self.advance();
                    TokenKind::Arrow
                } else {
                    TokenKind::Minus
                }
            }
            '*' => {
                self.advance();
                TokenKind::Star
            }
            '/' => {
                self.advance();
                TokenKind::Slash
            }
            '%' => {
                self.advance();
                TokenKind::Percent
            }
            '=' => {
                self.advance();
                if two('=', self.peek()) {
                    self.advance();
                    TokenKind::EqEq
                } else if two('>', self.peek()) {
                    self.advance();
                    TokenKind::FatArrow
                } else {
                    TokenKind::Eq
                }
            }
            '!' => {
                self.advance();
                if two('=', self.peek()) {
                    self.advance();
                    TokenKind::NotEq
                } else {
                    TokenKind::Bang
                }
            }
            '<' => {
                self.advance();
                if two('=', self.peek()) {
                    self.advance();
                    TokenKind::LtEq
                } else {
                    TokenKind::Lt
                }
            }
            '>' => {
                self.advance();
                if two('=', self.peek()) {
                    self.advance();
                    TokenKind::GtEq
                } else {
                    TokenKind::Gt
                }
            }
            '&' => {
                self.advance();
                if two('&', self.peek()) {
                    self.advance();
                    TokenKind::AndAnd
                } else {
                    TokenKind::Amp
                }
            }
            '|' => {
                self.advance();
                if two('|', self.peek()) {
                    self.advance();
                    TokenKind::OrOr
                } else {
                    return None;
                }
            }
            _ => return None,
        };
        Some(kind)
    }

    /// Reads the source as UTF-8 codepoints, not raw bytes, so a multi-byte
    /// character lexes as one `char` instead of several invalid ones; `pos`
    /// always sits on a codepoint boundary because `advance` only ever steps
    /// by a whole codepoint's byte length.
    fn peek(&self) -> Option<char> {
        self.buf.text()[self.pos..].chars().next()
    }

    /// Looks `ahead` whole codepoints past the current position (`ahead = 1`
    /// is the codepoint right after the one `peek` returns).
    fn peek_at(&self, ahead: usize) -> Option<char> {
        let mut chars = self.buf.text()[self.pos..].chars();
        for _ in 0..ahead {
            chars.next()?;
        }
        chars.next()
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += c.len_utf8();
        } else {
            self.pos += 1;
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(src: &str) -> (Vec<Token>, Vec<LexError>) {
        let buf = SourceBuffer::new("test.home", src.to_string());
        let (tokens, errors) = Lexer::new(&buf).tokenize();
        (tokens, errors)
    }

    #[test]
    fn keywords_and_identifiers() {
        let (tokens, errors) = lex("fn main let mutable");
        assert!(errors.is_empty());
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Fn,
                TokenKind::Ident,
                TokenKind::Let,
                TokenKind::Ident,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn number_then_dot_call_does_not_merge_into_float() {
        let (tokens, _) = lex("3.foo()");
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Int,
                TokenKind::Dot,
                TokenKind::Ident,
                TokenKind::LParen,
                TokenKind::RParen,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn float_literal() {
        let (tokens, _) = lex("3.14");
        assert_eq!(tokens[0].kind, TokenKind::Float);
        assert_eq!(tokens[0].lexeme, "3.14");
    }

    #[test]
    fn maximal_munch_operators() {
        let (tokens, errors) = lex("== != <= >= && || -> =>");
        assert!(errors.is_empty());
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::EqEq,
                TokenKind::NotEq,
                TokenKind::LtEq,
                TokenKind::GtEq,
                TokenKind::AndAnd,
                TokenKind::OrOr,
                TokenKind::Arrow,
                TokenKind::FatArrow,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn unterminated_string_is_recoverable() {
        let (tokens, errors) = lex("\"hello");
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], LexError::UnterminatedString { .. }));
        // lexing continues afterward and still yields Eof
        assert_eq!(tokens.last().unwrap().kind, TokenKind::Eof);
    }

    #[test]
    fn invalid_character_is_skipped_and_recorded() {
        let (tokens, errors) = lex("let a = 1 @ 2");
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], LexError::InvalidCharacter { ch: '@', .. }));
        assert!(tokens.iter().any(|t| t.kind == TokenKind::Int));
    }

    #[test]
    fn line_comment_is_skipped() {
        let (tokens, errors) = lex("let a = 1 // trailing comment\nlet b = 2");
        assert!(errors.is_empty());
        assert_eq!(tokens.iter().filter(|t| t.kind == TokenKind::Let).count(), 2);
    }

    #[test]
    fn block_comment_is_skipped() {
        let (tokens, errors) = lex("let /* not nested */ a = 1");
        assert!(errors.is_empty());
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Let,
                TokenKind::Ident,
                TokenKind::Eq,
                TokenKind::Int,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn multi_byte_utf8_in_a_comment_does_not_corrupt_the_next_token() {
        let (tokens, errors) = lex("// héllo wörld 日本語\nlet a = 1");
        assert!(errors.is_empty());
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Let,
                TokenKind::Ident,
                TokenKind::Eq,
                TokenKind::Int,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn multi_byte_utf8_in_a_string_literal_round_trips() {
        let (tokens, errors) = lex("\"caf\u{e9}\"");
        assert!(errors.is_empty());
        assert_eq!(tokens[0].kind, TokenKind::Str);
        assert_eq!(tokens[0].lexeme, "\"caf\u{e9}\"");
    }

    #[test]
    fn string_literal_lexeme_round_trips() {
        let (tokens, errors) = lex("\"hi\\n\"");
        assert!(errors.is_empty());
        assert_eq!(tokens[0].kind, TokenKind::Str);
        assert_eq!(tokens[0].lexeme, "\"hi\\n\"");
    }
}
