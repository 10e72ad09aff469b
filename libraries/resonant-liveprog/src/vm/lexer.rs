//! Tokenizer for script section bodies

use crate::error::{LiveprogError, Result};
use std::f64::consts::{E, PI};

/// Golden ratio
const PHI: f64 = 1.618_033_988_749_895;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Number(f64),
    Str(String),
    Ident(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Semicolon,
    Question,
    Colon,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,
    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    PercentAssign,
    EqEq,
    NotEq,
    Less,
    Greater,
    LessEq,
    GreaterEq,
    AndAnd,
    OrOr,
    Amp,
    Pipe,
    Bang,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub column: usize,
}

/// Split `source` into tokens; `first_line` is the 1-based line of its first character
pub fn tokenize(source: &str, first_line: usize) -> Result<Vec<Token>> {
    Lexer {
        chars: source.chars().collect(),
        pos: 0,
        line: first_line,
        column: 1,
    }
    .run()
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
}

impl Lexer {
    fn run(mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia()?;
            let (line, column) = (self.line, self.column);
            let Some(c) = self.peek(0) else {
                tokens.push(Token {
                    kind: TokenKind::Eof,
                    line,
                    column,
                });
                return Ok(tokens);
            };

            let kind = if c.is_ascii_digit() || (c == '.' && self.peek(1).is_some_and(|n| n.is_ascii_digit())) {
                self.number(line, column)?
            } else if c.is_ascii_alphabetic() || c == '_' {
                TokenKind::Ident(self.ident())
            } else if c == '"' {
                self.string(line, column)?
            } else if c == '$' {
                self.constant(line, column)?
            } else {
                self.punct(line, column)?
            };
            tokens.push(Token { kind, line, column });
        }
    }

    fn peek(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.pos + ahead).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek(0)?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn skip_trivia(&mut self) -> Result<()> {
        loop {
            match (self.peek(0), self.peek(1)) {
                (Some(c), _) if c.is_whitespace() => {
                    self.bump();
                }
                (Some('/'), Some('/')) => {
                    while self.peek(0).is_some_and(|c| c != '\n') {
                        self.bump();
                    }
                }
                (Some('/'), Some('*')) => {
                    let (line, column) = (self.line, self.column);
                    self.bump();
                    self.bump();
                    loop {
                        match (self.peek(0), self.peek(1)) {
                            (Some('*'), Some('/')) => {
                                self.bump();
                                self.bump();
                                break;
                            }
                            (Some(_), _) => {
                                self.bump();
                            }
                            (None, _) => {
                                return Err(LiveprogError::syntax(
                                    line,
                                    column,
                                    "unterminated block comment",
                                ))
                            }
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn number(&mut self, line: usize, column: usize) -> Result<TokenKind> {
        if self.peek(0) == Some('0') && matches!(self.peek(1), Some('x' | 'X')) {
            self.bump();
            self.bump();
            let mut digits = String::new();
            while let Some(c) = self.peek(0).filter(char::is_ascii_hexdigit) {
                digits.push(c);
                self.bump();
            }
            return u64::from_str_radix(&digits, 16)
                .map(|v| TokenKind::Number(v as f64))
                .map_err(|_| LiveprogError::syntax(line, column, "invalid hex literal"));
        }

        let mut text = String::new();
        while let Some(c) = self.peek(0).filter(|c| c.is_ascii_digit() || *c == '.') {
            text.push(c);
            self.bump();
        }
        if matches!(self.peek(0), Some('e' | 'E'))
            && (self.peek(1).is_some_and(|c| c.is_ascii_digit())
                || (matches!(self.peek(1), Some('+' | '-'))
                    && self.peek(2).is_some_and(|c| c.is_ascii_digit())))
        {
            text.extend(self.bump());
            text.extend(self.bump());
            while let Some(c) = self.peek(0).filter(char::is_ascii_digit) {
                text.push(c);
                self.bump();
            }
        }

        text.parse()
            .map(TokenKind::Number)
            .map_err(|_| LiveprogError::syntax(line, column, format!("invalid number '{text}'")))
    }

    fn ident(&mut self) -> String {
        let mut name = String::new();
        while let Some(c) = self
            .peek(0)
            .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '.')
        {
            name.push(c.to_ascii_lowercase());
            self.bump();
        }
        name
    }

    fn string(&mut self, line: usize, column: usize) -> Result<TokenKind> {
        self.bump();
        let mut text = String::new();
        loop {
            match self.bump() {
                Some('"') => return Ok(TokenKind::Str(text)),
                Some('\\') => match self.bump() {
                    Some('n') => text.push('\n'),
                    Some('t') => text.push('\t'),
                    Some(other) => text.push(other),
                    None => break,
                },
                Some(c) => text.push(c),
                None => break,
            }
        }
        Err(LiveprogError::syntax(line, column, "unterminated string literal"))
    }

    fn constant(&mut self, line: usize, column: usize) -> Result<TokenKind> {
        self.bump();
        let name = self.ident();
        match name.as_str() {
            "pi" => Ok(TokenKind::Number(PI)),
            "e" => Ok(TokenKind::Number(E)),
            "phi" => Ok(TokenKind::Number(PHI)),
            _ => Err(LiveprogError::syntax(
                line,
                column,
                format!("unknown constant '${name}'"),
            )),
        }
    }

    fn punct(&mut self, line: usize, column: usize) -> Result<TokenKind> {
        let c = self.bump().unwrap_or('\0');
        let next = self.peek(0);
        let (kind, double) = match (c, next) {
            ('+', Some('=')) => (TokenKind::PlusAssign, true),
            ('-', Some('=')) => (TokenKind::MinusAssign, true),
            ('*', Some('=')) => (TokenKind::StarAssign, true),
            ('/', Some('=')) => (TokenKind::SlashAssign, true),
            ('%', Some('=')) => (TokenKind::PercentAssign, true),
            ('=', Some('=')) => (TokenKind::EqEq, true),
            ('!', Some('=')) => (TokenKind::NotEq, true),
            ('<', Some('=')) => (TokenKind::LessEq, true),
            ('>', Some('=')) => (TokenKind::GreaterEq, true),
            ('&', Some('&')) => (TokenKind::AndAnd, true),
            ('|', Some('|')) => (TokenKind::OrOr, true),
            ('+', _) => (TokenKind::Plus, false),
            ('-', _) => (TokenKind::Minus, false),
            ('*', _) => (TokenKind::Star, false),
            ('/', _) => (TokenKind::Slash, false),
            ('%', _) => (TokenKind::Percent, false),
            ('^', _) => (TokenKind::Caret, false),
            ('=', _) => (TokenKind::Assign, false),
            ('<', _) => (TokenKind::Less, false),
            ('>', _) => (TokenKind::Greater, false),
            ('&', _) => (TokenKind::Amp, false),
            ('|', _) => (TokenKind::Pipe, false),
            ('!', _) => (TokenKind::Bang, false),
            ('(', _) => (TokenKind::LParen, false),
            (')', _) => (TokenKind::RParen, false),
            ('[', _) => (TokenKind::LBracket, false),
            (']', _) => (TokenKind::RBracket, false),
            (',', _) => (TokenKind::Comma, false),
            (';', _) => (TokenKind::Semicolon, false),
            ('?', _) => (TokenKind::Question, false),
            (':', _) => (TokenKind::Colon, false),
            (other, _) => {
                return Err(LiveprogError::syntax(
                    line,
                    column,
                    format!("unexpected character '{other}'"),
                ))
            }
        };
        if double {
            self.bump();
        }
        Ok(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source, 1)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn numbers_and_constants() {
        assert_eq!(
            kinds("1.5 .25 0x10 1e3 $pi"),
            vec![
                TokenKind::Number(1.5),
                TokenKind::Number(0.25),
                TokenKind::Number(16.0),
                TokenKind::Number(1000.0),
                TokenKind::Number(PI),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn identifiers_are_lowercased() {
        assert_eq!(
            kinds("Gain.L"),
            vec![TokenKind::Ident("gain.l".into()), TokenKind::Eof]
        );
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(
            kinds("a // x\n/* y\n z */ b"),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::Ident("b".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn compound_operators() {
        assert_eq!(
            kinds("+= == && ||"),
            vec![
                TokenKind::PlusAssign,
                TokenKind::EqEq,
                TokenKind::AndAnd,
                TokenKind::OrOr,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn positions_track_lines() {
        let tokens = tokenize("a\n  b", 10).unwrap();
        assert_eq!((tokens[1].line, tokens[1].column), (11, 3));
    }

    #[test]
    fn unterminated_string_reports_start() {
        match tokenize("x = \"abc", 3) {
            Err(LiveprogError::Syntax { line, column, .. }) => assert_eq!((line, column), (3, 5)),
            other => panic!("unexpected {other:?}"),
        }
    }
}
