//! Recursive descent parser producing a [`Program`]

use super::ast::{AssignOp, BinaryOp, Builtin, Expr, Target, UnaryOp};
use super::lexer::{tokenize, Token, TokenKind};
use super::Program;
use crate::error::{LiveprogError, Result};
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;
use tracing::warn;

/// Maximum expression nesting
const MAX_DEPTH: usize = 128;

/// Slots every program starts with
pub const SLOT_SPL0: usize = 0;
pub const SLOT_SPL1: usize = 1;
pub const SLOT_SRATE: usize = 2;

#[derive(Default)]
struct Symbols {
    variables: Vec<String>,
    slots: HashMap<String, usize>,
    strings: Vec<String>,
}

impl Symbols {
    fn with_builtins() -> Self {
        let mut symbols = Self::default();
        for name in ["spl0", "spl1", "srate"] {
            symbols.slot(name);
        }
        symbols
    }

    fn slot(&mut self, name: &str) -> usize {
        if let Some(&slot) = self.slots.get(name) {
            return slot;
        }
        let slot = self.variables.len();
        self.variables.push(name.to_string());
        self.slots.insert(name.to_string(), slot);
        slot
    }

    fn intern(&mut self, text: String) -> usize {
        if let Some(i) = self.strings.iter().position(|s| *s == text) {
            return i;
        }
        self.strings.push(text);
        self.strings.len() - 1
    }
}

fn section_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"^\s*@(\w*)").unwrap_or_else(|e| unreachable!("static regex: {e}"))
    })
}

struct Section {
    name: String,
    first_line: usize,
    body: String,
}

/// Split source into `@name` sections; text before the first one is header
fn split_sections(source: &str) -> Vec<Section> {
    let mut sections: Vec<Section> = Vec::new();

    for (index, line) in source.lines().enumerate() {
        if let Some(caps) = section_regex().captures(line) {
            let end = caps.get(0).map_or(0, |m| m.end());
            let name = caps.get(1).map_or("", |m| m.as_str()).to_ascii_lowercase();
            let mut body = " ".repeat(end);
            body.push_str(&line[end..]);
            body.push('\n');
            sections.push(Section {
                name,
                first_line: index + 1,
                body,
            });
        } else if let Some(current) = sections.last_mut() {
            current.body.push_str(line);
            current.body.push('\n');
        }
    }

    sections
}

pub fn compile(source: &str) -> Result<Program> {
    let mut symbols = Symbols::with_builtins();
    let mut init: Option<Expr> = None;
    let mut sample: Option<Expr> = None;

    for section in split_sections(source) {
        let tokens = tokenize(&section.body, section.first_line)?;
        let mut parser = Parser {
            tokens,
            pos: 0,
            depth: 0,
            symbols: &mut symbols,
        };
        let code = parser.section()?;

        let slot = match section.name.as_str() {
            "init" => &mut init,
            "sample" => &mut sample,
            other => {
                warn!("Ignoring unsupported script section @{}", other);
                continue;
            }
        };
        *slot = Some(match slot.take() {
            Some(previous) => Expr::Seq(vec![previous, code]),
            None => code,
        });
    }

    Ok(Program {
        variables: symbols.variables,
        strings: symbols.strings,
        init,
        sample,
    })
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    symbols: &'a mut Symbols,
}

impl Parser<'_> {
    fn section(&mut self) -> Result<Expr> {
        let code = self.statements(&[])?;
        if !self.at(&TokenKind::Eof) {
            return Err(self.unexpected("';'"));
        }
        Ok(code)
    }

    fn peek(&self) -> &Token {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[self.pos.min(last)]
    }

    fn at(&self, kind: &TokenKind) -> bool {
        self.peek().kind == *kind
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> Result<()> {
        if self.eat(kind) {
            Ok(())
        } else {
            Err(self.unexpected(what))
        }
    }

    fn unexpected(&self, expected: &str) -> LiveprogError {
        let token = self.peek();
        LiveprogError::syntax(
            token.line,
            token.column,
            format!("expected {expected}, found {}", describe(&token.kind)),
        )
    }

    fn enter(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            let token = self.peek();
            return Err(LiveprogError::syntax(
                token.line,
                token.column,
                "expression nested too deeply",
            ));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// `;`-separated statements up to (not including) one of `until` or EOF
    fn statements(&mut self, until: &[TokenKind]) -> Result<Expr> {
        let mut items = Vec::new();
        loop {
            while self.eat(&TokenKind::Semicolon) {}
            if self.at(&TokenKind::Eof) || until.iter().any(|k| self.at(k)) {
                break;
            }
            items.push(self.assignment()?);
            if !self.eat(&TokenKind::Semicolon) {
                break;
            }
        }

        Ok(if items.len() == 1 {
            items.remove(0)
        } else {
            Expr::Seq(items)
        })
    }

    fn assignment(&mut self) -> Result<Expr> {
        self.enter()?;
        let lhs = self.ternary()?;

        let op = match self.peek().kind {
            TokenKind::Assign => Some(AssignOp::Set),
            TokenKind::PlusAssign => Some(AssignOp::Add),
            TokenKind::MinusAssign => Some(AssignOp::Sub),
            TokenKind::StarAssign => Some(AssignOp::Mul),
            TokenKind::SlashAssign => Some(AssignOp::Div),
            TokenKind::PercentAssign => Some(AssignOp::Mod),
            _ => None,
        };

        let result = match op {
            None => lhs,
            Some(op) => {
                let token = self.advance();
                let target = match lhs {
                    Expr::Var(slot) => Target::Var(slot),
                    Expr::Index(base, index) => Target::Mem(base, index),
                    _ => {
                        return Err(LiveprogError::syntax(
                            token.line,
                            token.column,
                            "left side of assignment is not assignable",
                        ))
                    }
                };
                let value = self.assignment()?;
                Expr::Assign(target, op, Box::new(value))
            }
        };
        self.leave();
        Ok(result)
    }

    fn ternary(&mut self) -> Result<Expr> {
        let cond = self.or()?;
        if !self.eat(&TokenKind::Question) {
            return Ok(cond);
        }

        let then = self.assignment()?;
        let other = if self.eat(&TokenKind::Colon) {
            self.assignment()?
        } else {
            Expr::Number(0.0)
        };
        Ok(Expr::Ternary(Box::new(cond), Box::new(then), Box::new(other)))
    }

    fn or(&mut self) -> Result<Expr> {
        let mut lhs = self.and()?;
        while self.eat(&TokenKind::OrOr) {
            let rhs = self.and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and(&mut self) -> Result<Expr> {
        let mut lhs = self.bit_or()?;
        while self.eat(&TokenKind::AndAnd) {
            let rhs = self.bit_or()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn bit_or(&mut self) -> Result<Expr> {
        let mut lhs = self.bit_and()?;
        while self.eat(&TokenKind::Pipe) {
            let rhs = self.bit_and()?;
            lhs = Expr::Binary(BinaryOp::BitOr, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn bit_and(&mut self) -> Result<Expr> {
        let mut lhs = self.comparison()?;
        while self.eat(&TokenKind::Amp) {
            let rhs = self.comparison()?;
            lhs = Expr::Binary(BinaryOp::BitAnd, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn comparison(&mut self) -> Result<Expr> {
        let mut lhs = self.additive()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::EqEq => BinaryOp::Eq,
                TokenKind::NotEq => BinaryOp::NotEq,
                TokenKind::Less => BinaryOp::Less,
                TokenKind::Greater => BinaryOp::Greater,
                TokenKind::LessEq => BinaryOp::LessEq,
                TokenKind::GreaterEq => BinaryOp::GreaterEq,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.additive()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn additive(&mut self) -> Result<Expr> {
        let mut lhs = self.multiplicative()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.multiplicative()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn multiplicative(&mut self) -> Result<Expr> {
        let mut lhs = self.power()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Mod,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.power()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn power(&mut self) -> Result<Expr> {
        let base = self.unary()?;
        if !self.eat(&TokenKind::Caret) {
            return Ok(base);
        }

        self.enter()?;
        let exponent = self.power()?;
        self.leave();
        Ok(Expr::Binary(BinaryOp::Pow, Box::new(base), Box::new(exponent)))
    }

    fn unary(&mut self) -> Result<Expr> {
        let op = match self.peek().kind {
            TokenKind::Minus => Some(UnaryOp::Neg),
            TokenKind::Bang => Some(UnaryOp::Not),
            TokenKind::Plus => None,
            _ => return self.postfix(),
        };
        self.advance();

        self.enter()?;
        let operand = self.unary()?;
        self.leave();
        Ok(match op {
            Some(op) => Expr::Unary(op, Box::new(operand)),
            None => operand,
        })
    }

    fn postfix(&mut self) -> Result<Expr> {
        let mut expr = self.primary()?;
        while self.eat(&TokenKind::LBracket) {
            let index = self.statements(&[TokenKind::RBracket])?;
            self.expect(&TokenKind::RBracket, "']'")?;
            expr = Expr::Index(Box::new(expr), Box::new(index));
        }
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Expr> {
        let token = self.advance();
        match token.kind {
            TokenKind::Number(value) => Ok(Expr::Number(value)),
            TokenKind::Str(text) => Ok(Expr::Str(self.symbols.intern(text))),
            TokenKind::Ident(name) => {
                if self.eat(&TokenKind::LParen) {
                    self.call(&name, token.line, token.column)
                } else {
                    Ok(Expr::Var(self.symbols.slot(&name)))
                }
            }
            TokenKind::LParen => {
                let inner = self.statements(&[TokenKind::RParen])?;
                self.expect(&TokenKind::RParen, "')'")?;
                Ok(inner)
            }
            other => Err(LiveprogError::syntax(
                token.line,
                token.column,
                format!("expected expression, found {}", describe(&other)),
            )),
        }
    }

    fn call(&mut self, name: &str, line: usize, column: usize) -> Result<Expr> {
        let Some(builtin) = Builtin::lookup(name) else {
            return Err(LiveprogError::syntax(
                line,
                column,
                format!("unknown function '{name}'"),
            ));
        };

        let mut args = Vec::new();
        if !self.eat(&TokenKind::RParen) {
            loop {
                args.push(self.statements(&[TokenKind::Comma, TokenKind::RParen])?);
                if self.eat(&TokenKind::Comma) {
                    continue;
                }
                self.expect(&TokenKind::RParen, "')'")?;
                break;
            }
        }

        let (min, max) = builtin.arity();
        if args.len() < min || args.len() > max {
            return Err(LiveprogError::syntax(
                line,
                column,
                format!("'{name}' called with {} arguments", args.len()),
            ));
        }
        Ok(Expr::Call(builtin, args))
    }
}

fn describe(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Number(v) => format!("number {v}"),
        TokenKind::Str(_) => "string".to_string(),
        TokenKind::Ident(name) => format!("'{name}'"),
        TokenKind::Eof => "end of section".to_string(),
        other => format!("{other:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_is_not_compiled() {
        let program = compile("desc: test\ngain:1<0,2>Gain\n@init\ngain = 1;").unwrap();
        assert!(program.init.is_some());
        assert!(program.sample.is_none());
    }

    #[test]
    fn builtin_slots_come_first() {
        let program = compile("@init\nfoo = 1;").unwrap();
        assert_eq!(program.variables[..4], ["spl0", "spl1", "srate", "foo"]);
    }

    #[test]
    fn precedence() {
        let program = compile("@init\nx = 1 + 2 * 3;").unwrap();
        let Some(Expr::Assign(_, AssignOp::Set, value)) = program.init else {
            panic!("expected assignment");
        };
        assert!(matches!(*value, Expr::Binary(BinaryOp::Add, _, _)));
    }

    #[test]
    fn rejects_assignment_to_literal() {
        assert!(matches!(
            compile("@init\n1 = 2;"),
            Err(LiveprogError::Syntax { line: 2, .. })
        ));
    }

    #[test]
    fn reports_unknown_function_position() {
        match compile("@init\nx = 1;\n  y = frobnicate(2);") {
            Err(LiveprogError::Syntax { line, column, .. }) => assert_eq!((line, column), (3, 7)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn rejects_wrong_arity() {
        assert!(compile("@init\nx = min(1);").is_err());
    }

    #[test]
    fn rejects_runaway_nesting() {
        let source = format!("@init\nx = {}1{};", "(".repeat(400), ")".repeat(400));
        assert!(compile(&source).is_err());
    }

    #[test]
    fn missing_semicolon_between_statements() {
        assert!(compile("@init\nx = 1\ny = 2;").is_err());
    }

    #[test]
    fn annotation_text_on_same_line_keeps_columns() {
        match compile("@init x = ;") {
            Err(LiveprogError::Syntax { line, column, .. }) => assert_eq!((line, column), (1, 11)),
            other => panic!("unexpected {other:?}"),
        }
    }
}
