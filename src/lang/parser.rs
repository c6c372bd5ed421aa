//! Recursive-descent parser over the token stream. Grammar (design-level,
//! matching the language's token set exactly):
//!
//! ```text
//! expression := "not" expression | expression ("and"|"or") expression | term
//! term       := factor (cmp | "contains" | "matches") factor
//!             | factor "is" "not" factor
//!             | factor
//! factor     := identifier | number | constant | "(" expression ")" | "{" factor* "}"
//! ```
//!
//! `and`/`or` are right-associative; `not` binds tighter than them.

use std::rc::Rc;

use regex::Regex;

use crate::ast::{CompareOp, CompiledRegex, LiteralSetItem, LogicalOp, Node, NodeRef};
use crate::errors::LangError;
use crate::lang::lexer::{tokenize, Token};

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    errors: Vec<LangError>,
    /// `(pattern, compile error message)` pairs, kept separate from
    /// `errors` so callers can surface them as the spec's `regex` map
    /// instead of a flat diagnostic list.
    regex_errors: Vec<(String, String)>,
}

impl Parser {
    pub fn new(source: &str) -> Self {
        let (tokens, errors) = tokenize(source);
        Self { tokens, pos: 0, errors, regex_errors: Vec::new() }
    }

    /// Parse the full input as a single expression. Returns the tree, every
    /// lexical/syntactic diagnostic collected, and any regex literals that
    /// failed to compile (as `(pattern, message)` pairs); the tree should
    /// only be trusted when both diagnostic lists are empty.
    pub fn parse(mut self) -> (Option<NodeRef>, Vec<LangError>, Vec<(String, String)>) {
        if self.tokens.is_empty() {
            self.errors.push(LangError::UnexpectedEof {
                expected: "an expression".to_string(),
            });
            return (None, self.errors, self.regex_errors);
        }
        let node = self.parse_expression();
        if self.pos < self.tokens.len() {
            let remainder = format!("{:?}", &self.tokens[self.pos..]);
            self.errors.push(LangError::TrailingInput { remainder });
        }
        (node, self.errors, self.regex_errors)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn error_node(&mut self, expected: &str) -> NodeRef {
        let found = self
            .peek()
            .map(|t| format!("{t:?}"))
            .unwrap_or_else(|| "end of input".to_string());
        self.errors.push(LangError::UnexpectedToken {
            found,
            expected: expected.to_string(),
            position: self.pos,
        });
        Rc::new(Node::Undefined)
    }

    /// `or` has the lowest precedence and is right-associative.
    fn parse_expression(&mut self) -> NodeRef {
        let left = self.parse_and();
        if matches!(self.peek(), Some(Token::Or)) {
            self.advance();
            let right = self.parse_expression();
            return Rc::new(Node::Logical { op: LogicalOp::Or, left, right });
        }
        left
    }

    /// `and` binds tighter than `or`, is right-associative, and looser
    /// than `not`.
    fn parse_and(&mut self) -> NodeRef {
        let left = self.parse_unary();
        if matches!(self.peek(), Some(Token::And)) {
            self.advance();
            let right = self.parse_and();
            return Rc::new(Node::Logical { op: LogicalOp::And, left, right });
        }
        left
    }

    /// `not` binds tighter than both `and` and `or`.
    fn parse_unary(&mut self) -> NodeRef {
        if matches!(self.peek(), Some(Token::Not)) {
            self.advance();
            let operand = self.parse_unary();
            return Rc::new(Node::Negate(operand));
        }
        self.parse_term()
    }

    fn parse_term(&mut self) -> NodeRef {
        let left = self.parse_factor();

        let op = match self.peek() {
            Some(Token::Gt) => Some(CompareOp::Gt),
            Some(Token::GtEq) => Some(CompareOp::GtEq),
            Some(Token::Lt) => Some(CompareOp::Lt),
            Some(Token::LtEq) => Some(CompareOp::LtEq),
            Some(Token::Eq) => Some(CompareOp::Eq),
            Some(Token::NotEq) => Some(CompareOp::NotEq),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let right = self.parse_factor();
            return Rc::new(Node::Compare { op, left, right });
        }

        if matches!(self.peek(), Some(Token::Is)) {
            self.advance();
            let negated = matches!(self.peek(), Some(Token::Not));
            if negated {
                self.advance();
            }
            let right = self.parse_factor();
            let op = if negated { CompareOp::NotEq } else { CompareOp::Is };
            return Rc::new(Node::Compare { op, left, right });
        }

        if matches!(self.peek(), Some(Token::Contains)) {
            self.advance();
            let right = self.parse_factor();
            return Rc::new(Node::Contains { left, right });
        }

        if matches!(self.peek(), Some(Token::Matches)) {
            self.advance();
            let right = self.parse_regex_factor();
            return Rc::new(Node::Matches { left, right });
        }

        left
    }

    fn parse_factor(&mut self) -> NodeRef {
        match self.advance() {
            Some(Token::Ident(name)) => Rc::new(Node::Literal(name)),
            Some(Token::QuotedStr(s)) => Rc::new(Node::ConstantStr(s)),
            Some(Token::Number(n)) => Rc::new(Node::Number(n)),
            Some(Token::True) => Rc::new(Node::ConstantBool(true)),
            Some(Token::False) => Rc::new(Node::ConstantBool(false)),
            Some(Token::Null) => Rc::new(Node::ConstantNull),
            Some(Token::Undefined) => Rc::new(Node::Undefined),
            Some(Token::Empty) => Rc::new(Node::Empty),
            Some(Token::LParen) => {
                let inner = self.parse_expression();
                if !matches!(self.peek(), Some(Token::RParen)) {
                    return self.error_node("')'");
                }
                self.advance();
                inner
            }
            Some(Token::LBrace) => self.parse_literal_set(),
            _ => self.error_node("an identifier, literal, '(' or '{'"),
        }
    }

    fn parse_literal_set(&mut self) -> NodeRef {
        let mut items = Vec::new();
        loop {
            match self.peek() {
                Some(Token::RBrace) => {
                    self.advance();
                    break;
                }
                Some(Token::Number(n)) => {
                    items.push(LiteralSetItem::Num(*n));
                    self.advance();
                }
                Some(Token::QuotedStr(_)) | Some(Token::Ident(_)) => {
                    let text = match self.advance() {
                        Some(Token::QuotedStr(s)) | Some(Token::Ident(s)) => s,
                        _ => unreachable!(),
                    };
                    items.push(LiteralSetItem::Str(text));
                }
                _ => {
                    self.error_node("'}'");
                    break;
                }
            }
        }
        Rc::new(Node::LiteralSet(items))
    }

    /// The right operand of `matches` is compiled as a regular expression
    /// rather than treated as a plain string constant.
    fn parse_regex_factor(&mut self) -> NodeRef {
        let factor = self.parse_factor();
        match factor.as_ref() {
            Node::ConstantStr(pattern) | Node::Literal(pattern) => {
                match Regex::new(pattern) {
                    Ok(re) => Rc::new(Node::RegexLit(CompiledRegex {
                        source: pattern.clone(),
                        regex: std::sync::Arc::new(re),
                    })),
                    Err(e) => {
                        self.regex_errors.push((pattern.clone(), e.to_string()));
                        factor
                    }
                }
            }
            _ => factor,
        }
    }
}
