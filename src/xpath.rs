//
// Copyright (c) The yang-rs Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! YANG XPath 1.0 expressions.
//!
//! Expressions are parsed once into an [`Expr`] tree whose name tests are
//! bound to modules, and evaluated over either a data tree or the compiled
//! schema by [`eval`].

pub(crate) mod eval;

use crate::error::{Error, Result, ValidationErrorCode};

/// How prefixes in an expression or value are mapped to modules.
#[derive(Clone, Copy, Debug)]
pub enum PrefixFormat<'p> {
    /// Prefixes from the import table of the named module.
    Schema(&'p str),
    /// Prefixes are module names; unprefixed names inherit the module of
    /// the previous step.
    Json,
    /// Prefixes mapped to namespaces, `""` being the default namespace.
    Xml(&'p [(&'p str, &'p str)]),
}

/// Result of evaluating an expression.
#[derive(Clone, Debug, PartialEq)]
pub enum XPathValue<T> {
    NodeSet(Vec<T>),
    Boolean(bool),
    Number(f64),
    String(String),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum BinOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Union,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Axis {
    Child,
    Descendant,
    DescendantOrSelf,
    Parent,
    Ancestor,
    AncestorOrSelf,
    SelfNode,
    FollowingSibling,
    PrecedingSibling,
    Attribute,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct QName {
    pub prefix: Option<String>,
    pub name: String,
    pub module: Option<usize>,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum NodeTest {
    Name(QName),
    /// `*` or `prefix:*`.
    Wildcard(Option<QName>),
    Node,
    Text,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Step {
    pub axis: Axis,
    pub test: NodeTest,
    pub predicates: Vec<Expr>,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct LocationPath {
    pub absolute: bool,
    pub steps: Vec<Step>,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Expr {
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Neg(Box<Expr>),
    Literal(String),
    Number(f64),
    Function(String, Vec<Expr>),
    Path(LocationPath),
    /// Primary expression with predicates and a trailing relative path.
    Filter(Box<Expr>, Vec<Expr>, Vec<Step>),
}

#[derive(Clone, Debug, PartialEq)]
enum Token {
    LParen,
    RParen,
    LBracket,
    RBracket,
    Dot,
    DotDot,
    At,
    Comma,
    Slash,
    DoubleSlash,
    Pipe,
    Plus,
    Minus,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Multiply,
    Operator(BinOp),
    Name(Option<String>, String),
    Function(String),
    NodeType(String),
    Axis(Axis),
    Literal(String),
    Number(f64),
}

struct Parser<'e> {
    source: &'e str,
    tokens: Vec<Token>,
    pos: usize,
}

const FUNCTIONS: &[(&str, usize, Option<usize>)] = &[
    ("last", 0, Some(0)),
    ("position", 0, Some(0)),
    ("count", 1, Some(1)),
    ("name", 0, Some(1)),
    ("local-name", 0, Some(1)),
    ("namespace-uri", 0, Some(1)),
    ("string", 0, Some(1)),
    ("concat", 2, None),
    ("starts-with", 2, Some(2)),
    ("contains", 2, Some(2)),
    ("substring-before", 2, Some(2)),
    ("substring-after", 2, Some(2)),
    ("substring", 2, Some(3)),
    ("string-length", 0, Some(1)),
    ("normalize-space", 0, Some(1)),
    ("translate", 3, Some(3)),
    ("boolean", 1, Some(1)),
    ("not", 1, Some(1)),
    ("true", 0, Some(0)),
    ("false", 0, Some(0)),
    ("lang", 1, Some(1)),
    ("number", 0, Some(1)),
    ("sum", 1, Some(1)),
    ("floor", 1, Some(1)),
    ("ceiling", 1, Some(1)),
    ("round", 1, Some(1)),
    ("current", 0, Some(0)),
    ("re-match", 2, Some(2)),
    ("deref", 1, Some(1)),
    ("derived-from", 2, Some(2)),
    ("derived-from-or-self", 2, Some(2)),
    ("enum-value", 1, Some(1)),
    ("bit-is-set", 2, Some(2)),
];

// ===== impl Expr =====

impl Expr {
    /// Parses an XPath expression.
    pub(crate) fn parse(source: &str) -> Result<Expr> {
        let tokens = tokenize(source)?;
        let mut parser = Parser {
            source,
            tokens,
            pos: 0,
        };
        let expr = parser.or_expr()?;
        if parser.pos != parser.tokens.len() {
            return Err(parser.error("Unexpected trailing tokens"));
        }
        Ok(expr)
    }

    /// Binds prefixed name tests to modules. Unprefixed names are bound to
    /// `default` when one is given.
    pub(crate) fn resolve_prefixes<F>(
        &mut self,
        default: Option<usize>,
        resolve: &mut F,
    ) -> std::result::Result<(), String>
    where
        F: FnMut(&str) -> Option<usize>,
    {
        match self {
            Expr::Binary(_, left, right) => {
                left.resolve_prefixes(default, resolve)?;
                right.resolve_prefixes(default, resolve)
            }
            Expr::Neg(expr) => expr.resolve_prefixes(default, resolve),
            Expr::Literal(_) | Expr::Number(_) => Ok(()),
            Expr::Function(_, args) => {
                for arg in args {
                    arg.resolve_prefixes(default, resolve)?;
                }
                Ok(())
            }
            Expr::Path(path) => {
                resolve_steps(&mut path.steps, default, resolve)
            }
            Expr::Filter(primary, predicates, steps) => {
                primary.resolve_prefixes(default, resolve)?;
                for pred in predicates {
                    pred.resolve_prefixes(default, resolve)?;
                }
                resolve_steps(steps, default, resolve)
            }
        }
    }

    /// Visits every location step of the expression.
    pub(crate) fn for_each_step<F: FnMut(&Step)>(&self, f: &mut F) {
        match self {
            Expr::Binary(_, left, right) => {
                left.for_each_step(f);
                right.for_each_step(f);
            }
            Expr::Neg(expr) => expr.for_each_step(f),
            Expr::Literal(_) | Expr::Number(_) => {}
            Expr::Function(_, args) => {
                args.iter().for_each(|arg| arg.for_each_step(f))
            }
            Expr::Path(path) => steps_visit(&path.steps, f),
            Expr::Filter(primary, predicates, steps) => {
                primary.for_each_step(f);
                predicates.iter().for_each(|pred| pred.for_each_step(f));
                steps_visit(steps, f);
            }
        }
    }
}

fn steps_visit<F: FnMut(&Step)>(steps: &[Step], f: &mut F) {
    for step in steps {
        f(step);
        for pred in &step.predicates {
            pred.for_each_step(f);
        }
    }
}

fn resolve_qname<F>(
    qname: &mut QName,
    default: Option<usize>,
    resolve: &mut F,
) -> std::result::Result<(), String>
where
    F: FnMut(&str) -> Option<usize>,
{
    qname.module = match &qname.prefix {
        Some(prefix) => Some(
            resolve(prefix)
                .ok_or_else(|| format!("Unknown prefix \"{}\".", prefix))?,
        ),
        None => default,
    };
    Ok(())
}

fn resolve_steps<F>(
    steps: &mut [Step],
    default: Option<usize>,
    resolve: &mut F,
) -> std::result::Result<(), String>
where
    F: FnMut(&str) -> Option<usize>,
{
    for step in steps {
        match &mut step.test {
            NodeTest::Name(qname) => resolve_qname(qname, default, resolve)?,
            NodeTest::Wildcard(Some(qname)) => {
                resolve_qname(qname, default, resolve)?
            }
            _ => {}
        }
        for pred in &mut step.predicates {
            pred.resolve_prefixes(default, resolve)?;
        }
    }
    Ok(())
}

// ===== tokenizer =====

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.')
}

fn xpath_error(source: &str, msg: impl std::fmt::Display) -> Error {
    Error::valid(
        ValidationErrorCode::Xpath,
        format!("Invalid XPath expression \"{}\": {}.", source, msg),
    )
}

fn tokenize(source: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens: Vec<Token> = Vec::new();
    let mut i = 0;

    // XPath 1.0 §3.7 disambiguation: after these tokens `*` is a name test
    // and an NCName is a name rather than an operator.
    let operand_expected = |tokens: &[Token]| match tokens.last() {
        None => true,
        Some(token) => matches!(
            token,
            Token::At
                | Token::Axis(_)
                | Token::LParen
                | Token::LBracket
                | Token::Comma
                | Token::Operator(_)
                | Token::Slash
                | Token::DoubleSlash
                | Token::Pipe
                | Token::Plus
                | Token::Minus
                | Token::Eq
                | Token::Ne
                | Token::Lt
                | Token::Le
                | Token::Gt
                | Token::Ge
                | Token::Multiply
        ),
    };

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        let token = match c {
            '(' => Token::LParen,
            ')' => Token::RParen,
            '[' => Token::LBracket,
            ']' => Token::RBracket,
            '@' => Token::At,
            ',' => Token::Comma,
            '|' => Token::Pipe,
            '+' => Token::Plus,
            '-' => Token::Minus,
            '=' => Token::Eq,
            '!' if next == Some('=') => {
                i += 1;
                Token::Ne
            }
            '<' if next == Some('=') => {
                i += 1;
                Token::Le
            }
            '<' => Token::Lt,
            '>' if next == Some('=') => {
                i += 1;
                Token::Ge
            }
            '>' => Token::Gt,
            '/' if next == Some('/') => {
                i += 1;
                Token::DoubleSlash
            }
            '/' => Token::Slash,
            '.' if next == Some('.') => {
                i += 1;
                Token::DotDot
            }
            '.' if next.map(|n| n.is_ascii_digit()).unwrap_or(false) => {
                let start = i;
                i += 1;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                tokens.push(Token::Number(
                    text.parse().map_err(|_| xpath_error(source, "bad number"))?,
                ));
                continue;
            }
            '.' => Token::Dot,
            '"' | '\'' => {
                let quote = c;
                let start = i + 1;
                let mut end = start;
                while end < chars.len() && chars[end] != quote {
                    end += 1;
                }
                if end >= chars.len() {
                    return Err(xpath_error(source, "unterminated literal"));
                }
                tokens.push(Token::Literal(chars[start..end].iter().collect()));
                i = end + 1;
                continue;
            }
            '*' => {
                if operand_expected(&tokens) {
                    Token::Name(None, "*".to_owned())
                } else {
                    Token::Multiply
                }
            }
            c if c.is_ascii_digit() => {
                let start = i;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                if i < chars.len() && chars[i] == '.' {
                    i += 1;
                    while i < chars.len() && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                }
                let text: String = chars[start..i].iter().collect();
                tokens.push(Token::Number(
                    text.parse().map_err(|_| xpath_error(source, "bad number"))?,
                ));
                continue;
            }
            c if is_name_start(c) => {
                let start = i;
                while i < chars.len() && is_name_char(chars[i]) {
                    i += 1;
                }
                let first: String = chars[start..i].iter().collect();

                if !operand_expected(&tokens) {
                    let op = match first.as_str() {
                        "and" => BinOp::And,
                        "or" => BinOp::Or,
                        "mod" => BinOp::Mod,
                        "div" => BinOp::Div,
                        _ => {
                            return Err(xpath_error(
                                source,
                                format!("unexpected name \"{}\"", first),
                            ));
                        }
                    };
                    tokens.push(Token::Operator(op));
                    continue;
                }

                // Prefixed name or `prefix:*`.
                let mut prefix = None;
                let mut local = first;
                if i + 1 < chars.len()
                    && chars[i] == ':'
                    && chars[i + 1] != ':'
                {
                    if chars[i + 1] == '*' {
                        prefix = Some(local);
                        local = "*".to_owned();
                        i += 2;
                    } else if is_name_start(chars[i + 1]) {
                        let lstart = i + 1;
                        i += 1;
                        while i < chars.len() && is_name_char(chars[i]) {
                            i += 1;
                        }
                        prefix = Some(local);
                        local = chars[lstart..i].iter().collect();
                    }
                }

                // Look ahead for `(` or `::`.
                let mut j = i;
                while j < chars.len() && chars[j].is_whitespace() {
                    j += 1;
                }
                let token = if prefix.is_none()
                    && j + 1 < chars.len()
                    && chars[j] == ':'
                    && chars[j + 1] == ':'
                {
                    i = j + 2;
                    Token::Axis(match local.as_str() {
                        "child" => Axis::Child,
                        "descendant" => Axis::Descendant,
                        "descendant-or-self" => Axis::DescendantOrSelf,
                        "parent" => Axis::Parent,
                        "ancestor" => Axis::Ancestor,
                        "ancestor-or-self" => Axis::AncestorOrSelf,
                        "self" => Axis::SelfNode,
                        "following-sibling" => Axis::FollowingSibling,
                        "preceding-sibling" => Axis::PrecedingSibling,
                        "attribute" => Axis::Attribute,
                        other => {
                            return Err(xpath_error(
                                source,
                                format!("unsupported axis \"{}\"", other),
                            ));
                        }
                    })
                } else if prefix.is_none()
                    && j < chars.len()
                    && chars[j] == '('
                {
                    match local.as_str() {
                        "node" | "text" => Token::NodeType(local),
                        _ => Token::Function(local),
                    }
                } else {
                    Token::Name(prefix, local)
                };
                tokens.push(token);
                continue;
            }
            other => {
                return Err(xpath_error(
                    source,
                    format!("unexpected character '{}'", other),
                ));
            }
        };
        tokens.push(token);
        i += 1;
    }
    Ok(tokens)
}

// ===== impl Parser =====

impl Parser<'_> {
    fn error(&self, msg: impl std::fmt::Display) -> Error {
        xpath_error(self.source, msg)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token) -> Result<()> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.error(format!("expected {:?}", token)))
        }
    }

    fn binary<F>(
        &mut self,
        ops: &[(Token, BinOp)],
        mut next: F,
    ) -> Result<Expr>
    where
        F: FnMut(&mut Self) -> Result<Expr>,
    {
        let mut left = next(self)?;
        'outer: loop {
            for (token, op) in ops {
                if self.eat(token) {
                    let right = next(self)?;
                    left = Expr::Binary(*op, Box::new(left), Box::new(right));
                    continue 'outer;
                }
            }
            return Ok(left);
        }
    }

    fn or_expr(&mut self) -> Result<Expr> {
        self.binary(&[(Token::Operator(BinOp::Or), BinOp::Or)], Self::and_expr)
    }

    fn and_expr(&mut self) -> Result<Expr> {
        self.binary(&[(Token::Operator(BinOp::And), BinOp::And)], Self::eq_expr)
    }

    fn eq_expr(&mut self) -> Result<Expr> {
        self.binary(
            &[(Token::Eq, BinOp::Eq), (Token::Ne, BinOp::Ne)],
            Self::rel_expr,
        )
    }

    fn rel_expr(&mut self) -> Result<Expr> {
        self.binary(
            &[
                (Token::Le, BinOp::Le),
                (Token::Lt, BinOp::Lt),
                (Token::Ge, BinOp::Ge),
                (Token::Gt, BinOp::Gt),
            ],
            Self::add_expr,
        )
    }

    fn add_expr(&mut self) -> Result<Expr> {
        self.binary(
            &[(Token::Plus, BinOp::Add), (Token::Minus, BinOp::Sub)],
            Self::mul_expr,
        )
    }

    fn mul_expr(&mut self) -> Result<Expr> {
        self.binary(
            &[
                (Token::Multiply, BinOp::Mul),
                (Token::Operator(BinOp::Div), BinOp::Div),
                (Token::Operator(BinOp::Mod), BinOp::Mod),
            ],
            Self::unary_expr,
        )
    }

    fn unary_expr(&mut self) -> Result<Expr> {
        if self.eat(&Token::Minus) {
            let expr = self.unary_expr()?;
            return Ok(Expr::Neg(Box::new(expr)));
        }
        self.binary(&[(Token::Pipe, BinOp::Union)], Self::path_expr)
    }

    fn path_expr(&mut self) -> Result<Expr> {
        match self.peek() {
            Some(Token::Literal(_))
            | Some(Token::Number(_))
            | Some(Token::LParen)
            | Some(Token::Function(_)) => {
                let primary = self.primary_expr()?;
                let mut predicates = Vec::new();
                while self.peek() == Some(&Token::LBracket) {
                    predicates.push(self.predicate()?);
                }
                let mut steps = Vec::new();
                if self.peek() == Some(&Token::Slash)
                    || self.peek() == Some(&Token::DoubleSlash)
                {
                    self.relative_path(&mut steps, true)?;
                }
                if predicates.is_empty() && steps.is_empty() {
                    Ok(primary)
                } else {
                    Ok(Expr::Filter(Box::new(primary), predicates, steps))
                }
            }
            _ => self.location_path().map(Expr::Path),
        }
    }

    fn primary_expr(&mut self) -> Result<Expr> {
        match self.tokens.get(self.pos).cloned() {
            Some(Token::Literal(value)) => {
                self.pos += 1;
                Ok(Expr::Literal(value))
            }
            Some(Token::Number(value)) => {
                self.pos += 1;
                Ok(Expr::Number(value))
            }
            Some(Token::LParen) => {
                self.pos += 1;
                let expr = self.or_expr()?;
                self.expect(&Token::RParen)?;
                Ok(expr)
            }
            Some(Token::Function(name)) => {
                self.pos += 1;
                self.expect(&Token::LParen)?;
                let mut args = Vec::new();
                if !self.eat(&Token::RParen) {
                    loop {
                        args.push(self.or_expr()?);
                        if self.eat(&Token::RParen) {
                            break;
                        }
                        self.expect(&Token::Comma)?;
                    }
                }
                let (_, min, max) = FUNCTIONS
                    .iter()
                    .find(|(fname, _, _)| *fname == name)
                    .ok_or_else(|| {
                        self.error(format!("unknown function \"{}\"", name))
                    })?;
                if args.len() < *min || max.map(|m| args.len() > m).unwrap_or(false)
                {
                    return Err(self.error(format!(
                        "wrong number of arguments of \"{}\"",
                        name
                    )));
                }
                Ok(Expr::Function(name, args))
            }
            _ => Err(self.error("expected a primary expression")),
        }
    }

    fn predicate(&mut self) -> Result<Expr> {
        self.expect(&Token::LBracket)?;
        let expr = self.or_expr()?;
        self.expect(&Token::RBracket)?;
        Ok(expr)
    }

    fn starts_step(&self) -> bool {
        matches!(
            self.peek(),
            Some(Token::Name(..))
                | Some(Token::NodeType(_))
                | Some(Token::Axis(_))
                | Some(Token::At)
                | Some(Token::Dot)
                | Some(Token::DotDot)
        )
    }

    fn location_path(&mut self) -> Result<LocationPath> {
        let mut steps = Vec::new();
        match self.peek() {
            Some(Token::Slash) => {
                self.pos += 1;
                if self.starts_step() {
                    self.relative_path(&mut steps, false)?;
                }
                Ok(LocationPath {
                    absolute: true,
                    steps,
                })
            }
            Some(Token::DoubleSlash) => {
                self.relative_path(&mut steps, true)?;
                Ok(LocationPath {
                    absolute: true,
                    steps,
                })
            }
            _ => {
                self.relative_path(&mut steps, false)?;
                Ok(LocationPath {
                    absolute: false,
                    steps,
                })
            }
        }
    }

    // Reads steps separated by `/` or `//`; `leading` means a separator
    // precedes the first step.
    fn relative_path(&mut self, steps: &mut Vec<Step>, leading: bool) -> Result<()> {
        let mut need_sep = leading;
        loop {
            if need_sep {
                if self.eat(&Token::DoubleSlash) {
                    steps.push(Step {
                        axis: Axis::DescendantOrSelf,
                        test: NodeTest::Node,
                        predicates: Vec::new(),
                    });
                } else if !self.eat(&Token::Slash) {
                    return Ok(());
                }
            }
            steps.push(self.step()?);
            need_sep = true;
        }
    }

    fn step(&mut self) -> Result<Step> {
        if self.eat(&Token::Dot) {
            return Ok(Step {
                axis: Axis::SelfNode,
                test: NodeTest::Node,
                predicates: Vec::new(),
            });
        }
        if self.eat(&Token::DotDot) {
            return Ok(Step {
                axis: Axis::Parent,
                test: NodeTest::Node,
                predicates: Vec::new(),
            });
        }

        let mut axis = Axis::Child;
        if self.eat(&Token::At) {
            axis = Axis::Attribute;
        } else if let Some(Token::Axis(a)) = self.peek() {
            axis = *a;
            self.pos += 1;
        }

        let test = match self.tokens.get(self.pos).cloned() {
            Some(Token::Name(prefix, name)) => {
                self.pos += 1;
                if name == "*" {
                    NodeTest::Wildcard(prefix.map(|prefix| QName {
                        prefix: Some(prefix),
                        name,
                        module: None,
                    }))
                } else {
                    NodeTest::Name(QName {
                        prefix,
                        name,
                        module: None,
                    })
                }
            }
            Some(Token::NodeType(kind)) => {
                self.pos += 1;
                self.expect(&Token::LParen)?;
                self.expect(&Token::RParen)?;
                if kind == "text" {
                    NodeTest::Text
                } else {
                    NodeTest::Node
                }
            }
            _ => return Err(self.error("expected a node test")),
        };

        let mut predicates = Vec::new();
        while self.peek() == Some(&Token::LBracket) {
            predicates.push(self.predicate()?);
        }
        Ok(Step {
            axis,
            test,
            predicates,
        })
    }
}

// ===== unit tests =====

#[cfg(test)]
mod tests {
    use super::*;

    fn name(expr: &Expr) -> Vec<String> {
        let mut names = Vec::new();
        expr.for_each_step(&mut |step| {
            if let NodeTest::Name(qname) = &step.test {
                names.push(qname.name.clone());
            }
        });
        names
    }

    #[test]
    fn paths_and_predicates() {
        let expr = Expr::parse(
            "/if:interfaces/if:interface[if:name = current()/../ifname]/if:mtu",
        )
        .unwrap();
        assert_eq!(name(&expr), vec!["interfaces", "interface", "name", "ifname", "mtu"]);
        match expr {
            Expr::Path(path) => {
                assert!(path.absolute);
                assert_eq!(path.steps.len(), 3);
                assert_eq!(path.steps[1].predicates.len(), 1);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn operators_and_names() {
        // `div` as an operator, `mod` as a node name.
        let expr = Expr::parse("mod div 2 * count(*)").unwrap();
        match expr {
            Expr::Binary(BinOp::Mul, left, right) => {
                assert!(matches!(*left, Expr::Binary(BinOp::Div, _, _)));
                assert!(matches!(*right, Expr::Function(ref f, _) if f == "count"));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(Expr::parse("../type = 'eth' and not(../mtu > 1500)").is_ok());
        assert!(Expr::parse("-1 - -2").is_ok());
    }

    #[test]
    fn abbreviated_steps() {
        let expr = Expr::parse("//a/./../@b").unwrap();
        let Expr::Path(path) = expr else {
            panic!("expected a path");
        };
        let axes: Vec<Axis> = path.steps.iter().map(|s| s.axis).collect();
        assert_eq!(
            axes,
            vec![
                Axis::DescendantOrSelf,
                Axis::Child,
                Axis::SelfNode,
                Axis::Parent,
                Axis::Attribute
            ]
        );
    }

    #[test]
    fn errors() {
        assert!(Expr::parse("foo(1)").is_err());
        assert!(Expr::parse("a[").is_err());
        assert!(Expr::parse("'open").is_err());
        assert!(Expr::parse("count()").is_err());
    }

    #[test]
    fn prefix_resolution() {
        let mut expr = Expr::parse("a:x/y").unwrap();
        expr.resolve_prefixes(Some(7), &mut |p: &str| (p == "a").then_some(3))
            .unwrap();
        let mut modules = Vec::new();
        expr.for_each_step(&mut |step| {
            if let NodeTest::Name(qname) = &step.test {
                modules.push(qname.module);
            }
        });
        assert_eq!(modules, vec![Some(3), Some(7)]);
        let mut expr = Expr::parse("b:x").unwrap();
        assert!(expr.resolve_prefixes(None, &mut |_: &str| None).is_err());
    }
}
