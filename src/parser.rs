//
// Copyright (c) The yang-rs Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! YANG and YIN statement parsers.
//!
//! Both input formats are first read into a generic [`Stmt`] tree which is
//! then turned into a typed [`ParsedModule`](crate::schema::ParsedModule).

pub(crate) mod yin;

use crate::error::{Error, Result};
use crate::schema::parsed::{self, ParsedModule};
use crate::schema::SchemaInputFormat;

/// A generic YANG statement: keyword, optional argument and substatements.
///
/// Extension instances keep their prefixed keyword (`prefix:name`).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Stmt {
    pub keyword: String,
    pub arg: Option<String>,
    pub line: u64,
    pub substmts: Vec<Stmt>,
}

#[derive(Debug, Eq, PartialEq)]
enum Token {
    Word(String),
    Quoted(String),
    Semicolon,
    LeftBrace,
    RightBrace,
    Plus,
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: u64,
    column: usize,
}

// ===== impl Stmt =====

impl Stmt {
    pub(crate) fn new(keyword: &str, arg: Option<&str>) -> Stmt {
        Stmt {
            keyword: keyword.to_owned(),
            arg: arg.map(str::to_owned),
            line: 0,
            substmts: Vec::new(),
        }
    }

    /// Returns the prefix of an extension instance keyword.
    pub fn prefix(&self) -> Option<&str> {
        self.keyword.split_once(':').map(|(prefix, _)| prefix)
    }

    pub fn is_extension(&self) -> bool {
        self.keyword.contains(':')
    }

    pub(crate) fn find(&self, keyword: &str) -> Option<&Stmt> {
        self.substmts.iter().find(|s| s.keyword == keyword)
    }

    pub(crate) fn find_arg(&self, keyword: &str) -> Option<&str> {
        self.find(keyword).and_then(|s| s.arg.as_deref())
    }
}

// ===== impl Lexer =====

impl Lexer {
    fn new(source: &str) -> Lexer {
        Lexer {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        match c {
            '\n' => {
                self.line += 1;
                self.column = 0;
            }
            '\t' => self.column += 8 - self.column % 8,
            _ => self.column += 1,
        }
        Some(c)
    }

    fn error(&self, msg: impl Into<String>) -> Error {
        Error::syntax_yang(self.line, msg)
    }

    // Skips whitespace and comments.
    fn skip_separators(&mut self) -> Result<()> {
        loop {
            match (self.peek(), self.peek_at(1)) {
                (Some(c), _) if c.is_whitespace() => {
                    self.bump();
                }
                (Some('/'), Some('/')) => {
                    while let Some(c) = self.bump() {
                        if c == '\n' {
                            break;
                        }
                    }
                }
                (Some('/'), Some('*')) => {
                    self.bump();
                    self.bump();
                    loop {
                        match (self.peek(), self.peek_at(1)) {
                            (Some('*'), Some('/')) => {
                                self.bump();
                                self.bump();
                                break;
                            }
                            (Some(_), _) => {
                                self.bump();
                            }
                            (None, _) => {
                                return Err(self.error("Unterminated comment."));
                            }
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn next_token(&mut self) -> Result<Option<Token>> {
        self.skip_separators()?;
        let c = match self.peek() {
            Some(c) => c,
            None => return Ok(None),
        };
        let token = match c {
            ';' => {
                self.bump();
                Token::Semicolon
            }
            '{' => {
                self.bump();
                Token::LeftBrace
            }
            '}' => {
                self.bump();
                Token::RightBrace
            }
            '"' => Token::Quoted(self.double_quoted()?),
            '\'' => Token::Quoted(self.single_quoted()?),
            '+' if self
                .peek_at(1)
                .map(|c| c.is_whitespace() || c == '"' || c == '\'')
                .unwrap_or(true) =>
            {
                self.bump();
                Token::Plus
            }
            _ => Token::Word(self.unquoted()),
        };
        Ok(Some(token))
    }

    fn unquoted(&mut self) -> String {
        let mut word = String::new();
        while let Some(c) = self.peek() {
            if c.is_whitespace() || matches!(c, ';' | '{' | '}' | '"' | '\'') {
                break;
            }
            if c == '/' && matches!(self.peek_at(1), Some('/') | Some('*')) {
                break;
            }
            word.push(c);
            self.bump();
        }
        word
    }

    fn single_quoted(&mut self) -> Result<String> {
        self.bump();
        let mut value = String::new();
        loop {
            match self.bump() {
                Some('\'') => return Ok(value),
                Some(c) => value.push(c),
                None => return Err(self.error("Unterminated single-quoted string.")),
            }
        }
    }

    fn double_quoted(&mut self) -> Result<String> {
        // Lines following a newline are dedented up to the column right
        // after the opening quote.
        let indent = self.column + 1;
        self.bump();
        let mut value = String::new();
        loop {
            match self.bump() {
                Some('"') => return Ok(value),
                Some('\\') => match self.bump() {
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some('"') => value.push('"'),
                    Some('\\') => value.push('\\'),
                    Some(c) => {
                        return Err(self.error(format!(
                            "Invalid escape sequence \"\\{}\".",
                            c
                        )));
                    }
                    None => {
                        return Err(
                            self.error("Unterminated double-quoted string.")
                        );
                    }
                },
                Some('\n') => {
                    let trimmed = value.trim_end_matches([' ', '\t']).len();
                    value.truncate(trimmed);
                    value.push('\n');
                    self.skip_indentation(indent);
                }
                Some(c) => value.push(c),
                None => {
                    return Err(self.error("Unterminated double-quoted string."));
                }
            }
        }
    }

    fn skip_indentation(&mut self, indent: usize) {
        while self.column < indent {
            match self.peek() {
                Some(' ') => {
                    self.bump();
                }
                Some('\t') => {
                    if self.column + (8 - self.column % 8) > indent {
                        break;
                    }
                    self.bump();
                }
                _ => break,
            }
        }
    }
}

// ===== global functions =====

fn is_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

fn is_keyword(value: &str) -> bool {
    match value.split_once(':') {
        Some((prefix, name)) => is_identifier(prefix) && is_identifier(name),
        None => is_identifier(value),
    }
}

fn parse_stmt(lexer: &mut Lexer, keyword: String) -> Result<Stmt> {
    let line = lexer.line;
    if !is_keyword(&keyword) {
        return Err(lexer.error(format!("Invalid keyword \"{}\".", keyword)));
    }

    let mut arg: Option<String> = None;
    let mut token = lexer.next_token()?;
    match token {
        Some(Token::Word(word)) => {
            arg = Some(word);
            token = lexer.next_token()?;
        }
        Some(Token::Quoted(first)) => {
            let mut value = first;
            token = lexer.next_token()?;
            while token == Some(Token::Plus) {
                match lexer.next_token()? {
                    Some(Token::Quoted(next)) => value.push_str(&next),
                    _ => {
                        return Err(lexer.error(
                            "Expected a quoted string after \"+\".",
                        ));
                    }
                }
                token = lexer.next_token()?;
            }
            arg = Some(value);
        }
        _ => {}
    }

    let mut stmt = Stmt {
        keyword,
        arg,
        line,
        substmts: Vec::new(),
    };
    match token {
        Some(Token::Semicolon) => Ok(stmt),
        Some(Token::LeftBrace) => {
            loop {
                match lexer.next_token()? {
                    Some(Token::RightBrace) => break,
                    Some(Token::Word(keyword)) => {
                        stmt.substmts.push(parse_stmt(lexer, keyword)?);
                    }
                    Some(_) => {
                        return Err(lexer.error(format!(
                            "Unexpected token inside \"{}\".",
                            stmt.keyword
                        )));
                    }
                    None => {
                        return Err(lexer.error(format!(
                            "Missing closing brace of \"{}\".",
                            stmt.keyword
                        )));
                    }
                }
            }
            Ok(stmt)
        }
        _ => Err(lexer.error(format!(
            "Expected \";\" or \"{{\" after \"{}\".",
            stmt.keyword
        ))),
    }
}

/// Reads YANG source text into a statement tree.
pub(crate) fn parse_yang_stmt(source: &str) -> Result<Stmt> {
    let mut lexer = Lexer::new(source.strip_prefix('\u{feff}').unwrap_or(source));
    let stmt = match lexer.next_token()? {
        Some(Token::Word(keyword)) => parse_stmt(&mut lexer, keyword)?,
        _ => return Err(lexer.error("Expected \"module\" or \"submodule\".")),
    };
    if lexer.next_token()?.is_some() {
        return Err(lexer.error("Trailing garbage after module."));
    }
    Ok(stmt)
}

/// Parses a module or submodule in the given format.
pub fn parse_module(
    source: &str,
    format: SchemaInputFormat,
) -> Result<ParsedModule> {
    let stmt = match format {
        SchemaInputFormat::YANG => parse_yang_stmt(source)?,
        SchemaInputFormat::YIN => yin::parse_yin_stmt(source)?,
    };
    parsed::build_module(stmt, format)
}

// ===== unit tests =====

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statements_and_comments() {
        let stmt = parse_yang_stmt(
            "module m { // comment\n  namespace urn:m; /* block\n */ prefix m;\n}",
        )
        .unwrap();
        assert_eq!(stmt.keyword, "module");
        assert_eq!(stmt.arg.as_deref(), Some("m"));
        assert_eq!(stmt.substmts.len(), 2);
        assert_eq!(stmt.find_arg("prefix"), Some("m"));
        // The block comment ends on line 3.
        assert_eq!(stmt.substmts[1].line, 3);
    }

    #[test]
    fn quoted_strings() {
        let stmt = parse_yang_stmt(
            "module m {\n  description \"first\n               line \\\"x\\\"\";\n  reference 'a\\n' + \"b\";\n}",
        )
        .unwrap();
        assert_eq!(stmt.find_arg("description"), Some("first\nline \"x\""));
        assert_eq!(stmt.find_arg("reference"), Some("a\\nb"));
    }

    #[test]
    fn extension_keywords() {
        let stmt =
            parse_yang_stmt("module m { ex:tag \"v\" { ex:inner; } }").unwrap();
        assert!(stmt.substmts[0].is_extension());
        assert_eq!(stmt.substmts[0].prefix(), Some("ex"));
    }

    #[test]
    fn syntax_errors_carry_lines() {
        let error = parse_yang_stmt("module m {\n  prefix m;\n  leaf x {\n")
            .unwrap_err();
        assert_eq!(error.vecode, crate::error::ValidationErrorCode::SyntaxYang);
        assert_eq!(error.line, 4);

        let error = parse_yang_stmt("module m { \"bad\" ; }").unwrap_err();
        assert!(error.msg.unwrap().contains("Unexpected token"));
    }
}
