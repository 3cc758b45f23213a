//
// Copyright (c) The yang-rs Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Data paths, instance-identifiers and schema node identifiers.

use crate::error::{Error, Result, ValidationErrorCode};

/// One step of a data path.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct PathSegment {
    pub prefix: Option<String>,
    pub name: String,
    pub predicates: Vec<PathPredicate>,
}

/// Predicate of a data path step.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum PathPredicate {
    /// `[key='value']`
    Key {
        prefix: Option<String>,
        name: String,
        value: String,
    },
    /// `[.='value']`
    Value(String),
    /// `[n]`, 1-based.
    Position(u32),
}

/// One step of a schema node identifier.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct NodeIdSegment {
    pub prefix: Option<String>,
    pub name: String,
}

struct PathReader<'p> {
    source: &'p str,
    chars: Vec<char>,
    pos: usize,
}

// ===== impl PathReader =====

impl<'p> PathReader<'p> {
    fn new(source: &'p str) -> PathReader<'p> {
        PathReader {
            source,
            chars: source.chars().collect(),
            pos: 0,
        }
    }

    fn error(&self, msg: &str) -> Error {
        Error::valid(
            ValidationErrorCode::Xpath,
            format!("Invalid path \"{}\": {}.", self.source, msg),
        )
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn skip_ws(&mut self) {
        while self.peek().map(char::is_whitespace).unwrap_or(false) {
            self.pos += 1;
        }
    }

    fn identifier(&mut self) -> Result<String> {
        let start = self.pos;
        match self.peek() {
            Some(c) if c.is_alphabetic() || c == '_' => self.pos += 1,
            _ => return Err(self.error("expected an identifier")),
        }
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || matches!(c, '_' | '-' | '.') {
                self.pos += 1;
            } else {
                break;
            }
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn qname(&mut self) -> Result<(Option<String>, String)> {
        let first = self.identifier()?;
        if self.eat(':') {
            let name = self.identifier()?;
            Ok((Some(first), name))
        } else {
            Ok((None, first))
        }
    }

    fn quoted(&mut self) -> Result<String> {
        let quote = match self.peek() {
            Some(q @ '\'') | Some(q @ '"') => q,
            _ => return Err(self.error("expected a quoted value")),
        };
        self.pos += 1;
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c == quote {
                let value = self.chars[start..self.pos].iter().collect();
                self.pos += 1;
                return Ok(value);
            }
            self.pos += 1;
        }
        Err(self.error("unterminated quoted value"))
    }

    fn predicate(&mut self) -> Result<PathPredicate> {
        self.skip_ws();
        let pred = match self.peek() {
            Some(c) if c.is_ascii_digit() => {
                let start = self.pos;
                while self.peek().map(|c| c.is_ascii_digit()).unwrap_or(false) {
                    self.pos += 1;
                }
                let text: String = self.chars[start..self.pos].iter().collect();
                let position = text
                    .parse::<u32>()
                    .ok()
                    .filter(|p| *p > 0)
                    .ok_or_else(|| self.error("invalid position"))?;
                PathPredicate::Position(position)
            }
            Some('.') => {
                self.pos += 1;
                self.skip_ws();
                if !self.eat('=') {
                    return Err(self.error("expected '='"));
                }
                self.skip_ws();
                PathPredicate::Value(self.quoted()?)
            }
            _ => {
                let (prefix, name) = self.qname()?;
                self.skip_ws();
                if !self.eat('=') {
                    return Err(self.error("expected '='"));
                }
                self.skip_ws();
                let value = self.quoted()?;
                PathPredicate::Key {
                    prefix,
                    name,
                    value,
                }
            }
        };
        self.skip_ws();
        if !self.eat(']') {
            return Err(self.error("expected ']'"));
        }
        Ok(pred)
    }
}

// ===== global functions =====

/// Parses an absolute data path or instance-identifier.
pub(crate) fn parse_data_path(path: &str) -> Result<Vec<PathSegment>> {
    let mut reader = PathReader::new(path);
    let mut segments = Vec::new();
    reader.skip_ws();
    if reader.peek().is_none() {
        return Err(reader.error("empty path"));
    }
    while reader.peek().is_some() {
        if !reader.eat('/') {
            return Err(reader.error("expected '/'"));
        }
        let (prefix, name) = reader.qname()?;
        let mut predicates = Vec::new();
        while reader.eat('[') {
            predicates.push(reader.predicate()?);
        }
        segments.push(PathSegment {
            prefix,
            name,
            predicates,
        });
        reader.skip_ws();
    }
    match segments.first() {
        Some(first) if first.prefix.is_none() => {
            Err(reader.error("the first node must be prefixed"))
        }
        _ => Ok(segments),
    }
}

/// Parses a schema node identifier; returns whether it is absolute.
pub(crate) fn parse_schema_nodeid(
    path: &str,
) -> Result<(bool, Vec<NodeIdSegment>)> {
    let mut reader = PathReader::new(path.trim());
    let absolute = reader.peek() == Some('/');
    let mut segments = Vec::new();
    loop {
        if !segments.is_empty() || absolute {
            if !reader.eat('/') {
                return Err(reader.error("expected '/'"));
            }
        }
        let (prefix, name) = reader.qname()?;
        segments.push(NodeIdSegment { prefix, name });
        if reader.peek().is_none() {
            break;
        }
    }
    Ok((absolute, segments))
}

// ===== unit tests =====

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_paths() {
        let segments = parse_data_path(
            "/ietf-interfaces:interfaces/interface[name='eth/0/0']/address[.=\"10.0.0.1\"]/x:list[2]",
        )
        .unwrap();
        assert_eq!(segments.len(), 4);
        assert_eq!(segments[0].prefix.as_deref(), Some("ietf-interfaces"));
        assert_eq!(
            segments[1].predicates,
            vec![PathPredicate::Key {
                prefix: None,
                name: "name".to_owned(),
                value: "eth/0/0".to_owned(),
            }]
        );
        assert_eq!(
            segments[2].predicates,
            vec![PathPredicate::Value("10.0.0.1".to_owned())]
        );
        assert_eq!(segments[3].predicates, vec![PathPredicate::Position(2)]);
    }

    #[test]
    fn invalid_data_paths() {
        assert!(parse_data_path("").is_err());
        assert!(parse_data_path("/interfaces").is_err());
        assert!(parse_data_path("/m:a[k='v'").is_err());
        assert!(parse_data_path("/m:a[0]").is_err());
        assert!(parse_data_path("m:a").is_err());
    }

    #[test]
    fn schema_nodeids() {
        let (absolute, segments) =
            parse_schema_nodeid("/if:interfaces/if:interface").unwrap();
        assert!(absolute);
        assert_eq!(segments[1].name, "interface");
        let (absolute, segments) = parse_schema_nodeid("a/b:c").unwrap();
        assert!(!absolute);
        assert_eq!(segments[1].prefix.as_deref(), Some("b"));
    }
}
