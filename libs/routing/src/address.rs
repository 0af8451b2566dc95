//! # Address Patterns and Wildcard Matching
//!
//! Addresses are delimiter-segmented routing keys (`orders.eu.new`). A binding
//! address may contain two kinds of wildcard token:
//!
//! - `*` matches exactly one segment
//! - `#` matches zero or more segments
//!
//! A segment that mixes a wildcard character with other text (`ord*`, `a#b`)
//! is an ordinary literal. Real addresses never carry wildcard characters, so
//! such a literal can never match anything but itself.
//!
//! ## Matching Algorithm
//!
//! Matching walks a reachability table over
//! `(address segment index, pattern token index)`, one address segment at a
//! time:
//!
//! ```text
//! literal  (i, j) → (i+1, j+1)   when segment[i] == token[j]
//! *        (i, j) → (i+1, j+1)
//! #        (i, j) → (i,   j+1)   zero segments
//!          (i, j) → (i+1, j)     one more segment, stay on #
//! ```
//!
//! The address matches when `(segments, tokens)` is reachable. A greedy scan
//! is not enough once several `#` tokens interleave with literals
//! (`#.b.#`, `a.#.c.d.*.f`).

use crate::error::{RoutingError, RoutingResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Characters that structure an address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct WildcardSyntax {
    pub delimiter: char,
    pub single_word: char,
    pub any_words: char,
}

impl Default for WildcardSyntax {
    fn default() -> Self {
        Self {
            delimiter: '.',
            single_word: '*',
            any_words: '#',
        }
    }
}

impl WildcardSyntax {
    pub fn new(delimiter: char, single_word: char, any_words: char) -> Self {
        Self {
            delimiter,
            single_word,
            any_words,
        }
    }

    fn token(&self, segment: &str) -> Token {
        let mut chars = segment.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if c == self.single_word => Token::AnyOne,
            (Some(c), None) if c == self.any_words => Token::AnyMany,
            _ => Token::Literal(segment.to_string()),
        }
    }
}

/// One parsed segment of an address or pattern
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Token {
    Literal(String),
    /// Single-segment wildcard
    AnyOne,
    /// Zero-or-more-segment wildcard
    AnyMany,
}

/// A parsed address; doubles as a pattern when it holds wildcard tokens
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AddressPattern {
    raw: String,
    segments: Vec<String>,
    tokens: Vec<Token>,
}

impl AddressPattern {
    /// Parse with the default `.`, `*`, `#` syntax
    pub fn new(address: &str) -> RoutingResult<Self> {
        Self::with_syntax(address, &WildcardSyntax::default())
    }

    pub fn with_syntax(address: &str, syntax: &WildcardSyntax) -> RoutingResult<Self> {
        if address.is_empty() {
            return Err(RoutingError::InvalidAddressPattern);
        }

        let segments: Vec<String> = address
            .split(syntax.delimiter)
            .map(str::to_string)
            .collect();
        let tokens = segments.iter().map(|s| syntax.token(s)).collect();

        Ok(Self {
            raw: address.to_string(),
            segments,
            tokens,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn is_wildcard(&self) -> bool {
        self.tokens
            .iter()
            .any(|t| matches!(t, Token::AnyOne | Token::AnyMany))
    }

    /// Whether `address` is routed to a binding on this pattern
    ///
    /// The segments of `address` are compared as plain text, so a wildcard
    /// segment in the query only matches a wildcard token or the same literal.
    pub fn matches(&self, address: &AddressPattern) -> bool {
        if !self.is_wildcard() {
            return self.segments == address.segments;
        }

        let width = self.tokens.len() + 1;
        let mut reachable = vec![false; width];
        reachable[0] = true;
        self.skip_any_many(&mut reachable);

        for segment in &address.segments {
            let mut next = vec![false; width];
            for (j, token) in self.tokens.iter().enumerate() {
                if !reachable[j] {
                    continue;
                }
                match token {
                    Token::Literal(literal) => {
                        if literal == segment {
                            next[j + 1] = true;
                        }
                    }
                    Token::AnyOne => next[j + 1] = true,
                    Token::AnyMany => next[j] = true,
                }
            }
            self.skip_any_many(&mut next);

            if !next.contains(&true) {
                return false;
            }
            reachable = next;
        }

        reachable[self.tokens.len()]
    }

    /// Close a row under the zero-segment `#` transition
    fn skip_any_many(&self, row: &mut [bool]) {
        for (j, token) in self.tokens.iter().enumerate() {
            if row[j] && *token == Token::AnyMany {
                row[j + 1] = true;
            }
        }
    }
}

impl fmt::Display for AddressPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Match `address` against `pattern` with the default syntax
pub fn matches(address: &str, pattern: &str) -> RoutingResult<bool> {
    let address = AddressPattern::new(address)?;
    let pattern = AddressPattern::new(pattern)?;
    Ok(pattern.matches(&address))
}
