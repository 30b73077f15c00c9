//! GenBank location expressions: parsing, validation and strand resolution.
//!
//! Only the four forms that occur in NCBI feature tables for whole-record
//! extraction are accepted:
//!
//! ```text
//! 12..340
//! complement(12..340)
//! join(12..80,120..340)
//! complement(join(12..80,120..340))
//! ```
//!
//! Coordinates are 1-based and inclusive. Anything else (fuzzy `<`/`>` ends,
//! `order(...)`, remote references, `join(complement(...))`) is rejected as a
//! parse failure so that a record is either extracted completely or skipped.

use crate::iupac_code;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

/// Per-record decoding failure. None of these abort a batch.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum LocationError {
    #[error("could not parse location '{location}' at offset {offset}: {reason}")]
    Parse {
        location: String,
        offset: usize,
        reason: String,
    },
    #[error("invalid interval {start}..{end}: start is greater than end")]
    Validation { start: usize, end: usize },
    #[error("invalid interval 0..{end}: positions start at 1")]
    ZeroStart { end: usize },
    #[error("join without intervals")]
    EmptyJoin,
    #[error("interval {start}..{end} lies outside the reference (length {length})")]
    OutOfBounds {
        start: usize,
        end: usize,
        length: usize,
    },
}

/// A contiguous, 1-based, inclusive range of a reference sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GenomicInterval {
    pub start: usize,
    pub end: usize,
}

impl GenomicInterval {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Rejects reversed intervals and position 0. Reversed intervals are never
    /// swapped into order.
    pub fn validate(&self) -> Result<(), LocationError> {
        if self.start == 0 {
            return Err(LocationError::ZeroStart { end: self.end });
        }
        if self.start > self.end {
            return Err(LocationError::Validation {
                start: self.start,
                end: self.end,
            });
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        if self.is_empty() {
            0
        } else {
            (self.end - self.start).saturating_add(1)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }
}

impl fmt::Display for GenomicInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationExpression {
    Simple(GenomicInterval),
    /// Intervals in extraction order, which is not necessarily sorted.
    Join(Vec<GenomicInterval>),
    Complement(Box<LocationExpression>),
}

impl LocationExpression {
    pub fn intervals(&self) -> &[GenomicInterval] {
        match self {
            Self::Simple(interval) => std::slice::from_ref(interval),
            Self::Join(intervals) => intervals,
            Self::Complement(inner) => inner.intervals(),
        }
    }

    /// True when the extracted sequence must be reverse-complemented.
    pub fn is_reverse(&self) -> bool {
        match self {
            Self::Simple(_) | Self::Join(_) => false,
            Self::Complement(inner) => !inner.is_reverse(),
        }
    }

    /// All-or-nothing: a single bad interval rejects the whole expression.
    pub fn validate(&self) -> Result<(), LocationError> {
        let intervals = self.intervals();
        if intervals.is_empty() {
            return Err(LocationError::EmptyJoin);
        }
        intervals.iter().try_for_each(GenomicInterval::validate)
    }

    /// Applies the strand of this expression to an already extracted sequence.
    pub fn resolve_strand(&self, extracted: Vec<u8>) -> Vec<u8> {
        if self.is_reverse() {
            iupac_code::reverse_complement(&extracted)
        } else {
            extracted
        }
    }
}

impl fmt::Display for LocationExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Simple(interval) => write!(f, "{interval}"),
            Self::Join(intervals) => {
                write!(f, "join(")?;
                for (idx, interval) in intervals.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{interval}")?;
                }
                write!(f, ")")
            }
            Self::Complement(inner) => write!(f, "complement({inner})"),
        }
    }
}

impl FromStr for LocationExpression {
    type Err = LocationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_location(s)
    }
}

pub fn parse_location(raw: &str) -> Result<LocationExpression, LocationError> {
    let mut parser = LocationParser::new(raw);
    let expression = parser.expression()?;
    parser.skip_whitespace();
    if !parser.at_end() {
        return Err(parser.error("unexpected trailing text"));
    }
    Ok(expression)
}

struct LocationParser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> LocationParser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn expression(&mut self) -> Result<LocationExpression, LocationError> {
        self.skip_whitespace();
        if self.keyword("complement") {
            self.expect(b'(')?;
            self.skip_whitespace();
            let inner = if self.keyword("join") {
                self.join()?
            } else if self.peek().is_some_and(|b| b.is_ascii_digit()) {
                LocationExpression::Simple(self.interval()?)
            } else {
                return Err(self.error("expected 'join(' or an interval inside complement"));
            };
            self.expect(b')')?;
            return Ok(LocationExpression::Complement(Box::new(inner)));
        }
        if self.keyword("join") {
            return self.join();
        }
        Ok(LocationExpression::Simple(self.interval()?))
    }

    // Called with the `join` keyword already consumed.
    fn join(&mut self) -> Result<LocationExpression, LocationError> {
        self.expect(b'(')?;
        let mut intervals = vec![self.interval()?];
        loop {
            self.skip_whitespace();
            match self.peek() {
                Some(b',') => {
                    self.pos += 1;
                    intervals.push(self.interval()?);
                }
                Some(b')') => {
                    self.pos += 1;
                    return Ok(LocationExpression::Join(intervals));
                }
                _ => return Err(self.error("expected ',' or ')' in join")),
            }
        }
    }

    fn interval(&mut self) -> Result<GenomicInterval, LocationError> {
        let start = self.number()?;
        self.skip_whitespace();
        if !self.input[self.pos..].starts_with("..") {
            return Err(self.error("expected '..' between interval bounds"));
        }
        self.pos += 2;
        let end = self.number()?;
        Ok(GenomicInterval::new(start, end))
    }

    fn number(&mut self) -> Result<usize, LocationError> {
        self.skip_whitespace();
        let begin = self.pos;
        while self.peek().is_some_and(|b| b.is_ascii_digit()) {
            self.pos += 1;
        }
        if begin == self.pos {
            return Err(self.error("expected an integer"));
        }
        self.input[begin..self.pos]
            .parse::<usize>()
            .map_err(|e| self.error(&format!("integer out of range: {e}")))
    }

    fn keyword(&mut self, word: &str) -> bool {
        let rest = &self.input.as_bytes()[self.pos..];
        if rest.len() >= word.len() && rest[..word.len()].eq_ignore_ascii_case(word.as_bytes()) {
            self.pos += word.len();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, byte: u8) -> Result<(), LocationError> {
        self.skip_whitespace();
        if self.peek() == Some(byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", byte as char)))
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.as_bytes().get(self.pos).copied()
    }

    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn error(&self, reason: &str) -> LocationError {
        LocationError::Parse {
            location: self.input.to_string(),
            offset: self.pos,
            reason: reason.to_string(),
        }
    }
}
