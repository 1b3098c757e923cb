//! Bracket-aware segment tokenizer.
//!
//! A filename stem is consumed one segment at a time: a `[...]` group, a
//! `(...)` group, or a run of free text up to the next opening bracket.
//! Segments whose content is empty are skipped, but the input still advances,
//! so the iterator always terminates.

use std::fmt;

use winnow::combinator::delimited;
use winnow::prelude::*;
use winnow::token::take_till;

use crate::config::UnterminatedPolicy;

/// The delimiter style a segment was read with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SegmentKind {
    /// `[content]`
    Square,
    /// `(content)`
    Round,
    /// Free text outside any bracket pair, whitespace-trimmed.
    Text,
}

/// One piece of a filename stem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment<'i> {
    /// Text between the brackets, or the trimmed free text.
    pub content: &'i str,
    /// How the segment was delimited.
    pub kind: SegmentKind,
}

impl Segment<'_> {
    /// Whether this segment is free text rather than a bracketed tag.
    pub fn is_text(&self) -> bool {
        self.kind == SegmentKind::Text
    }
}

/// Error returned when a filename cannot be segmented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenizeError {
    /// An opening bracket has no matching closing bracket.
    Unterminated {
        /// The opening bracket character.
        bracket: char,
        /// Byte offset of the opening bracket in the tokenized stem.
        offset: usize,
    },
}

impl fmt::Display for TokenizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenizeError::Unterminated { bracket, offset } => {
                write!(f, "unterminated '{}' at byte {}", bracket, offset)
            }
        }
    }
}

impl std::error::Error for TokenizeError {}

/// Splits filename stems into [`Segment`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagTokenizer {
    square: bool,
    round: bool,
    unterminated: UnterminatedPolicy,
}

impl Default for TagTokenizer {
    fn default() -> Self {
        Self::new(true, true, UnterminatedPolicy::default())
    }
}

impl TagTokenizer {
    /// Create a tokenizer.
    ///
    /// A disabled bracket style is read as ordinary free text.
    pub fn new(square: bool, round: bool, unterminated: UnterminatedPolicy) -> Self {
        Self {
            square,
            round,
            unterminated,
        }
    }

    /// Iterate over the non-empty segments of `input`.
    ///
    /// ```
    /// use animencode_parser::tokenizer::{SegmentKind, TagTokenizer};
    ///
    /// let tokenizer = TagTokenizer::default();
    /// let kinds: Vec<_> = tokenizer
    ///     .segments("[Group] Title (1080p)")
    ///     .map(|s| s.unwrap().kind)
    ///     .collect();
    /// assert_eq!(kinds, [SegmentKind::Square, SegmentKind::Text, SegmentKind::Round]);
    /// ```
    pub fn segments<'t, 'i>(&'t self, input: &'i str) -> Segments<'t, 'i> {
        Segments {
            tokenizer: self,
            remaining: input,
            offset: 0,
            failed: false,
        }
    }

    fn bracket_for(&self, c: char) -> Option<(char, SegmentKind)> {
        match c {
            '[' if self.square => Some((']', SegmentKind::Square)),
            '(' if self.round => Some((')', SegmentKind::Round)),
            _ => None,
        }
    }

    /// Consume one segment. On failure returns the offending opening bracket.
    fn step<'i>(&self, input: &mut &'i str) -> Result<Segment<'i>, char> {
        let start = *input;
        let Some(first) = start.chars().next() else {
            return Ok(Segment {
                content: start,
                kind: SegmentKind::Text,
            });
        };

        match self.bracket_for(first) {
            Some((close, kind)) => match bracketed(input, first, close) {
                Ok(content) => Ok(Segment { content, kind }),
                Err(_) => match self.unterminated {
                    UnterminatedPolicy::Error => {
                        *input = start;
                        Err(first)
                    }
                    UnterminatedPolicy::Truncate => {
                        *input = &start[start.len()..];
                        Ok(Segment {
                            content: &start[first.len_utf8()..],
                            kind,
                        })
                    }
                },
            },
            None => {
                let text = match free_text(input, |c| self.bracket_for(c).is_some()) {
                    Ok(text) if !text.is_empty() => text,
                    _ => {
                        *input = &start[start.len()..];
                        start
                    }
                };
                Ok(Segment {
                    content: text.trim(),
                    kind: SegmentKind::Text,
                })
            }
        }
    }
}

fn bracketed<'i>(input: &mut &'i str, open: char, close: char) -> PResult<&'i str> {
    delimited(open, take_till(0.., close), close).parse_next(input)
}

fn free_text<'i, F>(input: &mut &'i str, is_open: F) -> PResult<&'i str>
where
    F: Fn(char) -> bool,
{
    take_till(0.., is_open).parse_next(input)
}

/// Iterator over the segments of one input string.
#[derive(Debug)]
pub struct Segments<'t, 'i> {
    tokenizer: &'t TagTokenizer,
    remaining: &'i str,
    offset: usize,
    failed: bool,
}

impl<'t, 'i> Segments<'t, 'i> {
    /// Report error offsets relative to a larger string that this input was
    /// cut from.
    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Input not yet consumed.
    pub fn remainder(&self) -> &'i str {
        self.remaining
    }

    /// Byte offset of [`remainder`](Self::remainder) in the original string.
    pub fn offset(&self) -> usize {
        self.offset
    }
}

impl<'i> Iterator for Segments<'_, 'i> {
    type Item = Result<Segment<'i>, TokenizeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        while !self.remaining.is_empty() {
            let before = self.remaining.len();
            match self.tokenizer.step(&mut self.remaining) {
                Ok(segment) => {
                    self.offset += before - self.remaining.len();
                    if !segment.content.is_empty() {
                        return Some(Ok(segment));
                    }
                }
                Err(bracket) => {
                    self.failed = true;
                    return Some(Err(TokenizeError::Unterminated {
                        bracket,
                        offset: self.offset,
                    }));
                }
            }
        }

        None
    }
}
