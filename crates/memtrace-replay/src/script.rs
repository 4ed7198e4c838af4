//! Access script parsing.
//!
//! One directive per line; `#` starts a comment. Numbers are decimal or
//! `0x`-prefixed hex.
//!
//! ```text
//! pc 0x40001000
//! lr 0x40000ff0
//! read 0x40000000 4
//! write 0x40000010 4 0x2a
//! ```

use thiserror::Error;

use memtrace_core::TraceRange;

/// One replayable step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// Sets the program counter.
    SetPc(u64),
    /// Sets the link register.
    SetLr(u64),
    /// Guest load.
    Read {
        /// Load address.
        address: u64,
        /// Load width in bytes.
        size: u32,
    },
    /// Guest store.
    Write {
        /// Store address.
        address: u64,
        /// Store width in bytes.
        size: u32,
        /// Stored value.
        value: u64,
    },
}

/// A directive with its 1-indexed source line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptLine {
    /// Source line number.
    pub line: usize,
    /// Parsed directive.
    pub directive: Directive,
}

/// Script syntax errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScriptError {
    /// First word is not a known directive.
    #[error("line {line}: unknown directive `{word}`")]
    UnknownDirective {
        /// Source line number.
        line: usize,
        /// Offending word.
        word: String,
    },
    /// Wrong number of operands.
    #[error("line {line}: `{directive}` expects {expected} operand(s), found {found}")]
    OperandCount {
        /// Source line number.
        line: usize,
        /// Directive name.
        directive: &'static str,
        /// Required operand count.
        expected: usize,
        /// Operands present.
        found: usize,
    },
    /// Operand is not a number in range.
    #[error("line {line}: invalid number `{text}`")]
    InvalidNumber {
        /// Source line number.
        line: usize,
        /// Offending operand.
        text: String,
    },
}

impl ScriptError {
    /// Line the error was found on.
    #[must_use]
    pub const fn line(&self) -> usize {
        match self {
            Self::UnknownDirective { line, .. }
            | Self::OperandCount { line, .. }
            | Self::InvalidNumber { line, .. } => *line,
        }
    }
}

/// Parses a decimal or `0x`-prefixed hexadecimal integer.
#[must_use]
pub fn parse_number(text: &str) -> Option<u64> {
    let text = text.trim();
    match text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => text.parse().ok(),
    }
}

/// Parses an inclusive `begin:end` window.
#[must_use]
pub fn parse_range(text: &str) -> Option<TraceRange> {
    let (begin, end) = text.split_once(':')?;
    Some(TraceRange::new(parse_number(begin)?, parse_number(end)?))
}

/// Parses a complete script.
///
/// # Errors
///
/// Returns the first [`ScriptError`] encountered.
pub fn parse_script(source: &str) -> Result<Vec<ScriptLine>, ScriptError> {
    let mut lines = Vec::new();
    for (index, raw) in source.lines().enumerate() {
        let line = index + 1;
        let text = raw.split_once('#').map_or(raw, |(code, _)| code);
        let mut words = text.split_whitespace();
        let Some(word) = words.next() else {
            continue;
        };
        let operands: Vec<&str> = words.collect();
        let directive = parse_directive(line, word, &operands)?;
        lines.push(ScriptLine { line, directive });
    }
    Ok(lines)
}

fn parse_directive(line: usize, word: &str, operands: &[&str]) -> Result<Directive, ScriptError> {
    let (name, expected): (&'static str, usize) = match word.to_ascii_lowercase().as_str() {
        "pc" => ("pc", 1),
        "lr" => ("lr", 1),
        "read" => ("read", 2),
        "write" => ("write", 3),
        _ => {
            return Err(ScriptError::UnknownDirective {
                line,
                word: word.to_string(),
            })
        }
    };
    if operands.len() != expected {
        return Err(ScriptError::OperandCount {
            line,
            directive: name,
            expected,
            found: operands.len(),
        });
    }

    let number = |text: &str| {
        parse_number(text).ok_or_else(|| ScriptError::InvalidNumber {
            line,
            text: text.to_string(),
        })
    };
    let size = |text: &str| {
        number(text).and_then(|value| {
            u32::try_from(value).map_err(|_| ScriptError::InvalidNumber {
                line,
                text: text.to_string(),
            })
        })
    };

    Ok(match name {
        "pc" => Directive::SetPc(number(operands[0])?),
        "lr" => Directive::SetLr(number(operands[0])?),
        "read" => Directive::Read {
            address: number(operands[0])?,
            size: size(operands[1])?,
        },
        _ => Directive::Write {
            address: number(operands[0])?,
            size: size(operands[1])?,
            value: number(operands[2])?,
        },
    })
}
