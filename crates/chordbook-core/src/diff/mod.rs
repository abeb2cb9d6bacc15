//! Line-level content differ
//!
//! Content is split on `\n` only, so a trailing newline shows up as a final
//! empty line and `\r` stays part of its line. Joining the lines back with
//! `\n` reproduces the input byte for byte, which is what makes
//! `apply(a, &diff(a, b)) == b` hold for every pair of strings.

use std::collections::HashMap;

use dissimilar::Chunk;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const SURROGATE_START: u32 = 0xD800;
const SURROGATE_LEN: u32 = 0x800;

/// One run of line operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineOp {
    /// Copy this many lines from the base
    Keep(usize),
    /// Emit these lines
    Insert(Vec<String>),
    /// Skip these lines of the base (stored so the diff can be verified and reversed)
    Delete(Vec<String>),
}

/// Ordered line operations turning one text into another
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineDiff {
    ops: Vec<LineOp>,
}

/// Line counts of a diff
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffStats {
    pub kept: usize,
    pub inserted: usize,
    pub deleted: usize,
}

/// Kind of a rendered diff line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffLineKind {
    Keep,
    Insert,
    Delete,
}

/// A single line of a diff annotated against its base, for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffLine {
    pub kind: DiffLineKind,
    pub text: String,
}

/// Errors raised when a diff does not fit the base it is applied to
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApplyError {
    #[error("base has {available} lines but the diff needs line {needed}")]
    BaseTooShort { needed: usize, available: usize },
    #[error("line {line} of the base does not match the deleted line")]
    Mismatch { line: usize },
    #[error("diff consumed {consumed} of {available} base lines")]
    UnconsumedBase { consumed: usize, available: usize },
}

impl LineDiff {
    /// Operations in order
    pub fn ops(&self) -> &[LineOp] {
        &self.ops
    }

    /// Whether applying the diff leaves the base unchanged
    pub fn is_identity(&self) -> bool {
        self.ops.iter().all(|op| matches!(op, LineOp::Keep(_)))
    }

    /// Size in bytes of the diff's stored JSON form
    pub fn encoded_len(&self) -> usize {
        // Serializing plain strings and counts cannot fail
        serde_json::to_vec(self).map_or(usize::MAX, |json| json.len())
    }

    pub fn stats(&self) -> DiffStats {
        let mut stats = DiffStats::default();
        for op in &self.ops {
            match op {
                LineOp::Keep(count) => stats.kept += count,
                LineOp::Insert(lines) => stats.inserted += lines.len(),
                LineOp::Delete(lines) => stats.deleted += lines.len(),
            }
        }
        stats
    }

    /// Diff that undoes this one: `apply(b, &diff(a, b).reverse()) == a`
    #[must_use]
    pub fn reverse(&self) -> Self {
        let ops = self
            .ops
            .iter()
            .map(|op| match op {
                LineOp::Keep(count) => LineOp::Keep(*count),
                LineOp::Insert(lines) => LineOp::Delete(lines.clone()),
                LineOp::Delete(lines) => LineOp::Insert(lines.clone()),
            })
            .collect();
        Self { ops }
    }

    /// Walk the diff against its base, yielding every kept, inserted and deleted line
    pub fn annotate(&self, base: &str) -> Result<Vec<DiffLine>, ApplyError> {
        let base_lines = split_lines(base);
        let mut lines = Vec::new();
        let mut pos = 0;

        for op in &self.ops {
            match op {
                LineOp::Keep(count) => {
                    let kept = take_lines(&base_lines, pos, *count)?;
                    lines.extend(kept.iter().map(|text| DiffLine {
                        kind: DiffLineKind::Keep,
                        text: (*text).to_string(),
                    }));
                    pos += count;
                }
                LineOp::Insert(inserted) => {
                    lines.extend(inserted.iter().map(|text| DiffLine {
                        kind: DiffLineKind::Insert,
                        text: text.clone(),
                    }));
                }
                LineOp::Delete(deleted) => {
                    check_deleted(&base_lines, pos, deleted)?;
                    lines.extend(deleted.iter().map(|text| DiffLine {
                        kind: DiffLineKind::Delete,
                        text: text.clone(),
                    }));
                    pos += deleted.len();
                }
            }
        }

        check_consumed(&base_lines, pos)?;
        Ok(lines)
    }
}

/// Compute the line diff turning `old` into `new`
pub fn diff(old: &str, new: &str) -> LineDiff {
    let old_lines = split_lines(old);
    let new_lines = split_lines(new);

    let prefix = old_lines
        .iter()
        .zip(&new_lines)
        .take_while(|(a, b)| a == b)
        .count();
    let suffix = old_lines[prefix..]
        .iter()
        .rev()
        .zip(new_lines[prefix..].iter().rev())
        .take_while(|(a, b)| a == b)
        .count();

    let old_middle = &old_lines[prefix..old_lines.len() - suffix];
    let new_middle = &new_lines[prefix..new_lines.len() - suffix];

    let mut builder = DiffBuilder::default();
    builder.keep(prefix);
    diff_middle(old_middle, new_middle, &mut builder);
    builder.keep(suffix);
    builder.finish()
}

/// Apply a diff to its base, reproducing the target content
pub fn apply(base: &str, diff: &LineDiff) -> Result<String, ApplyError> {
    let base_lines = split_lines(base);
    let mut out: Vec<&str> = Vec::with_capacity(base_lines.len());
    let mut pos = 0;

    for op in &diff.ops {
        match op {
            LineOp::Keep(count) => {
                out.extend_from_slice(take_lines(&base_lines, pos, *count)?);
                pos += count;
            }
            LineOp::Insert(lines) => out.extend(lines.iter().map(String::as_str)),
            LineOp::Delete(lines) => {
                check_deleted(&base_lines, pos, lines)?;
                pos += lines.len();
            }
        }
    }

    check_consumed(&base_lines, pos)?;
    Ok(out.join("\n"))
}

/// Whether two texts differ only in whitespace
pub fn is_whitespace_only_change(old: &str, new: &str) -> bool {
    old.split_whitespace().eq(new.split_whitespace())
}

fn split_lines(text: &str) -> Vec<&str> {
    text.split('\n').collect()
}

fn take_lines<'a, 'b>(
    lines: &'b [&'a str],
    pos: usize,
    count: usize,
) -> Result<&'b [&'a str], ApplyError> {
    let end = pos.saturating_add(count);
    lines.get(pos..end).ok_or(ApplyError::BaseTooShort {
        needed: end,
        available: lines.len(),
    })
}

fn check_deleted(lines: &[&str], pos: usize, deleted: &[String]) -> Result<(), ApplyError> {
    let actual = take_lines(lines, pos, deleted.len())?;
    match actual.iter().zip(deleted).position(|(a, b)| a != b) {
        Some(offset) => Err(ApplyError::Mismatch {
            line: pos + offset + 1,
        }),
        None => Ok(()),
    }
}

const fn check_consumed(lines: &[&str], pos: usize) -> Result<(), ApplyError> {
    if pos == lines.len() {
        Ok(())
    } else {
        Err(ApplyError::UnconsumedBase {
            consumed: pos,
            available: lines.len(),
        })
    }
}

/// Myers diff over the region between the common prefix and suffix.
///
/// Each distinct line is mapped to one `char`, so `dissimilar`'s character
/// diff over the two encodings is a line diff.
fn diff_middle(old: &[&str], new: &[&str], builder: &mut DiffBuilder) {
    if old.is_empty() || new.is_empty() {
        builder.delete(old);
        builder.insert(new);
        return;
    }

    let Some((old_encoded, new_encoded)) = encode_lines(old, new) else {
        // More distinct lines than there are code points
        builder.delete(old);
        builder.insert(new);
        return;
    };

    let (mut i, mut j) = (0, 0);
    for chunk in dissimilar::diff(&old_encoded, &new_encoded) {
        match chunk {
            Chunk::Equal(text) => {
                let count = text.chars().count();
                builder.keep(count);
                i += count;
                j += count;
            }
            Chunk::Delete(text) => {
                let count = text.chars().count();
                builder.delete(&old[i..i + count]);
                i += count;
            }
            Chunk::Insert(text) => {
                let count = text.chars().count();
                builder.insert(&new[j..j + count]);
                j += count;
            }
        }
    }
}

fn encode_lines<'a>(old: &[&'a str], new: &[&'a str]) -> Option<(String, String)> {
    let mut codes: HashMap<&'a str, char> = HashMap::new();
    let mut encode = |lines: &[&'a str]| -> Option<String> {
        lines
            .iter()
            .map(|line| {
                if let Some(code) = codes.get(line) {
                    return Some(*code);
                }
                let code = line_code(codes.len())?;
                codes.insert(line, code);
                Some(code)
            })
            .collect()
    };
    let old_encoded = encode(old)?;
    let new_encoded = encode(new)?;
    Some((old_encoded, new_encoded))
}

/// The `index`-th Unicode scalar value, skipping the surrogate range
fn line_code(index: usize) -> Option<char> {
    let value = u32::try_from(index).ok()?;
    let value = if value >= SURROGATE_START {
        value.checked_add(SURROGATE_LEN)?
    } else {
        value
    };
    char::from_u32(value)
}

/// Accumulates operations, merging adjacent runs of the same kind
#[derive(Default)]
struct DiffBuilder {
    ops: Vec<LineOp>,
}

impl DiffBuilder {
    fn keep(&mut self, count: usize) {
        if count == 0 {
            return;
        }
        if let Some(LineOp::Keep(existing)) = self.ops.last_mut() {
            *existing += count;
        } else {
            self.ops.push(LineOp::Keep(count));
        }
    }

    fn insert(&mut self, lines: &[&str]) {
        if lines.is_empty() {
            return;
        }
        let owned = lines.iter().map(|line| (*line).to_string());
        if let Some(LineOp::Insert(existing)) = self.ops.last_mut() {
            existing.extend(owned);
        } else {
            self.ops.push(LineOp::Insert(owned.collect()));
        }
    }

    fn delete(&mut self, lines: &[&str]) {
        if lines.is_empty() {
            return;
        }
        let owned = lines.iter().map(|line| (*line).to_string());
        if let Some(LineOp::Delete(existing)) = self.ops.last_mut() {
            existing.extend(owned);
        } else {
            self.ops.push(LineOp::Delete(owned.collect()));
        }
    }

    fn finish(self) -> LineDiff {
        LineDiff { ops: self.ops }
    }
}
