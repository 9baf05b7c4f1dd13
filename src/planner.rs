use std::collections::HashSet;

use tracing::debug;

use crate::lexer::Token;
use crate::line_shape::LineTable;

/// Where a relocated comment ends up relative to its target line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementStyle {
    /// Appended to the target line after two spaces
    Inline,
    /// On its own line directly above the target line, with the target's indentation
    Preceding,
}

/// A decision to move one comment. Line numbers refer to the original source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelocationPlan {
    /// Index of the comment token in the file's token stream
    pub comment: usize,
    pub origin_line: usize,
    pub target_line: usize,
    pub style: PlacementStyle,
}

/// Chooses target lines and placement styles for misplaced comments of one file.
///
/// Plans must be requested bottom-to-top. The planner remembers which lines
/// already received an inline comment so a second comment heading for the same
/// line goes above it instead of being concatenated.
pub struct Planner<'p, 't, 'a> {
    table: &'p LineTable<'t, 'a>,
    tokens: &'t [Token<'a>],
    line_length: usize,
    inline_targets: HashSet<usize>,
}

impl<'p, 't, 'a> Planner<'p, 't, 'a> {
    pub fn new(table: &'p LineTable<'t, 'a>, tokens: &'t [Token<'a>], line_length: usize) -> Self {
        Self {
            table,
            tokens,
            line_length,
            inline_targets: HashSet::new(),
        }
    }

    /// The nearest line above `origin` that holds real code and can take a
    /// trailing comment. The search never leaves the bracket group closed on
    /// `origin`.
    pub fn find_target(&self, origin: usize) -> Option<usize> {
        let floor = self.table.group_start(origin).unwrap_or(1);
        (floor..origin).rev().find(|&line| {
            self.table.has_code(line)
                && !self.table.is_bracket_only(line)
                && self.table.ends_clean(line)
        })
    }

    /// Plan the move of the comment token at `comment` sitting on bracket-only
    /// line `origin`. Returns `None` when no line can take the comment.
    pub fn plan(&mut self, comment: usize, origin: usize) -> Option<RelocationPlan> {
        let target = self.find_target(origin)?;
        let comment_text = self.tokens[comment].text.trim_end();

        let occupied =
            self.table.comment(target).is_some() || self.inline_targets.contains(&target);
        let candidate = format!("{}  {}", self.table.text(target).trim_end(), comment_text);
        let width = candidate.chars().count();

        let plan = if !occupied && width <= self.line_length {
            self.inline_targets.insert(target);
            RelocationPlan {
                comment,
                origin_line: origin,
                target_line: target,
                style: PlacementStyle::Inline,
            }
        } else {
            RelocationPlan {
                comment,
                origin_line: origin,
                target_line: self.insertion_line(target),
                style: PlacementStyle::Preceding,
            }
        };

        debug!(
            origin,
            target = plan.target_line,
            style = ?plan.style,
            width,
            occupied,
            "planned comment relocation"
        );
        Some(plan)
    }

    /// Walk up from `target` to a line a new line can be inserted above.
    fn insertion_line(&self, target: usize) -> usize {
        (1..=target)
            .rev()
            .find(|&line| self.table.starts_clean(line) && self.table.has_code(line))
            .unwrap_or(1)
    }
}
