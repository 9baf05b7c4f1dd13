use std::collections::{BTreeMap, HashMap, HashSet};

use crate::encoding::LineEnding;
use crate::lexer::{Token, TokenKind};
use crate::line_shape::LineTable;
use crate::planner::{PlacementStyle, RelocationPlan};

/// Apply relocation plans to one file's tokens and serialize the result.
///
/// Tokens are copied in order. The only differences from the input are:
/// the moved comment (and the whitespace in front of it) is dropped from its
/// origin line, inline comments are appended to their target line after
/// trimming its trailing whitespace, and preceding comments are emitted as new
/// lines right before the first token of their target line.
pub fn rewrite(
    tokens: &[Token<'_>],
    table: &LineTable<'_, '_>,
    mut plans: Vec<RelocationPlan>,
    line_ending: LineEnding,
) -> String {
    plans.sort_by(|a, b| b.origin_line.cmp(&a.origin_line));

    let mut removed: HashSet<usize> = HashSet::new();
    let mut inline: HashMap<usize, &str> = HashMap::new();
    let mut preceding: BTreeMap<usize, Vec<(usize, &str)>> = BTreeMap::new();

    for plan in &plans {
        let comment = &tokens[plan.comment];
        removed.insert(plan.comment);
        for idx in (0..plan.comment).rev() {
            let token = &tokens[idx];
            if token.kind != TokenKind::Whitespace || token.start.line != comment.start.line {
                break;
            }
            removed.insert(idx);
        }

        let text = comment.text.trim_end();
        match plan.style {
            PlacementStyle::Inline => {
                inline.insert(plan.target_line, text);
            }
            PlacementStyle::Preceding => {
                preceding
                    .entry(plan.target_line)
                    .or_default()
                    .push((plan.origin_line, text));
            }
        }
    }

    let mut first_token_of_line: HashMap<usize, usize> = HashMap::new();
    for &line in preceding.keys() {
        if let Some(&idx) = table.token_indices(line).first() {
            first_token_of_line.insert(idx, line);
        }
    }

    let mut out = String::with_capacity(tokens.iter().map(|t| t.text.len()).sum::<usize>() + 64);
    for (idx, token) in tokens.iter().enumerate() {
        if let Some(line) = first_token_of_line.get(&idx) {
            let indent = table.indentation(*line);
            let mut comments = preceding.get(line).cloned().unwrap_or_default();
            comments.sort_by_key(|(origin, _)| *origin);
            for (_, text) in comments {
                out.push_str(indent);
                out.push_str(text);
                out.push_str(line_ending.as_str());
            }
        }

        if removed.contains(&idx) {
            continue;
        }

        if token.is_line_break() {
            if let Some(text) = inline.remove(&token.start.line) {
                let kept = out.trim_end_matches([' ', '\t', '\x0C']).len();
                out.truncate(kept);
                out.push_str("  ");
                out.push_str(text);
            }
        }

        out.push_str(token.text);
    }

    out
}
