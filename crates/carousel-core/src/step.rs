//! Step scheduling
//!
//! Builds the migration path between two cluster states. Moves alternate
//! between growing the build color and shrinking the other one:
//!
//! 1. Grow the build color while it is below target (only when the new
//!    cluster is larger than the old one does this run ahead)
//! 2. Alternate adding to the build color and removing from the old one
//! 3. Drain whatever is left of the old color
//!
//! Every move changes one color by at most `batch_size`, except that a move
//! out of the `skip_first_n` band jumps straight past it. No move overshoots
//! its target.

use crate::model::{ClusterState, Color, Step};
use serde::{Deserialize, Serialize};

/// Options for building a migration path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepOptions {
    /// Maximum change of one color per step, at least 1
    pub batch_size: usize,
    /// A group is never left with `1..=skip_first_n` nodes mid-migration
    pub skip_first_n: usize,
}

impl Default for StepOptions {
    fn default() -> Self {
        Self {
            batch_size: 1,
            skip_first_n: 0,
        }
    }
}

impl StepOptions {
    /// Default options: batches of one, no skip band
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set batch size; zero is treated as one
    #[inline]
    #[must_use]
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Set the skip band
    #[inline]
    #[must_use]
    pub fn with_skip_first_n(mut self, n: usize) -> Self {
        self.skip_first_n = n;
        self
    }
}

/// Build the migration path from `current` to `target`
///
/// The path starts with `current` and ends with `target`; each adjacent
/// pair differs in exactly one color. When both states are empty the path
/// is the single target step.
#[must_use]
pub fn create_steps(current: &ClusterState, target: &ClusterState, options: &StepOptions) -> Vec<Step> {
    if current.is_empty() && target.is_empty() {
        return vec![target.as_step()];
    }

    let options = options.with_batch_size(options.batch_size);
    let build_color = target.group().unwrap_or(Color::Blue);
    let goal = target.as_step();

    let mut step = current.as_step();
    let mut path = vec![step];
    let mut group = build_color;
    let mut adding = true;

    while step != goal {
        let Some((color, next)) = next_move(&step, &goal, group, adding, &options) else {
            tracing::error!(at = %step, to = %goal, "no legal move left, migration path is incomplete");
            break;
        };
        step[color] = next;
        path.push(step);
        group = group.other();
        adding = !adding;
    }

    debug_assert_eq!(path.last(), Some(&goal), "migration path stopped short of the goal");
    tracing::debug!(
        from = %current.as_step(),
        to = %goal,
        steps = path.len(),
        batch_size = options.batch_size,
        skip_first_n = options.skip_first_n,
        "built migration path"
    );
    path
}

/// Pick the color to move and its next count
///
/// Precedence: keep going in the preferred direction on `group`, then move
/// the other color either way, then move `group` against the preferred
/// direction.
fn next_move(
    step: &Step,
    goal: &Step,
    group: Color,
    adding: bool,
    options: &StepOptions,
) -> Option<(Color, usize)> {
    let other = group.other();
    let candidates = [
        (group, Some(adding)),
        (other, None),
        (group, None),
    ];

    candidates.into_iter().find_map(|(color, direction)| {
        let (cur, tgt) = (step[color], goal[color]);
        let grow = cur < tgt && direction != Some(false);
        let shrink = cur > tgt && direction != Some(true);
        if grow {
            Some((color, cur + add_and_skip(cur, tgt, options)))
        } else if shrink {
            Some((color, cur - minus_and_skip(cur, tgt, options)))
        } else {
            None
        }
    })
}

/// Nodes to add moving from `cur` up to `tgt`
fn add_and_skip(cur: usize, tgt: usize, options: &StepOptions) -> usize {
    let StepOptions {
        batch_size,
        skip_first_n,
    } = *options;
    let delta = if cur > skip_first_n && cur + batch_size >= tgt {
        tgt - cur
    } else if cur + batch_size <= skip_first_n {
        skip_first_n + 1 - cur
    } else {
        batch_size
    };
    delta.min(tgt - cur)
}

/// Nodes to remove moving from `cur` down to `tgt`
fn minus_and_skip(cur: usize, tgt: usize, options: &StepOptions) -> usize {
    let delta = if cur.saturating_sub(options.batch_size) <= options.skip_first_n {
        cur - tgt
    } else {
        options.batch_size
    };
    delta.min(cur - tgt)
}
