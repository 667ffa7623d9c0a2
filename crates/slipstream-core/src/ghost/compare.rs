//! Best-split comparison math
//!
//! The configured splits partition [0, 100] into contiguous regions; each
//! region's best sub-sequence is tracked independently and re-based so its
//! own timeline starts at 0. Comparison uses each region's own elapsed
//! time on both sides — never the cumulative race timer, which would let a
//! slow region ride on a fast earlier one.
//!
//! Assembled regions are normalized: an exact `(0, start)` entry, the
//! interior points re-based, and an exact `(elapsed, end)` entry computed
//! by linear interpolation at the boundary. Normalization is idempotent,
//! so re-saving a slower run leaves the stored sequence unchanged.

use crate::ghost::document::{BestSplit, SplitDefinition};
use crate::telemetry::Snapshot;

/// One contiguous progress region `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Region {
    pub start: f64,
    pub end: f64,
}

/// Which side of a region a boundary query serves. A stored boundary
/// percentage can appear twice — as the earlier region's end entry and the
/// later region's start entry — and the side picks the one on the caller's
/// own timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Boundary {
    Start,
    End,
}

/// Partition [0, 100] by the sorted split percentages. Splits outside the
/// open interval (0, 100) and duplicates are ignored; no splits means one
/// whole-run region.
pub(crate) fn region_boundaries(splits: &[SplitDefinition]) -> Vec<Region> {
    let mut cuts: Vec<f64> = splits
        .iter()
        .map(|s| s.race_completion)
        .filter(|p| *p > 0.0 && *p < 100.0)
        .collect();
    cuts.sort_by(f64::total_cmp);
    cuts.dedup();

    let mut regions = Vec::with_capacity(cuts.len() + 1);
    let mut prev = 0.0;
    for cut in cuts {
        regions.push(Region { start: prev, end: cut });
        prev = cut;
    }
    regions.push(Region {
        start: prev,
        end: 100.0,
    });
    regions
}

/// Frames reduced to comparison points; frames missing either field carry
/// no position on the time/progress curve and are skipped.
fn comparison_points(frames: &[Snapshot]) -> Vec<BestSplit> {
    frames
        .iter()
        .filter_map(|f| f.comparison_point())
        .map(|(timer_value, race_completion_pct)| BestSplit {
            timer_value,
            race_completion_pct,
        })
        .collect()
}

/// Points falling inside the region, boundaries inclusive, order kept.
fn slice_region(points: &[BestSplit], region: Region) -> Vec<BestSplit> {
    points
        .iter()
        .filter(|p| p.race_completion_pct >= region.start && p.race_completion_pct <= region.end)
        .cloned()
        .collect()
}

/// Timer value at `at` percent: an exact entry if one exists (resolved by
/// `side` when the boundary is duplicated), linear interpolation between
/// the two straddling points otherwise, clamped to the nearest point when
/// `at` lies outside the available range. `None` only for an empty list.
fn timer_at(points: &[BestSplit], at: f64, side: Boundary) -> Option<f64> {
    let mut exact = points
        .iter()
        .filter(|p| p.race_completion_pct == at)
        .map(|p| p.timer_value as f64);
    let first_exact = exact.next();
    if let Some(value) = first_exact {
        return Some(match side {
            Boundary::End => value,
            Boundary::Start => exact.last().unwrap_or(value),
        });
    }

    let before = points.iter().filter(|p| p.race_completion_pct < at).next_back();
    let after = points.iter().find(|p| p.race_completion_pct > at);
    match (before, after) {
        (None, None) => None,
        (None, Some(a)) => Some(a.timer_value as f64),
        (Some(b), None) => Some(b.timer_value as f64),
        (Some(b), Some(a)) => {
            let span = a.race_completion_pct - b.race_completion_pct;
            let t = (at - b.race_completion_pct) / span;
            Some(b.timer_value as f64 + t * (a.timer_value as f64 - b.timer_value as f64))
        }
    }
}

/// Assemble one normalized region: exact boundary entries around the
/// re-based interior.
fn rebase_region(points: &[BestSplit], region: Region, t_start: f64, t_end: f64) -> Vec<BestSplit> {
    let mut out = Vec::with_capacity(points.len() + 2);
    out.push(BestSplit {
        timer_value: 0,
        race_completion_pct: region.start,
    });
    out.extend(
        points
            .iter()
            .filter(|p| {
                p.race_completion_pct > region.start && p.race_completion_pct < region.end
            })
            .map(|p| BestSplit {
                timer_value: ((p.timer_value as f64) - t_start).round() as i64,
                race_completion_pct: p.race_completion_pct,
            }),
    );
    out.push(BestSplit {
        timer_value: (t_end - t_start).round() as i64,
        race_completion_pct: region.end,
    });
    out
}

/// Re-emit a stored region on its own timeline. Idempotent for regions
/// this module assembled.
fn normalize_region(points: &[BestSplit], region: Region) -> Vec<BestSplit> {
    let t_start = timer_at(points, region.start, Boundary::Start).unwrap_or(0.0);
    let t_end = timer_at(points, region.end, Boundary::End).unwrap_or(t_start);
    rebase_region(points, region, t_start, t_end)
}

/// Merge a finished run into the stored best splits.
///
/// Per region, independently: the run replaces the stored sub-sequence
/// when its own elapsed time over the region is less than or equal to the
/// stored one (or nothing is stored); regions the run never completed, or
/// holds no data for, keep the stored sub-sequence.
pub fn merge_best_splits(
    old_best: &[BestSplit],
    new_frames: &[Snapshot],
    splits: &[SplitDefinition],
) -> Vec<BestSplit> {
    let new_points = comparison_points(new_frames);
    let mut assembled = Vec::new();

    for region in region_boundaries(splits) {
        let new_region = slice_region(&new_points, region);
        let old_region = slice_region(old_best, region);

        // A run that never reached the region's end has no boundary time
        // to compare; clamped extrapolation would undercount it as a
        // near-zero "improvement".
        let reaches_end = new_points
            .iter()
            .any(|p| p.race_completion_pct >= region.end);

        if new_region.is_empty() || !reaches_end {
            if !old_region.is_empty() {
                assembled.extend(normalize_region(&old_region, region));
            }
            continue;
        }

        // New-run boundary times come from the full cumulative timeline so
        // frames straddling a boundary interpolate exactly; the stored
        // side is per-region re-based and must be read region-locally.
        let new_start = timer_at(&new_points, region.start, Boundary::Start).unwrap_or(0.0);
        let new_end = timer_at(&new_points, region.end, Boundary::End).unwrap_or(new_start);
        let new_elapsed = new_end - new_start;

        let old_elapsed = match (
            timer_at(&old_region, region.start, Boundary::Start),
            timer_at(&old_region, region.end, Boundary::End),
        ) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        };

        if old_elapsed.is_none_or(|old| new_elapsed <= old) {
            assembled.extend(rebase_region(&new_region, region, new_start, new_end));
        } else {
            assembled.extend(normalize_region(&old_region, region));
        }
    }

    assembled
}

/// Ghost timer at a live progress value: linear interpolation between the
/// two best-split entries bracketing it, clamped to the nearest end entry
/// outside the range. `None` only when there are no best splits at all.
pub fn interpolate(best: &[BestSplit], pct: f64) -> Option<f64> {
    if best.is_empty() {
        return None;
    }

    let mut sorted: Vec<&BestSplit> = best.iter().collect();
    sorted.sort_by(|a, b| a.race_completion_pct.total_cmp(&b.race_completion_pct));

    let first = sorted[0];
    let last = sorted[sorted.len() - 1];
    if pct <= first.race_completion_pct {
        return Some(first.timer_value as f64);
    }
    if pct >= last.race_completion_pct {
        return Some(last.timer_value as f64);
    }

    for pair in sorted.windows(2) {
        let p0 = pair[0].race_completion_pct;
        let p1 = pair[1].race_completion_pct;
        if p0 <= pct && pct <= p1 {
            if p0 == p1 {
                return Some(pair[0].timer_value as f64);
            }
            let t = (pct - p0) / (p1 - p0);
            return Some(
                pair[0].timer_value as f64
                    + t * (pair[1].timer_value as f64 - pair[0].timer_value as f64),
            );
        }
    }

    None
}
