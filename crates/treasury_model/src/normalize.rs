//! Bounded proportional normalization onto the probability simplex
//!
//! # Algorithm
//! 1. Distribute the remaining mass over unlocked keys in proportion to their
//!    non-negative raw weight (equal split when every raw weight is zero)
//! 2. Lock every key whose share falls outside [min, max] at the violated bound
//!    and take that bound out of the remaining mass
//! 3. Stop at the first round without a violation; at most one round per key
//! 4. Mass left over (infeasible bounds) is split equally over unlocked keys,
//!    each clamped into its own bounds
//! 5. Re-normalize by the total, or fall back to uniform when the total is <= 0
//! 6. If the bounds are feasible but step 5 left a value outside them, clamp
//!    and redistribute the gap over the keys with room left
//!
//! Step 5 is load-bearing: when the minimums alone exceed 1 the clamped result
//! does not sum to 1 until it runs.

use crate::math::clamp_f64;
use std::collections::{BTreeMap, BTreeSet};

/// Normalize `raw` so the result sums to 1 and, where feasible, every value
/// lies within its `[min, max]`. Keys are taken from `raw`; a missing bound
/// defaults to `[0, 1]`.
pub fn bounded_normalize(
    raw: &BTreeMap<String, f64>,
    min_map: &BTreeMap<String, f64>,
    max_map: &BTreeMap<String, f64>,
) -> BTreeMap<String, f64> {
    let keys: Vec<&str> = raw.keys().map(String::as_str).collect();
    if keys.is_empty() {
        return BTreeMap::new();
    }

    let weight = |key: &str| raw.get(key).copied().unwrap_or(0.0).max(0.0);
    let bounds = |key: &str| {
        (
            min_map.get(key).copied().unwrap_or(0.0),
            max_map.get(key).copied().unwrap_or(1.0),
        )
    };

    let mut result: BTreeMap<&str, f64> = keys.iter().map(|&key| (key, 0.0)).collect();
    let mut locked: BTreeSet<&str> = BTreeSet::new();
    let mut remaining = 1.0_f64;

    for round in 0..keys.len() {
        let unlocked: Vec<&str> = keys
            .iter()
            .copied()
            .filter(|key| !locked.contains(key))
            .collect();
        if unlocked.is_empty() {
            break;
        }

        let raw_sum: f64 = unlocked.iter().map(|&key| weight(key)).sum();
        let candidate: Vec<(&str, f64)> = unlocked
            .iter()
            .map(|&key| {
                let share = if raw_sum == 0.0 {
                    remaining / unlocked.len() as f64
                } else {
                    weight(key) / raw_sum * remaining
                };
                (key, share)
            })
            .collect();

        let mut violated = false;
        for &(key, share) in &candidate {
            let (min, max) = bounds(key);
            let lock_at = if share < min {
                min
            } else if share > max {
                max
            } else {
                continue;
            };
            result.insert(key, lock_at);
            remaining -= lock_at;
            locked.insert(key);
            violated = true;
        }

        if !violated {
            for (key, share) in candidate {
                result.insert(key, share);
            }
            remaining = 0.0;
            log::trace!("normalize: converged after {} round(s)", round + 1);
            break;
        }

        if remaining <= 0.0 {
            break;
        }
    }

    if remaining != 0.0 {
        let unlocked: Vec<&str> = keys
            .iter()
            .copied()
            .filter(|key| !locked.contains(key))
            .collect();
        log::debug!(
            "normalize: bounds infeasible, spreading {} over {} unlocked key(s)",
            remaining,
            unlocked.len()
        );
        if !unlocked.is_empty() {
            let share = remaining / unlocked.len() as f64;
            for key in unlocked {
                let (min, max) = bounds(key);
                let current = result.get(key).copied().unwrap_or(0.0);
                result.insert(key, clamp_f64(current + share, min, max));
            }
        }
    }

    let total: f64 = result.values().sum();
    if !(total > 0.0 && total.is_finite()) {
        log::debug!("normalize: degenerate total {}, using uniform split", total);
        let equal = 1.0 / keys.len() as f64;
        return keys.into_iter().map(|key| (key.to_string(), equal)).collect();
    }

    let mut normalized: BTreeMap<String, f64> = result
        .into_iter()
        .map(|(key, value)| (key.to_string(), value / total))
        .collect();
    repair_bounds(&mut normalized, &bounds);
    normalized
}

/// Move mass back inside the bounds when the lock loop over-committed and the
/// re-normalization pushed locked values outside them.
///
/// Runs only when the bounds admit a solution (`sum(min) <= 1 <= sum(max)`):
/// clamp, then spread the surplus or deficit over the keys in proportion to
/// their remaining room.
fn repair_bounds(values: &mut BTreeMap<String, f64>, bounds: &impl Fn(&str) -> (f64, f64)) {
    const TOLERANCE: f64 = 1e-12;

    let limits: Vec<(f64, f64)> = values.keys().map(|key| bounds(key.as_str())).collect();
    let feasible = limits.iter().all(|(min, max)| min <= max)
        && limits.iter().map(|(min, _)| min).sum::<f64>() <= 1.0
        && limits.iter().map(|(_, max)| max).sum::<f64>() >= 1.0;
    let violated = values
        .values()
        .zip(&limits)
        .any(|(value, (min, max))| *value < min - TOLERANCE || *value > max + TOLERANCE);
    if !feasible || !violated {
        return;
    }

    for (value, (min, max)) in values.values_mut().zip(&limits) {
        *value = clamp_f64(*value, *min, *max);
    }

    let gap = 1.0 - values.values().sum::<f64>();
    let room: Vec<f64> = values
        .values()
        .zip(&limits)
        .map(|(value, (min, max))| if gap > 0.0 { max - value } else { value - min })
        .collect();
    let total_room: f64 = room.iter().sum();
    if total_room > 0.0 {
        for (value, room) in values.values_mut().zip(&room) {
            *value += gap * room / total_room;
        }
    }
    log::debug!("normalize: repaired bound violation, moved {}", gap);
}
