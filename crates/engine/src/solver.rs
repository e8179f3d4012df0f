//! Weekly production plan as a linear program.
//!
//! Maximise the Astralite value of the produced units subject to one
//! capacity row per facility and one row for the weekly sale cap. All
//! coefficients are non-negative and the sale cap bounds the objective, so
//! the all-slack basis is feasible and a dense primal simplex is enough.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use tracing::debug;

use crate::production::ProductionProfile;

/// Value multiplier for items selected as weekly bonus picks.
pub const BONUS_MULTIPLIER: f64 = 1.2;

const EPSILON: f64 = 1e-9;
const UNIT_FLOOR: f64 = 1e-6;
const MAX_PIVOTS: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    Optimal,
    NoCapacity,
    NoVariables,
    Unbounded,
    IterationLimit,
}

impl SolveStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SolveStatus::Optimal => "Optimal",
            SolveStatus::NoCapacity => "No capacity",
            SolveStatus::NoVariables => "No variables",
            SolveStatus::Unbounded => "Unbounded",
            SolveStatus::IterationLimit => "Not Solved",
        }
    }
}

/// One produced item in the optimal plan.
#[derive(Debug, Clone)]
pub struct PlannedItem {
    pub item_id: u64,
    pub name: String,
    pub units: f64,
    pub astralite: f64,
    pub multiplier: f64,
    pub facility_minutes: BTreeMap<String, f64>,
    pub profile: Arc<ProductionProfile>,
}

#[derive(Debug, Clone)]
pub struct SolveResult {
    pub items: Vec<PlannedItem>,
    pub total_astralite: f64,
    pub facility_usage: BTreeMap<String, f64>,
    pub status: SolveStatus,
}

impl SolveResult {
    fn empty(status: SolveStatus) -> Self {
        Self {
            items: Vec::new(),
            total_astralite: 0.0,
            facility_usage: BTreeMap::new(),
            status,
        }
    }
}

/// Picks the value-maximising production mix for one week.
///
/// Facilities with non-positive capacity are unconstrained rather than
/// forbidden: a zero plot count only matters for items that need plots.
/// Profiles with a non-finite minute cost in a constrained facility cannot
/// be produced in finite time and are left out of the program.
pub fn optimise_portfolio(
    profiles: &[Arc<ProductionProfile>],
    weekly_limit: f64,
    capacities: &BTreeMap<String, f64>,
    bonus_item_ids: &HashSet<u64>,
) -> SolveResult {
    if weekly_limit <= 0.0 || profiles.is_empty() {
        return SolveResult::empty(SolveStatus::NoCapacity);
    }

    let active: Vec<(&str, f64)> = capacities
        .iter()
        .filter(|(_, cap)| cap.is_finite() && **cap > 0.0)
        .map(|(facility, cap)| (facility.as_str(), *cap))
        .collect();

    let candidates: Vec<Arc<ProductionProfile>> = profiles
        .iter()
        .filter(|p| p.sale_value > 0.0)
        .filter(|p| {
            active.iter().all(|(facility, _)| {
                p.facility_minutes
                    .get(*facility)
                    .map_or(true, |minutes| minutes.is_finite())
            })
        })
        .cloned()
        .collect();
    if candidates.is_empty() {
        return SolveResult::empty(SolveStatus::NoVariables);
    }

    let multiplier_for = |p: &ProductionProfile| -> f64 {
        if bonus_item_ids.contains(&p.item_id) {
            BONUS_MULTIPLIER
        } else {
            1.0
        }
    };

    // Rows: one per active facility, then the weekly value cap. Columns:
    // one unit variable per candidate, then one slack per row, then the
    // right-hand side. The last tableau row is the objective.
    let n = candidates.len();
    let m = active.len() + 1;
    let rhs = n + m;
    let mut tableau = vec![vec![0.0; n + m + 1]; m + 1];
    for (i, (facility, cap)) in active.iter().enumerate() {
        for (j, profile) in candidates.iter().enumerate() {
            tableau[i][j] = profile
                .facility_minutes
                .get(*facility)
                .copied()
                .unwrap_or(0.0);
        }
        tableau[i][n + i] = 1.0;
        tableau[i][rhs] = *cap;
    }
    let cap_row = m - 1;
    for (j, profile) in candidates.iter().enumerate() {
        let value = profile.sale_value * multiplier_for(profile);
        tableau[cap_row][j] = value;
        tableau[m][j] = -value;
    }
    tableau[cap_row][n + cap_row] = 1.0;
    tableau[cap_row][rhs] = weekly_limit;

    let mut basis: Vec<usize> = (n..n + m).collect();
    let status = simplex(&mut tableau, &mut basis, n, m);
    debug!(
        candidates = n,
        constraints = m,
        status = status.as_str(),
        "weekly program solved"
    );
    if status != SolveStatus::Optimal {
        return SolveResult::empty(status);
    }

    let mut units = vec![0.0; n];
    for (i, &column) in basis.iter().enumerate() {
        if column < n {
            units[column] = tableau[i][rhs].max(0.0);
        }
    }

    let mut facility_usage: BTreeMap<String, f64> =
        capacities.keys().map(|k| (k.clone(), 0.0)).collect();
    let mut items = Vec::new();
    let mut total_astralite = 0.0;
    for (j, profile) in candidates.iter().enumerate() {
        if units[j] <= UNIT_FLOOR {
            continue;
        }
        let multiplier = multiplier_for(profile);
        let astralite = profile.sale_value * multiplier * units[j];
        let item_minutes: BTreeMap<String, f64> = profile
            .facility_minutes
            .iter()
            .filter(|(_, minutes)| **minutes > 0.0)
            .map(|(facility, minutes)| (facility.clone(), minutes * units[j]))
            .collect();
        for (facility, minutes) in &item_minutes {
            *facility_usage.entry(facility.clone()).or_insert(0.0) += minutes;
        }
        total_astralite += astralite;
        items.push(PlannedItem {
            item_id: profile.item_id,
            name: profile.name.clone(),
            units: units[j],
            astralite,
            multiplier,
            facility_minutes: item_minutes,
            profile: Arc::clone(profile),
        });
    }
    items.sort_by(|a, b| b.astralite.total_cmp(&a.astralite));

    SolveResult {
        items,
        total_astralite,
        facility_usage,
        status,
    }
}

/// Dantzig-rule primal simplex over an all-slack starting basis. Ties in
/// the ratio test break towards the lowest basis index (Bland), which
/// keeps degenerate pivots from cycling.
fn simplex(tableau: &mut [Vec<f64>], basis: &mut [usize], n: usize, m: usize) -> SolveStatus {
    let rhs = n + m;
    for _ in 0..MAX_PIVOTS {
        let mut entering = None;
        let mut best = -EPSILON;
        for (j, &coefficient) in tableau[m][..rhs].iter().enumerate() {
            if coefficient < best {
                best = coefficient;
                entering = Some(j);
            }
        }
        let Some(column) = entering else {
            return SolveStatus::Optimal;
        };

        let mut leaving: Option<usize> = None;
        let mut best_ratio = f64::INFINITY;
        for i in 0..m {
            let coefficient = tableau[i][column];
            if coefficient <= EPSILON {
                continue;
            }
            let ratio = tableau[i][rhs] / coefficient;
            match leaving {
                None => {
                    leaving = Some(i);
                    best_ratio = ratio;
                }
                Some(current) => {
                    if ratio < best_ratio - EPSILON {
                        leaving = Some(i);
                        best_ratio = ratio;
                    } else if (ratio - best_ratio).abs() <= EPSILON && basis[i] < basis[current] {
                        leaving = Some(i);
                    }
                }
            }
        }
        let Some(row) = leaving else {
            return SolveStatus::Unbounded;
        };

        pivot(tableau, row, column);
        basis[row] = column;
    }
    SolveStatus::IterationLimit
}

fn pivot(tableau: &mut [Vec<f64>], row: usize, column: usize) {
    let pivot_value = tableau[row][column];
    for cell in &mut tableau[row] {
        *cell /= pivot_value;
    }
    let pivot_row = tableau[row].clone();
    for (i, current) in tableau.iter_mut().enumerate() {
        if i == row {
            continue;
        }
        let factor = current[column];
        if factor == 0.0 {
            continue;
        }
        for (cell, pivot_cell) in current.iter_mut().zip(&pivot_row) {
            *cell -= factor * pivot_cell;
        }
    }
}
