//! Ties progression and production together into the weekly plan.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use tracing::debug;

use crate::production::{facilities, ProductionCalculator, ProductionProfile, WEEK_MINUTES};
use crate::progression::ProgressionRepository;
use crate::solver::{self, SolveResult};
use crate::store::DatasetBundle;

/// Home abilities surfaced by the planner, in display order.
pub const ABILITIES: &[(u32, &str)] = &[
    (22, "Construction"),
    (34, "Planting"),
    (45, "Star Collecting"),
    (47, "Fish Keeping"),
    (48, "Animal Inviting"),
];

pub const PLANTING_ABILITY: u32 = 34;
pub const FISH_KEEPING_ABILITY: u32 = 47;

/// Categories with a working production model, sorted.
pub const MODELLED_CATEGORIES: &[&str] = &["fish", "furniture", "plant"];

/// Farmland plots granted by Planting level-ups.
pub const FARMLAND_ITEMS: &[u64] = &[1170000320, 1170000321, 1170000322, 1170000323];

/// Fish ponds granted by Fish Keeping level-ups.
pub const FISH_POND_ITEMS: &[u64] = &[1170000419];

/// Only the first four bonus picks count, matching the in-game limit.
pub const MAX_BONUS_ITEMS: usize = 4;

pub const DEFAULT_BASE_WEEKLY_LIMIT: i64 = 100_000;

pub fn facility_names() -> BTreeMap<String, String> {
    [
        (facilities::PLANT_PLOT, "Plant plots"),
        (facilities::FISH_POND, "Fish ponds"),
        (facilities::CRAFTING, "Crafting queue"),
    ]
    .into_iter()
    .map(|(key, label)| (key.to_string(), label.to_string()))
    .collect()
}

/// Base weekly sale cap from the global config table.
pub fn base_weekly_limit(bundle: &DatasetBundle) -> anyhow::Result<i64> {
    let config = bundle.get("TbHomeGlobalConfig")?;
    Ok(config
        .get("home_money_max")
        .and_then(|value| value.as_i64().or_else(|| value.as_f64().map(|f| f as i64)))
        .unwrap_or(DEFAULT_BASE_WEEKLY_LIMIT))
}

#[derive(Debug, Clone)]
pub struct AbilityInfo {
    pub id: u32,
    pub label: &'static str,
    pub max_level: u32,
}

/// Everything one optimisation run produced, before wire shaping.
#[derive(Debug, Clone)]
pub struct WeeklyPlan {
    pub solve: SolveResult,
    pub weekly_limit: i64,
    pub weekly_bonus: i64,
    pub ability_total: u32,
    pub ability_levels: BTreeMap<u32, u32>,
    pub plant_plots: i64,
    pub fish_ponds: i64,
    pub crafting_slots: u32,
    pub capacities: BTreeMap<String, f64>,
    pub unlocked_item_ids: Vec<u64>,
}

pub struct WeeklyPlanner {
    profiles: Vec<Arc<ProductionProfile>>,
    progression: ProgressionRepository,
    base_weekly_limit: i64,
}

impl WeeklyPlanner {
    /// Keeps only the modelled categories; meteor and animal items have no
    /// timing data yet and would enter the program with zero cost.
    pub fn new(
        calculator: &ProductionCalculator,
        progression: ProgressionRepository,
        base_weekly_limit: i64,
    ) -> Self {
        let profiles = calculator
            .profiles()
            .into_iter()
            .filter(|profile| MODELLED_CATEGORIES.contains(&profile.category))
            .collect();
        Self {
            profiles,
            progression,
            base_weekly_limit,
        }
    }

    pub fn base_weekly_limit(&self) -> i64 {
        self.base_weekly_limit
    }

    pub fn modelled_profiles(&self) -> &[Arc<ProductionProfile>] {
        &self.profiles
    }

    pub fn progression(&self) -> &ProgressionRepository {
        &self.progression
    }

    pub fn abilities(&self) -> Vec<AbilityInfo> {
        ABILITIES
            .iter()
            .map(|&(id, label)| AbilityInfo {
                id,
                label,
                max_level: self.progression.max_level(id),
            })
            .collect()
    }

    /// Requested levels clamped to each ability's known maximum. Abilities
    /// with no reward data keep the requested level untouched.
    pub fn clamp_levels(&self, requested: &BTreeMap<u32, u32>) -> BTreeMap<u32, u32> {
        ABILITIES
            .iter()
            .map(|&(id, _)| {
                let level = requested.get(&id).copied().unwrap_or(0);
                let max_level = self.progression.max_level(id);
                let clamped = if max_level > 0 {
                    level.min(max_level)
                } else {
                    level
                };
                (id, clamped)
            })
            .collect()
    }

    pub fn plan(
        &self,
        requested_levels: &BTreeMap<u32, u32>,
        bonus_item_ids: &[u64],
        crafting_slots: u32,
    ) -> WeeklyPlan {
        let levels = self.clamp_levels(requested_levels);
        let ability_total: u32 = levels.values().sum();
        let weekly_bonus = self.progression.weekly_bonus_for_total_level(ability_total);
        let weekly_limit = self.base_weekly_limit + weekly_bonus;

        let planting_level = levels.get(&PLANTING_ABILITY).copied().unwrap_or(0);
        let fishing_level = levels.get(&FISH_KEEPING_ABILITY).copied().unwrap_or(0);
        let plant_plots =
            self.progression
                .sum_item_counts(PLANTING_ABILITY, planting_level, FARMLAND_ITEMS);
        let fish_ponds =
            self.progression
                .sum_item_counts(FISH_KEEPING_ABILITY, fishing_level, FISH_POND_ITEMS);
        let crafting_slots = crafting_slots.max(1);

        let capacities: BTreeMap<String, f64> = [
            (
                facilities::PLANT_PLOT.to_string(),
                plant_plots as f64 * WEEK_MINUTES,
            ),
            (
                facilities::FISH_POND.to_string(),
                fish_ponds as f64 * WEEK_MINUTES,
            ),
            (
                facilities::CRAFTING.to_string(),
                crafting_slots as f64 * WEEK_MINUTES,
            ),
        ]
        .into_iter()
        .collect();

        let unlocked: Vec<Arc<ProductionProfile>> = self
            .profiles
            .iter()
            .filter(|profile| {
                levels.get(&profile.ability_id).copied().unwrap_or(0) >= profile.ability_level
            })
            .cloned()
            .collect();
        let bonus: HashSet<u64> = bonus_item_ids
            .iter()
            .take(MAX_BONUS_ITEMS)
            .copied()
            .collect();

        let solve =
            solver::optimise_portfolio(&unlocked, weekly_limit as f64, &capacities, &bonus);
        debug!(
            status = solve.status.as_str(),
            items = solve.items.len(),
            total = solve.total_astralite,
            unlocked = unlocked.len(),
            "weekly plan computed"
        );

        WeeklyPlan {
            unlocked_item_ids: unlocked.iter().map(|profile| profile.item_id).collect(),
            solve,
            weekly_limit,
            weekly_bonus,
            ability_total,
            ability_levels: levels,
            plant_plots,
            fish_ponds,
            crafting_slots,
            capacities,
        }
    }
}
