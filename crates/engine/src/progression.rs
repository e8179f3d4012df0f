//! Home ability level-up rewards and total-level weekly bonuses.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::store::{field_i64, field_u64, rows};

/// Items granted when one ability reaches one level.
#[derive(Debug, Clone)]
pub struct LevelReward {
    pub ability_id: u32,
    pub level: u32,
    pub items: BTreeMap<u64, i64>,
}

#[derive(Debug, Clone, Copy)]
pub struct TotalLevelBonus {
    pub level: u32,
    pub weekly_bonus: i64,
}

#[derive(Debug, Clone, Default)]
pub struct ProgressionRepository {
    rewards_by_ability: BTreeMap<u32, Vec<LevelReward>>,
    total_level_bonuses: Vec<TotalLevelBonus>,
}

impl ProgressionRepository {
    /// Builds the lookup tables from `TbHomeAbilityLevelUpRewardShowInfo`
    /// and `TbHomeAbilityTotalLevelValueInfo`. Reward row ids encode the
    /// ability and level as `ability_id * 1000 + level`.
    pub fn new(reward_data: &Value, total_level_data: &Value) -> Self {
        let mut rewards_by_ability: BTreeMap<u32, Vec<LevelReward>> = BTreeMap::new();
        for entry in rows(reward_data) {
            let raw_id = field_i64(entry, "id");
            if raw_id <= 0 {
                continue;
            }
            let ability_id = (raw_id / 1000) as u32;
            let level = (raw_id % 1000) as u32;
            let mut items = BTreeMap::new();
            for reward in entry
                .get("des_item")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
                .filter_map(Value::as_object)
            {
                let item_id = field_u64(reward, "item_id");
                if item_id == 0 {
                    continue;
                }
                *items.entry(item_id).or_insert(0) += field_i64(reward, "num");
            }
            rewards_by_ability
                .entry(ability_id)
                .or_default()
                .push(LevelReward {
                    ability_id,
                    level,
                    items,
                });
        }
        for rewards in rewards_by_ability.values_mut() {
            rewards.sort_by_key(|reward| reward.level);
        }

        let mut total_level_bonuses: Vec<TotalLevelBonus> = rows(total_level_data)
            .map(|entry| TotalLevelBonus {
                level: field_i64(entry, "level").max(0) as u32,
                weekly_bonus: field_i64(entry, "gold_weekmax"),
            })
            .collect();
        total_level_bonuses.sort_by_key(|bonus| bonus.level);

        Self {
            rewards_by_ability,
            total_level_bonuses,
        }
    }

    /// Cumulative items granted by an ability up to and including `level`.
    pub fn ability_reward_items(&self, ability_id: u32, level: u32) -> BTreeMap<u64, i64> {
        let mut items = BTreeMap::new();
        let Some(rewards) = self.rewards_by_ability.get(&ability_id) else {
            return items;
        };
        for reward in rewards {
            if reward.level > level {
                break;
            }
            for (item_id, count) in &reward.items {
                *items.entry(*item_id).or_insert(0) += count;
            }
        }
        items
    }

    /// Total count of the given items granted up to `level`.
    pub fn sum_item_counts(&self, ability_id: u32, level: u32, item_ids: &[u64]) -> i64 {
        let items = self.ability_reward_items(ability_id, level);
        item_ids
            .iter()
            .map(|item_id| items.get(item_id).copied().unwrap_or(0))
            .sum()
    }

    /// Highest level with a reward entry, or 0 for unknown abilities.
    pub fn max_level(&self, ability_id: u32) -> u32 {
        self.rewards_by_ability
            .get(&ability_id)
            .and_then(|rewards| rewards.last())
            .map(|reward| reward.level)
            .unwrap_or(0)
    }

    /// Weekly sale-cap bonus for a combined ability level: the highest
    /// threshold at or below `total_level` wins.
    pub fn weekly_bonus_for_total_level(&self, total_level: u32) -> i64 {
        let mut bonus = 0;
        for step in &self.total_level_bonuses {
            if step.level > total_level {
                break;
            }
            bonus = step.weekly_bonus;
        }
        bonus
    }
}
