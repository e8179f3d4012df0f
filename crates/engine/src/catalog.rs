//! Names and URLs of the upstream game data extracts.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Raw-file root of the community data repository.
pub const DEFAULT_BASE_URL: &str = "https://github.com/kateberly/Astralite/raw/refs/heads/main";

/// Every dataset the upstream repository publishes.
pub const ALL_DATASETS: &[&str] = &[
    "TbFurnitureMakeMaterialExchangeInfo",
    "TbFurnitureTableMakeInfo",
    "TbGamePlayItemsMakeInfo",
    "TbHomeAbilityLevelUpRewardShowInfo",
    "TbHomeAbilityTotalLevelValueInfo",
    "TbHomeAnimalFoodCfg",
    "TbHomeAnimalGameplay",
    "TbHomeAnimalHabitatCfg",
    "TbHomeFishGrowthConfig",
    "TbHomeFishNutrientConfig",
    "TbHomeGlobalConfig",
    "TbHomeMiningMineralProficiency",
    "TbHomeProductsSaleInfo",
    "TbPlantingGrowthProcess",
    "TbPlantingNutrient",
    "en",
];

/// The subset the planner loads at startup. Animal and mining tables exist
/// upstream but nothing downstream models them yet.
pub const REQUIRED_DATASETS: &[&str] = &[
    "en",
    "TbHomeGlobalConfig",
    "TbHomeProductsSaleInfo",
    "TbHomeAbilityLevelUpRewardShowInfo",
    "TbHomeAbilityTotalLevelValueInfo",
    "TbPlantingGrowthProcess",
    "TbPlantingNutrient",
    "TbHomeFishGrowthConfig",
    "TbHomeFishNutrientConfig",
    "TbFurnitureTableMakeInfo",
    "TbFurnitureMakeMaterialExchangeInfo",
];

pub fn is_known(name: &str) -> bool {
    ALL_DATASETS.contains(&name)
}

/// Where to fetch datasets from. The default points at the public data
/// repository; `overrides` swaps in a full URL for individual datasets,
/// which is mainly useful for mirrors and tests.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub base_url: String,
    pub overrides: BTreeMap<String, String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            overrides: BTreeMap::new(),
        }
    }
}

impl SourceConfig {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            overrides: BTreeMap::new(),
        }
    }

    pub fn url_for(&self, name: &str) -> String {
        if let Some(url) = self.overrides.get(name) {
            return url.clone();
        }
        format!("{}/{}.json", self.base_url.trim_end_matches('/'), name)
    }
}
