//! Stitches the gameplay datasets into per-item production profiles.
//!
//! A profile answers "what does one unit of this item cost in facility
//! minutes", with furniture recursing through its recipe components.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::localization::Localization;
use crate::store::{field_f64, field_i64, field_str, field_u64, rows, DatasetBundle};

/// Facility keys used across profiles, capacities, and usage maps.
pub mod facilities {
    pub const PLANT_PLOT: &str = "plant_plot";
    pub const FISH_POND: &str = "fish_pond";
    pub const CRAFTING: &str = "crafting";
}

pub const WEEK_MINUTES: f64 = 7.0 * 24.0 * 60.0;

/// Reward item id of the Astralite currency in the sale table.
pub const ASTRALITE_ITEM_ID: u64 = 14;

pub fn ability_category(ability_id: u32) -> &'static str {
    match ability_id {
        22 => "furniture",
        34 => "plant",
        45 => "meteor",
        47 => "fish",
        48 => "animal",
        _ => "other",
    }
}

#[derive(Debug, Clone)]
pub struct SaleItem {
    pub item_id: u64,
    pub ability_id: u32,
    pub ability_level: u32,
    pub sale_value: f64,
    pub ratio: f64,
    pub name: String,
    pub category: &'static str,
}

#[derive(Debug, Clone)]
pub struct PlantGrowth {
    pub seed_id: u64,
    pub harvest_item_id: u64,
    pub growth_time_sec: i64,
    pub accelerated_time_sec: i64,
    pub average_yield: f64,
    pub farmland_ids: Vec<u64>,
}

impl PlantGrowth {
    pub fn cycle_minutes(&self) -> f64 {
        self.accelerated_time_sec as f64 / 60.0
    }

    pub fn minutes_per_item(&self) -> f64 {
        if self.average_yield <= 0.0 {
            return f64::INFINITY;
        }
        self.cycle_minutes() / self.average_yield
    }
}

#[derive(Debug, Clone)]
pub struct FishGrowth {
    pub fry_id: u64,
    pub fish_id: u64,
    pub growth_time_sec: i64,
    pub accelerated_time_sec: i64,
    pub name: String,
    pub yield_per_cycle: f64,
}

impl FishGrowth {
    pub fn cycle_minutes(&self) -> f64 {
        self.accelerated_time_sec as f64 / 60.0
    }

    pub fn minutes_per_item(&self) -> f64 {
        if self.yield_per_cycle <= 0.0 {
            return f64::INFINITY;
        }
        self.cycle_minutes() / self.yield_per_cycle
    }
}

#[derive(Debug, Clone)]
struct MaterialRequirement {
    item_id: u64,
    quantity: f64,
}

/// One recipe input of a furniture item. `profile` is absent when the
/// component is not itself saleable, or when the recipe is cyclic.
#[derive(Debug, Clone)]
pub struct ComponentRequirement {
    pub item_id: u64,
    pub name: String,
    pub quantity: f64,
    pub profile: Option<Arc<ProductionProfile>>,
    pub exchange_cost: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct ProductionProfile {
    pub item_id: u64,
    pub name: String,
    pub sale_value: f64,
    pub ability_id: u32,
    pub ability_level: u32,
    pub category: &'static str,
    pub facility_minutes: BTreeMap<String, f64>,
    pub components: Vec<ComponentRequirement>,
    pub notes: Vec<String>,
}

/// Builds production profiles for saleable items. All profiles are computed
/// eagerly at construction, so lookups never mutate.
pub struct ProductionCalculator {
    sale_items: BTreeMap<u64, SaleItem>,
    plant_growth: HashMap<u64, PlantGrowth>,
    fish_growth: HashMap<u64, FishGrowth>,
    furniture_recipes: HashMap<u64, Vec<MaterialRequirement>>,
    furniture_time: HashMap<u64, f64>,
    exchange_costs: HashMap<u64, i64>,
    profiles: HashMap<u64, Arc<ProductionProfile>>,
}

impl ProductionCalculator {
    pub fn new(bundle: &DatasetBundle, localization: &Localization) -> anyhow::Result<Self> {
        let sale_items = load_sale_items(bundle.get("TbHomeProductsSaleInfo")?, localization);
        let plant_growth = load_plant_growth(
            bundle.get("TbPlantingGrowthProcess")?,
            bundle.get("TbPlantingNutrient")?,
        );
        let fish_growth = load_fish_growth(
            bundle.get("TbHomeFishGrowthConfig")?,
            bundle.get("TbHomeFishNutrientConfig")?,
            localization,
            &sale_items,
        );
        let (furniture_recipes, furniture_time) =
            load_furniture_recipes(bundle.get("TbFurnitureTableMakeInfo")?);
        let exchange_costs =
            load_exchange_costs(bundle.get("TbFurnitureMakeMaterialExchangeInfo")?);

        let mut calc = Self {
            sale_items,
            plant_growth,
            fish_growth,
            furniture_recipes,
            furniture_time,
            exchange_costs,
            profiles: HashMap::new(),
        };
        let item_ids: Vec<u64> = calc.sale_items.keys().copied().collect();
        for item_id in item_ids {
            let mut stack = HashSet::new();
            calc.compute_profile(item_id, localization, &mut stack);
        }
        debug!(
            sale_items = calc.sale_items.len(),
            plants = calc.plant_growth.len(),
            fish = calc.fish_growth.len(),
            recipes = calc.furniture_recipes.len(),
            "production profiles built"
        );
        Ok(calc)
    }

    pub fn profile(&self, item_id: u64) -> Option<&Arc<ProductionProfile>> {
        self.profiles.get(&item_id)
    }

    /// All saleable profiles in ascending item id order.
    pub fn profiles(&self) -> Vec<Arc<ProductionProfile>> {
        self.sale_items
            .keys()
            .filter_map(|item_id| self.profiles.get(item_id))
            .cloned()
            .collect()
    }

    pub fn plant_growth(&self, item_id: u64) -> Option<&PlantGrowth> {
        self.plant_growth.get(&item_id)
    }

    pub fn fish_growth(&self, item_id: u64) -> Option<&FishGrowth> {
        self.fish_growth.get(&item_id)
    }

    fn compute_profile(
        &mut self,
        item_id: u64,
        localization: &Localization,
        stack: &mut HashSet<u64>,
    ) -> Option<Arc<ProductionProfile>> {
        if let Some(profile) = self.profiles.get(&item_id) {
            return Some(profile.clone());
        }
        if stack.contains(&item_id) {
            // Recipe cycle; the caller records the component without a profile.
            return None;
        }
        let sale = self.sale_items.get(&item_id)?.clone();
        stack.insert(item_id);
        let profile = match sale.category {
            "plant" => self.build_plant_profile(&sale),
            "fish" => self.build_fish_profile(&sale),
            "furniture" => self.build_furniture_profile(&sale, localization, stack),
            _ => build_basic_profile(&sale),
        };
        stack.remove(&item_id);
        let profile = Arc::new(profile);
        self.profiles.insert(item_id, profile.clone());
        Some(profile)
    }

    fn build_plant_profile(&self, sale: &SaleItem) -> ProductionProfile {
        let mut facility_minutes = BTreeMap::new();
        let mut notes = Vec::new();
        match self.plant_growth.get(&sale.item_id) {
            Some(growth) => {
                facility_minutes
                    .insert(facilities::PLANT_PLOT.to_string(), growth.minutes_per_item());
            }
            None => notes.push("No planting data available; timing estimates missing.".to_string()),
        }
        profile_from_sale(sale, facility_minutes, Vec::new(), notes)
    }

    fn build_fish_profile(&self, sale: &SaleItem) -> ProductionProfile {
        let mut facility_minutes = BTreeMap::new();
        let mut notes = Vec::new();
        match self.fish_growth.get(&sale.item_id) {
            Some(growth) => {
                facility_minutes
                    .insert(facilities::FISH_POND.to_string(), growth.minutes_per_item());
            }
            None => {
                notes.push("No fish growth data available; timing estimates missing.".to_string())
            }
        }
        profile_from_sale(sale, facility_minutes, Vec::new(), notes)
    }

    fn build_furniture_profile(
        &mut self,
        sale: &SaleItem,
        localization: &Localization,
        stack: &mut HashSet<u64>,
    ) -> ProductionProfile {
        let materials = self
            .furniture_recipes
            .get(&sale.item_id)
            .cloned()
            .unwrap_or_default();
        let mut facility_minutes = BTreeMap::new();
        facility_minutes.insert(
            facilities::CRAFTING.to_string(),
            self.furniture_time.get(&sale.item_id).copied().unwrap_or(0.0),
        );
        let mut components = Vec::new();
        let mut notes = Vec::new();
        if materials.is_empty() {
            notes.push("Furniture recipe not found in extracted data.".to_string());
        }
        for requirement in materials {
            let component_profile = self.compute_profile(requirement.item_id, localization, stack);
            if let Some(profile) = &component_profile {
                for (facility, minutes) in &profile.facility_minutes {
                    *facility_minutes.entry(facility.clone()).or_insert(0.0) +=
                        minutes * requirement.quantity;
                }
            }
            components.push(ComponentRequirement {
                item_id: requirement.item_id,
                name: localization.item_name(requirement.item_id),
                quantity: requirement.quantity,
                profile: component_profile,
                exchange_cost: self.exchange_costs.get(&requirement.item_id).copied(),
            });
        }
        profile_from_sale(sale, facility_minutes, components, notes)
    }
}

fn build_basic_profile(sale: &SaleItem) -> ProductionProfile {
    let notes = vec![format!(
        "Production data for {} items is not yet modelled.",
        sale.category
    )];
    profile_from_sale(sale, BTreeMap::new(), Vec::new(), notes)
}

fn profile_from_sale(
    sale: &SaleItem,
    facility_minutes: BTreeMap<String, f64>,
    components: Vec<ComponentRequirement>,
    notes: Vec<String>,
) -> ProductionProfile {
    ProductionProfile {
        item_id: sale.item_id,
        name: sale.name.clone(),
        sale_value: sale.sale_value,
        ability_id: sale.ability_id,
        ability_level: sale.ability_level,
        category: sale.category,
        facility_minutes,
        components,
        notes,
    }
}

fn load_sale_items(raw: &Value, localization: &Localization) -> BTreeMap<u64, SaleItem> {
    let mut sale_items = BTreeMap::new();
    for entry in rows(raw) {
        let item_id = field_u64(entry, "item_id");
        if item_id == 0 {
            continue;
        }
        let ability_id = field_u64(entry, "ability_id") as u32;
        let sale_value: f64 = entry
            .get("rewards")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_object)
            .filter(|reward| field_u64(reward, "item_id") == ASTRALITE_ITEM_ID)
            .map(|reward| field_f64(reward, "num"))
            .sum();
        sale_items.insert(
            item_id,
            SaleItem {
                item_id,
                ability_id,
                ability_level: field_u64(entry, "ability_level") as u32,
                sale_value,
                ratio: field_f64(entry, "ratio"),
                name: localization.item_name(item_id),
                category: ability_category(ability_id),
            },
        );
    }
    sale_items
}

// The free nutrient (consume_count 0) is assumed always applied, so every
// growth time is quoted with its speedup already taken off.
fn free_nutrient_speedup(nutrient_data: &Value, key: &str) -> i64 {
    for entry in rows(nutrient_data) {
        if field_i64(entry, "consume_count") == 0 {
            return field_i64(entry, key);
        }
    }
    0
}

fn load_plant_growth(growth_data: &Value, nutrient_data: &Value) -> HashMap<u64, PlantGrowth> {
    let default_speedup = free_nutrient_speedup(nutrient_data, "speedup_time");
    let mut plant_growth = HashMap::new();
    for entry in rows(growth_data) {
        let harvest_item = field_u64(entry, "harvest_item");
        if harvest_item == 0 {
            continue;
        }
        let growth_time_sec: i64 = entry
            .get("growth_stages")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_object)
            .map(|stage| field_i64(stage, "duration"))
            .sum();
        let average_yield = parse_average(field_str(entry, "estimate_harvests").unwrap_or("1"), 1.0);
        let farmland_ids = entry
            .get("compatible_farmland")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_u64)
            .collect();
        plant_growth.insert(
            harvest_item,
            PlantGrowth {
                seed_id: field_u64(entry, "seed"),
                harvest_item_id: harvest_item,
                growth_time_sec,
                accelerated_time_sec: (growth_time_sec - default_speedup).max(0),
                average_yield,
                farmland_ids,
            },
        );
    }
    plant_growth
}

fn load_fish_growth(
    growth_data: &Value,
    nutrient_data: &Value,
    localization: &Localization,
    sale_items: &BTreeMap<u64, SaleItem>,
) -> HashMap<u64, FishGrowth> {
    let default_speedup = free_nutrient_speedup(nutrient_data, "accelerate_time");
    let mut by_name: HashMap<String, FishGrowth> = HashMap::new();
    for entry in rows(growth_data) {
        let fish_id = field_u64(entry, "fish_id");
        let name = match localization.get(&format!("FISH_{fish_id}")) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => continue,
        };
        let growth_time_sec = field_i64(entry, "growth_time");
        by_name.insert(
            name.to_lowercase(),
            FishGrowth {
                fry_id: field_u64(entry, "fry_id"),
                fish_id,
                growth_time_sec,
                accelerated_time_sec: (growth_time_sec - default_speedup).max(0),
                name,
                yield_per_cycle: 1.0,
            },
        );
    }
    // The growth table keys fish ids, the sale table keys item ids; the
    // localised name is the only join between them.
    let mut fish_growth = HashMap::new();
    for sale in sale_items.values() {
        if sale.category != "fish" {
            continue;
        }
        if let Some(growth) = by_name.get(&sale.name.to_lowercase()) {
            fish_growth.insert(sale.item_id, growth.clone());
        }
    }
    fish_growth
}

type FurnitureRecipes = (HashMap<u64, Vec<MaterialRequirement>>, HashMap<u64, f64>);

fn load_furniture_recipes(raw: &Value) -> FurnitureRecipes {
    let mut recipes = HashMap::new();
    let mut craft_minutes = HashMap::new();
    for entry in rows(raw) {
        let furniture_id = field_u64(entry, "furniture_id");
        if furniture_id == 0 {
            continue;
        }
        let materials: Vec<MaterialRequirement> = entry
            .get("material_consume")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_object)
            .map(|material| MaterialRequirement {
                item_id: field_u64(material, "item_id"),
                quantity: field_f64(material, "num"),
            })
            .collect();
        recipes.insert(furniture_id, materials);
        craft_minutes.insert(furniture_id, field_f64(entry, "time"));
    }
    (recipes, craft_minutes)
}

fn load_exchange_costs(raw: &Value) -> HashMap<u64, i64> {
    rows(raw)
        .filter_map(|entry| {
            let material_item_id = field_u64(entry, "material_item_id");
            (material_item_id != 0)
                .then(|| (material_item_id, field_i64(entry, "exchange_ratio")))
        })
        .collect()
}

fn parse_numbers(text: &str) -> Vec<f64> {
    static NUMBER_RE: OnceLock<Regex> = OnceLock::new();
    let re = NUMBER_RE.get_or_init(|| {
        Regex::new(r"\d+(?:\.\d+)?").expect("number pattern is valid")
    });
    re.find_iter(text)
        .filter_map(|m| m.as_str().parse().ok())
        .collect()
}

/// Averages the numbers found in a free-form yield string like "2-3".
pub(crate) fn parse_average(text: &str, fallback: f64) -> f64 {
    let numbers = parse_numbers(text);
    if numbers.is_empty() {
        return fallback;
    }
    numbers.iter().sum::<f64>() / numbers.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_average_handles_ranges_and_garbage() {
        assert_eq!(parse_average("2", 1.0), 2.0);
        assert_eq!(parse_average("2-3", 1.0), 2.5);
        assert_eq!(parse_average("1~3", 1.0), 2.0);
        assert_eq!(parse_average("about 1.5 each", 1.0), 1.5);
        assert_eq!(parse_average("", 1.0), 1.0);
        assert_eq!(parse_average("none", 4.0), 4.0);
    }

    #[test]
    fn plant_growth_minutes_per_item() {
        let growth = PlantGrowth {
            seed_id: 1,
            harvest_item_id: 2,
            growth_time_sec: 300,
            accelerated_time_sec: 240,
            average_yield: 2.0,
            farmland_ids: vec![],
        };
        assert_eq!(growth.cycle_minutes(), 4.0);
        assert_eq!(growth.minutes_per_item(), 2.0);

        let barren = PlantGrowth {
            average_yield: 0.0,
            ..growth
        };
        assert!(barren.minutes_per_item().is_infinite());
    }
}
