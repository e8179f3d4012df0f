use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::json;

use crate::catalog::SourceConfig;
use crate::localization::Localization;
use crate::planner::{self, WeeklyPlanner, FARMLAND_ITEMS, FISH_POND_ITEMS};
use crate::production::{facilities, ProductionCalculator, ProductionProfile, WEEK_MINUTES};
use crate::progression::ProgressionRepository;
use crate::solver::{optimise_portfolio, SolveStatus};
use crate::store::{DatasetBundle, DatasetCache, DatasetFetcher};

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

fn temp_db_path(tag: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "astralite-test-{tag}-{}.db",
        time::OffsetDateTime::now_utc().unix_timestamp_nanos()
    ))
}

/// A small but internally consistent slice of the upstream datasets.
///
/// The Cozy Bed recipe pulls in one plant (2 min per unit after yield) and
/// one fish (100 min per unit), so furniture aggregation, recursion, and
/// the facility rows are all exercised.
fn fixture_bundle() -> DatasetBundle {
    let mut bundle = DatasetBundle::default();
    bundle.insert(
        "en",
        json!({
            "items": {
                "ItemName_1170000350": "Cozy Bed",
                "ItemName_1001": "Golden Fragrant Cup",
                "ItemName_1002": "Plain Sprout",
                "ItemName_2001": "Blinko Fish",
                "ItemName_3001": "Meteor Shard",
            },
            "fish": { "FISH_77": "Blinko Fish" }
        }),
    );
    bundle.insert("TbHomeGlobalConfig", json!({ "home_money_max": 100000 }));
    bundle.insert(
        "TbHomeProductsSaleInfo",
        json!({
            "1170000350": {
                "item_id": 1170000350u64, "ability_id": 22, "ability_level": 10,
                "ratio": 1, "rewards": [ { "item_id": 14, "num": 1000 } ]
            },
            "1001": {
                "item_id": 1001, "ability_id": 34, "ability_level": 3,
                "ratio": 1, "rewards": [ { "item_id": 14, "num": 10 } ]
            },
            "1002": {
                "item_id": 1002, "ability_id": 34, "ability_level": 1,
                "ratio": 1, "rewards": []
            },
            "2001": {
                "item_id": 2001, "ability_id": 47, "ability_level": 5,
                "ratio": 1, "rewards": [ { "item_id": 14, "num": 50 }, { "item_id": 99, "num": 3 } ]
            },
            "3001": {
                "item_id": 3001, "ability_id": 45, "ability_level": 1,
                "ratio": 1, "rewards": [ { "item_id": 14, "num": 5 } ]
            }
        }),
    );
    bundle.insert(
        "TbPlantingGrowthProcess",
        json!({
            "501": {
                "seed": 501, "harvest_item": 1001,
                "growth_stages": [ { "duration": 120 }, { "duration": 180 } ],
                "estimate_harvests": "1~3",
                "compatible_farmland": [1170000320u64, 1170000321u64]
            },
            "502": {
                "seed": 502, "harvest_item": 1002,
                "growth_stages": [ { "duration": 660 } ],
                "estimate_harvests": "1",
                "compatible_farmland": []
            }
        }),
    );
    bundle.insert(
        "TbPlantingNutrient",
        json!({
            "1": { "consume_count": 0, "speedup_time": 60 },
            "2": { "consume_count": 5, "speedup_time": 600 }
        }),
    );
    bundle.insert(
        "TbHomeFishGrowthConfig",
        json!({
            "77": { "fish_id": 77, "fry_id": 701, "growth_time": 6300 },
            "78": { "fish_id": 78, "fry_id": 702, "growth_time": 900 }
        }),
    );
    bundle.insert(
        "TbHomeFishNutrientConfig",
        json!({ "1": { "consume_count": 0, "accelerate_time": 300 } }),
    );
    bundle.insert(
        "TbFurnitureTableMakeInfo",
        json!({
            "1170000350": {
                "furniture_id": 1170000350u64, "time": 60,
                "material_consume": [
                    { "item_id": 1001, "num": 50 },
                    { "item_id": 2001, "num": 30 },
                    { "item_id": 9999, "num": 2 }
                ]
            }
        }),
    );
    bundle.insert(
        "TbFurnitureMakeMaterialExchangeInfo",
        json!({ "1": { "material_item_id": 1001, "exchange_ratio": 12 } }),
    );
    bundle.insert(
        "TbHomeAbilityLevelUpRewardShowInfo",
        json!({
            "22001": { "id": 22001, "des_item": [] },
            "22040": { "id": 22040, "des_item": [] },
            "34001": { "id": 34001, "des_item": [ { "item_id": 1170000320u64, "num": 6 } ] },
            "34005": { "id": 34005, "des_item": [ { "item_id": 1170000321u64, "num": 8 } ] },
            "34010": { "id": 34010, "des_item": [ { "item_id": 1170000322u64, "num": 12 } ] },
            "34015": { "id": 34015, "des_item": [ { "item_id": 424242, "num": 3 } ] },
            "34020": { "id": 34020, "des_item": [] },
            "45001": { "id": 45001, "des_item": [] },
            "47003": { "id": 47003, "des_item": [ { "item_id": 1170000419u64, "num": 2 } ] },
            "47012": { "id": 47012, "des_item": [ { "item_id": 1170000419u64, "num": 3 } ] },
            "48001": { "id": 48001, "des_item": [] }
        }),
    );
    bundle.insert(
        "TbHomeAbilityTotalLevelValueInfo",
        json!({
            "1": { "level": 5, "gold_weekmax": 50000 },
            "2": { "level": 10, "gold_weekmax": 120000 }
        }),
    );
    bundle
}

fn fixture_calculator() -> ProductionCalculator {
    let bundle = fixture_bundle();
    let localization = Localization::new(bundle.get("en").unwrap());
    ProductionCalculator::new(&bundle, &localization).unwrap()
}

fn fixture_planner() -> WeeklyPlanner {
    let bundle = fixture_bundle();
    let localization = Localization::new(bundle.get("en").unwrap());
    let calculator = ProductionCalculator::new(&bundle, &localization).unwrap();
    let progression = ProgressionRepository::new(
        bundle.get("TbHomeAbilityLevelUpRewardShowInfo").unwrap(),
        bundle.get("TbHomeAbilityTotalLevelValueInfo").unwrap(),
    );
    let base = planner::base_weekly_limit(&bundle).unwrap();
    WeeklyPlanner::new(&calculator, progression, base)
}

fn levels(entries: &[(u32, u32)]) -> BTreeMap<u32, u32> {
    entries.iter().copied().collect()
}

fn profile(item_id: u64, sale_value: f64, minutes: &[(&str, f64)]) -> Arc<ProductionProfile> {
    Arc::new(ProductionProfile {
        item_id,
        name: format!("Item {item_id}"),
        sale_value,
        ability_id: 22,
        ability_level: 0,
        category: "furniture",
        facility_minutes: minutes.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        components: Vec::new(),
        notes: Vec::new(),
    })
}

fn caps(entries: &[(&str, f64)]) -> BTreeMap<String, f64> {
    entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

// ---- localization ----

#[test]
fn localization_flattens_nested_maps_and_lists() {
    let loc = Localization::new(&json!({
        "ItemName_10": "Stone",
        "a": { "Key": "first", "deep": [ { "Key": "second" } ] },
        "ignored_number": 7
    }));
    assert_eq!(loc.get("ItemName_10"), Some("Stone"));
    // Later occurrences overwrite earlier ones.
    assert_eq!(loc.get("Key"), Some("second"));
    assert_eq!(loc.get("ignored_number"), None);
    assert_eq!(loc.item_name(10), "Stone");
    assert_eq!(loc.item_name(999), "Item 999");
}

// ---- progression ----

#[test]
fn progression_accumulates_rewards_up_to_level() {
    let bundle = fixture_bundle();
    let progression = ProgressionRepository::new(
        bundle.get("TbHomeAbilityLevelUpRewardShowInfo").unwrap(),
        bundle.get("TbHomeAbilityTotalLevelValueInfo").unwrap(),
    );

    assert_eq!(progression.sum_item_counts(34, 20, FARMLAND_ITEMS), 26);
    assert_eq!(progression.sum_item_counts(34, 4, FARMLAND_ITEMS), 6);
    assert_eq!(progression.sum_item_counts(34, 0, FARMLAND_ITEMS), 0);
    assert_eq!(progression.sum_item_counts(47, 12, FISH_POND_ITEMS), 5);
    assert_eq!(progression.sum_item_counts(47, 2, FISH_POND_ITEMS), 0);

    let items = progression.ability_reward_items(34, 15);
    assert_eq!(items.get(&1170000320), Some(&6));
    assert_eq!(items.get(&424242), Some(&3));
    assert_eq!(items.get(&1170000322), Some(&12));

    assert_eq!(progression.max_level(22), 40);
    assert_eq!(progression.max_level(34), 20);
    assert_eq!(progression.max_level(12345), 0);
}

#[test]
fn progression_weekly_bonus_uses_highest_step_reached() {
    let bundle = fixture_bundle();
    let progression = ProgressionRepository::new(
        bundle.get("TbHomeAbilityLevelUpRewardShowInfo").unwrap(),
        bundle.get("TbHomeAbilityTotalLevelValueInfo").unwrap(),
    );
    assert_eq!(progression.weekly_bonus_for_total_level(1), 0);
    assert_eq!(progression.weekly_bonus_for_total_level(5), 50000);
    assert_eq!(progression.weekly_bonus_for_total_level(9), 50000);
    assert_eq!(progression.weekly_bonus_for_total_level(10), 120000);
    assert_eq!(progression.weekly_bonus_for_total_level(500), 120000);
}

// ---- production ----

#[test]
fn plant_profile_uses_accelerated_cycle_and_average_yield() {
    let calculator = fixture_calculator();
    let cup = calculator.profile(1001).unwrap();
    assert_eq!(cup.category, "plant");
    // 300s growth - 60s free nutrient = 240s = 4 min, yield "1~3" averages 2.
    assert!(approx(cup.facility_minutes[facilities::PLANT_PLOT], 2.0));
    assert!(cup.notes.is_empty());

    let growth = calculator.plant_growth(1001).unwrap();
    assert_eq!(growth.seed_id, 501);
    assert_eq!(growth.farmland_ids, vec![1170000320, 1170000321]);
}

#[test]
fn fish_profile_joins_growth_by_localised_name() {
    let calculator = fixture_calculator();
    let fish = calculator.profile(2001).unwrap();
    assert_eq!(fish.category, "fish");
    // Only the Astralite reward (id 14) counts towards sale value.
    assert!(approx(fish.sale_value, 50.0));
    // 6300s - 300s = 6000s = 100 min per unit.
    assert!(approx(fish.facility_minutes[facilities::FISH_POND], 100.0));

    let growth = calculator.fish_growth(2001).unwrap();
    assert_eq!(growth.fry_id, 701);
    // Growth is keyed by sale item; plants never pick up fish timings, and
    // fish 78 (no localisation entry) joins nothing at all.
    assert!(calculator.fish_growth(1001).is_none());
}

#[test]
fn furniture_profile_aggregates_component_minutes() {
    let calculator = fixture_calculator();
    let bed = calculator.profile(1170000350).unwrap();
    assert_eq!(bed.name, "Cozy Bed");
    assert_eq!(bed.category, "furniture");
    assert!(approx(bed.facility_minutes[facilities::CRAFTING], 60.0));
    // 50 cups at 2 min each, 30 fish at 100 min each.
    assert!(approx(bed.facility_minutes[facilities::PLANT_PLOT], 100.0));
    assert!(approx(bed.facility_minutes[facilities::FISH_POND], 3000.0));

    assert_eq!(bed.components.len(), 3);
    let cup = &bed.components[0];
    assert_eq!(cup.name, "Golden Fragrant Cup");
    assert!(approx(cup.quantity, 50.0));
    assert_eq!(cup.exchange_cost, Some(12));
    let cup_profile = cup.profile.as_ref().unwrap();
    assert!(approx(cup_profile.facility_minutes[facilities::PLANT_PLOT], 2.0));

    let unknown = &bed.components[2];
    assert_eq!(unknown.name, "Item 9999");
    assert!(unknown.profile.is_none());
    assert_eq!(unknown.exchange_cost, None);
}

#[test]
fn unmodelled_category_gets_note_instead_of_minutes() {
    let calculator = fixture_calculator();
    let shard = calculator.profile(3001).unwrap();
    assert_eq!(shard.category, "meteor");
    assert!(shard.facility_minutes.is_empty());
    assert_eq!(
        shard.notes,
        vec!["Production data for meteor items is not yet modelled.".to_string()]
    );
}

#[test]
fn cyclic_recipes_terminate_without_component_profiles() {
    let mut bundle = DatasetBundle::default();
    bundle.insert("en", json!({}));
    bundle.insert(
        "TbHomeProductsSaleInfo",
        json!({
            "8001": { "item_id": 8001, "ability_id": 22, "ability_level": 1,
                      "rewards": [ { "item_id": 14, "num": 10 } ] },
            "8002": { "item_id": 8002, "ability_id": 22, "ability_level": 1,
                      "rewards": [ { "item_id": 14, "num": 20 } ] }
        }),
    );
    bundle.insert(
        "TbFurnitureTableMakeInfo",
        json!({
            "8001": { "furniture_id": 8001, "time": 5,
                      "material_consume": [ { "item_id": 8002, "num": 1 } ] },
            "8002": { "furniture_id": 8002, "time": 7,
                      "material_consume": [ { "item_id": 8001, "num": 1 } ] }
        }),
    );
    for name in [
        "TbPlantingGrowthProcess",
        "TbPlantingNutrient",
        "TbHomeFishGrowthConfig",
        "TbHomeFishNutrientConfig",
        "TbFurnitureMakeMaterialExchangeInfo",
    ] {
        bundle.insert(name, json!({}));
    }

    let localization = Localization::new(bundle.get("en").unwrap());
    let calculator = ProductionCalculator::new(&bundle, &localization).unwrap();

    // 8002 is built first (mid-recursion) with the cycle cut, so its view of
    // 8001 has no profile; 8001 then sees the finished 8002.
    let first = calculator.profile(8001).unwrap();
    assert!(approx(first.facility_minutes[facilities::CRAFTING], 5.0 + 7.0));
    assert_eq!(first.components[0].item_id, 8002);
    assert!(first.components[0].profile.is_some());

    let second = calculator.profile(8002).unwrap();
    assert!(approx(second.facility_minutes[facilities::CRAFTING], 7.0));
    assert_eq!(second.components[0].item_id, 8001);
    assert!(second.components[0].profile.is_none());
}

#[test]
fn missing_furniture_recipe_is_noted() {
    let mut bundle = fixture_bundle();
    bundle.insert("TbFurnitureTableMakeInfo", json!({}));
    let localization = Localization::new(bundle.get("en").unwrap());
    let calculator = ProductionCalculator::new(&bundle, &localization).unwrap();
    let bed = calculator.profile(1170000350).unwrap();
    assert!(approx(bed.facility_minutes[facilities::CRAFTING], 0.0));
    assert_eq!(
        bed.notes,
        vec!["Furniture recipe not found in extracted data.".to_string()]
    );
}

// ---- solver ----

#[test]
fn solver_fills_the_weekly_cap() {
    let profiles = vec![profile(1, 10.0, &[(facilities::CRAFTING, 1.0)])];
    let result = optimise_portfolio(
        &profiles,
        100.0,
        &caps(&[(facilities::CRAFTING, WEEK_MINUTES)]),
        &HashSet::new(),
    );
    assert_eq!(result.status, SolveStatus::Optimal);
    assert_eq!(result.items.len(), 1);
    assert!(approx(result.items[0].units, 10.0));
    assert!(approx(result.items[0].astralite, 100.0));
    assert!(approx(result.total_astralite, 100.0));
    assert!(approx(result.facility_usage[facilities::CRAFTING], 10.0));
}

#[test]
fn solver_respects_facility_capacity() {
    let profiles = vec![profile(1, 10.0, &[(facilities::CRAFTING, 10.0)])];
    let result = optimise_portfolio(
        &profiles,
        1_000_000.0,
        &caps(&[(facilities::CRAFTING, 100.0)]),
        &HashSet::new(),
    );
    assert_eq!(result.status, SolveStatus::Optimal);
    assert!(approx(result.items[0].units, 10.0));
    assert!(approx(result.total_astralite, 100.0));
    assert!(approx(result.facility_usage[facilities::CRAFTING], 100.0));
}

#[test]
fn solver_prefers_higher_value_per_minute() {
    let profiles = vec![
        profile(1, 10.0, &[(facilities::CRAFTING, 1.0)]),
        profile(2, 12.0, &[(facilities::CRAFTING, 2.0)]),
    ];
    let result = optimise_portfolio(
        &profiles,
        1_000_000.0,
        &caps(&[(facilities::CRAFTING, 100.0)]),
        &HashSet::new(),
    );
    assert_eq!(result.status, SolveStatus::Optimal);
    assert_eq!(result.items.len(), 1);
    assert_eq!(result.items[0].item_id, 1);
    assert!(approx(result.items[0].units, 100.0));
    assert!(approx(result.total_astralite, 1000.0));
}

#[test]
fn solver_bonus_multiplier_can_flip_the_pick() {
    let profiles = vec![
        profile(1, 10.0, &[(facilities::CRAFTING, 1.0)]),
        profile(2, 9.0, &[(facilities::CRAFTING, 1.0)]),
    ];
    let capacities = caps(&[(facilities::CRAFTING, WEEK_MINUTES)]);

    let plain = optimise_portfolio(&profiles, 108.0, &capacities, &HashSet::new());
    assert_eq!(plain.items[0].item_id, 1);
    assert!(approx(plain.items[0].multiplier, 1.0));

    let bonus: HashSet<u64> = [2].into_iter().collect();
    let boosted = optimise_portfolio(&profiles, 108.0, &capacities, &bonus);
    assert_eq!(boosted.items[0].item_id, 2);
    assert!(approx(boosted.items[0].multiplier, 1.2));
    // The boosted value also counts against the weekly cap.
    assert!(approx(boosted.items[0].units, 10.0));
    assert!(approx(boosted.total_astralite, 108.0));
}

#[test]
fn solver_ignores_rows_with_no_capacity() {
    let profiles = vec![profile(
        1,
        5.0,
        &[(facilities::PLANT_PLOT, 10.0), (facilities::CRAFTING, 1.0)],
    )];
    let result = optimise_portfolio(
        &profiles,
        50.0,
        &caps(&[
            (facilities::PLANT_PLOT, 0.0),
            (facilities::CRAFTING, WEEK_MINUTES),
        ]),
        &HashSet::new(),
    );
    assert_eq!(result.status, SolveStatus::Optimal);
    assert!(approx(result.items[0].units, 10.0));
    // Usage is still reported for the unconstrained facility.
    assert!(approx(result.facility_usage[facilities::PLANT_PLOT], 100.0));
}

#[test]
fn solver_excludes_items_with_infinite_cost_in_active_rows() {
    let profiles = vec![
        profile(1, 10.0, &[(facilities::CRAFTING, f64::INFINITY)]),
        profile(2, 5.0, &[(facilities::CRAFTING, 2.0)]),
    ];
    let result = optimise_portfolio(
        &profiles,
        1_000_000.0,
        &caps(&[(facilities::CRAFTING, 100.0)]),
        &HashSet::new(),
    );
    assert_eq!(result.status, SolveStatus::Optimal);
    assert_eq!(result.items.len(), 1);
    assert_eq!(result.items[0].item_id, 2);
    assert!(approx(result.items[0].units, 50.0));
}

#[test]
fn solver_reports_no_variables_without_saleable_items() {
    let profiles = vec![profile(1, 0.0, &[(facilities::CRAFTING, 1.0)])];
    let result = optimise_portfolio(
        &profiles,
        100.0,
        &caps(&[(facilities::CRAFTING, 100.0)]),
        &HashSet::new(),
    );
    assert_eq!(result.status, SolveStatus::NoVariables);
    assert!(result.items.is_empty());
    assert!(result.facility_usage.is_empty());
}

#[test]
fn solver_reports_no_capacity_for_empty_inputs() {
    let profiles = vec![profile(1, 10.0, &[(facilities::CRAFTING, 1.0)])];
    let zero_cap = optimise_portfolio(
        &profiles,
        0.0,
        &caps(&[(facilities::CRAFTING, 100.0)]),
        &HashSet::new(),
    );
    assert_eq!(zero_cap.status, SolveStatus::NoCapacity);

    let no_profiles = optimise_portfolio(
        &[],
        100.0,
        &caps(&[(facilities::CRAFTING, 100.0)]),
        &HashSet::new(),
    );
    assert_eq!(no_profiles.status, SolveStatus::NoCapacity);
}

// ---- planner ----

#[test]
fn planner_reports_abilities_in_display_order() {
    let planner = fixture_planner();
    let abilities = planner.abilities();
    assert_eq!(abilities.len(), 5);
    assert_eq!(abilities[0].id, 22);
    assert_eq!(abilities[0].label, "Construction");
    assert_eq!(abilities[0].max_level, 40);
    assert_eq!(abilities[1].id, 34);
    assert_eq!(abilities[1].max_level, 20);
}

#[test]
fn planner_excludes_unmodelled_categories() {
    let planner = fixture_planner();
    assert!(planner
        .modelled_profiles()
        .iter()
        .all(|profile| profile.item_id != 3001));
}

#[test]
fn planner_counts_facilities_and_hits_the_weekly_cap() {
    let planner = fixture_planner();
    let plan = planner.plan(&levels(&[(22, 40), (34, 20), (47, 12)]), &[], 2);

    assert_eq!(plan.ability_total, 72);
    assert_eq!(plan.weekly_bonus, 120000);
    assert_eq!(plan.weekly_limit, 220000);
    assert_eq!(plan.plant_plots, 26);
    assert_eq!(plan.fish_ponds, 5);
    assert_eq!(plan.crafting_slots, 2);
    assert!(approx(
        plan.capacities[facilities::PLANT_PLOT],
        26.0 * WEEK_MINUTES
    ));
    assert!(approx(
        plan.capacities[facilities::CRAFTING],
        2.0 * WEEK_MINUTES
    ));

    // Plenty of plant capacity, so the weekly sale cap is the binder.
    assert_eq!(plan.solve.status, SolveStatus::Optimal);
    assert!(approx(plan.solve.total_astralite, 220000.0));
    for (facility, used) in &plan.solve.facility_usage {
        assert!(*used <= plan.capacities[facility] + 1e-6);
    }
}

#[test]
fn planner_clamps_levels_to_known_maxima() {
    let planner = fixture_planner();
    let plan = planner.plan(&levels(&[(22, 999), (34, 999), (47, 999)]), &[], 1);
    assert_eq!(plan.ability_levels[&22], 40);
    assert_eq!(plan.ability_levels[&34], 20);
    assert_eq!(plan.ability_levels[&47], 12);
    assert_eq!(plan.ability_total, 72);
}

#[test]
fn planner_zero_levels_unlock_nothing() {
    let planner = fixture_planner();
    let plan = planner.plan(&BTreeMap::new(), &[], 0);
    assert!(plan.unlocked_item_ids.is_empty());
    assert_eq!(plan.solve.status, SolveStatus::NoCapacity);
    assert!(plan.solve.items.is_empty());
    assert_eq!(plan.plant_plots, 0);
    assert_eq!(plan.fish_ponds, 0);
    // Zero requested slots still leaves one crafting queue.
    assert_eq!(plan.crafting_slots, 1);
}

#[test]
fn planner_unlocked_items_without_value_yield_no_variables() {
    let planner = fixture_planner();
    // Level 2 Planting unlocks only the valueless Plain Sprout.
    let plan = planner.plan(&levels(&[(34, 2)]), &[], 1);
    assert_eq!(plan.unlocked_item_ids, vec![1002]);
    assert_eq!(plan.solve.status, SolveStatus::NoVariables);
    assert!(plan.solve.items.is_empty());
}

#[test]
fn planner_applies_bonus_to_first_four_picks_only() {
    let planner = fixture_planner();
    // Construction alone unlocks just the Cozy Bed; with no plots or ponds
    // those rows drop out and the weekly cap decides the unit count.
    let construction = levels(&[(22, 40)]);

    let boosted = planner.plan(&construction, &[1170000350], 2);
    assert_eq!(boosted.solve.items.len(), 1);
    let bed = &boosted.solve.items[0];
    assert!(approx(bed.multiplier, 1.2));
    assert!(approx(bed.units, 220000.0 / 1200.0));
    assert!(approx(boosted.solve.total_astralite, 220000.0));

    let truncated = planner.plan(&construction, &[1, 2, 3, 4, 1170000350], 2);
    for item in &truncated.solve.items {
        assert!(approx(item.multiplier, 1.0));
    }
}

// ---- datasets ----

#[test]
fn bundle_get_names_the_missing_dataset() {
    let bundle = DatasetBundle::default();
    let err = bundle.get("en").unwrap_err();
    assert!(err.to_string().contains("en"));
}

#[test]
fn cache_roundtrips_and_rehashes_on_update() {
    let cache = DatasetCache::new(temp_db_path("cache"));
    assert!(cache.get("en").unwrap().is_none());

    let first = cache.put("en", "https://example.com/en.json", r#"{"a":"b"}"#).unwrap();
    let row = cache.get("en").unwrap().unwrap();
    assert_eq!(row.body, r#"{"a":"b"}"#);
    assert_eq!(row.content_hash, first);
    assert_eq!(first.len(), 64);
    assert!(row.fetched_at.contains('T'));

    let second = cache.put("en", "https://example.com/en.json", r#"{"a":"c"}"#).unwrap();
    assert_ne!(first, second);
    assert_eq!(cache.get("en").unwrap().unwrap().body, r#"{"a":"c"}"#);
}

#[tokio::test]
async fn fetcher_caches_and_serves_offline() {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/TbHomeGlobalConfig.json"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(r#"{"home_money_max": 123}"#),
        )
        .expect(1)
        .mount(&server)
        .await;

    let db = temp_db_path("fetch");
    let source = SourceConfig::with_base_url(server.uri());
    let online = DatasetFetcher::new(source.clone(), Some(DatasetCache::new(db.clone())), false);
    let value = online.fetch("TbHomeGlobalConfig").await.unwrap();
    assert_eq!(value["home_money_max"], 123);

    // The offline fetcher must answer from the cache without a request.
    let offline = DatasetFetcher::new(source, Some(DatasetCache::new(db)), true);
    let cached = offline.fetch("TbHomeGlobalConfig").await.unwrap();
    assert_eq!(cached["home_money_max"], 123);
}

#[tokio::test]
async fn fetcher_falls_back_to_cache_on_http_error() {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/en.json"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let db = temp_db_path("fallback");
    let cache = DatasetCache::new(db.clone());
    cache
        .put("en", "https://example.com/en.json", r#"{"Greeting":"hi"}"#)
        .unwrap();

    let fetcher =
        DatasetFetcher::new(SourceConfig::with_base_url(server.uri()), Some(cache), false);
    let value = fetcher.fetch("en").await.unwrap();
    assert_eq!(value["Greeting"], "hi");
}

#[tokio::test]
async fn fetcher_rejects_unknown_and_malformed_datasets() {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/en.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("[1, 2, 3]"))
        .mount(&server)
        .await;

    let fetcher = DatasetFetcher::new(SourceConfig::with_base_url(server.uri()), None, false);

    let err = fetcher.fetch("NotARealTable").await.unwrap_err();
    assert!(err.to_string().contains("unknown dataset"));

    let err = fetcher.fetch("en").await.unwrap_err();
    assert!(err.to_string().contains("not a JSON object"));
}
