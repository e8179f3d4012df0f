use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ability {
    pub id: u32,
    pub label: String,
    pub max_level: u32,
}

/// Category-specific production facts; absent fields are omitted from JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileDetail {
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub growth_minutes: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_yield: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub farmland_ids: Option<Vec<u64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fry_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub craft_minutes: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Component {
    pub item_id: u64,
    pub name: String,
    pub quantity: f64,
    pub exchange_cost: Option<i64>,
    pub category: Option<String>,
    pub profile_item_id: Option<u64>,
    pub facility_minutes: BTreeMap<String, f64>,
    pub total_facility_minutes: BTreeMap<String, f64>,
    #[serde(default)]
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemProfile {
    pub item_id: u64,
    pub name: String,
    pub sale_value: f64,
    pub ability_id: u32,
    pub ability_level: u32,
    pub category: String,
    pub facility_minutes: BTreeMap<String, f64>,
    #[serde(default)]
    pub notes: Vec<String>,
    #[serde(default)]
    pub components: Vec<Component>,
    pub detail: ProfileDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitResponse {
    pub abilities: Vec<Ability>,
    pub base_weekly_limit: i64,
    pub facility_names: BTreeMap<String, String>,
    pub items: Vec<ItemProfile>,
    pub modelled_categories: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimiseRequest {
    /// Keyed by ability id; JSON object keys arrive as strings.
    #[serde(default)]
    pub ability_levels: BTreeMap<u32, u32>,
    #[serde(default)]
    pub bonus_item_ids: Vec<u64>,
    #[serde(default = "default_crafting_slots")]
    pub crafting_slots: u32,
}

fn default_crafting_slots() -> u32 {
    1
}

impl Default for OptimiseRequest {
    fn default() -> Self {
        Self {
            ability_levels: BTreeMap::new(),
            bonus_item_ids: Vec::new(),
            crafting_slots: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanItem {
    pub item_id: u64,
    pub name: String,
    pub category: String,
    pub units: f64,
    pub astralite: f64,
    pub multiplier: f64,
    pub per_unit_value: f64,
    pub facility_minutes: BTreeMap<String, f64>,
    pub per_unit_facility_minutes: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FacilityLoad {
    pub minutes: f64,
    pub hours: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimiseResponse {
    pub status: String,
    pub weekly_limit: f64,
    pub weekly_bonus: f64,
    pub ability_total: u32,
    pub plant_plots: i64,
    pub fish_ponds: i64,
    pub crafting_slots: u32,
    pub items: Vec<PlanItem>,
    pub facility_usage: BTreeMap<String, FacilityLoad>,
    pub capacities: BTreeMap<String, FacilityLoad>,
    pub unlocked_item_ids: Vec<u64>,
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optimise_request_accepts_string_keys_and_defaults() {
        let req: OptimiseRequest =
            serde_json::from_str(r#"{"ability_levels":{"22":40,"34":12}}"#).unwrap();
        assert_eq!(req.ability_levels.get(&22), Some(&40));
        assert_eq!(req.ability_levels.get(&34), Some(&12));
        assert!(req.bonus_item_ids.is_empty());
        assert_eq!(req.crafting_slots, 1);
    }

    #[test]
    fn empty_request_body_is_valid() {
        let req: OptimiseRequest = serde_json::from_str("{}").unwrap();
        assert!(req.ability_levels.is_empty());
        assert_eq!(req.crafting_slots, 1);
    }

    #[test]
    fn profile_detail_omits_absent_fields() {
        let detail = ProfileDetail {
            category: "plant".to_string(),
            growth_minutes: Some(120.0),
            average_yield: Some(2.5),
            seed_id: Some(42),
            ..Default::default()
        };
        let json = serde_json::to_value(&detail).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), 4);
        assert!(!obj.contains_key("fry_id"));
        assert!(!obj.contains_key("craft_minutes"));
    }

    #[test]
    fn optimise_response_keeps_null_message() {
        let resp = OptimiseResponse {
            status: "Optimal".to_string(),
            weekly_limit: 100000.0,
            weekly_bonus: 0.0,
            ability_total: 0,
            plant_plots: 0,
            fish_ponds: 0,
            crafting_slots: 1,
            items: Vec::new(),
            facility_usage: BTreeMap::new(),
            capacities: BTreeMap::new(),
            unlocked_item_ids: Vec::new(),
            message: None,
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert!(json.get("message").unwrap().is_null());
    }
}
