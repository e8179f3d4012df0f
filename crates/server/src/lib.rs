use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use axum::{
    response::Html,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::info;

use astralite_engine::catalog::SourceConfig;
use astralite_engine::localization::Localization;
use astralite_engine::planner::{self, WeeklyPlan, WeeklyPlanner};
use astralite_engine::production::{facilities, ProductionCalculator, ProductionProfile};
use astralite_engine::progression::ProgressionRepository;
use astralite_engine::store::DatasetBundle;
use astralite_protocol::{
    Ability, Component, FacilityLoad, InitResponse, ItemProfile, OptimiseRequest,
    OptimiseResponse, PlanItem, ProfileDetail,
};

#[derive(Clone)]
pub struct AppState {
    pub planner: Arc<WeeklyPlanner>,
    pub init: Arc<InitResponse>,
}

/// Optional YAML config; command-line flags win over it field by field.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: Option<SocketAddr>,
    pub cache_db: Option<PathBuf>,
    pub offline: Option<bool>,
    pub static_dir: Option<PathBuf>,
    pub source: SourceConfig,
}

impl ServerConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config: {}", path.display()))?;
        serde_yaml::from_str(&text).with_context(|| format!("parse config: {}", path.display()))
    }
}

/// Builds the planner and the static `/api/init` payload from the loaded
/// datasets. Everything the handlers serve afterwards is read-only.
pub fn build_state(bundle: &DatasetBundle) -> anyhow::Result<AppState> {
    let localization = Localization::new(bundle.get("en")?);
    let calculator = ProductionCalculator::new(bundle, &localization)?;
    let progression = ProgressionRepository::new(
        bundle.get("TbHomeAbilityLevelUpRewardShowInfo")?,
        bundle.get("TbHomeAbilityTotalLevelValueInfo")?,
    );
    let base_weekly_limit = planner::base_weekly_limit(bundle)?;
    let planner = WeeklyPlanner::new(&calculator, progression, base_weekly_limit);
    let init = build_init_response(&planner, &calculator);
    info!(
        items = init.items.len(),
        base_weekly_limit, "planner state built"
    );
    Ok(AppState {
        planner: Arc::new(planner),
        init: Arc::new(init),
    })
}

pub fn build_router(state: AppState, static_dir: Option<PathBuf>) -> Router {
    let api = Router::new()
        .route("/init", get(api_init))
        .route("/optimise", post(api_optimise))
        // Plans depend only on the current inputs; never let a proxy pin one.
        .layer(SetResponseHeaderLayer::if_not_present(
            axum::http::header::CACHE_CONTROL,
            axum::http::HeaderValue::from_static("no-store"),
        ));

    let mut router = Router::new()
        .route("/", get(dashboard))
        .route("/health", get(health))
        .nest("/api", api);
    if let Some(dir) = static_dir {
        router = router.nest_service("/static", ServeDir::new(dir));
    }

    router
        .with_state(Arc::new(state))
        // Local-only tool: a wildcard origin here would let any open web
        // page probe ability levels and plans from the browser.
        .layer(ServiceBuilder::new().layer(local_only_cors()))
}

async fn health() -> &'static str {
    "ok"
}

async fn dashboard() -> Html<&'static str> {
    Html(DASHBOARD_HTML)
}

async fn api_init(
    axum::extract::State(state): axum::extract::State<Arc<AppState>>,
) -> Json<InitResponse> {
    Json((*state.init).clone())
}

async fn api_optimise(
    axum::extract::State(state): axum::extract::State<Arc<AppState>>,
    Json(input): Json<OptimiseRequest>,
) -> Json<OptimiseResponse> {
    let plan = state
        .planner
        .plan(&input.ability_levels, &input.bonus_item_ids, input.crafting_slots);
    Json(plan_response(&plan))
}

fn build_init_response(planner: &WeeklyPlanner, calculator: &ProductionCalculator) -> InitResponse {
    let abilities = planner
        .abilities()
        .into_iter()
        .map(|ability| Ability {
            id: ability.id,
            label: ability.label.to_string(),
            max_level: ability.max_level,
        })
        .collect();

    let mut profiles: Vec<&Arc<ProductionProfile>> = planner.modelled_profiles().iter().collect();
    profiles.sort_by(|a, b| a.name.cmp(&b.name));
    let items = profiles
        .into_iter()
        .map(|profile| profile_view(profile, calculator))
        .collect();

    InitResponse {
        abilities,
        base_weekly_limit: planner.base_weekly_limit(),
        facility_names: planner::facility_names(),
        items,
        modelled_categories: planner::MODELLED_CATEGORIES
            .iter()
            .map(|category| category.to_string())
            .collect(),
    }
}

fn plan_response(plan: &WeeklyPlan) -> OptimiseResponse {
    let items: Vec<PlanItem> = plan
        .solve
        .items
        .iter()
        .map(|item| PlanItem {
            item_id: item.item_id,
            name: item.name.clone(),
            category: item.profile.category.to_string(),
            units: round4(item.units),
            astralite: round4(item.astralite),
            multiplier: item.multiplier,
            per_unit_value: round4(item.profile.sale_value * item.multiplier),
            facility_minutes: minutes_map(&item.facility_minutes),
            per_unit_facility_minutes: minutes_map(&item.profile.facility_minutes),
        })
        .collect();

    let message = if items.is_empty() {
        Some(
            if plan.unlocked_item_ids.is_empty() {
                "Increase ability levels to unlock saleable items."
            } else {
                "No feasible plan within the current facility limits."
            }
            .to_string(),
        )
    } else {
        None
    };

    OptimiseResponse {
        status: plan.solve.status.as_str().to_string(),
        weekly_limit: plan.weekly_limit as f64,
        weekly_bonus: plan.weekly_bonus as f64,
        ability_total: plan.ability_total,
        plant_plots: plan.plant_plots,
        fish_ponds: plan.fish_ponds,
        crafting_slots: plan.crafting_slots,
        items,
        facility_usage: facility_payload(&plan.solve.facility_usage),
        capacities: facility_payload(&plan.capacities),
        unlocked_item_ids: plan.unlocked_item_ids.clone(),
        message,
    }
}

fn profile_view(profile: &ProductionProfile, calculator: &ProductionCalculator) -> ItemProfile {
    ItemProfile {
        item_id: profile.item_id,
        name: profile.name.clone(),
        sale_value: profile.sale_value,
        ability_id: profile.ability_id,
        ability_level: profile.ability_level,
        category: profile.category.to_string(),
        facility_minutes: minutes_map(&profile.facility_minutes),
        notes: profile.notes.clone(),
        components: profile.components.iter().map(component_view).collect(),
        detail: profile_detail(profile, calculator),
    }
}

fn profile_detail(profile: &ProductionProfile, calculator: &ProductionCalculator) -> ProfileDetail {
    let mut detail = ProfileDetail {
        category: profile.category.to_string(),
        ..ProfileDetail::default()
    };
    match profile.category {
        "plant" => {
            if let Some(growth) = calculator.plant_growth(profile.item_id) {
                detail.growth_minutes = Some(round4(growth.cycle_minutes()));
                detail.average_yield = Some(round4(growth.average_yield));
                detail.seed_id = Some(growth.seed_id);
                if !growth.farmland_ids.is_empty() {
                    detail.farmland_ids = Some(growth.farmland_ids.clone());
                }
            }
        }
        "fish" => {
            if let Some(growth) = calculator.fish_growth(profile.item_id) {
                detail.growth_minutes = Some(round4(growth.cycle_minutes()));
                detail.fry_id = Some(growth.fry_id);
            }
        }
        "furniture" => {
            let craft_minutes = profile
                .facility_minutes
                .get(facilities::CRAFTING)
                .copied()
                .unwrap_or(0.0);
            if craft_minutes != 0.0 && craft_minutes.is_finite() {
                detail.craft_minutes = Some(round4(craft_minutes));
            }
        }
        _ => {}
    }
    detail
}

fn component_view(component: &astralite_engine::production::ComponentRequirement) -> Component {
    let mut per_unit = BTreeMap::new();
    let mut total = BTreeMap::new();
    let mut notes = Vec::new();
    let mut category = None;
    let mut profile_item_id = None;
    if let Some(profile) = &component.profile {
        profile_item_id = Some(profile.item_id);
        category = Some(profile.category.to_string());
        for (facility, minutes) in &profile.facility_minutes {
            if !minutes.is_finite() || *minutes <= 0.0 {
                continue;
            }
            per_unit.insert(facility.clone(), round4(*minutes));
            total.insert(facility.clone(), round4(minutes * component.quantity));
        }
        notes = profile.notes.clone();
    }
    Component {
        item_id: component.item_id,
        name: component.name.clone(),
        quantity: component.quantity,
        exchange_cost: component.exchange_cost,
        category,
        profile_item_id,
        facility_minutes: per_unit,
        total_facility_minutes: total,
        notes,
    }
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

fn safe_minutes(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Facility minutes fit for the wire: finite, positive, rounded.
fn minutes_map(source: &BTreeMap<String, f64>) -> BTreeMap<String, f64> {
    source
        .iter()
        .filter(|(_, minutes)| minutes.is_finite() && **minutes > 0.0)
        .map(|(facility, minutes)| (facility.clone(), round4(*minutes)))
        .collect()
}

/// Minutes and hours per facility, zero entries included so the dashboard
/// always has a row to render.
fn facility_payload(data: &BTreeMap<String, f64>) -> BTreeMap<String, FacilityLoad> {
    data.iter()
        .map(|(facility, minutes)| {
            let minutes = safe_minutes(*minutes);
            (
                facility.clone(),
                FacilityLoad {
                    minutes: round4(minutes),
                    hours: round4(minutes / 60.0),
                },
            )
        })
        .collect()
}

pub async fn serve(
    addr: SocketAddr,
    state: AppState,
    static_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    serve_listener(listener, state, static_dir, shutdown_signal()).await?;
    Ok(())
}

pub async fn serve_listener(
    listener: tokio::net::TcpListener,
    state: AppState,
    static_dir: Option<PathBuf>,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<SocketAddr> {
    let app = build_router(state, static_dir);
    let addr = listener.local_addr()?;
    info!("server listening on http://{addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(addr)
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn local_only_cors() -> CorsLayer {
    use axum::http::header;
    use axum::http::HeaderValue;
    use axum::http::Method;

    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .allow_origin(AllowOrigin::predicate(|origin: &HeaderValue, _req| {
            is_allowed_local_origin(origin)
        }))
}

fn is_allowed_local_origin(origin: &axum::http::HeaderValue) -> bool {
    let Ok(s) = origin.to_str() else {
        return false;
    };
    is_http_origin_for_host(s, "localhost") || is_http_origin_for_host(s, "127.0.0.1")
}

fn is_http_origin_for_host(origin: &str, host: &str) -> bool {
    for scheme in ["http://", "https://"] {
        if let Some(rest) = origin.strip_prefix(scheme) {
            if let Some(after) = rest.strip_prefix(host) {
                // Origin is just scheme://host[:port]
                return after.is_empty() || after.starts_with(':');
            }
        }
    }
    false
}


const DASHBOARD_HTML: &str = r###"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1" />
  <meta name="theme-color" content="#14241c" />
  <title>Astralite Weekly Planner</title>
  <style>
    :root{
      --bg-a:#101c15;
      --bg-b:#16281e;
      --bg-c:#1b3224;
      --cream:#f4f0e2;
      --leaf:#8fd98a;
      --gold:#f2c96b;
      --line:#8fd98a3d;
      --panel:#1a2c21d9;
      --panel-edge:#8fd98a44;
      --muted:#9eb3a3;
      --ok:#8fd98a;
      --warn:#f2c96b;
      --bad:#f08a8a;
      --side-w:min(340px, 30vw);
      --pad:12px;
    }
    *{box-sizing:border-box;margin:0;padding:0}
    html,body{width:100%;min-height:100%}
    body{
      font-family:Inter,system-ui,sans-serif;
      color:var(--cream);
      background:
        radial-gradient(circle at 15% 10%, #27503a 0%, #16281e 30%, transparent 60%),
        radial-gradient(circle at 85% 20%, #224234 0%, #15251c 28%, transparent 58%),
        linear-gradient(165deg,var(--bg-c) 0%,var(--bg-b) 45%,var(--bg-a) 100%);
      background-attachment:fixed;
      padding:var(--pad);
    }
    .topbar{
      display:flex;gap:12px;align-items:center;justify-content:space-between;
      padding:12px 14px;border:1px solid var(--panel-edge);border-radius:14px;
      background:linear-gradient(160deg,#1c332614 0%, #12201913 100%), var(--panel);
      margin-bottom:12px;
    }
    .brand{display:flex;align-items:center;gap:10px}
    .sig{
      width:11px;height:11px;border-radius:4px;
      background:linear-gradient(160deg,var(--leaf),var(--gold));
      box-shadow:0 0 0 3px #8fd98a22;
    }
    .brand h1{font-size:15px;letter-spacing:.6px}
    .brand .sub{font-size:11px;color:var(--muted)}
    .pill{display:flex;align-items:center;gap:8px;font-size:12px;color:var(--muted)}
    .dot{width:8px;height:8px;border-radius:99px;background:var(--warn);box-shadow:0 0 0 3px #f2c96b22}
    .dot.ok{background:var(--ok);box-shadow:0 0 0 3px #8fd98a22}

    .layout{display:grid;grid-template-columns:var(--side-w) 1fr;gap:12px;align-items:start}
    .panel{
      border:1px solid var(--panel-edge);border-radius:16px;
      background:var(--panel);padding:12px;
    }
    .panel h2{font-size:13px;letter-spacing:.5px;margin-bottom:10px;color:var(--leaf)}
    .field{display:flex;align-items:center;justify-content:space-between;gap:10px;margin-bottom:8px}
    .field label{font-size:12px}
    .field .max{font-size:10px;color:var(--muted);margin-left:6px}
    .field input{
      width:72px;padding:6px 8px;border-radius:8px;border:1px solid #49705a;
      background:#11201877;color:var(--cream);font-size:13px;text-align:right;
    }
    .field input:focus{outline:none;border-color:var(--leaf)}
    .btn{
      width:100%;margin-top:10px;
      border:1px solid #5d8a6e;background:#1d3a2b;color:var(--cream);
      border-radius:10px;padding:10px;font-weight:600;cursor:pointer;font-size:13px;
    }
    .btn:hover{border-color:var(--leaf);box-shadow:0 0 0 1px #8fd98a44 inset}
    .search{
      width:100%;padding:8px;border-radius:10px;border:1px solid #49705a;
      background:#11201877;color:var(--cream);font-size:13px;margin-bottom:8px;
    }
    .chips{display:flex;flex-wrap:wrap;gap:6px;margin-bottom:8px;min-height:24px}
    .chip{
      display:inline-flex;align-items:center;gap:6px;padding:4px 8px;border-radius:99px;
      border:1px solid var(--gold);background:#f2c96b1a;font-size:11px;cursor:pointer;
    }
    .chip:hover{background:#f2c96b33}
    .matches{max-height:220px;overflow:auto;display:flex;flex-direction:column;gap:6px}
    .match{
      display:flex;align-items:center;justify-content:space-between;gap:8px;
      padding:7px 9px;border-radius:10px;border:1px solid #49705a55;background:#11201866;
      cursor:pointer;font-size:12px;
    }
    .match:hover{border-color:var(--leaf)}
    .match span{font-size:10px;color:var(--muted)}
    .note{font-size:11px;color:var(--muted);margin-top:6px}

    .cards{display:grid;grid-template-columns:repeat(auto-fit,minmax(150px,1fr));gap:10px;margin-bottom:12px}
    .card{
      border:1px solid #49705a55;border-radius:12px;background:#11201888;padding:10px;
    }
    .card .k{font-size:10px;color:var(--muted);text-transform:uppercase;letter-spacing:.6px}
    .card .v{font-size:18px;margin-top:4px;font-variant-numeric:tabular-nums}
    .card .v.gold{color:var(--gold)}
    .message{
      border:1px solid var(--warn);border-radius:10px;background:#f2c96b14;
      color:var(--warn);padding:9px 11px;font-size:12px;margin-bottom:12px;display:none;
    }
    table{width:100%;border-collapse:collapse;font-size:12px}
    th{
      text-align:left;color:var(--muted);font-weight:500;font-size:10px;
      text-transform:uppercase;letter-spacing:.6px;padding:6px 8px;border-bottom:1px solid var(--line);
    }
    td{padding:7px 8px;border-bottom:1px solid #8fd98a14;font-variant-numeric:tabular-nums}
    td.num,th.num{text-align:right}
    .cat{font-size:10px;color:var(--muted)}
    .mult{color:var(--gold)}
    .bar{
      position:relative;height:6px;border-radius:99px;background:#11201877;
      border:1px solid #49705a55;overflow:hidden;min-width:90px;
    }
    .bar i{position:absolute;inset:0;width:0;background:linear-gradient(90deg,var(--leaf),var(--gold))}
    .bar.full i{background:var(--bad)}
    .empty{color:var(--muted);font-size:12px;padding:10px 8px}

    @media (max-width: 900px){
      .layout{grid-template-columns:1fr}
    }
  </style>
</head>
<body>
  <header class="topbar">
    <div class="brand">
      <div class="sig"></div>
      <div>
        <h1>ASTRALITE WEEKLY PLANNER</h1>
        <div class="sub">home production optimiser (local)</div>
      </div>
    </div>
    <div class="pill"><span id="connDot" class="dot"></span><span id="connText">connecting</span></div>
  </header>

  <div class="layout">
    <aside>
      <section class="panel" style="margin-bottom:12px">
        <h2>Abilities</h2>
        <div id="abilityFields"></div>
        <div class="field">
          <label for="slotsInput">Crafting slots</label>
          <input id="slotsInput" type="number" min="1" value="1" />
        </div>
        <button id="planBtn" class="btn" type="button">Optimise week</button>
      </section>

      <section class="panel">
        <h2>Bonus items</h2>
        <div id="bonusChips" class="chips"></div>
        <input id="bonusSearch" class="search" type="search" placeholder="Search saleable items" />
        <div id="bonusMatches" class="matches"></div>
        <div class="note">Up to four picks sell for 1.2x this week.</div>
      </section>
    </aside>

    <main>
      <div class="cards">
        <div class="card"><div class="k">Weekly limit</div><div id="limitVal" class="v">-</div></div>
        <div class="card"><div class="k">Level bonus</div><div id="bonusVal" class="v">-</div></div>
        <div class="card"><div class="k">Planned astralite</div><div id="totalVal" class="v gold">-</div></div>
        <div class="card"><div class="k">Status</div><div id="statusVal" class="v">-</div></div>
      </div>
      <div id="planMessage" class="message"></div>

      <section class="panel" style="margin-bottom:12px">
        <h2>Production plan</h2>
        <table>
          <thead>
            <tr>
              <th>Item</th><th class="num">Units</th><th class="num">Astralite</th>
              <th class="num">Value/unit</th><th class="num">Mult</th>
            </tr>
          </thead>
          <tbody id="planRows"><tr><td colspan="5" class="empty">Set ability levels and optimise.</td></tr></tbody>
        </table>
      </section>

      <section class="panel">
        <h2>Facility load</h2>
        <table>
          <thead>
            <tr>
              <th>Facility</th><th class="num">Used (h)</th><th class="num">Capacity (h)</th><th>Load</th>
            </tr>
          </thead>
          <tbody id="usageRows"><tr><td colspan="4" class="empty">No plan yet.</td></tr></tbody>
        </table>
      </section>
    </main>
  </div>

  <script>
  (function(){
    const $ = (id) => document.getElementById(id);

    const connDot = $("connDot");
    const connText = $("connText");
    const abilityFields = $("abilityFields");
    const bonusChips = $("bonusChips");
    const bonusSearch = $("bonusSearch");
    const bonusMatches = $("bonusMatches");

    const MAX_BONUS = 4;
    let init = null;
    const bonusPicks = new Map(); // item_id -> name

    function esc(s){
      return String(s).replace(/[&<>"]/g, (c) => ({ "&":"&amp;", "<":"&lt;", ">":"&gt;", "\"":"&quot;" }[c]));
    }

    function fmt(n, digits){
      if (n === null || n === undefined || !isFinite(n)) return "-";
      return Number(n).toLocaleString("en-US", { maximumFractionDigits: digits === undefined ? 1 : digits });
    }

    function renderAbilityFields(){
      abilityFields.innerHTML = "";
      for (const ability of init.abilities){
        const row = document.createElement("div");
        row.className = "field";
        const cap = ability.max_level > 0 ? String(ability.max_level) : "?";
        row.innerHTML =
          `<label>${esc(ability.label)}<span class="max">max ${esc(cap)}</span></label>` +
          `<input type="number" min="0" value="0" data-ability="${ability.id}" />`;
        abilityFields.appendChild(row);
      }
    }

    function renderChips(){
      bonusChips.innerHTML = "";
      for (const [id, name] of bonusPicks){
        const chip = document.createElement("span");
        chip.className = "chip";
        chip.title = "Remove";
        chip.innerHTML = `${esc(name)} &times;`;
        chip.addEventListener("click", () => {
          bonusPicks.delete(id);
          renderChips();
          renderMatches();
        });
        bonusChips.appendChild(chip);
      }
    }

    function renderMatches(){
      bonusMatches.innerHTML = "";
      if (!init) return;
      const query = bonusSearch.value.trim().toLowerCase();
      const matches = init.items.filter((item) =>
        item.sale_value > 0 &&
        !bonusPicks.has(item.item_id) &&
        (!query || item.name.toLowerCase().includes(query))
      ).slice(0, 30);
      for (const item of matches){
        const el = document.createElement("div");
        el.className = "match";
        el.innerHTML = `<div>${esc(item.name)}</div><span>${esc(item.category)} &middot; ${fmt(item.sale_value, 0)}</span>`;
        el.addEventListener("click", () => {
          if (bonusPicks.size >= MAX_BONUS) return;
          bonusPicks.set(item.item_id, item.name);
          renderChips();
          renderMatches();
        });
        bonusMatches.appendChild(el);
      }
    }

    function collectLevels(){
      const levels = {};
      for (const input of abilityFields.querySelectorAll("input[data-ability]")){
        const value = parseInt(input.value, 10);
        levels[input.dataset.ability] = isFinite(value) && value > 0 ? value : 0;
      }
      return levels;
    }

    function facilityLabel(key){
      return (init && init.facility_names[key]) || key;
    }

    function renderPlan(resp){
      $("limitVal").textContent = fmt(resp.weekly_limit, 0);
      $("bonusVal").textContent = "+" + fmt(resp.weekly_bonus, 0);
      const total = resp.items.reduce((sum, item) => sum + item.astralite, 0);
      $("totalVal").textContent = fmt(total, 0);
      $("statusVal").textContent = resp.status;

      const messageEl = $("planMessage");
      if (resp.message){
        messageEl.textContent = resp.message;
        messageEl.style.display = "block";
      } else {
        messageEl.style.display = "none";
      }

      const planRows = $("planRows");
      planRows.innerHTML = "";
      if (!resp.items.length){
        planRows.innerHTML = `<tr><td colspan="5" class="empty">Nothing to produce.</td></tr>`;
      }
      for (const item of resp.items){
        const row = document.createElement("tr");
        const mult = item.multiplier > 1
          ? `<span class="mult">${fmt(item.multiplier, 2)}x</span>`
          : `${fmt(item.multiplier, 2)}x`;
        row.innerHTML =
          `<td>${esc(item.name)} <span class="cat">${esc(item.category)}</span></td>` +
          `<td class="num">${fmt(item.units, 1)}</td>` +
          `<td class="num">${fmt(item.astralite, 0)}</td>` +
          `<td class="num">${fmt(item.per_unit_value, 0)}</td>` +
          `<td class="num">${mult}</td>`;
        planRows.appendChild(row);
      }

      const usageRows = $("usageRows");
      usageRows.innerHTML = "";
      for (const key of Object.keys(resp.capacities)){
        const cap = resp.capacities[key];
        const used = resp.facility_usage[key] || { minutes: 0, hours: 0 };
        const ratio = cap.minutes > 0 ? Math.min(1, used.minutes / cap.minutes) : 0;
        const row = document.createElement("tr");
        row.innerHTML =
          `<td>${esc(facilityLabel(key))}</td>` +
          `<td class="num">${fmt(used.hours, 1)}</td>` +
          `<td class="num">${fmt(cap.hours, 1)}</td>` +
          `<td><div class="bar${ratio > 0.999 ? " full" : ""}"><i style="width:${(ratio * 100).toFixed(1)}%"></i></div></td>`;
        usageRows.appendChild(row);
      }
    }

    async function optimise(){
      const body = {
        ability_levels: collectLevels(),
        bonus_item_ids: Array.from(bonusPicks.keys()),
        crafting_slots: Math.max(1, parseInt($("slotsInput").value, 10) || 1),
      };
      try{
        const r = await fetch("/api/optimise", {
          method: "POST",
          headers: { "content-type": "application/json" },
          body: JSON.stringify(body),
        });
        if (!r.ok) throw new Error("optimise failed");
        renderPlan(await r.json());
      }catch(_e){
        $("statusVal").textContent = "error";
      }
    }

    async function loadInit(){
      const r = await fetch("/api/init", { cache: "no-store" });
      init = await r.json();
      renderAbilityFields();
      renderMatches();
      $("limitVal").textContent = fmt(init.base_weekly_limit, 0);
    }

    async function healthLoop(){
      for(;;){
        try{
          const r = await fetch("/health", { cache: "no-store" });
          if (!r.ok) throw new Error("bad");
          connDot.classList.add("ok");
          connText.textContent = "online";
        }catch(_e){
          connDot.classList.remove("ok");
          connText.textContent = "offline";
        }
        await new Promise(res => setTimeout(res, 1500));
      }
    }

    $("planBtn").addEventListener("click", optimise);
    bonusSearch.addEventListener("input", renderMatches);

    loadInit().catch(() => { connText.textContent = "init failed"; });
    healthLoop();
  })();
  </script>
</body>
</html>
"###;
