//! Data models for the catalog, run parameters and demand trees

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::CalcError;
use crate::ledger::RecycleRegistry;
use crate::rates;

/// Category name marking items grown on farming plots
pub const HERB_CATEGORY: &str = "Herbs";

/// Machine used for grown herbs when the catalog flags none
pub const DEFAULT_PLOT_MACHINE: &str = "Nursery";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub name: String,
    pub category: Option<String>,
    pub buy_price: Option<f64>,
    pub sell_price: Option<f64>,
    pub heat: Option<f64>,          // Fuel energy per unit
    pub nutrient_cost: Option<f64>, // Nutrients consumed per grown unit
    pub nutrient_value: Option<f64>,
    pub max_fertility: Option<f64>,
    pub liquid: bool,
}

impl Item {
    pub fn new(name: &str, category: &str) -> Self {
        Self {
            name: name.to_string(),
            category: Some(category.to_string()),
            ..Self::default()
        }
    }

    pub fn buy(mut self, price: f64) -> Self {
        self.buy_price = Some(price);
        self
    }

    pub fn sell(mut self, price: f64) -> Self {
        self.sell_price = Some(price);
        self
    }

    pub fn heat(mut self, heat: f64) -> Self {
        self.heat = Some(heat);
        self
    }

    pub fn nutrient_cost(mut self, cost: f64) -> Self {
        self.nutrient_cost = Some(cost);
        self
    }

    pub fn fertilizer(mut self, nutrient_value: f64, max_fertility: f64) -> Self {
        self.nutrient_value = Some(nutrient_value);
        self.max_fertility = Some(max_fertility);
        self
    }

    pub fn liquid(mut self) -> Self {
        self.liquid = true;
        self
    }

    /// Herbs with a nutrient cost are grown on plots instead of crafted
    pub fn is_grown_herb(&self) -> bool {
        self.category.as_deref() == Some(HERB_CATEGORY)
            && self.nutrient_cost.is_some_and(|cost| cost > 0.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Machine {
    pub name: String,
    pub heat_cost: f64,          // Heat per second per running unit, 0 = unheated
    pub parent: Option<String>,  // Furnace housing this machine
    pub slots_required: Option<u32>,
    pub heat_self: f64,          // Furnace idle heat per second
    pub slots: Option<u32>,      // Furnace slot capacity
    pub extraction: bool,        // Yield scales with the alchemy multiplier
    pub fertility: bool,         // Farming plot for grown herbs
}

impl Machine {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn heated(mut self, heat_cost: f64, parent: &str) -> Self {
        self.heat_cost = heat_cost;
        self.parent = Some(parent.to_string());
        self.slots_required = Some(1);
        self
    }

    pub fn furnace(mut self, heat_self: f64, slots: u32) -> Self {
        self.heat_self = heat_self;
        self.slots = Some(slots);
        self
    }

    pub fn extraction(mut self) -> Self {
        self.extraction = true;
        self
    }

    pub fn plot(mut self) -> Self {
        self.fertility = true;
        self
    }

    pub fn is_heated(&self) -> bool {
        self.heat_cost > 0.0
    }

    pub fn slots_per_unit(&self) -> u32 {
        self.slots_required.filter(|s| *s > 0).unwrap_or(1)
    }

    pub fn slot_capacity(&self) -> u32 {
        self.slots.unwrap_or(rates::DEFAULT_FURNACE_SLOTS)
    }
}

/// An item and a per-batch (or per-minute) quantity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quantity {
    pub item: String,
    pub qty: f64,
}

impl Quantity {
    pub fn new(item: &str, qty: f64) -> Self {
        Self {
            item: item.to_string(),
            qty,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: String,
    pub machine: String,
    pub base_time: f64,
    pub inputs: Vec<Quantity>,
    pub outputs: Vec<Quantity>,
    /// Chance of full success. Failure data is informational only.
    pub success_chance: Option<f64>,
    pub failures: Vec<Quantity>,
}

impl Recipe {
    pub fn new(id: &str, machine: &str, base_time: f64) -> Self {
        Self {
            id: id.to_string(),
            machine: machine.to_string(),
            base_time,
            inputs: Vec::new(),
            outputs: Vec::new(),
            success_chance: None,
            failures: Vec::new(),
        }
    }

    pub fn input(mut self, item: &str, qty: f64) -> Self {
        self.inputs.push(Quantity::new(item, qty));
        self
    }

    pub fn output(mut self, item: &str, qty: f64) -> Self {
        self.outputs.push(Quantity::new(item, qty));
        self
    }

    pub fn failing(mut self, success_chance: f64, failures: &[(&str, f64)]) -> Self {
        self.success_chance = Some(success_chance);
        self.failures = failures
            .iter()
            .map(|(item, qty)| Quantity::new(item, *qty))
            .collect();
        self
    }

    pub fn produces(&self, item: &str) -> bool {
        self.outputs.iter().any(|o| o.item == item)
    }

    pub fn output_of(&self, item: &str) -> Option<f64> {
        self.outputs.iter().find(|o| o.item == item).map(|o| o.qty)
    }
}

/// Read-only catalog of items, machines and recipes.
///
/// Recipes keep catalog order, which decides the default among alternatives.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    pub items: BTreeMap<String, Item>,
    pub machines: BTreeMap<String, Machine>,
    pub recipes: Vec<Recipe>,
}

impl Catalog {
    pub fn add_item(&mut self, item: Item) {
        self.items.insert(item.name.clone(), item);
    }

    pub fn add_machine(&mut self, machine: Machine) {
        self.machines.insert(machine.name.clone(), machine);
    }

    pub fn add_recipe(&mut self, recipe: Recipe) {
        self.recipes.push(recipe);
    }

    pub fn item(&self, name: &str) -> Option<&Item> {
        self.items.get(name)
    }

    pub fn machine(&self, name: &str) -> Option<&Machine> {
        self.machines.get(name)
    }

    pub fn recipe(&self, id: &str) -> Option<&Recipe> {
        self.recipes.iter().find(|r| r.id == id)
    }

    /// An item is known if it is listed or some recipe produces it
    pub fn knows(&self, name: &str) -> bool {
        self.items.contains_key(name) || self.recipes.iter().any(|r| r.produces(name))
    }

    /// Name of the machine that grows herbs
    pub fn plot_machine(&self) -> &str {
        self.machines
            .values()
            .find(|m| m.fertility)
            .map(|m| m.name.as_str())
            .unwrap_or(DEFAULT_PLOT_MACHINE)
    }

    /// Check that every heated machine sits in a furnace with usable slots
    pub fn validate(&self) -> Result<(), CalcError> {
        for machine in self.machines.values().filter(|m| m.is_heated()) {
            let parent = machine
                .parent
                .as_deref()
                .and_then(|p| self.machine(p))
                .ok_or_else(|| CalcError::MissingFurnace {
                    machine: machine.name.clone(),
                    parent: machine.parent.clone(),
                })?;

            if parent.slot_capacity() == 0 {
                return Err(CalcError::InvalidFurnace {
                    furnace: parent.name.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Upgrade levels that feed the rate model
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeLevels {
    pub belt: u32,
    pub speed: u32,
    pub alchemy: u32,
    pub fuel: u32,
    pub fertilizer: u32,
}

/// User choices consulted by every computation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    pub preferred_recipes: BTreeMap<String, String>,
    pub recycle: RecycleRegistry,
    pub levels: UpgradeLevels,
    pub default_fuel: String,
    pub default_fertilizer: String,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            preferred_recipes: BTreeMap::new(),
            recycle: RecycleRegistry::default(),
            levels: UpgradeLevels::default(),
            default_fuel: "Plank".to_string(),
            default_fertilizer: "Basic Fertilizer".to_string(),
        }
    }
}

/// A single calculation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalcRequest {
    pub target: String,
    pub rate: f64, // items/min
    pub fuel: String,
    pub fertilizer: String,
    pub self_feed: bool,
    pub self_fert: bool,
    pub levels: UpgradeLevels,
    pub unlimited_belt: bool,
}

impl CalcRequest {
    /// Request using the stored defaults for fuel, fertilizer and levels
    pub fn new(target: &str, rate: f64, prefs: &Preferences) -> Self {
        Self {
            target: target.to_string(),
            rate,
            fuel: prefs.default_fuel.clone(),
            fertilizer: prefs.default_fertilizer.clone(),
            self_feed: false,
            self_fert: false,
            levels: prefs.levels,
            unlimited_belt: false,
        }
    }
}

/// Immutable snapshot of everything a computation derives from its request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunParameters {
    pub target: String,
    pub target_rate: f64,
    pub fuel: String,
    pub fertilizer: String,
    pub self_feed: bool,
    pub self_fert: bool,
    pub speed_mult: f64,
    pub alchemy_mult: f64,
    pub fuel_mult: f64,
    pub fert_mult: f64,
    /// Items/min per belt, `None` when belts are unlimited
    pub belt_cap: Option<f64>,
    /// Heat per fuel item after upgrades
    pub fuel_energy: f64,
    /// Nutrients per fertilizer item after upgrades
    pub fertilizer_value: f64,
    /// Nutrients per second a plot draws from the fertilizer
    pub fertility: f64,
}

impl RunParameters {
    pub fn new(request: &CalcRequest, catalog: &Catalog) -> Self {
        let levels = request.levels;
        let fuel_mult = rates::potency_multiplier(levels.fuel);
        let fert_mult = rates::potency_multiplier(levels.fertilizer);

        let fuel_heat = catalog
            .item(&request.fuel)
            .and_then(|i| i.heat)
            .unwrap_or(rates::DEFAULT_FUEL_HEAT);
        let fert = catalog.item(&request.fertilizer);
        let nutrient_value = fert
            .and_then(|i| i.nutrient_value)
            .unwrap_or(rates::DEFAULT_NUTRIENT_VALUE);
        let fertility = fert
            .and_then(|i| i.max_fertility)
            .filter(|f| *f > 0.0)
            .unwrap_or(rates::DEFAULT_FERTILITY);

        Self {
            target: request.target.clone(),
            target_rate: request.rate,
            fuel: request.fuel.clone(),
            fertilizer: request.fertilizer.clone(),
            self_feed: request.self_feed,
            self_fert: request.self_fert,
            speed_mult: rates::speed_multiplier(levels.speed),
            alchemy_mult: rates::alchemy_yield_multiplier(levels.alchemy),
            fuel_mult,
            fert_mult,
            belt_cap: (!request.unlimited_belt).then(|| rates::belt_throughput(levels.belt)),
            fuel_energy: rates::floor_potency(fuel_heat * fuel_mult),
            fertilizer_value: rates::floor_potency(nutrient_value * fert_mult),
            fertility,
        }
    }

    /// Target item doubles as its own fuel
    pub fn absorbs_fuel(&self) -> bool {
        self.self_feed && self.target == self.fuel
    }

    /// Target item doubles as its own fertilizer
    pub fn absorbs_fertilizer(&self) -> bool {
        self.self_fert && self.target == self.fertilizer
    }

    /// Primary production rate once absorbed fuel/fertilizer is added on top
    pub fn gross_rate(&self, fuel_demand: f64, fertilizer_demand: f64) -> f64 {
        let mut rate = self.target_rate;
        if self.absorbs_fuel() {
            rate += fuel_demand;
        }
        if self.absorbs_fertilizer() {
            rate += fertilizer_demand;
        }
        rate
    }
}

/// Machine count at a node
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MachineCount {
    pub machine: String,
    pub raw: f64,    // Fractional, throughput-exact
    pub needed: u64, // Ceiling for this node
}

/// Heat drawn by a heated node and the furnaces housing it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatLoad {
    pub furnace: String,
    pub furnaces: u64,
    pub slots: u64,
    pub heat_per_sec: f64,
    pub fuel_per_min: f64,
}

/// How a node's net rate is supplied
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeSource {
    Purchased {
        unit_price: Option<f64>,
        cost_per_min: f64,
    },
    Grown {
        plots: MachineCount,
        throughput: f64, // items/min per plot
        nutrients_per_min: f64,
        fertilizer_per_min: f64,
    },
    Crafted {
        recipe: String,
        machine: MachineCount,
        batches_per_min: f64,
        throughput: f64, // items/min per machine
        heat: Option<HeatLoad>,
        byproducts: Vec<Quantity>,
    },
}

/// Recycling state at a node
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecycleState {
    pub active: bool,
    pub used: f64,
    pub available: f64,
}

/// One item at one point in the production chain
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DemandNode {
    pub item: String,
    pub rate: f64,
    pub net_rate: f64,
    pub source: NodeSource,
    pub recycle: Option<RecycleState>,
    /// Number of recipes that could produce this item
    pub alternatives: usize,
    pub children: Vec<DemandNode>,
}

impl DemandNode {
    pub fn machine(&self) -> Option<&MachineCount> {
        match &self.source {
            NodeSource::Grown { plots, .. } => Some(plots),
            NodeSource::Crafted { machine, .. } => Some(machine),
            NodeSource::Purchased { .. } => None,
        }
    }

    pub fn child(&self, item: &str) -> Option<&DemandNode> {
        self.children.iter().find(|c| c.item == item)
    }

    /// Visit this node and every descendant, depth first
    pub fn visit<'a>(&'a self, f: &mut impl FnMut(&'a DemandNode)) {
        f(self);
        for child in &self.children {
            child.visit(f);
        }
    }
}
