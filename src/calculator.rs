//! Production chain calculator logic
//!
//! A computation runs several expansion passes over the active recipe graph:
//! a baseline measurement, the self-feed stabilization loop, a final
//! measurement at the converged rates, and the render pass that builds the
//! returned trees. Every pass owns its own byproduct ledger.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::CalcError;
use crate::ledger::{ByproductLedger, RecycleRegistry};
use crate::models::{
    CalcRequest, Catalog, DemandNode, HeatLoad, Item, Machine, MachineCount, NodeSource,
    Preferences, Quantity, Recipe, RecycleState, RunParameters,
};
use crate::rates::{self, ceil_count, snap_count};
use crate::selector::RecipeSelector;
use crate::summary::{self, ChainSummary};

/// What an expansion pass does with nodes and recycling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassMode {
    /// Ghost pass that ignores recycling, used to measure byproducts
    Measure,
    /// Ghost pass that honours recycling, used while stabilizing
    Simulate,
    /// Builds the demand trees
    Render,
}

impl PassMode {
    pub fn is_ghost(self) -> bool {
        self != PassMode::Render
    }

    pub fn honours_recycling(self) -> bool {
        self != PassMode::Measure
    }
}

/// Global flows accumulated by a pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PassTotals {
    pub fuel_items: f64,       // items/min of the selected fuel
    pub fertilizer_items: f64, // items/min of the selected fertilizer
    pub heat_load: f64,        // heat/sec
    pub bio_load: f64,         // nutrients/sec
    pub cost: f64,             // G/min
}

#[derive(Debug)]
pub struct PassOutcome {
    pub ledger: ByproductLedger,
    pub generated: BTreeMap<String, f64>,
    pub totals: PassTotals,
}

/// One recursive expansion over the recipe graph
pub struct Pass<'a> {
    catalog: &'a Catalog,
    params: &'a RunParameters,
    selector: RecipeSelector<'a>,
    recycle: &'a RecycleRegistry,
    mode: PassMode,
    ledger: ByproductLedger,
    generated: Option<BTreeMap<String, f64>>,
    totals: PassTotals,
}

impl<'a> Pass<'a> {
    pub fn new(
        catalog: &'a Catalog,
        prefs: &'a Preferences,
        params: &'a RunParameters,
        mode: PassMode,
        ledger: ByproductLedger,
    ) -> Self {
        Self {
            catalog,
            params,
            selector: RecipeSelector::new(catalog, &prefs.preferred_recipes),
            recycle: &prefs.recycle,
            mode,
            ledger,
            generated: None,
            totals: PassTotals::default(),
        }
    }

    /// Record byproducts generated by this pass separately from the ledger
    pub fn tracking_generation(mut self) -> Self {
        self.generated = Some(BTreeMap::new());
        self
    }

    pub fn ledger(&self) -> &ByproductLedger {
        &self.ledger
    }

    pub fn totals(&self) -> PassTotals {
        self.totals
    }

    pub fn finish(self) -> PassOutcome {
        PassOutcome {
            ledger: self.ledger,
            generated: self.generated.unwrap_or_default(),
            totals: self.totals,
        }
    }

    /// Expand `item` at `rate` items/min below `ancestors`.
    ///
    /// Returns the demand tree in render mode and `None` in ghost modes;
    /// ledger and totals are updated either way.
    pub fn expand(&mut self, item: &str, rate: f64, ancestors: &[String]) -> Option<DemandNode> {
        let catalog = self.catalog;
        let (net_rate, recycle) = self.recycle_deduction(item, rate, ancestors);
        let def = catalog.item(item);

        let (source, inputs) = match def.filter(|d| d.is_grown_herb()) {
            Some(herb) => (self.grow(herb, net_rate), Vec::new()),
            None => match self.selector.active_recipe(item) {
                Some(recipe) => self.craft(item, recipe, net_rate),
                None => (self.purchase(def, net_rate), Vec::new()),
            },
        };

        let mut path = ancestors.to_vec();
        path.push(item.to_string());
        let children: Vec<DemandNode> = inputs
            .iter()
            .filter_map(|input| self.expand(&input.item, input.qty, &path))
            .collect();

        if self.mode.is_ghost() {
            return None;
        }

        Some(DemandNode {
            item: item.to_string(),
            rate,
            net_rate,
            source,
            recycle,
            alternatives: self.selector.recipes_for(item).len(),
            children,
        })
    }

    fn recycle_deduction(
        &mut self,
        item: &str,
        rate: f64,
        ancestors: &[String],
    ) -> (f64, Option<RecycleState>) {
        let available = self.ledger.available(item);
        let path = RecycleRegistry::path_key(ancestors, item);

        if self.mode.honours_recycling() && self.recycle.is_active(&path) {
            let used = if available > rates::RECYCLE_THRESHOLD {
                self.ledger.take(item, rate)
            } else {
                0.0
            };
            let state = RecycleState {
                active: true,
                used,
                available,
            };
            return ((rate - used).max(0.0), Some(state));
        }

        // Surplus is offered even where the path has not opted in
        let offer = (self.mode == PassMode::Render && available > rates::RECYCLE_THRESHOLD)
            .then_some(RecycleState {
                active: false,
                used: 0.0,
                available,
            });
        (rate, offer)
    }

    fn grow(&mut self, herb: &Item, net_rate: f64) -> NodeSource {
        let p = self.params;
        let nutrient_cost = herb.nutrient_cost.unwrap_or(0.0);

        let seconds_per_item = nutrient_cost / p.fertility;
        let per_plot = (60.0 / seconds_per_item) * p.speed_mult;
        let throughput = match p.belt_cap {
            Some(cap) if !herb.liquid => per_plot.min(cap),
            _ => per_plot,
        };
        let plots = snap_count(net_rate / throughput);

        let nutrients = net_rate * nutrient_cost;
        let fertilizer = nutrients / p.fertilizer_value;
        self.totals.fertilizer_items += fertilizer;
        self.totals.bio_load += nutrients / 60.0;

        NodeSource::Grown {
            plots: MachineCount {
                machine: self.catalog.plot_machine().to_string(),
                raw: plots,
                needed: ceil_count(plots),
            },
            throughput,
            nutrients_per_min: nutrients,
            fertilizer_per_min: fertilizer,
        }
    }

    fn craft(&mut self, item: &str, recipe: &Recipe, net_rate: f64) -> (NodeSource, Vec<Quantity>) {
        let catalog = self.catalog;
        let p = self.params;
        let machine = catalog.machine(&recipe.machine);

        let mut batch_yield = recipe.output_of(item).filter(|q| *q > 0.0).unwrap_or(1.0);
        if machine.is_some_and(|m| m.extraction) {
            batch_yield *= p.alchemy_mult;
        }
        let liquid = catalog.item(item).is_some_and(|i| i.liquid);

        let batches_per_min = net_rate / batch_yield;
        let per_machine = rates::effective_batches_per_min(
            recipe.base_time,
            batch_yield,
            p.speed_mult,
            p.belt_cap,
            liquid,
        );
        let machines = snap_count(batches_per_min / per_machine);

        // Byproducts are credited before the inputs expand so later
        // siblings can already draw on them
        let byproducts: Vec<Quantity> = recipe
            .outputs
            .iter()
            .filter(|o| o.item != item)
            .map(|o| Quantity::new(&o.item, batches_per_min * o.qty))
            .collect();
        for byproduct in &byproducts {
            self.credit(&byproduct.item, byproduct.qty);
        }

        let heat = machine
            .filter(|m| m.is_heated())
            .and_then(|m| self.heat_load(m, machines));

        let inputs = if net_rate > rates::SNAP_EPSILON {
            recipe
                .inputs
                .iter()
                .map(|i| Quantity::new(&i.item, batches_per_min * i.qty))
                .collect()
        } else {
            Vec::new()
        };

        let source = NodeSource::Crafted {
            recipe: recipe.id.clone(),
            machine: MachineCount {
                machine: recipe.machine.clone(),
                raw: machines,
                needed: ceil_count(machines),
            },
            batches_per_min,
            throughput: per_machine * batch_yield,
            heat,
            byproducts,
        };
        (source, inputs)
    }

    fn heat_load(&mut self, machine: &Machine, machines: f64) -> Option<HeatLoad> {
        let p = self.params;
        let furnace = machine
            .parent
            .as_deref()
            .and_then(|name| self.catalog.machine(name))?;

        let slots_per_unit = machine.slots_per_unit();
        let units_per_furnace = furnace.slot_capacity() as f64 / slots_per_unit as f64;
        let furnaces = ceil_count(machines / units_per_furnace);

        let heat = furnaces as f64 * furnace.heat_self * p.speed_mult
            + machines * machine.heat_cost * p.speed_mult;
        let fuel = heat * 60.0 / p.fuel_energy;

        self.totals.heat_load += heat;
        self.totals.fuel_items += fuel;

        Some(HeatLoad {
            furnace: furnace.name.clone(),
            furnaces,
            slots: ceil_count(machines) * slots_per_unit as u64,
            heat_per_sec: heat,
            fuel_per_min: fuel,
        })
    }

    fn purchase(&mut self, def: Option<&Item>, net_rate: f64) -> NodeSource {
        let unit_price = def.and_then(|i| i.buy_price);
        let cost = net_rate * unit_price.unwrap_or(0.0);
        self.totals.cost += cost;
        NodeSource::Purchased {
            unit_price,
            cost_per_min: cost,
        }
    }

    fn credit(&mut self, item: &str, qty: f64) {
        self.ledger.credit(item, qty);
        if let Some(generated) = self.generated.as_mut() {
            *generated.entry(item.to_string()).or_default() += qty;
        }
    }
}

/// How the self-feed loop ended
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Convergence {
    pub iterations: usize,
    pub converged: bool,
    pub fuel_delta: f64,
    pub fertilizer_delta: f64,
}

impl Default for Convergence {
    fn default() -> Self {
        Self {
            iterations: 0,
            converged: true,
            fuel_delta: 0.0,
            fertilizer_delta: 0.0,
        }
    }
}

/// Fixed point of the self-feed loop
#[derive(Debug, Clone, PartialEq)]
pub struct Stabilized {
    pub fuel_demand: f64,
    pub fertilizer_demand: f64,
    /// Byproducts of the whole factory at the converged rates
    pub snapshot: BTreeMap<String, f64>,
    pub convergence: Convergence,
}

/// Trees and settled ledger of a render pass
struct Rendered {
    primary: Option<DemandNode>,
    fertilizer_module: Option<DemandNode>,
    fuel_module: Option<DemandNode>,
    ledger: ByproductLedger,
    generated: BTreeMap<String, f64>,
    totals: PassTotals,
    overdrawn: Vec<String>,
}

/// Result of a computation
#[derive(Debug, Clone, Default, Serialize)]
pub struct Computation {
    pub target: String,
    pub gross_rate: f64,
    pub primary: Option<DemandNode>,
    pub fertilizer_module: Option<DemandNode>,
    pub fuel_module: Option<DemandNode>,
    /// Fuel demand covered by the main output itself
    pub absorbed_fuel: Option<f64>,
    /// Fertilizer demand covered by the main output itself
    pub absorbed_fertilizer: Option<f64>,
    pub summary: ChainSummary,
    pub convergence: Convergence,
    /// Surplus left after the render pass settled
    pub byproducts: BTreeMap<String, f64>,
}

impl Computation {
    pub fn empty(target: &str) -> Self {
        Self {
            target: target.to_string(),
            summary: ChainSummary {
                target: target.to_string(),
                ..ChainSummary::default()
            },
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.primary.is_none()
    }
}

/// Entry point tying catalog and preferences to computations
#[derive(Debug, Clone, Copy)]
pub struct Calculator<'a> {
    catalog: &'a Catalog,
    prefs: &'a Preferences,
}

impl<'a> Calculator<'a> {
    pub fn new(catalog: &'a Catalog, prefs: &'a Preferences) -> Self {
        Self { catalog, prefs }
    }

    pub fn selector(&self) -> RecipeSelector<'a> {
        RecipeSelector::new(self.catalog, &self.prefs.preferred_recipes)
    }

    pub fn pass<'p>(
        &self,
        params: &'p RunParameters,
        mode: PassMode,
        ledger: ByproductLedger,
    ) -> Pass<'p>
    where
        'a: 'p,
    {
        Pass::new(self.catalog, self.prefs, params, mode, ledger)
    }

    /// Calculate the production chain for a request.
    ///
    /// Unknown targets yield an empty computation rather than an error.
    pub fn compute(&self, request: &CalcRequest) -> Result<Computation, CalcError> {
        if request.target.is_empty() || request.rate <= 0.0 || !self.catalog.knows(&request.target)
        {
            info!(target_item = %request.target, rate = request.rate, "nothing to compute");
            return Ok(Computation::empty(&request.target));
        }

        self.catalog.validate()?;
        let params = RunParameters::new(request, self.catalog);

        let selector = self.selector();
        selector.check_acyclic(&params.target)?;
        if params.self_feed {
            selector.check_acyclic(&params.fuel)?;
        }
        if params.self_fert {
            selector.check_acyclic(&params.fertilizer)?;
        }

        let stable = self.stabilize(&params);
        let gross_rate = params.gross_rate(stable.fuel_demand, stable.fertilizer_demand);

        let Rendered {
            primary,
            fertilizer_module,
            fuel_module,
            ledger,
            totals,
            ..
        } = self.render(&params, &stable, gross_rate);

        let trees: Vec<&DemandNode> = [&primary, &fertilizer_module, &fuel_module]
            .into_iter()
            .flatten()
            .collect();
        let summary = summary::summarize(self.catalog, &params, gross_rate, &trees, &totals);

        info!(
            target_item = %params.target,
            rate = params.target_rate,
            gross_rate,
            cost = totals.cost,
            iterations = stable.convergence.iterations,
            "computed production chain"
        );

        Ok(Computation {
            target: params.target.clone(),
            gross_rate,
            primary,
            fertilizer_module,
            fuel_module,
            absorbed_fuel: (params.absorbs_fuel() && stable.fuel_demand > 0.0)
                .then_some(stable.fuel_demand),
            absorbed_fertilizer: (params.absorbs_fertilizer() && stable.fertilizer_demand > 0.0)
                .then_some(stable.fertilizer_demand),
            summary,
            convergence: stable.convergence,
            byproducts: ledger.into_snapshot(),
        })
    }

    /// Build the returned trees at the stabilized rates.
    ///
    /// Recycling may draw on surplus forecast from later siblings. When the
    /// render produces less of an item than was drawn, the forecast is
    /// replaced by what the render generated and the trees are built again.
    /// After [`rates::MAX_RENDER_ROUNDS`] the render only recycles surplus
    /// that is already produced when it is needed.
    fn render(&self, params: &RunParameters, stable: &Stabilized, gross_rate: f64) -> Rendered {
        let mut forecast = stable.snapshot.clone();
        for round in 1..=rates::MAX_RENDER_ROUNDS {
            let rendered =
                self.render_once(params, stable, gross_rate, ByproductLedger::forecast(&forecast));
            if rendered.overdrawn.is_empty() {
                return rendered;
            }
            debug!(round, overdrawn = ?rendered.overdrawn, "forecast surplus not produced");
            forecast = rendered.generated;
        }

        warn!(
            target_item = %params.target,
            "forecast recycling did not settle, recycling produced surplus only"
        );
        self.render_once(params, stable, gross_rate, ByproductLedger::default())
    }

    fn render_once(
        &self,
        params: &RunParameters,
        stable: &Stabilized,
        gross_rate: f64,
        ledger: ByproductLedger,
    ) -> Rendered {
        let mut pass = self
            .pass(params, PassMode::Render, ledger)
            .tracking_generation();
        let primary = pass.expand(&params.target, gross_rate, &[]);
        let fertilizer_module = if params.self_fert
            && !params.absorbs_fertilizer()
            && stable.fertilizer_demand > 0.0
        {
            pass.expand(&params.fertilizer, stable.fertilizer_demand, &[])
        } else {
            None
        };
        let fuel_module =
            if params.self_feed && !params.absorbs_fuel() && stable.fuel_demand > 0.0 {
                pass.expand(&params.fuel, stable.fuel_demand, &[])
            } else {
                None
            };

        let PassOutcome {
            mut ledger,
            generated,
            totals,
        } = pass.finish();
        let overdrawn = ledger.overdrawn();
        ledger.settle();

        Rendered {
            primary,
            fertilizer_module,
            fuel_module,
            ledger,
            generated,
            totals,
            overdrawn,
        }
    }

    /// Resolve self-feed and self-fertilizer demand by fixed-point iteration
    pub fn stabilize(&self, params: &RunParameters) -> Stabilized {
        let baseline = {
            let mut pass = self.pass(params, PassMode::Measure, ByproductLedger::default());
            pass.expand(&params.target, params.target_rate, &[]);
            pass.finish().ledger.into_snapshot()
        };

        if !params.self_feed && !params.self_fert {
            return Stabilized {
                fuel_demand: 0.0,
                fertilizer_demand: 0.0,
                snapshot: baseline,
                convergence: Convergence::default(),
            };
        }

        let absorbed = params.absorbs_fuel() || params.absorbs_fertilizer();
        let seed = if absorbed {
            BTreeMap::new()
        } else {
            baseline.clone()
        };

        let mut generated = BTreeMap::new();
        let (mut fuel, mut fertilizer) = (0.0, 0.0);
        let mut convergence = Convergence {
            converged: false,
            ..Convergence::default()
        };

        for iteration in 1..=rates::MAX_STABILIZATION_ITERATIONS {
            let mut ledger = ByproductLedger::from_snapshot(&seed);
            ledger.absorb(&generated);

            let mut pass = self
                .pass(params, PassMode::Simulate, ledger)
                .tracking_generation();
            pass.expand(&params.target, params.gross_rate(fuel, fertilizer), &[]);
            expand_modules(&mut pass, params, fuel, fertilizer);
            let outcome = pass.finish();
            generated = outcome.generated;

            let next_fuel = outcome.totals.fuel_items;
            let next_fertilizer = outcome.totals.fertilizer_items;
            convergence.iterations = iteration;
            convergence.fuel_delta = (next_fuel - fuel).abs();
            convergence.fertilizer_delta = (next_fertilizer - fertilizer).abs();

            debug!(
                iteration,
                fuel_demand = next_fuel,
                fertilizer_demand = next_fertilizer,
                "stabilization step"
            );

            fuel = next_fuel;
            fertilizer = next_fertilizer;
            if convergence.fuel_delta < rates::CONVERGENCE_TOLERANCE
                && convergence.fertilizer_delta < rates::CONVERGENCE_TOLERANCE
            {
                convergence.converged = true;
                break;
            }
        }

        if !convergence.converged {
            warn!(
                target_item = %params.target,
                fuel_delta = convergence.fuel_delta,
                fertilizer_delta = convergence.fertilizer_delta,
                "self-feed demand did not converge, using last values"
            );
        }

        // Measure the factory once more at the settled rates
        let start = if absorbed {
            ByproductLedger::default()
        } else {
            ByproductLedger::from_snapshot(&baseline)
        };
        let mut pass = self.pass(params, PassMode::Measure, start);
        if absorbed {
            pass.expand(&params.target, params.gross_rate(fuel, fertilizer), &[]);
        }
        expand_modules(&mut pass, params, fuel, fertilizer);
        let snapshot = pass.finish().ledger.into_snapshot();

        Stabilized {
            fuel_demand: fuel,
            fertilizer_demand: fertilizer,
            snapshot,
            convergence,
        }
    }
}

/// Expand the internal fuel and fertilizer chains that are not absorbed
fn expand_modules(pass: &mut Pass<'_>, params: &RunParameters, fuel: f64, fertilizer: f64) {
    if params.self_feed && !params.absorbs_fuel() && fuel > 0.0 {
        pass.expand(&params.fuel, fuel, &[]);
    }
    if params.self_fert && !params.absorbs_fertilizer() && fertilizer > 0.0 {
        pass.expand(&params.fertilizer, fertilizer, &[]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Item, UpgradeLevels};

    /// Widget needs Ore and Scrap; smelting Ore also yields Scrap
    fn scrap_catalog(scrap_first: bool) -> Catalog {
        let mut c = Catalog::default();
        c.add_item(Item::new("Rock", "Raw Materials").buy(5.0));
        c.add_item(Item::new("Junk", "Raw Materials").buy(1.0));
        c.add_machine(Machine::new("Press"));
        c.add_machine(Machine::new("Smelter"));

        let widget = Recipe::new("Widget", "Press", 6.0);
        let widget = if scrap_first {
            widget.input("Scrap", 2.0).input("Ore", 1.0)
        } else {
            widget.input("Ore", 1.0).input("Scrap", 2.0)
        };
        c.add_recipe(widget.output("Widget", 1.0));
        // Listed first so it stays the default Scrap recipe
        c.add_recipe(
            Recipe::new("Scrap", "Press", 6.0)
                .input("Junk", 1.0)
                .output("Scrap", 1.0),
        );
        c.add_recipe(
            Recipe::new("Ore", "Smelter", 6.0)
                .input("Rock", 1.0)
                .output("Ore", 1.0)
                .output("Scrap", 1.0),
        );
        c
    }

    fn request(target: &str, rate: f64) -> CalcRequest {
        CalcRequest {
            target: target.to_string(),
            rate,
            fuel: "Plank".to_string(),
            fertilizer: "Basic Fertilizer".to_string(),
            self_feed: false,
            self_fert: false,
            levels: UpgradeLevels::default(),
            unlimited_belt: true,
        }
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn ghost_pass_builds_no_tree_but_fills_ledger() {
        let catalog = scrap_catalog(false);
        let prefs = Preferences::default();
        let params = RunParameters::new(&request("Widget", 10.0), &catalog);
        let mut pass = Pass::new(
            &catalog,
            &prefs,
            &params,
            PassMode::Measure,
            ByproductLedger::default(),
        );

        assert!(pass.expand("Widget", 10.0, &[]).is_none());
        assert!(close(pass.ledger().available("Scrap"), 10.0));
        // 10 Rock at 5 plus 20 Junk at 1
        assert!(close(pass.totals().cost, 70.0));
    }

    #[test]
    fn recycling_deducts_exactly_what_is_available() {
        let catalog = scrap_catalog(false);
        let mut prefs = Preferences::default();
        prefs.recycle.enable("Widget>Scrap");
        let params = RunParameters::new(&request("Widget", 10.0), &catalog);
        let mut pass = Pass::new(
            &catalog,
            &prefs,
            &params,
            PassMode::Render,
            ByproductLedger::default(),
        );

        let root = pass.expand("Widget", 10.0, &[]).unwrap();
        let scrap = root.child("Scrap").unwrap();
        let state = scrap.recycle.as_ref().unwrap();

        assert!(state.active);
        assert!(close(state.available, 10.0));
        assert!(close(state.used, 10.0));
        assert!(close(scrap.rate, 20.0));
        assert!(close(scrap.net_rate, 10.0));
        assert!(close(pass.ledger().available("Scrap"), 0.0));
    }

    #[test]
    fn measure_pass_ignores_recycling() {
        let catalog = scrap_catalog(false);
        let mut prefs = Preferences::default();
        prefs.recycle.enable("Widget>Scrap");
        let params = RunParameters::new(&request("Widget", 10.0), &catalog);
        let mut pass = Pass::new(
            &catalog,
            &prefs,
            &params,
            PassMode::Measure,
            ByproductLedger::default(),
        );

        pass.expand("Widget", 10.0, &[]);
        assert!(close(pass.ledger().available("Scrap"), 10.0));
    }

    #[test]
    fn unopted_surplus_is_offered_but_untouched() {
        let catalog = scrap_catalog(false);
        let prefs = Preferences::default();
        let params = RunParameters::new(&request("Widget", 10.0), &catalog);
        let mut pass = Pass::new(
            &catalog,
            &prefs,
            &params,
            PassMode::Render,
            ByproductLedger::default(),
        );

        let root = pass.expand("Widget", 10.0, &[]).unwrap();
        let scrap = root.child("Scrap").unwrap();
        let state = scrap.recycle.as_ref().unwrap();
        assert!(!state.active);
        assert!(close(state.available, 10.0));
        assert!(close(scrap.net_rate, 20.0));
    }

    #[test]
    fn forecast_lets_earlier_siblings_recycle() {
        let catalog = scrap_catalog(true);
        let mut prefs = Preferences::default();
        prefs.recycle.enable("Widget>Scrap");
        let calc = Calculator::new(&catalog, &prefs);

        let result = calc.compute(&request("Widget", 10.0)).unwrap();
        let root = result.primary.as_ref().unwrap();
        let scrap = root.child("Scrap").unwrap();

        assert!(close(scrap.net_rate, 10.0));
        assert!(close(result.byproducts.get("Scrap").copied().unwrap_or(0.0), 0.0));
    }

    #[test]
    fn zero_net_rate_stops_recursion() {
        let catalog = scrap_catalog(false);
        let mut prefs = Preferences::default();
        prefs.recycle.enable("Widget>Scrap");
        let params = RunParameters::new(&request("Widget", 5.0), &catalog);
        let mut snapshot = BTreeMap::new();
        snapshot.insert("Scrap".to_string(), 100.0);
        let mut pass = Pass::new(
            &catalog,
            &prefs,
            &params,
            PassMode::Render,
            ByproductLedger::from_snapshot(&snapshot),
        );

        let root = pass.expand("Widget", 5.0, &[]).unwrap();
        let scrap = root.child("Scrap").unwrap();
        assert!(close(scrap.net_rate, 0.0));
        assert!(scrap.children.is_empty());
    }

    #[test]
    fn unknown_target_is_empty() {
        let catalog = scrap_catalog(false);
        let prefs = Preferences::default();
        let result = Calculator::new(&catalog, &prefs)
            .compute(&request("Unobtainium", 10.0))
            .unwrap();
        assert!(result.is_empty());
        assert_eq!(result.summary.cost_per_min, 0.0);
    }

    #[test]
    fn missing_furnace_is_rejected() {
        let mut catalog = scrap_catalog(false);
        catalog.add_machine(Machine::new("Kiln").heated(15.0, "Blast Furnace"));
        let prefs = Preferences::default();
        let err = Calculator::new(&catalog, &prefs)
            .compute(&request("Widget", 10.0))
            .unwrap_err();
        assert!(matches!(err, CalcError::MissingFurnace { .. }));
    }

    #[test]
    fn cyclic_preference_is_rejected() {
        let mut catalog = scrap_catalog(false);
        catalog.add_recipe(
            Recipe::new("Rock From Widgets", "Press", 6.0)
                .input("Widget", 1.0)
                .output("Rock", 3.0),
        );
        let prefs = Preferences::default();
        let err = Calculator::new(&catalog, &prefs)
            .compute(&request("Widget", 10.0))
            .unwrap_err();
        assert!(matches!(err, CalcError::CyclicRecipe { .. }));
    }

    #[test]
    fn stabilizer_without_self_feed_is_trivial() {
        let catalog = scrap_catalog(false);
        let prefs = Preferences::default();
        let params = RunParameters::new(&request("Widget", 10.0), &catalog);
        let stable = Calculator::new(&catalog, &prefs).stabilize(&params);

        assert_eq!(stable.convergence.iterations, 0);
        assert!(stable.convergence.converged);
        assert!(close(stable.snapshot["Scrap"], 10.0));
    }
}
