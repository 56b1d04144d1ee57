//! Aggregation of demand trees into build lists and totals

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::calculator::PassTotals;
use crate::models::{Catalog, DemandNode, NodeSource, RunParameters};
use crate::rates::{self, ceil_count};

/// Instances of one machine making one item
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MachineGroup {
    pub item: String,
    pub raw: f64,
    pub needed: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MachineTotal {
    pub machine: String,
    /// Machines needed if instances making the same item are pooled
    pub min: u64,
    /// Machines needed if every tree node is built separately
    pub max: u64,
    pub exact: f64,
    pub groups: Vec<MachineGroup>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FurnaceTotal {
    pub furnace: String,
    pub slots: u64,
    pub count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ByproductTotal {
    pub item: String,
    pub generated: f64,
    pub recycled: f64,
    pub surplus: f64,
}

/// Demand for the selected fuel or fertilizer
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SupplyTotal {
    pub item: String,
    pub demand_per_min: f64,
    pub import_per_min: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChainSummary {
    pub target: String,
    pub target_rate: f64,
    pub gross_rate: f64,
    pub machines: Vec<MachineTotal>,
    pub furnaces: Vec<FurnaceTotal>,
    pub cost_per_min: f64,
    pub heat_load: f64, // heat/sec
    pub internal_heat: f64,
    pub external_heat: f64,
    pub bio_load: f64, // nutrients/sec
    pub internal_bio: f64,
    pub external_bio: f64,
    pub fuel: SupplyTotal,
    pub fertilizer: SupplyTotal,
    pub byproducts: Vec<ByproductTotal>,
    pub profit_per_min: Option<f64>,
    pub belt_usage: Option<f64>,
    pub belt_label: Option<String>,
}

impl ChainSummary {
    pub fn machine(&self, name: &str) -> Option<&MachineTotal> {
        self.machines.iter().find(|m| m.machine == name)
    }

    pub fn furnace(&self, name: &str) -> Option<&FurnaceTotal> {
        self.furnaces.iter().find(|f| f.furnace == name)
    }

    pub fn byproduct(&self, item: &str) -> Option<&ByproductTotal> {
        self.byproducts.iter().find(|b| b.item == item)
    }

    pub fn furnace_count(&self) -> u64 {
        self.furnaces.iter().map(|f| f.count).sum()
    }
}

/// Summarize the trees of one render pass
pub fn summarize(
    catalog: &Catalog,
    params: &RunParameters,
    gross_rate: f64,
    trees: &[&DemandNode],
    totals: &PassTotals,
) -> ChainSummary {
    let mut groups: BTreeMap<String, BTreeMap<String, MachineGroup>> = BTreeMap::new();
    let mut slots: BTreeMap<String, u64> = BTreeMap::new();
    let mut byproducts: BTreeMap<String, ByproductTotal> = BTreeMap::new();

    for tree in trees {
        tree.visit(&mut |node| {
            collect_node(node, &mut groups, &mut slots, &mut byproducts);
        });
    }

    let machines = groups
        .into_iter()
        .map(|(machine, by_item)| {
            let groups: Vec<MachineGroup> = by_item.into_values().collect();
            MachineTotal {
                machine,
                min: groups.iter().map(|g| ceil_count(g.raw)).sum(),
                max: groups.iter().map(|g| g.needed).sum(),
                exact: groups.iter().map(|g| g.raw).sum(),
                groups,
            }
        })
        .filter(|m| m.max > 0)
        .collect();

    let furnaces = slots
        .into_iter()
        .map(|(furnace, slots)| {
            let capacity = catalog
                .machine(&furnace)
                .map(|m| m.slot_capacity())
                .unwrap_or(rates::DEFAULT_FURNACE_SLOTS)
                .max(1) as f64;
            let count = ((slots as f64 - rates::SNAP_EPSILON) / capacity).ceil().max(0.0) as u64;
            FurnaceTotal {
                furnace,
                slots,
                count,
            }
        })
        .collect();

    let byproducts = byproducts
        .into_values()
        .map(|mut b| {
            b.surplus = (b.generated - b.recycled).max(0.0);
            b
        })
        .collect();

    let (internal_heat, external_heat) = split(totals.heat_load, params.self_feed);
    let (internal_bio, external_bio) = split(totals.bio_load, params.self_fert);

    let profit_per_min = catalog
        .item(&params.target)
        .and_then(|i| i.sell_price)
        .map(|price| params.target_rate * price - totals.cost);

    ChainSummary {
        target: params.target.clone(),
        target_rate: params.target_rate,
        gross_rate,
        machines,
        furnaces,
        cost_per_min: totals.cost,
        heat_load: totals.heat_load,
        internal_heat,
        external_heat,
        bio_load: totals.bio_load,
        internal_bio,
        external_bio,
        fuel: SupplyTotal {
            item: params.fuel.clone(),
            demand_per_min: totals.fuel_items,
            import_per_min: if params.self_feed { 0.0 } else { totals.fuel_items },
        },
        fertilizer: SupplyTotal {
            item: params.fertilizer.clone(),
            demand_per_min: totals.fertilizer_items,
            import_per_min: if params.self_fert { 0.0 } else { totals.fertilizer_items },
        },
        byproducts,
        profit_per_min,
        belt_usage: params.belt_cap.map(|cap| params.target_rate / cap),
        belt_label: params
            .belt_cap
            .map(|cap| rates::belt_label(params.target_rate, cap)),
    }
}

fn collect_node(
    node: &DemandNode,
    groups: &mut BTreeMap<String, BTreeMap<String, MachineGroup>>,
    slots: &mut BTreeMap<String, u64>,
    byproducts: &mut BTreeMap<String, ByproductTotal>,
) {
    if let Some(count) = node.machine() {
        let group = groups
            .entry(count.machine.clone())
            .or_default()
            .entry(node.item.clone())
            .or_insert_with(|| MachineGroup {
                item: node.item.clone(),
                ..MachineGroup::default()
            });
        group.raw += count.raw;
        group.needed += count.needed;
    }

    if let NodeSource::Crafted {
        heat, byproducts: made, ..
    } = &node.source
    {
        if let Some(heat) = heat {
            *slots.entry(heat.furnace.clone()).or_default() += heat.slots;
        }
        for b in made {
            byproduct_entry(byproducts, &b.item).generated += b.qty;
        }
    }

    if let Some(state) = &node.recycle {
        if state.used > 0.0 {
            byproduct_entry(byproducts, &node.item).recycled += state.used;
        }
    }
}

fn byproduct_entry<'m>(
    byproducts: &'m mut BTreeMap<String, ByproductTotal>,
    item: &str,
) -> &'m mut ByproductTotal {
    byproducts
        .entry(item.to_string())
        .or_insert_with(|| ByproductTotal {
            item: item.to_string(),
            ..ByproductTotal::default()
        })
}

/// (internal, external) share of a load
fn split(load: f64, internal: bool) -> (f64, f64) {
    if internal { (load, 0.0) } else { (0.0, load) }
}

/// Format a demand tree as a readable string
pub fn format_tree(node: &DemandNode, indent: usize) -> String {
    let mut output = String::new();
    let prefix = "  ".repeat(indent);

    let recycle = match &node.recycle {
        Some(state) if state.active && state.used > 0.0 => {
            format!(" [recycling {:.2}/min]", state.used)
        }
        Some(state) if !state.active => {
            format!(" [{:.2}/min surplus available]", state.available)
        }
        _ => String::new(),
    };
    let choice = if node.alternatives > 1 {
        format!(" ({} recipes)", node.alternatives)
    } else {
        String::new()
    };

    match &node.source {
        NodeSource::Purchased { cost_per_min, .. } => {
            output.push_str(&format!(
                "{}{} @ {:.2}/min (raw input, {:.1} G/min){}\n",
                prefix, node.item, node.rate, cost_per_min, recycle
            ));
        }
        NodeSource::Grown {
            plots,
            nutrients_per_min,
            ..
        } => {
            output.push_str(&format!(
                "{}{} @ {:.2}/min: {}x {} ({:.2}), {:.1} nutrients/min{}\n",
                prefix,
                node.item,
                node.rate,
                plots.needed,
                plots.machine,
                plots.raw,
                nutrients_per_min,
                recycle
            ));
        }
        NodeSource::Crafted {
            recipe,
            machine,
            heat,
            byproducts,
            ..
        } => {
            output.push_str(&format!(
                "{}{} @ {:.2}/min: {}x {} ({:.2}) via {}{}{}\n",
                prefix,
                node.item,
                node.rate,
                machine.needed,
                machine.machine,
                machine.raw,
                recipe,
                choice,
                recycle
            ));
            if let Some(heat) = heat {
                output.push_str(&format!(
                    "{}  heat {:.1}/s in {}x {}\n",
                    prefix, heat.heat_per_sec, heat.furnaces, heat.furnace
                ));
            }
            for b in byproducts {
                output.push_str(&format!("{}  + {} @ {:.2}/min\n", prefix, b.item, b.qty));
            }
        }
    }

    for child in &node.children {
        output.push_str(&format_tree(child, indent + 1));
    }

    output
}

impl fmt::Display for ChainSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Production Summary ===")?;
        writeln!(f, "Target: {} @ {:.2}/min", self.target, self.target_rate)?;
        if (self.gross_rate - self.target_rate).abs() > rates::SNAP_EPSILON {
            writeln!(f, "Gross output: {:.2}/min", self.gross_rate)?;
        }
        if let Some(label) = &self.belt_label {
            writeln!(f, "Belt: {}", label)?;
        }
        writeln!(f)?;

        writeln!(f, "Machines required (pooled / per node):")?;
        for m in &self.machines {
            writeln!(f, "  {}-{}x {} ({:.2})", m.min, m.max, m.machine, m.exact)?;
        }
        for furnace in &self.furnaces {
            writeln!(
                f,
                "  {}x {} ({} slots)",
                furnace.count, furnace.furnace, furnace.slots
            )?;
        }
        writeln!(f)?;

        if !self.byproducts.is_empty() {
            writeln!(f, "Byproducts:")?;
            for b in &self.byproducts {
                writeln!(
                    f,
                    "  {} made {:.2}/min, recycled {:.2}/min, surplus {:.2}/min",
                    b.item, b.generated, b.recycled, b.surplus
                )?;
            }
            writeln!(f)?;
        }

        writeln!(f, "Heat: {:.1}/s", self.heat_load)?;
        writeln!(
            f,
            "  Fuel: {} @ {:.2}/min (import {:.2}/min)",
            self.fuel.item, self.fuel.demand_per_min, self.fuel.import_per_min
        )?;
        writeln!(f, "Nutrients: {:.1}/s", self.bio_load)?;
        writeln!(
            f,
            "  Fertilizer: {} @ {:.2}/min (import {:.2}/min)",
            self.fertilizer.item, self.fertilizer.demand_per_min, self.fertilizer.import_per_min
        )?;
        writeln!(f)?;

        writeln!(f, "Cost: {:.1} G/min", self.cost_per_min)?;
        if let Some(profit) = self.profit_per_min {
            writeln!(f, "Profit: {:.1} G/min", profit)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculator::Calculator;
    use crate::models::{CalcRequest, Item, Machine, Preferences, Recipe, UpgradeLevels};

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

    /// Bolts are needed both directly and through frames
    fn kit_catalog() -> Catalog {
        let mut c = Catalog::default();
        c.add_item(Item::new("Ore", "Raw Materials").buy(2.0));
        c.add_item(Item::new("Kit", "Products").sell(50.0));
        c.add_machine(Machine::new("Press"));
        c.add_machine(Machine::new("Bench"));
        c.add_recipe(
            Recipe::new("Kit", "Bench", 6.0)
                .input("Bolt", 1.0)
                .input("Frame", 1.0)
                .output("Kit", 1.0),
        );
        c.add_recipe(Recipe::new("Frame", "Bench", 6.0).input("Bolt", 1.0).output("Frame", 1.0));
        c.add_recipe(Recipe::new("Bolt", "Press", 6.0).input("Ore", 1.0).output("Bolt", 1.0));
        c
    }

    #[test]
    fn pooled_and_per_node_counts() {
        let catalog = kit_catalog();
        let prefs = Preferences::default();
        let result = Calculator::new(&catalog, &prefs)
            .compute(&request("Kit", 5.0))
            .unwrap();
        let summary = &result.summary;

        let press = summary.machine("Press").unwrap();
        assert_eq!(press.groups.len(), 1);
        assert!(close(press.exact, 1.0));
        assert_eq!(press.min, 1);
        assert_eq!(press.max, 2);

        let bench = summary.machine("Bench").unwrap();
        assert_eq!(bench.groups.len(), 2);
        assert_eq!(bench.min, 2);
        assert_eq!(bench.max, 2);

        // 10 Ore at 2 G
        assert!(close(summary.cost_per_min, 20.0));
        assert_eq!(summary.profit_per_min, Some(5.0 * 50.0 - 20.0));
        assert!(summary.belt_label.is_none());
    }

    #[test]
    fn furnace_slots_and_fuel() {
        let mut catalog = Catalog::default();
        catalog.add_item(Item::new("Plank", "Processed").buy(1.0).heat(20.0));
        catalog.add_machine(Machine::new("Stone Furnace").furnace(4.0, 3));
        catalog.add_machine(Machine::new("Crucible").heated(4.0, "Stone Furnace"));
        catalog.add_recipe(
            Recipe::new("Charcoal", "Crucible", 4.0)
                .input("Plank", 1.0)
                .output("Charcoal", 1.0),
        );
        let prefs = Preferences::default();

        let result = Calculator::new(&catalog, &prefs)
            .compute(&request("Charcoal", 60.0))
            .unwrap();
        let summary = &result.summary;

        // 4 Crucibles in 2 furnaces: 2x4 idle heat plus 4x4 running heat
        assert!(close(summary.heat_load, 24.0));
        assert!(close(summary.external_heat, 24.0));
        assert!(close(summary.fuel.demand_per_min, 72.0));
        assert!(close(summary.fuel.import_per_min, 72.0));

        let furnace = summary.furnace("Stone Furnace").unwrap();
        assert_eq!(furnace.slots, 4);
        assert_eq!(furnace.count, 2);
        assert_eq!(summary.furnace_count(), 2);
    }

    #[test]
    fn belt_usage_is_reported_when_capped() {
        let catalog = kit_catalog();
        let prefs = Preferences::default();
        let mut req = request("Kit", 15.0);
        req.unlimited_belt = false;
        let result = Calculator::new(&catalog, &prefs).compute(&req).unwrap();

        assert_eq!(result.summary.belt_usage, Some(0.25));
        assert_eq!(result.summary.belt_label.as_deref(), Some("1/4 Belt, 25.0%"));
    }

    #[test]
    fn tree_text_lists_every_node() {
        let catalog = kit_catalog();
        let prefs = Preferences::default();
        let result = Calculator::new(&catalog, &prefs)
            .compute(&request("Kit", 5.0))
            .unwrap();
        let text = format_tree(result.primary.as_ref().unwrap(), 0);

        assert!(text.starts_with("Kit @ 5.00/min: 1x Bench (0.50) via Kit"));
        assert_eq!(text.matches("Bolt @").count(), 2);
        assert!(text.contains("    Ore @ 5.00/min (raw input, 10.0 G/min)"));
        assert!(result.summary.to_string().contains("1-2x Press (1.00)"));
    }
}
