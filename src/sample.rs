//! Sample Alchemy Factory data for use without a full catalog import

use crate::models::{Catalog, Item, Machine, Recipe};

/// A working subset of the game's items, machines and recipes.
///
/// Recipe order matters: it decides the default among alternatives,
/// e.g. Plank comes from the Table Saw unless Gloom Fungus is preferred.
pub fn sample_catalog() -> Catalog {
    let mut c = Catalog::default();

    // Raw materials
    c.add_item(Item::new("Logs", "Raw Materials").buy(200.0).heat(10.0));
    c.add_item(Item::new("Limestone", "Raw Materials").buy(600.0));
    c.add_item(Item::new("Iron Ore", "Raw Materials").buy(1200.0));
    c.add_item(Item::new("Coal Ore", "Raw Materials").buy(4800.0).heat(250.0));
    c.add_item(Item::new("Pyrite Ore", "Raw Materials").buy(11200.0));
    c.add_item(Item::new("Gloom Fungus", "Raw Materials").buy(46.0));
    c.add_item(Item::new("Rotten Log", "Raw Materials").buy(2000.0));
    c.add_item(Item::new("Flax Seed", "Seeds").buy(280.0));
    c.add_item(Item::new("Sage Seed", "Seeds").buy(360.0));

    // Herbs
    c.add_item(Item::new("Flax", "Herbs").buy(2.0).nutrient_cost(24.0));
    c.add_item(Item::new("Sage", "Herbs").buy(3.0).nutrient_cost(36.0));

    // Materials and fuels
    c.add_item(Item::new("Plank", "Material").buy(1.0).heat(20.0));
    c.add_item(Item::new("Stone", "Material").buy(4.0));
    c.add_item(Item::new("Sand", "Material").buy(4.0));
    c.add_item(Item::new("Charcoal", "Fuel").buy(2.0).heat(40.0));
    c.add_item(Item::new("Coke", "Fuel").buy(30.0).heat(600.0));
    c.add_item(Item::new("Charcoal Powder", "Material").buy(2.0).heat(48.0));
    c.add_item(Item::new("Coke Powder", "Material").buy(30.0).heat(660.0));
    c.add_item(Item::new("Sulfur", "Material").buy(246.0));
    c.add_item(Item::new("Flax Fiber", "Material").buy(2.0));
    c.add_item(Item::new("Sage Powder", "Material").buy(3.0));
    c.add_item(Item::new("Plant Ash", "Material").buy(4.0));
    c.add_item(Item::new("Quicklime", "Material").buy(6.0));
    c.add_item(Item::new("Quicklime Powder", "Material").buy(6.0));
    c.add_item(Item::new("Iron Ingot", "Material").buy(15.0));
    c.add_item(Item::new("Steel Ingot", "Material").buy(161.0));
    c.add_item(Item::new("Large Wooden Gear", "Component"));

    // Liquids
    c.add_item(Item::new("Linseed Oil", "Liquid").buy(0.0).liquid());
    c.add_item(Item::new("Limewater", "Liquid").buy(0.0).liquid());

    // Products
    c.add_item(Item::new("Healing Potion", "Potion").sell(85.0));
    c.add_item(Item::new("Basic Fertilizer", "Fertilizer").buy(14.0).fertilizer(144.0, 12.0));

    c.add_machine(Machine::new("Table Saw"));
    c.add_machine(Machine::new("Stone Crusher"));
    c.add_machine(Machine::new("Planting"));
    c.add_machine(Machine::new("Grinder"));
    c.add_machine(Machine::new("Processor"));
    c.add_machine(Machine::new("Assembler"));
    c.add_machine(Machine::new("Extractor").extraction());
    c.add_machine(Machine::new("Alembic").heated(108.0, "Stone Furnace").extraction());
    c.add_machine(Machine::new("Crucible").heated(4.0, "Stone Furnace"));
    c.add_machine(Machine::new("Kiln").heated(15.0, "Stone Furnace"));
    c.add_machine(Machine::new("Athanor").heated(32.0, "Stone Furnace"));
    c.add_machine(Machine::new("Iron Smelter").heated(9.0, "Stone Furnace"));
    c.add_machine(Machine::new("Stone Furnace").furnace(4.0, 3));
    c.add_machine(Machine::new("Nursery").plot());

    // Seed plots, only used when an herb has no nutrient cost
    c.add_recipe(
        Recipe::new("Flax", "Planting", 400.0)
            .input("Flax Seed", 1.0)
            .output("Flax", 200.0),
    );
    c.add_recipe(
        Recipe::new("Sage", "Planting", 540.0)
            .input("Sage Seed", 1.0)
            .output("Sage", 180.0),
    );

    c.add_recipe(Recipe::new("Plank", "Table Saw", 2.0).input("Logs", 1.0).output("Plank", 200.0));
    c.add_recipe(
        Recipe::new("Stone", "Stone Crusher", 3.0)
            .input("Limestone", 1.0)
            .output("Stone", 150.0),
    );
    c.add_recipe(
        Recipe::new("Large Wooden Gear", "Grinder", 6.0)
            .input("Plank", 1.0)
            .output("Large Wooden Gear", 1.0),
    );
    c.add_recipe(Recipe::new("Sand", "Grinder", 12.0).input("Stone", 1.0).output("Sand", 1.0));
    c.add_recipe(
        Recipe::new("Flax Fiber", "Grinder", 3.0)
            .input("Flax", 1.0)
            .output("Flax Fiber", 1.0),
    );
    c.add_recipe(
        Recipe::new("Iron Ingot", "Iron Smelter", 6.0)
            .input("Iron Ore", 1.0)
            .output("Iron Ingot", 100.0),
    );
    c.add_recipe(
        Recipe::new("Plant Ash", "Crucible", 3.0)
            .input("Sage", 1.0)
            .output("Plant Ash", 1.0),
    );
    c.add_recipe(
        Recipe::new("Sage Powder", "Grinder", 3.0)
            .input("Sage", 1.0)
            .output("Sage Powder", 1.0),
    );
    c.add_recipe(
        Recipe::new("Healing Potion", "Assembler", 6.0)
            .input("Sage Powder", 6.0)
            .input("Flax Fiber", 6.0)
            .output("Healing Potion", 1.0),
    );
    c.add_recipe(
        Recipe::new("Quicklime", "Crucible", 9.0)
            .input("Stone", 1.0)
            .output("Quicklime", 1.0),
    );
    c.add_recipe(
        Recipe::new("Quicklime Powder", "Grinder", 9.0)
            .input("Quicklime", 1.0)
            .output("Quicklime Powder", 1.0),
    );
    c.add_recipe(
        Recipe::new("Charcoal", "Crucible", 4.0)
            .input("Plank", 1.0)
            .output("Charcoal", 1.0),
    );
    c.add_recipe(
        Recipe::new("Charcoal Powder", "Grinder", 4.0)
            .input("Charcoal", 1.0)
            .output("Charcoal Powder", 1.0),
    );
    c.add_recipe(
        Recipe::new("Linseed Oil", "Extractor", 2.0)
            .input("Flax", 1.0)
            .output("Linseed Oil", 50.0),
    );
    c.add_recipe(
        Recipe::new("Limewater", "Extractor", 3.0)
            .input("Quicklime Powder", 1.0)
            .output("Limewater", 30.0),
    );
    c.add_recipe(
        Recipe::new("Basic Fertilizer", "Assembler", 4.0)
            .input("Plant Ash", 1.0)
            .input("Quicklime Powder", 1.0)
            .output("Basic Fertilizer", 1.0),
    );
    c.add_recipe(
        Recipe::new("Coke", "Athanor", 3.0)
            .input("Charcoal Powder", 6.0)
            .output("Coke", 1.0)
            .failing(0.5, &[("Charcoal", 2.0)]),
    );
    c.add_recipe(
        Recipe::new("Coke Powder", "Grinder", 12.0)
            .input("Coke", 1.0)
            .output("Coke Powder", 1.0),
    );
    c.add_recipe(
        Recipe::new("Steel Ingot", "Athanor", 4.0)
            .input("Iron Ingot", 1.0)
            .input("Coke Powder", 1.0)
            .output("Steel Ingot", 1.0)
            .failing(0.25, &[("Iron Ingot", 1.0)]),
    );
    c.add_recipe(
        Recipe::new("Gloom Fungus", "Table Saw", 10.0)
            .input("Rotten Log", 5.0)
            .output("Gloom Fungus", 1.0)
            .output("Plank", 4.0),
    );
    c.add_recipe(
        Recipe::new("Sulfur", "Iron Smelter", 24.0)
            .input("Pyrite Ore", 4.0)
            .output("Sulfur", 1.0)
            .output("Iron Ingot", 3.0),
    );

    c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_is_valid() {
        let catalog = sample_catalog();
        assert!(catalog.validate().is_ok());
        assert_eq!(catalog.plot_machine(), "Nursery");
        assert!(catalog.item("Flax").unwrap().is_grown_herb());
        assert!(catalog.recipe("Coke").unwrap().success_chance.is_some());
    }

    #[test]
    fn every_recipe_machine_exists() {
        let catalog = sample_catalog();
        for recipe in &catalog.recipes {
            assert!(
                catalog.machine(&recipe.machine).is_some(),
                "{} uses unknown machine {}",
                recipe.id,
                recipe.machine
            );
        }
    }
}
