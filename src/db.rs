//! Database schema and operations

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension};
use tracing::info;

use crate::models::{Catalog, Item, Machine, Preferences, Quantity, Recipe, UpgradeLevels};

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS items (
            name TEXT PRIMARY KEY,
            category TEXT,
            buy_price REAL,
            sell_price REAL,
            heat REAL,
            nutrient_cost REAL,
            nutrient_value REAL,
            max_fertility REAL,
            liquid INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS machines (
            name TEXT PRIMARY KEY,
            heat_cost REAL NOT NULL DEFAULT 0,
            parent TEXT,
            slots_required INTEGER,
            heat_self REAL NOT NULL DEFAULT 0,
            slots INTEGER,
            extraction INTEGER NOT NULL DEFAULT 0,
            fertility INTEGER NOT NULL DEFAULT 0
        );

        -- seq keeps catalog order, which picks the default recipe
        CREATE TABLE IF NOT EXISTS recipes (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT NOT NULL UNIQUE,
            machine TEXT NOT NULL,
            base_time REAL NOT NULL,
            success_chance REAL
        );

        CREATE TABLE IF NOT EXISTS recipe_inputs (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            recipe_id TEXT NOT NULL,
            item TEXT NOT NULL,
            qty REAL NOT NULL
        );

        CREATE TABLE IF NOT EXISTS recipe_outputs (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            recipe_id TEXT NOT NULL,
            item TEXT NOT NULL,
            qty REAL NOT NULL
        );

        CREATE TABLE IF NOT EXISTS recipe_failures (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            recipe_id TEXT NOT NULL,
            item TEXT NOT NULL,
            qty REAL NOT NULL
        );

        -- User preferences
        CREATE TABLE IF NOT EXISTS preferred_recipes (
            item TEXT PRIMARY KEY,
            recipe_id TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS recycle_paths (
            path TEXT PRIMARY KEY
        );

        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_recipe_inputs_recipe ON recipe_inputs(recipe_id);
        CREATE INDEX IF NOT EXISTS idx_recipe_outputs_recipe ON recipe_outputs(recipe_id);
        CREATE INDEX IF NOT EXISTS idx_recipe_outputs_item ON recipe_outputs(item);
        "#,
    )?;
    Ok(())
}

/// Clear the catalog tables, keeping user preferences
pub fn clear_catalog(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        DELETE FROM recipe_failures;
        DELETE FROM recipe_outputs;
        DELETE FROM recipe_inputs;
        DELETE FROM recipes;
        DELETE FROM machines;
        DELETE FROM items;
        "#,
    )?;
    Ok(())
}

/// Insert or replace an item
pub fn upsert_item(conn: &Connection, item: &Item) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO items
            (name, category, buy_price, sell_price, heat,
             nutrient_cost, nutrient_value, max_fertility, liquid)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        (
            &item.name,
            &item.category,
            item.buy_price,
            item.sell_price,
            item.heat,
            item.nutrient_cost,
            item.nutrient_value,
            item.max_fertility,
            item.liquid,
        ),
    )?;
    Ok(())
}

/// Insert or replace a machine
pub fn upsert_machine(conn: &Connection, machine: &Machine) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO machines
            (name, heat_cost, parent, slots_required, heat_self, slots, extraction, fertility)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        (
            &machine.name,
            machine.heat_cost,
            &machine.parent,
            machine.slots_required,
            machine.heat_self,
            machine.slots,
            machine.extraction,
            machine.fertility,
        ),
    )?;
    Ok(())
}

/// Insert a recipe with its inputs, outputs and failure outputs
pub fn insert_recipe(conn: &Connection, recipe: &Recipe) -> Result<()> {
    conn.execute(
        "INSERT INTO recipes (id, machine, base_time, success_chance) VALUES (?1, ?2, ?3, ?4)",
        (
            &recipe.id,
            &recipe.machine,
            recipe.base_time,
            recipe.success_chance,
        ),
    )
    .with_context(|| format!("inserting recipe {}", recipe.id))?;

    for (table, quantities) in [
        ("recipe_inputs", &recipe.inputs),
        ("recipe_outputs", &recipe.outputs),
        ("recipe_failures", &recipe.failures),
    ] {
        let sql = format!("INSERT INTO {table} (recipe_id, item, qty) VALUES (?1, ?2, ?3)");
        for q in quantities {
            conn.execute(&sql, (&recipe.id, &q.item, q.qty))?;
        }
    }
    Ok(())
}

/// Replace the stored catalog
pub fn store_catalog(conn: &Connection, catalog: &Catalog) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    clear_catalog(&tx)?;
    for item in catalog.items.values() {
        upsert_item(&tx, item)?;
    }
    for machine in catalog.machines.values() {
        upsert_machine(&tx, machine)?;
    }
    for recipe in &catalog.recipes {
        insert_recipe(&tx, recipe)?;
    }
    tx.commit()?;

    info!(
        items = catalog.items.len(),
        machines = catalog.machines.len(),
        recipes = catalog.recipes.len(),
        "stored catalog"
    );
    Ok(())
}

/// Load the whole catalog, recipes in insertion order
pub fn load_catalog(conn: &Connection) -> Result<Catalog> {
    let mut catalog = Catalog::default();

    let mut stmt = conn.prepare(
        "SELECT name, category, buy_price, sell_price, heat,
                nutrient_cost, nutrient_value, max_fertility, liquid
         FROM items",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(Item {
            name: row.get(0)?,
            category: row.get(1)?,
            buy_price: row.get(2)?,
            sell_price: row.get(3)?,
            heat: row.get(4)?,
            nutrient_cost: row.get(5)?,
            nutrient_value: row.get(6)?,
            max_fertility: row.get(7)?,
            liquid: row.get(8)?,
        })
    })?;
    for row in rows {
        catalog.add_item(row?);
    }

    let mut stmt = conn.prepare(
        "SELECT name, heat_cost, parent, slots_required, heat_self, slots, extraction, fertility
         FROM machines",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(Machine {
            name: row.get(0)?,
            heat_cost: row.get(1)?,
            parent: row.get(2)?,
            slots_required: row.get(3)?,
            heat_self: row.get(4)?,
            slots: row.get(5)?,
            extraction: row.get(6)?,
            fertility: row.get(7)?,
        })
    })?;
    for row in rows {
        catalog.add_machine(row?);
    }

    let mut stmt =
        conn.prepare("SELECT id, machine, base_time, success_chance FROM recipes ORDER BY seq")?;
    let rows = stmt.query_map([], |row| {
        Ok(Recipe {
            id: row.get(0)?,
            machine: row.get(1)?,
            base_time: row.get(2)?,
            inputs: Vec::new(),
            outputs: Vec::new(),
            success_chance: row.get(3)?,
            failures: Vec::new(),
        })
    })?;
    for row in rows {
        let mut recipe = row?;
        recipe.inputs = get_quantities(conn, "recipe_inputs", &recipe.id)?;
        recipe.outputs = get_quantities(conn, "recipe_outputs", &recipe.id)?;
        recipe.failures = get_quantities(conn, "recipe_failures", &recipe.id)?;
        catalog.add_recipe(recipe);
    }

    Ok(catalog)
}

fn get_quantities(conn: &Connection, table: &str, recipe_id: &str) -> Result<Vec<Quantity>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT item, qty FROM {table} WHERE recipe_id = ?1 ORDER BY seq"
    ))?;
    let rows = stmt.query_map([recipe_id], |row| {
        Ok(Quantity {
            item: row.get(0)?,
            qty: row.get(1)?,
        })
    })?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

/// Remember which recipe to use for an item
pub fn set_preferred_recipe(conn: &Connection, item: &str, recipe_id: &str) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO preferred_recipes (item, recipe_id) VALUES (?1, ?2)",
        (item, recipe_id),
    )?;
    info!(item, recipe = recipe_id, "preferred recipe set");
    Ok(())
}

/// Flip a recycle path, returning whether it is now active
pub fn toggle_recycle_path(conn: &Connection, path: &str) -> Result<bool> {
    let removed = conn.execute("DELETE FROM recycle_paths WHERE path = ?1", [path])?;
    if removed == 0 {
        conn.execute("INSERT INTO recycle_paths (path) VALUES (?1)", [path])?;
    }
    let active = removed == 0;
    info!(path, active, "recycle path toggled");
    Ok(active)
}

pub fn set_setting(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO settings (key, value) VALUES (?1, ?2)",
        (key, value),
    )?;
    Ok(())
}

pub fn get_setting(conn: &Connection, key: &str) -> Result<Option<String>> {
    let value = conn
        .query_row("SELECT value FROM settings WHERE key = ?1", [key], |row| {
            row.get(0)
        })
        .optional()?;
    Ok(value)
}

const LEVEL_KEYS: [&str; 5] = [
    "belt_level",
    "speed_level",
    "alchemy_level",
    "fuel_level",
    "fertilizer_level",
];

/// Store upgrade levels as settings
pub fn store_levels(conn: &Connection, levels: &UpgradeLevels) -> Result<()> {
    let values = [
        levels.belt,
        levels.speed,
        levels.alchemy,
        levels.fuel,
        levels.fertilizer,
    ];
    for (key, value) in LEVEL_KEYS.iter().zip(values) {
        set_setting(conn, key, &value.to_string())?;
    }
    info!(?levels, "upgrade levels stored");
    Ok(())
}

fn get_level(conn: &Connection, key: &str) -> Result<u32> {
    match get_setting(conn, key)? {
        Some(value) => value
            .parse()
            .with_context(|| format!("setting {key} is not a level: {value:?}")),
        None => Ok(0),
    }
}

/// Load preferred recipes, recycle paths and stored settings
pub fn load_preferences(conn: &Connection) -> Result<Preferences> {
    let mut prefs = Preferences::default();

    let mut stmt = conn.prepare("SELECT item, recipe_id FROM preferred_recipes")?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get(1)?)))?;
    for row in rows {
        let (item, recipe) = row?;
        prefs.preferred_recipes.insert(item, recipe);
    }

    let mut stmt = conn.prepare("SELECT path FROM recycle_paths")?;
    prefs.recycle = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<_>>()?;

    prefs.levels = UpgradeLevels {
        belt: get_level(conn, "belt_level")?,
        speed: get_level(conn, "speed_level")?,
        alchemy: get_level(conn, "alchemy_level")?,
        fuel: get_level(conn, "fuel_level")?,
        fertilizer: get_level(conn, "fertilizer_level")?,
    };
    if let Some(fuel) = get_setting(conn, "default_fuel")? {
        prefs.default_fuel = fuel;
    }
    if let Some(fertilizer) = get_setting(conn, "default_fertilizer")? {
        prefs.default_fertilizer = fertilizer;
    }

    Ok(prefs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::sample_catalog;

    fn open() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    #[test]
    fn catalog_survives_storage() {
        let conn = open();
        let catalog = sample_catalog();
        store_catalog(&conn, &catalog).unwrap();

        let loaded = load_catalog(&conn).unwrap();
        assert_eq!(loaded.items, catalog.items);
        assert_eq!(loaded.machines, catalog.machines);
        assert_eq!(loaded.recipes, catalog.recipes);
    }

    #[test]
    fn recipe_order_is_kept() {
        let conn = open();
        let mut catalog = Catalog::default();
        catalog.add_recipe(Recipe::new("Zinc Plank", "Table Saw", 2.0).output("Plank", 1.0));
        catalog.add_recipe(Recipe::new("Ash Plank", "Table Saw", 2.0).output("Plank", 1.0));
        store_catalog(&conn, &catalog).unwrap();

        let ids: Vec<String> = load_catalog(&conn)
            .unwrap()
            .recipes
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, ["Zinc Plank", "Ash Plank"]);
    }

    #[test]
    fn storing_again_replaces_catalog() {
        let conn = open();
        store_catalog(&conn, &sample_catalog()).unwrap();
        let mut small = Catalog::default();
        small.add_item(Item::new("Logs", "Raw Materials").buy(200.0));
        store_catalog(&conn, &small).unwrap();

        let loaded = load_catalog(&conn).unwrap();
        assert_eq!(loaded.items.len(), 1);
        assert!(loaded.recipes.is_empty());
    }

    #[test]
    fn preferences_default_when_empty() {
        let conn = open();
        let prefs = load_preferences(&conn).unwrap();
        assert_eq!(prefs, Preferences::default());
    }

    #[test]
    fn preferences_are_persisted() {
        let conn = open();
        set_preferred_recipe(&conn, "Plank", "Gloom Fungus").unwrap();
        assert!(toggle_recycle_path(&conn, "Coke>Charcoal Powder>Charcoal").unwrap());
        assert!(toggle_recycle_path(&conn, "Steel Ingot>Iron Ingot").unwrap());
        assert!(!toggle_recycle_path(&conn, "Steel Ingot>Iron Ingot").unwrap());
        store_levels(
            &conn,
            &UpgradeLevels {
                belt: 3,
                speed: 2,
                alchemy: 1,
                fuel: 10,
                fertilizer: 4,
            },
        )
        .unwrap();
        set_setting(&conn, "default_fuel", "Charcoal").unwrap();

        let prefs = load_preferences(&conn).unwrap();
        assert_eq!(prefs.preferred_recipes["Plank"], "Gloom Fungus");
        assert!(prefs.recycle.is_active("Coke>Charcoal Powder>Charcoal"));
        assert!(!prefs.recycle.is_active("Steel Ingot>Iron Ingot"));
        assert_eq!(prefs.levels.fuel, 10);
        assert_eq!(prefs.levels.belt, 3);
        assert_eq!(prefs.default_fuel, "Charcoal");
        assert_eq!(prefs.default_fertilizer, "Basic Fertilizer");
    }

    #[test]
    fn bad_level_setting_is_an_error() {
        let conn = open();
        set_setting(&conn, "speed_level", "fast").unwrap();
        assert!(load_preferences(&conn).is_err());
    }
}
