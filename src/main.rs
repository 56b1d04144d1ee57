//! Alchemy Factory Production Calculator
//!
//! A production chain calculator for Alchemy Factory.

use std::path::PathBuf;

use alchemy_calculator::db;
use alchemy_calculator::models::Quantity;
use alchemy_calculator::sample::sample_catalog;
use alchemy_calculator::selector::RecipeSelector;
use alchemy_calculator::summary::format_tree;
use alchemy_calculator::{CalcRequest, Calculator};
use anyhow::Result;
use clap::{Parser, Subcommand};
use rusqlite::Connection;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "alchemy-calculator")]
#[command(about = "Production chain calculator for Alchemy Factory")]
struct Cli {
    /// Path to the SQLite database
    #[arg(short, long, default_value = "alchemy_data.db")]
    database: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Calculate production chain for a target item
    Calc {
        /// Target item to produce (e.g., "Coke", "Healing Potion")
        item: String,

        /// Target production rate in items/min
        #[arg(short, long, default_value = "60.0")]
        rate: f64,

        /// Fuel item burned by furnaces (defaults to the stored setting)
        #[arg(long)]
        fuel: Option<String>,

        /// Fertilizer item used by plots (defaults to the stored setting)
        #[arg(long)]
        fertilizer: Option<String>,

        /// Produce the fuel inside the factory
        #[arg(long)]
        self_feed: bool,

        /// Produce the fertilizer inside the factory
        #[arg(long)]
        self_fert: bool,

        #[arg(long)]
        belt: Option<u32>,

        #[arg(long)]
        speed: Option<u32>,

        #[arg(long)]
        alchemy: Option<u32>,

        #[arg(long)]
        fuel_level: Option<u32>,

        #[arg(long)]
        fert_level: Option<u32>,

        /// Ignore the belt throughput cap
        #[arg(long)]
        unlimited_belt: bool,

        /// Show detailed production tree
        #[arg(short, long)]
        verbose: bool,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },

    /// List all items in the database
    ListItems,

    /// List all machines in the database
    ListMachines,

    /// Show the recipes that produce an item
    Recipes {
        item: String,

        /// Items above this one in the tree, used to flag loops
        #[arg(long, value_delimiter = ',')]
        ancestors: Vec<String>,
    },

    /// Use a specific recipe for an item
    Prefer { item: String, recipe: String },

    /// Toggle recycling for a tree path such as "Coke>Charcoal Powder>Charcoal"
    Recycle { path: String },

    /// Store upgrade levels and default fuel/fertilizer
    Levels {
        #[arg(long)]
        belt: Option<u32>,

        #[arg(long)]
        speed: Option<u32>,

        #[arg(long)]
        alchemy: Option<u32>,

        #[arg(long)]
        fuel_level: Option<u32>,

        #[arg(long)]
        fert_level: Option<u32>,

        #[arg(long)]
        fuel: Option<String>,

        #[arg(long)]
        fertilizer: Option<String>,
    },

    /// Show stored preferences
    Settings,

    /// Initialize empty database with schema
    Init,

    /// Load sample data for testing (without a full catalog)
    LoadSample,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let conn = Connection::open(&cli.database)?;
    db::init_schema(&conn)?;

    match cli.command {
        Commands::Calc {
            item,
            rate,
            fuel,
            fertilizer,
            self_feed,
            self_fert,
            belt,
            speed,
            alchemy,
            fuel_level,
            fert_level,
            unlimited_belt,
            verbose,
            json,
        } => {
            let catalog = db::load_catalog(&conn)?;
            if catalog.items.is_empty() && catalog.recipes.is_empty() {
                println!("No catalog in database. Run 'load-sample' first.");
                return Ok(());
            }
            let prefs = db::load_preferences(&conn)?;

            let mut request = CalcRequest::new(&item, rate, &prefs);
            if let Some(fuel) = fuel {
                request.fuel = fuel;
            }
            if let Some(fertilizer) = fertilizer {
                request.fertilizer = fertilizer;
            }
            request.self_feed = self_feed;
            request.self_fert = self_fert;
            request.unlimited_belt = unlimited_belt;
            let levels = &mut request.levels;
            levels.belt = belt.unwrap_or(levels.belt);
            levels.speed = speed.unwrap_or(levels.speed);
            levels.alchemy = alchemy.unwrap_or(levels.alchemy);
            levels.fuel = fuel_level.unwrap_or(levels.fuel);
            levels.fertilizer = fert_level.unwrap_or(levels.fertilizer);

            let result = Calculator::new(&catalog, &prefs).compute(&request)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
                return Ok(());
            }
            if result.is_empty() {
                println!("Nothing to produce for '{}' at {}/min", item, rate);
                return Ok(());
            }

            if verbose {
                println!("Production chain:\n");
                for tree in [&result.primary, &result.fertilizer_module, &result.fuel_module]
                    .into_iter()
                    .flatten()
                {
                    println!("{}", format_tree(tree, 0));
                }
            }

            if let Some(fuel) = result.absorbed_fuel {
                println!(
                    "{} also covers its own fuel: {:.2}/min on top of the target",
                    result.target, fuel
                );
            }
            if let Some(fertilizer) = result.absorbed_fertilizer {
                println!(
                    "{} also covers its own fertilizer: {:.2}/min on top of the target",
                    result.target, fertilizer
                );
            }
            if !result.convergence.converged {
                println!(
                    "Warning: self-feed demand still moving after {} iterations",
                    result.convergence.iterations
                );
            }
            println!("{}", result.summary);
        }

        Commands::ListItems => {
            let catalog = db::load_catalog(&conn)?;
            if catalog.items.is_empty() {
                println!("No items in database. Run 'load-sample' first.");
            } else {
                println!("{:<24} {:<16} {:>10} {:>10}", "Item", "Category", "Buy", "Sell");
                println!("{}", "-".repeat(63));
                for i in catalog.items.values() {
                    println!(
                        "{:<24} {:<16} {:>10} {:>10}",
                        i.name,
                        i.category.as_deref().unwrap_or("-"),
                        i.buy_price.map(|p| p.to_string()).unwrap_or_default(),
                        i.sell_price.map(|p| p.to_string()).unwrap_or_default()
                    );
                }
            }
        }

        Commands::ListMachines => {
            let catalog = db::load_catalog(&conn)?;
            if catalog.machines.is_empty() {
                println!("No machines in database. Run 'load-sample' first.");
            } else {
                println!("{:<20} {:>10} {:<16}", "Machine", "Heat (/s)", "Furnace");
                println!("{}", "-".repeat(48));
                for m in catalog.machines.values() {
                    let housing = match (&m.parent, m.slots) {
                        (Some(parent), _) => parent.clone(),
                        (None, Some(slots)) => format!("{} slots", slots),
                        (None, None) => String::new(),
                    };
                    println!("{:<20} {:>10.1} {:<16}", m.name, m.heat_cost, housing);
                }
            }
        }

        Commands::Recipes { item, ancestors } => {
            let catalog = db::load_catalog(&conn)?;
            let prefs = db::load_preferences(&conn)?;
            let selector = RecipeSelector::new(&catalog, &prefs.preferred_recipes);

            let options = selector.options(&item, &ancestors);
            if options.is_empty() {
                println!("No recipe produces '{}'; it is bought or grown", item);
            }
            for option in options {
                let r = option.recipe;
                println!(
                    "{} {} [{}, {}s]: {} -> {}",
                    if option.active { "*" } else { " " },
                    r.id,
                    r.machine,
                    r.base_time,
                    format_quantities(&r.inputs),
                    format_quantities(&r.outputs)
                );
                if let Some(chance) = r.success_chance {
                    println!(
                        "    success {:.0}%, on failure: {}",
                        chance * 100.0,
                        format_quantities(&r.failures)
                    );
                }
                if let Some(conflict) = option.conflict {
                    println!("    loops back through {}", conflict);
                }
            }
        }

        Commands::Prefer { item, recipe } => {
            let catalog = db::load_catalog(&conn)?;
            let prefs = db::load_preferences(&conn)?;
            RecipeSelector::new(&catalog, &prefs.preferred_recipes)
                .validate_preference(&item, &recipe)?;
            db::set_preferred_recipe(&conn, &item, &recipe)?;
            println!("{} now uses recipe {}", item, recipe);
        }

        Commands::Recycle { path } => {
            let active = db::toggle_recycle_path(&conn, &path)?;
            println!(
                "Recycling {} for {}",
                if active { "enabled" } else { "disabled" },
                path
            );
        }

        Commands::Levels {
            belt,
            speed,
            alchemy,
            fuel_level,
            fert_level,
            fuel,
            fertilizer,
        } => {
            let mut levels = db::load_preferences(&conn)?.levels;
            levels.belt = belt.unwrap_or(levels.belt);
            levels.speed = speed.unwrap_or(levels.speed);
            levels.alchemy = alchemy.unwrap_or(levels.alchemy);
            levels.fuel = fuel_level.unwrap_or(levels.fuel);
            levels.fertilizer = fert_level.unwrap_or(levels.fertilizer);
            db::store_levels(&conn, &levels)?;

            if let Some(fuel) = fuel {
                db::set_setting(&conn, "default_fuel", &fuel)?;
            }
            if let Some(fertilizer) = fertilizer {
                db::set_setting(&conn, "default_fertilizer", &fertilizer)?;
            }
            println!("Settings saved.");
        }

        Commands::Settings => {
            let prefs = db::load_preferences(&conn)?;
            let l = prefs.levels;
            println!(
                "Levels: belt {}, speed {}, alchemy {}, fuel {}, fertilizer {}",
                l.belt, l.speed, l.alchemy, l.fuel, l.fertilizer
            );
            println!("Fuel: {}", prefs.default_fuel);
            println!("Fertilizer: {}", prefs.default_fertilizer);
            if !prefs.preferred_recipes.is_empty() {
                println!("Preferred recipes:");
                for (item, recipe) in &prefs.preferred_recipes {
                    println!("  {} -> {}", item, recipe);
                }
            }
            let paths: Vec<&str> = prefs.recycle.paths().collect();
            if !paths.is_empty() {
                println!("Recycling:");
                for path in paths {
                    println!("  {}", path);
                }
            }
        }

        Commands::Init => {
            println!("Database initialized at: {}", cli.database.display());
        }

        Commands::LoadSample => {
            let catalog = sample_catalog();
            db::store_catalog(&conn, &catalog)?;
            println!(
                "Loaded {} items, {} machines and {} recipes",
                catalog.items.len(),
                catalog.machines.len(),
                catalog.recipes.len()
            );
        }
    }

    Ok(())
}

fn format_quantities(quantities: &[Quantity]) -> String {
    quantities
        .iter()
        .map(|q| format!("{} {}", q.qty, q.item))
        .collect::<Vec<_>>()
        .join(" + ")
}
