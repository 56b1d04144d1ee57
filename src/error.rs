//! Engine error types

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CalcError {
    #[error("recipe loop: {item} is needed by its own chain ({})", .path.join(" > "))]
    CyclicRecipe { item: String, path: Vec<String> },

    #[error("heated machine {machine} has no furnace (parent: {parent:?})")]
    MissingFurnace {
        machine: String,
        parent: Option<String>,
    },

    #[error("furnace {furnace} has no slots")]
    InvalidFurnace { furnace: String },

    #[error("recipe {recipe} does not produce {item}")]
    UnknownRecipe { item: String, recipe: String },
}
