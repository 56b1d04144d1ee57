//! Recipe selection among alternatives, and recipe loop checks

use std::collections::{BTreeMap, BTreeSet};

use crate::error::CalcError;
use crate::models::{Catalog, Recipe};

/// Picks the active recipe for an item from the catalog and preferences
#[derive(Debug, Clone, Copy)]
pub struct RecipeSelector<'a> {
    catalog: &'a Catalog,
    preferred: &'a BTreeMap<String, String>,
}

/// A candidate recipe as offered for swapping
#[derive(Debug, Clone)]
pub struct RecipeOption<'a> {
    pub recipe: &'a Recipe,
    pub active: bool,
    /// Item that would make this recipe loop back into the chain
    pub conflict: Option<String>,
}

impl<'a> RecipeSelector<'a> {
    pub fn new(catalog: &'a Catalog, preferred: &'a BTreeMap<String, String>) -> Self {
        Self { catalog, preferred }
    }

    /// All recipes producing `item`, in catalog order
    pub fn recipes_for(&self, item: &str) -> Vec<&'a Recipe> {
        self.catalog
            .recipes
            .iter()
            .filter(|r| r.produces(item))
            .collect()
    }

    pub fn active_recipe(&self, item: &str) -> Option<&'a Recipe> {
        let candidates = self.recipes_for(item);
        match candidates.as_slice() {
            [] => None,
            [only] => Some(*only),
            [first, ..] => self
                .preferred
                .get(item)
                .and_then(|id| candidates.iter().find(|r| &r.id == id))
                .or(Some(first))
                .copied(),
        }
    }

    /// Check that `recipe_id` can be preferred for `item`
    pub fn validate_preference(&self, item: &str, recipe_id: &str) -> Result<(), CalcError> {
        match self.catalog.recipe(recipe_id) {
            Some(recipe) if recipe.produces(item) => Ok(()),
            _ => Err(CalcError::UnknownRecipe {
                item: item.to_string(),
                recipe: recipe_id.to_string(),
            }),
        }
    }

    /// Candidates for `item` with the loop each would create under `ancestors`
    pub fn options(&self, item: &str, ancestors: &[String]) -> Vec<RecipeOption<'a>> {
        let active = self.active_recipe(item).map(|r| r.id.as_str());
        self.recipes_for(item)
            .into_iter()
            .map(|recipe| {
                let looping_input = recipe
                    .inputs
                    .iter()
                    .find(|i| i.item == item || ancestors.contains(&i.item));
                let looping_output = recipe
                    .outputs
                    .iter()
                    .find(|o| o.item != item && ancestors.contains(&o.item));

                RecipeOption {
                    recipe,
                    active: active == Some(recipe.id.as_str()),
                    conflict: looping_input.or(looping_output).map(|q| q.item.clone()),
                }
            })
            .collect()
    }

    /// Walk the active recipe graph from `item` and reject any loop
    pub fn check_acyclic(&self, item: &str) -> Result<(), CalcError> {
        let mut path = Vec::new();
        let mut verified = BTreeSet::new();
        self.visit(item, &mut path, &mut verified)
    }

    fn visit(
        &self,
        item: &str,
        path: &mut Vec<String>,
        verified: &mut BTreeSet<String>,
    ) -> Result<(), CalcError> {
        if verified.contains(item) {
            return Ok(());
        }
        if path.iter().any(|p| p == item) {
            let mut cycle = path.clone();
            cycle.push(item.to_string());
            return Err(CalcError::CyclicRecipe {
                item: item.to_string(),
                path: cycle,
            });
        }
        // Grown herbs are never expanded further
        if self.catalog.item(item).is_some_and(|i| i.is_grown_herb()) {
            verified.insert(item.to_string());
            return Ok(());
        }

        if let Some(recipe) = self.active_recipe(item) {
            path.push(item.to_string());
            for input in &recipe.inputs {
                self.visit(&input.item, path, verified)?;
            }
            path.pop();
        }
        verified.insert(item.to_string());
        Ok(())
    }
}
