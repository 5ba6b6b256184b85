//! Recipe graph: owns every recipe and the supplier edges between them

use std::collections::{BTreeSet, HashMap, HashSet};

use slotmap::SlotMap;
use tracing::{debug, warn};

use crate::models::{Recipe, RecipeError, RecipeId, VoltageTier};

/// Errors raised by structural graph operations and the ratio calculator.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("a recipe named '{0}' already exists")]
    DuplicateName(String),
    #[error("recipe not found: {0:?}")]
    RecipeNotFound(RecipeId),
    #[error("cycle detected in recipe graph at '{0}'")]
    CycleDetected(String),
    #[error("amount must be a positive number, got {0}")]
    InvalidAmount(f64),
    #[error(transparent)]
    Recipe(#[from] RecipeError),
}

/// Every recipe known to the calculator, keyed by a stable [`RecipeId`].
///
/// An edge `consumer -> supplier` means the consumer uses something the
/// supplier makes. Names are unique, so name lookups are never ambiguous.
#[derive(Debug, Clone, Default)]
pub struct RecipeGraph {
    recipes: SlotMap<RecipeId, Recipe>,
    /// Insertion order, used for listing.
    order: Vec<RecipeId>,
    by_name: HashMap<String, RecipeId>,
}

impl RecipeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a recipe, rejecting a second recipe with the same name.
    ///
    /// The recipe arrives without suppliers: edges carried over from another
    /// graph would name IDs that mean nothing here, so they are dropped and
    /// must be bound again with [`bind_input_recipe`](Self::bind_input_recipe).
    pub fn add_recipe(&mut self, mut recipe: Recipe) -> Result<RecipeId, GraphError> {
        if self.by_name.contains_key(recipe.name()) {
            warn!(name = recipe.name(), "rejected duplicate recipe");
            return Err(GraphError::DuplicateName(recipe.name().to_string()));
        }
        recipe.input_recipes.clear();
        let name = recipe.name().to_string();
        let id = self.recipes.insert(recipe);
        self.order.push(id);
        debug!(%name, "added recipe");
        self.by_name.insert(name, id);
        Ok(id)
    }

    /// Remove a recipe and every edge pointing at it.
    ///
    /// Returns `false` if the recipe was not in the graph.
    pub fn remove_recipe(&mut self, id: RecipeId) -> bool {
        for recipe in self.recipes.values_mut() {
            recipe.unbind_input_recipe(id);
        }
        let Some(recipe) = self.recipes.remove(id) else {
            return false;
        };
        self.order.retain(|other| *other != id);
        self.by_name.remove(recipe.name());
        debug!(name = recipe.name(), "removed recipe");
        true
    }

    /// Record that `consumer` takes inputs from `supplier`.
    ///
    /// Binding the same pair twice is a no-op; the returned flag says whether
    /// a new edge was created. Self-loops are allowed here and surface as
    /// [`GraphError::CycleDetected`] during ratio calculation.
    pub fn bind_input_recipe(
        &mut self,
        consumer: RecipeId,
        supplier: RecipeId,
    ) -> Result<bool, GraphError> {
        if !self.recipes.contains_key(supplier) {
            return Err(GraphError::RecipeNotFound(supplier));
        }
        let recipe = self
            .recipes
            .get_mut(consumer)
            .ok_or(GraphError::RecipeNotFound(consumer))?;
        let added = recipe.bind_input_recipe(supplier);
        if added {
            debug!(consumer = recipe.name(), "bound input recipe");
        }
        Ok(added)
    }

    /// Drop the edge `consumer -> supplier`, returning whether it existed.
    pub fn unbind_input_recipe(&mut self, consumer: RecipeId, supplier: RecipeId) -> bool {
        self.recipes
            .get_mut(consumer)
            .is_some_and(|recipe| recipe.unbind_input_recipe(supplier))
    }

    /// Replace a recipe's voltages and time, validating them first.
    pub fn edit_recipe(
        &mut self,
        id: RecipeId,
        machine_voltage: VoltageTier,
        recipe_voltage: VoltageTier,
        time_s: f64,
    ) -> Result<(), GraphError> {
        let recipe = self
            .recipes
            .get_mut(id)
            .ok_or(GraphError::RecipeNotFound(id))?;
        recipe.edit(machine_voltage, recipe_voltage, time_s)?;
        Ok(())
    }

    pub fn contains_recipe(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn get_recipe(&self, name: &str) -> Option<&Recipe> {
        self.by_name.get(name).and_then(|id| self.recipes.get(*id))
    }

    pub fn recipe_id(&self, name: &str) -> Option<RecipeId> {
        self.by_name.get(name).copied()
    }

    pub fn recipe(&self, id: RecipeId) -> Option<&Recipe> {
        self.recipes.get(id)
    }

    /// Mutable access for editing resource lists. The name stays fixed.
    pub fn recipe_mut(&mut self, id: RecipeId) -> Option<&mut Recipe> {
        self.recipes.get_mut(id)
    }

    /// All recipes in insertion order.
    pub fn recipes(&self) -> impl Iterator<Item = (RecipeId, &Recipe)> {
        self.order
            .iter()
            .filter_map(|id| self.recipes.get(*id).map(|recipe| (*id, recipe)))
    }

    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }

    /// Depth-first, pre-order walk over everything reachable from `root`.
    ///
    /// Suppliers are followed in binding order and each recipe appears once,
    /// so shared sub-chains and cycles are listed a single time.
    pub fn traverse(&self, root: RecipeId) -> Vec<RecipeId> {
        let mut visited = HashSet::new();
        let mut out = Vec::new();
        self.traverse_from(root, &mut visited, &mut out);
        out
    }

    fn traverse_from(
        &self,
        id: RecipeId,
        visited: &mut HashSet<RecipeId>,
        out: &mut Vec<RecipeId>,
    ) {
        let Some(recipe) = self.recipes.get(id) else {
            return;
        };
        if !visited.insert(id) {
            return;
        }
        out.push(id);
        for supplier in recipe.input_recipes() {
            self.traverse_from(*supplier, visited, out);
        }
    }

    /// Distinct resource names used anywhere in the graph, sorted.
    pub fn resource_names(&self) -> BTreeSet<String> {
        self.recipes
            .values()
            .flat_map(|recipe| recipe.inputs.iter().chain(recipe.outputs.iter()))
            .map(|resource| resource.name.clone())
            .collect()
    }

    /// Rename a resource in every input and output list.
    ///
    /// Returns the number of resource entries rewritten.
    pub fn rename_resource(&mut self, old: &str, new: &str) -> usize {
        let mut renamed = 0;
        for recipe in self.recipes.values_mut() {
            for resource in recipe.inputs.iter_mut().chain(recipe.outputs.iter_mut()) {
                if resource.name == old {
                    resource.name = new.to_string();
                    renamed += 1;
                }
            }
        }
        debug!(old, new, renamed, "renamed resource");
        renamed
    }
}
