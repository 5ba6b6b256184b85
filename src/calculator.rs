//! Ratio balancing across a recipe graph

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use tracing::{debug, warn};

use crate::graph::{GraphError, RecipeGraph};
use crate::models::{RecipeId, Resource};

/// One recipe in a ratio calculation and how many copies of it must run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatioEntry {
    pub recipe: RecipeId,
    pub amount: f64,
    /// Distance from the root recipe along the supplier chain.
    pub depth: usize,
}

/// Work out how many copies of every supplier are needed to keep `amount`
/// copies of `root` running.
///
/// The result lists `root` first, followed by each supplier's own result in
/// binding order. For every supplier the most constraining shared resource
/// decides its amount. Suppliers that make nothing `root` consumes are left
/// out along with their sub-chains. A supplier reachable through several
/// parents appears once per path, so the entry count follows the number of
/// paths and can grow exponentially with stacked diamonds.
pub fn calculate_ratios(
    graph: &RecipeGraph,
    root: RecipeId,
    amount: f64,
) -> Result<Vec<RatioEntry>, GraphError> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(GraphError::InvalidAmount(amount));
    }

    let mut path = Vec::new();
    let mut entries = Vec::new();
    calculate_recursive(graph, root, amount, 0, &mut path, &mut entries)?;
    Ok(entries)
}

fn calculate_recursive(
    graph: &RecipeGraph,
    id: RecipeId,
    amount: f64,
    depth: usize,
    path: &mut Vec<RecipeId>,
    entries: &mut Vec<RatioEntry>,
) -> Result<(), GraphError> {
    let recipe = graph.recipe(id).ok_or(GraphError::RecipeNotFound(id))?;
    if path.contains(&id) {
        warn!(recipe = recipe.name(), "cycle in supplier chain");
        return Err(GraphError::CycleDetected(recipe.name().to_string()));
    }

    debug!(recipe = recipe.name(), amount, depth, "balanced recipe");
    entries.push(RatioEntry {
        recipe: id,
        amount,
        depth,
    });

    let used = per_second(&recipe.inputs, recipe.overclocked_time());

    path.push(id);
    for &child_id in recipe.input_recipes() {
        let child = graph
            .recipe(child_id)
            .ok_or(GraphError::RecipeNotFound(child_id))?;
        let produced = per_second(&child.outputs, child.overclocked_time());

        let Some(child_amount) = required_amount(&used, &produced, amount) else {
            debug!(
                recipe = recipe.name(),
                supplier = child.name(),
                "supplier shares no consumed resource"
            );
            continue;
        };
        calculate_recursive(graph, child_id, child_amount, depth + 1, path, entries)?;
    }
    path.pop();

    Ok(())
}

/// Per-second rate of each resource for one copy of a recipe.
///
/// Entries with a zero amount are left out so they never become a divisor.
fn per_second(resources: &[Resource], cycle_time: f64) -> HashMap<&str, f64> {
    let mut rates = HashMap::new();
    for resource in resources.iter().filter(|r| r.amount > 0) {
        *rates.entry(resource.name.as_str()).or_default() += f64::from(resource.amount) / cycle_time;
    }
    rates
}

/// Copies of a supplier needed to feed `amount` copies of its consumer, or
/// `None` when the two share no resource.
fn required_amount(
    used: &HashMap<&str, f64>,
    produced: &HashMap<&str, f64>,
    amount: f64,
) -> Option<f64> {
    used.iter()
        .filter_map(|(name, used_rate)| {
            produced
                .get(name)
                .map(|produced_rate| used_rate / produced_rate * amount)
        })
        .reduce(f64::max)
}

/// Format a ratio calculation as an indented tree
pub fn format_ratio_tree(graph: &RecipeGraph, entries: &[RatioEntry]) -> String {
    let mut output = String::new();
    for entry in entries {
        let Some(recipe) = graph.recipe(entry.recipe) else {
            continue;
        };
        output.push_str(&format!(
            "{}{:.2}x {}\n",
            "  ".repeat(entry.depth),
            entry.amount,
            recipe.name()
        ));
    }
    output
}

/// Totals of a ratio calculation
#[derive(Debug)]
pub struct RatioSummary {
    pub root: String,
    pub amount: f64,
    /// Machines per recipe, summed over every path that reaches it.
    pub recipe_counts: Vec<(String, f64)>,
    /// Per-second demand for inputs that no bound supplier produces.
    pub raw_inputs: Vec<(String, f64)>,
}

/// Merge a ratio calculation into per-recipe totals
pub fn summarize_ratios(graph: &RecipeGraph, entries: &[RatioEntry]) -> RatioSummary {
    let mut recipe_counts: BTreeMap<String, f64> = BTreeMap::new();
    let mut raw_inputs: BTreeMap<String, f64> = BTreeMap::new();

    for entry in entries {
        let Some(recipe) = graph.recipe(entry.recipe) else {
            continue;
        };
        *recipe_counts.entry(recipe.name().to_string()).or_default() += entry.amount;

        let supplied = |name: &str| {
            recipe.input_recipes().iter().any(|supplier| {
                graph.recipe(*supplier).is_some_and(|s| {
                    s.outputs.iter().any(|out| out.name == name && out.amount > 0)
                })
            })
        };
        for (name, rate) in per_second(&recipe.inputs, recipe.overclocked_time()) {
            if !supplied(name) {
                *raw_inputs.entry(name.to_string()).or_default() += rate * entry.amount;
            }
        }
    }

    let (root, amount) = entries
        .first()
        .and_then(|entry| {
            graph
                .recipe(entry.recipe)
                .map(|recipe| (recipe.name().to_string(), entry.amount))
        })
        .unwrap_or_default();

    RatioSummary {
        root,
        amount,
        recipe_counts: recipe_counts.into_iter().collect(),
        raw_inputs: raw_inputs.into_iter().collect(),
    }
}

impl fmt::Display for RatioSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Ratio Summary ===")?;
        writeln!(f, "Target: {:.2}x {}", self.amount, self.root)?;
        writeln!(f)?;

        writeln!(f, "Machines required:")?;
        for (name, count) in &self.recipe_counts {
            writeln!(f, "  {:.2}x {}", count, name)?;
        }

        if !self.raw_inputs.is_empty() {
            writeln!(f)?;
            writeln!(f, "Raw inputs required:")?;
            for (name, rate) in &self.raw_inputs {
                writeln!(f, "  {} @ {:.3}/s", name, rate)?;
            }
        }

        Ok(())
    }
}
