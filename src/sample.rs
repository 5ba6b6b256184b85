//! A small steel chain for trying the calculator without entering recipes

use crate::graph::{GraphError, RecipeGraph};
use crate::models::{Recipe, Resource, VoltageTier};

fn recipe(
    name: &str,
    machine: VoltageTier,
    tier: VoltageTier,
    time_s: f64,
    inputs: &[(&str, u32)],
    outputs: &[(&str, u32)],
) -> Result<Recipe, GraphError> {
    let mut recipe = Recipe::new(name, machine, tier, time_s)?;
    for (resource, amount) in inputs {
        recipe.add_input(Resource::new(*resource, *amount));
    }
    for (resource, amount) in outputs {
        recipe.add_output(Resource::new(*resource, *amount));
    }
    Ok(recipe)
}

/// Steel plates from iron ore and water
pub fn steel_plate_chain() -> Result<RecipeGraph, GraphError> {
    use VoltageTier::{Lv, Mv};

    let mut graph = RecipeGraph::new();

    let plate = graph.add_recipe(recipe(
        "Steel Plate",
        Lv,
        Lv,
        5.0,
        &[("Steel Ingot", 1)],
        &[("Steel Plate", 1)],
    )?)?;
    let ingot = graph.add_recipe(recipe(
        "Steel Ingot",
        Mv,
        Mv,
        25.0,
        &[("Iron Dust", 1), ("Oxygen", 1000)],
        &[("Steel Ingot", 1)],
    )?)?;
    let dust = graph.add_recipe(recipe(
        "Iron Dust",
        Mv,
        Lv,
        10.0,
        &[("Iron Ore", 1)],
        &[("Iron Dust", 2)],
    )?)?;
    let oxygen = graph.add_recipe(recipe(
        "Oxygen",
        Mv,
        Lv,
        50.0,
        &[("Water", 3000)],
        &[("Hydrogen", 2000), ("Oxygen", 1000)],
    )?)?;

    graph.bind_input_recipe(plate, ingot)?;
    graph.bind_input_recipe(ingot, dust)?;
    graph.bind_input_recipe(ingot, oxygen)?;

    Ok(graph)
}
