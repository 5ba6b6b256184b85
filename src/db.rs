//! Database schema and persistence of the recipe graph
//!
//! Supplier edges are stored by recipe ID and resolved once every recipe has
//! been loaded, so shared suppliers and cycles survive a round trip.

use std::collections::HashMap;

use anyhow::{Context, Result, anyhow};
use rusqlite::Connection;
use tracing::info;

use crate::graph::RecipeGraph;
use crate::models::{Recipe, RecipeId, Resource, VoltageTier};

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS recipes (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            machine_voltage TEXT NOT NULL,
            recipe_voltage TEXT NOT NULL,
            time_s REAL NOT NULL
        );

        -- Resources consumed by one run of a recipe, in list order
        CREATE TABLE IF NOT EXISTS recipe_inputs (
            recipe_id INTEGER NOT NULL,
            position INTEGER NOT NULL,
            resource_name TEXT NOT NULL,
            amount INTEGER NOT NULL,
            PRIMARY KEY (recipe_id, position)
        );

        -- Resources produced by one run of a recipe, in list order
        CREATE TABLE IF NOT EXISTS recipe_outputs (
            recipe_id INTEGER NOT NULL,
            position INTEGER NOT NULL,
            resource_name TEXT NOT NULL,
            amount INTEGER NOT NULL,
            PRIMARY KEY (recipe_id, position)
        );

        -- consumer takes inputs from supplier; position keeps binding order
        CREATE TABLE IF NOT EXISTS recipe_edges (
            consumer_id INTEGER NOT NULL,
            supplier_id INTEGER NOT NULL,
            position INTEGER NOT NULL,
            PRIMARY KEY (consumer_id, supplier_id)
        );

        CREATE INDEX IF NOT EXISTS idx_recipe_inputs_recipe ON recipe_inputs(recipe_id);
        CREATE INDEX IF NOT EXISTS idx_recipe_outputs_recipe ON recipe_outputs(recipe_id);
        CREATE INDEX IF NOT EXISTS idx_recipe_edges_consumer ON recipe_edges(consumer_id);
        "#,
    )?;
    Ok(())
}

/// Clear every stored recipe
pub fn clear_graph(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        DELETE FROM recipe_edges;
        DELETE FROM recipe_outputs;
        DELETE FROM recipe_inputs;
        DELETE FROM recipes;
        "#,
    )?;
    Ok(())
}

/// Replace the stored graph with `graph` in a single transaction
pub fn save_graph(conn: &mut Connection, graph: &RecipeGraph) -> Result<()> {
    let tx = conn.transaction()?;
    clear_graph(&tx)?;

    let ids: HashMap<RecipeId, i64> = graph
        .recipes()
        .enumerate()
        .map(|(i, (id, _))| (id, i as i64 + 1))
        .collect();

    {
        let mut insert_recipe = tx.prepare(
            "INSERT INTO recipes (id, name, machine_voltage, recipe_voltage, time_s)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        let mut insert_input = tx.prepare(
            "INSERT INTO recipe_inputs (recipe_id, position, resource_name, amount)
             VALUES (?1, ?2, ?3, ?4)",
        )?;
        let mut insert_output = tx.prepare(
            "INSERT INTO recipe_outputs (recipe_id, position, resource_name, amount)
             VALUES (?1, ?2, ?3, ?4)",
        )?;
        let mut insert_edge = tx.prepare(
            "INSERT INTO recipe_edges (consumer_id, supplier_id, position)
             VALUES (?1, ?2, ?3)",
        )?;

        for (id, recipe) in graph.recipes() {
            let row_id = ids[&id];
            insert_recipe.execute((
                row_id,
                recipe.name(),
                recipe.machine_voltage().as_str(),
                recipe.recipe_voltage().as_str(),
                recipe.time_s(),
            ))?;

            for (position, input) in recipe.inputs.iter().enumerate() {
                insert_input.execute((row_id, position as i64, &input.name, input.amount))?;
            }
            for (position, output) in recipe.outputs.iter().enumerate() {
                insert_output.execute((row_id, position as i64, &output.name, output.amount))?;
            }
            for (position, supplier) in recipe.input_recipes().iter().enumerate() {
                let supplier_id = ids
                    .get(supplier)
                    .ok_or_else(|| anyhow!("recipe '{}' has a dangling supplier", recipe.name()))?;
                insert_edge.execute((row_id, *supplier_id, position as i64))?;
            }
        }
    }

    tx.commit()?;
    info!(recipes = graph.len(), "saved recipe graph");
    Ok(())
}

/// Load the stored graph
pub fn load_graph(conn: &Connection) -> Result<RecipeGraph> {
    let mut graph = RecipeGraph::new();
    let mut ids: HashMap<i64, RecipeId> = HashMap::new();

    let mut stmt = conn.prepare(
        "SELECT id, name, machine_voltage, recipe_voltage, time_s FROM recipes ORDER BY id",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, f64>(4)?,
        ))
    })?;
    for row in rows {
        let (row_id, name, machine, recipe_voltage, time_s) = row?;
        let recipe = Recipe::new(
            &name,
            machine.parse::<VoltageTier>()?,
            recipe_voltage.parse::<VoltageTier>()?,
            time_s,
        )
        .with_context(|| format!("Invalid stored recipe '{}'", name))?;
        ids.insert(row_id, graph.add_recipe(recipe)?);
    }

    for (table, is_input) in [("recipe_inputs", true), ("recipe_outputs", false)] {
        let mut stmt = conn.prepare(&format!(
            "SELECT recipe_id, resource_name, amount FROM {} ORDER BY recipe_id, position",
            table
        ))?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, u32>(2)?,
            ))
        })?;
        for row in rows {
            let (row_id, name, amount) = row?;
            let recipe = ids
                .get(&row_id)
                .and_then(|id| graph.recipe_mut(*id))
                .ok_or_else(|| anyhow!("{} references unknown recipe {}", table, row_id))?;
            let resource = Resource::new(name, amount);
            if is_input {
                recipe.add_input(resource);
            } else {
                recipe.add_output(resource);
            }
        }
    }

    let mut stmt = conn.prepare(
        "SELECT consumer_id, supplier_id FROM recipe_edges ORDER BY consumer_id, position",
    )?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)))?;
    for row in rows {
        let (consumer, supplier) = row?;
        let resolve = |row_id: i64| {
            ids.get(&row_id)
                .copied()
                .ok_or_else(|| anyhow!("edge references unknown recipe {}", row_id))
        };
        graph.bind_input_recipe(resolve(consumer)?, resolve(supplier)?)?;
    }

    info!(recipes = graph.len(), "loaded recipe graph");
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    fn sample_graph() -> RecipeGraph {
        let mut graph = RecipeGraph::new();
        let mut circuit = Recipe::new("Circuit", VoltageTier::Mv, VoltageTier::Lv, 10.0).unwrap();
        circuit.add_input(Resource::new("Board", 1));
        circuit.add_input(Resource::new("Fine Wire", 2));
        circuit.add_output(Resource::new("Circuit", 1));
        let mut board = Recipe::new("Board", VoltageTier::Lv, VoltageTier::Lv, 5.0).unwrap();
        board.add_input(Resource::new("Copper", 1));
        board.add_output(Resource::new("Board", 1));
        let mut wire = Recipe::new("Fine Wire", VoltageTier::Ulv, VoltageTier::Ulv, 2.5).unwrap();
        wire.add_input(Resource::new("Copper", 1));
        wire.add_output(Resource::new("Fine Wire", 4));
        let mut copper = Recipe::new("Copper", VoltageTier::Lv, VoltageTier::Lv, 1.0).unwrap();
        copper.add_output(Resource::new("Copper", 1));

        let circuit = graph.add_recipe(circuit).unwrap();
        let board = graph.add_recipe(board).unwrap();
        let wire = graph.add_recipe(wire).unwrap();
        let copper = graph.add_recipe(copper).unwrap();
        graph.bind_input_recipe(circuit, wire).unwrap();
        graph.bind_input_recipe(circuit, board).unwrap();
        graph.bind_input_recipe(board, copper).unwrap();
        graph.bind_input_recipe(wire, copper).unwrap();
        graph.bind_input_recipe(copper, circuit).unwrap();
        graph
    }

    fn names(graph: &RecipeGraph, ids: &[RecipeId]) -> Vec<String> {
        ids.iter()
            .map(|id| graph.recipe(*id).unwrap().name().to_string())
            .collect()
    }

    #[test]
    fn shared_and_cyclic_edges_survive_reload() {
        let mut conn = memory_db();
        let graph = sample_graph();
        save_graph(&mut conn, &graph).unwrap();

        let loaded = load_graph(&conn).unwrap();
        assert_eq!(loaded.len(), 4);

        let circuit = loaded.recipe_id("Circuit").unwrap();
        let copper = loaded.recipe_id("Copper").unwrap();
        let board = loaded.get_recipe("Board").unwrap();
        let wire = loaded.get_recipe("Fine Wire").unwrap();

        // One copper recipe feeds both, not two copies.
        assert_eq!(board.input_recipes(), &[copper]);
        assert_eq!(wire.input_recipes(), &[copper]);
        assert_eq!(loaded.recipe(copper).unwrap().input_recipes(), &[circuit]);

        assert_eq!(
            names(&loaded, loaded.recipe(circuit).unwrap().input_recipes()),
            vec!["Fine Wire", "Board"]
        );
        assert_eq!(
            names(&loaded, &loaded.traverse(circuit)),
            names(&graph, &graph.traverse(graph.recipe_id("Circuit").unwrap()))
        );
    }

    #[test]
    fn scalar_fields_and_resources_survive_reload() {
        let mut conn = memory_db();
        save_graph(&mut conn, &sample_graph()).unwrap();
        let loaded = load_graph(&conn).unwrap();

        let circuit = loaded.get_recipe("Circuit").unwrap();
        assert_eq!(circuit.machine_voltage(), VoltageTier::Mv);
        assert_eq!(circuit.recipe_voltage(), VoltageTier::Lv);
        assert_eq!(circuit.time_s(), 10.0);
        assert_eq!(
            circuit.inputs,
            vec![Resource::new("Board", 1), Resource::new("Fine Wire", 2)]
        );
        assert_eq!(circuit.outputs, vec![Resource::new("Circuit", 1)]);
        assert_eq!(
            loaded.get_recipe("Fine Wire").unwrap().machine_voltage(),
            VoltageTier::Lv
        );
    }

    #[test]
    fn save_replaces_previous_contents() {
        let mut conn = memory_db();
        save_graph(&mut conn, &sample_graph()).unwrap();

        let mut smaller = sample_graph();
        let board = smaller.recipe_id("Board").unwrap();
        smaller.remove_recipe(board);
        save_graph(&mut conn, &smaller).unwrap();

        let loaded = load_graph(&conn).unwrap();
        assert_eq!(loaded.len(), 3);
        assert!(!loaded.contains_recipe("Board"));
        let circuit = loaded.get_recipe("Circuit").unwrap();
        assert_eq!(circuit.input_recipes().len(), 1);
    }

    #[test]
    fn empty_database_loads_empty_graph() {
        let conn = memory_db();
        assert!(load_graph(&conn).unwrap().is_empty());
    }

    #[test]
    fn dangling_edge_is_rejected() {
        let mut conn = memory_db();
        save_graph(&mut conn, &sample_graph()).unwrap();
        conn.execute(
            "INSERT INTO recipe_edges (consumer_id, supplier_id, position) VALUES (1, 99, 5)",
            [],
        )
        .unwrap();

        let err = load_graph(&conn).unwrap_err();
        assert!(err.to_string().contains("unknown recipe 99"));
    }

    #[test]
    fn invalid_stored_tier_is_rejected() {
        let conn = memory_db();
        conn.execute(
            "INSERT INTO recipes (id, name, machine_voltage, recipe_voltage, time_s)
             VALUES (1, 'Broken', 'MAX', 'LV', 1.0)",
            [],
        )
        .unwrap();
        assert!(load_graph(&conn).is_err());
    }

    #[test]
    fn clear_removes_everything() {
        let mut conn = memory_db();
        save_graph(&mut conn, &sample_graph()).unwrap();
        clear_graph(&conn).unwrap();
        assert!(load_graph(&conn).unwrap().is_empty());
    }
}
