//! Interactive command layer
//!
//! Each line is parsed into a [`Command`] and run against the graph with an
//! explicit [`Session`] that tracks the selected recipe.

use regex::Regex;
use rusqlite::Connection;
use tracing::debug;

use crate::calculator;
use crate::db;
use crate::graph::{GraphError, RecipeGraph};
use crate::models::{Recipe, RecipeError, RecipeId, Resource, VoltageTier};

const HELP: &str = "\
Add a new recipe to current   - add <name> <machine voltage> <recipe voltage> <time (seconds)>
Add existing recipe to curr.  - add <name>
Edit an existing recipe       - edit <name> <machine voltage> <recipe voltage> <time (seconds)>
Remove a recipe by name       - remove <name>
Select a recipe by name       - select <name>
Select global scope           - select
List all recipes from current - list
List all recipes in graph     - listall
Add input to current recipe   - i <amount> <name>
Add output to current recipe  - o <amount> <name>
Remove input from current     - ri <name>
Remove output from current    - ro <name>
Print recipe i/o              - info
Calculate ratios from current - calc <amount>
Calculate overclocked time    - otime
List every resource name      - resources
Rename a resource everywhere  - rename <old> <new>  |  rename <old name> -> <new name>
Save the graph                - save
Quit                          - quit

Recipe names are a single word; resource names may contain spaces.";

/// Errors from parsing or running a command. None of them end the session.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("unknown command '{0}', type help for instructions")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("invalid number: {0}")]
    InvalidNumber(String),
    #[error("no recipe selected")]
    NoSelection,
    #[error("recipe '{0}' not found")]
    NotFound(String),
    #[error(transparent)]
    Recipe(#[from] RecipeError),
    #[error(transparent)]
    Graph(#[from] GraphError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    Create {
        name: String,
        machine_voltage: VoltageTier,
        recipe_voltage: VoltageTier,
        time_s: f64,
    },
    Bind(String),
    Edit {
        name: String,
        machine_voltage: VoltageTier,
        recipe_voltage: VoltageTier,
        time_s: f64,
    },
    Remove(String),
    Select(Option<String>),
    List,
    ListAll,
    AddInput(Resource),
    AddOutput(Resource),
    RemoveInput(String),
    RemoveOutput(String),
    Info,
    Calc(f64),
    OverclockTime,
    Resources,
    RenameResource { old: String, new: String },
    Save,
    Quit,
}

/// What the caller should do after a command ran.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Print(String),
    Save,
    Quit,
}

/// The recipe commands without a name act on.
#[derive(Debug, Clone, Copy, Default)]
pub struct Session {
    pub current: Option<RecipeId>,
}

impl Session {
    fn require_current(&self) -> Result<RecipeId, CommandError> {
        self.current.ok_or(CommandError::NoSelection)
    }
}

/// Splits command lines into [`Command`]s.
pub struct CommandParser {
    resource: Regex,
    rename: Regex,
}

impl CommandParser {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            resource: Regex::new(r"^(\d+)\s+(\S.*?)\s*$")?,
            rename: Regex::new(r"^(\S.*?)\s*->\s*(\S.*?)\s*$")?,
        })
    }

    /// Parse one line. Blank lines yield `None`.
    pub fn parse(&self, line: &str) -> Result<Option<Command>, CommandError> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };
        if word.is_empty() {
            return Ok(None);
        }
        let args: Vec<&str> = rest.split_whitespace().collect();

        let command = match word {
            "help" => Command::Help,
            "add" => match args.as_slice() {
                [name] => Command::Bind(name.to_string()),
                [name, machine, recipe, time] => Command::Create {
                    name: name.to_string(),
                    machine_voltage: machine.parse::<VoltageTier>()?,
                    recipe_voltage: recipe.parse::<VoltageTier>()?,
                    time_s: parse_number(time)?,
                },
                _ => return Err(CommandError::Usage("add <name> [<machine> <recipe> <time>]")),
            },
            "edit" => match args.as_slice() {
                [name, machine, recipe, time] => Command::Edit {
                    name: name.to_string(),
                    machine_voltage: machine.parse::<VoltageTier>()?,
                    recipe_voltage: recipe.parse::<VoltageTier>()?,
                    time_s: parse_number(time)?,
                },
                _ => return Err(CommandError::Usage("edit <name> <machine> <recipe> <time>")),
            },
            "remove" => match args.as_slice() {
                [name] => Command::Remove(name.to_string()),
                _ => return Err(CommandError::Usage("remove <name>")),
            },
            "select" => match args.as_slice() {
                [] => Command::Select(None),
                [name] => Command::Select(Some(name.to_string())),
                _ => return Err(CommandError::Usage("select [<name>]")),
            },
            "list" => Command::List,
            "listall" => Command::ListAll,
            "i" => Command::AddInput(self.parse_resource(rest, "i <amount> <name>")?),
            "o" => Command::AddOutput(self.parse_resource(rest, "o <amount> <name>")?),
            "ri" if !rest.is_empty() => Command::RemoveInput(rest.to_string()),
            "ri" => return Err(CommandError::Usage("ri <name>")),
            "ro" if !rest.is_empty() => Command::RemoveOutput(rest.to_string()),
            "ro" => return Err(CommandError::Usage("ro <name>")),
            "info" | "io" => Command::Info,
            "calc" => match args.as_slice() {
                [amount] => Command::Calc(parse_number(amount)?),
                _ => return Err(CommandError::Usage("calc <amount>")),
            },
            "otime" => Command::OverclockTime,
            "resources" => Command::Resources,
            "rename" => {
                if let Some(caps) = self.rename.captures(rest) {
                    Command::RenameResource {
                        old: caps[1].to_string(),
                        new: caps[2].to_string(),
                    }
                } else if let [old, new] = args.as_slice() {
                    Command::RenameResource {
                        old: old.to_string(),
                        new: new.to_string(),
                    }
                } else {
                    return Err(CommandError::Usage("rename <old> <new>"));
                }
            }
            "save" => Command::Save,
            "quit" | "exit" => Command::Quit,
            other => return Err(CommandError::Unknown(other.to_string())),
        };
        Ok(Some(command))
    }

    fn parse_resource(&self, rest: &str, usage: &'static str) -> Result<Resource, CommandError> {
        let caps = self
            .resource
            .captures(rest)
            .ok_or(CommandError::Usage(usage))?;
        let amount = caps[1]
            .parse::<u32>()
            .map_err(|_| CommandError::InvalidNumber(caps[1].to_string()))?;
        Ok(Resource::new(&caps[2], amount))
    }
}

fn parse_number(text: &str) -> Result<f64, CommandError> {
    text.parse::<f64>()
        .map_err(|_| CommandError::InvalidNumber(text.to_string()))
}

/// The prompt shown before each line: the selected recipe, or `~`.
pub fn prompt(graph: &RecipeGraph, session: &Session) -> String {
    let name = session
        .current
        .and_then(|id| graph.recipe(id))
        .map_or("~", Recipe::name);
    format!("{}> ", name)
}

/// Run a command against the graph.
pub fn execute(
    graph: &mut RecipeGraph,
    session: &mut Session,
    command: Command,
) -> Result<Outcome, CommandError> {
    debug!(?command, "executing command");
    let output = match command {
        Command::Help => HELP.to_string(),
        Command::Create {
            name,
            machine_voltage,
            recipe_voltage,
            time_s,
        } => {
            let recipe = Recipe::new(&name, machine_voltage, recipe_voltage, time_s)?;
            let id = graph.add_recipe(recipe)?;
            if let Some(current) = session.current {
                graph.bind_input_recipe(current, id)?;
            }
            format!("Added recipe {}", name)
        }
        Command::Bind(name) => {
            let current = session.require_current()?;
            let supplier = lookup(graph, &name)?;
            if graph.bind_input_recipe(current, supplier)? {
                format!("Bound {} as an input recipe", name)
            } else {
                String::new()
            }
        }
        Command::Edit {
            name,
            machine_voltage,
            recipe_voltage,
            time_s,
        } => {
            let id = lookup(graph, &name)?;
            graph.edit_recipe(id, machine_voltage, recipe_voltage, time_s)?;
            String::new()
        }
        Command::Remove(name) => {
            let id = lookup(graph, &name)?;
            if !graph.remove_recipe(id) {
                format!("Unable to remove recipe {}", name)
            } else {
                if session.current == Some(id) {
                    session.current = None;
                }
                format!("Removed recipe {}", name)
            }
        }
        Command::Select(None) => {
            session.current = None;
            String::new()
        }
        Command::Select(Some(name)) => {
            session.current = Some(lookup(graph, &name)?);
            String::new()
        }
        Command::List => match session.current {
            Some(current) => {
                let name = graph.recipe(current).map_or("", Recipe::name);
                let ids = graph.traverse(current);
                list_recipes(graph, &format!("LISTING RECIPES FROM {}", name), &ids)
            }
            None => list_all(graph),
        },
        Command::ListAll => list_all(graph),
        Command::AddInput(resource) => {
            current_recipe(graph, session)?.add_input(resource);
            String::new()
        }
        Command::AddOutput(resource) => {
            current_recipe(graph, session)?.add_output(resource);
            String::new()
        }
        Command::RemoveInput(name) => {
            current_recipe(graph, session)?.remove_input(&name);
            String::new()
        }
        Command::RemoveOutput(name) => {
            current_recipe(graph, session)?.remove_output(&name);
            String::new()
        }
        Command::Info => format_io_table(current_recipe(graph, session)?),
        Command::Calc(amount) => {
            let current = session.require_current()?;
            let entries = calculator::calculate_ratios(graph, current, amount)?;
            format!(
                "{}\n{}",
                calculator::format_ratio_tree(graph, &entries),
                calculator::summarize_ratios(graph, &entries)
            )
        }
        Command::OverclockTime => {
            format!("{}s", current_recipe(graph, session)?.overclocked_time())
        }
        Command::Resources => graph
            .resource_names()
            .into_iter()
            .collect::<Vec<_>>()
            .join("\n"),
        Command::RenameResource { old, new } => {
            let renamed = graph.rename_resource(&old, &new);
            format!("Renamed {} resource entries", renamed)
        }
        Command::Save => return Ok(Outcome::Save),
        Command::Quit => return Ok(Outcome::Quit),
    };
    Ok(Outcome::Print(output))
}

fn lookup(graph: &RecipeGraph, name: &str) -> Result<RecipeId, CommandError> {
    graph
        .recipe_id(name)
        .ok_or_else(|| CommandError::NotFound(name.to_string()))
}

fn current_recipe<'a>(
    graph: &'a mut RecipeGraph,
    session: &Session,
) -> Result<&'a mut Recipe, CommandError> {
    let current = session.require_current()?;
    graph
        .recipe_mut(current)
        .ok_or(CommandError::Graph(GraphError::RecipeNotFound(current)))
}

fn list_all(graph: &RecipeGraph) -> String {
    let ids: Vec<RecipeId> = graph.recipes().map(|(id, _)| id).collect();
    list_recipes(graph, "LISTING ALL RECIPES", &ids)
}

fn list_recipes(graph: &RecipeGraph, title: &str, ids: &[RecipeId]) -> String {
    let mut lines = vec![format!(" --- {} --- ", title)];
    lines.extend(
        ids.iter()
            .filter_map(|id| graph.recipe(*id))
            .map(|recipe| recipe.to_string()),
    );
    lines.join("\n")
}

/// Save the graph and describe the result for the user.
///
/// A failed save is reported rather than returned: the graph and the
/// session stay as they were and the user can retry.
pub fn save_and_report(conn: &mut Connection, graph: &RecipeGraph) -> String {
    match db::save_graph(conn, graph) {
        Ok(()) => format!("Saved {} recipes", graph.len()),
        Err(e) => {
            debug!(error = %e, "save failed");
            format!("Save failed: {:#}", e)
        }
    }
}

/// Inputs and outputs side by side, one resource per row
pub fn format_io_table(recipe: &Recipe) -> String {
    let cell = |resource: Option<&Resource>| resource.map(Resource::to_string).unwrap_or_default();
    let width = |resources: &[Resource]| {
        resources
            .iter()
            .map(|r| r.to_string().len())
            .max()
            .unwrap_or(0)
            .max(6)
    };
    let input_width = width(&recipe.inputs);
    let output_width = width(&recipe.outputs);

    let mut lines = vec![
        format!("{:<input_width$}|{:<output_width$}", "INPUT", "OUTPUT"),
        format!("{}+{}", "-".repeat(input_width), "-".repeat(output_width)),
    ];
    for row in 0..recipe.inputs.len().max(recipe.outputs.len()) {
        lines.push(format!(
            "{:<input_width$}|{:<output_width$}",
            cell(recipe.inputs.get(row)),
            cell(recipe.outputs.get(row)),
        ));
    }
    lines.join("\n")
}
