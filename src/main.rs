//! GregTech Ratio Calculator
//!
//! Interactive recipe editor and production ratio calculator.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use rusqlite::Connection;
use tracing::debug;

use greg_calculator::repl::{self, CommandParser, Outcome, Session};
use greg_calculator::{RecipeGraph, calculator, db, sample};

#[derive(Parser)]
#[command(name = "greg-calculator")]
#[command(about = "Production ratio calculator for GregTech recipe chains")]
struct Cli {
    /// Path to the SQLite database
    #[arg(short, long, env = "GREG_CALCULATOR_DB", default_value = "recipes.db")]
    database: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Edit recipes interactively (default)
    Repl,

    /// Calculate ratios for a recipe
    Calc {
        /// Recipe to balance
        recipe: String,

        /// How many copies of the recipe must run
        #[arg(short, long, default_value = "1.0")]
        amount: f64,

        /// Show the full supplier tree
        #[arg(short, long)]
        verbose: bool,
    },

    /// List all recipes in the database
    List,

    /// List every resource name used by a recipe
    Resources,

    /// Rename a resource in every recipe
    RenameResource { old: String, new: String },

    /// Initialize empty database with schema
    Init,

    /// Replace the database contents with a sample steel chain
    LoadSample,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let mut conn = Connection::open(&cli.database)
        .with_context(|| format!("Failed to open {}", cli.database.display()))?;
    db::init_schema(&conn)?;
    let mut graph = db::load_graph(&conn)?;

    match cli.command.unwrap_or(Commands::Repl) {
        Commands::Repl => run_repl(&mut conn, &mut graph)?,

        Commands::Calc {
            recipe,
            amount,
            verbose,
        } => {
            let Some(root) = graph.recipe_id(&recipe) else {
                bail!("Recipe '{}' not found", recipe);
            };
            let entries = calculator::calculate_ratios(&graph, root, amount)?;

            if verbose {
                println!("Supplier tree:\n");
                println!("{}", calculator::format_ratio_tree(&graph, &entries));
            }
            println!("{}", calculator::summarize_ratios(&graph, &entries));
        }

        Commands::List => {
            if graph.is_empty() {
                println!("No recipes in database. Run 'repl' or 'load-sample' first.");
            } else {
                println!("{:<30} {:>8} {:>8} {:>10}", "Recipe", "Machine", "Recipe", "Time (s)");
                println!("{}", "-".repeat(59));
                for (_, recipe) in graph.recipes() {
                    println!(
                        "{:<30} {:>8} {:>8} {:>10}",
                        recipe.name(),
                        recipe.machine_voltage(),
                        recipe.recipe_voltage(),
                        recipe.time_s()
                    );
                }
            }
        }

        Commands::Resources => {
            let names = graph.resource_names();
            if names.is_empty() {
                println!("No resources in database.");
            } else {
                println!("Resources:");
                for name in names {
                    println!("  {}", name);
                }
            }
        }

        Commands::RenameResource { old, new } => {
            let renamed = graph.rename_resource(&old, &new);
            db::save_graph(&mut conn, &graph)?;
            println!("Renamed {} resource entries", renamed);
        }

        Commands::Init => {
            println!("Database initialized at: {}", cli.database.display());
        }

        Commands::LoadSample => {
            let sample = sample::steel_plate_chain()?;
            db::save_graph(&mut conn, &sample)?;
            println!("Loaded {} sample recipes", sample.len());
        }
    }

    Ok(())
}

fn run_repl(conn: &mut Connection, graph: &mut RecipeGraph) -> Result<()> {
    let parser = CommandParser::new()?;
    let mut session = Session::default();
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    println!("Type help for instructions");
    loop {
        print!("{}", repl::prompt(graph, &session));
        io::stdout().flush()?;

        let Some(line) = lines.next() else {
            break;
        };
        let command = match parser.parse(&line?) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                println!("{}", e);
                continue;
            }
        };

        match repl::execute(graph, &mut session, command) {
            Ok(Outcome::Print(text)) => {
                if !text.is_empty() {
                    println!("{}", text);
                }
            }
            Ok(Outcome::Save) => println!("{}", repl::save_and_report(conn, graph)),
            Ok(Outcome::Quit) => break,
            Err(e) => {
                debug!(error = %e, "command failed");
                println!("{}", e);
            }
        }
    }

    Ok(())
}
