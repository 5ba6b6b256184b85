//! GregTech production ratio calculator
//!
//! Recipes live in a [`RecipeGraph`]; edges point from a consumer to the
//! recipes that supply its inputs. [`calculator::calculate_ratios`] sizes a
//! whole supplier chain for a chosen rate of the root recipe.

pub mod calculator;
pub mod db;
pub mod graph;
pub mod models;
pub mod repl;
pub mod sample;

pub use calculator::{RatioEntry, calculate_ratios};
pub use graph::{GraphError, RecipeGraph};
pub use models::{Recipe, RecipeError, RecipeId, Resource, VoltageTier, overclocked_time};
