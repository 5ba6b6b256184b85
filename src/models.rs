//! Data models for GregTech recipes and resources

use std::fmt;
use std::str::FromStr;

use slotmap::new_key_type;

new_key_type! {
    /// Identifies a recipe in a [`RecipeGraph`](crate::graph::RecipeGraph).
    pub struct RecipeId;
}

/// Shortest cycle a recipe can run in, no matter how far it is overclocked.
pub const MIN_CYCLE_TIME_S: f64 = 0.05;

/// Errors raised while validating recipe parameters.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RecipeError {
    #[error("unknown voltage tier: {0}")]
    UnknownVoltageTier(String),
    #[error("recipe has insufficient voltage: machine {machine} is below recipe {recipe}")]
    InsufficientVoltage {
        machine: VoltageTier,
        recipe: VoltageTier,
    },
    #[error("invalid recipe time: {0}s")]
    InvalidTime(f64),
}

/// A named quantity consumed or produced by one run of a recipe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub name: String,
    pub amount: u32,
}

impl Resource {
    pub fn new(name: impl Into<String>, amount: u32) -> Self {
        Self {
            name: name.into(),
            amount,
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.amount)
    }
}

/// Voltage tiers in ascending order. The discriminant is the tier's rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VoltageTier {
    Ulv = 0,
    Lv,
    Mv,
    Hv,
    Ev,
    Iv,
    Luv,
    Zpm,
    Uv,
    Uhv,
}

impl VoltageTier {
    pub const ALL: [VoltageTier; 10] = [
        VoltageTier::Ulv,
        VoltageTier::Lv,
        VoltageTier::Mv,
        VoltageTier::Hv,
        VoltageTier::Ev,
        VoltageTier::Iv,
        VoltageTier::Luv,
        VoltageTier::Zpm,
        VoltageTier::Uv,
        VoltageTier::Uhv,
    ];

    pub fn rank(self) -> u32 {
        self as u32
    }

    /// ULV machines run LV recipes, so a stored tier is never ULV.
    pub fn normalized(self) -> Self {
        match self {
            VoltageTier::Ulv => VoltageTier::Lv,
            other => other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            VoltageTier::Ulv => "ULV",
            VoltageTier::Lv => "LV",
            VoltageTier::Mv => "MV",
            VoltageTier::Hv => "HV",
            VoltageTier::Ev => "EV",
            VoltageTier::Iv => "IV",
            VoltageTier::Luv => "LUV",
            VoltageTier::Zpm => "ZPM",
            VoltageTier::Uv => "UV",
            VoltageTier::Uhv => "UHV",
        }
    }
}

impl fmt::Display for VoltageTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for VoltageTier {
    type Err = RecipeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        VoltageTier::ALL
            .into_iter()
            .find(|tier| tier.as_str() == upper)
            .ok_or_else(|| RecipeError::UnknownVoltageTier(s.to_string()))
    }
}

/// Duration of one recipe cycle after overclocking.
///
/// Every tier the machine sits above the recipe halves the duration, down to
/// [`MIN_CYCLE_TIME_S`]. Callers pass normalized tiers.
pub fn overclocked_time(time: f64, machine: VoltageTier, recipe: VoltageTier) -> f64 {
    let delta = machine.rank().saturating_sub(recipe.rank());
    (time / 2f64.powi(delta as i32)).max(MIN_CYCLE_TIME_S)
}

/// A single production step run on a machine of a given voltage tier.
#[derive(Debug, Clone, PartialEq)]
pub struct Recipe {
    name: String,
    machine_voltage: VoltageTier,
    recipe_voltage: VoltageTier,
    time_s: f64,
    pub inputs: Vec<Resource>,
    pub outputs: Vec<Resource>,
    /// Suppliers of this recipe's inputs, in binding order, without duplicates.
    pub(crate) input_recipes: Vec<RecipeId>,
}

impl Recipe {
    pub fn new(
        name: impl Into<String>,
        machine_voltage: VoltageTier,
        recipe_voltage: VoltageTier,
        time_s: f64,
    ) -> Result<Self, RecipeError> {
        let (machine_voltage, recipe_voltage, time_s) =
            validate_parameters(machine_voltage, recipe_voltage, time_s)?;
        Ok(Self {
            name: name.into(),
            machine_voltage,
            recipe_voltage,
            time_s,
            inputs: Vec::new(),
            outputs: Vec::new(),
            input_recipes: Vec::new(),
        })
    }

    /// Replace voltages and time. On error the recipe is left unchanged.
    pub fn edit(
        &mut self,
        machine_voltage: VoltageTier,
        recipe_voltage: VoltageTier,
        time_s: f64,
    ) -> Result<(), RecipeError> {
        let (machine_voltage, recipe_voltage, time_s) =
            validate_parameters(machine_voltage, recipe_voltage, time_s)?;
        self.machine_voltage = machine_voltage;
        self.recipe_voltage = recipe_voltage;
        self.time_s = time_s;
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn machine_voltage(&self) -> VoltageTier {
        self.machine_voltage
    }

    pub fn recipe_voltage(&self) -> VoltageTier {
        self.recipe_voltage
    }

    pub fn time_s(&self) -> f64 {
        self.time_s
    }

    pub fn input_recipes(&self) -> &[RecipeId] {
        &self.input_recipes
    }

    pub fn overclocked_time(&self) -> f64 {
        overclocked_time(self.time_s, self.machine_voltage, self.recipe_voltage)
    }

    pub fn add_input(&mut self, resource: Resource) {
        self.inputs.push(resource);
    }

    pub fn add_output(&mut self, resource: Resource) {
        self.outputs.push(resource);
    }

    /// Remove every input with the given name, returning how many were dropped.
    pub fn remove_input(&mut self, name: &str) -> usize {
        remove_by_name(&mut self.inputs, name)
    }

    /// Remove every output with the given name, returning how many were dropped.
    pub fn remove_output(&mut self, name: &str) -> usize {
        remove_by_name(&mut self.outputs, name)
    }

    pub(crate) fn bind_input_recipe(&mut self, supplier: RecipeId) -> bool {
        if self.input_recipes.contains(&supplier) {
            return false;
        }
        self.input_recipes.push(supplier);
        true
    }

    pub(crate) fn unbind_input_recipe(&mut self, supplier: RecipeId) -> bool {
        let before = self.input_recipes.len();
        self.input_recipes.retain(|id| *id != supplier);
        self.input_recipes.len() != before
    }
}

impl fmt::Display for Recipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} {} {}s",
            self.name, self.machine_voltage, self.recipe_voltage, self.time_s
        )
    }
}

fn validate_parameters(
    machine_voltage: VoltageTier,
    recipe_voltage: VoltageTier,
    time_s: f64,
) -> Result<(VoltageTier, VoltageTier, f64), RecipeError> {
    // Tiers are compared as given; a ULV machine cannot run an LV recipe.
    if machine_voltage < recipe_voltage {
        return Err(RecipeError::InsufficientVoltage {
            machine: machine_voltage,
            recipe: recipe_voltage,
        });
    }
    let machine = machine_voltage.normalized();
    let recipe = recipe_voltage.normalized();
    if !time_s.is_finite() || time_s < 0.0 {
        return Err(RecipeError::InvalidTime(time_s));
    }
    Ok((machine, recipe, time_s))
}

fn remove_by_name(resources: &mut Vec<Resource>, name: &str) -> usize {
    let before = resources.len();
    resources.retain(|r| r.name != name);
    before - resources.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overclock_same_tier_keeps_time() {
        assert_eq!(overclocked_time(10.0, VoltageTier::Lv, VoltageTier::Lv), 10.0);
    }

    #[test]
    fn overclock_halves_per_tier() {
        assert_eq!(overclocked_time(10.0, VoltageTier::Hv, VoltageTier::Lv), 2.5);
        assert_eq!(overclocked_time(8.0, VoltageTier::Mv, VoltageTier::Lv), 4.0);
    }

    #[test]
    fn overclock_is_floored() {
        let t = overclocked_time(0.01, VoltageTier::Uhv, VoltageTier::Ulv.normalized());
        assert_eq!(t, MIN_CYCLE_TIME_S);
        assert_eq!(overclocked_time(0.0, VoltageTier::Lv, VoltageTier::Lv), MIN_CYCLE_TIME_S);
    }

    #[test]
    fn overclock_never_slows_down() {
        // A machine below the recipe tier is rejected at construction, but the
        // formula itself clamps the tier difference at zero.
        assert_eq!(overclocked_time(10.0, VoltageTier::Lv, VoltageTier::Hv), 10.0);
    }

    #[test]
    fn ulv_normalizes_to_lv() {
        let recipe = Recipe::new("Bolt", VoltageTier::Ulv, VoltageTier::Ulv, 1.0).unwrap();
        assert_eq!(recipe.machine_voltage(), VoltageTier::Lv);
        assert_eq!(recipe.recipe_voltage(), VoltageTier::Lv);

        let recipe = Recipe::new("Rod", VoltageTier::Mv, VoltageTier::Ulv, 1.0).unwrap();
        assert_eq!(recipe.recipe_voltage(), VoltageTier::Lv);
        assert_eq!(recipe.overclocked_time(), 0.5);
    }

    #[test]
    fn ulv_machine_cannot_run_lv_recipe() {
        assert_eq!(
            Recipe::new("Wire", VoltageTier::Ulv, VoltageTier::Lv, 2.0).unwrap_err(),
            RecipeError::InsufficientVoltage {
                machine: VoltageTier::Ulv,
                recipe: VoltageTier::Lv,
            }
        );

        let mut recipe = Recipe::new("Wire", VoltageTier::Lv, VoltageTier::Lv, 2.0).unwrap();
        assert!(recipe.edit(VoltageTier::Ulv, VoltageTier::Lv, 2.0).is_err());
        assert_eq!(recipe.machine_voltage(), VoltageTier::Lv);
    }

    #[test]
    fn machine_below_recipe_voltage_rejected() {
        for (m, machine) in VoltageTier::ALL.into_iter().enumerate() {
            for recipe in VoltageTier::ALL.into_iter().skip(m + 1) {
                let err = Recipe::new("x", machine, recipe, 1.0).unwrap_err();
                assert!(matches!(err, RecipeError::InsufficientVoltage { .. }));
            }
        }
    }

    #[test]
    fn negative_or_nan_time_rejected() {
        assert_eq!(
            Recipe::new("x", VoltageTier::Lv, VoltageTier::Lv, -1.0).unwrap_err(),
            RecipeError::InvalidTime(-1.0)
        );
        assert!(Recipe::new("x", VoltageTier::Lv, VoltageTier::Lv, f64::NAN).is_err());
    }

    #[test]
    fn edit_rejection_leaves_recipe_unchanged() {
        let mut recipe = Recipe::new("Plate", VoltageTier::Mv, VoltageTier::Lv, 4.0).unwrap();
        let before = recipe.clone();
        assert!(recipe.edit(VoltageTier::Lv, VoltageTier::Hv, 2.0).is_err());
        assert!(recipe.edit(VoltageTier::Hv, VoltageTier::Lv, -2.0).is_err());
        assert_eq!(recipe, before);

        recipe.edit(VoltageTier::Ev, VoltageTier::Ulv, 2.0).unwrap();
        assert_eq!(recipe.machine_voltage(), VoltageTier::Ev);
        assert_eq!(recipe.recipe_voltage(), VoltageTier::Lv);
        assert_eq!(recipe.time_s(), 2.0);
    }

    #[test]
    fn voltage_tier_parses_case_insensitively() {
        assert_eq!("luv".parse::<VoltageTier>().unwrap(), VoltageTier::Luv);
        assert_eq!(" Zpm ".parse::<VoltageTier>().unwrap(), VoltageTier::Zpm);
        assert_eq!(
            "MAX".parse::<VoltageTier>().unwrap_err(),
            RecipeError::UnknownVoltageTier("MAX".to_string())
        );
    }

    #[test]
    fn voltage_ranks_are_ordered() {
        for (rank, tier) in VoltageTier::ALL.into_iter().enumerate() {
            assert_eq!(tier.rank() as usize, rank);
        }
    }

    #[test]
    fn remove_resource_drops_all_matches() {
        let mut recipe = Recipe::new("Mixer", VoltageTier::Lv, VoltageTier::Lv, 1.0).unwrap();
        recipe.add_input(Resource::new("Iron", 1));
        recipe.add_input(Resource::new("Tin", 1));
        recipe.add_input(Resource::new("Iron", 3));
        recipe.add_output(Resource::new("Bronze", 4));

        assert_eq!(recipe.remove_input("Iron"), 2);
        assert_eq!(recipe.inputs, vec![Resource::new("Tin", 1)]);
        assert_eq!(recipe.remove_output("Iron"), 0);
        assert_eq!(recipe.outputs.len(), 1);
    }

    #[test]
    fn binding_is_idempotent() {
        let mut recipe = Recipe::new("a", VoltageTier::Lv, VoltageTier::Lv, 1.0).unwrap();
        let id = RecipeId::default();
        assert!(recipe.bind_input_recipe(id));
        assert!(!recipe.bind_input_recipe(id));
        assert_eq!(recipe.input_recipes(), &[id]);
    }
}
