//! Research progression and bonus aggregation.
//!
//! Research bonuses feed the calculators, and the calculators produce the
//! compute that advances research. The loop is broken by freezing a
//! [`BonusSnapshot`] at the start of each tick; progress committed later in
//! the tick only affects the next one.

use serde::{Deserialize, Serialize};

use crate::data::{effect_keys, GameData, ResearchCategory, ResearchTreeData, COMPUTER_SYSTEMS_TREE};
use crate::error::{GameError, Result};
use crate::state::GameState;

// ============================================================================
// Bonus aggregation
// ============================================================================

/// Bonus of one effect key within one tree.
///
/// Starts at `default` and adds each tier's raw effect weighted by its
/// completed fraction.
#[must_use]
pub fn research_bonus(
    state: &GameState,
    tree: &ResearchTreeData,
    effect_key: &str,
    default: f64,
) -> f64 {
    tree.tier_entries()
        .into_iter()
        .fold(default, |acc, (key, entry)| {
            let Some(effect) = entry.tier.effects.get(effect_key) else {
                return acc;
            };
            let completed = state.tier(&tree.id, &key).map_or(0, |t| t.tranches_completed);
            if completed == 0 || entry.tier.tranches == 0 {
                return acc;
            }
            acc + effect * f64::from(completed) / f64::from(entry.tier.tranches)
        })
}

/// Product over all trees of a multiplier key.
fn multiplier(state: &GameState, data: &GameData, effect_key: &str) -> f64 {
    data.research_trees
        .iter()
        .map(|tree| research_bonus(state, tree, effect_key, 1.0))
        .product()
}

/// Sum over all trees of an additive key.
fn additive(state: &GameState, data: &GameData, effect_key: &str) -> f64 {
    data.research_trees
        .iter()
        .map(|tree| research_bonus(state, tree, effect_key, 0.0))
        .sum()
}

/// Geometric mean of the compute subcategory multipliers.
fn compute_efficiency(state: &GameState, data: &GameData) -> f64 {
    let Some(tree) = data.get_research_tree(COMPUTER_SYSTEMS_TREE) else {
        return 1.0;
    };
    if tree.subcategories.is_empty() {
        return research_bonus(state, tree, effect_keys::COMPUTE_POWER, 1.0);
    }

    let entries = tree.tier_entries();
    let mut product = 1.0;
    for sub in &tree.subcategories {
        let value = entries
            .iter()
            .filter(|(_, entry)| entry.subcategory == Some(sub.id.as_str()))
            .fold(1.0, |acc, (key, entry)| {
                let effect = entry
                    .tier
                    .effects
                    .get(effect_keys::COMPUTE_POWER)
                    .copied()
                    .unwrap_or(0.0);
                let completed = state.tier(&tree.id, key).map_or(0, |t| t.tranches_completed);
                if entry.tier.tranches == 0 {
                    acc
                } else {
                    acc + effect * f64::from(completed) / f64::from(entry.tier.tranches)
                }
            });
        product *= value.max(0.0);
    }
    let n = i32::try_from(tree.subcategories.len()).unwrap_or(i32::MAX);
    product.powf(1.0 / f64::from(n))
}

/// Research bonuses frozen at the start of a tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BonusSnapshot {
    /// Harvest rate multiplier.
    pub mining_rate: f64,
    /// Build rate multiplier.
    pub build_rate: f64,
    /// Dexterity multiplier.
    pub dexterity: f64,
    /// Energy output multiplier.
    pub energy_output: f64,
    /// Storage capacity multiplier.
    pub storage_capacity: f64,
    /// Consumption divisor, applied when above 1.
    pub energy_efficiency: f64,
    /// Factory output multiplier.
    pub production_rate: f64,
    /// Geometric mean of the compute subcategories.
    pub compute_efficiency: f64,
    /// Fractional reduction of probe power draw.
    pub probe_energy_reduction: f64,
    /// Fractional reduction of harvesting power draw.
    pub harvest_energy_reduction: f64,
    /// Dyson construction multiplier.
    pub dyson_construction: f64,
    /// Fractional reduction of the Dyson target mass.
    pub dyson_mass_reduction: f64,
    /// Additive recycling efficiency bonus.
    pub recycling_bonus: f64,
}

impl Default for BonusSnapshot {
    fn default() -> Self {
        Self {
            mining_rate: 1.0,
            build_rate: 1.0,
            dexterity: 1.0,
            energy_output: 1.0,
            storage_capacity: 1.0,
            energy_efficiency: 1.0,
            production_rate: 1.0,
            compute_efficiency: 1.0,
            probe_energy_reduction: 0.0,
            harvest_energy_reduction: 0.0,
            dyson_construction: 1.0,
            dyson_mass_reduction: 0.0,
            recycling_bonus: 0.0,
        }
    }
}

impl BonusSnapshot {
    /// Aggregate every bonus from the current research state.
    #[must_use]
    pub fn capture(state: &GameState, data: &GameData) -> Self {
        let rules = &data.rules;
        let compute_efficiency = compute_efficiency(state, data);
        Self {
            mining_rate: multiplier(state, data, effect_keys::MINING_RATE),
            build_rate: multiplier(state, data, effect_keys::BUILD_RATE),
            dexterity: multiplier(state, data, effect_keys::DEXTERITY),
            energy_output: multiplier(state, data, effect_keys::ENERGY_OUTPUT),
            storage_capacity: multiplier(state, data, effect_keys::STORAGE_CAPACITY),
            energy_efficiency: multiplier(state, data, effect_keys::ENERGY_EFFICIENCY),
            production_rate: multiplier(state, data, effect_keys::PRODUCTION_RATE),
            compute_efficiency,
            probe_energy_reduction: ((compute_efficiency - 1.0)
                * rules.probe_energy_reduction_per_compute)
                .clamp(0.0, rules.max_probe_energy_reduction),
            harvest_energy_reduction: additive(state, data, effect_keys::HARVEST_ENERGY_REDUCTION)
                .clamp(0.0, rules.max_harvest_energy_reduction),
            dyson_construction: multiplier(state, data, effect_keys::DYSON_CONSTRUCTION),
            dyson_mass_reduction: additive(state, data, effect_keys::DYSON_MASS_REDUCTION)
                .clamp(0.0, rules.max_dyson_mass_reduction),
            recycling_bonus: additive(state, data, effect_keys::RECYCLING_EFFICIENCY),
        }
    }

    /// Divisor applied to power consumption.
    #[must_use]
    pub fn consumption_divisor(&self) -> f64 {
        if self.energy_efficiency > 1.0 {
            self.energy_efficiency
        } else {
            1.0
        }
    }

    /// Compute research skill in [0, 1], used by the crowding penalty.
    #[must_use]
    pub fn compute_skill(&self) -> f64 {
        (self.compute_efficiency - 1.0).clamp(0.0, 1.0)
    }
}

// ============================================================================
// Progression
// ============================================================================

/// A tier that may receive compute this tick.
#[derive(Debug, Clone, PartialEq)]
pub struct EligibleTier {
    /// Tree id.
    pub tree: String,
    /// Tier state key.
    pub key: String,
    /// Index within its ordered list.
    pub index: usize,
    /// Tranche ceiling.
    pub tranches: u32,
}

/// Compute routed to one tier, for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchAllocation {
    /// Tree id.
    pub tree: String,
    /// Tier state key.
    pub tier: String,
    /// FLOPS allocated.
    pub flops: f64,
    /// Tranches completed so far.
    pub tranches_completed: u32,
    /// Tranche ceiling.
    pub tranches: u32,
}

/// A tier gained tranches during a tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrancheCompletion {
    /// Tree id.
    pub tree: String,
    /// Tier state key.
    pub tier: String,
    /// Tranches completed after the tick.
    pub tranches_completed: u32,
    /// Whether the tier reached its ceiling.
    pub tier_complete: bool,
}

/// Tiers that are enabled, below their ceiling, and whose predecessor is
/// fully complete.
#[must_use]
pub fn eligible_tiers(state: &GameState, data: &GameData) -> Vec<EligibleTier> {
    let mut eligible = Vec::new();
    for tree in &data.research_trees {
        for (key, entry) in tree.tier_entries() {
            let Some(tier_state) = state.tier(&tree.id, &key) else {
                continue;
            };
            if !tier_state.enabled || tier_state.tranches_completed >= entry.tier.tranches {
                continue;
            }
            let unlocked = match (ResearchTreeData::predecessor_key(&entry), entry.predecessor) {
                (Some(prev_key), Some(prev)) => state
                    .tier(&tree.id, &prev_key)
                    .is_some_and(|t| t.tranches_completed >= prev.tranches),
                _ => true,
            };
            if unlocked {
                eligible.push(EligibleTier {
                    tree: tree.id.clone(),
                    key,
                    index: entry.index,
                    tranches: entry.tier.tranches,
                });
            }
        }
    }
    eligible
}

/// Whether any tier can currently absorb compute.
#[must_use]
pub fn has_compute_demand(state: &GameState, data: &GameData) -> bool {
    !eligible_tiers(state, data).is_empty()
}

/// Equal-share FLOPS allocation across eligible tiers.
#[must_use]
pub fn allocation_info(
    state: &GameState,
    data: &GameData,
    effective_flops: f64,
) -> Vec<ResearchAllocation> {
    let eligible = eligible_tiers(state, data);
    if eligible.is_empty() {
        return Vec::new();
    }
    let share = effective_flops.max(0.0) / eligible.len() as f64;
    eligible
        .into_iter()
        .map(|tier| {
            let completed = state
                .tier(&tier.tree, &tier.key)
                .map_or(0, |t| t.tranches_completed);
            ResearchAllocation {
                tree: tier.tree,
                tier: tier.key,
                flops: share,
                tranches_completed: completed,
                tranches: tier.tranches,
            }
        })
        .collect()
}

/// Advance every eligible tier by its share of `effective_flops` over `dt`.
///
/// Progress is cumulative in FLOP-days, so sub-tranche increments carry
/// across ticks. Completed tranches never decrease and never exceed the
/// ceiling.
pub fn advance_research(
    state: &mut GameState,
    data: &GameData,
    effective_flops: f64,
    dt: f64,
) -> Vec<TrancheCompletion> {
    let eligible = eligible_tiers(state, data);
    if eligible.is_empty() || effective_flops <= 0.0 || dt <= 0.0 {
        return Vec::new();
    }

    let share = effective_flops / eligible.len() as f64;
    let mut completions = Vec::new();

    for tier in eligible {
        let cost = data.rules.tier_cost(tier.index);
        let Some(tier_state) = state
            .research
            .get_mut(&tier.tree)
            .and_then(|t| t.get_mut(&tier.key))
        else {
            continue;
        };

        tier_state.progress += share * dt;
        let tranche_cost = cost / f64::from(tier.tranches);
        if tranche_cost <= 0.0 {
            continue;
        }

        let reached = (tier_state.progress / tranche_cost).floor();
        let reached = if reached >= f64::from(tier.tranches) {
            tier.tranches
        } else {
            // In range [0, tranches) so the cast is lossless
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let whole = reached.max(0.0) as u32;
            whole
        };

        if reached > tier_state.tranches_completed {
            tier_state.tranches_completed = reached;
            let tier_complete = reached >= tier.tranches;
            if tier_complete {
                tier_state.progress = tier_state.progress.min(cost);
                tracing::info!(tree = %tier.tree, tier = %tier.key, "Research tier complete");
            }
            completions.push(TrancheCompletion {
                tree: tier.tree,
                tier: tier.key,
                tranches_completed: reached,
                tier_complete,
            });
        }
    }

    completions
}

/// Enable or disable one tier.
///
/// # Errors
///
/// Returns a not-found error for an unknown tree or tier.
pub fn set_tier_enabled(
    state: &mut GameState,
    tree_id: &str,
    tier_key: &str,
    enabled: bool,
) -> Result<()> {
    let tree = state
        .research
        .get_mut(tree_id)
        .ok_or_else(|| GameError::ResearchTreeNotFound(tree_id.to_string()))?;
    let tier = tree
        .get_mut(tier_key)
        .ok_or_else(|| GameError::ResearchTierNotFound {
            tree: tree_id.to_string(),
            tier: tier_key.to_string(),
        })?;
    tier.enabled = enabled;
    Ok(())
}

/// Enable or disable every tier of every tree in a category.
///
/// Returns how many tiers changed state.
pub fn set_category_enabled(
    state: &mut GameState,
    data: &GameData,
    category: ResearchCategory,
    enabled: bool,
) -> usize {
    let mut toggled = 0;
    for tree in data.research_trees.iter().filter(|t| t.category == category) {
        let Some(tiers) = state.research.get_mut(&tree.id) else {
            continue;
        };
        for tier in tiers.values_mut() {
            if tier.enabled != enabled {
                tier.enabled = enabled;
                toggled += 1;
            }
        }
    }
    toggled
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (GameData, GameState) {
        let data = GameData::solar_system().expect("built-in data");
        let state = GameState::new(&data);
        (data, state)
    }

    fn tier_mut<'a>(state: &'a mut GameState, tree: &str, key: &str) -> &'a mut crate::state::TierState {
        state
            .research
            .get_mut(tree)
            .and_then(|t| t.get_mut(key))
            .expect("tier exists")
    }

    #[test]
    fn test_neutral_bonuses_without_research() {
        let (data, state) = setup();
        let bonuses = BonusSnapshot::capture(&state, &data);
        assert_eq!(bonuses, BonusSnapshot::default());
        assert_eq!(bonuses.consumption_divisor(), 1.0);
    }

    #[test]
    fn test_partial_credit_bonus() {
        let (data, mut state) = setup();
        tier_mut(&mut state, "energy_collection", "photovoltaic_optimization").tranches_completed = 5;
        let tree = data.get_research_tree("energy_collection").unwrap();
        let bonus = research_bonus(&state, tree, effect_keys::ENERGY_OUTPUT, 1.0);
        assert!((bonus - 1.1).abs() < 1e-12);
    }

    #[test]
    fn test_compute_efficiency_geometric_mean() {
        let (data, mut state) = setup();
        // processing fully researched at tier 1: 1.2; other three stay at 1.0
        tier_mut(&mut state, "computer_systems", "processing_parallel_cores").tranches_completed = 10;
        let bonuses = BonusSnapshot::capture(&state, &data);
        let expected = 1.2f64.powf(0.25);
        assert!((bonuses.compute_efficiency - expected).abs() < 1e-12);
        assert!(bonuses.probe_energy_reduction > 0.0);
    }

    #[test]
    fn test_predecessor_gates_eligibility() {
        let (data, mut state) = setup();
        set_tier_enabled(&mut state, "energy_collection", "thin_film_collectors", true).unwrap();
        assert!(eligible_tiers(&state, &data).is_empty());

        tier_mut(&mut state, "energy_collection", "photovoltaic_optimization").tranches_completed = 10;
        let eligible = eligible_tiers(&state, &data);
        assert_eq!(eligible.len(), 1);
        assert_eq!(eligible[0].key, "thin_film_collectors");
        assert_eq!(eligible[0].index, 1);
    }

    #[test]
    fn test_advance_carries_sub_tranche_progress() {
        let (data, mut state) = setup();
        set_tier_enabled(&mut state, "energy_collection", "photovoltaic_optimization", true)
            .unwrap();
        // One tranche costs 1e15 FLOP-days; 0.6 tranche per tick
        let first = advance_research(&mut state, &data, 6e14, 1.0);
        assert!(first.is_empty());
        let second = advance_research(&mut state, &data, 6e14, 1.0);
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].tranches_completed, 1);
    }

    #[test]
    fn test_advance_clamps_at_ceiling() {
        let (data, mut state) = setup();
        set_tier_enabled(&mut state, "energy_collection", "photovoltaic_optimization", true)
            .unwrap();
        let events = advance_research(&mut state, &data, 1e30, 1.0);
        assert_eq!(events[0].tranches_completed, 10);
        assert!(events[0].tier_complete);
        let tier = state.tier("energy_collection", "photovoltaic_optimization").unwrap();
        assert_eq!(tier.tranches_completed, 10);
    }

    #[test]
    fn test_category_toggle_counts() {
        let (data, mut state) = setup();
        let toggled = set_category_enabled(&mut state, &data, ResearchCategory::Intelligence, true);
        assert_eq!(toggled, 5);
        let again = set_category_enabled(&mut state, &data, ResearchCategory::Intelligence, true);
        assert_eq!(again, 0);
    }

    #[test]
    fn test_unknown_tier_errors() {
        let (_, mut state) = setup();
        assert!(matches!(
            set_tier_enabled(&mut state, "alchemy", "t1", true),
            Err(GameError::ResearchTreeNotFound(_))
        ));
        assert!(matches!(
            set_tier_enabled(&mut state, "energy_collection", "t9", true),
            Err(GameError::ResearchTierNotFound { .. })
        ));
    }
}
