//! Static data definitions for the economy.
//!
//! This module contains pure data structures that define zones, buildings,
//! probe types and research trees. All structs are designed to be
//! deserialized from RON files.
//!
//! **Note:** This module performs no file IO. The built-in data set is
//! embedded at compile time; other files are read by callers.

mod building_data;
mod game_data;
mod probe_data;
mod research_data;
mod rules;
mod zone_data;

pub use building_data::{BuildingCategory, BuildingData, BuildingEffects};
pub use game_data::GameData;
pub use probe_data::{ProbeData, PROBE_TYPE};
pub use research_data::{
    effect_keys, tier_key, ResearchCategory, ResearchTreeData, SubcategoryData, TierData, TierRef,
    COMPUTER_SYSTEMS_TREE,
};
pub use rules::{EconomicRules, StartingConditions};
pub use zone_data::ZoneData;
