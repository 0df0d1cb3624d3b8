//! Identifiers for simulation entities

use serde::{Deserialize, Serialize};

/// Unique identifier for an asset class within a simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AssetId(pub u16);

/// Calendar month offset from the simulation epoch (month 0 = the epoch's month)
pub type MonthIndex = u32;
