use std::fmt;

use serde::Serialize;

use crate::codec::SignalType;

/// Lookup namespace for prototype ids. Ids are only unique within a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    Item,
    Fluid,
    VirtualSignal,
    Tile,
    Entity,
    Recipe,
    Equipment,
    Quality,
    Planet,
}

impl Category {
    /// Width in bytes of an id reference into this category.
    pub fn id_width(self) -> usize {
        match self {
            Self::Tile | Self::Quality => 1,
            _ => 2,
        }
    }

    /// Category for a dictionary group, if the group is one we know about.
    pub fn of_group(group: &str) -> Option<Self> {
        Some(match group {
            "item" | "ammo" | "armor" | "blueprint" | "blueprint-book" | "capsule"
            | "copy-paste-tool" | "deconstruction-item" | "gun" | "item-with-entity-data"
            | "item-with-inventory" | "item-with-label" | "item-with-tags" | "mining-tool" | "module"
            | "rail-planner" | "repair-tool" | "selection-tool" | "space-platform-starter-pack"
            | "spidertron-remote" | "tool" | "upgrade-item" => Self::Item,

            "fluid" => Self::Fluid,
            "virtual-signal" => Self::VirtualSignal,
            "tile" => Self::Tile,
            "recipe" => Self::Recipe,
            "quality" => Self::Quality,
            "planet" => Self::Planet,

            "active-defense-equipment" | "battery-equipment" | "belt-immunity-equipment"
            | "energy-shield-equipment" | "equipment-ghost" | "generator-equipment"
            | "inventory-bonus-equipment" | "movement-bonus-equipment"
            | "night-vision-equipment" | "roboport-equipment" | "solar-panel-equipment" => {
                Self::Equipment
            }

            "accumulator" | "agricultural-tower" | "ammo-turret" | "arithmetic-combinator"
            | "artillery-turret" | "artillery-wagon" | "assembling-machine" | "asteroid"
            | "asteroid-collector" | "beacon" | "boiler" | "burner-generator" | "car"
            | "cargo-bay" | "cargo-landing-pad" | "cargo-wagon" | "character-corpse" | "cliff"
            | "constant-combinator" | "construction-robot" | "container" | "corpse"
            | "curved-rail" | "curved-rail-a" | "curved-rail-b" | "decider-combinator"
            | "display-panel" | "electric-energy-interface" | "electric-pole"
            | "electric-turret" | "elevated-curved-rail-a" | "elevated-curved-rail-b"
            | "elevated-half-diagonal-rail" | "elevated-straight-rail" | "entity-ghost" | "fish"
            | "fluid-turret" | "fluid-wagon" | "flying-text" | "furnace" | "fusion-generator"
            | "fusion-reactor" | "gate" | "generator" | "half-diagonal-rail" | "heat-interface"
            | "heat-pipe" | "infinity-container" | "infinity-pipe" | "inserter" | "item-entity"
            | "item-request-proxy"
            | "lab" | "lamp" | "land-mine" | "lane-splitter" | "legacy-curved-rail"
            | "legacy-straight-rail" | "lightning-attractor" | "linked-belt"
            | "linked-container" | "loader" | "loader-1x1" | "locomotive" | "logistic-container"
            | "logistic-robot" | "market" | "mining-drill" | "offshore-pump" | "pipe"
            | "pipe-to-ground" | "plant" | "player-port" | "power-switch"
            | "programmable-speaker" | "pump" | "radar" | "rail-chain-signal" | "rail-ramp"
            | "rail-signal" | "rail-support" | "reactor" | "roboport" | "rocket-silo"
            | "selector-combinator" | "simple-entity" | "simple-entity-with-force"
            | "simple-entity-with-owner" | "solar-panel" | "space-platform-hub"
            | "spider-vehicle" | "splitter" | "storage-tank" | "straight-rail" | "thruster"
            | "tile-ghost"
            | "train-stop" | "transport-belt" | "tree" | "turret" | "underground-belt"
            | "unit" | "unit-spawner" | "valve" | "wall" => Self::Entity,

            _ => return None,
        })
    }
}

impl From<SignalType> for Category {
    fn from(signal: SignalType) -> Self {
        match signal {
            SignalType::Item => Self::Item,
            SignalType::Fluid => Self::Fluid,
            SignalType::VirtualSignal => Self::VirtualSignal,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Item => "ITEM",
            Self::Fluid => "FLUID",
            Self::VirtualSignal => "VIRTUAL_SIGNAL",
            Self::Tile => "TILE",
            Self::Entity => "ENTITY",
            Self::Recipe => "RECIPE",
            Self::Equipment => "EQUIPMENT",
            Self::Quality => "QUALITY",
            Self::Planet => "PLANET",
        })
    }
}
