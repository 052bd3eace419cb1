use bytes::Bytes;
use serde::{Serialize, Serializer};

use crate::codec::SignalType;
use crate::prototype::Category;

/// The four kinds of library object, in wire selector order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LibraryKind {
    Blueprint,
    BlueprintBook,
    DeconstructionPlanner,
    UpgradePlanner,
}

impl LibraryKind {
    pub const ALL: [LibraryKind; 4] = [
        Self::Blueprint,
        Self::BlueprintBook,
        Self::DeconstructionPlanner,
        Self::UpgradePlanner,
    ];

    /// Item prototype group the object's header must resolve to.
    pub fn expected_group(self) -> &'static str {
        match self {
            Self::Blueprint => "blueprint",
            Self::BlueprintBook => "blueprint-book",
            Self::DeconstructionPlanner => "deconstruction-item",
            Self::UpgradePlanner => "upgrade-item",
        }
    }
}

/// A used library slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "key", rename_all = "snake_case")]
pub enum LibraryEntry {
    Blueprint(Blueprint),
    BlueprintBook(BlueprintBook),
    DeconstructionPlanner(DeconstructionPlanner),
    UpgradePlanner(UpgradePlanner),
}

impl LibraryEntry {
    pub fn kind(&self) -> LibraryKind {
        match self {
            Self::Blueprint(_) => LibraryKind::Blueprint,
            Self::BlueprintBook(_) => LibraryKind::BlueprintBook,
            Self::DeconstructionPlanner(_) => LibraryKind::DeconstructionPlanner,
            Self::UpgradePlanner(_) => LibraryKind::UpgradePlanner,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Blueprint(b) => &b.label,
            Self::BlueprintBook(b) => &b.label,
            Self::DeconstructionPlanner(d) => &d.label,
            Self::UpgradePlanner(u) => &u.label,
        }
    }

    pub fn generation(&self) -> u32 {
        match self {
            Self::Blueprint(b) => b.generation,
            Self::BlueprintBook(b) => b.generation,
            Self::DeconstructionPlanner(d) => d.generation,
            Self::UpgradePlanner(u) => u.generation,
        }
    }

    /// `None` for blueprints, whose description is not decoded yet.
    pub fn description(&self) -> Option<&str> {
        match self {
            Self::Blueprint(b) => b.description.as_deref(),
            Self::BlueprintBook(b) => Some(&b.description),
            Self::DeconstructionPlanner(d) => Some(&d.description),
            Self::UpgradePlanner(u) => Some(&u.description),
        }
    }

    /// Child slots of a book. Empty for everything else.
    pub fn children(&self) -> &[Option<LibraryEntry>] {
        match self {
            Self::BlueprintBook(b) => &b.children,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Blueprint {
    pub generation: u32,
    pub label: String,
    /// Lives inside the undecoded payload.
    pub description: Option<String>,
    pub removed_mods: bool,
    /// Blueprint contents, not decoded.
    #[serde(serialize_with = "serialize_hex")]
    pub payload: Bytes,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlueprintBook {
    pub generation: u32,
    pub label: String,
    pub description: String,
    pub icons: Vec<Icon>,
    pub children: Vec<Option<LibraryEntry>>,
    pub active_index: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeconstructionPlanner {
    pub generation: u32,
    pub label: String,
    pub description: String,
    pub icons: Vec<Icon>,
    pub entity_filter_mode: u8,
    pub entity_filters: FilterSet,
    pub trees_rocks_only: bool,
    pub tile_filter_mode: u8,
    pub tile_selection_mode: u8,
    pub tile_filters: FilterSet,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpgradePlanner {
    pub generation: u32,
    pub label: String,
    pub description: String,
    pub icons: Vec<Icon>,
    /// Names stored for mapper slots whose prototype is missing. Not applied to `mappers`.
    pub unknown_overrides: Vec<UpgradeOverride>,
    pub mappers: Vec<Mapper>,
}

/// Icon slot. `index` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Icon {
    pub index: u16,
    pub signal: Signal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Signal {
    #[serde(rename = "type")]
    pub kind: SignalType,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterSet {
    pub entries: Vec<Filter>,
    /// Only present in 2.0 and later streams.
    pub quality: Vec<Filter>,
}

/// Filter slot. `index` is 0-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Filter {
    pub index: u16,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MapperSide {
    From,
    To,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpgradeOverride {
    pub index: u16,
    pub name: String,
    pub side: MapperSide,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mapper {
    pub index: u16,
    pub from: MapperTarget,
    pub to: MapperTarget,
}

/// One side of an upgrade mapping. `kind` is `Item` or `Entity`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MapperTarget {
    #[serde(rename = "type")]
    pub kind: Category,
    pub name: String,
}

fn serialize_hex<S: Serializer>(bytes: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&hex::encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blueprint(label: &str) -> LibraryEntry {
        LibraryEntry::Blueprint(Blueprint {
            generation: 3,
            label: label.into(),
            description: None,
            removed_mods: false,
            payload: Bytes::from_static(&[0xDE, 0xAD]),
        })
    }

    #[test]
    fn test_blueprint_json() {
        let json = serde_json::to_value(blueprint("Smelting")).unwrap();
        assert_eq!(json["key"], "blueprint");
        assert_eq!(json["label"], "Smelting");
        assert_eq!(json["payload"], "dead");
        assert!(json["description"].is_null());
    }

    #[test]
    fn test_book_accessors() {
        let book = LibraryEntry::BlueprintBook(BlueprintBook {
            generation: 9,
            label: "Book".into(),
            description: "things".into(),
            icons: vec![Icon {
                index: 1,
                signal: Signal {
                    kind: SignalType::Item,
                    name: "iron-plate".into(),
                },
            }],
            children: vec![Some(blueprint("a")), None],
            active_index: 0,
        });
        assert_eq!(book.kind(), LibraryKind::BlueprintBook);
        assert_eq!(book.label(), "Book");
        assert_eq!(book.generation(), 9);
        assert_eq!(book.description(), Some("things"));
        assert_eq!(book.children().len(), 2);
        assert!(blueprint("x").children().is_empty());

        let json = serde_json::to_value(&book).unwrap();
        assert_eq!(json["key"], "blueprint_book");
        assert_eq!(json["icons"][0]["signal"]["type"], "ITEM");
        assert!(json["children"][1].is_null());
    }

    #[test]
    fn test_expected_groups() {
        let groups: Vec<_> = LibraryKind::ALL.iter().map(|k| k.expected_group()).collect();
        assert_eq!(
            groups,
            ["blueprint", "blueprint-book", "deconstruction-item", "upgrade-item"]
        );
    }
}
