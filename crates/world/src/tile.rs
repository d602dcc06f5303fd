//! Tile kinds, prototypes and per-cell tile instances.
//!
//! Every tile kind has one immutable [`TilePrototype`] in the [`TileRegistry`].
//! Cells own independent [`Tile`] values stamped from those prototypes, so
//! damaging one cell never affects another.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Persisted tile identifier.
pub type TileId = u8;

/// Every tile kind known to the world. Discriminants are the on-disk ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum TileKind {
    Water = 0,
    Sand = 1,
    Dirt = 2,
    Hole = 3,
    Grass = 4,
    Flower = 5,
    OakTree = 6,
    BirchTree = 7,
    PineTree = 8,
    Stone = 9,
    Ice = 10,
    Snow = 11,
    Iceberg = 12,
    Cactus = 13,
    IronOre = 14,
}

/// Broad grouping used by generation rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TileCategory {
    Liquid,
    Ground,
    Plant,
    Tree,
    Rock,
}

impl TileKind {
    /// Number of defined kinds.
    pub const COUNT: usize = 15;

    /// All kinds in id order.
    pub const ALL: [TileKind; Self::COUNT] = [
        TileKind::Water,
        TileKind::Sand,
        TileKind::Dirt,
        TileKind::Hole,
        TileKind::Grass,
        TileKind::Flower,
        TileKind::OakTree,
        TileKind::BirchTree,
        TileKind::PineTree,
        TileKind::Stone,
        TileKind::Ice,
        TileKind::Snow,
        TileKind::Iceberg,
        TileKind::Cactus,
        TileKind::IronOre,
    ];

    /// Persisted id.
    #[inline]
    pub const fn id(self) -> TileId {
        self as TileId
    }

    /// Resolve a persisted id.
    pub fn from_id(id: TileId) -> Option<Self> {
        Self::ALL.get(id as usize).copied()
    }

    /// Canonical lowercase name for configs/logging.
    pub const fn as_str(self) -> &'static str {
        match self {
            TileKind::Water => "water",
            TileKind::Sand => "sand",
            TileKind::Dirt => "dirt",
            TileKind::Hole => "hole",
            TileKind::Grass => "grass",
            TileKind::Flower => "flower",
            TileKind::OakTree => "oak_tree",
            TileKind::BirchTree => "birch_tree",
            TileKind::PineTree => "pine_tree",
            TileKind::Stone => "stone",
            TileKind::Ice => "ice",
            TileKind::Snow => "snow",
            TileKind::Iceberg => "iceberg",
            TileKind::Cactus => "cactus",
            TileKind::IronOre => "iron_ore",
        }
    }

    pub const fn category(self) -> TileCategory {
        match self {
            TileKind::Water => TileCategory::Liquid,
            TileKind::Sand
            | TileKind::Dirt
            | TileKind::Hole
            | TileKind::Grass
            | TileKind::Ice
            | TileKind::Snow => TileCategory::Ground,
            TileKind::Flower | TileKind::Cactus => TileCategory::Plant,
            TileKind::OakTree | TileKind::BirchTree | TileKind::PineTree => TileCategory::Tree,
            TileKind::Stone | TileKind::Iceberg | TileKind::IronOre => TileCategory::Rock,
        }
    }

    #[inline]
    pub fn is_tree(self) -> bool {
        self.category() == TileCategory::Tree
    }

    /// Single-character glyph for ASCII maps.
    pub const fn glyph(self) -> char {
        match self {
            TileKind::Water => '~',
            TileKind::Sand => '.',
            TileKind::Dirt => ':',
            TileKind::Hole => 'o',
            TileKind::Grass => ',',
            TileKind::Flower => '*',
            TileKind::OakTree => 'T',
            TileKind::BirchTree => 'B',
            TileKind::PineTree => 'P',
            TileKind::Stone => '#',
            TileKind::Ice => '=',
            TileKind::Snow => '_',
            TileKind::Iceberg => 'A',
            TileKind::Cactus => 'Y',
            TileKind::IronOre => '%',
        }
    }
}

impl fmt::Display for TileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable per-kind template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TilePrototype {
    pub kind: TileKind,
    /// Blocks movement.
    pub solid: bool,
    /// Swimmable; blocks non-swimming agents.
    pub liquid: bool,
    /// Kind this tile degrades into when destroyed.
    pub parent: Option<TileKind>,
    /// Hit points, or `None` for tiles that cannot be damaged.
    pub health: Option<u16>,
    /// Number of cosmetic sprite variants.
    pub variants: u8,
}

impl TilePrototype {
    const fn new(
        kind: TileKind,
        solid: bool,
        liquid: bool,
        parent: Option<TileKind>,
        health: Option<u16>,
        variants: u8,
    ) -> Self {
        Self {
            kind,
            solid,
            liquid,
            parent,
            health,
            variants,
        }
    }
}

/// Result of damaging a tile. The world applies `Destroyed` by replacing the cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HurtOutcome {
    /// The tile has no health and ignores damage.
    Indestructible,
    /// Health was reduced.
    Damaged { remaining: u16 },
    /// Health ran out; the cell should become `becomes`.
    Destroyed { becomes: TileKind },
}

/// One cell's tile. Equality compares the kind only; the variant is cosmetic.
#[derive(Debug, Clone, Copy)]
pub struct Tile {
    pub kind: TileKind,
    pub solid: bool,
    pub liquid: bool,
    pub parent: Option<TileKind>,
    pub health: Option<u16>,
    /// Sprite variant chosen at creation.
    pub variant: u8,
}

impl Tile {
    /// Stamp a tile from its prototype.
    pub fn from_proto(proto: &TilePrototype, variant: u8) -> Self {
        Self {
            kind: proto.kind,
            solid: proto.solid,
            liquid: proto.liquid,
            parent: proto.parent,
            health: proto.health,
            variant: variant.min(proto.variants.saturating_sub(1)),
        }
    }

    #[inline]
    pub fn id(&self) -> TileId {
        self.kind.id()
    }

    /// Open ground an agent may stand on.
    #[inline]
    pub fn is_walkable(&self) -> bool {
        !self.solid && !self.liquid
    }

    /// Apply damage in place.
    pub fn hurt(&mut self, damage: u16) -> HurtOutcome {
        let Some(health) = self.health.filter(|h| *h > 0) else {
            return HurtOutcome::Indestructible;
        };
        let remaining = health.saturating_sub(damage);
        self.health = Some(remaining);
        match (remaining, self.parent) {
            (0, Some(parent)) => HurtOutcome::Destroyed { becomes: parent },
            _ => HurtOutcome::Damaged { remaining },
        }
    }
}

impl PartialEq for Tile {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

impl Eq for Tile {}

/// Prototype table keyed by kind, plus a name index built once at startup.
#[derive(Debug, Clone)]
pub struct TileRegistry {
    protos: [TilePrototype; TileKind::COUNT],
    by_name: BTreeMap<&'static str, TileKind>,
}

impl TileRegistry {
    /// The built-in tile set.
    pub fn standard() -> Self {
        use TileKind::*;
        let protos = [
            TilePrototype::new(Water, false, true, None, None, 3),
            TilePrototype::new(Sand, false, false, Some(Dirt), Some(1), 3),
            TilePrototype::new(Dirt, false, false, Some(Hole), Some(1), 1),
            TilePrototype::new(Hole, false, false, None, None, 3),
            TilePrototype::new(Grass, false, false, Some(Dirt), Some(1), 3),
            TilePrototype::new(Flower, false, false, Some(Grass), Some(1), 1),
            TilePrototype::new(OakTree, true, false, Some(Dirt), Some(16), 2),
            TilePrototype::new(BirchTree, true, false, Some(Dirt), Some(18), 2),
            TilePrototype::new(PineTree, true, false, Some(Dirt), Some(24), 2),
            TilePrototype::new(Stone, true, false, Some(Dirt), Some(24), 1),
            TilePrototype::new(Ice, false, false, Some(Water), Some(4), 3),
            TilePrototype::new(Snow, false, false, Some(Dirt), Some(1), 3),
            TilePrototype::new(Iceberg, true, false, Some(Water), Some(8), 1),
            TilePrototype::new(Cactus, true, false, Some(Sand), Some(8), 1),
            TilePrototype::new(IronOre, true, false, Some(Dirt), Some(26), 1),
        ];
        let by_name = TileKind::ALL
            .iter()
            .map(|kind| (kind.as_str(), *kind))
            .collect();
        Self { protos, by_name }
    }

    /// Prototype for a kind.
    #[inline]
    pub fn proto(&self, kind: TileKind) -> &TilePrototype {
        &self.protos[kind as usize]
    }

    /// Prototype for a persisted id, if the id is defined.
    pub fn get(&self, id: TileId) -> Option<&TilePrototype> {
        self.protos.get(id as usize)
    }

    /// Look up a kind by its canonical name.
    pub fn by_name(&self, name: &str) -> Option<TileKind> {
        self.by_name.get(name).copied()
    }

    /// Iterate prototypes in id order.
    pub fn iter(&self) -> impl Iterator<Item = &TilePrototype> {
        self.protos.iter()
    }

    /// Create a fresh cell tile with a random cosmetic variant.
    pub fn instantiate<R: Rng + ?Sized>(&self, kind: TileKind, rng: &mut R) -> Tile {
        let proto = self.proto(kind);
        let variant = if proto.variants > 1 {
            rng.gen_range(0..proto.variants)
        } else {
            0
        };
        Tile::from_proto(proto, variant)
    }
}

impl Default for TileRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
