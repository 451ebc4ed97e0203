//! Static decoration content: ore types and biome decorators.
//!
//! Content is registered once while the server initializes and is read-only
//! afterwards. Registering after [`ContentRegistry::lock`] is a programming
//! error and panics.

use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use scapes_core::RegistryKey;
use tracing::debug;

use crate::biome::BiomeId;
use crate::chunk::{blocks, BlockId};
use crate::terrain::StoneType;

/// An ore that forms veins inside matching stone.
#[derive(Debug, Clone, PartialEq)]
pub struct OreType {
    pub key: RegistryKey,
    pub block: BlockId,
    /// One vein attempt in `rarity` per sampling pass.
    pub rarity: u32,
    /// Blocks visited by the vein walk.
    pub size: RangeInclusive<u32>,
    /// Chance that a visited stone block turns into ore.
    pub chance: f64,
    /// One surface rock in `rock_chance` veins; zero disables rocks.
    pub rock_chance: u32,
    /// Maximum depth below the surface at which a vein still leaves a rock.
    pub rock_distance: u32,
    /// Host stones the vein can form in.
    pub stone_types: Vec<StoneType>,
}

/// Ground a decoration can be placed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ground {
    Soil,
    Sand,
}

impl Ground {
    pub fn accepts(self, block: BlockId) -> bool {
        match self {
            Ground::Soil => matches!(block, blocks::GRASS | blocks::DIRT),
            Ground::Sand => block == blocks::SAND,
        }
    }
}

/// Shape placed on a column.
#[derive(Debug, Clone, PartialEq)]
pub enum Placement {
    /// One block on top of the ground.
    Single(BlockId),
    /// A vertical stack of random height.
    Column {
        block: BlockId,
        height: RangeInclusive<u32>,
    },
    /// A trunk with a leaf blob around its top.
    Tree {
        height: RangeInclusive<u32>,
        radius: u32,
    },
}

/// One placement rule of a decorator.
#[derive(Debug, Clone, PartialEq)]
pub struct DecoratorEntry {
    pub placement: Placement,
    /// Per-column probability.
    pub chance: f64,
    pub ground: Ground,
}

/// Weighted set of placement rules for one biome.
#[derive(Debug, Clone, PartialEq)]
pub struct BiomeDecorator {
    pub key: RegistryKey,
    pub weight: u32,
    pub entries: Vec<DecoratorEntry>,
}

impl BiomeDecorator {
    pub fn builder(key: RegistryKey) -> BiomeDecoratorBuilder {
        BiomeDecoratorBuilder {
            decorator: BiomeDecorator {
                key,
                weight: 1,
                entries: Vec::new(),
            },
        }
    }
}

/// Builder for [`BiomeDecorator`].
#[derive(Debug, Clone)]
pub struct BiomeDecoratorBuilder {
    decorator: BiomeDecorator,
}

impl BiomeDecoratorBuilder {
    /// Relative weight among the biome's decorators; at least 1.
    pub fn weight(mut self, weight: u32) -> Self {
        self.decorator.weight = weight.max(1);
        self
    }

    /// Add a placement on soil.
    pub fn place(self, placement: Placement, chance: f64) -> Self {
        self.place_on(placement, chance, Ground::Soil)
    }

    pub fn place_on(mut self, placement: Placement, chance: f64, ground: Ground) -> Self {
        self.decorator.entries.push(DecoratorEntry {
            placement,
            chance: chance.clamp(0.0, 1.0),
            ground,
        });
        self
    }

    pub fn build(self) -> BiomeDecorator {
        self.decorator
    }
}

/// Registry of ores and per-biome decorators.
#[derive(Debug, Default)]
pub struct ContentRegistry {
    ores: Vec<OreType>,
    decorators: BTreeMap<BiomeId, Vec<BiomeDecorator>>,
    locked: bool,
}

impl ContentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_unlocked(&self) {
        if self.locked {
            panic!("Initializing already ended");
        }
    }

    /// Register an ore.
    ///
    /// # Panics
    /// After [`ContentRegistry::lock`], when the key is already taken or
    /// when the vein size range is empty.
    pub fn register_ore(&mut self, ore: OreType) {
        self.check_unlocked();
        if self.ores.iter().any(|o| o.key == ore.key) {
            panic!("Duplicate ore type: {}", ore.key);
        }
        if ore.size.is_empty() {
            panic!("Empty vein size range for ore type: {}", ore.key);
        }
        debug!(ore = %ore.key, "registered ore");
        self.ores.push(ore);
    }

    /// Register a decorator for a biome.
    ///
    /// # Panics
    /// After [`ContentRegistry::lock`], or when a placement has an empty
    /// height range.
    pub fn register_decorator(&mut self, biome: BiomeId, decorator: BiomeDecorator) {
        self.check_unlocked();
        for entry in &decorator.entries {
            if let Placement::Column { height, .. } | Placement::Tree { height, .. } =
                &entry.placement
            {
                if height.is_empty() {
                    panic!("Empty placement height range in decorator: {}", decorator.key);
                }
            }
        }
        debug!(?biome, decorator = %decorator.key, "registered decorator");
        self.decorators.entry(biome).or_default().push(decorator);
    }

    /// End initialization; the registry is read-only from now on.
    pub fn lock(&mut self) {
        self.locked = true;
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Ores in registration order.
    pub fn ores(&self) -> &[OreType] {
        &self.ores
    }

    pub fn decorators(&self, biome: BiomeId) -> &[BiomeDecorator] {
        self.decorators.get(&biome).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Pick a biome decorator by weight; `roll` is any value, reduced modulo
    /// the biome's total weight.
    pub fn select_decorator(&self, biome: BiomeId, roll: u32) -> Option<&BiomeDecorator> {
        let decorators = self.decorators(biome);
        let total: u64 = decorators.iter().map(|d| d.weight as u64).sum();
        if total == 0 {
            return None;
        }
        let mut pick = roll as u64 % total;
        for decorator in decorators {
            if pick < decorator.weight as u64 {
                return Some(decorator);
            }
            pick -= decorator.weight as u64;
        }
        None
    }
}

fn key(path: &str) -> RegistryKey {
    RegistryKey::vanilla(path)
}

const TALL_GRASS: Placement = Placement::Single(blocks::TALL_GRASS);
const FLOWER: Placement = Placement::Single(blocks::FLOWER);
const BUSH: Placement = Placement::Single(blocks::BUSH);

fn tree(height: RangeInclusive<u32>, radius: u32) -> Placement {
    Placement::Tree { height, radius }
}

/// Register the bundled ores and biome decorators.
pub fn register_vanilla(registry: &mut ContentRegistry) {
    use StoneType::*;

    let ores = [
        ("ore/coal", blocks::COAL_ORE, 3, 6..=16, 0.7, 4, 12, vec![Limestone, Sandstone, Andesite]),
        ("ore/copper", blocks::COPPER_ORE, 4, 4..=12, 0.6, 6, 10, vec![Granite, Andesite, Diorite]),
        ("ore/tin", blocks::TIN_ORE, 5, 4..=10, 0.6, 6, 10, vec![Granite, Diorite]),
        ("ore/iron", blocks::IRON_ORE, 4, 4..=12, 0.5, 8, 8, vec![Basalt, Andesite, Limestone]),
        ("ore/gold", blocks::GOLD_ORE, 12, 2..=6, 0.5, 0, 0, vec![Granite, Marble]),
        ("ore/silver", blocks::SILVER_ORE, 10, 2..=6, 0.5, 0, 0, vec![Diorite, Andesite]),
        ("ore/sulfur", blocks::SULFUR_ORE, 8, 4..=10, 0.6, 3, 16, vec![Basalt]),
        ("ore/crystal", blocks::CRYSTAL_ORE, 24, 1..=4, 0.8, 0, 0, vec![Marble, Granite]),
    ];
    for (path, block, rarity, size, chance, rock_chance, rock_distance, stone_types) in ores {
        registry.register_ore(OreType {
            key: key(path),
            block,
            rarity,
            size,
            chance,
            rock_chance,
            rock_distance,
            stone_types,
        });
    }

    let decorators = [
        (
            BiomeId::Forest,
            BiomeDecorator::builder(key("decorator/forest"))
                .weight(3)
                .place(tree(5..=8, 2), 0.03)
                .place(TALL_GRASS, 0.2)
                .place(FLOWER, 0.02)
                .build(),
        ),
        (
            BiomeId::Forest,
            BiomeDecorator::builder(key("decorator/forest_clearing"))
                .place(TALL_GRASS, 0.3)
                .place(FLOWER, 0.05)
                .place(tree(5..=7, 2), 0.004)
                .build(),
        ),
        (
            BiomeId::Plains,
            BiomeDecorator::builder(key("decorator/plains"))
                .weight(4)
                .place(TALL_GRASS, 0.3)
                .place(FLOWER, 0.04)
                .place(BUSH, 0.01)
                .place(tree(4..=6, 2), 0.002)
                .build(),
        ),
        (
            BiomeId::Plains,
            BiomeDecorator::builder(key("decorator/meadow"))
                .place(FLOWER, 0.15)
                .place(TALL_GRASS, 0.4)
                .build(),
        ),
        (
            BiomeId::Taiga,
            BiomeDecorator::builder(key("decorator/taiga"))
                .place(tree(7..=11, 2), 0.04)
                .place(BUSH, 0.02)
                .build(),
        ),
        (
            BiomeId::Tundra,
            BiomeDecorator::builder(key("decorator/tundra"))
                .place(TALL_GRASS, 0.05)
                .place(BUSH, 0.01)
                .build(),
        ),
        (
            BiomeId::Savanna,
            BiomeDecorator::builder(key("decorator/savanna"))
                .place(tree(4..=6, 3), 0.004)
                .place(TALL_GRASS, 0.25)
                .place(BUSH, 0.02)
                .build(),
        ),
        (
            BiomeId::Desert,
            BiomeDecorator::builder(key("decorator/desert"))
                .place_on(
                    Placement::Column {
                        block: blocks::CACTUS,
                        height: 2..=4,
                    },
                    0.006,
                    Ground::Sand,
                )
                .place_on(Placement::Single(blocks::BUSH), 0.003, Ground::Sand)
                .build(),
        ),
        (
            BiomeId::RainForest,
            BiomeDecorator::builder(key("decorator/rain_forest"))
                .place(tree(8..=14, 3), 0.08)
                .place(BUSH, 0.1)
                .place(TALL_GRASS, 0.3)
                .build(),
        ),
        (
            BiomeId::Swamp,
            BiomeDecorator::builder(key("decorator/swamp"))
                .place(tree(5..=7, 2), 0.02)
                .place(TALL_GRASS, 0.2)
                .place(BUSH, 0.05)
                .build(),
        ),
    ];
    for (biome, decorator) in decorators {
        registry.register_decorator(biome, decorator);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vanilla_content_registers() {
        let mut registry = ContentRegistry::new();
        register_vanilla(&mut registry);
        registry.lock();
        assert_eq!(registry.ores().len(), 8);
        assert_eq!(registry.ores()[0].key.to_string(), "VanillaBasics:ore/coal");
        assert_eq!(registry.decorators(BiomeId::Forest).len(), 2);
        assert!(registry.decorators(BiomeId::Ocean).is_empty());
        for ore in registry.ores() {
            assert!(ore.rarity > 0);
            assert!(!ore.stone_types.is_empty());
            assert!(ore.size.start() <= ore.size.end());
        }
    }

    #[test]
    #[should_panic(expected = "Initializing already ended")]
    fn registering_ore_after_lock_panics() {
        let mut registry = ContentRegistry::new();
        registry.lock();
        registry.register_ore(OreType {
            key: RegistryKey::vanilla("ore/late"),
            block: blocks::COAL_ORE,
            rarity: 1,
            size: 1..=1,
            chance: 1.0,
            rock_chance: 0,
            rock_distance: 0,
            stone_types: vec![StoneType::Granite],
        });
    }

    #[test]
    #[should_panic(expected = "Initializing already ended")]
    fn registering_decorator_after_lock_panics() {
        let mut registry = ContentRegistry::new();
        registry.lock();
        registry.register_decorator(
            BiomeId::Plains,
            BiomeDecorator::builder(RegistryKey::vanilla("decorator/late")).build(),
        );
    }

    #[test]
    #[should_panic(expected = "Empty vein size range")]
    fn empty_vein_size_is_rejected() {
        let mut registry = ContentRegistry::new();
        #[allow(clippy::reversed_empty_ranges)]
        let size = 5..=2;
        registry.register_ore(OreType {
            key: RegistryKey::vanilla("ore/broken"),
            block: blocks::COAL_ORE,
            rarity: 1,
            size,
            chance: 1.0,
            rock_chance: 0,
            rock_distance: 0,
            stone_types: vec![StoneType::Granite],
        });
    }

    #[test]
    #[should_panic(expected = "Empty placement height range")]
    fn empty_tree_height_is_rejected() {
        let mut registry = ContentRegistry::new();
        #[allow(clippy::reversed_empty_ranges)]
        let height = 8..=5;
        registry.register_decorator(
            BiomeId::Forest,
            BiomeDecorator::builder(RegistryKey::vanilla("decorator/broken"))
                .place(tree(height, 2), 0.5)
                .build(),
        );
    }

    #[test]
    fn weighted_selection_covers_all_decorators() {
        let mut registry = ContentRegistry::new();
        register_vanilla(&mut registry);
        let forest = registry.decorators(BiomeId::Forest);
        let total: u32 = forest.iter().map(|d| d.weight).sum();
        assert_eq!(total, 4);
        let picks: Vec<_> = (0..total)
            .filter_map(|roll| registry.select_decorator(BiomeId::Forest, roll))
            .map(|d| d.key.path().to_string())
            .collect();
        assert_eq!(
            picks,
            vec![
                "decorator/forest",
                "decorator/forest",
                "decorator/forest",
                "decorator/forest_clearing"
            ]
        );
        assert!(registry.select_decorator(BiomeId::Volcano, 7).is_none());
    }

    #[test]
    fn builder_clamps_values() {
        let decorator = BiomeDecorator::builder(RegistryKey::vanilla("decorator/test"))
            .weight(0)
            .place(Placement::Single(blocks::FLOWER), 3.0)
            .build();
        assert_eq!(decorator.weight, 1);
        assert_eq!(decorator.entries[0].chance, 1.0);
        assert_eq!(decorator.entries[0].ground, Ground::Soil);
    }

    #[test]
    fn ground_rules() {
        assert!(Ground::Soil.accepts(blocks::GRASS));
        assert!(!Ground::Soil.accepts(blocks::SAND));
        assert!(Ground::Sand.accepts(blocks::SAND));
    }
}
