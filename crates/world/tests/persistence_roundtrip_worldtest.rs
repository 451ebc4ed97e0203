//! Persistence round-trip worldtest.
//!
//! Saves generated chunks spread over several regions, reloads them from a
//! fresh store and checks voxels, metadata and world-level JSON files.

use scapes_core::{EntityId, WorldSeed};
use scapes_world::{
    vanilla_content, ChunkPos, ConditionState, EnvironmentRecord, OverworldGenerators,
    PlayerRecord, WorldMetadata, WorldStore,
};
use std::time::Instant;

const WORLD_SEED: u64 = 55_667_788;

#[test]
fn persistence_roundtrip_worldtest() {
    let dir = tempfile::tempdir().unwrap();
    let generators = OverworldGenerators::new(WorldSeed(WORLD_SEED), vanilla_content());

    // Straddle the region boundary at chunk 0 and chunk 32.
    let positions: Vec<ChunkPos> = [-1, 0, 31, 32]
        .into_iter()
        .flat_map(|x| [-1, 0].into_iter().map(move |y| ChunkPos::new(x, y)))
        .collect();
    let mut chunks: Vec<_> = positions.iter().map(|&p| generators.build_chunk(p)).collect();
    for (i, chunk) in chunks.iter_mut().enumerate() {
        chunk.set_simulation_count(i as i64 * 1000 + 1);
    }

    let save_start = Instant::now();
    {
        let store = WorldStore::open(dir.path()).unwrap();
        store.regions().save_chunks(chunks.iter()).unwrap();
    }
    println!("saved {} chunks in {:?}", chunks.len(), save_start.elapsed());

    let store = WorldStore::open(dir.path()).unwrap();
    for original in &chunks {
        let loaded = store
            .regions()
            .load_chunk(original.position())
            .unwrap()
            .expect("saved chunk must load");
        assert!(loaded.voxels() == original.voxels(), "voxels differ at {}", original.position());
        assert_eq!(loaded.meta(), original.meta());
        assert!(loaded.is_populated());
    }

    // Chunk x -1, 0..=31 and 32 land in region x -1, 0 and 1; y -1 and 0 in
    // region y -1 and 0.
    let region_files = std::fs::read_dir(dir.path().join("regions")).unwrap().count();
    assert_eq!(region_files, 6);
}

#[test]
fn world_files_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let store = WorldStore::open(dir.path()).unwrap();

    assert!(store.load_metadata().unwrap().is_none());
    let metadata = WorldMetadata {
        name: "river-valley".to_string(),
        seed: WorldSeed(99),
        spawn: Some([1024, -12_000, 270]),
    };
    store.save_metadata(&metadata).unwrap();
    assert_eq!(store.load_metadata().unwrap(), Some(metadata));

    let environment = EnvironmentRecord {
        day_time: 0.75,
        day: -3,
        simulation_count: 42,
    };
    store.save_environment(&environment).unwrap();
    assert_eq!(store.load_environment().unwrap(), Some(environment));

    let player = PlayerRecord {
        condition: ConditionState {
            stamina: 0.4,
            sleeping: true,
            ..ConditionState::default()
        },
        position: Some([1024.5, -11_999.5, 271.0]),
    };
    store.save_player(EntityId(7), &player).unwrap();
    assert_eq!(store.load_player(EntityId(7)).unwrap(), Some(player));
    assert_eq!(store.load_player(EntityId(8)).unwrap(), None);

    let text = std::fs::read_to_string(dir.path().join("players").join("7.json")).unwrap();
    assert!(text.contains("\"Condition\""));
    assert!(text.contains("\"Stamina\""));
}
