//! Genome archival between runs.
//!
//! The archive collaborator owns the on-disk format; the simulation only
//! hands it [`BrainSnapshot`] records and takes them back. The stock
//! implementation writes one JSON file per generation.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use vivarium_data::BrainSnapshot;

/// Stores and retrieves whole-population brain snapshots.
pub trait GenomeArchive: Send + Sync {
    /// Persists one generation's snapshots.
    fn save(&self, generation: u64, snapshots: &[BrainSnapshot]) -> anyhow::Result<()>;

    /// Loads a specific generation.
    fn load_generation(&self, generation: u64) -> anyhow::Result<Vec<BrainSnapshot>>;

    /// Loads the most recent archived generation, if any exists.
    fn load_latest(&self) -> anyhow::Result<Option<(u64, Vec<BrainSnapshot>)>>;
}

#[derive(Serialize, Deserialize)]
struct ArchiveFile {
    generation: u64,
    snapshots: Vec<BrainSnapshot>,
}

/// One `generation_{n}.json` file per generation under a base directory.
pub struct JsonArchive {
    dir: PathBuf,
}

impl JsonArchive {
    pub fn new(dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("creating archive directory {}", dir.display()))?;
        Ok(Self { dir })
    }

    fn path_for(&self, generation: u64) -> PathBuf {
        self.dir.join(format!("generation_{generation}.json"))
    }

    fn parse_generation(path: &Path) -> Option<u64> {
        let stem = path.file_stem()?.to_str()?;
        stem.strip_prefix("generation_")?.parse().ok()
    }
}

impl GenomeArchive for JsonArchive {
    fn save(&self, generation: u64, snapshots: &[BrainSnapshot]) -> anyhow::Result<()> {
        let path = self.path_for(generation);
        let file = ArchiveFile {
            generation,
            snapshots: snapshots.to_vec(),
        };
        let raw = serde_json::to_string(&file).context("serializing snapshots")?;
        fs::write(&path, raw).with_context(|| format!("writing {}", path.display()))?;
        tracing::info!(generation = generation, count = file.snapshots.len(), path = %path.display(), "archived generation");
        Ok(())
    }

    fn load_generation(&self, generation: u64) -> anyhow::Result<Vec<BrainSnapshot>> {
        let path = self.path_for(generation);
        let raw =
            fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
        let file: ArchiveFile =
            serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
        Ok(file.snapshots)
    }

    fn load_latest(&self) -> anyhow::Result<Option<(u64, Vec<BrainSnapshot>)>> {
        let mut latest: Option<u64> = None;
        for entry in fs::read_dir(&self.dir)
            .with_context(|| format!("listing {}", self.dir.display()))?
        {
            let entry = entry?;
            if let Some(generation) = Self::parse_generation(&entry.path()) {
                latest = Some(latest.map_or(generation, |g| g.max(generation)));
            }
        }
        let Some(generation) = latest else {
            return Ok(None);
        };
        let snapshots = self.load_generation(generation)?;
        Ok(Some((generation, snapshots)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vivarium_data::{BrainType, EntityId, SpeciesType};

    fn snapshot(id: u64, fitness: f32) -> BrainSnapshot {
        BrainSnapshot {
            entity_id: EntityId(id),
            species: SpeciesType::Herbivore,
            brain: BrainType::Movement,
            weights: vec![0.1, 0.2, 0.3],
            fitness,
            bias: 0.05,
            extra_param: 1.0,
            total_weight_count: 3,
        }
    }

    #[test]
    fn test_save_and_load_generation() {
        let dir = tempfile::tempdir().expect("tempdir");
        let archive = JsonArchive::new(dir.path()).expect("archive");
        let records = vec![snapshot(1, 2.5), snapshot(2, 0.0)];

        archive.save(3, &records).expect("save");
        let loaded = archive.load_generation(3).expect("load");
        assert_eq!(loaded, records);
    }

    #[test]
    fn test_load_latest_picks_highest_generation() {
        let dir = tempfile::tempdir().expect("tempdir");
        let archive = JsonArchive::new(dir.path()).expect("archive");
        archive.save(1, &[snapshot(1, 1.0)]).expect("save");
        archive.save(10, &[snapshot(2, 2.0)]).expect("save");
        archive.save(4, &[snapshot(3, 3.0)]).expect("save");

        let (generation, snapshots) = archive.load_latest().expect("load").expect("non-empty");
        assert_eq!(generation, 10);
        assert_eq!(snapshots[0].entity_id, EntityId(2));
    }

    #[test]
    fn test_load_latest_on_empty_archive_is_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let archive = JsonArchive::new(dir.path()).expect("archive");
        assert!(archive.load_latest().expect("load").is_none());
    }

    #[test]
    fn test_missing_generation_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let archive = JsonArchive::new(dir.path()).expect("archive");
        assert!(archive.load_generation(99).is_err());
    }
}
