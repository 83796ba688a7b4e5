//! Filesystem population: one `<id>.prg` JSON file per agent.

use std::io::{self, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;
use tokio::fs;
use tracing::{debug, warn};

use super::{Agent, Population};
use crate::error::{PopulationError, PopulationResult};
use crate::models::AgentId;

/// Extension of agent files inside a population directory.
pub const FILE_EXTENSION: &str = "prg";

const MAX_ID_ATTEMPTS: usize = 64;

/// Population stored as a directory of serialized agents.
#[derive(Debug)]
pub struct FsPopulation<A> {
    dir: PathBuf,
    _agent: PhantomData<fn() -> A>,
}

impl<A> FsPopulation<A>
where
    A: Agent + Serialize + DeserializeOwned,
{
    /// Open an existing population directory.
    ///
    /// Fails if the path does not exist, is not a directory or cannot be read.
    pub async fn open(dir: impl Into<PathBuf>) -> PopulationResult<Self> {
        let dir = dir.into();
        check_path(&dir).await?;
        debug!("Opened population at {}", dir.display());
        Ok(Self {
            dir,
            _agent: PhantomData,
        })
    }

    /// Open a population directory, creating it first if needed.
    pub async fn create(dir: impl Into<PathBuf>) -> PopulationResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        Self::open(dir).await
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Load every stored agent, ordered by identity.
    pub async fn load_all(&self) -> PopulationResult<Vec<A>> {
        let mut agents = Vec::new();
        for id in self.list_identities().await? {
            agents.push(self.fetch(id).await?);
        }
        Ok(agents)
    }

    fn path_for(&self, id: AgentId) -> PathBuf {
        self.dir.join(format!("{}.{}", id, FILE_EXTENSION))
    }

    async fn free_identity(&self) -> PopulationResult<AgentId> {
        for _ in 0..MAX_ID_ATTEMPTS {
            let candidate = AgentId::new(rand::random::<u64>() >> 1);
            if !fs::try_exists(self.path_for(candidate)).await? {
                return Ok(candidate);
            }
        }
        Err(PopulationError::IdentityExhausted {
            attempts: MAX_ID_ATTEMPTS,
        })
    }
}

#[async_trait]
impl<A> Population for FsPopulation<A>
where
    A: Agent + Serialize + DeserializeOwned,
{
    type Agent = A;

    async fn list_identities(&self) -> PopulationResult<Vec<AgentId>> {
        let mut ids = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(FILE_EXTENSION) {
                continue;
            }
            match parse_identity(&path) {
                Some(id) => ids.push(id),
                None => warn!("Skipping unrecognised agent file {}", path.display()),
            }
        }

        ids.sort();
        Ok(ids)
    }

    async fn fetch(&self, id: AgentId) -> PopulationResult<A> {
        let path = self.path_for(id);
        let content = match fs::read(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(PopulationError::NotFound(id))
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_slice(&content)?)
    }

    async fn persist(&self, mut agent: A) -> PopulationResult<AgentId> {
        let id = match agent.identity() {
            Some(id) => id,
            None => {
                let id = self.free_identity().await?;
                agent.assign_identity(id);
                id
            }
        };

        let content = serde_json::to_vec_pretty(&agent)?;
        let target = self.path_for(id);
        write_atomic(self.dir.clone(), target.clone(), content).await?;

        debug!("Persisted agent {} to {}", id, target.display());
        Ok(id)
    }

    async fn remove(&self, id: AgentId) -> PopulationResult<()> {
        match fs::remove_file(self.path_for(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(PopulationError::NotFound(id))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Identity named by an agent file. Only the canonical decimal form written
/// by `path_for` counts, so `007.prg` or `+7.prg` never alias agent 7.
fn parse_identity(path: &Path) -> Option<AgentId> {
    let stem = path.file_stem()?.to_str()?;
    let id: AgentId = stem.parse().ok()?;
    (id.to_string() == stem).then_some(id)
}

/// Write `content` to `target` through a uniquely named staging file in `dir`.
async fn write_atomic(dir: PathBuf, target: PathBuf, content: Vec<u8>) -> io::Result<()> {
    tokio::task::spawn_blocking(move || -> io::Result<()> {
        let mut staging = NamedTempFile::new_in(&dir)?;
        staging.write_all(&content)?;
        staging.persist(&target).map_err(|e| e.error)?;
        Ok(())
    })
    .await
    .map_err(io::Error::from)?
}

async fn check_path(dir: &Path) -> PopulationResult<()> {
    let invalid = |reason: &str| PopulationError::InvalidPath {
        path: dir.to_path_buf(),
        reason: reason.to_string(),
    };

    let metadata = match fs::metadata(dir).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(invalid("does not exist"))
        }
        Err(e) => return Err(e.into()),
    };

    if !metadata.is_dir() {
        return Err(invalid("is not a directory"));
    }

    if fs::read_dir(dir).await.is_err() {
        return Err(invalid("is not readable"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Prediction, Robot};
    use tempfile::TempDir;

    fn robot() -> Robot {
        Robot::new(serde_json::json!({"instructions": ["push 1", "ret"]}))
    }

    #[tokio::test]
    async fn test_open_rejects_missing_dir() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("nope");

        let err = FsPopulation::<Robot>::open(&missing).await.unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[tokio::test]
    async fn test_open_rejects_file() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("robots.txt");
        std::fs::write(&file, "not a dir").unwrap();

        let err = FsPopulation::<Robot>::open(&file).await.unwrap_err();
        assert!(err.to_string().contains("is not a directory"));
    }

    #[tokio::test]
    async fn test_persist_and_fetch() {
        let tmp = TempDir::new().unwrap();
        let population = FsPopulation::<Robot>::create(tmp.path().join("pop"))
            .await
            .unwrap();

        let mut robot = robot();
        robot.record_prediction(Prediction::Down);
        let id = population.persist(robot.clone()).await.unwrap();

        assert!(population.dir().join(format!("{}.prg", id)).exists());

        let loaded = population.fetch(id).await.unwrap();
        assert_eq!(loaded.id, Some(id));
        assert_eq!(loaded.program, robot.program);
        assert_eq!(loaded.predictions, vec![Prediction::Down]);
    }

    #[tokio::test]
    async fn test_persist_is_upsert() {
        let tmp = TempDir::new().unwrap();
        let population = FsPopulation::<Robot>::open(tmp.path()).await.unwrap();

        let id = population.persist(robot()).await.unwrap();
        let mut loaded = population.fetch(id).await.unwrap();
        loaded.record_prediction(Prediction::Up);
        let again = population.persist(loaded).await.unwrap();

        assert_eq!(id, again);
        assert_eq!(population.count().await.unwrap(), 1);
        assert_eq!(
            population.fetch(id).await.unwrap().predictions,
            vec![Prediction::Up]
        );
    }

    #[tokio::test]
    async fn test_listing_ignores_foreign_files() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("notes.md"), "# notes").unwrap();
        std::fs::write(tmp.path().join("garbage.prg"), "{}").unwrap();

        let population = FsPopulation::<Robot>::open(tmp.path()).await.unwrap();
        let id = population.persist(robot()).await.unwrap();

        assert_eq!(population.list_identities().await.unwrap(), vec![id]);
    }

    #[tokio::test]
    async fn test_listing_skips_non_canonical_names() {
        let tmp = TempDir::new().unwrap();
        let stored = serde_json::to_vec(&robot()).unwrap();
        for name in ["7.prg", "007.prg", "+7.prg", " 7.prg"] {
            std::fs::write(tmp.path().join(name), &stored).unwrap();
        }

        let population = FsPopulation::<Robot>::open(tmp.path()).await.unwrap();

        assert_eq!(population.list_identities().await.unwrap(), vec![AgentId::new(7)]);
        assert!(population.fetch(AgentId::new(7)).await.is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_persists_leave_no_staging_files() {
        let tmp = TempDir::new().unwrap();
        let population = std::sync::Arc::new(FsPopulation::<Robot>::open(tmp.path()).await.unwrap());
        let id = population.persist(robot()).await.unwrap();
        let stored = population.fetch(id).await.unwrap();

        let mut writers = Vec::new();
        for _ in 0..8 {
            let population = std::sync::Arc::clone(&population);
            let mut copy = stored.clone();
            copy.record_prediction(Prediction::Up);
            writers.push(tokio::spawn(async move { population.persist(copy).await }));
        }
        for writer in writers {
            assert_eq!(writer.await.unwrap().unwrap(), id);
        }

        let files: Vec<_> = std::fs::read_dir(tmp.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(files, vec![std::ffi::OsString::from(format!("{}.prg", id))]);
        assert_eq!(
            population.fetch(id).await.unwrap().predictions,
            vec![Prediction::Up]
        );
    }

    #[tokio::test]
    async fn test_remove_and_not_found() {
        let tmp = TempDir::new().unwrap();
        let population = FsPopulation::<Robot>::open(tmp.path()).await.unwrap();
        let id = population.persist(robot()).await.unwrap();

        population.remove(id).await.unwrap();

        assert!(matches!(
            population.fetch(id).await,
            Err(PopulationError::NotFound(_))
        ));
        assert!(matches!(
            population.remove(id).await,
            Err(PopulationError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_range_and_remove_all() {
        let tmp = TempDir::new().unwrap();
        let population = FsPopulation::<Robot>::open(tmp.path()).await.unwrap();
        for _ in 0..4 {
            population.persist(robot()).await.unwrap();
        }

        let all = population.list_identities().await.unwrap();
        let middle = population.list_range(1, 3).await.unwrap();
        assert_eq!(middle, all[1..3].to_vec());

        assert_eq!(population.remove_all().await.unwrap(), 4);
        assert!(population.load_all().await.unwrap().is_empty());
    }
}
