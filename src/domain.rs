use crate::errors::RepoError;
use crate::models::{Meme, MemePatch, NewMeme};
use async_trait::async_trait;
use uuid::Uuid;

/// Storage operations for meme records.
///
/// Implementations own identifier and timestamp assignment and must enforce
/// uniqueness of the (name, url, caption) triple atomically, so that
/// concurrent writers racing on the same triple see exactly one success.
#[async_trait]
pub trait MemeRepository: Send + Sync + 'static { // Send+Sync+'static required for Arc<dyn>
    /// Persists a new meme, assigning its id, `created_at` and `edited_at`.
    /// Fails with `RepoError::Duplicate` if the triple is already taken.
    async fn insert(&self, new_meme: NewMeme) -> Result<Meme, RepoError>;

    /// Returns Ok(None) if the meme is not found.
    async fn get_by_id(&self, id: Uuid) -> Result<Option<Meme>, RepoError>;

    /// Most recent memes first, at most `limit` of them.
    async fn list_recent(&self, limit: usize) -> Result<Vec<Meme>, RepoError>;

    /// Applies `patch` and refreshes `edited_at`. Returns Ok(None) if no meme
    /// has that id, in which case nothing is written.
    async fn update_by_id(&self, id: Uuid, patch: MemePatch) -> Result<Option<Meme>, RepoError>;
}
