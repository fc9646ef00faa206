use crate::{
    domain::MemeRepository,
    errors::AppError,
    models::{CreateMemeRequest, Meme, MemePatch, NewMeme, UpdateMemeRequest},
};
use std::sync::Arc;
use uuid::Uuid;

/// How many memes the list operation returns.
pub const LIST_LIMIT: usize = 100;

/// Validates meme requests and maps storage outcomes to `AppError`.
#[derive(Clone)]
pub struct MemeService {
    repo: Arc<dyn MemeRepository>,
}

impl MemeService {
    pub fn new(repo: Arc<dyn MemeRepository>) -> Self {
        Self { repo }
    }

    pub async fn list(&self) -> Result<Vec<Meme>, AppError> {
        self.repo
            .list_recent(LIST_LIMIT)
            .await
            .map_err(AppError::StorageUnavailable)
    }

    /// Unknown and malformed ids both come back as `MemeNotFound`.
    pub async fn get(&self, id: &str) -> Result<Meme, AppError> {
        let meme_id = parse_meme_id(id)?;
        self.repo
            .get_by_id(meme_id)
            .await?
            .ok_or_else(|| AppError::MemeNotFound(id.to_string()))
    }

    pub async fn create(&self, request: CreateMemeRequest) -> Result<Meme, AppError> {
        let new_meme = NewMeme::try_from(request)?;
        let meme = self.repo.insert(new_meme).await?;
        tracing::info!(meme_id = %meme.id, "Meme created");
        Ok(meme)
    }

    /// The body is validated before the id, so an empty patch is a 422 even
    /// for ids that do not exist.
    pub async fn update(&self, id: &str, request: UpdateMemeRequest) -> Result<Meme, AppError> {
        let patch = MemePatch::try_from(request)?;
        let meme_id = parse_meme_id(id)?;
        let meme = self
            .repo
            .update_by_id(meme_id, patch)
            .await?
            .ok_or_else(|| AppError::MemeNotFound(id.to_string()))?;
        tracing::info!(meme_id = %meme.id, "Meme updated");
        Ok(meme)
    }
}

fn parse_meme_id(id: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(id).map_err(|e| {
        tracing::debug!(invalid_id = %id, error = %e, "Malformed meme id");
        AppError::MemeNotFound(id.to_string())
    })
}
