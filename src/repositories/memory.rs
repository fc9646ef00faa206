use crate::{
    domain::MemeRepository,
    errors::RepoError,
    models::{Meme, MemePatch, NewMeme, TripleKey},
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Process-local meme store for development and tests.
///
/// Every operation runs under one lock, so the triple check and the write it
/// guards happen atomically.
#[derive(Debug, Default)]
pub struct InMemoryMemeRepository {
    state: RwLock<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    // Insertion sequence breaks ties between equal creation timestamps.
    memes: HashMap<Uuid, (u64, Meme)>,
    triples: HashMap<TripleKey, Uuid>,
    next_seq: u64,
}

impl InMemoryMemeRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count(&self) -> usize {
        self.state.read().await.memes.len()
    }
}

#[async_trait]
impl MemeRepository for InMemoryMemeRepository {
    async fn insert(&self, new_meme: NewMeme) -> Result<Meme, RepoError> {
        let mut state = self.state.write().await;
        let triple = new_meme.triple_key();
        if state.triples.contains_key(&triple) {
            return Err(RepoError::Duplicate);
        }

        let meme = Meme::from_new(Uuid::new_v4(), new_meme, Utc::now());
        let seq = state.next_seq;
        state.next_seq += 1;
        state.triples.insert(triple, meme.id);
        state.memes.insert(meme.id, (seq, meme.clone()));
        tracing::debug!(meme_id = %meme.id, "Memory: Meme inserted");
        Ok(meme)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Meme>, RepoError> {
        let state = self.state.read().await;
        Ok(state.memes.get(&id).map(|(_, meme)| meme.clone()))
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<Meme>, RepoError> {
        let state = self.state.read().await;
        let mut entries: Vec<&(u64, Meme)> = state.memes.values().collect();
        entries.sort_by(|a, b| b.1.created_at.cmp(&a.1.created_at).then(b.0.cmp(&a.0)));
        Ok(entries.into_iter().take(limit).map(|(_, meme)| meme.clone()).collect())
    }

    async fn update_by_id(&self, id: Uuid, patch: MemePatch) -> Result<Option<Meme>, RepoError> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        let Some((_, current)) = state.memes.get(&id) else {
            return Ok(None);
        };

        let updated = current.patched(&patch, Utc::now());
        let old_triple = current.triple_key();
        let new_triple = updated.triple_key();
        if old_triple != new_triple {
            if state.triples.contains_key(&new_triple) {
                return Err(RepoError::Duplicate);
            }
            state.triples.remove(&old_triple);
            state.triples.insert(new_triple, id);
        }

        if let Some((_, stored)) = state.memes.get_mut(&id) {
            *stored = updated.clone();
        }
        tracing::debug!(meme_id = %id, "Memory: Meme updated");
        Ok(Some(updated))
    }
}
