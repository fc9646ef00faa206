use crate::errors::AppError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stored meme as returned to clients.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Meme {
    pub id: Uuid,
    pub name: String,
    pub url: String,
    pub caption: String,
    pub created_at: DateTime<Utc>,
    pub edited_at: DateTime<Utc>,
}

impl Meme {
    /// Builds a fresh record. Both timestamps start at `now`.
    pub fn from_new(id: Uuid, new_meme: NewMeme, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: new_meme.name,
            url: new_meme.url,
            caption: new_meme.caption,
            created_at: now,
            edited_at: now,
        }
    }

    /// Returns a copy with the patch applied and `edited_at` moved to `now`.
    /// `id`, `name` and `created_at` are carried over untouched.
    pub fn patched(&self, patch: &MemePatch, now: DateTime<Utc>) -> Self {
        Self {
            url: patch.url.clone().unwrap_or_else(|| self.url.clone()),
            caption: patch.caption.clone().unwrap_or_else(|| self.caption.clone()),
            edited_at: now,
            ..self.clone()
        }
    }

    pub fn triple_key(&self) -> TripleKey {
        TripleKey::of(&self.name, &self.url, &self.caption)
    }
}

// --- Request bodies ---

/// Body of `POST /memes`. Fields are optional so missing ones surface as
/// incomplete form data rather than a deserialization failure.
#[derive(Deserialize, Debug, Default)]
pub struct CreateMemeRequest {
    pub name: Option<String>,
    pub url: Option<String>,
    pub caption: Option<String>,
}

/// Body of `PATCH /memes/{id}`. `name` is deliberately absent: serde drops it
/// along with any other unknown field.
#[derive(Deserialize, Debug, Default)]
pub struct UpdateMemeRequest {
    pub url: Option<String>,
    pub caption: Option<String>,
}

// --- Response bodies ---

#[derive(Serialize, Deserialize, Debug)]
pub struct CreatedMeme {
    pub id: Uuid,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct MessageResponse {
    pub message: String,
}

// --- Validated inputs ---

/// A create request that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMeme {
    pub name: String,
    pub url: String,
    pub caption: String,
}

impl NewMeme {
    pub fn triple_key(&self) -> TripleKey {
        TripleKey::of(&self.name, &self.url, &self.caption)
    }
}

impl TryFrom<CreateMemeRequest> for NewMeme {
    type Error = AppError;

    fn try_from(request: CreateMemeRequest) -> Result<Self, Self::Error> {
        let name = non_blank(request.name);
        let url = non_blank(request.url);
        let caption = non_blank(request.caption);

        match (name, url, caption) {
            (Some(name), Some(url), Some(caption)) => Ok(NewMeme { name, url, caption }),
            (name, url, caption) => {
                let missing: Vec<&str> = [("name", name.is_none()), ("url", url.is_none()), ("caption", caption.is_none())]
                    .into_iter()
                    .filter_map(|(field, absent)| absent.then_some(field))
                    .collect();
                Err(AppError::IncompleteFormData(format!("missing {}", missing.join(", "))))
            }
        }
    }
}

/// An update request with at least one field to change.
#[derive(Debug, Clone, PartialEq)]
pub struct MemePatch {
    pub url: Option<String>,
    pub caption: Option<String>,
}

impl TryFrom<UpdateMemeRequest> for MemePatch {
    type Error = AppError;

    fn try_from(request: UpdateMemeRequest) -> Result<Self, Self::Error> {
        let patch = MemePatch {
            url: non_blank(request.url),
            caption: non_blank(request.caption),
        };
        if patch.url.is_none() && patch.caption.is_none() {
            return Err(AppError::IncompleteFormData("provide url or caption".to_string()));
        }
        Ok(patch)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// --- Uniqueness key ---

/// Digest identifying a (name, url, caption) triple. Each part is length
/// prefixed so that shifting characters between fields yields a different key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TripleKey(String);

impl TripleKey {
    pub fn of(name: &str, url: &str, caption: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        for part in [name, url, caption] {
            hasher.update(&(part.len() as u64).to_le_bytes());
            hasher.update(part.as_bytes());
        }
        Self(hasher.finalize().to_hex().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
