use crate::{
    errors::AppError,
    models::{CreateMemeRequest, CreatedMeme, Meme, MessageResponse, UpdateMemeRequest},
    AppState,
};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{Method, StatusCode, Uri},
    Json,
};
use std::sync::Arc;
use tracing;

/// GET /memes
pub async fn list_memes(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Meme>>, AppError> {
    tracing::debug!("Listing recent memes via handler");
    let memes = state.memes.list().await?;
    tracing::debug!("Handler retrieved {} memes", memes.len());
    Ok(Json(memes))
}

/// GET /memes/{id}
pub async fn get_meme(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Meme>, AppError> {
    tracing::debug!(meme_id = %id, "Fetching meme via handler");
    let meme = state.memes.get(&id).await?;
    Ok(Json(meme))
}

/// POST /memes
pub async fn create_meme(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateMemeRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreatedMeme>), AppError> {
    let request = json_body(payload)?;
    let meme = state.memes.create(request).await?;
    Ok((StatusCode::CREATED, Json(CreatedMeme { id: meme.id })))
}

/// PATCH /memes/{id}
pub async fn update_meme(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateMemeRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let request = json_body(payload)?;
    state.memes.update(&id, request).await?;
    Ok(Json(MessageResponse {
        message: "Meme updated".to_string(),
    }))
}

/// Any path outside the meme routes.
pub async fn route_not_found(uri: Uri) -> AppError {
    AppError::RouteNotFound(uri.path().to_string())
}

/// A known path called with a method it does not serve.
pub async fn method_not_allowed(method: Method, uri: Uri) -> AppError {
    AppError::MethodNotAllowed(method.to_string(), uri.path().to_string())
}

// Without a JSON content type the body is read as an empty form, so field
// validation reports what is missing.
fn json_body<T: Default>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    match payload {
        Ok(Json(body)) => Ok(body),
        Err(JsonRejection::MissingJsonContentType(_)) => Ok(T::default()),
        Err(rejection) => Err(rejection.into()),
    }
}
