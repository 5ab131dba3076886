use axum::{
    body::Bytes,
    extract::{Multipart, State, multipart::MultipartRejection},
};
use utoipa::ToSchema;

use crate::{
    AppState,
    auth::AuthUser,
    error::AppError,
    models::{NewPhoto, Photo, PhotoChanges, PhotoDetail, PhotoForm, PhotoList, PhotoSummary, User},
    ownership::{OwnedPhoto, ResourceKind},
    repository::Repository,
    response::Jsend,
    storage::{filename_from_url, public_url, unique_filename},
    validation::{self, Violations},
};

/// PhotoUploadForm
///
/// Documents the `multipart/form-data` body of photo create and update.
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct PhotoUploadForm {
    title: String,
    caption: Option<String>,
    /// The image file. Required on create, optional on update.
    #[schema(value_type = Option<String>, format = Binary)]
    photo: Option<Vec<u8>>,
}

/// A file part as received from the client.
struct UploadedFile {
    file_name: String,
    content_type: Option<String>,
    bytes: Bytes,
}

/// The text fields and optional file of a photo submission.
#[derive(Default)]
struct PhotoSubmission {
    title: String,
    caption: String,
    file: Option<UploadedFile>,
}

/// A file accepted for storage under its server-side name.
struct StagedFile {
    filename: String,
    content_type: Option<String>,
    bytes: Bytes,
}

/// Reads `title`, `caption` and the `photo` file out of the multipart body.
/// Unknown parts are skipped; an empty file part counts as no file.
async fn read_submission(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<PhotoSubmission, AppError> {
    let mut multipart = multipart.map_err(|rejection| {
        tracing::debug!(error = %rejection, "multipart body rejected");
        AppError::invalid_form()
    })?;

    let mut submission = PhotoSubmission::default();
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        tracing::debug!(error = %e, "malformed multipart body");
        AppError::invalid_form()
    })? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "title" | "caption" => {
                let text = field.text().await.map_err(|_| AppError::invalid_form())?;
                if name == "title" {
                    submission.title = text;
                } else {
                    submission.caption = text;
                }
            }
            "photo" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(str::to_owned);
                let bytes = field.bytes().await.map_err(|_| AppError::invalid_form())?;
                if file_name.is_empty() && bytes.is_empty() {
                    continue;
                }
                submission.file = Some(UploadedFile {
                    file_name,
                    content_type,
                    bytes,
                });
            }
            other => tracing::debug!(field = other, "ignoring unknown form field"),
        }
    }
    Ok(submission)
}

/// Names the attached file (if any), validates the form, and runs the upload guard.
/// Returns the staged file and the URL the photo will carry.
fn stage(
    state: &AppState,
    owner_id: i64,
    submission: &mut PhotoSubmission,
    current_url: Option<&str>,
) -> Result<(Option<StagedFile>, PhotoForm), AppError> {
    let staged = submission.file.take().map(|file| StagedFile {
        filename: unique_filename(owner_id, &file.file_name),
        content_type: file.content_type,
        bytes: file.bytes,
    });

    let photo_url = match (&staged, current_url) {
        (Some(file), _) => public_url(&state.config.public_base_url, &file.filename),
        (None, Some(url)) => url.to_string(),
        (None, None) => String::new(),
    };

    let form = PhotoForm {
        title: std::mem::take(&mut submission.title),
        caption: std::mem::take(&mut submission.caption),
        photo_url,
        user_id: owner_id,
    };

    let mut violations: Violations = validation::check(&form);
    if let Some(file) = &staged {
        validation::check_upload(
            &mut violations,
            &file.filename,
            file.bytes.len(),
            &state.config.allowed_extensions,
            state.config.max_upload_kb,
        );
    }
    violations.into_result()?;

    Ok((staged, form))
}

/// Removes a photo row written earlier in a request that then failed.
async fn discard_created(repo: &dyn Repository, photo_id: i64) {
    match repo.delete_photo(photo_id).await {
        Ok(_) => tracing::warn!(photo_id, "discarded photo row after a failed create"),
        Err(e) => tracing::error!(photo_id, error = %e, "could not discard orphaned photo row"),
    }
}

/// Puts back the fields a failed update overwrote.
async fn restore_previous(repo: &dyn Repository, previous: &Photo) {
    let changes = PhotoChanges {
        title: previous.title.clone(),
        caption: previous.caption.clone(),
        photo_url: previous.photo_url.clone(),
    };
    match repo.update_photo(previous.id, changes).await {
        Ok(_) => tracing::warn!(photo_id = previous.id, "restored photo after a failed update"),
        Err(e) => tracing::error!(photo_id = previous.id, error = %e, "could not restore photo"),
    }
}

async fn load_owner(repo: &dyn Repository, user_id: i64) -> Result<User, AppError> {
    repo.get_user(user_id, false)
        .await?
        .ok_or(AppError::OwnerMissing)
}

/// list_photos
///
/// [Public Route] Every photo, newest first.
#[utoipa::path(
    get,
    path = "/photos",
    responses((status = 200, description = "All photos", body = PhotoList))
)]
pub async fn list_photos(State(state): State<AppState>) -> Result<Jsend<PhotoList>, AppError> {
    let photos = state.repo.list_photos().await?;
    Ok(Jsend::ok(PhotoList {
        photos: photos.iter().map(PhotoSummary::from).collect(),
    }))
}

/// create_photo
///
/// [Authenticated Route] Uploads a photo owned by the caller.
///
/// The row is written before the file. If the owner lookup or the file write fails
/// afterwards, the row is deleted again so no photo points at a missing file.
#[utoipa::path(
    post,
    path = "/photos",
    request_body(content = PhotoUploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Created", body = PhotoDetail),
        (status = 400, description = "Validation failed"),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn create_photo(
    State(state): State<AppState>,
    caller: AuthUser,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Jsend<PhotoDetail>, AppError> {
    let mut submission = read_submission(multipart).await?;
    let (staged, form) = stage(&state, caller.id, &mut submission, None)?;
    // Validation guarantees a file: photo_url is required and only set from one.
    let Some(file) = staged else {
        return Err(AppError::Validation(Violations::single("photoUrl", "photo is required")));
    };

    let repo = state.repo.as_ref();
    let photo = repo
        .create_photo(NewPhoto {
            title: form.title,
            caption: form.caption,
            photo_url: form.photo_url,
            user_id: form.user_id,
        })
        .await?;

    let owner = match load_owner(repo, photo.user_id).await {
        Ok(owner) => owner,
        Err(e) => {
            discard_created(repo, photo.id).await;
            return Err(e);
        }
    };

    if let Err(e) = state
        .storage
        .save(&file.filename, file.content_type.as_deref(), file.bytes)
        .await
    {
        discard_created(repo, photo.id).await;
        return Err(e.into());
    }

    tracing::info!(photo_id = photo.id, owner = owner.id, file = %file.filename, "photo created");
    Ok(Jsend::created(PhotoDetail::new(&photo, &owner)))
}

/// update_photo
///
/// [Authenticated Route] Replaces a photo's title and caption, and its file when a
/// new one is attached. The previous file is removed once the new one is stored.
///
/// *Authorization*: `OwnedPhoto` rejects unless the caller owns `{photoId}`.
#[utoipa::path(
    put,
    path = "/photos/{photoId}",
    params(("photoId" = i64, Path, description = "Id of the photo to update")),
    request_body(content = PhotoUploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Updated", body = PhotoDetail),
        (status = 400, description = "Validation failed"),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Not the photo owner"),
        (status = 404, description = "No such photo")
    )
)]
pub async fn update_photo(
    State(state): State<AppState>,
    OwnedPhoto(existing): OwnedPhoto,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Jsend<PhotoDetail>, AppError> {
    let mut submission = read_submission(multipart).await?;
    let (staged, form) = stage(
        &state,
        existing.user_id,
        &mut submission,
        Some(&existing.photo_url),
    )?;

    let repo = state.repo.as_ref();
    let photo = repo
        .update_photo(
            existing.id,
            PhotoChanges {
                title: form.title,
                caption: form.caption,
                photo_url: form.photo_url,
            },
        )
        .await?
        .ok_or(AppError::NotFound(ResourceKind::Photo))?;

    let owner = match load_owner(repo, photo.user_id).await {
        Ok(owner) => owner,
        Err(e) => {
            restore_previous(repo, &existing).await;
            return Err(e);
        }
    };

    if let Some(file) = staged {
        if let Err(e) = state
            .storage
            .save(&file.filename, file.content_type.as_deref(), file.bytes)
            .await
        {
            restore_previous(repo, &existing).await;
            return Err(e.into());
        }
        state
            .storage
            .remove(filename_from_url(&existing.photo_url))
            .await?;
        tracing::info!(photo_id = photo.id, file = %file.filename, "photo file replaced");
    }

    Ok(Jsend::ok(PhotoDetail::new(&photo, &owner)))
}

/// delete_photo
///
/// [Authenticated Route] Deletes a photo and its file. Responds with the photo as it
/// was before deletion.
///
/// *Authorization*: `OwnedPhoto` rejects unless the caller owns `{photoId}`.
#[utoipa::path(
    delete,
    path = "/photos/{photoId}",
    params(("photoId" = i64, Path, description = "Id of the photo to delete")),
    responses(
        (status = 200, description = "Deleted", body = PhotoDetail),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Not the photo owner"),
        (status = 404, description = "No such photo")
    )
)]
pub async fn delete_photo(
    State(state): State<AppState>,
    OwnedPhoto(photo): OwnedPhoto,
) -> Result<Jsend<PhotoDetail>, AppError> {
    let photo = state
        .repo
        .get_photo(photo.id, true)
        .await?
        .ok_or(AppError::NotFound(ResourceKind::Photo))?;
    let owner = photo.owner.clone().ok_or(AppError::OwnerMissing)?;

    if !state.repo.delete_photo(photo.id).await? {
        return Err(AppError::NotFound(ResourceKind::Photo));
    }
    state
        .storage
        .remove(filename_from_url(&photo.photo_url))
        .await?;

    tracing::info!(photo_id = photo.id, "photo deleted");
    Ok(Jsend::ok(PhotoDetail::new(&photo, &owner)))
}
