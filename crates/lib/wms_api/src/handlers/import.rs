//! Workbook upload handler.

use axum::body::Bytes;
use axum::extract::{Multipart, Path};
use axum::{Extension, Json};
use tracing::info;
use wms_core::import::{EntityKind, ImportSummary, Workbook, import_workbook};

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthContext;
use crate::middleware::database::Db;

/// Largest accepted upload.
pub const IMPORT_BODY_LIMIT: usize = 10 * 1024 * 1024;

/// Multipart field carrying the workbook.
const FILE_FIELD: &str = "file";

/// `POST /api/import/{entity}` — replace `processes` or `presentations` with
/// the rows of an uploaded `.xlsx` workbook.
pub async fn import_handler(
    Extension(Db(db)): Extension<Db>,
    Extension(context): Extension<AuthContext>,
    Path(entity): Path<String>,
    multipart: Multipart,
) -> AppResult<Json<ImportSummary>> {
    let kind: EntityKind = entity.parse()?;
    let bytes = read_file_field(multipart).await?;
    let workbook = Workbook::from_xlsx_bytes(&bytes)?;
    info!(
        %kind,
        user_id = ?context.identity.as_ref().map(|i| &i.user_id),
        sheets = ?workbook.sheet_names().collect::<Vec<_>>(),
        "importing workbook"
    );
    let summary = import_workbook(db.store(), &workbook, kind).await?;
    Ok(Json(summary))
}

async fn read_file_field(mut multipart: Multipart) -> AppResult<Bytes> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(e.body_text()))?
    {
        if field.name() == Some(FILE_FIELD) {
            return field
                .bytes()
                .await
                .map_err(|e| AppError::Validation(e.body_text()));
        }
    }
    Err(AppError::Validation(format!(
        "Multipart field '{FILE_FIELD}' is required"
    )))
}
