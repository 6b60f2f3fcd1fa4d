use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::error;
use url::Url;
use vellum_api_types::{ChangesRequest, ConvertQuery, ConvertResponse};

use crate::application::convert::ConvertMode;
use crate::application::error::HttpError;
use crate::application::formats::{codepage_from_name, delimiter_from_code, output_format_from_str};
use crate::application::repos::{BlobStorage, StorageError};
use crate::domain::conversion::{ConversionKey, InputCommand};
use crate::domain::types::ErrorCode;

use super::{RouterState, db_health_response};

const OUTPUT_NAME: &str = "output";

/// Reconstruct the externally visible base URL from proxy-aware headers.
pub fn base_url_from_request(headers: &HeaderMap) -> String {
    let proto = headers
        .get("x-forwarded-proto")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("http");
    let host = headers
        .get("x-forwarded-host")
        .or_else(|| headers.get(axum::http::header::HOST))
        .and_then(|value| value.to_str().ok())
        .unwrap_or("localhost");
    format!("{proto}://{host}")
}

/// `GET /converter`: submit a conversion and answer with a URL or an
/// error code. Internal failures never leak details: the body carries
/// the unknown code and the cause goes to the log.
pub async fn convert(
    State(state): State<RouterState>,
    headers: HeaderMap,
    Query(query): Query<ConvertQuery>,
) -> Json<ConvertResponse> {
    let Some(cmd) = command_from_query(&query) else {
        return Json(ConvertResponse::from_error(ErrorCode::Unknown.code()));
    };

    let mode = if query.is_async.as_deref() == Some("true") {
        ConvertMode::Async
    } else {
        ConvertMode::Sync
    };
    let base_url = base_url_from_request(&headers);

    match state.convert.convert(cmd, mode, &base_url).await {
        Ok(outcome) => Json(ConvertResponse {
            file_url: outcome.url,
            error: outcome.error.code(),
        }),
        Err(err) => {
            error!(key = query.key.as_deref().unwrap_or(""), error = %err, "convert request failed");
            Json(ConvertResponse::from_error(ErrorCode::Unknown.code()))
        }
    }
}

fn command_from_query(query: &ConvertQuery) -> Option<InputCommand> {
    let doc_key = query.key.as_deref().filter(|key| !key.is_empty())?;
    let output_type = query.outputtype.as_deref()?;
    let output_format = output_format_from_str(output_type)?;
    let source_url = query.url.as_deref()?;
    Url::parse(source_url).ok()?;

    let doc_id = ConversionKey::derive(doc_key, output_type)?;
    let mut cmd = InputCommand::conv(
        doc_id,
        format!("{OUTPUT_NAME}.{output_type}"),
        output_format,
    );
    cmd.url = Some(source_url.to_string());
    cmd.vkey = query.vkey.clone();
    cmd.format = query.filetype.clone();
    cmd.codepage = codepage_from_name(query.code_page.as_deref());
    cmd.delimiter = delimiter_from_code(query.delimiter);
    cmd.doct_params = query.doctparams;
    Some(cmd)
}

/// `GET /healthcheck`: literal `true` or `false`, always 200.
pub async fn healthcheck(State(state): State<RouterState>, headers: HeaderMap) -> String {
    let base_url = base_url_from_request(&headers);
    state.convert.health_probe(&base_url).await.to_string()
}

#[derive(Debug, Deserialize)]
pub struct DownloadParams {
    expires: i64,
    signature: String,
}

/// `GET /download/{key}/{file}`: redeem a signed URL issued by the
/// storage layer.
pub async fn download(
    State(state): State<RouterState>,
    Path((key, file)): Path<(String, String)>,
    Query(params): Query<DownloadParams>,
) -> Result<Response, HttpError> {
    let object_key = format!("{key}/{file}");

    if !state.storage.verify(&object_key, params.expires, &params.signature) {
        return Err(HttpError::new(
            "infra::http::download",
            StatusCode::FORBIDDEN,
            "Invalid or expired download link",
            format!("signature rejected for `{object_key}`"),
        ));
    }

    let data = state.storage.get_object(&object_key).await.map_err(|err| match err {
        StorageError::NotFound => HttpError::new(
            "infra::http::download",
            StatusCode::NOT_FOUND,
            "File not found",
            format!("object `{object_key}` missing"),
        ),
        other => HttpError::from_error(
            "infra::http::download",
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to read file",
            &other,
        ),
    })?;

    let content_type = mime_guess::from_path(&file).first_or_octet_stream();
    Ok((
        [(CONTENT_TYPE, content_type.as_ref().to_string())],
        data,
    )
        .into_response())
}

/// `POST /internal/changes/{doc_id}`: drive the save-from-changes path.
pub async fn convert_from_changes(
    State(state): State<RouterState>,
    Path(doc_id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<ChangesRequest>,
) -> Json<ConvertResponse> {
    let Some(doc_id) = ConversionKey::new(doc_id) else {
        return Json(ConvertResponse::from_error(ErrorCode::Unknown.code()));
    };
    let base_url = base_url_from_request(&headers);

    match state
        .convert
        .convert_from_changes(doc_id.clone(), &base_url, request.lastsave, request.userdata)
        .await
    {
        Ok(outcome) => Json(ConvertResponse {
            file_url: outcome.url,
            error: outcome.error.code(),
        }),
        Err(err) => {
            error!(doc_id = %doc_id, error = %err, "changes conversion failed");
            Json(ConvertResponse::from_error(ErrorCode::Unknown.code()))
        }
    }
}

pub async fn db_health(State(state): State<RouterState>) -> Response {
    match state.db.as_ref() {
        Some(db) => db_health_response(db.health_check().await),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            "database not configured",
        )
            .into_response(),
    }
}
