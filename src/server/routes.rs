use log::{error, warn};
use serde::Serialize;
use serde_json::json;

use super::{
    auth::{Credentials, CHALLENGE},
    multipart::{extract_file, is_multipart, FILE_FIELD},
};
use crate::{
    analysis::{AnalysisError, AnalysisService},
    models::HistoryEntry,
    report::REPORT_FILE_NAME,
};

const JSON: &str = "application/json";
const PDF: &str = "application/pdf";

/// Transport-neutral view of an incoming request.
#[derive(Debug, Clone, Default)]
pub struct ApiRequest {
    pub method: String,
    pub url: String,
    pub authorization: Option<String>,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn json<T: Serialize>(status: u16, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => Self {
                status,
                headers: vec![("Content-Type".into(), JSON.into())],
                body,
            },
            Err(err) => {
                error!("Failed to encode response body: {err}");
                Self::error(500, "Internal server error")
            }
        }
    }

    pub fn error(status: u16, message: &str) -> Self {
        Self {
            status,
            headers: vec![("Content-Type".into(), JSON.into())],
            body: json!({ "error": message }).to_string().into_bytes(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    #[cfg(test)]
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    fn from_analysis_error(err: &AnalysisError) -> Self {
        let status = err.status_code();
        if status >= 500 {
            error!("Request failed: {err}");
        } else {
            warn!("Rejected upload: {err}");
        }
        Self::error(status, &err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Upload,
    ExportPdf,
    Health,
}

impl Route {
    fn allowed_methods(self) -> &'static str {
        match self {
            Route::Upload => "GET, POST",
            Route::ExportPdf | Route::Health => "GET",
        }
    }
}

fn split_url(url: &str) -> (&str, Option<&str>) {
    match url.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (url, None),
    }
}

fn resolve_route(path: &str) -> Option<Route> {
    let path = path.trim_end_matches('/');
    let path = path.strip_prefix("/api").unwrap_or(path);
    match path {
        "/upload" | "/analyze" => Some(Route::Upload),
        "/export-pdf" => Some(Route::ExportPdf),
        "/health" => Some(Route::Health),
        _ => None,
    }
}

fn query_limit(query: Option<&str>) -> Option<usize> {
    query?
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == "limit")
        .and_then(|(_, value)| value.parse().ok())
}

#[derive(Clone)]
pub struct Router {
    service: AnalysisService,
    credentials: Credentials,
}

impl Router {
    pub fn new(service: AnalysisService, credentials: Credentials) -> Self {
        Self {
            service,
            credentials,
        }
    }

    fn gate(&self, path: &str, authorization: Option<&str>) -> Result<Route, ApiResponse> {
        let Some(route) = resolve_route(path) else {
            return Err(ApiResponse::error(404, "Not found"));
        };
        if route != Route::Health && !self.credentials.verify(authorization) {
            return Err(ApiResponse::error(401, "Invalid or missing credentials")
                .with_header("WWW-Authenticate", CHALLENGE));
        }
        Ok(route)
    }

    /// Route lookup and credential check from the request line and headers
    /// alone. `Some` is the rejection to send without reading the body.
    pub fn admit(&self, url: &str, authorization: Option<&str>) -> Option<ApiResponse> {
        let (path, _) = split_url(url);
        self.gate(path, authorization).err()
    }

    pub async fn dispatch(&self, request: ApiRequest) -> ApiResponse {
        let (path, query) = split_url(&request.url);
        let limit = query_limit(query);
        let route = match self.gate(path, request.authorization.as_deref()) {
            Ok(route) => route,
            Err(rejection) => return rejection,
        };

        let method = request.method.clone();
        match (route, method.as_str()) {
            (Route::Upload, "POST") => self.upload(request).await,
            (Route::Upload, "GET") => self.history(limit).await,
            (Route::ExportPdf, "GET") => self.export_pdf().await,
            (Route::Health, "GET") => ApiResponse::json(200, &json!({ "status": "ok" })),
            _ => ApiResponse::error(405, &format!("Method \"{method}\" not allowed"))
                .with_header("Allow", route.allowed_methods()),
        }
    }

    async fn upload(&self, request: ApiRequest) -> ApiResponse {
        let content_type = request.content_type.as_deref();
        if !is_multipart(content_type) {
            return ApiResponse::error(
                415,
                &format!(
                    "Unsupported media type \"{}\" in request",
                    content_type.unwrap_or_default()
                ),
            );
        }

        let file = match extract_file(content_type.unwrap_or_default(), request.body, FILE_FIELD)
            .await
        {
            Ok(Some(file)) => file,
            Ok(None) => return ApiResponse::from_analysis_error(&AnalysisError::InputMissing),
            Err(err) => {
                warn!("Rejected upload: {err:#}");
                return ApiResponse::error(400, &format!("Multipart form parse error: {err:#}"));
            }
        };

        match self.service.submit(&file.file_name, &file.contents).await {
            Ok(summary) => ApiResponse::json(200, &summary),
            Err(err) => ApiResponse::from_analysis_error(&err),
        }
    }

    async fn history(&self, limit: Option<usize>) -> ApiResponse {
        let limit = limit.unwrap_or(self.service.history_limit());
        match self.service.history(limit).await {
            Ok(records) => {
                let entries: Vec<HistoryEntry> = records.into_iter().map(Into::into).collect();
                ApiResponse::json(200, &entries)
            }
            Err(err) => ApiResponse::from_analysis_error(&err),
        }
    }

    async fn export_pdf(&self) -> ApiResponse {
        match self.service.export_report().await {
            Ok(body) => ApiResponse {
                status: 200,
                headers: vec![
                    ("Content-Type".into(), PDF.into()),
                    (
                        "Content-Disposition".into(),
                        format!("attachment; filename=\"{REPORT_FILE_NAME}\""),
                    ),
                ],
                body,
            },
            Err(err) => ApiResponse::from_analysis_error(&err),
        }
    }
}
