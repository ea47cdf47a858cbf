use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{Backend, MetricsSource};
use crate::config::ApiConfig;
use crate::dashboard::{DashboardCards, DashboardFilter, NeetReadiness, RiskBreakdown, ScoreDistribution};
use crate::error::ApiError;
use crate::registry::{RefreshReason, TestListResponse};
use crate::upload::{FileSource, SelectedFile, SubmissionBatch, UploadReceipt};

#[derive(Deserialize)]
struct UploadResponse {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    files: Option<Value>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    details: Option<String>,
}

/// Talks to the real backend over HTTP.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
    tests_path: String,
    token: Option<String>,
}

impl HttpBackend {
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            tests_path: config.tests_path.clone(),
            token: config.token.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn form_part(file: &SelectedFile) -> Result<Part, ApiError> {
        let bytes = match &file.source {
            FileSource::Path(path) => tokio::fs::read(path).await?,
            FileSource::Bytes(bytes) => bytes.to_vec(),
        };
        let part = Part::bytes(bytes).file_name(file.name.clone());
        Ok(match &file.mime {
            Some(mime) => part.mime_str(mime)?,
            None => part,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&'static str, String)],
    ) -> Result<T, ApiError> {
        let url = self.url(path);
        debug!(url = %url, "GET");
        let response = self
            .authorize(self.client.get(&url))
            .query(query)
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        parse_json_body(status, &body)
    }

    async fn excelhandler<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        filter: &DashboardFilter,
    ) -> Result<T, ApiError> {
        self.get_json(&format!("/excelhandler/{}", endpoint), &filter.to_query())
            .await
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn upload_test(&self, batch: &SubmissionBatch) -> Result<UploadReceipt, ApiError> {
        let mut form = Form::new();
        for (key, files) in &batch.files {
            for file in files {
                form = form.part(key.form_field(), Self::form_part(file).await?);
            }
        }

        let url = self.url("/api/upload_test");
        info!(url = %url, files = batch.file_count(), "submitting test files");

        let response = self
            .authorize(self.client.post(&url))
            .multipart(form)
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        parse_upload_response(status, &body)
    }

    async fn list_tests(&self, reason: &RefreshReason) -> Result<TestListResponse, ApiError> {
        debug!(?reason, "listing tests");
        self.get_json(&self.tests_path, &[]).await
    }

    async fn health(&self) -> Result<(), ApiError> {
        let response = self.client.get(self.url("/api/health")).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        if !(200..300).contains(&status) {
            return Err(ApiError::Status {
                status,
                message: body.trim().to_string(),
            });
        }
        if body.trim() != "OK" {
            return Err(ApiError::UnexpectedBody(body));
        }
        Ok(())
    }
}

#[async_trait]
impl MetricsSource for HttpBackend {
    async fn dashboard_cards(&self, filter: &DashboardFilter) -> Result<DashboardCards, ApiError> {
        self.excelhandler("cards", filter).await
    }

    async fn neet_readiness(&self, filter: &DashboardFilter) -> Result<NeetReadiness, ApiError> {
        self.excelhandler("neet-readiness", filter).await
    }

    async fn risk_breakdown(&self, filter: &DashboardFilter) -> Result<RiskBreakdown, ApiError> {
        self.excelhandler("risk", filter).await
    }

    async fn score_distribution(&self, filter: &DashboardFilter) -> Result<ScoreDistribution, ApiError> {
        self.excelhandler("score-distribution", filter).await
    }

    async fn overall_performance(&self, filter: &DashboardFilter) -> Result<Value, ApiError> {
        self.excelhandler("overall-performance", filter).await
    }

    async fn trend_graph(&self, filter: &DashboardFilter) -> Result<Value, ApiError> {
        self.excelhandler("trend-graph", filter).await
    }

    async fn dashboard_all_metrics(&self, filter: &DashboardFilter) -> Result<Value, ApiError> {
        self.excelhandler("dashboard-all-metrics", filter).await
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Pulls a human-readable message out of an error body, falling back to the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("error")
                .or_else(|| value.get("detail"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}

fn parse_json_body<T: DeserializeOwned>(status: u16, body: &str) -> Result<T, ApiError> {
    if !(200..300).contains(&status) {
        return Err(ApiError::Status {
            status,
            message: error_message(body),
        });
    }

    let value: Value = serde_json::from_str(body)?;
    if let Some(error) = value.get("error").and_then(Value::as_str) {
        return Err(ApiError::Backend(error.to_string()));
    }
    Ok(serde_json::from_value(value)?)
}

fn parse_upload_response(status: u16, body: &str) -> Result<UploadReceipt, ApiError> {
    if !(200..300).contains(&status) {
        let message = error_message(body);
        warn!(status, message = %message, "upload rejected");
        return Err(ApiError::Status { status, message });
    }

    let response: UploadResponse = serde_json::from_str(body)?;
    if let Some(error) = response.error {
        let message = match response.details {
            Some(details) => format!("{}: {}", error, details),
            None => error,
        };
        return Err(ApiError::Backend(message));
    }
    if response.success != Some(true) {
        return Err(ApiError::UnexpectedBody(body.to_string()));
    }

    Ok(UploadReceipt {
        message: response.message.unwrap_or_default(),
        stored_files: stored_file_names(response.files.as_ref()),
    })
}

fn stored_file_names(files: Option<&Value>) -> Vec<String> {
    let name = |value: &Value| -> Option<String> {
        value
            .as_str()
            .or_else(|| value.get("savedAs").and_then(Value::as_str))
            .map(str::to_string)
    };
    match files {
        Some(Value::Object(map)) => map.values().filter_map(name).collect(),
        Some(Value::Array(items)) => items.iter().filter_map(name).collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn join_handles_slashes() {
        assert_eq!(join_url("http://h/", "/api/health"), "http://h/api/health");
        assert_eq!(join_url("http://h", "api/tests"), "http://h/api/tests");
    }

    #[test]
    fn successful_upload_collects_stored_names() {
        let body = r#"{"success":true,"message":"Files uploaded",
            "files":{"answerKey":"1-key.csv","responseSheet":"1-sheet.csv"}}"#;
        let receipt = parse_upload_response(200, body).unwrap();
        assert_eq!(receipt.message, "Files uploaded");
        assert_eq!(receipt.stored_files.len(), 2);
        assert!(receipt.stored_files.contains(&"1-key.csv".to_string()));
    }

    #[test]
    fn bad_request_carries_backend_message() {
        let body = r#"{"error":"Both answer key and response sheet are required."}"#;
        match parse_upload_response(400, body) {
            Err(ApiError::Status { status, message }) => {
                assert_eq!(status, 400);
                assert_eq!(message, "Both answer key and response sheet are required.");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn error_field_on_success_status_is_a_failure() {
        let body = r#"{"error":"Upload failed","details":"disk full"}"#;
        assert!(matches!(
            parse_upload_response(200, body),
            Err(ApiError::Backend(message)) if message == "Upload failed: disk full"
        ));
    }

    #[test]
    fn upload_without_success_flag_is_unexpected() {
        assert!(matches!(
            parse_upload_response(200, r#"{"message":"hm"}"#),
            Err(ApiError::UnexpectedBody(_))
        ));
        assert!(matches!(
            parse_upload_response(200, "<html>"),
            Err(ApiError::Decode(_))
        ));
    }

    #[test]
    fn json_body_with_error_field_is_backend_error() {
        let result: Result<TestListResponse, _> = parse_json_body(200, r#"{"error":"expired"}"#);
        assert!(matches!(result, Err(ApiError::Backend(e)) if e == "expired"));
    }

    #[test]
    fn json_body_decodes_listing() {
        let list: TestListResponse =
            parse_json_body(200, r#"{"tests":[{"test_num":3,"date":"2026-01-01","status":"Failed"}]}"#)
                .unwrap();
        assert_eq!(list.tests.map(|t| t.len()), Some(1));
    }

    #[test]
    fn server_error_uses_plain_text_when_not_json() {
        let result: Result<Value, _> = parse_json_body(502, "Bad Gateway\n");
        assert!(matches!(
            result,
            Err(ApiError::Status { status: 502, message }) if message == "Bad Gateway"
        ));
    }

    #[test]
    fn saved_as_entries_are_read_from_arrays() {
        let files = serde_json::json!([{ "originalName": "a.csv", "savedAs": "9-a.csv" }, "b.csv"]);
        assert_eq!(stored_file_names(Some(&files)), vec!["9-a.csv", "b.csv"]);
    }

    #[test]
    fn base_url_is_normalized() {
        let backend = HttpBackend::new(&ApiConfig {
            base_url: "http://localhost:5001/".into(),
            tests_path: "/api/tests".into(),
            token: None,
            request_timeout: Duration::from_secs(1),
        })
        .unwrap();
        assert_eq!(backend.url("/api/upload_test"), "http://localhost:5001/api/upload_test");
    }
}
