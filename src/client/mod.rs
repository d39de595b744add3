//! Blocking API client used by the `chemviz-client` binary.

pub mod display;

use std::{
    fs,
    io::Read,
    path::Path,
    thread,
    time::Duration,
};

use anyhow::{anyhow, bail, Context, Result};
use log::{debug, warn};
use uuid::Uuid;

use crate::{
    models::{AnalysisSummary, HistoryEntry},
    server::auth::basic_header,
};

const MAX_REPORT_BYTES: u64 = 50 * 1024 * 1024;

/// Connection settings, passed explicitly instead of read from the
/// environment at call time.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub username: String,
    pub password: String,
    pub timeout: Duration,
}

/// Percent-encode the characters that would end the quoted `filename`
/// parameter or the header line.
fn quote_file_name(file_name: &str) -> String {
    let mut quoted = String::with_capacity(file_name.len());
    for ch in file_name.chars() {
        match ch {
            '"' => quoted.push_str("%22"),
            '\r' => quoted.push_str("%0D"),
            '\n' => quoted.push_str("%0A"),
            _ => quoted.push(ch),
        }
    }
    quoted
}

/// Encode a single file field as `multipart/form-data`.
pub fn encode_multipart(field: &str, file_name: &str, contents: &[u8], boundary: &str) -> Vec<u8> {
    let file_name = quote_file_name(file_name);
    let mut body = Vec::with_capacity(contents.len() + 256);
    body.extend_from_slice(
        format!(
            "--{boundary}\r\n\
             Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n\
             Content-Type: text/csv\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(contents);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| value.get("error").and_then(|e| e.as_str()).map(String::from))
        .unwrap_or_else(|| body.trim().to_string())
}

fn check(result: Result<ureq::Response, ureq::Error>) -> Result<ureq::Response> {
    match result {
        Ok(response) => Ok(response),
        Err(ureq::Error::Status(code, response)) => {
            let body = response.into_string().unwrap_or_default();
            bail!("server returned {code}: {}", error_message(&body))
        }
        Err(err) => Err(anyhow::Error::new(err).context("request failed")),
    }
}

pub struct ApiClient {
    agent: ureq::Agent,
    base_url: String,
    authorization: String,
}

impl ApiClient {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(config.timeout).build(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            authorization: basic_header(&config.username, &config.password),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub fn upload_file(&self, path: &Path) -> Result<AnalysisSummary> {
        let contents =
            fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| anyhow!("{} has no usable file name", path.display()))?;
        self.upload(file_name, &contents)
    }

    pub fn upload(&self, file_name: &str, contents: &[u8]) -> Result<AnalysisSummary> {
        let boundary = format!("chemviz-{}", Uuid::new_v4().simple());
        let body = encode_multipart("file", file_name, contents, &boundary);
        debug!("Uploading {file_name} ({} bytes)", contents.len());

        let response = check(
            self.agent
                .post(&self.url("/upload"))
                .set("Authorization", &self.authorization)
                .set(
                    "Content-Type",
                    &format!("multipart/form-data; boundary={boundary}"),
                )
                .send_bytes(&body),
        )?;
        let text = response.into_string().context("failed to read upload response")?;
        serde_json::from_str(&text).context("unexpected upload response")
    }

    pub fn history(&self) -> Result<Vec<HistoryEntry>> {
        let response = check(
            self.agent
                .get(&self.url("/upload"))
                .set("Authorization", &self.authorization)
                .call(),
        )?;
        let text = response
            .into_string()
            .context("failed to read history response")?;
        serde_json::from_str(&text).context("unexpected history response")
    }

    pub fn export_pdf(&self) -> Result<Vec<u8>> {
        let response = check(
            self.agent
                .get(&self.url("/export-pdf"))
                .set("Authorization", &self.authorization)
                .call(),
        )?;
        let mut bytes = Vec::new();
        response
            .into_reader()
            .take(MAX_REPORT_BYTES)
            .read_to_end(&mut bytes)
            .context("failed to download report")?;
        Ok(bytes)
    }

    /// Poll history every `interval`, calling `on_change` with the first
    /// snapshot and again whenever it differs. Fetch failures are logged
    /// and retried on the next tick. Stops after `max_polls` when given.
    pub fn watch_history(
        &self,
        interval: Duration,
        max_polls: Option<usize>,
        mut on_change: impl FnMut(&[HistoryEntry]),
    ) {
        let mut last: Option<Vec<HistoryEntry>> = None;
        let mut polls = 0usize;
        loop {
            match self.history() {
                Ok(entries) if last.as_ref() != Some(&entries) => {
                    on_change(entries.as_slice());
                    last = Some(entries);
                }
                Ok(_) => {}
                Err(err) => warn!("History poll failed: {err:#}"),
            }

            polls += 1;
            if max_polls.is_some_and(|max| polls >= max) {
                return;
            }
            thread::sleep(interval);
        }
    }
}
