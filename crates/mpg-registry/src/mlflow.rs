//! MLflow tracking server adapter (REST API 2.0, blocking HTTP).
//!
//! | Operation       | Endpoint                                              |
//! |-----------------|-------------------------------------------------------|
//! | list versions   | `GET  /api/2.0/mlflow/model-versions/search`          |
//! | metrics         | `GET  /api/2.0/mlflow/runs/get`                       |
//! | resolve alias   | `GET  /api/2.0/mlflow/registered-models/alias`        |
//! | set alias       | `POST /api/2.0/mlflow/registered-models/alias`        |
//! | set tag         | `POST /api/2.0/mlflow/model-versions/set-tag`         |
//!
//! The token is passed in by the caller and never logged.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::types::{Metrics, MetricsSource, ModelRegistry, ModelVersion, RegistryError};

const SEARCH_PAGE_SIZE: &str = "1000";

#[derive(Clone)]
pub struct MlflowClient {
    http: Client,
    base_url: String,
    token: Option<String>,
}

impl std::fmt::Debug for MlflowClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MlflowClient")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "REDACTED"))
            .finish_non_exhaustive()
    }
}

impl MlflowClient {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        token: Option<String>,
    ) -> Result<Self, RegistryError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RegistryError::Unavailable(format!("http client init failed: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/2.0/mlflow/{}", self.base_url.trim_end_matches('/'), path)
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match self.token.as_deref() {
            Some(t) => req.bearer_auth(t),
            None => req,
        }
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, RegistryError> {
        let req = self.authorize(self.http.get(self.url(path)).query(query));
        let resp = req
            .send()
            .map_err(|e| RegistryError::Unavailable(format!("GET {path} failed: {e}")))?;
        read_json(path, resp.status(), resp.text())
    }

    fn post_json(&self, path: &str, body: &Value) -> Result<(), RegistryError> {
        let req = self.authorize(self.http.post(self.url(path)).json(body));
        let resp = req
            .send()
            .map_err(|e| RegistryError::Unavailable(format!("POST {path} failed: {e}")))?;
        let _: Value = read_json(path, resp.status(), resp.text())?;
        Ok(())
    }
}

fn read_json<T: DeserializeOwned>(
    path: &str,
    status: StatusCode,
    body: reqwest::Result<String>,
) -> Result<T, RegistryError> {
    let body = body
        .map_err(|e| RegistryError::Unavailable(format!("{path} body read failed: {e}")))?;

    if !status.is_success() {
        let err: MlflowErrorBody = serde_json::from_str(&body).unwrap_or_default();
        let message = err.message.unwrap_or_else(|| "unknown".to_string());
        let code = err.error_code.unwrap_or_default();

        // MLflow reports a missing alias as INVALID_PARAMETER_VALUE on some
        // server versions and RESOURCE_DOES_NOT_EXIST on others.
        let not_found = status == StatusCode::NOT_FOUND
            || code == "RESOURCE_DOES_NOT_EXIST"
            || (code == "INVALID_PARAMETER_VALUE" && message.to_ascii_lowercase().contains("not found"));
        if not_found {
            return Err(RegistryError::NotFound(format!("{path}: {message}")));
        }
        return Err(RegistryError::Unavailable(format!(
            "{path} http status={} code={} message={}",
            status.as_u16(),
            if code.is_empty() { "-" } else { code.as_str() },
            message
        )));
    }

    // Empty success bodies ("{}") decode fine; a truly empty body is treated as {}.
    let body = if body.trim().is_empty() { "{}" } else { body.as_str() };
    serde_json::from_str(body).map_err(|e| RegistryError::Decode(format!("{path}: {e}")))
}

/// Quote a model name for an MLflow search filter.
fn name_filter(model_name: &str) -> String {
    format!("name='{}'", model_name.replace('\'', "\\'"))
}

impl ModelRegistry for MlflowClient {
    fn backend(&self) -> &'static str {
        "mlflow"
    }

    fn list_versions(&self, model_name: &str) -> Result<Vec<ModelVersion>, RegistryError> {
        let filter = name_filter(model_name);
        let mut out = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query: Vec<(&str, &str)> =
                vec![("filter", filter.as_str()), ("max_results", SEARCH_PAGE_SIZE)];
            if let Some(t) = page_token.as_deref() {
                query.push(("page_token", t));
            }

            let page: SearchResponse = self.get_json("model-versions/search", &query)?;
            debug!(
                model = model_name,
                count = page.model_versions.len(),
                "mlflow model-versions/search page"
            );
            out.extend(page.model_versions.into_iter().map(ModelVersion::from));

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(t) => page_token = Some(t),
                None => break,
            }
        }

        Ok(out)
    }

    fn resolve_alias(&self, model_name: &str, alias: &str) -> Result<ModelVersion, RegistryError> {
        let resp: AliasResponse = self.get_json(
            "registered-models/alias",
            &[("name", model_name), ("alias", alias)],
        )?;
        Ok(resp.model_version.into())
    }

    fn set_alias(&self, model_name: &str, alias: &str, version: &str) -> Result<(), RegistryError> {
        self.post_json(
            "registered-models/alias",
            &json!({ "name": model_name, "alias": alias, "version": version }),
        )
    }

    fn set_tag(
        &self,
        model_name: &str,
        version: &str,
        key: &str,
        value: &str,
    ) -> Result<(), RegistryError> {
        self.post_json(
            "model-versions/set-tag",
            &json!({ "name": model_name, "version": version, "key": key, "value": value }),
        )
    }
}

impl MetricsSource for MlflowClient {
    fn get_metrics(&self, version: &ModelVersion) -> Result<Metrics, RegistryError> {
        let Some(run_id) = version.run_id.as_deref() else {
            return Ok(version.metrics.clone());
        };

        let resp: RunResponse = self.get_json("runs/get", &[("run_id", run_id)])?;
        let mut metrics = version.metrics.clone();
        for m in resp.run.data.metrics {
            metrics.insert(m.key, m.value);
        }
        Ok(metrics)
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct MlflowErrorBody {
    error_code: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    model_versions: Vec<MlflowModelVersion>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AliasResponse {
    model_version: MlflowModelVersion,
}

#[derive(Debug, Deserialize)]
struct MlflowModelVersion {
    name: String,
    version: String,
    #[serde(default)]
    run_id: Option<String>,
    #[serde(default)]
    tags: Vec<MlflowTag>,
}

#[derive(Debug, Deserialize)]
struct MlflowTag {
    key: String,
    #[serde(default)]
    value: String,
}

impl From<MlflowModelVersion> for ModelVersion {
    fn from(v: MlflowModelVersion) -> Self {
        let tags: BTreeMap<String, String> = v.tags.into_iter().map(|t| (t.key, t.value)).collect();
        ModelVersion {
            name: v.name,
            version: v.version,
            run_id: v.run_id.filter(|r| !r.is_empty()),
            metrics: Metrics::new(),
            tags,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RunResponse {
    run: MlflowRun,
}

#[derive(Debug, Deserialize)]
struct MlflowRun {
    #[serde(default)]
    data: MlflowRunData,
}

#[derive(Debug, Default, Deserialize)]
struct MlflowRunData {
    #[serde(default)]
    metrics: Vec<MlflowMetric>,
}

#[derive(Debug, Deserialize)]
struct MlflowMetric {
    key: String,
    #[serde(deserialize_with = "metric_value")]
    value: f64,
}

/// MLflow serializes non-finite metric values as the strings `"NaN"`,
/// `"Infinity"` and `"-Infinity"`; finite values are plain numbers.
fn metric_value<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(v) => Ok(v),
        Raw::Text(s) => match s.trim() {
            "NaN" => Ok(f64::NAN),
            "Infinity" => Ok(f64::INFINITY),
            "-Infinity" => Ok(f64::NEG_INFINITY),
            other => other
                .parse::<f64>()
                .map_err(|_| serde::de::Error::custom(format!("invalid metric value {other:?}"))),
        },
    }
}
