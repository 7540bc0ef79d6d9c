use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, Context as _, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use url::Url;

use crate::config::ClientConfig;
use crate::flatten;
use crate::format::format_file_size;
use crate::logging;
use crate::model::process::Process;
use crate::model::source::DatasetRef;
use crate::table::Table;

const API_KEY_HEADER: &str = "X-API-Key";

/// Synchronous client for the workbench API. One remote request per call, no
/// shared mutable state; entities are built fresh from each response.
pub struct Client {
    agent: ureq::Agent,
    base_url: Url,
    api_key: String,
}

/// Acknowledgement returned by every operation submission.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationAccepted {
    #[serde(default)]
    pub id: Option<i64>,
    pub process_id: i64,
    pub process_version: i64,
    pub status: String,
    #[serde(default)]
    pub task_type: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub started_on: Option<f64>,
    #[serde(default)]
    pub completed_on: Option<f64>,
}

/// Optional knobs for the transform operations, serialized with the wire
/// field names the toolkit expects.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feature_source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attr_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attr_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attr_category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attr_geometry: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attr_x: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attr_y: Option<String>,
    #[serde(rename = "sourceCRS", skip_serializing_if = "Option::is_none")]
    pub source_crs: Option<String>,
    #[serde(rename = "targetCRS", skip_serializing_if = "Option::is_none")]
    pub target_crs: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_lang: Option<String>,
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(anyhow!("an API key is required"));
        }
        let mut base_url = Url::parse(&config.base_url)
            .with_context(|| format!("invalid base URL `{}`", config.base_url))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build();
        Ok(Self {
            agent,
            base_url,
            api_key: config.api_key,
        })
    }

    // ---- file system -----------------------------------------------------

    /// Browses the remote user file system as a flat table. An unknown sort
    /// column falls back to `modified` with a warning instead of failing.
    pub fn file_browse(&self, sort_col: &str, sort_asc: bool, format_size: bool) -> Result<Table> {
        let tree = self.get_json("api/v1/file-system", &[])?;
        let rows = flatten::file_system_rows(&tree)?;
        let mut table = Table::from_rows(&flatten::FILE_BROWSE_COLUMNS, rows)?;

        let sort_col = if table.column_index(sort_col).is_some() {
            sort_col
        } else {
            logging::warn(
                &format!("column `{sort_col}` was not found, sorting by column `modified`"),
                None,
            );
            "modified"
        };
        table.sort_by(&[sort_col], sort_asc)?;

        if format_size {
            table.format_column("size", format_size_cell)?;
        }
        Ok(table)
    }

    pub fn file_upload(&self, source: &Path, target: &str, overwrite: bool) -> Result<()> {
        let file = fs::File::open(source)
            .with_context(|| format!("unable to read upload source {}", source.display()))?;
        let url = self.endpoint("api/v1/file-system/upload")?;
        self.agent
            .post(url.as_str())
            .set(API_KEY_HEADER, &self.api_key)
            .set("Content-Type", "application/octet-stream")
            .query("path", target)
            .query("overwrite", if overwrite { "true" } else { "false" })
            .send(file)
            .with_context(|| format!("upload of {} failed", source.display()))?;
        logging::info("file uploaded", Some(json!({ "target": target })));
        Ok(())
    }

    pub fn file_download(&self, source: &str, target: &Path) -> Result<()> {
        self.download_to("api/v1/file-system/download", &[("path", source.to_string())], target)?;
        logging::info(
            "file downloaded",
            Some(json!({ "source": source, "target": target.display().to_string() })),
        );
        Ok(())
    }

    // ---- catalog ---------------------------------------------------------

    pub fn catalog_query(
        &self,
        term: Option<&str>,
        page_index: u32,
        page_size: u32,
    ) -> Result<Table> {
        let result = self.get_json("api/v1/resources", &paged_query(term, page_index, page_size))?;
        let rows = flatten::catalog_rows(result.get("items").unwrap_or(&Value::Null))?;
        Table::from_rows(&flatten::CATALOG_COLUMNS, rows)
    }

    pub fn catalog_download(&self, resource_id: i64, version: i64, target: &Path) -> Result<()> {
        let path = format!("api/v1/resources/{resource_id}/{version}/download");
        self.download_to(&path, &[], target)?;
        logging::info(
            "resource downloaded",
            Some(json!({
                "resource": [resource_id, version],
                "target": target.display().to_string(),
            })),
        );
        Ok(())
    }

    // ---- workflows -------------------------------------------------------

    pub fn process_query(
        &self,
        term: Option<&str>,
        page_index: u32,
        page_size: u32,
    ) -> Result<Table> {
        let result = self.get_json("api/v1/workflows", &paged_query(term, page_index, page_size))?;
        let rows = flatten::workflow_rows(result.get("items").unwrap_or(&Value::Null))?;
        Table::from_rows(&flatten::WORKFLOW_COLUMNS, rows)
    }

    /// Fetches the definition/execution pair of one workflow revision.
    pub fn process_status(&self, process_id: i64, process_version: i64) -> Result<Process> {
        let record = self.get_json(&format!("api/v1/workflows/{process_id}/{process_version}"), &[])?;
        let process = Process::from_record(record)?;
        logging::info(
            &format!(
                "process ({process_id}, {process_version}) status is {}",
                process.status()
            ),
            None,
        );
        Ok(process)
    }

    pub fn process_start(&self, process_id: i64, process_version: i64) -> Result<()> {
        self.post_empty(&format!("api/v1/workflows/{process_id}/{process_version}/start"))?;
        logging::info(
            "process started",
            Some(json!({ "process": [process_id, process_version] })),
        );
        Ok(())
    }

    pub fn process_stop(&self, process_id: i64, process_version: i64) -> Result<()> {
        self.post_empty(&format!("api/v1/workflows/{process_id}/{process_version}/stop"))?;
        logging::info(
            "process stopped",
            Some(json!({ "process": [process_id, process_version] })),
        );
        Ok(())
    }

    pub fn process_file_download(
        &self,
        process_id: i64,
        process_version: i64,
        file_id: i64,
        target: &Path,
    ) -> Result<()> {
        let path = format!("api/v1/workflows/{process_id}/{process_version}/files/{file_id}");
        self.download_to(&path, &[], target)?;
        logging::info(
            "process file downloaded",
            Some(json!({
                "file": [process_id, process_version, file_id],
                "target": target.display().to_string(),
            })),
        );
        Ok(())
    }

    /// Downloads any dataset address form to a local path.
    pub fn download(&self, source: impl Into<DatasetRef>, target: &Path) -> Result<()> {
        match source.into() {
            DatasetRef::Path(path) => self.file_download(&path, target),
            DatasetRef::Catalog { id, version } => self.catalog_download(id, version, target),
            DatasetRef::Output {
                process_id,
                process_version,
                file_id,
            } => self.process_file_download(process_id, process_version, file_id, target),
        }
    }

    // ---- toolkit operations ----------------------------------------------

    /// Available per-tool profile names.
    pub fn profiles(&self) -> Result<Value> {
        self.get_json("api/v1/toolkit/profiles", &[])
    }

    pub fn transform_csv(
        &self,
        path: &str,
        profile: &str,
        options: &TransformOptions,
    ) -> Result<OperationAccepted> {
        self.submit_operation("api/v1/toolkit/transform/csv", transform_body(path, profile, options)?)
    }

    pub fn transform_shapefile(
        &self,
        path: &str,
        profile: &str,
        options: &TransformOptions,
    ) -> Result<OperationAccepted> {
        self.submit_operation(
            "api/v1/toolkit/transform/shapefile",
            transform_body(path, profile, options)?,
        )
    }

    pub fn interlink(
        &self,
        profile: &str,
        left: impl Into<DatasetRef>,
        right: impl Into<DatasetRef>,
    ) -> Result<OperationAccepted> {
        let body = json!({
            "profile": profile,
            "left": left.into().to_request_value(),
            "right": right.into().to_request_value(),
        });
        self.submit_operation("api/v1/toolkit/interlink", body)
    }

    pub fn fuse(
        &self,
        profile: &str,
        left: impl Into<DatasetRef>,
        right: impl Into<DatasetRef>,
        links: impl Into<DatasetRef>,
    ) -> Result<OperationAccepted> {
        let body = json!({
            "profile": profile,
            "left": left.into().to_request_value(),
            "right": right.into().to_request_value(),
            "links": links.into().to_request_value(),
        });
        self.submit_operation("api/v1/toolkit/fuse", body)
    }

    pub fn enrich(
        &self,
        profile: &str,
        source: impl Into<DatasetRef>,
    ) -> Result<OperationAccepted> {
        let body = json!({
            "profile": profile,
            "source": source.into().to_request_value(),
        });
        self.submit_operation("api/v1/toolkit/enrich", body)
    }

    fn submit_operation(&self, path: &str, body: Value) -> Result<OperationAccepted> {
        let response = self.post_json(path, &body)?;
        let accepted: OperationAccepted = serde_json::from_value(response)
            .map_err(|err| anyhow!("malformed operation response: {err}"))?;
        logging::info(
            &format!(
                "new process ({}, {}) status is {}",
                accepted.process_id, accepted.process_version, accepted.status
            ),
            None,
        );
        Ok(accepted)
    }

    // ---- transport -------------------------------------------------------

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .with_context(|| format!("invalid endpoint path `{path}`"))
    }

    fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        let url = self.endpoint(path)?;
        let mut request = self.agent.get(url.as_str()).set(API_KEY_HEADER, &self.api_key);
        for (name, value) in query {
            request = request.query(name, value);
        }
        request
            .call()
            .with_context(|| format!("request to `{path}` failed"))?
            .into_json()
            .with_context(|| format!("invalid JSON response from `{path}`"))
    }

    fn post_json(&self, path: &str, body: &Value) -> Result<Value> {
        let url = self.endpoint(path)?;
        self.agent
            .post(url.as_str())
            .set(API_KEY_HEADER, &self.api_key)
            .send_json(body)
            .with_context(|| format!("request to `{path}` failed"))?
            .into_json()
            .with_context(|| format!("invalid JSON response from `{path}`"))
    }

    fn post_empty(&self, path: &str) -> Result<()> {
        let url = self.endpoint(path)?;
        self.agent
            .post(url.as_str())
            .set(API_KEY_HEADER, &self.api_key)
            .call()
            .with_context(|| format!("request to `{path}` failed"))?;
        Ok(())
    }

    fn download_to(&self, path: &str, query: &[(&str, String)], target: &Path) -> Result<()> {
        let url = self.endpoint(path)?;
        let mut request = self.agent.get(url.as_str()).set(API_KEY_HEADER, &self.api_key);
        for (name, value) in query {
            request = request.query(name, value);
        }
        let response = request
            .call()
            .with_context(|| format!("request to `{path}` failed"))?;

        if let Some(parent) = target.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("unable to create parent directory for {}", target.display())
                })?;
            }
        }
        let mut file = fs::File::create(target)
            .with_context(|| format!("unable to create {}", target.display()))?;
        std::io::copy(&mut response.into_reader(), &mut file)
            .with_context(|| format!("unable to write {}", target.display()))?;
        Ok(())
    }
}

fn format_size_cell(cell: &Value) -> Value {
    match cell.as_f64() {
        Some(num) => Value::from(format_file_size(num)),
        None => cell.clone(),
    }
}

fn paged_query(term: Option<&str>, page_index: u32, page_size: u32) -> Vec<(&'static str, String)> {
    let mut query = vec![
        ("pageIndex", page_index.to_string()),
        ("pageSize", page_size.to_string()),
    ];
    if let Some(term) = term {
        query.push(("term", term.to_string()));
    }
    query
}

fn transform_body(path: &str, profile: &str, options: &TransformOptions) -> Result<Value> {
    let mut body = serde_json::to_value(options)?;
    let map = body
        .as_object_mut()
        .ok_or_else(|| anyhow!("transform options must serialize to an object"))?;
    map.insert("path".to_string(), Value::from(path));
    map.insert("profile".to_string(), Value::from(profile));
    Ok(body)
}
