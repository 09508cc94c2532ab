/*
 * SPDX-FileCopyrightText: 2025 Wavelens UG <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use async_trait::async_trait;
use beanaries_core::consts::KOJI_HUB_URL;
use entity::project_config::DataSource;
use serde_json::json;
use std::sync::Arc;
use tracing::warn;

use crate::engine::{Cursor, Page, SourceConnector, SyncTarget};
use crate::error::{ScrapeError, ScrapeResult};
use crate::infer::{koji_success, parse_koji_time};
use crate::record::{BuildRecord, NaturalKey};
use crate::source::{KojiLocator, SourceLocator};
use crate::transport::{HttpRequest, Transport};
use crate::xmlrpc::{Value, decode_response, encode_call};

const SERVICE: &str = "koji";
const TIMEOUT_SECS: u64 = 60;
const UNKNOWN_COMMIT: &str = "unknown";

#[derive(Debug, Clone, PartialEq)]
pub struct KojiBuild {
    pub build_id: i64,
    pub nvr: Option<String>,
    pub task_id: Option<i64>,
    pub state: i64,
    pub source: Option<String>,
    pub creation_time: Option<String>,
    pub completion_time: Option<String>,
}

impl KojiBuild {
    fn from_value(value: &Value) -> Option<Self> {
        let text = |key: &str| value.get(key).and_then(Value::as_str).map(str::to_string);

        Some(Self {
            build_id: value.get("build_id").and_then(Value::as_i64)?,
            nvr: text("nvr"),
            task_id: value.get("task_id").and_then(Value::as_i64),
            state: value.get("state").and_then(Value::as_i64).unwrap_or(-1),
            source: text("source"),
            creation_time: text("creation_time"),
            completion_time: text("completion_time"),
        })
    }

    /// Commit hash from a `git+https://...#<sha>` source URL.
    pub fn commit_sha(&self) -> Option<String> {
        let (_, fragment) = self.source.as_deref()?.rsplit_once('#')?;
        let sha: String = fragment.chars().take(40).collect();
        (!sha.is_empty()).then_some(sha)
    }
}

pub struct KojiConnector {
    transport: Arc<dyn Transport>,
    hub_url: String,
}

impl KojiConnector {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_hub_url(transport, KOJI_HUB_URL)
    }

    pub fn with_hub_url(transport: Arc<dyn Transport>, hub_url: impl Into<String>) -> Self {
        Self {
            transport,
            hub_url: hub_url.into(),
        }
    }

    async fn call(&self, method: &str, params: &[Value]) -> ScrapeResult<Value> {
        let request = HttpRequest::post(&self.hub_url)
            .body("text/xml", encode_call(method, params))
            .timeout(TIMEOUT_SECS);

        let response = self
            .transport
            .send(request)
            .await?
            .error_for_status(SERVICE)?;

        decode_response(&response.body).map_err(|e| ScrapeError::fetch(&response.url, e))
    }

    async fn package_id(&self, package: &str) -> ScrapeResult<Option<i64>> {
        let package = self.call("getPackage", &[package.into()]).await?;
        Ok(package.get("id").and_then(Value::as_i64))
    }

    pub fn web_url(&self) -> String {
        self.hub_url.replace("/kojihub", "/koji")
    }
}

#[async_trait]
impl SourceConnector for KojiConnector {
    type Locator = KojiLocator;
    type Item = KojiBuild;
    type Unit = KojiBuild;

    fn data_source(&self) -> DataSource {
        DataSource::Koji
    }

    fn locator<'a>(&self, locator: &'a SourceLocator) -> Option<&'a Self::Locator> {
        match locator {
            SourceLocator::Koji(l) => Some(l),
            _ => None,
        }
    }

    async fn fetch_page(
        &self,
        target: SyncTarget<'_, Self::Locator>,
        cursor: Option<&Cursor>,
        page_size: u32,
    ) -> ScrapeResult<Page<Self::Item>> {
        let (package_id, offset) = match cursor {
            Some(Cursor::Offset { scope, offset }) => (*scope, *offset),
            _ => match self.package_id(&target.locator.package).await? {
                Some(id) => (id, 0),
                None => {
                    warn!(package = %target.locator.package, "Package not found in Koji");
                    return Ok(Page::last(Vec::new()));
                }
            },
        };

        let query_opts = Value::structure(vec![
            ("limit", Value::Int(page_size.into())),
            ("offset", Value::Int(offset.into())),
            ("order", "-build_id".into()),
        ]);
        let params = [Value::keywords(vec![
            ("packageID", Value::Int(package_id)),
            ("queryOpts", query_opts),
        ])];

        let builds: Vec<KojiBuild> = self
            .call("listBuilds", &params)
            .await?
            .into_array()
            .unwrap_or_default()
            .iter()
            .filter_map(KojiBuild::from_value)
            .collect();

        Ok(Page::sized(
            builds,
            page_size,
            Cursor::Offset {
                scope: package_id,
                offset: offset + page_size,
            },
        ))
    }

    fn stream_id(&self, item: &Self::Item) -> String {
        item.build_id.to_string()
    }

    fn item_key(&self, _target: SyncTarget<'_, Self::Locator>, item: &Self::Item) -> Option<NaturalKey> {
        Some(NaturalKey::external(item.build_id))
    }

    async fn expand(
        &self,
        _target: SyncTarget<'_, Self::Locator>,
        items: Vec<Self::Item>,
    ) -> ScrapeResult<Vec<Self::Unit>> {
        Ok(items)
    }

    fn map_to_canonical(
        &self,
        target: SyncTarget<'_, Self::Locator>,
        unit: Self::Unit,
    ) -> ScrapeResult<BuildRecord> {
        let locator = target.locator;
        let sha = unit.commit_sha().unwrap_or_else(|| UNKNOWN_COMMIT.to_string());

        Ok(BuildRecord::new(
            target.config,
            NaturalKey::external(unit.build_id),
            sha,
            koji_success(unit.state),
        )
        .with_timing(
            unit.creation_time.as_deref().and_then(parse_koji_time),
            unit.completion_time.as_deref().and_then(parse_koji_time),
        )
        .with_runner(Some(format!("koji-{}", locator.package)))
        .with_workflow(None, None, unit.task_id.map(|t| t.to_string()))
        .with_url(Some(format!(
            "{}/buildinfo?buildID={}",
            self.web_url(),
            unit.build_id
        )))
        .with_metadata(json!({
            "build_id": unit.build_id.to_string(),
            "nvr": unit.nvr,
            "task_id": unit.task_id,
            "state": unit.state,
            "package_name": locator.package,
            "tag": locator.tag,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectors::fixtures;
    use crate::engine::{Scraper, SyncEngine};
    use crate::memory::MemoryRepository;

    const PACKAGE: &str = "<methodResponse><params><param><value><struct>
<member><name>id</name><value><int>42</int></value></member>
<member><name>name</name><value><string>gcc</string></value></member>
</struct></value></param></params></methodResponse>";

    const BUILDS: &str = "<methodResponse><params><param><value><array><data>
<value><struct>
<member><name>build_id</name><value><int>2401</int></value></member>
<member><name>nvr</name><value><string>gcc-14.1.1-6.fc41</string></value></member>
<member><name>task_id</name><value><int>118000</int></value></member>
<member><name>state</name><value><int>1</int></value></member>
<member><name>source</name><value><string>git+https://src.fedoraproject.org/rpms/gcc.git#4444444444444444444444444444444444444444</string></value></member>
<member><name>creation_time</name><value><string>2024-06-01 10:00:00.123456+00:00</string></value></member>
<member><name>completion_time</name><value><string>2024-06-01 12:00:00.123456+00:00</string></value></member>
</struct></value>
<value><struct>
<member><name>build_id</name><value><int>2400</int></value></member>
<member><name>state</name><value><int>3</int></value></member>
<member><name>source</name><value><nil/></value></member>
</struct></value>
</data></array></value></param></params></methodResponse>";

    const NIL: &str = "<methodResponse><params><param><value><nil/></value></param></params></methodResponse>";

    fn locator() -> SourceLocator {
        SourceLocator::Koji(KojiLocator {
            package: "gcc".to_string(),
            tag: None,
        })
    }

    fn connector(package_found: bool) -> KojiConnector {
        let transport = fixtures::transport(move |r| {
            let body = r.body.as_deref()?;
            if body.contains("<methodName>getPackage</methodName>") {
                Some(if package_found { PACKAGE } else { NIL }.to_string())
            } else if body.contains("<methodName>listBuilds</methodName>")
                && body.contains("<name>packageID</name><value><int>42</int></value>")
                && body.contains("<string>-build_id</string>")
            {
                Some(BUILDS.to_string())
            } else {
                None
            }
        });
        KojiConnector::with_hub_url(Arc::new(transport), "https://koji.example.org/kojihub")
    }

    #[test]
    fn test_commit_sha_from_source() {
        let mut build = KojiBuild {
            build_id: 1,
            nvr: None,
            task_id: None,
            state: 1,
            source: Some("git+https://src.fedoraproject.org/rpms/gcc.git#abc123".to_string()),
            creation_time: None,
            completion_time: None,
        };
        assert_eq!(build.commit_sha().as_deref(), Some("abc123"));

        build.source = Some("git+https://src.fedoraproject.org/rpms/gcc.git".to_string());
        assert_eq!(build.commit_sha(), None);
    }

    #[tokio::test]
    async fn test_sync_builds() {
        let engine = SyncEngine::new(connector(true));
        let repository = MemoryRepository::new();
        let config = fixtures::config(locator());

        let outcome = engine
            .sync(&config, &repository, &fixtures::options())
            .await
            .unwrap();
        assert_eq!(outcome.inserted, 2);

        let builds = repository.builds_for(config.project.id, DataSource::Koji);
        let complete = builds.iter().find(|b| b.success).unwrap();
        assert_eq!(complete.commit_sha, "4444444444444444444444444444444444444444");
        assert_eq!(complete.duration_seconds, Some(7200));
        assert_eq!(complete.runner.as_deref(), Some("koji-gcc"));
        assert_eq!(complete.job_id.as_deref(), Some("118000"));
        assert_eq!(
            complete.build_url.as_deref(),
            Some("https://koji.example.org/koji/buildinfo?buildID=2401")
        );

        let failed = builds.iter().find(|b| !b.success).unwrap();
        assert_eq!(failed.commit_sha, "unknown");
        assert_eq!(failed.natural_key, NaturalKey::external(2400));
    }

    #[tokio::test]
    async fn test_unknown_package_yields_nothing() {
        let engine = SyncEngine::new(connector(false));
        let repository = MemoryRepository::new();
        let config = fixtures::config(locator());

        let outcome = engine
            .sync(&config, &repository, &fixtures::options())
            .await
            .unwrap();

        assert_eq!(outcome.fetched, 0);
        assert_eq!(outcome.pages, 1);
        assert!(repository.builds().is_empty());
    }
}
