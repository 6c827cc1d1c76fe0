use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use kube::api::{Api, ApiResource, DynamicObject, ListParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use serde_json::Value;
use tracing::{debug, warn};

use crate::sql::{Gvk, ResourceLister};

/// Timeout for connecting to the API server
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for reading API responses
const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum retry attempts for transient failures
const MAX_RETRIES: u32 = 3;

/// Base delay for exponential backoff (doubles each retry)
const RETRY_BASE_DELAY: Duration = Duration::from_millis(100);

/// Resource lister over the dynamic object API of one cluster.
pub struct KubeLister {
    client: Client,
}

impl KubeLister {
    /// Connect using the given kubeconfig file, or the standard
    /// location (respecting `KUBECONFIG`) when none is given.
    pub async fn new(kubeconfig: Option<&Path>) -> Result<Self> {
        let kubeconfig = match kubeconfig {
            Some(path) => Kubeconfig::read_from(path)
                .with_context(|| format!("Failed to read kubeconfig {}", path.display()))?,
            None => Kubeconfig::read().context("Failed to read kubeconfig")?,
        };

        let mut config =
            Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default()).await?;

        // Set timeouts for reliability
        config.connect_timeout = Some(CONNECT_TIMEOUT);
        config.read_timeout = Some(READ_TIMEOUT);

        Ok(Self {
            client: Client::try_from(config)?,
        })
    }

    /// The query names resources the way the API path does (`pods`,
    /// `deployments`), so the name doubles as the plural and no
    /// discovery round trip is needed.
    fn api_resource(gvk: &Gvk) -> ApiResource {
        let api_version = if gvk.group.is_empty() {
            gvk.version.clone()
        } else {
            format!("{}/{}", gvk.group, gvk.version)
        };

        ApiResource {
            group: gvk.group.clone(),
            version: gvk.version.clone(),
            api_version,
            kind: gvk.kind.clone(),
            plural: gvk.kind.to_lowercase(),
        }
    }

    /// List with retry and exponential backoff on transient failures.
    async fn list_with_retry(
        &self,
        api: &Api<DynamicObject>,
        gvk: &Gvk,
    ) -> Result<Vec<DynamicObject>> {
        let params = ListParams::default();
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            match api.list(&params).await {
                Ok(list) => return Ok(list.items),
                Err(e) if is_retryable_error(&e) => {
                    let delay = RETRY_BASE_DELAY * 2u32.pow(attempt);
                    warn!(
                        resource = %gvk,
                        attempt = attempt + 1,
                        max_attempts = MAX_RETRIES,
                        delay_ms = delay.as_millis(),
                        error = %e,
                        "Retryable error, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    last_error = Some(e);
                }
                Err(e) => {
                    debug!(resource = %gvk, error = %e, "Non-retryable error");
                    return Err(anyhow!("K8s API error for {}: {}", gvk, e));
                }
            }
        }

        Err(anyhow!(
            "Failed to list {} after {} retries: {}",
            gvk,
            MAX_RETRIES,
            last_error.map(|e| e.to_string()).unwrap_or_default()
        ))
    }
}

/// Check if an error is retryable (transient failures)
fn is_retryable_error(err: &kube::Error) -> bool {
    match err {
        // Network/connection errors are retryable
        kube::Error::HyperError(_) => true,
        // API errors: retry on 429 (rate limit), 503 (unavailable), 504 (timeout)
        kube::Error::Api(api_err) => matches!(api_err.code, 429 | 503 | 504),
        _ => false,
    }
}

impl ResourceLister for KubeLister {
    async fn list(&self, gvk: &Gvk, namespace: Option<&str>) -> Result<Vec<Value>> {
        let ar = Self::api_resource(gvk);

        let api: Api<DynamicObject> = match namespace {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, &ar),
            None => Api::all_with(self.client.clone(), &ar),
        };

        debug!(
            resource = %gvk,
            namespace = namespace.unwrap_or("<all>"),
            "listing resources"
        );
        let items = self.list_with_retry(&api, gvk).await?;

        let values = items
            .into_iter()
            .map(|item| {
                let mut value = serde_json::to_value(item).unwrap_or(Value::Null);
                // the list API omits apiVersion and kind on each item
                if let Value::Object(ref mut map) = value {
                    map.insert(
                        "apiVersion".to_string(),
                        Value::String(ar.api_version.clone()),
                    );
                    map.insert("kind".to_string(), Value::String(ar.kind.clone()));
                }
                value
            })
            .collect();

        Ok(values)
    }
}
