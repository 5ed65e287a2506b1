//! PostgREST client for the hosted database
//!
//! Talks to the `/rest/v1` interface with the service-role key. Reads map
//! failures to `Error::DataFetch`, writes to `Error::Persistence`.

use async_trait::async_trait;
use futures::future::try_join_all;
use reqwest::header::CONTENT_RANGE;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::cluster::types::{Cluster, Transaction, WalletAnalytics};
use crate::error::{Error, Result};
use crate::store::{ClusterStore, StoreConfig, TransactionStore, WalletAnalyticsStore};

/// Addresses per `in.(...)` filter, keeps request URLs short
const ANALYTICS_CHUNK: usize = 100;

const TRANSACTION_COLUMNS: &str = "wallet_address,token_id,created_at,token_amount,transaction_type";
const ANALYTICS_COLUMNS: &str = "wallet_address,age_days,transaction_count,tier";
const CLUSTER_COLUMNS: &str =
    "cluster_id,wallet_addresses,token_id,total_holdings,risk_score,detection_method";

/// Arguments for the atomic replace function
#[derive(Serialize)]
struct ReplaceArgs<'a> {
    p_token_id: &'a str,
    p_clusters: &'a [Cluster],
}

/// PostgREST-backed store
pub struct PostgrestStore {
    client: Client,
    /// `<project url>/rest/v1`
    rest_url: String,
    api_key: String,
    config: StoreConfig,
}

impl PostgrestStore {
    pub fn new(config: StoreConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        let base = url::Url::parse(&config.url)
            .map_err(|e| Error::Config(format!("Invalid store URL {}: {}", config.url, e)))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(Error::Config(format!(
                "Store URL must be http(s), got {}",
                base.scheme()
            )));
        }
        let rest_url = format!("{}/rest/v1", config.url.trim_end_matches('/'));

        Ok(Self {
            client,
            rest_url,
            api_key: config.service_role_key.clone(),
            config,
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/{}", self.rest_url, table)
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    /// Run a read and decode its JSON rows
    async fn fetch_rows<T: DeserializeOwned>(
        &self,
        what: &'static str,
        request: RequestBuilder,
    ) -> Result<Vec<T>> {
        let response = self
            .authed(request)
            .send()
            .await
            .map_err(|e| Error::fetch(what, e))?;
        let response = ensure_success(response).await.map_err(|e| Error::fetch(what, e))?;

        response
            .json::<Vec<T>>()
            .await
            .map_err(|e| Error::fetch(what, format!("invalid response body: {}", e)))
    }

    /// Read every row of a filtered query.
    ///
    /// The server caps each response at its `max-rows`, so pages are
    /// requested with `limit`/`offset` until `Content-Range` reports the
    /// total has been read.
    async fn fetch_all_rows<T: DeserializeOwned>(
        &self,
        what: &'static str,
        table: &str,
        filters: &[(&str, String)],
    ) -> Result<Vec<T>> {
        let page_size = self.config.page_size.max(1);
        let mut rows: Vec<T> = Vec::new();

        loop {
            let offset = rows.len();
            let request = self
                .client
                .get(self.table_url(table))
                .query(filters)
                .query(&[("limit", page_size), ("offset", offset)])
                .header("Prefer", "count=exact");

            let response = self
                .authed(request)
                .send()
                .await
                .map_err(|e| Error::fetch(what, e))?;
            let response = ensure_success(response).await.map_err(|e| Error::fetch(what, e))?;
            let total = response
                .headers()
                .get(CONTENT_RANGE)
                .and_then(|v| v.to_str().ok())
                .and_then(content_range_total);

            let page: Vec<T> = response
                .json()
                .await
                .map_err(|e| Error::fetch(what, format!("invalid response body: {}", e)))?;
            let received = page.len();
            rows.extend(page);

            match total {
                Some(total) if rows.len() >= total => break,
                Some(total) if received == 0 => {
                    return Err(Error::fetch(
                        what,
                        format!("server reported {} rows but returned {}", total, rows.len()),
                    ));
                }
                None if received < page_size => break,
                _ => {}
            }

            debug!(what = %what, read = %rows.len(), total = ?total, "Fetching next page");
        }

        Ok(rows)
    }

    /// Run a write, discarding the body
    async fn write(&self, request: RequestBuilder) -> Result<()> {
        let response = self
            .authed(request)
            .send()
            .await
            .map_err(|e| Error::Persistence(e.to_string()))?;
        ensure_success(response).await.map_err(Error::Persistence)?;
        Ok(())
    }

    async fn analytics_chunk(&self, chunk: &[String]) -> Result<Vec<WalletAnalytics>> {
        let request = self
            .client
            .get(self.table_url(&self.config.analytics_table))
            .query(&[
                ("select", ANALYTICS_COLUMNS.to_string()),
                ("wallet_address", in_filter(chunk)),
            ]);
        self.fetch_rows("wallet analytics", request).await
    }
}

/// Turn a non-2xx response into its status and body text
async fn ensure_success(response: Response) -> std::result::Result<Response, String> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(format!("PostgREST error {}: {}", status, body))
}

/// Total from a `Content-Range` value such as `0-999/2500`; `None` for `*`
fn content_range_total(value: &str) -> Option<usize> {
    value.rsplit('/').next()?.trim().parse().ok()
}

/// `in.("a","b")` filter value
fn in_filter(values: &[String]) -> String {
    let quoted: Vec<String> = values
        .iter()
        .map(|v| format!("\"{}\"", v.replace('"', "")))
        .collect();
    format!("in.({})", quoted.join(","))
}

#[async_trait]
impl TransactionStore for PostgrestStore {
    async fn buy_transactions(&self, token_id: &str) -> Result<Vec<Transaction>> {
        debug!(token = %token_id, "Fetching buy transactions");

        let filters = [
            ("select", TRANSACTION_COLUMNS.to_string()),
            ("token_id", format!("eq.{}", token_id)),
            ("transaction_type", "eq.buy".to_string()),
            ("order", "created_at.asc".to_string()),
        ];
        self.fetch_all_rows("transactions", &self.config.transactions_table, &filters)
            .await
    }

    async fn ping(&self) -> Result<()> {
        let request = self
            .client
            .get(self.table_url(&self.config.clusters_table))
            .query(&[("select", "cluster_id"), ("limit", "1")]);
        self.fetch_rows::<serde_json::Value>("wallet clusters", request)
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl WalletAnalyticsStore for PostgrestStore {
    async fn analytics_for(&self, wallets: &[String]) -> Result<Vec<WalletAnalytics>> {
        if wallets.is_empty() {
            return Ok(Vec::new());
        }
        debug!(wallets = %wallets.len(), "Fetching wallet analytics");

        let chunks = try_join_all(
            wallets
                .chunks(ANALYTICS_CHUNK)
                .map(|chunk| self.analytics_chunk(chunk)),
        )
        .await?;

        Ok(chunks.into_iter().flatten().collect())
    }

    async fn upsert_analytics(&self, records: &[WalletAnalytics]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let request = self
            .client
            .post(self.table_url(&self.config.analytics_table))
            .query(&[("on_conflict", "wallet_address")])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(records);
        self.write(request).await
    }
}

#[async_trait]
impl ClusterStore for PostgrestStore {
    async fn replace_clusters(&self, token_id: &str, clusters: &[Cluster]) -> Result<()> {
        if let Some(function) = &self.config.replace_rpc {
            debug!(token = %token_id, function = %function, "Replacing clusters via RPC");
            let request = self
                .client
                .post(format!("{}/rpc/{}", self.rest_url, function))
                .json(&ReplaceArgs {
                    p_token_id: token_id,
                    p_clusters: clusters,
                });
            return self.write(request).await;
        }

        let table = self.table_url(&self.config.clusters_table);

        let delete = self
            .client
            .delete(&table)
            .query(&[("token_id", format!("eq.{}", token_id))]);
        self.write(delete).await?;

        if clusters.is_empty() {
            return Ok(());
        }

        let insert = self
            .client
            .post(&table)
            .header("Prefer", "return=minimal")
            .json(clusters);
        if let Err(e) = self.write(insert).await {
            warn!(
                token = %token_id,
                error = %e,
                "Cluster insert failed after delete; token has no clusters until next run"
            );
            return Err(e);
        }
        Ok(())
    }

    async fn clusters_for(&self, token_id: &str) -> Result<Vec<Cluster>> {
        let request = self
            .client
            .get(self.table_url(&self.config.clusters_table))
            .query(&[
                ("select", CLUSTER_COLUMNS.to_string()),
                ("token_id", format!("eq.{}", token_id)),
                ("order", "cluster_id.asc".to_string()),
            ]);
        self.fetch_rows("wallet clusters", request).await
    }
}
