//! PostgREST table calls

use reqwest::{Client, Method, RequestBuilder};
use serde_json::Value;

use super::{read_json, send};
use crate::config::ClientConfig;
use crate::error::BackendResult;
use crate::query::{Filter, Query};

const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";
const RETURN_REPRESENTATION: &str = "return=representation";

#[derive(Debug, Clone)]
pub(crate) struct TablesApi {
    http: Client,
    config: ClientConfig,
    /// `apikey` header value (anon key, or service key for admin)
    apikey: String,
}

impl TablesApi {
    pub fn new(http: Client, config: ClientConfig, apikey: String) -> Self {
        Self {
            http,
            config,
            apikey,
        }
    }

    fn request(&self, method: Method, table: &str, bearer: &str) -> RequestBuilder {
        self.http
            .request(method, self.config.rest_url(table))
            .header("apikey", &self.apikey)
            .bearer_auth(bearer)
    }

    pub async fn select(&self, query: &Query, bearer: &str) -> BackendResult<Vec<Value>> {
        let mut req = self
            .request(Method::GET, &query.table, bearer)
            .query(&query.to_params());
        if query.single {
            req = req.header(reqwest::header::ACCEPT, SINGLE_OBJECT);
            let row: Value = read_json(send(req).await?).await?;
            return Ok(vec![row]);
        }
        read_json(send(req).await?).await
    }

    pub async fn insert(&self, table: &str, row: Value, bearer: &str) -> BackendResult<Vec<Value>> {
        let req = self
            .request(Method::POST, table, bearer)
            .header("Prefer", RETURN_REPRESENTATION)
            .json(&row);
        read_json(send(req).await?).await
    }

    pub async fn update(
        &self,
        table: &str,
        filter: &Filter,
        patch: Value,
        bearer: &str,
    ) -> BackendResult<Vec<Value>> {
        let req = self
            .request(Method::PATCH, table, bearer)
            .query(&[filter.to_param()])
            .header("Prefer", RETURN_REPRESENTATION)
            .json(&patch);
        read_json(send(req).await?).await
    }

    pub async fn delete(&self, table: &str, filter: &Filter, bearer: &str) -> BackendResult<()> {
        let req = self
            .request(Method::DELETE, table, bearer)
            .query(&[filter.to_param()]);
        send(req).await?;
        Ok(())
    }
}
