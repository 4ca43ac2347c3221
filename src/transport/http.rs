use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use super::{InstanceGateway, TransportError};
use crate::model::{Instance, InstanceList};

#[derive(Debug, Clone)]
pub struct InstanceApi {
    client: Client,
    base_url: Url,
}

impl InstanceApi {
    pub fn new(client: Client, base_url: Url) -> Self {
        Self { client, base_url }
    }

    fn delete_url(&self, id: &str) -> Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut().append_pair("id", id);
        url
    }
}

impl InstanceGateway for InstanceApi {
    async fn fetch_instances(&self) -> Result<Vec<Instance>, TransportError> {
        debug!("GET {}", self.base_url);
        let response = self.client.get(self.base_url.clone()).send().await?;
        let list: InstanceList = read_json(response).await?;
        Ok(list.data)
    }

    async fn create_instance(&self) -> Result<Value, TransportError> {
        debug!("POST {}", self.base_url);
        let response = self
            .client
            .post(self.base_url.clone())
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await?;
        read_ack(response).await
    }

    async fn delete_instance(&self, id: &str) -> Result<Value, TransportError> {
        let url = self.delete_url(id);
        debug!("DELETE {url}");
        let response = self.client.delete(url).send().await?;
        read_ack(response).await
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, TransportError> {
    let status = response.status();
    if !status.is_success() {
        return Err(TransportError::Status { status });
    }
    let body = response.bytes().await?;
    Ok(serde_json::from_slice(&body)?)
}

async fn read_ack(response: Response) -> Result<Value, TransportError> {
    let status = response.status();
    if !status.is_success() {
        return Err(TransportError::Status { status });
    }
    let body = response.bytes().await?;
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_slice(&body)?)
}
