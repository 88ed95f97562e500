use std::time::Duration;

use async_trait::async_trait;
use common::{
    CatalogItem, ItemId, ItemInfo, SYNC_MARKER_HEADER, SYNC_MARKER_VALUE, SyncAck, SyncMessage,
    UpdateRequest, UpdateResponse,
};
use reqwest::{Response, StatusCode};

use super::CatalogClient;
use crate::error::ClientError;

/// Catalog client speaking the replicas' HTTP API.
#[derive(Debug, Clone)]
pub struct HttpCatalogClient {
    http: reqwest::Client,
}

impl HttpCatalogClient {
    /// Creates a client whose requests each time out after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| ClientError::Unreachable(e.to_string()))?;
        Ok(Self { http })
    }
}

/// Joins `route` and the item ID onto the replica base address. The ID is
/// percent-encoded as a single path segment.
fn url(replica: &str, route: &str, id: &ItemId) -> Result<reqwest::Url, ClientError> {
    let mut url = reqwest::Url::parse(replica)
        .map_err(|e| ClientError::Unreachable(format!("invalid replica address {replica}: {e}")))?;
    url.path_segments_mut()
        .map_err(|_| ClientError::Unreachable(format!("invalid replica address {replica}")))?
        .pop_if_empty()
        .push(route)
        .push(id.as_str());
    Ok(url)
}

pub(crate) fn transport_error(err: reqwest::Error) -> ClientError {
    if err.is_timeout() {
        ClientError::Timeout
    } else if err.is_decode() {
        ClientError::Decode(err.to_string())
    } else {
        ClientError::Unreachable(err.to_string())
    }
}

pub(crate) async fn status_error(response: Response) -> ClientError {
    let status = response.status();
    match status {
        StatusCode::NOT_FOUND => ClientError::NotFound,
        StatusCode::CONFLICT => ClientError::Conflict,
        StatusCode::FORBIDDEN | StatusCode::UNAUTHORIZED => ClientError::Unauthorized,
        _ => ClientError::Status {
            status: status.as_u16(),
            message: response.text().await.unwrap_or_default(),
        },
    }
}

#[async_trait]
impl CatalogClient for HttpCatalogClient {
    async fn fetch_item(&self, replica: &str, id: &ItemId) -> Result<Option<ItemInfo>, ClientError> {
        let response = self
            .http
            .get(url(replica, "info", id)?)
            .send()
            .await
            .map_err(transport_error)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let info = response.json::<ItemInfo>().await.map_err(transport_error)?;
        Ok(Some(info))
    }

    async fn update_item(
        &self,
        replica: &str,
        id: &ItemId,
        request: &UpdateRequest,
    ) -> Result<CatalogItem, ClientError> {
        let response = self
            .http
            .put(url(replica, "update", id)?)
            .header(SYNC_MARKER_HEADER, SYNC_MARKER_VALUE)
            .json(request)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let body = response
            .json::<UpdateResponse>()
            .await
            .map_err(transport_error)?;
        Ok(body.item)
    }

    async fn sync_item(&self, replica: &str, message: &SyncMessage) -> Result<(), ClientError> {
        let response = self
            .http
            .post(url(replica, "sync-update", &message.item_id)?)
            .header(SYNC_MARKER_HEADER, SYNC_MARKER_VALUE)
            .json(&message.patch)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let ack = response.json::<SyncAck>().await.map_err(transport_error)?;
        if !ack.ack {
            return Err(ClientError::Decode("peer did not acknowledge sync".to_string()));
        }
        Ok(())
    }
}
