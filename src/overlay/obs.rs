//! obs-websocket v5 client
//!
//! Speaks just enough of the protocol to toggle scene items and filters:
//! Hello → Identify → Identified, then request/response pairs.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use futures::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use super::SceneController;
use crate::{Error, Result};

const RPC_VERSION: u32 = 1;
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(5);

mod op {
    pub const HELLO: u8 = 0;
    pub const IDENTIFY: u8 = 1;
    pub const IDENTIFIED: u8 = 2;
    pub const REQUEST: u8 = 6;
    pub const REQUEST_RESPONSE: u8 = 7;
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    op: u8,
    d: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Hello {
    rpc_version: u32,
    authentication: Option<AuthChallenge>,
}

#[derive(Debug, Deserialize)]
struct AuthChallenge {
    challenge: String,
    salt: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RequestResponse {
    request_id: String,
    request_status: RequestStatus,
    #[serde(default)]
    response_data: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RequestStatus {
    result: bool,
    code: u16,
    #[serde(default)]
    comment: Option<String>,
}

/// Connected OBS session
pub struct ObsClient {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl ObsClient {
    /// Connect and identify
    ///
    /// # Errors
    ///
    /// Returns error if the server is unreachable or rejects identification
    pub async fn connect(url: &str, password: Option<&SecretString>) -> Result<Self> {
        let (socket, _) = tokio_tungstenite::connect_async(url).await?;
        let mut client = Self { socket };
        client.identify(password).await?;

        tracing::info!(url, "connected to OBS");
        Ok(client)
    }

    async fn identify(&mut self, password: Option<&SecretString>) -> Result<()> {
        let hello = self.expect_op(op::HELLO).await?;
        let hello: Hello = serde_json::from_value(hello)?;

        if hello.rpc_version < RPC_VERSION {
            return Err(Error::Overlay(format!(
                "unsupported obs-websocket rpc version {}",
                hello.rpc_version
            )));
        }

        let mut identify = json!({ "rpcVersion": RPC_VERSION, "eventSubscriptions": 0 });
        if let Some(challenge) = hello.authentication {
            let password = password.ok_or_else(|| {
                Error::Overlay("OBS requires a password but none is configured".to_string())
            })?;
            identify["authentication"] = Value::String(authentication(
                password.expose_secret(),
                &challenge.salt,
                &challenge.challenge,
            ));
        }

        self.send(op::IDENTIFY, identify).await?;
        self.expect_op(op::IDENTIFIED).await?;
        Ok(())
    }

    /// Send one request and wait for its response data
    async fn request(&mut self, request_type: &str, data: Value) -> Result<Value> {
        let request_id = uuid::Uuid::new_v4().to_string();
        self.send(
            op::REQUEST,
            json!({
                "requestType": request_type,
                "requestId": request_id,
                "requestData": data,
            }),
        )
        .await?;

        loop {
            let payload = self.expect_op(op::REQUEST_RESPONSE).await?;
            let response: RequestResponse = serde_json::from_value(payload)?;
            if response.request_id != request_id {
                continue;
            }

            let status = response.request_status;
            if !status.result {
                return Err(Error::Overlay(format!(
                    "{request_type} failed ({}): {}",
                    status.code,
                    status.comment.unwrap_or_default()
                )));
            }

            tracing::trace!(request_type, "OBS request ok");
            return Ok(response.response_data.unwrap_or(Value::Null));
        }
    }

    async fn send(&mut self, op: u8, d: Value) -> Result<()> {
        let text = serde_json::to_string(&Envelope { op, d })?;
        self.socket.send(Message::Text(text)).await?;
        Ok(())
    }

    /// Read until a message with `op` arrives, skipping events
    async fn expect_op(&mut self, op: u8) -> Result<Value> {
        loop {
            let next = tokio::time::timeout(RESPONSE_TIMEOUT, self.socket.next())
                .await
                .map_err(|_| Error::Overlay("timed out waiting for OBS".to_string()))?;

            match next {
                Some(Ok(Message::Text(text))) => {
                    let envelope: Envelope = serde_json::from_str(&text)?;
                    if envelope.op == op {
                        return Ok(envelope.d);
                    }
                    tracing::trace!(op = envelope.op, "skipping OBS message");
                }
                Some(Ok(Message::Close(frame))) => {
                    return Err(Error::Overlay(format!("OBS closed the connection: {frame:?}")));
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
                None => return Err(Error::Overlay("OBS connection ended".to_string())),
            }
        }
    }
}

#[async_trait]
impl SceneController for ObsClient {
    async fn set_source_visible(&mut self, scene: &str, source: &str, visible: bool) -> Result<()> {
        let item = self
            .request(
                "GetSceneItemId",
                json!({ "sceneName": scene, "sourceName": source }),
            )
            .await?;
        let item_id = item
            .get("sceneItemId")
            .and_then(Value::as_i64)
            .ok_or_else(|| Error::Overlay(format!("no scene item id for {scene}/{source}")))?;

        self.request(
            "SetSceneItemEnabled",
            json!({
                "sceneName": scene,
                "sceneItemId": item_id,
                "sceneItemEnabled": visible,
            }),
        )
        .await?;
        Ok(())
    }

    async fn set_filter_enabled(&mut self, source: &str, filter: &str, enabled: bool) -> Result<()> {
        self.request(
            "SetSourceFilterEnabled",
            json!({
                "sourceName": source,
                "filterName": filter,
                "filterEnabled": enabled,
            }),
        )
        .await?;
        Ok(())
    }

    async fn close(&mut self) {
        if let Err(e) = self.socket.close(None).await {
            tracing::debug!(error = %e, "OBS close failed");
        }
    }
}

/// Identify auth string: `base64(sha256(base64(sha256(password + salt)) + challenge))`
#[must_use]
pub fn authentication(password: &str, salt: &str, challenge: &str) -> String {
    let secret = BASE64.encode(Sha256::digest(format!("{password}{salt}")));
    BASE64.encode(Sha256::digest(format!("{secret}{challenge}")))
}
