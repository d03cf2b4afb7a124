//! REST backend over reqwest.

use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::types::{Conversation, ConversationId, Message, Notification, NotificationId, UserRef};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use super::{Backend, NewConversation, NewGroup, SendMessage};

#[derive(Deserialize)]
struct UnreadCount {
    unread_count: u32,
}

/// [`Backend`] against the service's JSON API.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base: String,
}

impl HttpBackend {
    pub fn new(config: &SyncConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| SyncError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base: config.api_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base, path)
    }

    fn user_path(user: UserRef, rest: &str) -> String {
        format!("{}s/{}/{}", user.role.as_str(), user.id, rest)
    }
}

/// Turn a response into `T`, mapping non-2xx statuses to `SyncError::Backend`.
async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        tracing::warn!(status = status.as_u16(), %message, "Backend request failed");
        return Err(SyncError::Backend {
            status: status.as_u16(),
            message,
        });
    }
    Ok(response.json::<T>().await?)
}

async fn expect_ok(response: Response) -> Result<()> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let message = response.text().await.unwrap_or_default();
    Err(SyncError::Backend {
        status: status.as_u16(),
        message,
    })
}

impl Backend for HttpBackend {
    async fn send_message(&self, request: &SendMessage) -> Result<Message> {
        let response = self
            .client
            .post(self.url("messages"))
            .json(request)
            .send()
            .await?;
        decode(response).await
    }

    async fn create_conversation(&self, request: &NewConversation) -> Result<Conversation> {
        let response = self
            .client
            .post(self.url("conversations"))
            .json(request)
            .send()
            .await?;
        decode(response).await
    }

    async fn mark_as_read(&self, conversation: ConversationId, reader: UserRef) -> Result<u32> {
        let response = self
            .client
            .post(self.url(&format!("conversations/{}/read", conversation.0)))
            .json(&json!({ "reader": reader }))
            .send()
            .await?;
        let body: UnreadCount = decode(response).await?;
        Ok(body.unread_count)
    }

    async fn create_group(&self, request: &NewGroup) -> Result<Conversation> {
        let response = self
            .client
            .post(self.url("groups"))
            .json(request)
            .send()
            .await?;
        decode(response).await
    }

    async fn leave_group(&self, conversation: ConversationId, member: UserRef) -> Result<()> {
        let response = self
            .client
            .post(self.url(&format!("groups/{}/leave", conversation.0)))
            .json(&json!({ "member": member }))
            .send()
            .await?;
        expect_ok(response).await
    }

    async fn list_conversations(&self, scope: UserRef) -> Result<Vec<Conversation>> {
        let path = Self::user_path(scope, "conversations");
        let response = self.client.get(self.url(&path)).send().await?;
        decode(response).await
    }

    async fn list_messages(&self, conversation: ConversationId) -> Result<Vec<Message>> {
        let path = format!("conversations/{}/messages", conversation.0);
        let response = self.client.get(self.url(&path)).send().await?;
        decode(response).await
    }

    async fn list_notifications(&self, recipient: UserRef) -> Result<Vec<Notification>> {
        let path = Self::user_path(recipient, "notifications");
        let response = self.client.get(self.url(&path)).send().await?;
        decode(response).await
    }

    async fn mark_notification_read(&self, id: NotificationId) -> Result<()> {
        let path = format!("notifications/{}/read", id.0);
        let response = self.client.post(self.url(&path)).send().await?;
        expect_ok(response).await
    }

    async fn delete_notification(&self, id: NotificationId) -> Result<()> {
        let path = format!("notifications/{}", id.0);
        let response = self.client.delete(self.url(&path)).send().await?;
        expect_ok(response).await
    }
}
