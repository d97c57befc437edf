//! Discord REST client: the handful of endpoints the bot calls.

use reqwest::{Client, RequestBuilder, Response, header::AUTHORIZATION};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, error};

use super::DiscordError;
use super::format::{self, Embed};
use super::model::{Application, GatewayBot, Message};

pub const API_BASE: &str = "https://discord.com/api/v10";

/// Page size limit of `GET /channels/{id}/messages`.
const HISTORY_PAGE_LIMIT: usize = 100;

/// Cheap to clone: `reqwest::Client` is an `Arc` internally.
#[derive(Debug, Clone)]
pub struct DiscordRest {
    client: Client,
    base_url: String,
    token: String,
}

impl DiscordRest {
    pub fn new(token: impl Into<String>) -> Result<Self, DiscordError> {
        Self::with_base_url(token, API_BASE)
    }

    /// Point the client at another API root (used by tests).
    pub fn with_base_url(
        token: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, DiscordError> {
        let client = Client::builder()
            .user_agent(concat!("DiscordBot (parley-bot, ", env!("CARGO_PKG_VERSION"), ")"))
            .build()?;
        Ok(Self { client, base_url: base_url.into(), token: token.into() })
    }

    /// Gateway WebSocket URL for this bot.
    pub async fn gateway_url(&self) -> Result<String, DiscordError> {
        let bot: GatewayBot = self.get_json("/gateway/bot", &[]).await?;
        Ok(bot.url)
    }

    /// User id of the application owner, if Discord reports one.
    pub async fn application_owner(&self) -> Result<Option<String>, DiscordError> {
        let app: Application = self.get_json("/oauth2/applications/@me", &[]).await?;
        Ok(app.owner.map(|u| u.id))
    }

    /// Post `content`, split into as many messages as the length limit needs.
    pub async fn send_message(&self, channel_id: &str, content: &str) -> Result<(), DiscordError> {
        for chunk in format::split_message(content) {
            self.post_json(&format!("/channels/{channel_id}/messages"), &json!({ "content": chunk }))
                .await?;
        }
        Ok(())
    }

    pub async fn send_embed(&self, channel_id: &str, embed: &Embed) -> Result<(), DiscordError> {
        self.post_json(&format!("/channels/{channel_id}/messages"), &json!({ "embeds": [embed] }))
            .await?;
        Ok(())
    }

    /// Up to `limit` messages sent before `before`, oldest first.
    pub async fn history(
        &self,
        channel_id: &str,
        before: &str,
        limit: usize,
    ) -> Result<Vec<Message>, DiscordError> {
        let mut collected: Vec<Message> = Vec::new();
        let mut cursor = before.to_string();

        while collected.len() < limit {
            let page_size = (limit - collected.len()).min(HISTORY_PAGE_LIMIT);
            let page_limit = page_size.to_string();
            // Each page is newest first.
            let page: Vec<Message> = self
                .get_json(
                    &format!("/channels/{channel_id}/messages"),
                    &[("before", cursor.as_str()), ("limit", page_limit.as_str())],
                )
                .await?;
            let exhausted = page.len() < page_size;
            if let Some(oldest) = page.last() {
                cursor = oldest.id.clone();
            }
            collected.extend(page);
            if exhausted {
                break;
            }
        }

        collected.truncate(limit);
        collected.reverse();
        debug!(%channel_id, fetched = collected.len(), limit, "fetched history");
        Ok(collected)
    }

    /// The latest `limit` (≤ 100) messages in the channel, newest first.
    pub async fn recent(&self, channel_id: &str, limit: usize) -> Result<Vec<Message>, DiscordError> {
        let limit = limit.min(HISTORY_PAGE_LIMIT).to_string();
        self.get_json(&format!("/channels/{channel_id}/messages"), &[("limit", limit.as_str())])
            .await
    }

    /// Delete `ids` (≤ 100): one DELETE for a single message, bulk-delete
    /// otherwise.
    pub async fn delete_messages(&self, channel_id: &str, ids: &[String]) -> Result<(), DiscordError> {
        match ids {
            [] => Ok(()),
            [id] => {
                let url = self.url(&format!("/channels/{channel_id}/messages/{id}"));
                let resp = self.authed(self.client.delete(url)).send().await?;
                check_status(resp).await?;
                Ok(())
            }
            _ => {
                self.post_json(
                    &format!("/channels/{channel_id}/messages/bulk-delete"),
                    &json!({ "messages": ids }),
                )
                .await?;
                Ok(())
            }
        }
    }

    /// Show the typing indicator (lasts ~10 s or until the next message).
    pub async fn trigger_typing(&self, channel_id: &str) -> Result<(), DiscordError> {
        let url = self.url(&format!("/channels/{channel_id}/typing"));
        let resp = self.authed(self.client.post(url)).send().await?;
        check_status(resp).await?;
        Ok(())
    }

    // ── helpers ───────────────────────────────────────────────────────────

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        req.header(AUTHORIZATION, format!("Bot {}", self.token))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, DiscordError> {
        let req = self.authed(self.client.get(self.url(path)).query(query));
        let resp = check_status(req.send().await?).await?;
        Ok(resp.json::<T>().await?)
    }

    async fn post_json(&self, path: &str, body: &serde_json::Value) -> Result<Response, DiscordError> {
        let req = self.authed(self.client.post(self.url(path)).json(body));
        check_status(req.send().await?).await
    }
}

async fn check_status(response: Response) -> Result<Response, DiscordError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read error body>".to_string());
    error!(%status, %body, "discord API returned HTTP error");
    Err(DiscordError::Api { status: status.as_u16(), body })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn msg(id: &str) -> serde_json::Value {
        json!({
            "id": id, "channel_id": "c1", "content": format!("text {id}"),
            "author": {"id": "u1", "username": "alice"},
        })
    }

    async fn rest(server: &MockServer) -> DiscordRest {
        DiscordRest::with_base_url("tok", server.uri()).unwrap()
    }

    #[tokio::test]
    async fn history_is_returned_oldest_first() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/channels/c1/messages"))
            .and(query_param("before", "m9"))
            .and(query_param("limit", "3"))
            .and(header("authorization", "Bot tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([msg("m8"), msg("m7"), msg("m6")])))
            .expect(1)
            .mount(&server)
            .await;

        let history = rest(&server).await.history("c1", "m9", 3).await.unwrap();
        let ids: Vec<&str> = history.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m6", "m7", "m8"]);
    }

    #[tokio::test]
    async fn history_pages_past_the_api_limit() {
        let server = MockServer::start().await;
        let first: Vec<_> = (0..100).map(|i| msg(&format!("a{i}"))).collect();
        Mock::given(method("GET"))
            .and(query_param("before", "start"))
            .and(query_param("limit", "100"))
            .respond_with(ResponseTemplate::new(200).set_body_json(first))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("before", "a99"))
            .and(query_param("limit", "20"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([msg("b0"), msg("b1")])))
            .expect(1)
            .mount(&server)
            .await;

        let history = rest(&server).await.history("c1", "start", 120).await.unwrap();
        assert_eq!(history.len(), 102);
        assert_eq!(history.first().unwrap().id, "b1");
        assert_eq!(history.last().unwrap().id, "a0");
    }

    #[tokio::test]
    async fn zero_limit_fetches_nothing() {
        let server = MockServer::start().await;
        let history = rest(&server).await.history("c1", "m1", 0).await.unwrap();
        assert!(history.is_empty());
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn send_embed_posts_embeds_array() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/channels/c1/messages"))
            .and(body_json(json!({
                "embeds": [{"title": "Error", "description": "boom", "color": format::COLOR_RED}],
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(msg("m1")))
            .expect(1)
            .mount(&server)
            .await;

        rest(&server).await.send_embed("c1", &format::error_embed("boom")).await.unwrap();
    }

    #[tokio::test]
    async fn long_message_is_sent_in_chunks() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/channels/c1/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(msg("m1")))
            .expect(2)
            .mount(&server)
            .await;

        let text = format!("{}\n{}", "a".repeat(1500), "b".repeat(1500));
        rest(&server).await.send_message("c1", &text).await.unwrap();
    }

    #[tokio::test]
    async fn delete_picks_single_or_bulk_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/channels/c1/messages/m1"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/channels/c1/messages/bulk-delete"))
            .and(body_json(json!({"messages": ["m2", "m3"]})))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let rest = rest(&server).await;
        rest.delete_messages("c1", &["m1".to_string()]).await.unwrap();
        rest.delete_messages("c1", &["m2".to_string(), "m3".to_string()]).await.unwrap();
        rest.delete_messages("c1", &[]).await.unwrap();
    }

    #[tokio::test]
    async fn api_error_carries_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gateway/bot"))
            .respond_with(ResponseTemplate::new(401).set_body_string(r#"{"message": "401: Unauthorized"}"#))
            .mount(&server)
            .await;

        match rest(&server).await.gateway_url().await {
            Err(DiscordError::Api { status, body }) => {
                assert_eq!(status, 401);
                assert!(body.contains("Unauthorized"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn application_owner_is_read() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/oauth2/applications/@me"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "app", "name": "parley",
                "owner": {"id": "owner-1", "username": "root"},
            })))
            .mount(&server)
            .await;

        let owner = rest(&server).await.application_owner().await.unwrap();
        assert_eq!(owner.as_deref(), Some("owner-1"));
    }
}
