use log::{debug, warn};
use reqwest::Client as HttpClient;
use serde_json::Value;

use crate::api::models::{Message, Partner};
use crate::error::{ChatError, Result};

pub struct ApiClient {
    pub http: HttpClient,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str, token: Option<&str>) -> Self {
        Self {
            http: HttpClient::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()).map(str::to_string),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/v1/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn with_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(t) => req.header("Authorization", format!("Bearer {}", t)),
            None => req,
        }
    }

    async fn get_json(&self, path: &str) -> Result<Value> {
        let endpoint = self.endpoint(path);
        debug!("GET {}", endpoint);
        let resp = self.with_auth(self.http.get(&endpoint)).send().await?;
        if !resp.status().is_success() {
            return Err(ChatError::Status(resp.status().as_u16()));
        }
        Ok(resp.json::<Value>().await?)
    }

    /// Try to reach the API using the ping endpoint, then the bare base URL.
    pub async fn ping(&self) -> Result<u16> {
        let candidates = [self.endpoint("ping"), self.base_url.clone()];
        let mut last_err: Option<ChatError> = None;
        for endpoint in candidates {
            match self.with_auth(self.http.get(&endpoint)).send().await {
                Ok(resp) => return Ok(resp.status().as_u16()),
                Err(e) => last_err = Some(e.into()),
            }
        }
        Err(last_err.unwrap_or_else(|| ChatError::Decode("no endpoint answered".into())))
    }

    /// Fetch every doctor the user can message, minus the user themself.
    /// Order is the order the server returned.
    pub async fn partners(&self, current_user_id: &str) -> Result<(Vec<Partner>, Vec<Value>)> {
        let json = self.get_json("user/doctors").await?;
        let items = list_field(&json, "users")
            .ok_or_else(|| ChatError::Decode("doctor list missing".into()))?;
        let mut partners = Vec::new();
        let mut raws = Vec::new();
        for item in items {
            match Partner::from_json(&item) {
                Some(p) if p.id == current_user_id => {}
                Some(p) => {
                    partners.push(p);
                    raws.push(item);
                }
                None => warn!("Skipping malformed doctor entry: {}", item),
            }
        }
        Ok((partners, raws))
    }

    /// Full message history with one doctor, in the order the server returned it.
    pub async fn history(&self, partner_id: &str) -> Result<Vec<Message>> {
        let json = self.get_json(&format!("message/{}", partner_id)).await?;
        let items = list_field(&json, "messages")
            .ok_or_else(|| ChatError::Decode("message list missing".into()))?;
        let mut out = Vec::with_capacity(items.len());
        for item in &items {
            match Message::from_json(item) {
                Some(m) => out.push(m),
                None => warn!("Skipping malformed message in history: {}", item),
            }
        }
        Ok(out)
    }

    /// Persist a message through the REST API and return the server's copy.
    pub async fn send_message(&self, receiver_id: &str, content: &str) -> Result<Message> {
        let endpoint = self.endpoint("send");
        let body = serde_json::json!({
            "receiverId": receiver_id,
            "content": content,
        });
        debug!("POST {}", endpoint);
        let resp = self.with_auth(self.http.post(&endpoint)).json(&body).send().await?;
        if !resp.status().is_success() {
            return Err(ChatError::Status(resp.status().as_u16()));
        }
        let json: Value = resp.json().await?;
        let data = json.get("data").unwrap_or(&json);
        Message::from_json(data).ok_or_else(|| ChatError::Decode("no message in send response".into()))
    }
}

/// Lists come back bare, under their own key, or under `data`.
fn list_field(json: &Value, key: &str) -> Option<Vec<Value>> {
    json.as_array()
        .or_else(|| json.get(key).and_then(|v| v.as_array()))
        .or_else(|| json.get("data").and_then(|v| v.as_array()))
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn list_field_accepts_all_envelopes() {
        assert_eq!(list_field(&json!([1, 2]), "users").map(|v| v.len()), Some(2));
        assert_eq!(list_field(&json!({"users": [1]}), "users").map(|v| v.len()), Some(1));
        assert_eq!(list_field(&json!({"data": []}), "users").map(|v| v.len()), Some(0));
        assert!(list_field(&json!({"other": []}), "users").is_none());
    }

    #[test]
    fn endpoint_joins_without_double_slash() {
        let client = ApiClient::new("https://api.example.test/", Some(""));
        assert_eq!(client.endpoint("/send"), "https://api.example.test/api/v1/send");
        assert!(client.token.is_none());
    }
}
