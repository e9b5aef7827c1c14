use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

/// A chat message between the current user and one doctor.
///
/// The backend emits two shapes: persisted messages carry `_id` and nested
/// `sender`/`receiver` objects, socket payloads carry flat `from`/`to` ids.
/// Both are accepted by [`Message::from_json`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: Option<String>,
    pub sender: String,
    pub receiver: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// A locally composed message that has not been confirmed by the server.
    pub fn optimistic(sender: &str, receiver: &str, content: &str) -> Self {
        Self {
            id: None,
            sender: sender.to_string(),
            receiver: receiver.to_string(),
            content: content.to_string(),
            created_at: Utc::now(),
        }
    }

    pub fn from_json(item: &Value) -> Option<Self> {
        let id = item
            .get("_id")
            .or_else(|| item.get("id"))
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let sender = item.get("sender").or_else(|| item.get("from")).and_then(id_of)?;
        let receiver = item.get("receiver").or_else(|| item.get("to")).and_then(id_of)?;
        let content = item.get("content").and_then(|v| v.as_str())?.to_string();
        let created_at = item
            .get("createdAt")
            .or_else(|| item.get("created_at"))
            .and_then(parse_timestamp)
            .unwrap_or_else(Utc::now);
        Some(Self { id, sender, receiver, content, created_at })
    }

    pub fn is_from(&self, user_id: &str) -> bool {
        self.sender == user_id
    }

    /// True when either end of the message is `partner_id`.
    pub fn involves(&self, partner_id: &str) -> bool {
        self.sender == partner_id || self.receiver == partner_id
    }
}

/// Accepts either a bare id string or an object carrying `_id`/`id`.
fn id_of(value: &Value) -> Option<String> {
    let id = match value {
        Value::String(s) => s.as_str(),
        Value::Object(_) => value
            .get("_id")
            .or_else(|| value.get("id"))
            .and_then(|v| v.as_str())?,
        _ => return None,
    };
    if id.is_empty() { None } else { Some(id.to_string()) }
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => n.as_i64().and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    }
}

/// A doctor that can be messaged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partner {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub specialty: Option<String>,
}

impl Partner {
    pub fn from_json(item: &Value) -> Option<Self> {
        let text = |key: &str| {
            item.get(key)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string()
        };
        let id = item
            .get("_id")
            .or_else(|| item.get("id"))
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        if id.is_empty() {
            return None;
        }
        let specialty = item
            .get("specialty")
            .or_else(|| item.get("department"))
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string);
        Some(Self {
            id,
            first_name: text("firstName"),
            last_name: text("lastName"),
            email: text("email"),
            specialty,
        })
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }

    pub fn display_name(&self) -> String {
        format!("Dr. {}", self.full_name())
    }

    pub fn specialty_label(&self) -> &str {
        self.specialty.as_deref().unwrap_or("Doctor")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_persisted_message_shape() {
        let v = json!({
            "_id": "m1",
            "sender": {"_id": "d1", "firstName": "Ana"},
            "receiver": "u1",
            "content": "hello",
            "createdAt": "2024-01-01T09:30:00.000Z"
        });
        let msg = Message::from_json(&v).expect("message");
        assert_eq!(msg.id.as_deref(), Some("m1"));
        assert_eq!(msg.sender, "d1");
        assert_eq!(msg.receiver, "u1");
        assert_eq!(msg.created_at.to_rfc3339(), "2024-01-01T09:30:00+00:00");
    }

    #[test]
    fn parses_socket_message_shape() {
        let v = json!({"from": "u1", "to": "d2", "content": "hi"});
        let msg = Message::from_json(&v).expect("message");
        assert_eq!(msg.id, None);
        assert!(msg.is_from("u1"));
        assert!(msg.involves("d2"));
        assert!(!msg.involves("d3"));
    }

    #[test]
    fn rejects_message_without_content_or_ends() {
        assert!(Message::from_json(&json!({"from": "u1", "content": "x"})).is_none());
        assert!(Message::from_json(&json!({"from": "u1", "to": "d1"})).is_none());
        assert!(Message::from_json(&json!({"from": "", "to": "d1", "content": "x"})).is_none());
    }

    #[test]
    fn partner_falls_back_to_department_and_default_label() {
        let p = Partner::from_json(&json!({
            "_id": "d1", "firstName": "Ana", "lastName": "Silva",
            "email": "ana@clinic.test", "department": "Cardio"
        }))
        .expect("partner");
        assert_eq!(p.specialty.as_deref(), Some("Cardio"));
        assert_eq!(p.display_name(), "Dr. Ana Silva");

        let q = Partner::from_json(&json!({"id": "d2", "firstName": "Leo"})).expect("partner");
        assert_eq!(q.specialty_label(), "Doctor");
        assert_eq!(q.display_name(), "Dr. Leo");
        assert!(Partner::from_json(&json!({"firstName": "Nobody"})).is_none());
    }
}
