use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// Keys that belong to the token envelope of an auth response, never to the profile.
const ENVELOPE_KEYS: &[&str] = &["accessToken", "token", "refreshToken", "tokenType", "expiresIn", "user"];

/// Snapshot of the logged-in user as the auth service returned it.
///
/// `id` accepts `id` or `userId`, string or number. Roles accept a `roles` array or a
/// single `role` string. Every other key is kept verbatim in `profile`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(into = "Value", try_from = "Value")]
pub struct UserSnapshot {
    pub id: String,
    pub email: String,
    pub roles: Vec<String>,
    pub profile: Map<String, Value>,
}

fn scalar_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl UserSnapshot {
    pub fn new(id: impl Into<String>, email: impl Into<String>, roles: Vec<String>) -> Self {
        Self { id: id.into(), email: email.into(), roles, profile: Map::new() }
    }

    /// Build from a user object (or a flattened auth response).
    pub fn from_value(v: &Value) -> Option<Self> {
        let obj = v.as_object()?;
        let id = obj.get("id").and_then(scalar_string)
            .or_else(|| obj.get("userId").and_then(scalar_string))
            .unwrap_or_default();
        let email = obj.get("email").and_then(|e| e.as_str()).unwrap_or_default().to_string();
        let roles: Vec<String> = match obj.get("roles") {
            Some(Value::Array(items)) => items.iter().filter_map(|r| r.as_str()).map(str::to_string).collect(),
            _ => obj.get("role").and_then(|r| r.as_str()).map(|r| vec![r.to_string()]).unwrap_or_default(),
        };
        let profile: Map<String, Value> = obj
            .iter()
            .filter(|(k, _)| !matches!(k.as_str(), "id" | "userId" | "email" | "role" | "roles"))
            .filter(|(k, _)| !ENVELOPE_KEYS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Some(Self { id, email, roles, profile })
    }

    /// Storage form: `{id, email, role, roles, ...profile}`. `role` carries the primary
    /// role for consumers that only read a single one.
    pub fn to_value(&self) -> Value {
        let mut obj = self.profile.clone();
        obj.insert("id".into(), Value::String(self.id.clone()));
        obj.insert("email".into(), Value::String(self.email.clone()));
        if let Some(primary) = self.primary_role() {
            obj.insert("role".into(), Value::String(primary.to_string()));
        }
        obj.insert("roles".into(), Value::Array(self.roles.iter().cloned().map(Value::String).collect()));
        Value::Object(obj)
    }

    pub fn primary_role(&self) -> Option<&str> { self.roles.first().map(String::as_str) }

    /// Case-insensitive role check.
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r.eq_ignore_ascii_case(role))
    }

    pub fn profile_str(&self, key: &str) -> Option<&str> { self.profile.get(key).and_then(|v| v.as_str()) }

    /// "First Last" when the profile has names, else the email.
    pub fn display_name(&self) -> String {
        let first = self.profile_str("firstName").unwrap_or("");
        let last = self.profile_str("lastName").unwrap_or("");
        let full = format!("{} {}", first, last).trim().to_string();
        if full.is_empty() { self.email.clone() } else { full }
    }
}

impl From<UserSnapshot> for Value {
    fn from(u: UserSnapshot) -> Self { u.to_value() }
}

impl TryFrom<Value> for UserSnapshot {
    type Error = String;
    fn try_from(v: Value) -> Result<Self, Self::Error> {
        UserSnapshot::from_value(&v).ok_or_else(|| "user snapshot must be a JSON object".to_string())
    }
}

/// The three durable credential values, always handled as one unit.
#[derive(Debug, Clone, PartialEq)]
pub struct CredentialRecord {
    pub access_token: String,
    pub refresh_token: String,
    pub user: UserSnapshot,
}
