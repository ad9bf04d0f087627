use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::ClientError;

/// `{success, data?, name?, message?}` wrapper every backend response uses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiEnvelope<T = Value> {
    pub success: bool,
    #[serde(default)]
    pub data: Option<T>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl<T> ApiEnvelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            name: None,
            message: None,
        }
    }
}

impl ApiEnvelope<Value> {
    pub fn failure(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            name: Some(name.into()),
            message: Some(message.into()),
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Decode `data` into the endpoint's model. A missing `data` decodes from `null`.
    pub fn into_data<T: DeserializeOwned>(self) -> Result<T, ClientError> {
        serde_json::from_value(self.data.unwrap_or(Value::Null))
            .map_err(|err| ClientError::Decode(err.to_string()))
    }

    /// Per-field messages carried in `data`, e.g. `[{"message": "..."}]`.
    pub fn detail_messages(&self) -> Vec<String> {
        match &self.data {
            Some(Value::Array(items)) => items.iter().filter_map(message_of).collect(),
            Some(item) => message_of(item).into_iter().collect(),
            None => Vec::new(),
        }
    }
}

fn message_of(item: &Value) -> Option<String> {
    let message = match item {
        Value::String(message) => message.as_str(),
        Value::Object(fields) => fields.get("message")?.as_str()?,
        _ => return None,
    };
    let message = message.trim();
    (!message.is_empty()).then(|| message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn detail_messages_collect_object_and_string_items() {
        let envelope: ApiEnvelope = serde_json::from_value(json!({
            "success": false,
            "name": "validationError",
            "data": [
                {"message": "Tax Identification Number is required"},
                "Billing email is invalid",
                {"field": "x"},
                {"message": "  "}
            ]
        }))
        .expect("envelope parses");

        assert_eq!(
            envelope.detail_messages(),
            vec![
                "Tax Identification Number is required".to_string(),
                "Billing email is invalid".to_string(),
            ]
        );
    }

    #[test]
    fn into_data_decodes_payload() {
        let envelope = ApiEnvelope::ok(json!({"url": "https://cdn/a.png", "assetId": "a1"}));
        let decoded: serde_json::Map<String, Value> = envelope.into_data().expect("decodes");
        assert_eq!(decoded["assetId"], "a1");
    }
}
