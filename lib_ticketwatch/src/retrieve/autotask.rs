//! # Autotask REST Client
//!
//! Fetches every ticket whose status is not "Complete" (status id 5) in one
//! page of up to 200 items, and maps the loosely-typed `items` array onto
//! [`Ticket`].
//!
//! Autotask authenticates each request with three headers rather than a
//! token: `ApiIntegrationCode`, `Secret` and `UserName`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::tickets::{FetchError, Ticket, TicketSource};
use crate::vault::Credentials;

/// Zone 14 REST endpoint.
pub const DEFAULT_BASE_URL: &str = "https://webservices14.autotask.net/atservicesrest/v1.0/";

/// Excludes completed tickets.
const OPEN_TICKETS_FILTER: &str = r#"{"filter":[{"op":"noteq","field":"Status","value":5}]}"#;
const PAGE_SIZE: &str = "200";

/// HTTP [`TicketSource`] backed by the Autotask REST API.
pub struct AutotaskClient {
    client: Client,
    query_url: Url,
}

impl AutotaskClient {
    /// Builds a client against `base_url` (must end in `/`) with a per-request
    /// timeout.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, FetchError> {
        let base = Url::parse(base_url).map_err(|e| FetchError::Transport(e.to_string()))?;
        let mut query_url = base
            .join("tickets/query")
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        query_url
            .query_pairs_mut()
            .append_pair("search", OPEN_TICKETS_FILTER)
            .append_pair("pagesize", PAGE_SIZE);

        let client = Client::builder()
            .timeout(timeout)
            .user_agent("TicketWatch/1.0")
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        Ok(Self { client, query_url })
    }

    /// The fully-built query URL, filter included.
    pub fn query_url(&self) -> &Url {
        &self.query_url
    }
}

#[async_trait]
impl TicketSource for AutotaskClient {
    async fn fetch_open_tickets(&self, credentials: &Credentials) -> Result<Vec<Ticket>, FetchError> {
        let response = self
            .client
            .get(self.query_url.clone())
            .header("ApiIntegrationCode", &credentials.integration_code)
            .header("Secret", &credentials.secret)
            .header("UserName", &credentials.username)
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))?;
        let tickets = tickets_from_response(&body);
        debug!(count = tickets.len(), "Fetched open tickets");
        Ok(tickets)
    }
}

/// Maps `items[*]` to tickets. A missing `items` array is an empty result;
/// missing or null fields become empty strings (or id 0), and numeric
/// fields are stringified.
pub fn tickets_from_response(body: &Value) -> Vec<Ticket> {
    body.get("items")
        .and_then(Value::as_array)
        .map(|items| items.iter().map(ticket_from_item).collect())
        .unwrap_or_default()
}

fn ticket_from_item(item: &Value) -> Ticket {
    Ticket {
        id: int_field(item, "id"),
        assigned_resource_id: string_field(item, "assignedResourceID"),
        create_date: string_field(item, "createDate"),
        description: string_field(item, "description"),
        title: string_field(item, "title"),
    }
}

fn string_field(item: &Value, key: &str) -> String {
    match item.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn int_field(item: &Value, key: &str) -> i64 {
    match item.get(key) {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or_default(),
        Some(Value::String(s)) => s.trim().parse().unwrap_or_default(),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_maps_items() {
        let body = json!({
            "items": [
                {
                    "id": 7001,
                    "assignedResourceID": null,
                    "createDate": "2024-05-01T13:00:00Z",
                    "description": "Cannot print",
                    "title": "Printer",
                    "status": 1
                },
                {
                    "id": 7002,
                    "assignedResourceID": 29682885,
                    "createDate": "2024-05-01T14:00:00Z",
                    "description": null,
                    "title": "VPN"
                }
            ],
            "pageDetails": {"count": 2}
        });

        let tickets = tickets_from_response(&body);

        assert_eq!(tickets.len(), 2);
        assert_eq!(tickets[0].id, 7001);
        assert!(tickets[0].is_unassigned());
        assert_eq!(tickets[0].title, "Printer");
        assert_eq!(tickets[1].assigned_resource_id, "29682885");
        assert_eq!(tickets[1].description, "");
        assert!(!tickets[1].is_unassigned());
    }

    #[test]
    fn test_missing_items_is_empty() {
        assert!(tickets_from_response(&json!({})).is_empty());
        assert!(tickets_from_response(&json!({"items": null})).is_empty());
    }

    #[test]
    fn test_loose_ids() {
        let body = json!({"items": [{"id": "42"}, {"id": 3.0}, {}]});
        let ids: Vec<i64> = tickets_from_response(&body).iter().map(|t| t.id).collect();

        assert_eq!(ids, vec![42, 3, 0]);
    }

    #[test]
    fn test_query_url_carries_filter() {
        let client = AutotaskClient::new(DEFAULT_BASE_URL, Duration::from_secs(10)).unwrap();
        let url = client.query_url();

        assert_eq!(url.path(), "/atservicesrest/v1.0/tickets/query");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs[0], ("search".to_string(), OPEN_TICKETS_FILTER.to_string()));
        assert_eq!(pairs[1], ("pagesize".to_string(), "200".to_string()));
    }

    #[test]
    fn test_rejects_relative_base() {
        assert!(matches!(
            AutotaskClient::new("not a url", Duration::from_secs(1)),
            Err(FetchError::Transport(_))
        ));
    }
}
