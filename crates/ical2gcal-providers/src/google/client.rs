//! Google Calendar API client.
//!
//! A thin HTTP client for the Calendar API v3, covering exactly the
//! event operations the sync drives: list, insert, update, delete and
//! clearing a whole calendar.

use std::time::Duration;

use ical2gcal_core::{CanonicalEvent, RemoteEvent, ZonedTime};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ProviderError, ProviderResult};

const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";

/// Page size for event listing. Google caps maxResults at 2500.
const LIST_PAGE_SIZE: u32 = 2500;

/// Google Calendar API client, keyed by one access token.
#[derive(Debug)]
pub struct GcalClient {
    http_client: reqwest::Client,
    access_token: String,
}

impl GcalClient {
    pub fn new(access_token: impl Into<String>, timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("failed to create HTTP client");

        Self {
            http_client,
            access_token: access_token.into(),
        }
    }

    /// Swaps in a refreshed access token.
    pub fn set_access_token(&mut self, token: impl Into<String>) {
        self.access_token = token.into();
    }

    /// Lists every event in a calendar, following pagination to the end.
    ///
    /// Events the API returns without an id are skipped; the rest come
    /// back in listing order.
    pub async fn list_events(&self, calendar_id: &str) -> ProviderResult<Vec<RemoteEvent>> {
        let mut collected = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = self
                .list_events_page(calendar_id, page_token.as_deref())
                .await?;

            collected.extend(page.items.into_iter().filter_map(|item| {
                item.id.map(|id| RemoteEvent {
                    id,
                    summary: item.summary,
                })
            }));

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!("calendar {} holds {} events", calendar_id, collected.len());
        Ok(collected)
    }

    async fn list_events_page(
        &self,
        calendar_id: &str,
        page_token: Option<&str>,
    ) -> ProviderResult<EventListResponse> {
        let url = format!(
            "{}/calendars/{}/events",
            CALENDAR_API_BASE,
            urlencoding::encode(calendar_id)
        );

        let mut request = self
            .http_client
            .get(&url)
            .bearer_auth(&self.access_token)
            .query(&[("maxResults", LIST_PAGE_SIZE.to_string())]);
        if let Some(token) = page_token {
            request = request.query(&[("pageToken", token.to_string())]);
        }

        let response = request.send().await.map_err(Self::map_transport_error)?;
        let body = Self::check_status(response).await?;

        serde_json::from_str(&body).map_err(|e| {
            ProviderError::invalid_response(format!("failed to parse event list: {}", e))
        })
    }

    /// Creates an event under its content id.
    ///
    /// Surfaces a conflict error when the calendar already holds an
    /// event with that id.
    pub async fn insert_event(
        &self,
        calendar_id: &str,
        event: &CanonicalEvent,
    ) -> ProviderResult<()> {
        let url = format!(
            "{}/calendars/{}/events",
            CALENDAR_API_BASE,
            urlencoding::encode(calendar_id)
        );

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&ApiEvent::from_canonical(event))
            .send()
            .await
            .map_err(Self::map_transport_error)?;

        Self::check_status(response).await?;
        Ok(())
    }

    /// Overwrites whatever is stored under this event's content id.
    pub async fn update_event(
        &self,
        calendar_id: &str,
        event: &CanonicalEvent,
    ) -> ProviderResult<()> {
        let url = format!(
            "{}/calendars/{}/events/{}",
            CALENDAR_API_BASE,
            urlencoding::encode(calendar_id),
            event.id
        );

        let response = self
            .http_client
            .put(&url)
            .bearer_auth(&self.access_token)
            .json(&ApiEvent::from_canonical(event))
            .send()
            .await
            .map_err(Self::map_transport_error)?;

        Self::check_status(response).await?;
        Ok(())
    }

    /// Deletes one event by id.
    pub async fn delete_event(&self, calendar_id: &str, event_id: &str) -> ProviderResult<()> {
        let url = format!(
            "{}/calendars/{}/events/{}",
            CALENDAR_API_BASE,
            urlencoding::encode(calendar_id),
            event_id
        );

        let response = self
            .http_client
            .delete(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(Self::map_transport_error)?;

        Self::check_status(response).await?;
        Ok(())
    }

    /// Removes every event from a calendar in one call.
    ///
    /// The API supports this only on a user's primary calendar.
    pub async fn clear(&self, calendar_id: &str) -> ProviderResult<()> {
        let url = format!(
            "{}/calendars/{}/clear",
            CALENDAR_API_BASE,
            urlencoding::encode(calendar_id)
        );

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(Self::map_transport_error)?;

        Self::check_status(response).await?;
        Ok(())
    }

    /// Turns API status codes into provider errors; hands back the body
    /// on success.
    async fn check_status(response: reqwest::Response) -> ProviderResult<String> {
        use reqwest::StatusCode;

        match response.status() {
            StatusCode::UNAUTHORIZED => Err(ProviderError::authentication(
                "access token expired or invalid",
            )),
            StatusCode::FORBIDDEN => Err(ProviderError::authorization("access denied to calendar")),
            StatusCode::NOT_FOUND => Err(ProviderError::not_found("calendar or event not found")),
            StatusCode::CONFLICT => Err(ProviderError::conflict(
                "an event with this id already exists",
            )),
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = response
                    .headers()
                    .get("Retry-After")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok());
                Err(match retry_after {
                    Some(secs) => ProviderError::rate_limited(format!(
                        "rate limit exceeded, retry after {} seconds",
                        secs
                    )),
                    None => ProviderError::rate_limited("rate limit exceeded"),
                })
            }
            StatusCode::BAD_REQUEST => {
                let body = response.text().await.unwrap_or_default();
                Err(ProviderError::bad_request(format!(
                    "API rejected request: {}",
                    body
                )))
            }
            status if !status.is_success() => {
                let body = response.text().await.unwrap_or_default();
                Err(ProviderError::server(format!(
                    "API error ({}): {}",
                    status, body
                )))
            }
            _ => response
                .text()
                .await
                .map_err(|e| ProviderError::network(format!("failed to read response body: {}", e))),
        }
    }

    /// Maps reqwest transport failures to provider errors.
    fn map_transport_error(e: reqwest::Error) -> ProviderError {
        if e.is_timeout() {
            ProviderError::network("request timeout")
        } else if e.is_connect() {
            ProviderError::network(format!("connection failed: {}", e))
        } else {
            ProviderError::network(format!("request failed: {}", e))
        }
    }
}

/// Response from the events.list endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventListResponse {
    #[serde(default)]
    items: Vec<ApiEventSummary>,
    next_page_token: Option<String>,
}

/// The slice of a listed event the sync cares about.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEventSummary {
    id: Option<String>,
    summary: Option<String>,
}

/// An event resource in the shape the API expects for writes.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiEvent {
    id: String,
    summary: String,
    start: ApiEventTime,
    end: ApiEventTime,
}

/// Event time with an explicit timezone, as the API represents it.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiEventTime {
    date_time: String,
    time_zone: String,
}

impl ApiEvent {
    fn from_canonical(event: &CanonicalEvent) -> Self {
        Self {
            id: event.id.clone(),
            summary: event.summary.clone(),
            start: ApiEventTime::from_zoned(&event.start),
            end: ApiEventTime::from_zoned(&event.end),
        }
    }
}

impl ApiEventTime {
    fn from_zoned(time: &ZonedTime) -> Self {
        Self {
            date_time: time.render(),
            time_zone: time.time_zone.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::Tz;
    use ical2gcal_core::parse_zoned;

    #[test]
    fn parse_event_list_response() {
        let json = r#"{
            "items": [
                {
                    "id": "abc123",
                    "summary": "Weekly Planning"
                },
                {
                    "summary": "No id, skipped later"
                }
            ],
            "nextPageToken": "page-2"
        }"#;

        let response: EventListResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.items.len(), 2);
        assert_eq!(response.items[0].id, Some("abc123".to_string()));
        assert!(response.items[1].id.is_none());
        assert_eq!(response.next_page_token, Some("page-2".to_string()));
    }

    #[test]
    fn parse_event_list_last_page() {
        let json = r#"{ "items": [] }"#;

        let response: EventListResponse = serde_json::from_str(json).unwrap();
        assert!(response.items.is_empty());
        assert!(response.next_page_token.is_none());
    }

    #[test]
    fn event_body_shape() {
        let start = parse_zoned("20240315T100000", None, Tz::UTC).unwrap();
        let end = parse_zoned("20240315T110000", None, Tz::UTC).unwrap();
        let event = CanonicalEvent::new("Weekly Planning", start, end);

        let body = serde_json::to_value(ApiEvent::from_canonical(&event)).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "id": event.id,
                "summary": "Weekly Planning",
                "start": {"dateTime": "2024-03-15T10:00:00+00:00", "timeZone": "UTC"},
                "end": {"dateTime": "2024-03-15T11:00:00+00:00", "timeZone": "UTC"},
            })
        );
    }

    #[test]
    fn event_body_carries_default_zone_label() {
        let london: Tz = "Europe/London".parse().unwrap();
        let start = parse_zoned("20240701T100000", Some("Pacific Time"), london).unwrap();
        let end = parse_zoned("20240701T110000", Some("Pacific Time"), london).unwrap();
        let event = CanonicalEvent::new("Offsite", start, end);

        let body = serde_json::to_value(ApiEvent::from_canonical(&event)).unwrap();
        assert_eq!(body["start"]["timeZone"], "Europe/London");
        assert_eq!(body["start"]["dateTime"], "2024-07-01T10:00:00+01:00");
    }
}
