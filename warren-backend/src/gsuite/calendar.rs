//! Google Calendar v3 operations.

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::error::{Error, Result};

const CALENDAR_API: &str = "https://www.googleapis.com/calendar/v3";

#[derive(Debug, Deserialize)]
struct CalendarListResponse {
    items: Option<Vec<CalendarEntry>>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CalendarEntry {
    id: String,
    summary: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreatedResource {
    id: String,
}

pub struct GoogleCalendar {
    client: Client,
    access_token: String,
}

impl GoogleCalendar {
    pub fn new(access_token: &str) -> Self {
        GoogleCalendar {
            client: Client::new(),
            access_token: access_token.to_string(),
        }
    }

    /// Find a calendar by its title, creating it if it does not exist.
    pub async fn get_or_create_calendar(&self, title: &str, description: &str) -> Result<String> {
        let mut page_token: Option<String> = None;
        loop {
            let mut request = self
                .client
                .get(format!("{}/users/me/calendarList", CALENDAR_API))
                .bearer_auth(&self.access_token);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token)]);
            }

            let response = request.send().await?;
            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(Error::GSuite(format!(
                    "calendar list returned {}: {}",
                    status, body
                )));
            }

            let page: CalendarListResponse = response.json().await?;
            for entry in page.items.unwrap_or_default() {
                if entry.summary.as_deref() == Some(title) {
                    return Ok(entry.id);
                }
            }

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        self.create_calendar(title, description).await
    }

    async fn create_calendar(&self, title: &str, description: &str) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/calendars", CALENDAR_API))
            .bearer_auth(&self.access_token)
            .json(&json!({ "summary": title, "description": description }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::GSuite(format!(
                "calendar create returned {}: {}",
                status, body
            )));
        }

        let created: CreatedResource = response.json().await?;
        Ok(created.id)
    }

    /// Insert an event and return its id.
    pub async fn add_event(
        &self,
        calendar_id: &str,
        title: &str,
        description: &str,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<String> {
        let event = json!({
            "summary": title,
            "description": description,
            "start": { "dateTime": start_time.to_rfc3339() },
            "end": { "dateTime": end_time.to_rfc3339() },
        });

        let response = self
            .client
            .post(format!(
                "{}/calendars/{}/events",
                CALENDAR_API,
                urlencoding::encode(calendar_id)
            ))
            .bearer_auth(&self.access_token)
            .json(&event)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::GSuite(format!(
                "event insert returned {}: {}",
                status, body
            )));
        }

        let created: CreatedResource = response.json().await?;
        Ok(created.id)
    }
}
