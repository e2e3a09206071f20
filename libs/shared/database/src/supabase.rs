use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_RANGE, CONTENT_TYPE},
    Client, Method,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::scheduling::{
    Account, Appointment, AppointmentQuery, AppointmentStatus, Professional, Service, StatusCount,
};

use crate::repository::{
    AccountRepository, AppointmentRepository, ProfessionalRepository, ServiceRepository,
};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
    service_role_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            anon_key: config.supabase_anon_key.clone(),
            service_role_key: config.supabase_service_role_key.clone(),
        }
    }

    /// Falls back to the service role key when no caller token is given.
    fn get_headers(&self, auth_token: Option<&str>, prefer: Option<&str>) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();

        let api_key = if self.anon_key.is_empty() { &self.service_role_key } else { &self.anon_key };
        headers.insert("apikey", HeaderValue::from_str(api_key).context("Invalid API key header")?);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let bearer = auth_token
            .map(str::to_string)
            .or_else(|| (!self.service_role_key.is_empty()).then(|| self.service_role_key.clone()));

        if let Some(token) = bearer {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", token)).context("Invalid bearer token header")?,
            );
        }

        if let Some(prefer) = prefer {
            headers.insert("Prefer", HeaderValue::from_str(prefer).context("Invalid Prefer header")?);
        }

        Ok(headers)
    }

    pub async fn request<T>(&self, method: Method, path: &str,
                            auth_token: Option<&str>, body: Option<Value>)
                            -> Result<T>
    where T: DeserializeOwned {
        self.send(method, path, auth_token, body, None).await
    }

    /// Insert-or-update on the primary key, returning the stored rows.
    pub async fn upsert<T>(&self, path: &str, body: Value) -> Result<T>
    where T: DeserializeOwned {
        self.send(
            Method::POST,
            path,
            None,
            Some(body),
            Some("resolution=merge-duplicates,return=representation"),
        )
        .await
    }

    pub async fn delete<T>(&self, path: &str) -> Result<T>
    where T: DeserializeOwned {
        self.send(Method::DELETE, path, None, None, Some("return=representation")).await
    }

    async fn send<T>(&self, method: Method, path: &str, auth_token: Option<&str>,
                     body: Option<Value>, prefer: Option<&str>) -> Result<T>
    where T: DeserializeOwned {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let headers = self.get_headers(auth_token, prefer)?;

        let mut req = self.client.request(method, &url)
            .headers(headers);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            error!("API error ({}): {}", status, error_text);

            return Err(match status.as_u16() {
                401 | 403 => anyhow!("Authentication error: {}", error_text),
                404 => anyhow!("Resource not found: {}", error_text),
                409 => anyhow!("Duplicate resource: {}", error_text),
                _ => anyhow!("API error ({}): {}", status, error_text),
            });
        }

        let data = response.json::<T>().await?;
        Ok(data)
    }

    /// Exact row count for a filtered table path, read from `Content-Range`
    /// without transferring any rows.
    pub async fn count(&self, path: &str) -> Result<u64> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Counting rows at {}", url);

        let headers = self.get_headers(None, Some("count=exact"))?;
        let response = self.client.request(Method::HEAD, &url).headers(headers).send().await?;

        let status = response.status();
        if !status.is_success() {
            error!("API error ({}) counting {}", status, path);
            return Err(anyhow!("API error ({}) counting {}", status, path));
        }

        let range = response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| anyhow!("Count response for {} has no Content-Range", path))?;

        content_range_total(range)
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }
}

/// Total from a `Content-Range` value such as `0-24/3573` or `*/0`.
fn content_range_total(range: &str) -> Result<u64> {
    range
        .rsplit_once('/')
        .and_then(|(_, total)| total.trim().parse().ok())
        .ok_or_else(|| anyhow!("Unexpected Content-Range: {}", range))
}

/// `ilike` pattern matching `value` literally, ignoring case.
fn ilike_literal(value: &str) -> String {
    let mut pattern = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern
}

/// PostgREST-backed implementation of the scheduling collaborators.
///
/// Tables: `accounts`, `professionals`, `services`, `appointments`, with
/// columns named after the model fields.
pub struct SupabaseStore {
    supabase: SupabaseClient,
}

#[derive(Debug, Deserialize)]
struct IdRow {
    #[allow(dead_code)]
    id: Uuid,
}

impl SupabaseStore {
    pub fn new(config: &AppConfig) -> Self {
        Self { supabase: SupabaseClient::new(config) }
    }

    async fn first<T>(&self, path: &str) -> Result<Option<T>>
    where T: DeserializeOwned {
        let rows: Vec<T> = self.supabase.request(Method::GET, path, None, None).await?;
        Ok(rows.into_iter().next())
    }

    async fn exists_in_window(
        &self,
        party_column: &str,
        party_id: Uuid,
        start: NaiveDateTime,
        end: NaiveDateTime,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<bool> {
        let mut query_parts = vec![
            "select=id".to_string(),
            format!("{}=eq.{}", party_column, party_id),
            format!("status=neq.{}", AppointmentStatus::Cancelled),
            format!("start_time=lte.{}", end.format(TIMESTAMP_FORMAT)),
            format!("end_time=gte.{}", start.format(TIMESTAMP_FORMAT)),
        ];

        if let Some(exclude_id) = exclude_appointment_id {
            query_parts.push(format!("id=neq.{}", exclude_id));
        }

        let path = format!("/rest/v1/appointments?{}&limit=1", query_parts.join("&"));
        let rows: Vec<IdRow> = self.supabase.request(Method::GET, &path, None, None).await?;

        Ok(!rows.is_empty())
    }
}

#[async_trait]
impl AccountRepository for SupabaseStore {
    async fn find_account_by_id(&self, id: Uuid) -> Result<Option<Account>> {
        self.first(&format!("/rest/v1/accounts?id=eq.{}", id)).await
    }

    async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>> {
        let email = email.trim();
        // `*` is a PostgREST wildcard with no escape; such addresses match exactly.
        let filter = if email.contains('*') {
            format!("eq.{}", email)
        } else {
            format!("ilike.{}", ilike_literal(email))
        };

        let path = format!("/rest/v1/accounts?email={}", urlencoding::encode(&filter));
        self.first(&path).await
    }
}

#[async_trait]
impl ProfessionalRepository for SupabaseStore {
    async fn find_professional_by_id(&self, id: Uuid) -> Result<Option<Professional>> {
        self.first(&format!("/rest/v1/professionals?id=eq.{}", id)).await
    }

    async fn find_professional_by_account_id(&self, account_id: Uuid) -> Result<Option<Professional>> {
        self.first(&format!("/rest/v1/professionals?account_id=eq.{}", account_id)).await
    }
}

#[async_trait]
impl ServiceRepository for SupabaseStore {
    async fn find_service_by_id(&self, id: Uuid) -> Result<Option<Service>> {
        self.first(&format!("/rest/v1/services?id=eq.{}", id)).await
    }
}

#[async_trait]
impl AppointmentRepository for SupabaseStore {
    async fn find_appointment_by_id(&self, id: Uuid) -> Result<Option<Appointment>> {
        self.first(&format!("/rest/v1/appointments?id=eq.{}", id)).await
    }

    async fn save_appointment(&self, appointment: &Appointment) -> Result<Appointment> {
        let body = serde_json::to_value(appointment)?;
        let rows: Vec<Appointment> = self
            .supabase
            .upsert("/rest/v1/appointments?on_conflict=id", body)
            .await?;

        rows.into_iter()
            .next()
            .ok_or_else(|| anyhow!("Appointment {} was not returned after save", appointment.id))
    }

    async fn delete_appointment(&self, id: Uuid) -> Result<bool> {
        let rows: Vec<IdRow> = self
            .supabase
            .delete(&format!("/rest/v1/appointments?id=eq.{}", id))
            .await?;
        Ok(!rows.is_empty())
    }

    async fn find_appointments(&self, query: &AppointmentQuery) -> Result<Vec<Appointment>> {
        let mut query_parts = Vec::new();

        if let Some(customer_id) = query.customer_id {
            query_parts.push(format!("customer_id=eq.{}", customer_id));
        }
        if let Some(professional_id) = query.professional_id {
            query_parts.push(format!("professional_id=eq.{}", professional_id));
        }
        if let Some(status) = query.status {
            query_parts.push(format!("status=eq.{}", status));
        }
        if let Some(from) = query.from {
            query_parts.push(format!("start_time=gte.{}", from.format(TIMESTAMP_FORMAT)));
        }
        if let Some(to) = query.to {
            query_parts.push(format!("start_time=lte.{}", to.format(TIMESTAMP_FORMAT)));
        }
        query_parts.push("order=start_time.asc".to_string());

        let path = format!("/rest/v1/appointments?{}", query_parts.join("&"));
        self.supabase.request(Method::GET, &path, None, None).await
    }

    async fn exists_appointment_for_professional_in_window(
        &self,
        professional_id: Uuid,
        start: NaiveDateTime,
        end: NaiveDateTime,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<bool> {
        self.exists_in_window("professional_id", professional_id, start, end, exclude_appointment_id)
            .await
    }

    async fn exists_appointment_for_customer_in_window(
        &self,
        customer_id: Uuid,
        start: NaiveDateTime,
        end: NaiveDateTime,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<bool> {
        self.exists_in_window("customer_id", customer_id, start, end, exclude_appointment_id)
            .await
    }

    async fn count_by_status(&self) -> Result<Vec<StatusCount>> {
        let mut counts = Vec::with_capacity(AppointmentStatus::ALL.len());
        for status in AppointmentStatus::ALL {
            let count = self
                .supabase
                .count(&format!("/rest/v1/appointments?select=id&status=eq.{}", status))
                .await?;
            counts.push(StatusCount { status, count });
        }

        Ok(counts)
    }
}
