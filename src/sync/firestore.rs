use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tokio::time::MissedTickBehavior;

use super::{RemoteCollection, RemoteError, SnapshotCallback, Unsubscribe};
use crate::core::appointment::{Appointment, AppointmentFields, AppointmentId, Field};
use crate::core::status::Status;

pub const DEFAULT_ENDPOINT: &str = "https://firestore.googleapis.com/v1";
const PAGE_SIZE: u32 = 300;
/// Firestore rejects a commit with more writes than this.
pub const MAX_BATCH_WRITES: usize = 500;

/// Where the appointment documents live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirestoreSettings {
    pub endpoint: String,
    pub project_id: String,
    pub api_key: String,
    pub collection: String,
    /// Field the listing is ordered by; `None` keeps Firestore's own order.
    pub order_by: Option<String>,
    pub poll_interval: Duration,
}

/// Appointment collection in Cloud Firestore, spoken to over the REST API.
///
/// Firestore's streaming listener is not part of the REST surface, so
/// [`RemoteCollection::subscribe`] polls the collection and pushes a snapshot
/// whenever it differs from the last one delivered. Every successful write
/// polls once more straight away, so this client's own changes reach
/// subscribers before the write returns.
///
/// Clones share the id token and the subscriber list.
#[derive(Clone)]
pub struct FirestoreCollection {
    settings: FirestoreSettings,
    id_token: Arc<RwLock<Option<String>>>,
    http: Client,
    feeds: Arc<Mutex<Feeds>>,
    /// Held for a whole read-and-deliver so snapshots go out in order.
    poll_gate: Arc<tokio::sync::Mutex<()>>,
    poll_requests: Arc<AtomicU64>,
    /// Highest request already answered by a completed read.
    polls_done: Arc<AtomicU64>,
}

struct Feed {
    on_change: SnapshotCallback,
    /// `None` after a failed read, so the next good snapshot is always delivered.
    last: Option<Vec<Appointment>>,
}

#[derive(Default)]
struct Feeds {
    next_key: u64,
    active: HashMap<u64, Feed>,
}

#[derive(Debug, Deserialize)]
struct Document {
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    #[serde(default)]
    documents: Vec<Document>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: String,
}

impl FirestoreCollection {
    pub fn new(settings: FirestoreSettings) -> Result<Self, RemoteError> {
        let http = Client::builder()
            .build()
            .map_err(|e| RemoteError::Network(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            settings: FirestoreSettings {
                endpoint: settings.endpoint.trim_end_matches('/').to_string(),
                ..settings
            },
            id_token: Arc::new(RwLock::new(None)),
            http,
            feeds: Arc::new(Mutex::new(Feeds::default())),
            poll_gate: Arc::new(tokio::sync::Mutex::new(())),
            poll_requests: Arc::new(AtomicU64::new(0)),
            polls_done: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Sends the signed-in user's id token with every request.
    pub fn with_id_token(self, id_token: impl Into<String>) -> Self {
        self.set_id_token(id_token);
        self
    }

    /// Swaps the token used by this client, its clones and running pollers.
    pub fn set_id_token(&self, id_token: impl Into<String>) {
        *self.id_token.write().unwrap_or_else(PoisonError::into_inner) = Some(id_token.into());
    }

    fn feeds(&self) -> MutexGuard<'_, Feeds> {
        self.feeds.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn settings(&self) -> &FirestoreSettings {
        &self.settings
    }

    /// `projects/{p}/databases/(default)/documents`
    fn database_path(&self) -> String {
        format!("projects/{}/databases/(default)/documents", self.settings.project_id)
    }

    fn collection_url(&self) -> String {
        format!(
            "{}/{}/{}",
            self.settings.endpoint,
            self.database_path(),
            self.settings.collection
        )
    }

    fn document_name(&self, id: &AppointmentId) -> String {
        format!("{}/{}/{}", self.database_path(), self.settings.collection, id)
    }

    fn request(&self, method: Method, url: &str) -> reqwest::RequestBuilder {
        let req = self
            .http
            .request(method, url)
            .query(&[("key", self.settings.api_key.as_str())]);
        let token = self.id_token.read().unwrap_or_else(PoisonError::into_inner).clone();
        match token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn send(
        &self,
        req: reqwest::RequestBuilder,
        id: Option<&AppointmentId>,
    ) -> Result<reqwest::Response, RemoteError> {
        let resp = req
            .send()
            .await
            .map_err(|e| RemoteError::Network(e.to_string()))?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(status_error(status, &body, id))
    }

    async fn list_page(&self, page_token: Option<&str>) -> Result<ListResponse, RemoteError> {
        let page_size = PAGE_SIZE.to_string();
        let mut query: Vec<(&str, &str)> = vec![("pageSize", page_size.as_str())];
        if let Some(order_by) = self.settings.order_by.as_deref() {
            query.push(("orderBy", order_by));
        }
        if let Some(token) = page_token {
            query.push(("pageToken", token));
        }
        let req = self.request(Method::GET, &self.collection_url()).query(&query);
        let resp = self.send(req, None).await?;
        let text = resp
            .text()
            .await
            .map_err(|e| RemoteError::Network(format!("Failed to read listing: {}", e)))?;
        parse_list_response(&text)
    }

    /// Reads the collection once and hands it to every subscriber whose last
    /// delivery differs. Failures go to every subscriber.
    ///
    /// Requests queued behind a read that started after them are answered by
    /// that read.
    async fn poll_feeds(&self) {
        let wanted = self.poll_requests.fetch_add(1, Ordering::SeqCst) + 1;
        let _gate = self.poll_gate.lock().await;
        if self.polls_done.load(Ordering::SeqCst) >= wanted || self.feeds().active.is_empty() {
            return;
        }
        let covers = self.poll_requests.load(Ordering::SeqCst);
        let snapshot = self.list_all().await;
        self.polls_done.store(covers, Ordering::SeqCst);
        if let Err(ref e) = snapshot {
            log::warn!("Appointment poll failed: {}", e);
        }

        let deliveries: Vec<(SnapshotCallback, Result<Vec<Appointment>, RemoteError>)> = self
            .feeds()
            .active
            .values_mut()
            .filter_map(|feed| match &snapshot {
                Ok(docs) if feed.last.as_ref() == Some(docs) => None,
                Ok(docs) => {
                    feed.last = Some(docs.clone());
                    Some((Arc::clone(&feed.on_change), Ok(docs.clone())))
                }
                Err(e) => {
                    feed.last = None;
                    Some((Arc::clone(&feed.on_change), Err(e.clone())))
                }
            })
            .collect();

        for (on_change, result) in deliveries {
            on_change(result);
        }
    }
}

impl RemoteCollection for FirestoreCollection {
    async fn add(&self, fields: &AppointmentFields, status: Status) -> Result<AppointmentId, RemoteError> {
        let req = self
            .request(Method::POST, &self.collection_url())
            .json(&encode_document(fields, status));
        let resp = self.send(req, None).await?;
        let doc: Document = resp
            .json()
            .await
            .map_err(|e| RemoteError::Decode(format!("create response: {}", e)))?;
        let id = document_id(&doc.name)?;
        log::info!("Created appointment {}", id);
        self.poll_feeds().await;
        Ok(id)
    }

    async fn update_status(&self, id: &AppointmentId, status: Status) -> Result<(), RemoteError> {
        let url = format!("{}/{}", self.collection_url(), id);
        let req = self
            .request(Method::PATCH, &url)
            .query(&[
                ("updateMask.fieldPaths", "status"),
                ("currentDocument.exists", "true"),
            ])
            .json(&json!({ "fields": { "status": string_value(status.as_keyword()) } }));
        self.send(req, Some(id)).await?;
        log::debug!("Set appointment {} to {}", id, status);
        self.poll_feeds().await;
        Ok(())
    }

    async fn delete(&self, id: &AppointmentId) -> Result<(), RemoteError> {
        let url = format!("{}/{}", self.collection_url(), id);
        self.send(self.request(Method::DELETE, &url), Some(id)).await?;
        log::debug!("Deleted appointment {}", id);
        self.poll_feeds().await;
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<Appointment>, RemoteError> {
        let mut appointments = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let page = self.list_page(page_token.as_deref()).await?;
            for doc in &page.documents {
                match decode_document(doc) {
                    Ok(appt) => appointments.push(appt),
                    Err(e) => log::warn!("Skipping document {}: {}", doc.name, e),
                }
            }
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }
        Ok(appointments)
    }

    async fn batch_delete(&self, ids: &[AppointmentId]) -> Result<(), RemoteError> {
        if ids.is_empty() {
            return Ok(());
        }
        if ids.len() > MAX_BATCH_WRITES {
            log::info!("{} deletes exceed one commit, deleting one by one", ids.len());
            return Err(RemoteError::Unsupported);
        }
        let url = format!("{}/{}:commit", self.settings.endpoint, self.database_path());
        let req = self
            .request(Method::POST, &url)
            .json(&commit_deletes(ids.iter().map(|id| self.document_name(id))));
        self.send(req, None).await?;
        log::info!("Deleted {} appointments in one batch", ids.len());
        self.poll_feeds().await;
        Ok(())
    }

    async fn subscribe(&self, on_change: SnapshotCallback) -> Result<Unsubscribe, RemoteError> {
        let key = {
            let _gate = self.poll_gate.lock().await;
            let first = self.list_all().await?;
            let key = {
                let mut feeds = self.feeds();
                let key = feeds.next_key;
                feeds.next_key += 1;
                feeds.active.insert(
                    key,
                    Feed {
                        on_change: Arc::clone(&on_change),
                        last: Some(first.clone()),
                    },
                );
                key
            };
            on_change(Ok(first));
            key
        };

        let this = self.clone();
        let interval = self.settings.poll_interval;
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                this.poll_feeds().await;
            }
        });

        let feeds = Arc::clone(&self.feeds);
        Ok(Unsubscribe::new(move || {
            task.abort();
            feeds
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .active
                .remove(&key);
        }))
    }
}

fn string_value(s: &str) -> Value {
    json!({ "stringValue": s })
}

fn encode_document(fields: &AppointmentFields, status: Status) -> Value {
    let mut map = Map::new();
    for field in Field::ALL {
        map.insert(field.key().to_string(), string_value(fields.get(*field)));
    }
    map.insert("status".to_string(), string_value(status.as_keyword()));
    json!({ "fields": map })
}

fn commit_deletes(names: impl Iterator<Item = String>) -> Value {
    let writes: Vec<Value> = names.map(|name| json!({ "delete": name })).collect();
    json!({ "writes": writes })
}

/// Last path segment of a document name.
fn document_id(name: &str) -> Result<AppointmentId, RemoteError> {
    match name.rsplit('/').next() {
        Some(id) if !id.is_empty() => Ok(AppointmentId::new(id)),
        _ => Err(RemoteError::Decode(format!("document name without id: {:?}", name))),
    }
}

fn read_string(fields: &Map<String, Value>, key: &str) -> Option<String> {
    fields
        .get(key)
        .and_then(|v| v.get("stringValue"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn decode_document(doc: &Document) -> Result<Appointment, RemoteError> {
    let id = document_id(&doc.name)?;
    let mut fields = AppointmentFields::default();
    for field in Field::ALL {
        let value = read_string(&doc.fields, field.key())
            .ok_or_else(|| RemoteError::Decode(format!("missing field {}", field.key())))?;
        fields.set(*field, value);
    }
    let fields = fields
        .validated()
        .map_err(|e| RemoteError::Decode(e.to_string()))?;
    let status = match read_string(&doc.fields, "status") {
        Some(keyword) => Status::from_keyword_lenient(&keyword),
        None => Status::Pending,
    };
    Ok(Appointment::with_status(id, fields, status))
}

fn parse_list_response(text: &str) -> Result<ListResponse, RemoteError> {
    if text.trim().is_empty() {
        return Ok(ListResponse::default());
    }
    serde_json::from_str(text).map_err(|e| RemoteError::Decode(format!("listing: {}", e)))
}

fn status_error(status: StatusCode, body: &str, id: Option<&AppointmentId>) -> RemoteError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.error.message)
        .unwrap_or_else(|_| body.trim().to_string());
    match (status, id) {
        (StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN, _) => RemoteError::PermissionDenied(message),
        (StatusCode::NOT_FOUND, Some(id)) => RemoteError::NotFound(id.clone()),
        _ => RemoteError::Status {
            status: status.as_u16(),
            message,
        },
    }
}
