//! # Remote Finance Repository
//!
//! HTTP implementation of [`FinanceRepository`].
//!
//! ## Endpoints
//!
//! ```text
//! GET    /items               -> { items }
//! POST   /items               <- { items }       (full replace)
//! DELETE /items/{id}
//! GET    /items/{id}/history  -> { history: ItemRevision[] }
//! GET    /history             -> { history }
//! POST   /history             <- { history }     (full replace)
//! DELETE /history/{id}
//! GET    /categories          -> { categories }
//! POST   /categories          <- { categories }  (full replace)
//! ```
//!
//! Every request carries `Authorization: Bearer <token>` when the auth
//! session has a token. A 401 triggers exactly one refresh and one retry.

use anyhow::Result;
use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use shared::{
    CategoriesPayload, Category, FinanceItem, HistoryEntry, HistoryPayload, ItemHistoryPayload, ItemRevision,
    ItemsPayload,
};
use std::sync::Arc;
use std::time::Duration;

use super::auth::AuthSession;
use super::errors::{extract_error_message, ApiError};
use crate::backend::storage::FinanceRepository;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct RemoteRepository {
    client: Client,
    base_url: Url,
    auth: Arc<dyn AuthSession>,
}

impl RemoteRepository {
    /// Create a repository for the API at `base_url`
    pub fn new(base_url: &str, auth: Arc<dyn AuthSession>) -> Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Self::with_client(client, base_url, auth)
    }

    /// Create a repository with a preconfigured HTTP client
    pub fn with_client(client: Client, base_url: &str, auth: Arc<dyn AuthSession>) -> Result<Self> {
        let trimmed = base_url.trim().trim_end_matches('/');
        let base_url = Url::parse(trimmed).map_err(|e| ApiError::InvalidUrl(format!("{}: {}", trimmed, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(trimmed.to_string()).into());
        }
        info!("Using remote repository at {}", base_url);
        Ok(Self { client, base_url, auth })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: &Url, token: Option<&str>) -> RequestBuilder {
        let builder = self.client.request(method, url.clone());
        match token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Send a request built by `build`, handling the 401 refresh-and-retry cycle.
    ///
    /// `build` is called once per attempt with the token to use.
    async fn send<F>(&self, action: &str, build: F) -> Result<Response, ApiError>
    where
        F: Fn(Option<&str>) -> RequestBuilder,
    {
        let token = self.auth.access_token();
        let response = build(token.as_deref()).send().await?;

        if response.status() != StatusCode::UNAUTHORIZED || !self.auth.supports_refresh() {
            return Self::check(action, response).await;
        }

        info!("{} was unauthorized, refreshing token", action);
        let new_token = match self.auth.refresh().await {
            Ok(token) => token,
            Err(e) => {
                warn!("Token refresh failed during {}: {:#}", action, e);
                self.auth.logout();
                return Err(ApiError::SessionExpired(format!("{:#}", e)));
            }
        };

        let retried = build(Some(&new_token)).send().await?;
        Self::check(action, retried).await
    }

    async fn check(action: &str, response: Response) -> Result<Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = extract_error_message(action, status, &body);
        warn!("{} failed with {}: {}", action, status, message);
        Err(ApiError::Http {
            status: status.as_u16(),
            message,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, action: &str, segments: &[&str]) -> Result<T> {
        let url = self.endpoint(segments)?;
        debug!("GET {}", url);
        let response = self
            .send(action, |token| self.request(Method::GET, &url, token))
            .await?;
        let payload = response.json::<T>().await.map_err(ApiError::from)?;
        Ok(payload)
    }

    async fn post_json<B: Serialize + Sync>(&self, action: &str, segments: &[&str], body: &B) -> Result<()> {
        let url = self.endpoint(segments)?;
        debug!("POST {}", url);
        self.send(action, |token| self.request(Method::POST, &url, token).json(body))
            .await?;
        Ok(())
    }

    async fn delete(&self, action: &str, segments: &[&str]) -> Result<()> {
        let url = self.endpoint(segments)?;
        debug!("DELETE {}", url);
        self.send(action, |token| self.request(Method::DELETE, &url, token))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl FinanceRepository for RemoteRepository {
    async fn get_items(&self) -> Result<Vec<FinanceItem>> {
        let payload: ItemsPayload = self.get_json("Fetch items", &["items"]).await?;
        Ok(payload.items)
    }

    async fn save_items(&self, items: &[FinanceItem]) -> Result<()> {
        let body = ItemsPayload { items: items.to_vec() };
        self.post_json("Save items", &["items"], &body).await
    }

    async fn delete_item(&self, id: &str) -> Result<()> {
        self.delete("Delete item", &["items", id]).await
    }

    async fn get_categories(&self) -> Result<Vec<Category>> {
        let payload: CategoriesPayload = self.get_json("Fetch categories", &["categories"]).await?;
        Ok(payload.categories)
    }

    async fn save_categories(&self, categories: &[Category]) -> Result<()> {
        let body = CategoriesPayload {
            categories: categories.to_vec(),
        };
        self.post_json("Save categories", &["categories"], &body).await
    }

    async fn get_history(&self) -> Result<Vec<HistoryEntry>> {
        let payload: HistoryPayload = self.get_json("Fetch history", &["history"]).await?;
        Ok(payload.history)
    }

    async fn save_history(&self, history: &[HistoryEntry]) -> Result<()> {
        let body = HistoryPayload {
            history: history.to_vec(),
        };
        self.post_json("Save history", &["history"], &body).await
    }

    async fn delete_history_item(&self, id: &str) -> Result<()> {
        self.delete("Delete history entry", &["history", id]).await
    }

    async fn get_item_history(&self, item_id: &str) -> Result<Vec<ItemRevision>> {
        let payload: ItemHistoryPayload = self
            .get_json("Fetch item history", &["items", item_id, "history"])
            .await?;
        Ok(payload.history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::storage::remote::auth::StaticToken;
    use axum::extract::State;
    use axum::http::{HeaderMap, Uri};
    use axum::response::IntoResponse;
    use axum::Router;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Debug, Clone)]
    struct RecordedRequest {
        method: String,
        path: String,
        authorization: Option<String>,
        body: String,
    }

    type Responder = dyn Fn(&RecordedRequest, usize) -> (StatusCode, String) + Send + Sync;

    #[derive(Clone)]
    struct MockState {
        requests: Arc<Mutex<Vec<RecordedRequest>>>,
        responder: Arc<Responder>,
    }

    async fn record(
        State(state): State<MockState>,
        method: axum::http::Method,
        uri: Uri,
        headers: HeaderMap,
        body: String,
    ) -> impl IntoResponse {
        let request = RecordedRequest {
            method: method.to_string(),
            path: uri.path().to_string(),
            authorization: headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            body,
        };
        let index = {
            let mut requests = state.requests.lock().unwrap();
            requests.push(request.clone());
            requests.len() - 1
        };
        let (status, body) = (state.responder)(&request, index);
        (
            axum::http::StatusCode::from_u16(status.as_u16()).unwrap(),
            [("content-type", "application/json")],
            body,
        )
    }

    /// Serve a catch-all mock API and return its base URL plus the request log
    async fn spawn_mock<F>(responder: F) -> (String, Arc<Mutex<Vec<RecordedRequest>>>)
    where
        F: Fn(&RecordedRequest, usize) -> (StatusCode, String) + Send + Sync + 'static,
    {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let state = MockState {
            requests: requests.clone(),
            responder: Arc::new(responder),
        };
        let app = Router::new().fallback(record).with_state(state);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}/prod/", addr), requests)
    }

    /// Auth session whose token can be refreshed once
    struct RefreshingSession {
        token: Mutex<String>,
        refresh_result: Option<String>,
        refresh_calls: AtomicUsize,
        logout_calls: AtomicUsize,
    }

    impl RefreshingSession {
        fn new(token: &str, refresh_result: Option<&str>) -> Arc<Self> {
            Arc::new(Self {
                token: Mutex::new(token.to_string()),
                refresh_result: refresh_result.map(str::to_string),
                refresh_calls: AtomicUsize::new(0),
                logout_calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl AuthSession for RefreshingSession {
        fn access_token(&self) -> Option<String> {
            Some(self.token.lock().unwrap().clone())
        }

        fn supports_refresh(&self) -> bool {
            true
        }

        async fn refresh(&self) -> Result<String> {
            self.refresh_calls.fetch_add(1, Ordering::SeqCst);
            match &self.refresh_result {
                Some(token) => {
                    *self.token.lock().unwrap() = token.clone();
                    Ok(token.clone())
                }
                None => Err(anyhow::anyhow!("refresh token expired")),
            }
        }

        fn logout(&self) {
            self.logout_calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn items_body() -> String {
        json!({ "items": [{ "id": "1", "name": "Wallet", "amount": 550.0, "category": "liquid_cash" }] }).to_string()
    }

    #[tokio::test]
    async fn test_get_items_sends_bearer_token() {
        let (base_url, requests) = spawn_mock(|_, _| (StatusCode::OK, items_body())).await;
        let repo = RemoteRepository::new(&base_url, Arc::new(StaticToken::new(Some("abc".to_string())))).unwrap();

        let items = repo.get_items().await.unwrap();

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "Wallet");
        let requests = requests.lock().unwrap();
        assert_eq!(requests[0].method, "GET");
        assert_eq!(requests[0].path, "/prod/items");
        assert_eq!(requests[0].authorization.as_deref(), Some("Bearer abc"));
    }

    #[tokio::test]
    async fn test_no_token_means_no_authorization_header() {
        let (base_url, requests) = spawn_mock(|_, _| (StatusCode::OK, "{}".to_string())).await;
        let repo = RemoteRepository::new(&base_url, Arc::new(StaticToken::new(None))).unwrap();

        let history = repo.get_history().await.unwrap();

        assert!(history.is_empty());
        assert_eq!(requests.lock().unwrap()[0].authorization, None);
    }

    #[tokio::test]
    async fn test_unauthorized_refreshes_and_retries_once() {
        let (base_url, requests) = spawn_mock(|request, _| {
            if request.authorization.as_deref() == Some("Bearer fresh") {
                (StatusCode::OK, items_body())
            } else {
                (StatusCode::UNAUTHORIZED, json!({ "message": "Token expired" }).to_string())
            }
        })
        .await;
        let session = RefreshingSession::new("stale", Some("fresh"));
        let repo = RemoteRepository::new(&base_url, session.clone()).unwrap();

        let items = repo.get_items().await.unwrap();

        assert_eq!(items.len(), 1);
        let requests = requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].authorization.as_deref(), Some("Bearer stale"));
        assert_eq!(requests[1].authorization.as_deref(), Some("Bearer fresh"));
        assert_eq!(session.refresh_calls.load(Ordering::SeqCst), 1);
        assert_eq!(session.logout_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failed_refresh_logs_out() {
        let (base_url, requests) =
            spawn_mock(|_, _| (StatusCode::UNAUTHORIZED, json!({ "message": "nope" }).to_string())).await;
        let session = RefreshingSession::new("stale", None);
        let repo = RemoteRepository::new(&base_url, session.clone()).unwrap();

        let err = repo.get_items().await.unwrap_err();

        assert!(matches!(err.downcast_ref::<ApiError>(), Some(ApiError::SessionExpired(_))));
        assert_eq!(session.logout_calls.load(Ordering::SeqCst), 1);
        assert_eq!(requests.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_second_unauthorized_is_not_retried_again() {
        let (base_url, requests) =
            spawn_mock(|_, _| (StatusCode::UNAUTHORIZED, json!({ "error": "Forbidden user" }).to_string())).await;
        let session = RefreshingSession::new("stale", Some("fresh"));
        let repo = RemoteRepository::new(&base_url, session.clone()).unwrap();

        let err = repo.get_history().await.unwrap_err();

        let api_error = err.downcast_ref::<ApiError>().unwrap();
        assert_eq!(api_error.status(), Some(401));
        assert_eq!(api_error.to_string(), "Forbidden user");
        assert_eq!(requests.lock().unwrap().len(), 2);
        assert_eq!(session.refresh_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_static_token_does_not_refresh() {
        let (base_url, requests) = spawn_mock(|_, _| (StatusCode::UNAUTHORIZED, "".to_string())).await;
        let repo = RemoteRepository::new(&base_url, Arc::new(StaticToken::new(Some("abc".to_string())))).unwrap();

        let err = repo.get_items().await.unwrap_err();

        assert_eq!(err.to_string(), "Fetch items failed: 401 Unauthorized");
        assert_eq!(requests.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_error_body_message_is_surfaced() {
        let (base_url, _) = spawn_mock(|_, _| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "errorMessage": "Table missing", "code": "DDB" }).to_string(),
            )
        })
        .await;
        let repo = RemoteRepository::new(&base_url, Arc::new(StaticToken::default())).unwrap();

        let err = repo.save_items(&[]).await.unwrap_err();

        assert_eq!(err.to_string(), "Table missing (code: DDB)");
    }

    #[tokio::test]
    async fn test_save_items_posts_full_collection() {
        let (base_url, requests) = spawn_mock(|_, _| (StatusCode::OK, "{}".to_string())).await;
        let repo = RemoteRepository::new(&base_url, Arc::new(StaticToken::default())).unwrap();
        let items = vec![
            FinanceItem {
                id: "1".to_string(),
                name: "Bonds".to_string(),
                amount: 5271.96,
                category: "investments".to_string(),
            },
            FinanceItem {
                id: "2".to_string(),
                name: "Loan".to_string(),
                amount: 300.0,
                category: "debt".to_string(),
            },
        ];

        repo.save_items(&items).await.unwrap();

        let requests = requests.lock().unwrap();
        assert_eq!(requests[0].method, "POST");
        assert_eq!(requests[0].path, "/prod/items");
        let body: ItemsPayload = serde_json::from_str(&requests[0].body).unwrap();
        assert_eq!(body.items, items);
    }

    #[tokio::test]
    async fn test_deletes_address_resource_by_id() {
        let (base_url, requests) = spawn_mock(|_, _| (StatusCode::NO_CONTENT, String::new())).await;
        let repo = RemoteRepository::new(&base_url, Arc::new(StaticToken::default())).unwrap();

        repo.delete_item("item 7").await.unwrap();
        repo.delete_history_item("h3").await.unwrap();

        let requests = requests.lock().unwrap();
        assert_eq!(requests[0].method, "DELETE");
        assert_eq!(requests[0].path, "/prod/items/item%207");
        assert_eq!(requests[1].path, "/prod/history/h3");
    }

    #[tokio::test]
    async fn test_item_history_endpoint() {
        let (base_url, requests) = spawn_mock(|_, _| {
            let body = json!({ "history": [{
                "itemId": "4", "timestamp": "2025-01-01T00:00:00Z", "type": "create",
                "name": "Nu Account", "amount": 1.0, "category": "investments", "raw": { "pk": "ITEM#4" }
            }]});
            (StatusCode::OK, body.to_string())
        })
        .await;
        let repo = RemoteRepository::new(&base_url, Arc::new(StaticToken::default())).unwrap();

        let revisions = repo.get_item_history("4").await.unwrap();

        assert_eq!(revisions.len(), 1);
        assert_eq!(revisions[0].raw["pk"], "ITEM#4");
        assert_eq!(requests.lock().unwrap()[0].path, "/prod/items/4/history");
    }

    #[tokio::test]
    async fn test_network_failure_propagates_without_refresh() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let session = RefreshingSession::new("stale", Some("fresh"));
        let repo = RemoteRepository::new(&format!("http://{}", addr), session.clone()).unwrap();

        let err = repo.get_items().await.unwrap_err();

        assert!(matches!(err.downcast_ref::<ApiError>(), Some(ApiError::Network(_))));
        assert_eq!(session.refresh_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_rejects_invalid_base_url() {
        let result = RemoteRepository::new("not a url", Arc::new(StaticToken::default()));
        assert!(result.is_err());
    }
}
