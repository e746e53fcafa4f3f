use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::NaiveDate;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::logger::{MessageLogMode, MessageLogger};
use crate::mock::MockBackend;
use crate::protocol::{
    AUTHENTICATE_PATH, DEFAULT_BASE_URL, DEFAULT_TENANT_ID, TENANT_HEADER, UPDATE_DEVICE_PATH,
    USER_DEVICES_PATH, device_by_id_path, energy_data_path, error_message, login_request,
    unwrap_envelope,
};
use crate::store::Store;
use crate::token::{AuthToken, Authenticator, Credentials, TokenManager};
use crate::types::*;
use crate::{Error, Result};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub struct EbecoClientBuilder {
    credentials: Credentials,
    base_url: String,
    tenant_id: String,
    timeout: Duration,
    token_store: Option<Arc<dyn Store>>,
    token_manager: Option<Arc<TokenManager>>,
    log_mode: Option<MessageLogMode>,
    log_path: Option<String>,
}

impl EbecoClientBuilder {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            base_url: DEFAULT_BASE_URL.to_string(),
            tenant_id: DEFAULT_TENANT_ID.to_string(),
            timeout: DEFAULT_TIMEOUT,
            token_store: None,
            token_manager: None,
            log_mode: None,
            log_path: None,
        }
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn tenant_id(mut self, id: impl Into<String>) -> Self {
        self.tenant_id = id.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Persist the account token so it survives restarts.
    pub fn token_store(mut self, store: Arc<dyn Store>) -> Self {
        self.token_store = Some(store);
        self
    }

    /// Share an existing account token between several clients.
    /// Its credentials take precedence over the builder's.
    pub fn token_manager(mut self, manager: Arc<TokenManager>) -> Self {
        self.token_manager = Some(manager);
        self
    }

    pub fn message_log(mut self, mode: MessageLogMode, path: impl Into<String>) -> Self {
        self.log_mode = Some(mode);
        self.log_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<EbecoClient> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let tenant = HeaderValue::from_str(&self.tenant_id)
            .map_err(|_| Error::InvalidSettings(format!("invalid tenant id: {}", self.tenant_id)))?;
        let tenant_header = HeaderName::from_bytes(TENANT_HEADER.as_bytes())
            .map_err(|_| Error::InvalidSettings(format!("invalid header name: {TENANT_HEADER}")))?;
        headers.insert(tenant_header, tenant);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(self.timeout)
            .build()?;

        let tokens = match self.token_manager {
            Some(manager) => manager,
            None => account_tokens(self.credentials, self.token_store.clone())?,
        };

        let logger = match (self.log_mode, self.log_path) {
            (Some(mode), Some(path)) => Some(Arc::new(Mutex::new(MessageLogger::new(mode, &path)?))),
            _ => None,
        };

        Ok(EbecoClient::assemble(http, self.base_url, tokens, self.token_store, logger))
    }
}

fn account_tokens(credentials: Credentials, store: Option<Arc<dyn Store>>) -> Result<Arc<TokenManager>> {
    Ok(Arc::new(match store {
        Some(store) => TokenManager::with_store(credentials, store)?,
        None => TokenManager::new(credentials),
    }))
}

enum Reply {
    Body(String),
    Unauthorized,
}

/// Ebeco Connect cloud API client. Shareable behind an `Arc`; all calls take `&self`.
pub struct EbecoClient {
    http: reqwest::Client,
    base_url: String,
    tokens: Arc<TokenManager>,
    token_store: Option<Arc<dyn Store>>,
    mock: Option<MockBackend>,
    logger: Option<Arc<Mutex<MessageLogger>>>,
}

impl EbecoClient {
    pub fn builder(credentials: Credentials) -> EbecoClientBuilder {
        EbecoClientBuilder::new(credentials)
    }

    fn assemble(
        http: reqwest::Client,
        base_url: String,
        tokens: Arc<TokenManager>,
        token_store: Option<Arc<dyn Store>>,
        logger: Option<Arc<Mutex<MessageLogger>>>,
    ) -> Self {
        let mock = tokens.credentials().is_mock().then(MockBackend::new);
        if mock.is_some() {
            debug!("using in-memory mock account");
        }
        Self {
            http,
            base_url,
            tokens,
            token_store,
            mock,
            logger,
        }
    }

    /// Same endpoint, timeout and logging, but a different account.
    pub fn with_credentials(&self, credentials: Credentials) -> Result<EbecoClient> {
        let tokens = account_tokens(credentials, self.token_store.clone())?;
        Ok(Self::assemble(
            self.http.clone(),
            self.base_url.clone(),
            tokens,
            self.token_store.clone(),
            self.logger.clone(),
        ))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn token_manager(&self) -> &Arc<TokenManager> {
        &self.tokens
    }

    pub fn is_mock(&self) -> bool {
        self.mock.is_some()
    }

    /// Make sure a valid token is cached, logging in if needed.
    pub async fn login(&self) -> Result<AuthToken> {
        self.tokens.valid_token(self).await
    }

    pub async fn get_user_devices(&self) -> Result<Vec<DeviceSnapshot>> {
        if let Some(mock) = &self.mock {
            return Ok(mock.devices());
        }
        let devices: Vec<DeviceSnapshot> = self.request(Method::GET, USER_DEVICES_PATH, None).await?;
        debug!(count = devices.len(), "loaded device list");
        Ok(devices)
    }

    pub async fn get_device(&self, id: u64) -> Result<DeviceSnapshot> {
        if let Some(mock) = &self.mock {
            return mock.device(id);
        }
        self.request(Method::GET, &device_by_id_path(id), None).await
    }

    /// Push a state change. Returns the vendor's `success` flag.
    pub async fn update_device(&self, update: &DeviceUpdate) -> Result<bool> {
        if let Some(program) = update.selected_program
            && !program.is_writable()
        {
            return Err(Error::ReadOnlyProgram(program.to_string()));
        }
        let body = serde_json::to_value(update)?;
        self.log_command("update_device", update.id, &body);
        if let Some(mock) = &self.mock {
            return mock.update(update);
        }
        let text = self
            .send_authorized(Method::PUT, UPDATE_DEVICE_PATH, Some(&body))
            .await?;
        let envelope: Envelope<Value> = serde_json::from_str(&text)?;
        if !envelope.success {
            warn!(device_id = update.id, "vendor rejected device update");
        }
        Ok(envelope.success)
    }

    pub async fn get_device_energy_data(
        &self,
        id: u64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<EnergyData>> {
        if self.mock.is_some() {
            return Ok(Vec::new());
        }
        self.request(Method::GET, &energy_data_path(id, from, to), None)
            .await
    }

    /// Authenticated request against `path`, returning the envelope's `result`.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<T> {
        let text = self.send_authorized(method, path, body).await?;
        unwrap_envelope(&text)
    }

    async fn send_authorized(&self, method: Method, path: &str, body: Option<&Value>) -> Result<String> {
        if self.mock.is_some() {
            return Err(Error::Api(format!("{path} is not available for the mock account")));
        }
        let token = self.tokens.valid_token(self).await?;
        match self.send(method.clone(), path, body, Some(&token)).await? {
            Reply::Body(text) => Ok(text),
            Reply::Unauthorized => {
                debug!(path, "got 401, re-authenticating once");
                let token = self.tokens.renew(self, &token).await?;
                match self.send(method, path, body, Some(&token)).await? {
                    Reply::Body(text) => Ok(text),
                    Reply::Unauthorized => Err(Error::Auth(
                        "request rejected after re-authentication".to_string(),
                    )),
                }
            }
        }
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        token: Option<&AuthToken>,
    ) -> Result<Reply> {
        let url = format!("{}{}", self.base_url, path);
        trace!(%method, %url, "sending request");
        self.log_request(method.as_str(), path, body);

        let mut req = self.http.request(method, &url);
        if let Some(token) = token {
            req = req.header(AUTHORIZATION, format!("Bearer {}", token.access_token));
        }
        if let Some(body) = body {
            req = req.json(body);
        }

        let resp = req.send().await?;
        let status = resp.status();
        let text = resp.text().await?;
        self.log_response(path, status.as_u16(), &text);

        match status {
            s if s.is_success() => Ok(Reply::Body(text)),
            StatusCode::UNAUTHORIZED => Ok(Reply::Unauthorized),
            StatusCode::TOO_MANY_REQUESTS => Err(Error::RateLimited),
            s => Err(Error::HttpStatus {
                code: s.as_u16(),
                message: error_message(&text),
            }),
        }
    }

    fn log_request(&self, method: &str, path: &str, body: Option<&Value>) {
        if let Some(logger) = &self.logger {
            let mut logger = logger.lock().unwrap_or_else(|e| e.into_inner());
            logger.log_request(method, path, body);
        }
    }

    fn log_response(&self, path: &str, status: u16, text: &str) {
        if let Some(logger) = &self.logger {
            let body = serde_json::from_str(text).unwrap_or(Value::Null);
            let mut logger = logger.lock().unwrap_or_else(|e| e.into_inner());
            logger.log_response(path, status, &body);
        }
    }

    fn log_command(&self, action: &str, device_id: u64, body: &Value) {
        if let Some(logger) = &self.logger {
            let mut logger = logger.lock().unwrap_or_else(|e| e.into_inner());
            logger.log_command(action, device_id, body);
        }
    }
}

impl Authenticator for EbecoClient {
    async fn authenticate(&self, credentials: &Credentials) -> Result<LoginResponse> {
        if let Some(mock) = &self.mock {
            return Ok(mock.login());
        }
        debug!("sending login request");
        let body = serde_json::to_value(login_request(&credentials.username, &credentials.password))?;

        // Never goes through send_authorized: a failing login must not retry itself.
        let text = match self.send(Method::POST, AUTHENTICATE_PATH, Some(&body), None).await {
            Ok(Reply::Body(text)) => text,
            Ok(Reply::Unauthorized) => return Err(Error::Auth("wrong username or password".to_string())),
            Err(Error::HttpStatus { code: 500, .. }) => {
                return Err(Error::Auth("wrong username or password".to_string()));
            }
            Err(e) => return Err(e),
        };

        unwrap_envelope::<LoginResponse>(&text).map_err(|e| match e {
            Error::Api(msg) => Error::Auth(msg),
            other => other,
        })
    }
}
