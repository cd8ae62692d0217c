// API client module: one function per server endpoint plus `ApiClient`, a
// small facade that keeps the transport, the endpoint URLs and the session
// together for the UI.
//
// Every operation validates its own arguments first and returns on the first
// bad one, so a validation error never produces a request.

use std::str::FromStr;

use serde::Deserialize;
use tracing::info;

use crate::error::ClientError;
use crate::model::{CountBody, DateKey, Dataset, Page, PageBody, ServerStatus, Session};
use crate::retrieval::{self, Pacer, PageRequest, ProgressSink};
use crate::transport::{Request, Transport};

const LOGIN: &str = "login";
const ROW_COUNT: &str = "row count";
const SERVER_STATUS: &str = "server status";
const PAGE: &str = "page request";

/// How the registration response body carries the session token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TokenFormat {
    /// `{"token": "..."}` when the body is such an object, the raw body otherwise.
    #[default]
    Auto,
    /// The whole body is the token.
    Raw,
    /// The body must be a JSON object with a string `token` field.
    Json,
}

#[derive(Deserialize)]
struct TokenEnvelope {
    token: String,
}

impl TokenFormat {
    /// Extract the token from a registration response body.
    pub fn decode(self, body: &[u8]) -> Result<String, ClientError> {
        let token = match self {
            TokenFormat::Json => Self::from_json(body)?,
            TokenFormat::Raw => Self::from_raw(body)?,
            TokenFormat::Auto => match Self::from_json(body) {
                Ok(token) => token,
                Err(_) => Self::from_raw(body)?,
            },
        };
        if token.is_empty() {
            return Err(ClientError::decode(LOGIN, "server returned an empty token"));
        }
        Ok(token)
    }

    fn from_json(body: &[u8]) -> Result<String, ClientError> {
        serde_json::from_slice::<TokenEnvelope>(body)
            .map(|envelope| envelope.token.trim().to_string())
            .map_err(|e| ClientError::decode(LOGIN, format!("expected {{\"token\": ...}}: {e}")))
    }

    fn from_raw(body: &[u8]) -> Result<String, ClientError> {
        std::str::from_utf8(body)
            .map(|token| token.trim().to_string())
            .map_err(|e| ClientError::decode(LOGIN, format!("token is not UTF-8: {e}")))
    }
}

impl FromStr for TokenFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(TokenFormat::Auto),
            "raw" => Ok(TokenFormat::Raw),
            "json" => Ok(TokenFormat::Json),
            other => Err(format!("unknown token format `{other}` (expected auto, raw or json)")),
        }
    }
}

/// Full URLs of the server endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub registration: String,
    pub status: String,
    pub row_count: String,
    pub page: String,
}

impl Endpoints {
    /// Standard endpoint layout below `origin` (e.g. `https://10.0.0.5:8443`).
    pub fn under(origin: &str) -> Self {
        let origin = origin.trim_end_matches('/');
        Endpoints {
            registration: format!("{origin}/registration"),
            status: format!("{origin}/status"),
            row_count: format!("{origin}/cntstr"),
            page: format!("{origin}/partdatadb"),
        }
    }
}

pub(crate) fn require(
    operation: &'static str,
    argument: &'static str,
    value: &str,
) -> Result<(), ClientError> {
    if value.is_empty() {
        return Err(ClientError::validation(operation, argument, "empty value"));
    }
    Ok(())
}

fn send(
    transport: &dyn Transport,
    operation: &'static str,
    request: &Request,
) -> Result<Vec<u8>, ClientError> {
    let response = transport
        .send(request)
        .map_err(|source| ClientError::Transport { operation, source })?;
    match response.status {
        200 => Ok(response.body),
        401 | 403 => Err(ClientError::Auth {
            operation,
            status: response.status,
        }),
        status => Err(ClientError::Server { operation, status }),
    }
}

/// Register on the server and obtain a session.
///
/// The credentials are sent as the plain-text body `"<name> <password>"`.
/// Any status other than 200 means the credentials were refused.
pub fn register(
    transport: &dyn Transport,
    url: &str,
    name: &str,
    password: &str,
    format: TokenFormat,
) -> Result<Session, ClientError> {
    require(LOGIN, "name", name)?;
    require(LOGIN, "password", password)?;
    require(LOGIN, "url", url)?;

    let request = Request::post(url, format!("{name} {password}"));
    let response = transport.send(&request).map_err(|source| ClientError::Transport {
        operation: LOGIN,
        source,
    })?;
    if response.status != 200 {
        return Err(ClientError::Auth {
            operation: LOGIN,
            status: response.status,
        });
    }

    let token = format.decode(&response.body)?;
    info!(user = name, "registered on server");
    Ok(Session::new(token, name.to_string()))
}

/// Ask how many archived rows exist for `date`.
pub fn request_row_count(
    transport: &dyn Transport,
    url: &str,
    token: &str,
    name: &str,
    date: &str,
) -> Result<u64, ClientError> {
    require(ROW_COUNT, "token", token)?;
    require(ROW_COUNT, "name", name)?;
    let date = DateKey::parse_for(ROW_COUNT, date)?;
    require(ROW_COUNT, "url", url)?;

    let request = Request::get(url)
        .param("date", date)
        .param("name", name)
        .authorized(token);
    let body = send(transport, ROW_COUNT, &request)?;

    let count: CountBody = serde_json::from_slice(&body)
        .map_err(|e| ClientError::decode(ROW_COUNT, e.to_string()))?;
    let raw = count
        .cntstr
        .ok_or_else(|| ClientError::decode(ROW_COUNT, "missing field `cntstr`"))?;
    let rows = raw
        .trim()
        .parse::<u64>()
        .map_err(|_| ClientError::decode(ROW_COUNT, format!("`{raw}` is not a row count")))?;

    info!(%date, rows, "row count received");
    Ok(rows)
}

/// Fetch the server status snapshot.
pub fn request_server_status(
    transport: &dyn Transport,
    url: &str,
    token: &str,
    name: &str,
) -> Result<ServerStatus, ClientError> {
    require(SERVER_STATUS, "token", token)?;
    require(SERVER_STATUS, "name", name)?;
    require(SERVER_STATUS, "url", url)?;

    let request = Request::get(url).param("name", name).authorized(token);
    let body = send(transport, SERVER_STATUS, &request)?;

    serde_json::from_slice(&body).map_err(|e| ClientError::decode(SERVER_STATUS, e.to_string()))
}

/// Fetch a single page of archived rows.
///
/// Unlike the other queries, every non-200 answer is reported as a
/// `PageStatus` error carrying the page's sequence number.
pub fn request_page(
    transport: &dyn Transport,
    url: &str,
    token: &str,
    name: &str,
    date: &str,
    page: PageRequest,
) -> Result<Page, ClientError> {
    require(PAGE, "token", token)?;
    require(PAGE, "name", name)?;
    let date = DateKey::parse_for(PAGE, date)?;
    require(PAGE, "url", url)?;

    let request = Request::get(url)
        .param("numbReg", page.sequence_number)
        .param("strLimit", page.limit)
        .param("strOffSet", page.offset)
        .param("date", date)
        .param("name", name)
        .authorized(token);
    let response = transport.send(&request).map_err(|source| ClientError::Transport {
        operation: PAGE,
        source,
    })?;
    if response.status != 200 {
        return Err(ClientError::PageStatus {
            sequence: page.sequence_number,
            status: response.status,
        });
    }

    let body: PageBody = serde_json::from_slice(&response.body)
        .map_err(|e| ClientError::decode(PAGE, e.to_string()))?;
    if body.sequence_number != page.sequence_number {
        tracing::warn!(
            requested = page.sequence_number,
            answered = body.sequence_number,
            "server echoed a different page number"
        );
    }

    Ok(Page {
        sequence_number: page.sequence_number,
        records: body.records,
    })
}

/// Authenticated client used by the terminal UI.
///
/// It can only be created by logging in, and the session it holds never
/// changes afterwards.
pub struct ApiClient<T> {
    transport: T,
    endpoints: Endpoints,
    session: Session,
}

impl<T: Transport> ApiClient<T> {
    /// Register with `name`/`password` and keep the resulting session.
    pub fn login(
        transport: T,
        endpoints: Endpoints,
        token_format: TokenFormat,
        name: &str,
        password: &str,
    ) -> Result<Self, ClientError> {
        let session = register(
            &transport,
            &endpoints.registration,
            name,
            password,
            token_format,
        )?;
        Ok(ApiClient {
            transport,
            endpoints,
            session,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn server_status(&self) -> Result<ServerStatus, ClientError> {
        request_server_status(
            &self.transport,
            &self.endpoints.status,
            self.session.token(),
            self.session.username(),
        )
    }

    pub fn row_count(&self, date: &str) -> Result<u64, ClientError> {
        request_row_count(
            &self.transport,
            &self.endpoints.row_count,
            self.session.token(),
            self.session.username(),
            date,
        )
    }

    /// Download the archive of `date`, expecting `total_rows` rows.
    pub fn download(
        &self,
        date: &str,
        total_rows: u64,
        pacer: &dyn Pacer,
        progress: &mut dyn ProgressSink,
    ) -> Result<Dataset, ClientError> {
        retrieval::retrieve(
            &self.transport,
            &self.endpoints.page,
            self.session.token(),
            self.session.username(),
            date,
            total_rows,
            pacer,
            progress,
        )
    }
}
