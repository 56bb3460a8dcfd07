//! HTTP client for the site exchange endpoint.
//!
//! [`ExchangeClient`] owns the transport and the [`Session`]. Each protocol
//! step is one method issuing exactly one request to the configured
//! endpoint. The transport itself is never exposed.

use std::time::Duration;

use reqwest::header::{CONTENT_LENGTH, COOKIE};
use reqwest::{Client, ClientBuilder, RequestBuilder, Response, StatusCode};
use tokio::io::AsyncRead;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
use super::error::ProtocolError;
use super::piece::{PieceError, piece};
use super::response::{parse_checkauth, parse_file_ack, parse_import, parse_init};
use super::session::Session;
use super::types::{ExchangeType, ImportStatus, Mode, TransferParameters};
use crate::user_agent;

/// Client for one sequential exchange run against one endpoint.
///
/// # Example
///
/// ```no_run
/// use cml_exchange::protocol::{ExchangeClient, ExchangeType};
/// use url::Url;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let endpoint = Url::parse("https://shop.example/bitrix/admin/1c_exchange.php")?;
/// let mut client = ExchangeClient::new(endpoint, ExchangeType::Catalog)?;
/// client.authenticate("admin", "secret").await?;
/// let params = client.negotiate().await?;
/// println!("zip: {}, limit: {}", params.use_compression, params.chunk_byte_limit);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ExchangeClient {
    client: Client,
    endpoint: Url,
    exchange_type: ExchangeType,
    session: Session,
}

impl ExchangeClient {
    /// Creates a client with default timeouts (30s connect, 5min request).
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::ClientBuild`] if the HTTP client cannot be built.
    pub fn new(endpoint: Url, exchange_type: ExchangeType) -> Result<Self, ProtocolError> {
        Self::with_timeouts(
            endpoint,
            exchange_type,
            CONNECT_TIMEOUT_SECS,
            READ_TIMEOUT_SECS,
        )
    }

    /// Creates a client with explicit timeout values.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::ClientBuild`] if the HTTP client cannot be built.
    pub fn with_timeouts(
        endpoint: Url,
        exchange_type: ExchangeType,
        connect_timeout_secs: u64,
        read_timeout_secs: u64,
    ) -> Result<Self, ProtocolError> {
        let client = base_client_builder(connect_timeout_secs, read_timeout_secs)
            .build()
            .map_err(|source| ProtocolError::ClientBuild { source })?;
        Ok(Self {
            client,
            endpoint,
            exchange_type,
            session: Session::default(),
        })
    }

    /// Exchange type sent with every request.
    #[must_use]
    pub fn exchange_type(&self) -> ExchangeType {
        self.exchange_type
    }

    /// Endpoint every request is sent to.
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Current session state.
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Starts a session (`mode=checkauth`) using HTTP basic credentials.
    ///
    /// On success the session is replaced: exactly one cookie, and session
    /// id / timestamp from the response (empty when absent). On any error the
    /// session is left untouched.
    ///
    /// # Errors
    ///
    /// Returns a transport error, [`ProtocolError::ServerStatus`] for non-200
    /// responses, or [`ProtocolError::MalformedResponse`] if the body has fewer
    /// than three fields or does not start with `success`.
    #[instrument(skip(self, password), fields(mode = %Mode::CheckAuth))]
    pub async fn authenticate(
        &mut self,
        username: &str,
        password: &str,
    ) -> Result<(), ProtocolError> {
        let request = self
            .request(Mode::CheckAuth, &[])
            .basic_auth(username, Some(password));
        let body = self.send(Mode::CheckAuth, request).await?;

        let session = parse_checkauth(&body)
            .ok_or_else(|| ProtocolError::malformed(Mode::CheckAuth, body))?;
        if session.session_id().is_empty() {
            debug!("site did not send a session id");
        }
        self.session.replace(session);
        info!(
            has_sessid = !self.session.session_id().is_empty(),
            has_timestamp = !self.session.timestamp().is_empty(),
            "session established"
        );
        Ok(())
    }

    /// Requests transfer parameters (`mode=init`).
    ///
    /// # Errors
    ///
    /// Returns a transport error, [`ProtocolError::ServerStatus`] for non-200
    /// responses, or [`ProtocolError::MalformedResponse`] unless the body is
    /// exactly `zip=<..>` and `file_limit=<integer>`.
    #[instrument(skip(self), fields(mode = %Mode::Init))]
    pub async fn negotiate(&self) -> Result<TransferParameters, ProtocolError> {
        let request = self.request(Mode::Init, &[]);
        let body = self.send(Mode::Init, request).await?;

        let params =
            parse_init(&body).ok_or_else(|| ProtocolError::malformed(Mode::Init, body))?;
        info!(
            zip = params.use_compression,
            file_limit = params.chunk_byte_limit,
            "transfer parameters negotiated"
        );
        Ok(params)
    }

    /// Uploads the next `len` bytes of `source` as `filename` (`mode=file`).
    ///
    /// The body is streamed through a bounded [`piece`](super::piece()) so the
    /// chunk is never buffered whole. On success the source is handed back,
    /// positioned right after the uploaded bytes. A site that acknowledges
    /// before reading the whole chunk still counts as success; the source is
    /// then positioned wherever the copy stopped.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Source`] if the source fails or holds fewer
    /// than `len` bytes, a transport error, [`ProtocolError::ServerStatus`]
    /// for non-200 responses, or [`ProtocolError::MalformedResponse`] if the
    /// body does not start with `success`.
    #[instrument(skip(self, source), fields(mode = %Mode::File, filename = %filename))]
    pub async fn upload<R>(&self, source: R, len: u64, filename: &str) -> Result<R, ProtocolError>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let (body, producer) = piece(source, len);
        let request = self
            .client
            .post(self.request_url(Mode::File, &[("filename", filename)]))
            .header(CONTENT_LENGTH, len)
            .body(body.into_body());
        let request = self.with_cookie(request);

        debug!("sending exchange request");
        let response = match request.send().await {
            Ok(response) => response,
            Err(error) => {
                // A reader-side failure explains the broken body better than the transport does.
                if let Err(PieceError::Source(source_error)) = join_producer(producer).await {
                    return Err(ProtocolError::source_failed(Mode::File, source_error));
                }
                return Err(ProtocolError::transport(Mode::File, error));
            }
        };

        if let Err(error) = check_status(Mode::File, &response) {
            producer.abort();
            return Err(error);
        }
        // The site may answer before it has read the whole body.
        let body = match read_body(Mode::File, response).await {
            Ok(body) => body,
            Err(error) => {
                producer.abort();
                return Err(error);
            }
        };
        if !parse_file_ack(&body) {
            producer.abort();
            return Err(ProtocolError::malformed(Mode::File, body));
        }

        let source = match join_producer(producer).await {
            Ok(source) => source,
            Err(PieceError::ReaderDropped { source, sent }) => {
                warn!(sent, expected = len, "site acknowledged the chunk before reading all of it");
                source
            }
            Err(PieceError::Source(error)) => {
                return Err(ProtocolError::source_failed(Mode::File, error));
            }
        };
        info!(bytes = len, "chunk uploaded");
        Ok(source)
    }

    /// Triggers (or polls) the server-side import of `filename` (`mode=import`).
    ///
    /// # Errors
    ///
    /// Returns a transport error, [`ProtocolError::ServerStatus`] for non-200
    /// responses, or [`ProtocolError::MalformedResponse`] unless the body
    /// starts with `success` or `progress`.
    #[instrument(skip(self), fields(mode = %Mode::Import, filename = %filename))]
    pub async fn trigger_import(&self, filename: &str) -> Result<ImportStatus, ProtocolError> {
        let request = self.request(Mode::Import, &[("filename", filename)]);
        let body = self.send(Mode::Import, request).await?;

        let status =
            parse_import(&body).ok_or_else(|| ProtocolError::malformed(Mode::Import, body))?;
        debug!(in_progress = status.in_progress(), "import status");
        Ok(status)
    }

    /// Deactivates records missing from a full upload (`mode=deactivate`).
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::MissingSession`] without sending a request if
    /// the session id or timestamp is empty, a transport error, or
    /// [`ProtocolError::ServerStatus`] for non-200 responses. Any 200 body is
    /// accepted.
    #[instrument(skip(self), fields(mode = %Mode::Deactivate))]
    pub async fn deactivate(&self) -> Result<(), ProtocolError> {
        if self.session.session_id().is_empty() {
            return Err(ProtocolError::missing_session(Mode::Deactivate, "sessid"));
        }
        if self.session.timestamp().is_empty() {
            return Err(ProtocolError::missing_session(Mode::Deactivate, "timestamp"));
        }

        let request = self.request(
            Mode::Deactivate,
            &[("timestamp", self.session.timestamp())],
        );
        self.send(Mode::Deactivate, request).await?;
        info!("stale records deactivated");
        Ok(())
    }

    /// Signals that the exchange is complete (`mode=complete`).
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::MissingSession`] without sending a request if
    /// the session id is empty, a transport error, or
    /// [`ProtocolError::ServerStatus`] for non-200 responses. Any 200 body is
    /// accepted.
    #[instrument(skip(self), fields(mode = %Mode::Complete))]
    pub async fn complete(&self) -> Result<(), ProtocolError> {
        if self.session.session_id().is_empty() {
            return Err(ProtocolError::missing_session(Mode::Complete, "sessid"));
        }

        let request = self.request(Mode::Complete, &[]);
        self.send(Mode::Complete, request).await?;
        info!("exchange completion signalled");
        Ok(())
    }

    /// Builds the query URL: `type`, `mode`, step parameters, then `sessid` once known.
    fn request_url(&self, mode: Mode, params: &[(&str, &str)]) -> Url {
        let mut url = self.endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("type", self.exchange_type.as_str())
                .append_pair("mode", mode.as_str());
            for (name, value) in params {
                query.append_pair(name, value);
            }
            if !self.session.session_id().is_empty() {
                query.append_pair("sessid", self.session.session_id());
            }
        }
        url
    }

    /// Builds a bodiless GET for `mode`.
    fn request(&self, mode: Mode, params: &[(&str, &str)]) -> RequestBuilder {
        self.with_cookie(self.client.get(self.request_url(mode, params)))
    }

    fn with_cookie(&self, request: RequestBuilder) -> RequestBuilder {
        match self.session.cookie_header() {
            Some(cookie) => request.header(COOKIE, cookie),
            None => request,
        }
    }

    /// Sends `request`, requires HTTP 200 and returns the decoded body.
    async fn send(&self, mode: Mode, request: RequestBuilder) -> Result<String, ProtocolError> {
        debug!("sending exchange request");
        let response = request
            .send()
            .await
            .map_err(|error| ProtocolError::transport(mode, error))?;
        check_status(mode, &response)?;
        read_body(mode, response).await
    }
}

fn check_status(mode: Mode, response: &Response) -> Result<(), ProtocolError> {
    let status = response.status();
    if status == StatusCode::OK {
        return Ok(());
    }
    warn!(status = status.as_u16(), "exchange step rejected by site");
    Err(ProtocolError::server_status(mode, status.as_u16()))
}

/// Reads the body as text, transcoding from the declared charset.
///
/// Unknown or missing charsets fall back to lossy UTF-8, so decoding never
/// fails on its own; only a broken body stream is an error.
async fn read_body(mode: Mode, response: Response) -> Result<String, ProtocolError> {
    response
        .text_with_charset("utf-8")
        .await
        .map_err(|error| ProtocolError::transport(mode, error))
}

async fn join_producer<R>(
    producer: JoinHandle<Result<R, PieceError<R>>>,
) -> Result<R, PieceError<R>> {
    producer
        .await
        .map_err(|join_error| PieceError::Source(std::io::Error::other(join_error.to_string())))?
}

fn base_client_builder(connect_timeout_secs: u64, read_timeout_secs: u64) -> ClientBuilder {
    Client::builder()
        .connect_timeout(Duration::from_secs(connect_timeout_secs))
        .timeout(Duration::from_secs(read_timeout_secs))
        .gzip(true)
        .user_agent(user_agent::default_exchange_user_agent())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Cursor;

    use crate::protocol::session::SessionCookie;
    use crate::test_support::socket_guard::start_mock_server_or_skip;
    use wiremock::matchers::{method, path, query_param, query_param_is_missing};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const EXCHANGE_PATH: &str = "/1c_exchange.php";

    fn client_for(server: &MockServer) -> ExchangeClient {
        let endpoint = Url::parse(&format!("{}{EXCHANGE_PATH}", server.uri())).unwrap();
        ExchangeClient::new(endpoint, ExchangeType::Catalog).unwrap()
    }

    fn offline_client() -> ExchangeClient {
        // Port 9 (discard) is never contacted: precondition checks fail first.
        let endpoint = Url::parse("http://127.0.0.1:9/1c_exchange.php").unwrap();
        ExchangeClient::new(endpoint, ExchangeType::Catalog).unwrap()
    }

    #[test]
    fn test_request_url_carries_type_mode_and_params() {
        let client = offline_client();
        let url = client.request_url(Mode::Import, &[("filename", "import 1.xml")]);
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("type".to_string(), "catalog".to_string()),
                ("mode".to_string(), "import".to_string()),
                ("filename".to_string(), "import 1.xml".to_string()),
            ]
        );
        assert_eq!(url.path(), EXCHANGE_PATH);
    }

    #[test]
    fn test_request_url_appends_sessid_once_known() {
        let mut client = offline_client();
        client.session = Session::established(SessionCookie::new("c", "v"), "aaqq", "");
        let url = client.request_url(Mode::Init, &[]);
        assert!(
            url.query_pairs()
                .any(|(name, value)| name == "sessid" && value == "aaqq")
        );
    }

    #[tokio::test]
    async fn test_deactivate_requires_sessid_and_timestamp() {
        let mut client = offline_client();

        let error = client.deactivate().await.unwrap_err();
        assert!(matches!(
            error,
            ProtocolError::MissingSession { field: "sessid", .. }
        ));

        client.session = Session::established(SessionCookie::new("c", "v"), "aaqq", "");
        let error = client.deactivate().await.unwrap_err();
        assert!(matches!(
            error,
            ProtocolError::MissingSession { field: "timestamp", .. }
        ));
    }

    #[tokio::test]
    async fn test_complete_requires_sessid() {
        let client = offline_client();
        let error = client.complete().await.unwrap_err();
        assert!(error.is_precondition());
        assert_eq!(error.step(), Some(Mode::Complete));
    }

    #[tokio::test]
    async fn test_deactivate_sends_sessid_and_timestamp() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path(EXCHANGE_PATH))
            .and(query_param("mode", "deactivate"))
            .and(query_param("type", "catalog"))
            .and(query_param("sessid", "aaqq"))
            .and(query_param("timestamp", "123456"))
            .respond_with(ResponseTemplate::new(200).set_body_string(""))
            .expect(1)
            .mount(&server)
            .await;

        let mut client = client_for(&server);
        client.session = Session::established(SessionCookie::new("c", "v"), "aaqq", "123456");
        client.deactivate().await.unwrap();
    }

    #[tokio::test]
    async fn test_complete_accepts_any_200_body() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path(EXCHANGE_PATH))
            .and(query_param("mode", "complete"))
            .and(query_param("sessid", "aaqq"))
            .respond_with(ResponseTemplate::new(200).set_body_string("whatever the site says"))
            .expect(1)
            .mount(&server)
            .await;

        let mut client = client_for(&server);
        client.session = Session::established(SessionCookie::new("c", "v"), "aaqq", "");
        client.complete().await.unwrap();
    }

    #[tokio::test]
    async fn test_complete_server_error() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path(EXCHANGE_PATH))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let mut client = client_for(&server);
        client.session = Session::established(SessionCookie::new("c", "v"), "aaqq", "");
        let error = client.complete().await.unwrap_err();
        assert!(matches!(
            error,
            ProtocolError::ServerStatus {
                step: Mode::Complete,
                status: 500
            }
        ));
    }

    #[tokio::test]
    async fn test_import_without_session_omits_sessid() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path(EXCHANGE_PATH))
            .and(query_param("mode", "import"))
            .and(query_param("filename", "hw.txt"))
            .and(query_param_is_missing("sessid"))
            .respond_with(ResponseTemplate::new(200).set_body_string("progress\nsometail"))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let status = client.trigger_import("hw.txt").await.unwrap();
        assert!(status.in_progress());
    }

    #[tokio::test]
    async fn test_upload_sends_cookie_header() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("POST"))
            .and(path(EXCHANGE_PATH))
            .and(query_param("mode", "file"))
            .and(wiremock::matchers::header("Cookie", "cookiename=cookievalue"))
            .respond_with(ResponseTemplate::new(200).set_body_string("success"))
            .expect(1)
            .mount(&server)
            .await;

        let mut client = client_for(&server);
        client.session =
            Session::established(SessionCookie::new("cookiename", "cookievalue"), "", "");
        client
            .upload(Cursor::new(b"helloworld".to_vec()), 5, "hw.txt")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_cp1251_error_body_is_transcoded() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        // "Ошибка" in windows-1251
        let body: &[u8] = &[0xCE, 0xF8, 0xE8, 0xE1, 0xEA, 0xE0];
        Mock::given(method("GET"))
            .and(path(EXCHANGE_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(body.to_vec(), "text/plain; charset=windows-1251"),
            )
            .mount(&server)
            .await;

        let client = client_for(&server);
        let error = client.trigger_import("import.xml").await.unwrap_err();
        match error {
            ProtocolError::MalformedResponse { body, .. } => assert_eq!(body, "Ошибка"),
            other => panic!("Expected MalformedResponse, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unknown_charset_falls_back_to_raw_text() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path(EXCHANGE_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(b"success\ntail".to_vec(), "text/plain; charset=x-bogus"),
            )
            .mount(&server)
            .await;

        let client = client_for(&server);
        let status = client.trigger_import("import.xml").await.unwrap();
        assert_eq!(status, ImportStatus::Finished);
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        let client = {
            let endpoint = Url::parse("http://127.0.0.1:1/1c_exchange.php").unwrap();
            ExchangeClient::with_timeouts(endpoint, ExchangeType::Sales, 2, 5).unwrap()
        };
        let error = client.negotiate().await.unwrap_err();
        assert!(
            matches!(
                error,
                ProtocolError::Transport { step: Mode::Init, .. }
                    | ProtocolError::Timeout { step: Mode::Init }
            ),
            "got: {error:?}"
        );
    }
}
