use std::{ops::Deref, sync::Arc};

use reqwest::{
    header::{HeaderMap, CONTENT_LENGTH, COOKIE, HOST, ORIGIN, REFERER, USER_AGENT},
    Client, ClientBuilder, IntoUrl,
};
use reqwest_cookie_store::{CookieStore, CookieStoreMutex};

/// Headers that must never be replayed from the captured page request.
/// Credentials travel through the cookie store instead.
const SENSITIVE_HEADERS: [reqwest::header::HeaderName; 6] =
    [COOKIE, REFERER, USER_AGENT, HOST, ORIGIN, CONTENT_LENGTH];

/// A `reqwest::Client` with an attached cookie store, so that responses
/// may set cookies for the target origin and later requests send them
/// back, the way an in-browser fetch would.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    cookies_store: Arc<CookieStoreMutex>,
}

impl HttpClient {
    pub fn new(builder: ClientBuilder) -> Self {
        let cookies_store = Arc::new(CookieStoreMutex::new(CookieStore::default()));
        let client = builder
            .cookie_provider(cookies_store.clone())
            .build()
            .unwrap();

        Self {
            client,
            cookies_store,
        }
    }

    /// Seeds caller-provided cookies into the store for `url`'s origin.
    pub fn add_cookies(&self, cookies: Vec<String>, url: impl IntoUrl) {
        let url = url.into_url().unwrap();
        let mut lock = self.cookies_store.lock().unwrap();
        for cookie in cookies {
            _ = lock.parse(&cookie, &url);
        }
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new(Client::builder())
    }
}

impl Deref for HttpClient {
    type Target = Client;

    fn deref(&self) -> &Self::Target {
        &self.client
    }
}

/// Strips credential-sensitive headers from a caller-supplied header map
/// before it becomes the client's default headers.
pub fn sanitize_headers(headers: &HeaderMap) -> HeaderMap {
    let mut sanitized = headers.clone();
    for name in SENSITIVE_HEADERS {
        sanitized.remove(name);
    }
    sanitized
}
