//! Per-request context: the parsed request plus path parameters captured by
//! the router.

use std::collections::HashMap;

use crate::Request;

/// Path parameters extracted from the matched route.
#[derive(Default, Debug, Clone)]
pub struct PathParams {
    map: HashMap<String, String>,
}

impl PathParams {
    /// Create a new empty parameters map
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value into the parameters map
    pub fn insert(&mut self, key: String, value: String) {
        self.map.insert(key, value);
    }

    /// Get a value from the parameters map
    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(String::as_str)
    }
}

/// Per-request context handed to route handlers and middleware.
#[derive(Debug)]
pub struct Context {
    request: Request,
    params: PathParams,
}

impl Context {
    /// Create a new context from a request, with no path parameters
    pub fn new(request: Request) -> Self {
        Self::with_params(request, PathParams::new())
    }

    /// Create a context carrying the parameters captured by a route match
    pub fn with_params(request: Request, params: PathParams) -> Self {
        Self { request, params }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn params(&self) -> &PathParams {
        &self.params
    }

    /// Gives the request back, dropping any captured parameters.
    pub fn into_request(self) -> Request {
        self.request
    }

    /// Deserializes the request body as JSON.
    pub fn json<T>(&self) -> Result<T, serde_json::Error>
    where
        T: serde::de::DeserializeOwned,
    {
        serde_json::from_slice(self.request.body())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Payload {
        id: Option<String>,
        data: String,
    }

    fn request(raw: &str) -> Request {
        let (req, _) = Request::parse(raw.as_bytes()).unwrap();
        req
    }

    #[test]
    fn decodes_json_body() {
        let ctx = Context::new(request(
            "POST /api/enqueue HTTP/1.1\r\nContent-Length: 14\r\n\r\n{\"data\":\"job\"}",
        ));
        let payload: Payload = ctx.json().unwrap();
        assert_eq!(payload.data, "job");
        assert!(payload.id.is_none());
    }

    #[test]
    fn invalid_json_is_an_error() {
        let ctx = Context::new(request(
            "POST /api/enqueue HTTP/1.1\r\nContent-Length: 3\r\n\r\n{x}",
        ));
        assert!(ctx.json::<Payload>().is_err());
    }

    #[test]
    fn params_lookup() {
        let mut params = PathParams::new();
        params.insert("id".into(), "42".into());
        let ctx = Context::with_params(request("GET / HTTP/1.1\r\n\r\n"), params);
        assert_eq!(ctx.params().get("id"), Some("42"));
        assert_eq!(ctx.params().get("other"), None);
        assert_eq!(ctx.into_request().path(), "/");
    }
}
