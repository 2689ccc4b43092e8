//! Encoding of request payloads.

use bytes::{BufMut as _, Bytes, BytesMut};
use futures_core::Stream;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderValue};
use serde::Serialize;

use crate::body::Body;
use crate::client::Error;
use crate::BoxError;

const APPLICATION_JSON: &str = "application/json";
const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";
const MULTIPART_FORM_DATA: &str = "multipart/form-data";

/// The body of a request, before encoding.
#[derive(Debug)]
pub enum Payload {
    /// Raw bytes, sent verbatim.
    Bytes(Bytes),

    /// A JSON document, sent as `application/json`.
    Json(serde_json::Value),

    /// Form fields, sent URL-encoded, or as multipart when the request
    /// already declares a `multipart/form-data` content type.
    Form(Form),

    /// A multipart form.
    Multipart(Multipart),

    /// A stream of chunks, forwarded as they are produced.
    Stream(Body),
}

impl Payload {
    /// Serialize any value into a JSON payload.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, Error> {
        serde_json::to_value(value)
            .map(Payload::Json)
            .map_err(|error| Error::Encode(error.into()))
    }

    /// A payload produced by a stream of byte chunks.
    pub fn stream<S, E>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, E>> + Send + 'static,
        E: Into<BoxError> + 'static,
    {
        Payload::Stream(Body::wrap_stream(stream))
    }

    /// Duplicate this payload. Streams can only be sent once and are not
    /// duplicated.
    pub fn try_clone(&self) -> Option<Self> {
        match self {
            Payload::Bytes(bytes) => Some(Payload::Bytes(bytes.clone())),
            Payload::Json(value) => Some(Payload::Json(value.clone())),
            Payload::Form(form) => Some(Payload::Form(form.clone())),
            Payload::Multipart(multipart) => Some(Payload::Multipart(multipart.clone())),
            Payload::Stream(body) => body.try_clone().map(Payload::Stream),
        }
    }

    /// Returns true if this payload is a stream.
    pub fn is_stream(&self) -> bool {
        matches!(self, Payload::Stream(_))
    }
}

impl From<Bytes> for Payload {
    fn from(bytes: Bytes) -> Self {
        Payload::Bytes(bytes)
    }
}

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        Payload::Json(value)
    }
}

impl From<Form> for Payload {
    fn from(form: Form) -> Self {
        Payload::Form(form)
    }
}

impl From<Multipart> for Payload {
    fn from(multipart: Multipart) -> Self {
        Payload::Multipart(multipart)
    }
}

/// Ordered, multi-valued form fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Form {
    fields: Vec<(String, String)>,
}

impl Form {
    /// Create an empty form.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field.
    pub fn add(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    /// Replace every value of a field.
    pub fn set(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.fields.retain(|(n, _)| *n != name);
        self.fields.push((name, value.into()));
        self
    }

    /// The first value of a field.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Iterate over the fields in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    fn to_urlencoded(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.fields.iter())
            .finish()
    }
}

impl<K, V> FromIterator<(K, V)> for Form
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// One part of a multipart form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    name: String,
    filename: Option<String>,
    content_type: Option<String>,
    data: Bytes,
}

impl Part {
    /// A plain text field.
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            filename: None,
            content_type: None,
            data: Bytes::from(value.into()),
        }
    }

    /// A file upload.
    pub fn file(
        name: impl Into<String>,
        filename: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        Self {
            name: name.into(),
            filename: Some(filename.into()),
            content_type: Some(content_type.into()),
            data: data.into(),
        }
    }
}

/// A `multipart/form-data` form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Multipart {
    boundary: String,
    parts: Vec<Part>,
}

impl Default for Multipart {
    fn default() -> Self {
        Self::new()
    }
}

impl Multipart {
    /// Create an empty form with a random boundary.
    pub fn new() -> Self {
        Self::with_boundary(format!("hyperwire-{:016x}", rand::random::<u64>()))
    }

    /// Create an empty form with a fixed boundary.
    pub fn with_boundary(boundary: impl Into<String>) -> Self {
        Self {
            boundary: boundary.into(),
            parts: Vec::new(),
        }
    }

    /// Append a part.
    pub fn part(mut self, part: Part) -> Self {
        self.parts.push(part);
        self
    }

    /// The boundary separating parts.
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// The `Content-Type` header value announcing this form's boundary.
    pub fn content_type(&self) -> String {
        format!("{}; boundary={}", MULTIPART_FORM_DATA, self.boundary)
    }

    fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::new();
        for part in &self.parts {
            let mut head = format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"",
                self.boundary,
                escape_quoted(&part.name)
            );
            if let Some(filename) = &part.filename {
                head.push_str(&format!("; filename=\"{}\"", escape_quoted(filename)));
            }
            head.push_str("\r\n");
            if let Some(content_type) = &part.content_type {
                head.push_str(&format!("Content-Type: {content_type}\r\n"));
            }
            head.push_str("\r\n");

            buf.put_slice(head.as_bytes());
            buf.put_slice(&part.data);
            buf.put_slice(b"\r\n");
        }
        buf.put_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        buf.freeze()
    }
}

impl From<Form> for Multipart {
    fn from(form: Form) -> Self {
        form.fields
            .into_iter()
            .fold(Multipart::new(), |multipart, (name, value)| {
                multipart.part(Part::text(name, value))
            })
    }
}

fn escape_quoted(value: &str) -> String {
    value
        .replace('"', "%22")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

fn is_multipart(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| {
            value
                .trim_start()
                .to_ascii_lowercase()
                .starts_with(MULTIPART_FORM_DATA)
        })
        .unwrap_or(false)
}

fn header_value(value: &str) -> Result<HeaderValue, Error> {
    HeaderValue::from_str(value).map_err(|error| Error::Encode(error.into()))
}

/// Encode a payload into a body, setting `Content-Type` on `headers` when
/// the request does not already declare one.
///
/// Multipart bodies always carry their boundary in the header, so they
/// replace any declared content type.
pub(crate) fn encode(payload: Payload, headers: &mut HeaderMap) -> Result<Body, Error> {
    match payload {
        Payload::Bytes(bytes) => Ok(Body::full(bytes)),
        Payload::Json(value) => {
            let bytes = serde_json::to_vec(&value).map_err(|error| Error::Encode(error.into()))?;
            headers
                .entry(CONTENT_TYPE)
                .or_insert(HeaderValue::from_static(APPLICATION_JSON));
            Ok(Body::full(bytes))
        }
        Payload::Form(form) if is_multipart(headers) => {
            encode(Payload::Multipart(form.into()), headers)
        }
        Payload::Form(form) => {
            headers
                .entry(CONTENT_TYPE)
                .or_insert(HeaderValue::from_static(FORM_URLENCODED));
            Ok(Body::full(form.to_urlencoded()))
        }
        Payload::Multipart(multipart) => {
            headers.insert(CONTENT_TYPE, header_value(&multipart.content_type())?);
            Ok(Body::full(multipart.to_bytes()))
        }
        Payload::Stream(body) => Ok(body),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use http_body_util::BodyExt as _;

    async fn encoded(payload: Payload, headers: &mut HeaderMap) -> Bytes {
        let body = encode(payload, headers).unwrap();
        body.collect().await.unwrap().to_bytes()
    }

    #[tokio::test]
    async fn json_sets_content_type() {
        let mut headers = HeaderMap::new();
        let value = serde_json::json!({"wine": "Chateauneuf Du Pape", "cheese": "roquefort"});
        let bytes = encoded(Payload::Json(value.clone()), &mut headers).await;

        assert_eq!(headers.get(CONTENT_TYPE).unwrap(), APPLICATION_JSON);
        let decoded: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(decoded, value);
    }

    #[tokio::test]
    async fn declared_content_type_is_kept() {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/vnd.api+json"),
        );
        encoded(Payload::Json(serde_json::json!([0, 1, 2])), &mut headers).await;

        assert_eq!(
            headers.get(CONTENT_TYPE).unwrap(),
            "application/vnd.api+json"
        );
    }

    #[tokio::test]
    async fn bytes_do_not_imply_content_type() {
        let mut headers = HeaderMap::new();
        let bytes = encoded(Payload::Bytes(Bytes::from_static(b"\x00\x01")), &mut headers).await;

        assert!(headers.get(CONTENT_TYPE).is_none());
        assert_eq!(&bytes[..], b"\x00\x01");
    }

    #[tokio::test]
    async fn form_is_urlencoded() {
        let mut headers = HeaderMap::new();
        let form = Form::new().add("param1", "param1_value").add("q", "a b&c");
        let bytes = encoded(Payload::Form(form), &mut headers).await;

        assert_eq!(headers.get(CONTENT_TYPE).unwrap(), FORM_URLENCODED);
        assert_eq!(&bytes[..], b"param1=param1_value&q=a+b%26c");
    }

    #[tokio::test]
    async fn form_becomes_multipart_when_declared() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("multipart/form-data"));
        let form = Form::new().add("param1", "param1_value");
        let bytes = encoded(Payload::Form(form), &mut headers).await;

        let content_type = headers.get(CONTENT_TYPE).unwrap().to_str().unwrap();
        let boundary = content_type
            .strip_prefix("multipart/form-data; boundary=")
            .unwrap();

        let expected = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"param1\"\r\n\r\nparam1_value\r\n--{b}--\r\n",
            b = boundary
        );
        assert_eq!(bytes, Bytes::from(expected));
    }

    #[tokio::test]
    async fn multipart_file_parts() {
        let mut headers = HeaderMap::new();
        let multipart = Multipart::with_boundary("XyZ").part(Part::file(
            "upload",
            "a\"b.txt",
            "text/plain",
            "contents",
        ));
        let bytes = encoded(Payload::Multipart(multipart), &mut headers).await;

        assert_eq!(
            headers.get(CONTENT_TYPE).unwrap(),
            "multipart/form-data; boundary=XyZ"
        );
        assert_eq!(
            bytes,
            Bytes::from_static(
                b"--XyZ\r\nContent-Disposition: form-data; name=\"upload\"; filename=\"a%22b.txt\"\r\nContent-Type: text/plain\r\n\r\ncontents\r\n--XyZ--\r\n"
            )
        );
    }

    #[test]
    fn serializable_values_become_json() {
        #[derive(Serialize)]
        struct WineAndCheese {
            wine: &'static str,
            cheese: &'static str,
        }

        let payload = Payload::json(&WineAndCheese {
            wine: "Condrieu",
            cheese: "Goat Cheese",
        })
        .unwrap();

        match payload {
            Payload::Json(value) => assert_eq!(
                value,
                serde_json::json!({"wine": "Condrieu", "cheese": "Goat Cheese"})
            ),
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn streams_are_not_cloned() {
        let stream = futures_util::stream::iter(vec![Ok::<_, BoxError>(Bytes::from("a"))]);
        assert!(Payload::stream(stream).try_clone().is_none());
        assert!(Payload::Bytes(Bytes::from("a")).try_clone().is_some());
    }
}
