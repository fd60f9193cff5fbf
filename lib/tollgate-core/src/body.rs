//! Request body encoding and response body decoding.

use bytes::Bytes;

use crate::Result;

/// Content type of an encoded request body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentType {
    /// `application/json`
    Json,
    /// `application/x-www-form-urlencoded`
    FormUrlEncoded,
    /// `application/octet-stream`
    OctetStream,
}

impl ContentType {
    /// MIME type string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::FormUrlEncoded => "application/x-www-form-urlencoded",
            Self::OctetStream => "application/octet-stream",
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Encode a value as a JSON body.
///
/// # Example
///
/// ```
/// use tollgate_core::to_json;
///
/// #[derive(serde::Serialize)]
/// struct Refresh<'a> { refresh_token: &'a str }
///
/// let body = to_json(&Refresh { refresh_token: "r-1" }).expect("encode");
/// assert_eq!(body.as_ref(), br#"{"refresh_token":"r-1"}"#);
/// ```
pub fn to_json<T: serde::Serialize>(value: &T) -> Result<Bytes> {
    Ok(Bytes::from(serde_json::to_vec(value)?))
}

/// Encode a value as a form URL-encoded body.
///
/// Sequences become repeated keys (`scope=a&scope=b`).
pub fn to_form<T: serde::Serialize>(value: &T) -> Result<Bytes> {
    Ok(Bytes::from(serde_html_form::to_string(value)?))
}

/// Decode a JSON body, reporting the path of the field that failed.
pub fn from_json<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let mut deserializer = serde_json::Deserializer::from_slice(bytes);
    serde_path_to_error::deserialize(&mut deserializer).map_err(|err| {
        crate::Error::json_deserialization(err.path().to_string(), err.inner().to_string())
    })
}
