//! Opaque keyset cursors.
//!
//! A cursor is any serialisable key (typically the last row's sort column and
//! primary key) rendered as JSON and then URL-safe base64 without padding, so
//! clients can pass it back verbatim in a query string.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Failures while encoding or decoding a cursor.
#[derive(Debug, thiserror::Error)]
pub enum CursorError {
    /// The key could not be serialised.
    #[error("failed to encode cursor: {message}")]
    Encode {
        /// Underlying error description.
        message: String,
    },
    /// The token is not valid base64.
    #[error("cursor is not valid base64: {message}")]
    Base64 {
        /// Underlying error description.
        message: String,
    },
    /// The decoded bytes do not describe the expected key.
    #[error("cursor payload is malformed: {message}")]
    Payload {
        /// Underlying error description.
        message: String,
    },
}

/// Typed wrapper around an opaque cursor key.
///
/// # Examples
/// ```
/// use pagination::Cursor;
///
/// let token = Cursor::new((42_u64, "b".to_owned())).encode().expect("encode");
/// let decoded: Cursor<(u64, String)> = Cursor::decode(&token).expect("decode");
/// assert_eq!(decoded.key().0, 42);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor<K> {
    key: K,
}

impl<K> Cursor<K> {
    /// Wrap a key.
    pub const fn new(key: K) -> Self {
        Self { key }
    }

    /// Borrow the key.
    pub const fn key(&self) -> &K {
        &self.key
    }

    /// Unwrap the key.
    pub fn into_key(self) -> K {
        self.key
    }
}

impl<K: Serialize> Cursor<K> {
    /// Render the cursor as an opaque token.
    ///
    /// # Errors
    ///
    /// Returns [`CursorError::Encode`] when the key cannot be serialised.
    pub fn encode(&self) -> Result<String, CursorError> {
        let bytes = serde_json::to_vec(&self.key).map_err(|err| CursorError::Encode {
            message: err.to_string(),
        })?;
        Ok(URL_SAFE_NO_PAD.encode(bytes))
    }
}

impl<K: DeserializeOwned> Cursor<K> {
    /// Parse a token produced by [`Cursor::encode`].
    ///
    /// # Errors
    ///
    /// Returns [`CursorError::Base64`] for tokens that are not base64 and
    /// [`CursorError::Payload`] when the JSON does not match `K`.
    pub fn decode(token: &str) -> Result<Self, CursorError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(token.trim())
            .map_err(|err| CursorError::Base64 {
                message: err.to_string(),
            })?;
        let key = serde_json::from_slice(&bytes).map_err(|err| CursorError::Payload {
            message: err.to_string(),
        })?;
        Ok(Self { key })
    }
}
