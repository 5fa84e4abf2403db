//! Request and response shapes for the service's endpoints.
//!
//! Routing and body parsing happen outside this crate. These types carry the
//! parsed inputs in and the wire-relevant outputs (including response
//! headers) back out.

use bytes::Bytes;

use lockbox_access::Access;
use lockbox_core::{File, UploadMetadata};

/// Response header carrying the requester's wrapped content key.
pub const HEADER_WRAPPED_KEY: &str = "X-Wrapped-Key";

/// Response header carrying the file's client-side encryption metadata.
pub const HEADER_FILE_METADATA: &str = "X-File-Metadata";

/// Response header naming the downloaded file.
pub const HEADER_CONTENT_DISPOSITION: &str = "Content-Disposition";

/// An upload: ciphertext plus the parameters needed to decrypt it.
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub content: Bytes,
    pub metadata: UploadMetadata,
}

/// A share: the recipient, and the file's content key already wrapped for
/// them by the owner's client.
#[derive(Debug, Clone)]
pub struct ShareRequest {
    pub recipient_email: String,
    pub wrapped_key: String,
}

/// A successful download.
#[derive(Debug, Clone)]
pub struct Download {
    pub file: File,
    pub content: Bytes,
    pub access: Access,
}

impl Download {
    /// The wrapped key, when access came through a grant.
    pub fn wrapped_key(&self) -> Option<&str> {
        match &self.access {
            Access::Grantee { wrapped_key } => Some(wrapped_key),
            _ => None,
        }
    }

    /// Response headers for this download.
    ///
    /// `X-File-Metadata` is always present; `X-Wrapped-Key` only for a
    /// grantee. The owner holds their content key client-side.
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = vec![
            (
                HEADER_CONTENT_DISPOSITION,
                format!(
                    "attachment; filename=\"{}\"",
                    self.file.filename.replace(['"', '\\', '\r', '\n'], "_")
                ),
            ),
            (HEADER_FILE_METADATA, self.file.encrypted_metadata.clone()),
        ];

        if let Some(key) = self.wrapped_key() {
            headers.push((HEADER_WRAPPED_KEY, key.to_string()));
        }

        headers
    }
}
