//! Wire envelope types.
//!
//! One envelope is one discrete unit exchanged between client and server:
//! a routed text message, a routed file transfer, or a logout notice.

use crate::error::{RelayError, RelayResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Routing mode for an envelope.
///
/// Name matching for `Unicast` and `Blockcast` is case-insensitive and may
/// match more than one session, since display names are never checked for
/// uniqueness at handshake time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    /// Deliver to every other connected identity.
    Broadcast,
    /// Deliver to the named identity.
    Unicast { target: String },
    /// Deliver to everyone except the sender and the named identity.
    Blockcast { exclude: String },
    /// End the sender's session. Nothing is delivered.
    Logout,
}

/// Envelope payload: a text chat message or a file transfer.
///
/// File payloads carry the base name only, never a path, and do not embed
/// sender attribution; text payloads get the `@sender:` prefix added by the
/// server on delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Payload {
    Text(String),
    File { name: String, bytes: Vec<u8> },
}

/// One discrete unit of data exchanged between client and server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub route: Route,
    pub payload: Payload,
}

impl Envelope {
    /// Build a text envelope.
    pub fn text(route: Route, text: impl Into<String>) -> Self {
        Self {
            route,
            payload: Payload::Text(text.into()),
        }
    }

    /// Build a file envelope from a filesystem path.
    ///
    /// Loads the file's full contents and reduces the path to its final
    /// component for the payload name.
    pub fn file_from_path(route: Route, path: &Path) -> RelayResult<Self> {
        let name = path
            .file_name()
            .ok_or_else(|| {
                RelayError::InvalidMessage(format!("not a file path: {}", path.display()))
            })?
            .to_string_lossy()
            .into_owned();
        let bytes = std::fs::read(path)?;
        Ok(Self {
            route,
            payload: Payload::File { name, bytes },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn file_from_path_keeps_base_name_only() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("report.txt");
        std::fs::create_dir_all(path.parent().unwrap()).expect("mkdir");
        let mut file = std::fs::File::create(&path).expect("create");
        file.write_all(b"quarterly numbers").expect("write");

        let envelope = Envelope::file_from_path(Route::Broadcast, &path).expect("envelope");
        match envelope.payload {
            Payload::File { name, bytes } => {
                assert_eq!(name, "report.txt");
                assert_eq!(bytes, b"quarterly numbers");
            }
            Payload::Text(_) => panic!("expected file payload"),
        }
    }

    #[test]
    fn file_from_path_rejects_missing_file() {
        let result = Envelope::file_from_path(Route::Broadcast, Path::new("/no/such/file.bin"));
        assert!(result.is_err());
    }
}
