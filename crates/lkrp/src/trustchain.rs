//! Trustchains: the block streams that make up one key-ring.
//!
//! A trustchain maps a logical path to a block stream. `m/` holds the root
//! stream; `m/{appId}'` holds the stream of one application. Streams are
//! built on first access and their parsing is memoized by [`BlockStream`].
//! A trustchain is immutable: [`Trustchain::with_stream`] returns a new one.

use bytes::Bytes;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};

use lkrp_core::{BlockHash, BlockStream, CryptoService, KeyPair, PublishedKey};

use crate::config::TrustchainConfig;
use crate::error::{KeyringError, Result};

/// Path of the root stream.
pub const ROOT_PATH: &str = "m/";

/// Path of the stream belonging to `app_id`.
pub fn app_path(app_id: u32) -> String {
    format!("m/{app_id}'")
}

#[derive(Clone)]
struct LazyStream {
    bytes: Bytes,
    stream: OnceLock<BlockStream>,
}

/// A named collection of block streams keyed by path.
#[derive(Clone)]
pub struct Trustchain {
    id: String,
    crypto: Arc<dyn CryptoService>,
    config: TrustchainConfig,
    streams: BTreeMap<String, LazyStream>,
}

impl Trustchain {
    /// Create a trustchain from raw stream bytes. Nothing is validated.
    pub fn new<I, K, V>(
        crypto: Arc<dyn CryptoService>,
        id: impl Into<String>,
        streams: I,
        config: TrustchainConfig,
    ) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Bytes>,
    {
        let streams = streams
            .into_iter()
            .map(|(path, bytes)| {
                let entry = LazyStream {
                    bytes: bytes.into(),
                    stream: OnceLock::new(),
                };
                (path.into(), entry)
            })
            .collect();
        Self {
            id: id.into(),
            crypto,
            config,
            streams,
        }
    }

    /// Create a trustchain from a path to hex map. Nothing is validated.
    pub fn from_hex_map(
        crypto: Arc<dyn CryptoService>,
        id: impl Into<String>,
        streams: BTreeMap<String, String>,
        config: TrustchainConfig,
    ) -> Result<Self> {
        let mut decoded = Vec::with_capacity(streams.len());
        for (path, hex_stream) in streams {
            match hex::decode(&hex_stream) {
                Ok(bytes) => decoded.push((path, bytes)),
                Err(source) => return Err(KeyringError::InvalidHex { path, source }),
            }
        }
        Ok(Self::new(crypto, id, decoded, config))
    }

    /// Load a trustchain from a server response of the form
    /// `{ "m/": "<hex>", "m/16'": "<hex>" }`.
    ///
    /// With `validate_on_load` set, every stream must parse and link up.
    pub async fn from_response(
        crypto: Arc<dyn CryptoService>,
        id: impl Into<String>,
        json: &str,
        config: TrustchainConfig,
    ) -> Result<Self> {
        let id = id.into();
        let streams: BTreeMap<String, String> = serde_json::from_str(json).map_err(|e| {
            warn!(trustchain = %id, error = %e, "unreadable trustchain response");
            e
        })?;
        let chain = Self::from_hex_map(crypto, id, streams, config)?;
        if chain.config.validate_on_load {
            chain.validate().await?;
        }
        debug!(trustchain = %chain.id, streams = chain.streams.len(), "trustchain loaded");
        Ok(chain)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> &TrustchainConfig {
        &self.config
    }

    pub fn crypto(&self) -> &Arc<dyn CryptoService> {
        &self.crypto
    }

    /// Stream paths in sorted order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.streams.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// The stream at `path`, if the trustchain has one.
    pub fn stream(&self, path: &str) -> Option<&BlockStream> {
        let entry = self.streams.get(path)?;
        Some(
            entry
                .stream
                .get_or_init(|| BlockStream::new(self.crypto.clone(), entry.bytes.clone())),
        )
    }

    pub fn root_stream(&self) -> Option<&BlockStream> {
        self.stream(ROOT_PATH)
    }

    pub fn app_stream(&self, app_id: u32) -> Option<&BlockStream> {
        self.stream(&app_path(app_id))
    }

    /// A new trustchain with the stream at `path` added or replaced.
    pub fn with_stream(&self, path: impl Into<String>, stream: &BlockStream) -> Self {
        let mut next = self.clone();
        next.streams.insert(
            path.into(),
            LazyStream {
                bytes: stream.to_bytes(),
                stream: OnceLock::new(),
            },
        );
        next
    }

    /// Check that every stream parses and is continuous. The root stream
    /// must also start at the configured root parent, when one is set.
    pub async fn validate(&self) -> Result<()> {
        for path in self.streams.keys() {
            let Some(stream) = self.stream(path) else {
                continue;
            };
            if let Err(source) = stream.parse() {
                warn!(trustchain = %self.id, path = %path, error = %source, "malformed stream");
                return Err(KeyringError::MalformedStream {
                    path: path.clone(),
                    source,
                });
            }
            let expected = self.expected_parent(path);
            if !stream.validate(expected.as_ref().map(|h| h.as_bytes().as_slice())).await {
                warn!(trustchain = %self.id, path = %path, "stream failed validation");
                return Err(KeyringError::InvalidStream { path: path.clone() });
            }
        }
        Ok(())
    }

    fn expected_parent(&self, path: &str) -> Option<BlockHash> {
        if path == ROOT_PATH {
            self.config.root_parent
        } else {
            None
        }
    }

    /// Recover the key published to `keypair` in an application stream.
    ///
    /// `None` when the keypair is not a member of that stream.
    pub async fn published_key(
        &self,
        app_id: u32,
        keypair: &dyn KeyPair,
    ) -> Result<Option<PublishedKey>> {
        let path = app_path(app_id);
        let stream = self
            .stream(&path)
            .ok_or(KeyringError::StreamNotFound(path))?;
        Ok(stream.published_key(keypair).await?)
    }

    /// The path to hex map this trustchain was built from.
    pub fn to_hex_map(&self) -> BTreeMap<String, String> {
        self.streams
            .iter()
            .map(|(path, entry)| (path.clone(), hex::encode(&entry.bytes)))
            .collect()
    }

    /// Serialize back into the server response format.
    pub fn to_response(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.to_hex_map())?)
    }
}

impl fmt::Debug for Trustchain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trustchain")
            .field("id", &self.id)
            .field("paths", &self.streams.keys().collect::<Vec<_>>())
            .finish()
    }
}
