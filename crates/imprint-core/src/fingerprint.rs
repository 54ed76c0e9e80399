//! Content fingerprinting of declared build inputs.
//!
//! A fingerprint depends only on the bytes of the inputs, in declaration
//! order. Paths, mtimes, permissions and the working directory never enter
//! the digest, so two checkouts with identical content agree.
//!
//! Each file is framed by its length before its bytes:
//!
//! ```text
//! sha256( len(f1) as u64 LE || f1 || len(f2) as u64 LE || f2 || ... )
//! ```

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

/// Hex length of a [`Fingerprint`].
pub const FINGERPRINT_LEN: usize = 64;

/// Ordered set of files whose content identifies a target.
///
/// Order is declaration order and is never re-sorted: reordering inputs
/// yields a different fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputSet {
    paths: Vec<PathBuf>,
}

impl InputSet {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Lowercase hex SHA-256 of an [`InputSet`]'s content.
///
/// # Examples
///
/// ```
/// use imprint_core::Hasher;
///
/// let fp = Hasher::default().hash_bytes([b"FROM x".as_slice()]);
/// assert_eq!(fp.as_str().len(), imprint_core::fingerprint::FINGERPRINT_LEN);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reduces an [`InputSet`] to a [`Fingerprint`]. Side-effect free.
#[derive(Debug, Clone, Copy)]
pub struct Hasher {
    normalize_line_endings: bool,
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Hasher {
    pub fn new(normalize_line_endings: bool) -> Self {
        Self {
            normalize_line_endings,
        }
    }

    /// Hash every input in declaration order.
    ///
    /// # Errors
    ///
    /// - [`Error::InputNotFound`](crate::Error::InputNotFound) if a path does not exist
    /// - [`Error::InputUnreadable`](crate::Error::InputUnreadable) if it cannot be read
    pub fn hash(&self, inputs: &InputSet) -> crate::Result<Fingerprint> {
        let contents = inputs
            .paths()
            .iter()
            .map(|path| read_input(path))
            .collect::<crate::Result<Vec<_>>>()?;

        let fingerprint = self.hash_bytes(contents.iter().map(Vec::as_slice));
        tracing::trace!(inputs = inputs.len(), %fingerprint, "inputs hashed");
        Ok(fingerprint)
    }

    /// Hash in-memory file contents, in iteration order.
    pub fn hash_bytes<'a>(&self, contents: impl IntoIterator<Item = &'a [u8]>) -> Fingerprint {
        let mut hasher = Sha256::new();
        for content in contents {
            if self.normalize_line_endings {
                let normalized = normalize_crlf(content);
                hasher.update((normalized.len() as u64).to_le_bytes());
                hasher.update(&normalized);
            } else {
                hasher.update((content.len() as u64).to_le_bytes());
                hasher.update(content);
            }
        }
        Fingerprint(format!("{:x}", hasher.finalize()))
    }
}

fn read_input(path: &Path) -> crate::Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => crate::Error::InputNotFound {
            path: path.to_path_buf(),
        },
        _ => crate::Error::InputUnreadable {
            path: path.to_path_buf(),
            source: e,
        },
    })
}

/// Replace every `\r\n` with `\n`. Lone `\r` bytes are kept.
fn normalize_crlf(content: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(content.len());
    let mut iter = content.iter().peekable();
    while let Some(&byte) = iter.next() {
        if byte == b'\r' && iter.peek() == Some(&&b'\n') {
            continue;
        }
        out.push(byte);
    }
    out
}
