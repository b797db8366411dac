use base64::Engine;
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Content digest over every source extract, in load order.
///
/// Two loads with the same fingerprint saw byte-identical inputs, so a
/// cached store can be reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SourceFingerprint(String);

impl SourceFingerprint {
    pub fn compute<'a, I>(sources: I) -> Self
    where
        I: IntoIterator<Item = &'a [u8]>,
    {
        let mut hasher = Sha256::new();
        for bytes in sources {
            // Length prefix keeps ("ab", "c") distinct from ("a", "bc").
            hasher.update((bytes.len() as u64).to_le_bytes());
            hasher.update(bytes);
        }
        Self(base64::engine::general_purpose::STANDARD.encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SourceFingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
