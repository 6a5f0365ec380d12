//! Key layout for the sled trees. Downloads and chunks share one tree,
//! namespaced by prefix so `scan_prefix` gives cheap per-download chunk
//! listings without a secondary index.

pub struct Keys;

impl Keys {
    pub fn download_key(url: &str, dest: &str) -> Vec<u8> {
        format!("dl:{}:{}", hex::encode(url), hex::encode(dest)).into_bytes()
    }

    pub fn download_prefix() -> Vec<u8> {
        b"dl:".to_vec()
    }

    pub fn chunk_key(url: &str, dest: &str, idx: u32) -> Vec<u8> {
        format!(
            "ck:{}:{}:{:010}",
            hex::encode(url),
            hex::encode(dest),
            idx
        )
        .into_bytes()
    }

    pub fn chunk_prefix(url: &str, dest: &str) -> Vec<u8> {
        format!("ck:{}:{}:", hex::encode(url), hex::encode(dest)).into_bytes()
    }

    pub fn chunk_table_prefix() -> Vec<u8> {
        b"ck:".to_vec()
    }

    pub fn host_caps_key(host: &str) -> Vec<u8> {
        format!("hc:{}", hex::encode(host)).into_bytes()
    }

    /// Recover `(url, dest)` from a chunk key's prefix, for orphan detection.
    pub fn chunk_key_download_prefix(key: &[u8]) -> Option<Vec<u8>> {
        let s = std::str::from_utf8(key).ok()?;
        let mut parts = s.splitn(4, ':');
        let tag = parts.next()?;
        if tag != "ck" {
            return None;
        }
        let url_hex = parts.next()?;
        let dest_hex = parts.next()?;
        Some(format!("dl:{url_hex}:{dest_hex}").into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_key_sorts_by_index() {
        let a = Keys::chunk_key("https://x", "/d", 2);
        let b = Keys::chunk_key("https://x", "/d", 10);
        assert!(a < b, "zero-padded index must sort numerically");
    }

    #[test]
    fn chunk_key_recovers_download_prefix() {
        let ck = Keys::chunk_key("https://x", "/d", 3);
        let recovered = Keys::chunk_key_download_prefix(&ck).unwrap();
        assert_eq!(recovered, Keys::download_key("https://x", "/d"));
    }
}
