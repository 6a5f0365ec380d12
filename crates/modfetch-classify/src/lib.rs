//! Infers a model artifact's kind from its filename extension and, when
//! available, its leading bytes. Magic-byte sniffing wins over the
//! extension when the two disagree — a renamed `.bin` that is actually a
//! GGUF file is still a GGUF file.
//!
//! Intentionally narrow: this does not validate the artifact, only guesses
//! a label for CLI display and `--type` inference.

use std::fmt;
use std::io::Read;
use std::path::Path;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ArtifactKind {
    Gguf,
    SafeTensors,
    Onnx,
    PyTorchPickle,
    ZipCheckpoint,
    Unknown,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ArtifactKind::Gguf => "gguf",
            ArtifactKind::SafeTensors => "safetensors",
            ArtifactKind::Onnx => "onnx",
            ArtifactKind::PyTorchPickle => "pytorch",
            ArtifactKind::ZipCheckpoint => "zip-checkpoint",
            ArtifactKind::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for ArtifactKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "gguf" => ArtifactKind::Gguf,
            "safetensors" => ArtifactKind::SafeTensors,
            "onnx" => ArtifactKind::Onnx,
            "pytorch" | "pt" | "pickle" => ArtifactKind::PyTorchPickle,
            "zip-checkpoint" | "zip" => ArtifactKind::ZipCheckpoint,
            _ => return Err(()),
        })
    }
}

const GGUF_MAGIC: &[u8; 4] = b"GGUF";
const ZIP_MAGIC: &[u8; 4] = &[0x50, 0x4b, 0x03, 0x04];

/// Classify from a filename alone (extension-based, no I/O).
pub fn classify_by_name(path: impl AsRef<Path>) -> ArtifactKind {
    let ext = path
        .as_ref()
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match ext.as_deref() {
        Some("gguf") => ArtifactKind::Gguf,
        Some("safetensors") => ArtifactKind::SafeTensors,
        Some("onnx") => ArtifactKind::Onnx,
        Some("pt") | Some("pth") | Some("ckpt") | Some("bin") => ArtifactKind::PyTorchPickle,
        Some("zip") => ArtifactKind::ZipCheckpoint,
        _ => ArtifactKind::Unknown,
    }
}

/// Classify from leading bytes alone. Returns `Unknown` when the header
/// doesn't match any recognized layout (e.g. ONNX's protobuf has no fixed
/// magic, so it is never detected this way).
pub fn classify_by_magic(header: &[u8]) -> ArtifactKind {
    if header.len() >= 4 && &header[..4] == GGUF_MAGIC {
        return ArtifactKind::Gguf;
    }
    if looks_like_safetensors(header) {
        return ArtifactKind::SafeTensors;
    }
    if header.len() >= 4 && &header[..4] == ZIP_MAGIC {
        return ArtifactKind::ZipCheckpoint;
    }
    ArtifactKind::Unknown
}

/// A `safetensors` file opens with an 8-byte little-endian header length
/// followed by that many bytes of JSON starting with `{`. We don't parse
/// the JSON, just check the shape holds for a plausible header length.
fn looks_like_safetensors(header: &[u8]) -> bool {
    if header.len() < 10 {
        return false;
    }
    let header_len = u64::from_le_bytes(header[..8].try_into().unwrap());
    header[8] == b'{' && header_len > 0 && header_len < 100 * 1024 * 1024
}

/// Classify by filename, falling back to magic bytes from `path` when the
/// extension alone is ambiguous (`Unknown`) or when `path` is readable and
/// its header disagrees with the extension.
pub fn classify(path: impl AsRef<Path>) -> ArtifactKind {
    let path = path.as_ref();
    let by_name = classify_by_name(path);

    let mut buf = [0u8; 16];
    let n = std::fs::File::open(path)
        .and_then(|mut f| f.read(&mut buf))
        .unwrap_or(0);

    match classify_by_magic(&buf[..n]) {
        ArtifactKind::Unknown => by_name,
        by_magic => by_magic,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn classifies_by_extension() {
        assert_eq!(classify_by_name("model.gguf"), ArtifactKind::Gguf);
        assert_eq!(classify_by_name("model.safetensors"), ArtifactKind::SafeTensors);
        assert_eq!(classify_by_name("model.onnx"), ArtifactKind::Onnx);
        assert_eq!(classify_by_name("model.ckpt"), ArtifactKind::PyTorchPickle);
        assert_eq!(classify_by_name("model.unknownext"), ArtifactKind::Unknown);
    }

    #[test]
    fn detects_gguf_magic() {
        let mut header = b"GGUF".to_vec();
        header.extend_from_slice(&[3, 0, 0, 0]);
        assert_eq!(classify_by_magic(&header), ArtifactKind::Gguf);
    }

    #[test]
    fn detects_safetensors_shape() {
        let mut header = 64u64.to_le_bytes().to_vec();
        header.push(b'{');
        header.extend_from_slice(br#""__metadata__":"#);
        assert_eq!(classify_by_magic(&header), ArtifactKind::SafeTensors);
    }

    #[test]
    fn detects_zip_magic() {
        assert_eq!(
            classify_by_magic(&[0x50, 0x4b, 0x03, 0x04, 0, 0]),
            ArtifactKind::ZipCheckpoint
        );
    }

    #[test]
    fn magic_bytes_override_misleading_extension() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.bin");
        let mut header = b"GGUF".to_vec();
        header.extend_from_slice(&[3, 0, 0, 0]);
        std::fs::write(&path, header).unwrap();

        assert_eq!(classify(&path), ArtifactKind::Gguf);
    }

    #[test]
    fn falls_back_to_extension_when_magic_unrecognized() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.onnx");
        std::fs::write(&path, [0x08, 0x01, 0x12]).unwrap();

        assert_eq!(classify(&path), ArtifactKind::Onnx);
    }

    #[test]
    fn kind_round_trips_through_display_and_from_str() {
        for kind in [
            ArtifactKind::Gguf,
            ArtifactKind::SafeTensors,
            ArtifactKind::Onnx,
            ArtifactKind::PyTorchPickle,
            ArtifactKind::ZipCheckpoint,
        ] {
            let s = kind.to_string();
            assert_eq!(s.parse::<ArtifactKind>().unwrap(), kind);
        }
    }
}
