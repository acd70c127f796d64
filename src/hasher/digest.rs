use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

const CHUNK_LENGTH: usize = 64 * 1024;

/// Streams the file through BLAKE3 and returns the lowercase hex digest.
pub fn content_digest(file: &Path) -> io::Result<String> {
    let mut f = File::open(file)?;
    let mut hasher = blake3::Hasher::new();
    let mut buffer = vec![0; CHUNK_LENGTH];
    loop {
        let bytes_read = match f.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buffer[..bytes_read]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

#[cfg(test)]
pub fn digest_bytes(data: &[u8]) -> String {
    blake3::hash(data).to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_streamed_digest_matches_in_memory_digest() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("big.bin");
        // Spans several chunks with a ragged tail
        let data: Vec<u8> = (0..(CHUNK_LENGTH * 3 + 17)).map(|i| (i % 251) as u8).collect();
        fs::write(&path, &data).unwrap();

        assert_eq!(content_digest(&path).unwrap(), digest_bytes(&data));
    }

    #[test]
    fn test_digest_of_missing_file_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = content_digest(&tmp.path().join("gone.bin")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
