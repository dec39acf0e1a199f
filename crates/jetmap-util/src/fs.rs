use std::io;
use std::path::Path;

/// Read a file to string, replacing invalid UTF-8 sequences with the
/// replacement character.
///
/// # Errors
/// Returns an error if the file cannot be read.
pub async fn read_to_string_lossy(path: &Path) -> io::Result<String> {
    let bytes = tokio::fs::read(path).await?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_read_to_string_lossy_valid_utf8() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"export const x = 1;").unwrap();
        file.flush().unwrap();

        let content = read_to_string_lossy(file.path()).await.unwrap();
        assert_eq!(content, "export const x = 1;");
    }

    #[tokio::test]
    async fn test_read_to_string_lossy_invalid_utf8() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&[0x48, 0x69, 0x80, 0x81]).unwrap();
        file.flush().unwrap();

        let content = read_to_string_lossy(file.path()).await.unwrap();
        assert!(content.starts_with("Hi"));
        assert!(content.contains('\u{FFFD}'));
    }

    #[tokio::test]
    async fn test_read_to_string_lossy_missing_file() {
        let err = read_to_string_lossy(Path::new("/no/such/file.js"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
