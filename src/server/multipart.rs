//! Extraction of the uploaded file from a `multipart/form-data` body.

use std::convert::Infallible;

use anyhow::{Context, Result};
use futures_util::stream;

pub const FILE_FIELD: &str = "file";
const FALLBACK_FILE_NAME: &str = "upload.csv";

#[derive(Debug)]
pub struct UploadedFile {
    pub file_name: String,
    pub contents: Vec<u8>,
}

pub fn is_multipart(content_type: Option<&str>) -> bool {
    content_type
        .map(|ct| ct.trim_start().to_ascii_lowercase().starts_with("multipart/form-data"))
        .unwrap_or(false)
}

/// Returns the first field named `field`, or `None` when the form has no
/// such field.
pub async fn extract_file(
    content_type: &str,
    body: Vec<u8>,
    field: &str,
) -> Result<Option<UploadedFile>> {
    let boundary =
        multer::parse_boundary(content_type).context("missing multipart boundary")?;
    let body_stream = stream::once(async move { Ok::<_, Infallible>(body) });
    let mut multipart = multer::Multipart::new(body_stream, boundary);

    while let Some(part) = multipart
        .next_field()
        .await
        .context("malformed multipart body")?
    {
        if part.name() != Some(field) {
            continue;
        }

        let file_name = part
            .file_name()
            .filter(|name| !name.is_empty())
            .unwrap_or(FALLBACK_FILE_NAME)
            .to_string();
        let contents = part
            .bytes()
            .await
            .context("failed to read uploaded file")?;

        return Ok(Some(UploadedFile {
            file_name,
            contents: contents.to_vec(),
        }));
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::encode_multipart;

    const BOUNDARY: &str = "test-boundary";

    fn content_type() -> String {
        format!("multipart/form-data; boundary={BOUNDARY}")
    }

    #[tokio::test]
    async fn extracts_named_file_field() {
        let body = encode_multipart(FILE_FIELD, "plant.csv", b"Temperature\n1\n", BOUNDARY);
        let file = extract_file(&content_type(), body, FILE_FIELD)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(file.file_name, "plant.csv");
        assert_eq!(file.contents, b"Temperature\n1\n");
    }

    #[tokio::test]
    async fn other_fields_are_skipped() {
        let body = encode_multipart("attachment", "plant.csv", b"x", BOUNDARY);
        let file = extract_file(&content_type(), body, FILE_FIELD).await.unwrap();
        assert!(file.is_none());
    }

    #[tokio::test]
    async fn missing_boundary_is_an_error() {
        let result = extract_file("multipart/form-data", b"".to_vec(), FILE_FIELD).await;
        assert!(result.is_err());
    }

    #[test]
    fn detects_multipart_content_type() {
        assert!(is_multipart(Some("multipart/form-data; boundary=x")));
        assert!(is_multipart(Some("Multipart/Form-Data; boundary=x")));
        assert!(!is_multipart(Some("text/csv")));
        assert!(!is_multipart(None));
    }
}
