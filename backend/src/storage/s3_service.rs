use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use sha2::{Digest, Sha256};
use uuid::Uuid;

#[derive(Clone)]
pub struct S3Service {
    client: Client,
    bucket_name: String,
}

#[derive(Debug, thiserror::Error)]
pub enum S3ServiceError {
    #[error("S3 error: {0}")]
    S3(String),
    #[error("Invalid file format")]
    InvalidFormat,
    #[error("File too large")]
    FileTooLarge,
    #[error("Malformed data URL")]
    MalformedDataUrl,
}

/// An image carried inline as `data:<mime>;base64,<payload>`.
#[derive(Debug, Clone, PartialEq)]
pub struct DataUrlImage {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl DataUrlImage {
    /// Returns `Ok(None)` for anything that is not a `data:` URL.
    pub fn parse(value: &str) -> Result<Option<Self>, S3ServiceError> {
        let Some(rest) = value.strip_prefix("data:") else {
            return Ok(None);
        };
        let (header, payload) = rest
            .split_once(',')
            .ok_or(S3ServiceError::MalformedDataUrl)?;
        let mime_type = header
            .strip_suffix(";base64")
            .ok_or(S3ServiceError::MalformedDataUrl)?;
        let bytes = STANDARD
            .decode(payload.trim())
            .map_err(|_| S3ServiceError::MalformedDataUrl)?;

        Ok(Some(Self {
            mime_type: mime_type.to_string(),
            bytes,
        }))
    }
}

impl S3Service {
    pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

    pub fn new(client: Client, bucket_name: String) -> Self {
        Self {
            client,
            bucket_name,
        }
    }

    pub fn calculate_image_hash(image_data: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(image_data);
        hex::encode(hasher.finalize())
    }

    pub fn generate_s3_key(user_id: Uuid, image_hash: &str, file_extension: &str) -> String {
        format!("images/{}/{}.{}", user_id, image_hash, file_extension)
    }

    pub fn extract_file_extension(mime_type: &str) -> Result<&'static str, S3ServiceError> {
        match mime_type {
            "image/jpeg" | "image/jpg" => Ok("jpg"),
            "image/png" => Ok("png"),
            "image/webp" => Ok("webp"),
            "image/gif" => Ok("gif"),
            _ => Err(S3ServiceError::InvalidFormat),
        }
    }

    pub fn validate_image_size(image_data: &[u8]) -> Result<(), S3ServiceError> {
        if image_data.len() > Self::MAX_UPLOAD_BYTES {
            return Err(S3ServiceError::FileTooLarge);
        }
        Ok(())
    }

    /// Stores a report image under its content hash and returns the object key.
    pub async fn store_report_image(
        &self,
        user_id: Uuid,
        image: &DataUrlImage,
    ) -> Result<String, S3ServiceError> {
        let extension = Self::extract_file_extension(&image.mime_type)?;
        let hash = Self::calculate_image_hash(&image.bytes);
        let key = Self::generate_s3_key(user_id, &hash, extension);
        self.upload_image(&image.bytes, &key, &image.mime_type)
            .await?;
        log::info!("Uploaded report image to s3://{}/{}", self.bucket_name, key);
        Ok(key)
    }

    pub async fn upload_image(
        &self,
        image_data: &[u8],
        s3_key: &str,
        mime_type: &str,
    ) -> Result<(), S3ServiceError> {
        S3Service::validate_image_size(image_data)?;

        let body = ByteStream::from(image_data.to_vec());

        self.client
            .put_object()
            .bucket(&self.bucket_name)
            .key(s3_key)
            .body(body)
            .content_type(mime_type)
            .send()
            .await
            .map_err(|e| S3ServiceError::S3(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_content_addressed() {
        let user_id = Uuid::nil();
        let hash = S3Service::calculate_image_hash(b"abc");
        assert_eq!(
            hash,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(
            S3Service::generate_s3_key(user_id, &hash, "png"),
            format!("images/{}/{}.png", user_id, hash)
        );
    }

    #[test]
    fn unsupported_mime_types_are_rejected() {
        assert_eq!(S3Service::extract_file_extension("image/jpeg").unwrap(), "jpg");
        assert!(matches!(
            S3Service::extract_file_extension("application/pdf"),
            Err(S3ServiceError::InvalidFormat)
        ));
    }

    #[test]
    fn data_urls_are_decoded() {
        let parsed = DataUrlImage::parse("data:image/png;base64,aGVsbG8=")
            .unwrap()
            .unwrap();
        assert_eq!(parsed.mime_type, "image/png");
        assert_eq!(parsed.bytes, b"hello");
    }

    #[test]
    fn plain_urls_are_not_data_urls() {
        assert_eq!(
            DataUrlImage::parse("https://example.com/a.png").unwrap(),
            None
        );
        assert!(matches!(
            DataUrlImage::parse("data:image/png,raw"),
            Err(S3ServiceError::MalformedDataUrl)
        ));
    }

    #[test]
    fn oversized_images_are_rejected() {
        let big = vec![0u8; S3Service::MAX_UPLOAD_BYTES + 1];
        assert!(matches!(
            S3Service::validate_image_size(&big),
            Err(S3ServiceError::FileTooLarge)
        ));
    }
}
