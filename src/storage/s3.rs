use async_trait::async_trait;
use chrono::{DateTime, Utc};
use aws_config::BehaviorVersion;
use aws_sdk_s3::{
    Client,
    config::{Credentials, Region, http::HttpResponse},
    error::{DisplayErrorContext, SdkError},
    primitives::ByteStream,
};
use tracing::{debug, error};

use super::{DEFAULT_LIST_PAGE_SIZE, ListPage, ObjectStore, S3StorageConfig, StorageError};

/// Object store backed by an S3-compatible bucket.
pub struct S3Store {
    client: Client,
    bucket: String,
    /// Prefix (root path) prepended to all keys
    root: String,
    page_size: usize,
}

impl S3Store {
    pub async fn new(config: &S3StorageConfig) -> Result<Self, StorageError> {
        let mut aws_config_builder = aws_config::defaults(BehaviorVersion::latest());

        // Set region if provided, otherwise use default from environment
        if let Some(region) = &config.region {
            aws_config_builder = aws_config_builder.region(Region::new(region.clone()));
        }

        // Explicit credentials win; otherwise fall back to the default provider chain
        if let (Some(access_key), Some(secret_key)) =
            (&config.access_key_id, &config.secret_access_key)
        {
            let credentials =
                Credentials::new(access_key, secret_key, None, None, "photohost-storage");
            aws_config_builder = aws_config_builder.credentials_provider(credentials);
        }

        let sdk_config = aws_config_builder.load().await;
        let mut s3_config = aws_sdk_s3::config::Builder::from(&sdk_config);

        if let Some(endpoint) = &config.endpoint {
            // S3-compatible services generally need path-style addressing
            s3_config = s3_config.endpoint_url(endpoint).force_path_style(true);
        }

        let client = Client::from_conf(s3_config.build());
        let root = config
            .root
            .as_deref()
            .unwrap_or("")
            .trim_matches('/')
            .to_string();

        debug!(
            "Created S3 store for bucket '{}' with root '{}'",
            config.bucket, root
        );

        Ok(Self {
            client,
            bucket: config.bucket.clone(),
            root,
            page_size: DEFAULT_LIST_PAGE_SIZE,
        })
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn full_key(&self, key: &str) -> String {
        join_root(&self.root, key)
    }

    fn relative_key(&self, full_key: &str) -> String {
        strip_root(&self.root, full_key)
    }
}

fn join_root(root: &str, key: &str) -> String {
    if root.is_empty() {
        key.to_string()
    } else {
        format!("{}/{}", root, key)
    }
}

fn strip_root(root: &str, full_key: &str) -> String {
    if root.is_empty() {
        return full_key.to_string();
    }
    full_key
        .strip_prefix(root)
        .and_then(|rest| rest.strip_prefix('/'))
        .unwrap_or(full_key)
        .to_string()
}

/// Map an HTTP status to the shared error categories.
fn classify_status(key: &str, status: Option<u16>, detail: String) -> StorageError {
    match status {
        Some(404) => StorageError::NotFound(key.to_string()),
        Some(401) | Some(403) => StorageError::Permission(format!("{}: {}", key, detail)),
        _ => StorageError::Transient(format!("{}: {}", key, detail)),
    }
}

fn classify<E>(op: &str, key: &str, err: SdkError<E, HttpResponse>) -> StorageError
where
    E: std::error::Error + 'static,
{
    let status = err.raw_response().map(|response| response.status().as_u16());
    let detail = format!("S3 {}: {}", op, DisplayErrorContext(&err));
    let classified = classify_status(key, status, detail);
    if !classified.is_not_found() {
        error!("{}", classified);
    }
    classified
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<(), StorageError> {
        let full_key = self.full_key(key);
        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(&full_key)
            .body(ByteStream::from(data));
        if !content_type.is_empty() {
            request = request.content_type(content_type);
        }

        request
            .send()
            .await
            .map_err(|e| classify("PUT", key, e))?;
        Ok(())
    }

    async fn put_if_absent(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<bool, StorageError> {
        let full_key = self.full_key(key);
        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(&full_key)
            .if_none_match("*")
            .body(ByteStream::from(data));
        if !content_type.is_empty() {
            request = request.content_type(content_type);
        }

        match request.send().await {
            Ok(_) => Ok(true),
            Err(err) if err.raw_response().map(|r| r.status().as_u16()) == Some(412) => {
                debug!("Object {} already exists, keeping it", key);
                Ok(false)
            }
            Err(err) => Err(classify("PUT", key, err)),
        }
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let full_key = self.full_key(key);
        match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&full_key)
            .send()
            .await
        {
            Ok(output) => {
                let data = output.body.collect().await.map_err(|e| {
                    StorageError::Transient(format!("{}: reading S3 body: {}", key, e))
                })?;
                Ok(data.into_bytes().to_vec())
            }
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|service_err| service_err.is_no_such_key()) =>
            {
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(err) => Err(classify("GET", key, err)),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        let full_key = self.full_key(key);
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(&full_key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|service_err| service_err.is_not_found()) =>
            {
                Ok(false)
            }
            Err(err) => match classify("HEAD", key, err) {
                StorageError::NotFound(_) => Ok(false),
                other => Err(other),
            },
        }
    }

    async fn last_modified(&self, key: &str) -> Result<DateTime<Utc>, StorageError> {
        let output = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(self.full_key(key))
            .send()
            .await
            .map_err(|e| classify("HEAD", key, e))?;

        output
            .last_modified()
            .and_then(|modified| {
                DateTime::<Utc>::from_timestamp(modified.secs(), modified.subsec_nanos())
            })
            .ok_or_else(|| StorageError::Transient(format!("{}: no Last-Modified header", key)))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let full_key = self.full_key(key);
        match self
            .client
            .delete_object()
            .bucket(&self.bucket)
            .key(&full_key)
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(err) => match classify("DELETE", key, err) {
                StorageError::NotFound(_) => Ok(()),
                other => Err(other),
            },
        }
    }

    async fn list(&self, prefix: &str, cursor: Option<&str>) -> Result<ListPage, StorageError> {
        let full_prefix = self.full_key(prefix);
        let mut request = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(&full_prefix)
            .delimiter("/")
            .max_keys(i32::try_from(self.page_size).unwrap_or(i32::MAX));
        if let Some(token) = cursor {
            request = request.continuation_token(token);
        }

        let output = request
            .send()
            .await
            .map_err(|e| classify("LIST", prefix, e))?;

        let keys = output
            .contents()
            .iter()
            .filter_map(|object| object.key())
            .map(|key| self.relative_key(key))
            .collect();
        let prefixes = output
            .common_prefixes()
            .iter()
            .filter_map(|common| common.prefix())
            .map(|p| self.relative_key(p))
            .collect();

        Ok(ListPage {
            keys,
            prefixes,
            next_cursor: output.next_continuation_token().map(str::to_string),
        })
    }

    async fn copy(&self, from: &str, to: &str) -> Result<(), StorageError> {
        // Server-side copy; keys are restricted to URL-safe characters
        let source = format!("{}/{}", self.bucket, self.full_key(from));
        match self
            .client
            .copy_object()
            .bucket(&self.bucket)
            .copy_source(source)
            .key(self.full_key(to))
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(err) => Err(classify("COPY", from, err)),
        }
    }

    fn name(&self) -> &str {
        "s3"
    }
}
