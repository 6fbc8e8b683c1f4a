use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::io::AsyncWriteExt;

/// Content type every stored demo object is created with.
pub const DEMO_CONTENT_TYPE: &str = "application/octet-stream";

/// Backend for demo recording objects.
///
/// Uploads are part-based: `begin_upload` opens a handle that accepts parts
/// and either commits or aborts the object, so a cancelled upload never
/// leaves a visible object behind.
pub trait DemoStorage: Send + Sync {
    fn duplicate(&self) -> Box<dyn DemoStorage>;

    fn begin_upload<'f, 'own>(
        &'own self,
        object_path: String,
    ) -> BoxFuture<'f, Result<Box<dyn DemoUpload>, String>>
    where
        'own: 'f;

    fn delete<'f, 'own>(&'own self, object_path: String) -> BoxFuture<'f, Result<(), String>>
    where
        'own: 'f;
}

/// One in-flight demo upload. After `finish` or `cancel` the handle is spent.
pub trait DemoUpload: Send {
    fn write_part(&mut self, data: Vec<u8>) -> BoxFuture<'_, Result<(), String>>;

    fn finish(&mut self) -> BoxFuture<'_, Result<(), String>>;

    fn cancel(&mut self) -> BoxFuture<'_, Result<(), String>>;
}

pub struct FileStorage {
    folder: std::sync::Arc<std::path::PathBuf>,
}

impl FileStorage {
    pub fn new<P>(folder: P) -> Self
    where
        P: Into<std::path::PathBuf>,
    {
        Self {
            folder: std::sync::Arc::new(folder.into()),
        }
    }
}

impl DemoStorage for FileStorage {
    fn duplicate(&self) -> Box<dyn DemoStorage> {
        Box::new(Self {
            folder: self.folder.clone(),
        })
    }

    fn begin_upload<'f, 'own>(
        &'own self,
        object_path: String,
    ) -> BoxFuture<'f, Result<Box<dyn DemoUpload>, String>>
    where
        'own: 'f,
    {
        let folder = self.folder.clone();

        async move {
            let dest = folder.join(&object_path);
            if let Some(parent) = dest.parent() {
                if !tokio::fs::try_exists(parent).await.unwrap_or(false) {
                    tokio::fs::create_dir_all(parent)
                        .await
                        .map_err(|e| format!("Creating demo folder: {:?}", e))?;
                }
            }

            let tmp = dest.with_extension("part");
            let file = tokio::fs::File::create(&tmp)
                .await
                .map_err(|e| format!("Creating demo file: {:?}", e))?;

            Ok(Box::new(FileUpload {
                file: Some(tokio::io::BufWriter::new(file)),
                tmp,
                dest,
            }) as Box<dyn DemoUpload>)
        }
        .boxed()
    }

    fn delete<'f, 'own>(&'own self, object_path: String) -> BoxFuture<'f, Result<(), String>>
    where
        'own: 'f,
    {
        let folder = self.folder.clone();

        async move {
            tokio::fs::remove_file(folder.join(&object_path))
                .await
                .map_err(|e| format!("Removing demo file: {:?}", e))
        }
        .boxed()
    }
}

struct FileUpload {
    file: Option<tokio::io::BufWriter<tokio::fs::File>>,
    tmp: std::path::PathBuf,
    dest: std::path::PathBuf,
}

impl DemoUpload for FileUpload {
    fn write_part(&mut self, data: Vec<u8>) -> BoxFuture<'_, Result<(), String>> {
        async move {
            let file = self
                .file
                .as_mut()
                .ok_or_else(|| "Upload already completed".to_string())?;

            file.write_all(&data)
                .await
                .map_err(|e| format!("Writing demo part: {:?}", e))
        }
        .boxed()
    }

    fn finish(&mut self) -> BoxFuture<'_, Result<(), String>> {
        async move {
            let mut file = self
                .file
                .take()
                .ok_or_else(|| "Upload already completed".to_string())?;

            file.shutdown()
                .await
                .map_err(|e| format!("Flushing demo file: {:?}", e))?;

            tokio::fs::rename(&self.tmp, &self.dest)
                .await
                .map_err(|e| format!("Committing demo file: {:?}", e))
        }
        .boxed()
    }

    fn cancel(&mut self) -> BoxFuture<'_, Result<(), String>> {
        async move {
            drop(self.file.take());

            match tokio::fs::remove_file(&self.tmp).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(format!("Removing partial demo file: {:?}", e)),
            }
        }
        .boxed()
    }
}

pub struct S3Storage {
    bucket: std::sync::Arc<s3::Bucket>,
}

impl S3Storage {
    pub fn new(
        bucket_name: &str,
        region: s3::region::Region,
        credentials: s3::creds::Credentials,
    ) -> Self {
        let mut bucket = s3::bucket::Bucket::new(bucket_name, region, credentials).unwrap();
        bucket.set_path_style();

        Self {
            bucket: bucket.into(),
        }
    }
}

impl DemoStorage for S3Storage {
    fn duplicate(&self) -> Box<dyn DemoStorage> {
        Box::new(Self {
            bucket: self.bucket.clone(),
        })
    }

    fn begin_upload<'f, 'own>(
        &'own self,
        object_path: String,
    ) -> BoxFuture<'f, Result<Box<dyn DemoUpload>, String>>
    where
        'own: 'f,
    {
        let bucket = self.bucket.clone();

        async move {
            let initiated = bucket
                .initiate_multipart_upload(&object_path, DEMO_CONTENT_TYPE)
                .await
                .map_err(|e| format!("Initiating multipart upload: {:?}", e))?;

            Ok(Box::new(S3Upload {
                bucket,
                object_path,
                upload_id: initiated.upload_id,
                parts: Vec::new(),
                part_number: 0,
            }) as Box<dyn DemoUpload>)
        }
        .boxed()
    }

    fn delete<'f, 'own>(&'own self, object_path: String) -> BoxFuture<'f, Result<(), String>>
    where
        'own: 'f,
    {
        let bucket = self.bucket.clone();

        async move {
            bucket
                .delete_object(&object_path)
                .await
                .map(|_| ())
                .map_err(|e| format!("Deleting demo object: {:?}", e))
        }
        .boxed()
    }
}

struct S3Upload {
    bucket: std::sync::Arc<s3::Bucket>,
    object_path: String,
    upload_id: String,
    parts: Vec<s3::serde_types::Part>,
    part_number: u32,
}

impl DemoUpload for S3Upload {
    fn write_part(&mut self, data: Vec<u8>) -> BoxFuture<'_, Result<(), String>> {
        async move {
            self.part_number += 1;

            let part = self
                .bucket
                .put_multipart_chunk(
                    data,
                    &self.object_path,
                    self.part_number,
                    &self.upload_id,
                    DEMO_CONTENT_TYPE,
                )
                .await
                .map_err(|e| format!("Uploading part {}: {:?}", self.part_number, e))?;

            self.parts.push(part);
            Ok(())
        }
        .boxed()
    }

    fn finish(&mut self) -> BoxFuture<'_, Result<(), String>> {
        async move {
            let parts = std::mem::take(&mut self.parts);

            self.bucket
                .complete_multipart_upload(&self.object_path, &self.upload_id, parts)
                .await
                .map(|_| ())
                .map_err(|e| format!("Completing multipart upload: {:?}", e))
        }
        .boxed()
    }

    fn cancel(&mut self) -> BoxFuture<'_, Result<(), String>> {
        async move {
            self.bucket
                .abort_upload(&self.object_path, &self.upload_id)
                .await
                .map_err(|e| format!("Aborting multipart upload: {:?}", e))
        }
        .boxed()
    }
}
