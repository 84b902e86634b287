//! JSON snapshot files shared by the durable stores.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::AsyncWriteExt;

/// Read a JSON snapshot, returning `None` when the file does not exist.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub async fn read_snapshot<T, E>(path: &Path) -> Result<Option<T>, E>
where
    T: DeserializeOwned,
    E: From<std::io::Error> + From<serde_json::Error>,
{
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    Ok(Some(serde_json::from_str(&content)?))
}

/// Write a JSON snapshot atomically (temp file + sync + rename).
///
/// # Errors
///
/// Returns an error if serialization or any file operation fails.
pub async fn write_snapshot<T, E>(path: &Path, value: &T) -> Result<(), E>
where
    T: Serialize + ?Sized,
    E: From<std::io::Error> + From<serde_json::Error>,
{
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let json = serde_json::to_string_pretty(value)?;

    let temp_path = path.with_extension("json.tmp");
    let mut file = tokio::fs::File::create(&temp_path).await?;
    file.write_all(json.as_bytes()).await?;
    file.sync_data().await?;
    drop(file);

    tokio::fs::rename(&temp_path, path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[derive(Debug, thiserror::Error)]
    enum TestError {
        #[error(transparent)]
        Io(#[from] std::io::Error),
        #[error(transparent)]
        Json(#[from] serde_json::Error),
    }

    #[tokio::test]
    async fn test_missing_snapshot_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let loaded: Option<BTreeMap<String, u32>> =
            read_snapshot::<_, TestError>(&dir.path().join("none.json")).await.unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");
        let value = BTreeMap::from([("a".to_string(), 1u32), ("b".to_string(), 2)]);

        write_snapshot::<_, TestError>(&path, &value).await.unwrap();
        let loaded: Option<BTreeMap<String, u32>> =
            read_snapshot::<_, TestError>(&path).await.unwrap();

        assert_eq!(loaded, Some(value));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        tokio::fs::write(&path, "{").await.unwrap();

        let result = read_snapshot::<BTreeMap<String, u32>, TestError>(&path).await;
        assert!(matches!(result, Err(TestError::Json(_))));
    }
}
