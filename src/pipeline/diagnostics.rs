// src/pipeline/diagnostics.rs

//! Raw markup dumps for pages that yielded no articles.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tokio::io::AsyncWriteExt;

use crate::error::Result;

/// Write the markup to `dir/dump-<timestamp>.html` (write to temp, then rename).
pub async fn dump_markup(dir: &Path, markup: &str) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;

    let name = format!("dump-{}.html", Utc::now().format("%Y%m%d-%H%M%S%.3f"));
    let path = dir.join(name);
    let tmp = path.with_extension("tmp");

    let mut file = tokio::fs::File::create(&tmp).await?;
    file.write_all(markup.as_bytes()).await?;
    file.flush().await?;
    drop(file);

    tokio::fs::rename(&tmp, &path).await?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_dump_creates_dir_and_file() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("dumps");

        let path = dump_markup(&dir, "<html>captcha</html>").await.unwrap();

        assert!(path.starts_with(&dir));
        assert_eq!(path.extension().unwrap(), "html");
        let saved = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(saved, "<html>captcha</html>");
    }
}
