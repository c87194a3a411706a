use std::path::Path;

use anyhow::{Context, Result};
use log::info;
use tokio::fs;

/// Creates the directory that will hold `file_path`, if it is missing.
pub async fn ensure_parent_dir(file_path: &Path) -> Result<()> {
    let Some(dir) = file_path.parent().filter(|d| !d.as_os_str().is_empty()) else {
        return Ok(());
    };
    if fs::try_exists(dir).await.unwrap_or(false) {
        return Ok(());
    }

    fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create directory {:?}", dir))?;
    info!("Created directory at: {:?}", dir);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn creates_nested_parents_once() {
        let root = std::env::temp_dir().join(format!("wifi-ble-utils-{}", std::process::id()));
        let file = root.join("a").join("b").join("config.json");

        ensure_parent_dir(&file).await.unwrap();
        ensure_parent_dir(&file).await.unwrap();
        assert!(root.join("a").join("b").is_dir());

        fs::remove_dir_all(&root).await.unwrap();
    }

    #[tokio::test]
    async fn bare_file_name_needs_no_directory() {
        ensure_parent_dir(Path::new("config.json")).await.unwrap();
    }
}
