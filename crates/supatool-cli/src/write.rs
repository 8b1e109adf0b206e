use std::path::{Path, PathBuf};
use supatool_schema::GeneratedFile;

#[derive(Debug, Default)]
pub struct WriteSummary {
    pub unchanged: Vec<PathBuf>,
    pub written: Vec<PathBuf>,
}

/// Write every file whose content differs from what is on disk.
pub fn apply_generated_files(files: &[GeneratedFile]) -> anyhow::Result<WriteSummary> {
    let mut files = files.to_vec();
    files.sort_by(|a, b| a.path.cmp(&b.path));

    let mut summary = WriteSummary::default();

    for f in &files {
        let existing = std::fs::read_to_string(&f.path).ok();
        if existing.as_deref() == Some(f.content.as_str()) {
            summary.unchanged.push(f.path.clone());
            continue;
        }
        write_atomic(&f.path, &f.content)?;
        summary.written.push(f.path.clone());
    }

    for p in &summary.written {
        println!("wrote {}", p.display());
    }
    for p in &summary.unchanged {
        println!("unchanged {}", p.display());
    }

    Ok(summary)
}

pub fn write_atomic(path: &Path, content: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                anyhow::anyhow!("failed to create directory {}: {e}", parent.display())
            })?;
        }
    }

    let tmp = tmp_path(path);
    std::fs::write(&tmp, content)
        .map_err(|e| anyhow::anyhow!("failed to write {}: {e}", tmp.display()))?;
    std::fs::rename(&tmp, path).map_err(|e| {
        anyhow::anyhow!(
            "failed to rename {} -> {}: {e}",
            tmp.display(),
            path.display()
        )
    })?;
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => path.with_extension(format!("{ext}.tmp")),
        None => path.with_extension("tmp"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn make_temp_dir() -> PathBuf {
        let nonce = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time")
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("supatool-write-{nonce}"));
        std::fs::create_dir_all(&dir).expect("mkdir");
        dir
    }

    #[test]
    fn writes_only_changed_files() {
        let dir = make_temp_dir();
        let same = dir.join("same.ts");
        std::fs::write(&same, "export {};\n").unwrap();

        let files = vec![
            GeneratedFile {
                path: dir.join("nested/crud/users.ts"),
                content: "users\n".into(),
            },
            GeneratedFile {
                path: same.clone(),
                content: "export {};\n".into(),
            },
        ];
        let summary = apply_generated_files(&files).unwrap();
        assert_eq!(summary.written, [dir.join("nested/crud/users.ts")]);
        assert_eq!(summary.unchanged, [same]);
        assert_eq!(
            std::fs::read_to_string(dir.join("nested/crud/users.ts")).unwrap(),
            "users\n"
        );
        assert!(!dir.join("nested/crud/users.ts.tmp").exists());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn tmp_path_keeps_extension() {
        assert_eq!(tmp_path(Path::new("a/b.sql")), PathBuf::from("a/b.sql.tmp"));
        assert_eq!(tmp_path(Path::new("a/b")), PathBuf::from("a/b.tmp"));
    }
}
