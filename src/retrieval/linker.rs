use crate::utils::error::{CopilotError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use url::Url;

const LINKABLE_EXTENSIONS: [&str; 4] = ["pdf", "txt", "md", "markdown"];

fn collect_files(dir: &Path, found: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(&path, found)?;
        } else if path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| LINKABLE_EXTENSIONS.iter().any(|a| a.eq_ignore_ascii_case(e)))
        {
            found.push(path);
        }
    }
    Ok(())
}

/// 依文件名稱（不含副檔名）找檔案；完全相符優先於部分相符
pub fn find_document_path(data_dir: &Path, document_name: &str) -> Option<PathBuf> {
    if !data_dir.is_dir() || document_name.is_empty() {
        return None;
    }

    let mut files = Vec::new();
    if let Err(e) = collect_files(data_dir, &mut files) {
        tracing::warn!("Could not scan {}: {}", data_dir.display(), e);
        return None;
    }
    files.sort();

    let wanted = document_name.to_lowercase();
    let stem_of = |p: &PathBuf| {
        p.file_stem()
            .map(|s| s.to_string_lossy().to_lowercase())
            .unwrap_or_default()
    };

    files
        .iter()
        .find(|p| stem_of(p) == wanted)
        .or_else(|| files.iter().find(|p| stem_of(p).contains(&wanted)))
        .cloned()
}

/// base 之下的相對路徑；不在 base 之下時只回傳檔名
pub fn relative_document_path(path: &Path, base: &Path) -> String {
    match path.strip_prefix(base) {
        Ok(relative) => relative.to_string_lossy().to_string(),
        Err(_) => path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default(),
    }
}

/// `file://...#page=N`
pub fn document_url(path: &Path, page_number: u32) -> Result<Url> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let mut url = Url::from_file_path(&absolute).map_err(|_| CopilotError::ProcessingError {
        message: format!("cannot build a file URL for {}", absolute.display()),
    })?;
    url.set_fragment(Some(&format!("page={}", page_number)));
    Ok(url)
}

/// Markdown 連結，例如 `[📄 unece/r94.pdf - Page 12, Section 5.2](file:///...#page=12)`
pub fn document_link(
    path: &Path,
    base: &Path,
    page_number: u32,
    section_number: Option<&str>,
) -> Result<String> {
    let url = document_url(path, page_number)?;

    let mut label = format!(
        "📄 {} - Page {}",
        relative_document_path(path, base),
        page_number
    );
    if let Some(section) = section_number.filter(|s| !s.is_empty()) {
        label.push_str(&format!(", Section {}", section));
    }

    Ok(format!("[{}]({})", label, url))
}
