use crate::domain::model::PageText;
use crate::domain::ports::{CommandRunner, TextExtractor};
use crate::utils::error::{CopilotError, Result};
use std::fs;
use std::path::{Path, PathBuf};

const PAGE_BREAK: char = '\x0c';

fn has_extension(path: &Path, allowed: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| allowed.iter().any(|a| a.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

/// 以換頁字元切頁；空白頁略過但頁碼照算
pub fn split_pages(text: &str) -> Vec<PageText> {
    text.split(PAGE_BREAK)
        .enumerate()
        .filter_map(|(index, page)| {
            let trimmed = page.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(PageText {
                    page_number: index as u32 + 1,
                    text: trimmed.to_string(),
                })
            }
        })
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn supports(&self, path: &Path) -> bool {
        has_extension(path, &["txt", "md", "markdown"])
    }

    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>> {
        let bytes = fs::read(path)?;
        Ok(split_pages(&String::from_utf8_lossy(&bytes)))
    }
}

const PDFTOTEXT: &str = "pdftotext";

/// PDF 透過外部 `pdftotext` 轉文字（poppler-utils）
pub struct PdfToTextExtractor<R: CommandRunner> {
    runner: R,
}

impl<R: CommandRunner> PdfToTextExtractor<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }
}

impl<R: CommandRunner> TextExtractor for PdfToTextExtractor<R> {
    fn supports(&self, path: &Path) -> bool {
        has_extension(path, &["pdf"])
    }

    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>> {
        let args = vec![
            "-layout".to_string(),
            path.to_string_lossy().to_string(),
            "-".to_string(),
        ];
        let cwd = path.parent().unwrap_or_else(|| Path::new("."));
        let output = self.runner.run(PDFTOTEXT, &args, cwd)?;

        if !output.success() {
            return Err(CopilotError::ExtractionError {
                document: path.display().to_string(),
                message: if output.stderr.is_empty() {
                    format!("{} exited with {:?}", PDFTOTEXT, output.status_code)
                } else {
                    output.stderr
                },
            });
        }

        Ok(split_pages(&output.stdout))
    }
}

/// 依副檔名挑選第一個支援的抽取器
#[derive(Default)]
pub struct CompositeExtractor {
    extractors: Vec<Box<dyn TextExtractor>>,
}

impl CompositeExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, extractor: impl TextExtractor + 'static) -> Self {
        self.extractors.push(Box::new(extractor));
        self
    }
}

impl TextExtractor for CompositeExtractor {
    fn supports(&self, path: &Path) -> bool {
        self.extractors.iter().any(|e| e.supports(path))
    }

    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>> {
        match self.extractors.iter().find(|e| e.supports(path)) {
            Some(extractor) => extractor.extract_pages(path),
            None => Err(CopilotError::ExtractionError {
                document: path.display().to_string(),
                message: "unsupported file type".to_string(),
            }),
        }
    }
}

/// 列出目錄下可處理的文件（排序後回傳）；目錄不存在時回傳空清單
pub fn discover_documents(
    dir: &Path,
    recursive: bool,
    extractor: &dyn TextExtractor,
) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    if dir.is_dir() {
        walk(dir, recursive, extractor, &mut found)?;
    }
    found.sort();
    Ok(found)
}

fn walk(
    dir: &Path,
    recursive: bool,
    extractor: &dyn TextExtractor,
    found: &mut Vec<PathBuf>,
) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            if recursive {
                walk(&path, recursive, extractor, found)?;
            }
        } else if extractor.supports(&path) {
            found.push(path);
        }
    }
    Ok(())
}
