use crate::core::Pipeline;
use crate::utils::error::Result;
use crate::utils::monitor::IngestMonitor;
use std::time::Instant;

/// 攝取結果摘要
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestSummary {
    pub documents: Vec<String>,
    pub pages: usize,
    pub chunks: usize,
    pub location: String,
}

impl IngestSummary {
    pub fn is_empty(&self) -> bool {
        self.chunks == 0
    }
}

pub struct IngestEngine<P: Pipeline> {
    pipeline: P,
    monitor_enabled: bool,
}

impl<P: Pipeline> IngestEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self {
            pipeline,
            monitor_enabled: false,
        }
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor_enabled,
        }
    }

    pub async fn run(&self) -> Result<IngestSummary> {
        let started = Instant::now();
        let mut monitor = self.monitor_enabled.then(IngestMonitor::new);
        let mut log_phase = |phase: &str| {
            if let Some(monitor) = monitor.as_mut() {
                monitor.finish_phase(phase);
            }
        };
        tracing::info!("🔄 Building vector store...");

        tracing::info!("Extracting pages...");
        let pages = self.pipeline.extract().await?;
        tracing::info!("Extracted {} pages", pages.len());
        log_phase("extract");

        tracing::info!("Chunking and embedding...");
        let result = self.pipeline.transform(pages).await?;
        let documents = result.documents.clone();
        let page_count = result.pages;
        let chunk_count = result.chunks.len();
        log_phase("transform");

        tracing::info!("Writing vector store...");
        let location = self.pipeline.load(result).await?;
        log_phase("load");

        if let Some(monitor) = &monitor {
            monitor.log_summary();
        }
        tracing::info!(
            "Ingest finished in {:.1}s, output in {}",
            started.elapsed().as_secs_f32(),
            location
        );

        Ok(IngestSummary {
            documents,
            pages: page_count,
            chunks: chunk_count,
            location,
        })
    }
}
