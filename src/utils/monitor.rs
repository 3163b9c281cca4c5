use std::time::{Duration, Instant};
#[cfg(feature = "cli")]
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

/// 每個攝取階段結束時的取樣
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseSample {
    pub phase: String,
    pub duration: Duration,
    pub memory_mb: Option<u64>,
    pub cpu_usage: Option<f32>,
}

/// 攝取過程中的資源監控（embedding 大量文件時記憶體會明顯上升）
pub struct IngestMonitor {
    #[cfg(feature = "cli")]
    system: System,
    #[cfg(feature = "cli")]
    pid: Option<Pid>,
    started: Instant,
    phase_started: Instant,
    samples: Vec<PhaseSample>,
}

impl IngestMonitor {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            #[cfg(feature = "cli")]
            system: System::new(),
            #[cfg(feature = "cli")]
            pid: sysinfo::get_current_pid().ok(),
            started: now,
            phase_started: now,
            samples: Vec::new(),
        }
    }

    #[cfg(feature = "cli")]
    fn process_usage(&mut self) -> (Option<u64>, Option<f32>) {
        let Some(pid) = self.pid else {
            return (None, None);
        };
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::nothing().with_memory().with_cpu(),
        );
        match self.system.process(pid) {
            Some(process) => (Some(process.memory() / 1024 / 1024), Some(process.cpu_usage())),
            None => (None, None),
        }
    }

    #[cfg(not(feature = "cli"))]
    fn process_usage(&mut self) -> (Option<u64>, Option<f32>) {
        (None, None)
    }

    /// 結束一個階段並記錄耗時與記憶體
    pub fn finish_phase(&mut self, phase: &str) -> &PhaseSample {
        let (memory_mb, cpu_usage) = self.process_usage();
        let now = Instant::now();
        self.samples.push(PhaseSample {
            phase: phase.to_string(),
            duration: now - self.phase_started,
            memory_mb,
            cpu_usage,
        });
        self.phase_started = now;

        let sample = &self.samples[self.samples.len() - 1];
        match (sample.memory_mb, sample.cpu_usage) {
            (Some(memory), Some(cpu)) => tracing::info!(
                "📊 {} - {:.1?}, CPU: {:.1}%, Memory: {}MB",
                sample.phase,
                sample.duration,
                cpu,
                memory
            ),
            _ => tracing::info!("📊 {} - {:.1?}", sample.phase, sample.duration),
        }
        sample
    }

    pub fn samples(&self) -> &[PhaseSample] {
        &self.samples
    }

    pub fn peak_memory_mb(&self) -> Option<u64> {
        self.samples.iter().filter_map(|s| s.memory_mb).max()
    }

    pub fn log_summary(&self) {
        let total = self.started.elapsed();
        match self.peak_memory_mb() {
            Some(peak) => tracing::info!("📊 Ingest total {:.1?}, peak memory {}MB", total, peak),
            None => tracing::info!("📊 Ingest total {:.1?}", total),
        }
    }
}

impl Default for IngestMonitor {
    fn default() -> Self {
        Self::new()
    }
}
