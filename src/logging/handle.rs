use std::time::Instant;

use tracing_appender::non_blocking::WorkerGuard;

/// Handle для управления жизненным циклом логирования.
///
/// Держит guard файлового синка: пока handle жив, фоновый поток записи
/// работает. `shutdown` дописывает буфер на диск.
pub struct LoggingHandle {
    /// File guard (есть, если файловый синк включён)
    file_guard: Option<WorkerGuard>,
    started_at: Instant,
}

impl LoggingHandle {
    pub fn new(file_guard: Option<WorkerGuard>) -> Self {
        Self {
            file_guard,
            started_at: Instant::now(),
        }
    }

    /// `true`, если включён файловый синк.
    pub fn has_file_sink(&self) -> bool {
        self.file_guard.is_some()
    }

    /// Завершает логирование, сбрасывая буферы.
    pub fn shutdown(mut self) {
        tracing::info!(
            uptime_secs = self.started_at.elapsed().as_secs(),
            file_sink = self.has_file_sink(),
            "Logging shutdown"
        );
        drop(self.file_guard.take());
    }
}

impl std::fmt::Debug for LoggingHandle {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("LoggingHandle")
            .field("file_sink", &self.has_file_sink())
            .finish()
    }
}
