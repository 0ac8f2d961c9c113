use std::{env, net::SocketAddr};

use atty::Stream;
use chrono::{DateTime, Local};
use owo_colors::OwoColorize;

/// Полный баннер с информацией о сервере.
pub const ASCII_FULL: &str = r#"
    epher {version}
    ----------------------------------------------
    Mode:             {mode}
    Listening:        {listen}
    Backend:          {backend}
    PID:              {pid}
    Host:             {host}
    OS/Arch:          {os}/{arch}
    CPU(s):           {cpus}
    Build:            {git} ({build_time})
"#;

/// Компактный баннер.
pub const ASCII_COMPACT: &str = "epher {version} | {mode} | {listen} | {backend} | PID {pid}";

/// Данные для подстановки в баннер.
#[derive(Debug, Clone)]
pub struct BannerInfo {
    pub version: String,
    pub mode: &'static str,
    pub listen: String,
    pub backend: String,
    pub pid: u32,
    pub host: String,
    pub cpus: usize,
    pub git: String,
    pub build_time: String,
}

impl BannerInfo {
    /// Собирает сведения о текущем процессе.
    pub fn collect(
        listen: &SocketAddr,
        backend: &str,
    ) -> Self {
        let bits = std::mem::size_of::<usize>() * 8;
        let build_time_raw = option_env!("BUILD_TIME").unwrap_or("unknown");
        let build_time = DateTime::parse_from_rfc3339(build_time_raw)
            .map(|dt| {
                dt.with_timezone(&Local)
                    .format("%d.%m.%Y %H:%M:%S")
                    .to_string()
            })
            .unwrap_or_else(|_| build_time_raw.to_string());

        Self {
            version: format!("{} ({bits}-bit)", env!("CARGO_PKG_VERSION")),
            mode: if cfg!(debug_assertions) {
                "debug"
            } else {
                "release"
            },
            listen: listen.to_string(),
            backend: backend.to_string(),
            pid: std::process::id(),
            host: hostname::get()
                .map(|h| h.to_string_lossy().into_owned())
                .unwrap_or_else(|_| "unknown".into()),
            cpus: num_cpus::get(),
            git: option_env!("GIT_COMMIT").unwrap_or("unknown").to_string(),
            build_time,
        }
    }

    /// Подставляет значения в шаблон.
    pub fn render(
        &self,
        template: &str,
    ) -> String {
        template
            .replace("{version}", &self.version)
            .replace("{mode}", self.mode)
            .replace("{listen}", &self.listen)
            .replace("{backend}", &self.backend)
            .replace("{pid}", &self.pid.to_string())
            .replace("{host}", &self.host)
            .replace("{os}", env::consts::OS)
            .replace("{arch}", env::consts::ARCH)
            .replace("{cpus}", &self.cpus.to_string())
            .replace("{git}", &self.git)
            .replace("{build_time}", &self.build_time)
    }
}

/// Выводит баннер при старте.
///
/// `EPHER_BANNER=full|compact|off` переопределяет вид; по умолчанию debug-
/// сборка печатает полный баннер, release-сборка компактный.
pub fn print_banner(
    listen: &SocketAddr,
    backend: &str,
) {
    let forced = env::var("EPHER_BANNER").ok();
    let full = match forced.as_deref() {
        Some("off") => return,
        Some("full") => true,
        Some("compact") => false,
        _ => cfg!(debug_assertions),
    };

    let info = BannerInfo::collect(listen, backend);
    let color = atty::is(Stream::Stdout);

    if !full {
        let line = info.render(ASCII_COMPACT);
        if color {
            println!("{}", line.bold().green());
        } else {
            println!("{line}");
        }
        return;
    }

    let text = info.render(ASCII_FULL);
    if !color {
        println!("{text}");
        return;
    }

    for (i, line) in text.lines().enumerate() {
        let trimmed = line.trim_start();
        if i == 1 {
            println!("{}", line.bold().bright_blue());
        } else if trimmed.starts_with("Mode:") || trimmed.starts_with("Backend:") {
            println!("{}", line.cyan());
        } else if trimmed.starts_with("PID:") {
            println!("{}", line.magenta());
        } else if trimmed.starts_with("Build:") {
            println!("{}", line.dimmed());
        } else {
            println!("{line}");
        }
    }
}

/// Строка о готовности принимать соединения, с точностью до миллисекунд.
pub fn print_startup_log() {
    let pid = std::process::id();
    let ts = Local::now().format("%d %b %Y %H:%M:%S%.3f").to_string();

    if atty::is(Stream::Stdout) {
        println!(
            "[{}] {} {}",
            pid.to_string().red(),
            ts.white(),
            "* Ready to accept subscribers".green()
        );
    } else {
        println!("[{pid}] {ts} * Ready to accept subscribers");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_full_template() {
        let addr: SocketAddr = "127.0.0.1:9090".parse().unwrap();
        let info = BannerInfo::collect(&addr, "redis://127.0.0.1:6379");
        let text = info.render(ASCII_FULL);

        assert!(text.contains("Listening:        127.0.0.1:9090"));
        assert!(text.contains("Backend:          redis://127.0.0.1:6379"));
        assert!(text.contains(&format!("PID:              {}", std::process::id())));
        assert!(!text.contains('{'));
    }

    #[test]
    fn test_render_compact_template() {
        let addr: SocketAddr = "0.0.0.0:9090".parse().unwrap();
        let info = BannerInfo::collect(&addr, "local");
        let line = info.render(ASCII_COMPACT);
        assert!(line.starts_with("epher "));
        assert!(line.contains("| 0.0.0.0:9090 | local |"));
    }
}
