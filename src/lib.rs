pub mod agent_core;
pub mod config;
pub mod inference;
pub mod server;
pub mod site;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;

use agent_core::{Assistant, ToolRegistry};
use config::AssistantConfig;
use inference::InferenceClient;
use site::{ContentFetcher, HttpPageSource, UrlIndex};

/// Return the platform-standard data directory for the assistant.
///
/// - macOS: `~/Library/Application Support/site-assistant/`
/// - Windows: `{FOLDERID_RoamingAppData}\site-assistant\`
/// - Linux: `$XDG_DATA_HOME/site-assistant/` (fallback `~/.local/share/...`)
///
/// Falls back to `~/.site-assistant/` only if none of the above can be resolved.
pub fn data_dir() -> PathBuf {
    if let Some(dir) = dirs::data_dir() {
        return dir.join("site-assistant");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".site-assistant")
}

/// Initialize the tracing subscriber.
///
/// With `log_to_file`, logs go to `assistant.log` in the data directory:
/// 1. Rotates existing logs (assistant.log → .1 → .2 → .3, keeps last 3).
/// 2. Opens a fresh assistant.log with a line-flushing writer.
/// 3. Logs a startup banner with the log path.
///
/// Otherwise logs go to stderr. Returns the log file path when one is used.
pub fn init_tracing(log_to_file: bool) -> anyhow::Result<Option<PathBuf>> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("site_assistant=info,warn"));

    let log_path = if log_to_file {
        let log_dir = data_dir();
        std::fs::create_dir_all(&log_dir)
            .with_context(|| format!("creating log directory {}", log_dir.display()))?;
        let log_path = log_dir.join("assistant.log");

        rotate_log_file(&log_path, 3);

        let log_file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .with_context(|| format!("opening {}", log_path.display()))?;

        fmt::fmt()
            .with_env_filter(filter)
            .with_writer(FlushingWriter::new(log_file))
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(false)
            .try_init()
            .map_err(|e| anyhow::anyhow!("installing tracing subscriber: {e}"))?;
        Some(log_path)
    } else {
        fmt::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(true)
            .try_init()
            .map_err(|e| anyhow::anyhow!("installing tracing subscriber: {e}"))?;
        None
    };

    let destination = log_path
        .as_deref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "stderr".into());
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        log_file = %destination,
        pid = std::process::id(),
        "=== site-assistant starting ==="
    );

    Ok(log_path)
}

/// Rotate log files: `assistant.log` → `assistant.log.1` → `.2` → … → `.{keep}`.
///
/// Oldest file beyond `keep` is deleted. Missing files in the chain are skipped.
fn rotate_log_file(base_path: &Path, keep: u32) {
    let oldest = format!("{}.{keep}", base_path.display());
    let _ = std::fs::remove_file(&oldest);

    for i in (1..keep).rev() {
        let from = format!("{}.{i}", base_path.display());
        let to = format!("{}.{}", base_path.display(), i + 1);
        let _ = std::fs::rename(&from, &to);
    }

    if base_path.exists() {
        let to = format!("{}.1", base_path.display());
        let _ = std::fs::rename(base_path, &to);
    }
}

/// A writer that wraps `std::fs::File` and flushes after every write,
/// so each log line is on disk immediately.
#[derive(Clone)]
struct FlushingWriter {
    file: Arc<std::sync::Mutex<std::fs::File>>,
}

impl FlushingWriter {
    fn new(file: std::fs::File) -> Self {
        Self {
            file: Arc::new(std::sync::Mutex::new(file)),
        }
    }
}

impl std::io::Write for FlushingWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut f = self
            .file
            .lock()
            .map_err(|e| std::io::Error::other(format!("lock poisoned: {e}")))?;
        let n = std::io::Write::write(&mut *f, buf)?;
        std::io::Write::flush(&mut *f)?;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let mut f = self
            .file
            .lock()
            .map_err(|e| std::io::Error::other(format!("lock poisoned: {e}")))?;
        std::io::Write::flush(&mut *f)
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for FlushingWriter {
    type Writer = FlushingWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Load the URL index and build the page fetcher. Needs no model credentials.
pub fn build_site(config: &AssistantConfig) -> anyhow::Result<(Arc<UrlIndex>, Arc<ContentFetcher>)> {
    let records = site::sitemap::load_url_records(&config.site.url_lists)
        .context("loading site URL lists")?;
    if records.is_empty() {
        tracing::warn!("no URL lists configured, URL search will return nothing");
    }
    let index = UrlIndex::new(records);
    tracing::info!(urls = index.len(), "URL index ready");

    let source = HttpPageSource::new().context("building page HTTP client")?;
    let fetcher = ContentFetcher::with_cache_limit(Arc::new(source), config.site.cache_max_entries);

    Ok((Arc::new(index), Arc::new(fetcher)))
}

/// Wire the full assistant from configuration.
pub fn build_assistant(config: &AssistantConfig) -> anyhow::Result<Assistant> {
    let (index, fetcher) = build_site(config)?;
    let model = InferenceClient::from_settings(&config.model).context("building model client")?;
    tracing::info!(model = %config.model.model, endpoint = %model.endpoint(), "model client ready");

    let mut assistant = Assistant::new(Arc::new(model), ToolRegistry::new(index, fetcher))
        .with_retry_policy(config.agent.retry.policy())
        .with_max_iterations(config.agent.max_iterations)
        .with_history_window(config.agent.history_window)
        .with_max_sessions(config.agent.max_sessions);
    if let Some(prompt) = &config.site.system_prompt {
        assistant = assistant.with_system_prompt(prompt);
    }
    Ok(assistant)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_rotate_log_file_shifts_and_drops_oldest() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("assistant.log");
        for (name, body) in [
            ("assistant.log", "current"),
            ("assistant.log.1", "one"),
            ("assistant.log.2", "two"),
            ("assistant.log.3", "three"),
        ] {
            std::fs::write(dir.path().join(name), body).unwrap();
        }

        rotate_log_file(&base, 3);

        assert!(!base.exists());
        let read = |n: u32| std::fs::read_to_string(format!("{}.{n}", base.display())).unwrap();
        assert_eq!(read(1), "current");
        assert_eq!(read(2), "one");
        assert_eq!(read(3), "two");
    }

    #[test]
    fn test_flushing_writer_writes_through() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.log");
        let file = std::fs::File::create(&path).unwrap();
        let mut writer = FlushingWriter::new(file);
        writer.write_all(b"line one\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "line one\n");
    }

    #[test]
    fn test_build_assistant_requires_api_key() {
        let config = AssistantConfig::default();
        assert!(build_assistant(&config).is_err());
    }

    #[test]
    fn test_build_assistant_loads_url_lists() {
        let dir = tempfile::tempdir().unwrap();
        let list = dir.path().join("pages.txt");
        std::fs::write(&list, "https://site.test/\nhttps://site.test/vps-hosting\n").unwrap();

        let mut config = AssistantConfig::default();
        config.model.api_key = "sk-test".into();
        config.site.url_lists = vec![list];
        config.site.system_prompt = Some("Custom prompt".into());

        let assistant = build_assistant(&config).unwrap();
        assert_eq!(assistant.get_all_urls().len(), 2);
        assert_eq!(assistant.model_name(), "gpt-4o-mini");
    }
}
