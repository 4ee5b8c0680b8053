use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Diagnostics file inside the data directory
pub const LOG_FILE: &str = "sweeplab.log";
/// Maximum log file size before rotation (5 MB)
const MAX_LOG_SIZE: u64 = 5 * 1024 * 1024;
/// Size to keep after rotation (1 MB of most recent logs)
const KEEP_SIZE: u64 = 1024 * 1024;

/// Trim the log file to its most recent `keep` bytes once it grows past `max`.
fn rotate_log_if_needed(log_path: &Path, max: u64, keep: u64) -> io::Result<()> {
    let len = match fs::metadata(log_path) {
        Ok(metadata) => metadata.len(),
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };
    if len <= max {
        return Ok(());
    }

    let mut file = File::open(log_path)?;
    file.seek(SeekFrom::Start(len.saturating_sub(keep)))?;
    let mut buffer = Vec::new();
    file.read_to_end(&mut buffer)?;
    drop(file);

    // Start at a line boundary
    let skip = buffer
        .iter()
        .position(|&b| b == b'\n')
        .map(|i| i + 1)
        .unwrap_or(0);

    let mut file = File::create(log_path)?;
    file.write_all(b"--- Log rotated (older entries removed) ---\n")?;
    file.write_all(&buffer[skip..])?;

    Ok(())
}

/// Hands out writers to the shared log file
#[derive(Clone)]
struct LogWriterFactory {
    file: Arc<Mutex<File>>,
}

struct LogWriter {
    file: Arc<Mutex<File>>,
}

impl LogWriter {
    fn with_file<T>(&self, f: impl FnOnce(&mut File) -> io::Result<T>) -> io::Result<T> {
        let mut file = self
            .file
            .lock()
            .map_err(|_| io::Error::other("log file lock poisoned"))?;
        f(&mut file)
    }
}

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.with_file(|file| file.write(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.with_file(|file| file.flush())
    }
}

impl<'a> MakeWriter<'a> for LogWriterFactory {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogWriter {
            file: self.file.clone(),
        }
    }
}

/// Initialize logging to `{data_dir}/sweeplab.log`.
///
/// The file is trimmed to its last 1MB once it exceeds 5MB. `RUST_LOG`
/// overrides `level`.
pub fn init_logging(data_dir: &Path, level: &str) -> color_eyre::Result<()> {
    fs::create_dir_all(data_dir)?;

    let log_path = data_dir.join(LOG_FILE);

    if let Err(e) = rotate_log_if_needed(&log_path, MAX_LOG_SIZE, KEEP_SIZE) {
        eprintln!("Warning: Failed to rotate log file: {e}");
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    let default_filter = format!("sweeplab={level},sweeplab_core={level}");
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(LogWriterFactory {
                    file: Arc::new(Mutex::new(file)),
                })
                .with_ansi(false)
                .with_target(true)
                .with_thread_names(true),
        )
        .init();

    tracing::info!(log_path = %log_path.display(), "Logging initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_small_log_untouched() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(LOG_FILE);
        fs::write(&path, "one\ntwo\n").unwrap();

        rotate_log_if_needed(&path, 100, 10).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "one\ntwo\n");
    }

    #[test]
    fn test_rotation_keeps_whole_recent_lines() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(LOG_FILE);
        let content: String = (0..20).map(|i| format!("line {i:02}\n")).collect();
        fs::write(&path, &content).unwrap();

        // Each line is 8 bytes; keeping 20 bytes lands mid-line
        rotate_log_if_needed(&path, 50, 20).unwrap();
        let rotated = fs::read_to_string(&path).unwrap();
        assert_eq!(
            rotated,
            "--- Log rotated (older entries removed) ---\nline 18\nline 19\n"
        );
    }

    #[test]
    fn test_missing_log_is_fine() {
        let temp_dir = TempDir::new().unwrap();
        rotate_log_if_needed(&temp_dir.path().join(LOG_FILE), 1, 1).unwrap();
    }
}
