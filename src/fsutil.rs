//! Filesystem helpers for generated files and bind-mount directory trees.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Outcome category of a single file operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    Success,
    Warning,
    Skipped,
    Error,
}

impl OperationStatus {
    /// Terminal marker for this status
    pub fn symbol(&self) -> &'static str {
        match self {
            OperationStatus::Success => "✅",
            OperationStatus::Warning => "⚠️",
            OperationStatus::Skipped => "⏭️",
            OperationStatus::Error => "❌",
        }
    }
}

/// Result of a file operation. Never raised; failures are reported here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileOperationResult {
    pub status: OperationStatus,
    pub path: PathBuf,
    pub message: String,
}

impl FileOperationResult {
    pub fn new(status: OperationStatus, path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            status,
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == OperationStatus::Success
    }
}

impl fmt::Display for FileOperationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}: {}",
            self.status.symbol(),
            self.path.display(),
            self.message
        )
    }
}

/// Asks the operator yes/no questions
pub trait Prompter: Send + Sync {
    /// Ask `question`; an empty answer yields `default`
    fn confirm(&self, question: &str, default: bool) -> bool;
}

/// Reads answers from standard input
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinPrompter;

impl Prompter for StdinPrompter {
    fn confirm(&self, question: &str, default: bool) -> bool {
        let hint = if default { "[Y/n]" } else { "[y/N]" };
        print!("{} {} ", question, hint);
        if io::stdout().flush().is_err() {
            return default;
        }

        let mut answer = String::new();
        if io::stdin().lock().read_line(&mut answer).is_err() {
            return default;
        }
        parse_answer(&answer, default)
    }
}

/// Answers every question with yes (`--yes`)
#[derive(Debug, Default, Clone, Copy)]
pub struct AssumeYes;

impl Prompter for AssumeYes {
    fn confirm(&self, question: &str, _default: bool) -> bool {
        debug!("Assuming yes: {}", question);
        true
    }
}

pub(crate) fn parse_answer(answer: &str, default: bool) -> bool {
    match answer.trim().to_ascii_lowercase().as_str() {
        "" => default,
        "y" | "yes" => true,
        _ => false,
    }
}

/// How conflicts are resolved while writing
#[derive(Clone, Copy)]
pub enum WriteMode<'a> {
    /// Never ask; conflicts become errors
    NonInteractive,
    /// Ask the prompter before destructive steps
    Interactive(&'a dyn Prompter),
}

impl fmt::Debug for WriteMode<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteMode::NonInteractive => f.write_str("NonInteractive"),
            WriteMode::Interactive(_) => f.write_str("Interactive"),
        }
    }
}

/// Write `content` to `path`, creating parent directories.
///
/// A directory squatting on `path` is an error in non-interactive mode and
/// untouched; in interactive mode the prompter decides whether it is removed.
/// An existing file is overwritten unless an interactive prompter declines.
pub fn safe_write_file(path: &Path, content: &str, mode: WriteMode<'_>) -> FileOperationResult {
    if path.is_dir() {
        match mode {
            WriteMode::NonInteractive => {
                return FileOperationResult::new(
                    OperationStatus::Error,
                    path,
                    "path exists as a directory; remove it or rerun interactively",
                );
            }
            WriteMode::Interactive(prompter) => {
                let question = format!(
                    "{} exists as a directory. Remove it and write the file?",
                    path.display()
                );
                if !prompter.confirm(&question, false) {
                    return FileOperationResult::new(
                        OperationStatus::Skipped,
                        path,
                        "directory left in place",
                    );
                }
                if let Err(e) = std::fs::remove_dir_all(path) {
                    return FileOperationResult::new(
                        OperationStatus::Error,
                        path,
                        format!("failed to remove directory: {}", e),
                    );
                }
                info!("Removed directory {}", path.display());
            }
        }
    } else if path.is_file()
        && let WriteMode::Interactive(prompter) = mode
    {
        let question = format!("{} exists. Overwrite?", path.display());
        if !prompter.confirm(&question, true) {
            return FileOperationResult::new(
                OperationStatus::Skipped,
                path,
                "User chose not to overwrite file",
            );
        }
    }

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && let Err(e) = std::fs::create_dir_all(parent)
    {
        return FileOperationResult::new(
            OperationStatus::Error,
            path,
            format!("failed to create parent directory: {}", e),
        );
    }

    match std::fs::write(path, content) {
        Ok(()) => {
            debug!("Wrote {}", path.display());
            FileOperationResult::new(OperationStatus::Success, path, "written")
        }
        Err(e) => FileOperationResult::new(
            OperationStatus::Error,
            path,
            format!("failed to write: {}", e),
        ),
    }
}

/// Subdirectories of a bind-mounted data directory
pub const APP_SUBDIRS: [&str; 5] = ["etc", "data", "logs", "backup", "access"];

/// Create the bind-mount tree under `data_dir`; returns the directories.
pub fn create_artifactory_structure(data_dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut created = Vec::with_capacity(APP_SUBDIRS.len());
    for name in APP_SUBDIRS {
        let dir = data_dir.join(name);
        std::fs::create_dir_all(&dir)?;
        created.push(dir);
    }
    Ok(created)
}

/// Create `<data_dir>/postgresql/data`, world-writable where supported
pub fn create_postgres_structure(data_dir: &Path) -> io::Result<PathBuf> {
    let dir = data_dir.join("postgresql").join("data");
    std::fs::create_dir_all(&dir)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) = std::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o777)) {
            warn!("Could not relax permissions on {}: {}", dir.display(), e);
        }
    }

    Ok(dir)
}

/// Host operating system family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Linux,
    Macos,
    Windows,
    Other,
}

impl Platform {
    pub fn current() -> Self {
        match std::env::consts::OS {
            "linux" => Platform::Linux,
            "macos" => Platform::Macos,
            "windows" => Platform::Windows,
            _ => Platform::Other,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Platform::Linux => "linux",
            Platform::Macos => "macos",
            Platform::Windows => "windows",
            Platform::Other => "other",
        };
        f.write_str(name)
    }
}

/// Manual ownership steps for bind-mounted directories.
///
/// Nothing is changed automatically; the operator runs these.
pub fn permission_instructions(platform: Platform, data_dir: &Path) -> Vec<String> {
    use crate::env::stack::APP_OWNER;
    let dir = data_dir.display();
    match platform {
        Platform::Linux => vec![
            format!("sudo chown -R {} {}", APP_OWNER, dir),
            format!("sudo chmod -R 755 {}", dir),
            format!("sudo chmod -R 777 {}/postgresql", dir),
        ],
        Platform::Macos => vec![
            format!("Add {} to Docker Desktop > Settings > Resources > File Sharing", dir),
            "Docker Desktop maps ownership automatically; no chown is needed".to_string(),
        ],
        Platform::Windows => vec![
            format!("Share the drive containing {} with Docker Desktop", dir),
            "Prefer named volumes (--named-volumes) to avoid permission issues".to_string(),
        ],
        Platform::Other => vec![format!(
            "Ensure uid:gid {} can read and write {}",
            APP_OWNER, dir
        )],
    }
}
