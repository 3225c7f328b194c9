//! Filesystem-backed document store
//!
//! All paths handed to the vault are vault-relative; a leading `/` names the
//! root. Paths that would escape the root after normalization are rejected.

use super::ToolError;
use ignore::WalkBuilder;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

/// Folder (under the root) that receives deleted entries
pub const TRASH_DIR: &str = ".trash";

pub const DEFAULT_SEARCH_LIMIT: usize = 20;

/// Longest matching line echoed in search results
const MAX_SNIPPET_CHARS: usize = 200;

/// Human-readable byte size: `512 B`, `1.2 KB`, `3.4 MB`
pub fn format_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    #[allow(clippy::cast_precision_loss)] // display only
    let b = bytes as f64;
    if b < KB {
        format!("{bytes} B")
    } else if b < MB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{:.1} MB", b / MB)
    }
}

pub struct Vault {
    root: PathBuf,
    /// Vault-relative path of the focused entry
    active_file: RwLock<Option<String>>,
}

impl Vault {
    /// Open a vault rooted at an existing directory
    pub fn open(root: impl AsRef<Path>) -> std::io::Result<Self> {
        let root = std::fs::canonicalize(root)?;
        if !root.is_dir() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{} is not a directory", root.display()),
            ));
        }
        Ok(Self {
            root,
            active_file: RwLock::new(None),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn set_active_file(&self, path: Option<String>) {
        *self.active_file.write().await = path;
    }

    pub async fn active_file(&self) -> Option<String> {
        self.active_file.read().await.clone()
    }

    /// Normalize a vault-relative path; `Ok(None)` names the root
    fn normalize(path: &str) -> Result<Option<PathBuf>, ToolError> {
        let mut parts: Vec<&std::ffi::OsStr> = Vec::new();
        for component in Path::new(path.trim()).components() {
            match component {
                Component::Normal(part) => parts.push(part),
                Component::ParentDir => {
                    if parts.pop().is_none() {
                        return Err(ToolError::InvalidArguments(format!(
                            "Path escapes the vault: {path}"
                        )));
                    }
                }
                Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
            }
        }
        if parts.is_empty() {
            return Ok(None);
        }
        Ok(Some(parts.iter().collect()))
    }

    /// Resolve to an absolute path inside the root
    pub fn resolve(&self, path: &str) -> Result<PathBuf, ToolError> {
        Ok(match Self::normalize(path)? {
            Some(rel) => self.root.join(rel),
            None => self.root.clone(),
        })
    }

    /// Resolve a path that must name an entry, not the root itself
    fn resolve_entry(&self, path: &str) -> Result<PathBuf, ToolError> {
        match Self::normalize(path)? {
            Some(rel) => Ok(self.root.join(rel)),
            None => Err(ToolError::InvalidArguments(
                "Path must name a file or folder inside the vault".to_string(),
            )),
        }
    }

    /// Vault-relative display form with forward slashes
    pub fn relative(&self, abs: &Path) -> String {
        let rel = abs.strip_prefix(&self.root).unwrap_or(abs);
        rel.components()
            .filter_map(|c| match c {
                Component::Normal(p) => Some(p.to_string_lossy()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/")
    }

    async fn metadata(&self, abs: &Path, path: &str) -> Result<std::fs::Metadata, ToolError> {
        fs::metadata(abs).await.map_err(|e| ToolError::io(path, &e))
    }

    async fn ensure_parent(&self, abs: &Path, path: &str) -> Result<(), ToolError> {
        if let Some(parent) = abs.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| ToolError::io(path, &e))?;
        }
        Ok(())
    }

    /// List entries under `path`; folders as `name/`, files as `name (size)`
    pub async fn list(&self, path: &str, recursive: bool) -> Result<String, ToolError> {
        let dir = self.resolve(path)?;
        let meta = self.metadata(&dir, path).await?;
        if !meta.is_dir() {
            return Err(ToolError::failed(format!("{path} is not a folder")));
        }

        let lines = tokio::task::spawn_blocking(move || {
            let mut walker = vault_walker(&dir);
            walker.max_depth(if recursive { None } else { Some(1) });

            let mut lines = Vec::new();
            for entry in walker.build().flatten() {
                if entry.depth() == 0 {
                    continue;
                }
                let rel = entry
                    .path()
                    .strip_prefix(&dir)
                    .unwrap_or(entry.path())
                    .to_string_lossy()
                    .replace('\\', "/");
                let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
                if is_dir {
                    lines.push(format!("{rel}/"));
                } else {
                    let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
                    lines.push(format!("{rel} ({})", format_size(size)));
                }
            }
            lines
        })
        .await
        .map_err(|e| ToolError::failed(format!("Listing failed: {e}")))?;

        if lines.is_empty() {
            return Ok("(empty folder)".to_string());
        }
        Ok(lines.join("\n"))
    }

    pub async fn read(&self, path: &str) -> Result<String, ToolError> {
        let abs = self.resolve_entry(path)?;
        if self.metadata(&abs, path).await?.is_dir() {
            return Err(ToolError::failed(format!("{path} is a folder")));
        }
        fs::read_to_string(&abs)
            .await
            .map_err(|e| ToolError::io(path, &e))
    }

    /// Create or overwrite; parent folders are created as needed
    pub async fn write(&self, path: &str, content: &str) -> Result<String, ToolError> {
        let abs = self.resolve_entry(path)?;
        let existed = match fs::metadata(&abs).await {
            Ok(m) if m.is_dir() => return Err(ToolError::failed(format!("{path} is a folder"))),
            Ok(_) => true,
            Err(_) => false,
        };
        self.ensure_parent(&abs, path).await?;
        fs::write(&abs, content)
            .await
            .map_err(|e| ToolError::io(path, &e))?;
        let verb = if existed { "Updated" } else { "Created" };
        Ok(format!("{verb} {} ({})", self.relative(&abs), format_size(content.len() as u64)))
    }

    /// Replace the first exact occurrence of `old_text`
    pub async fn edit(&self, path: &str, old_text: &str, new_text: &str) -> Result<String, ToolError> {
        if old_text.is_empty() {
            return Err(ToolError::InvalidArguments("oldText must not be empty".to_string()));
        }
        let content = self.read(path).await?;
        let occurrences = content.matches(old_text).count();
        if occurrences == 0 {
            return Err(ToolError::failed(format!(
                "Text to replace was not found in {path}. Read the file and copy the text exactly."
            )));
        }
        let updated = content.replacen(old_text, new_text, 1);
        let abs = self.resolve_entry(path)?;
        fs::write(&abs, &updated)
            .await
            .map_err(|e| ToolError::io(path, &e))?;

        let mut message = format!("Edited {}", self.relative(&abs));
        if occurrences > 1 {
            message.push_str(&format!(" (replaced first of {occurrences} occurrences)"));
        }
        Ok(message)
    }

    /// Case-insensitive substring search over file names and text content
    pub async fn search(
        &self,
        query: &str,
        scope: Option<&str>,
        limit: usize,
        cancel: CancellationToken,
    ) -> Result<String, ToolError> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Err(ToolError::InvalidArguments("query must not be empty".to_string()));
        }
        let scope_path = scope.unwrap_or("/");
        let base = self.resolve(scope_path)?;
        self.metadata(&base, scope_path).await?;
        let root = self.root.clone();
        let limit = limit.max(1);

        let (hits, truncated) = tokio::task::spawn_blocking(move || {
            let mut hits: Vec<String> = Vec::new();
            let walker = vault_walker(&base).build();
            for entry in walker.flatten() {
                if cancel.is_cancelled() {
                    return Err(ToolError::Cancelled);
                }
                if !entry.file_type().is_some_and(|t| t.is_file()) {
                    continue;
                }
                let rel = entry
                    .path()
                    .strip_prefix(&root)
                    .unwrap_or(entry.path())
                    .to_string_lossy()
                    .replace('\\', "/");

                if rel.to_lowercase().contains(&needle) {
                    hits.push(format!("{rel} (name match)"));
                    if hits.len() >= limit {
                        return Ok((hits, true));
                    }
                }

                // Non-text files are skipped
                let Ok(text) = std::fs::read_to_string(entry.path()) else {
                    continue;
                };
                for (i, line) in text.lines().enumerate() {
                    if line.to_lowercase().contains(&needle) {
                        let snippet: String = line.trim().chars().take(MAX_SNIPPET_CHARS).collect();
                        hits.push(format!("{rel}:{}: {snippet}", i + 1));
                        if hits.len() >= limit {
                            return Ok((hits, true));
                        }
                    }
                }
            }
            Ok((hits, false))
        })
        .await
        .map_err(|e| ToolError::failed(format!("Search failed: {e}")))??;

        if hits.is_empty() {
            return Ok(format!("No matches found for \"{query}\""));
        }
        let mut out = hits.join("\n");
        if truncated {
            out.push_str(&format!("\n(results limited to {limit})"));
        }
        Ok(out)
    }

    /// Move an entry into the trash folder, keeping its relative path
    pub async fn delete(&self, path: &str) -> Result<String, ToolError> {
        let abs = self.resolve_entry(path)?;
        self.metadata(&abs, path).await?;
        let rel = self.relative(&abs);
        if rel == TRASH_DIR || rel.starts_with(&format!("{TRASH_DIR}/")) {
            return Err(ToolError::failed(format!("{path} is already in the trash")));
        }

        let mut dest = self.root.join(TRASH_DIR).join(&rel);
        if fs::metadata(&dest).await.is_ok() {
            let stamp = chrono::Utc::now().format("%Y%m%d%H%M%S");
            let name = dest
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            dest.set_file_name(format!("{name}.{stamp}"));
        }
        self.ensure_parent(&dest, path).await?;
        fs::rename(&abs, &dest)
            .await
            .map_err(|e| ToolError::io(path, &e))?;
        Ok(format!("Moved {rel} to trash"))
    }

    pub async fn rename(&self, path: &str, new_path: &str) -> Result<String, ToolError> {
        let from = self.resolve_entry(path)?;
        let to = self.resolve_entry(new_path)?;
        self.metadata(&from, path).await?;
        if fs::metadata(&to).await.is_ok() {
            return Err(ToolError::failed(format!("{new_path} already exists")));
        }
        self.ensure_parent(&to, new_path).await?;
        fs::rename(&from, &to)
            .await
            .map_err(|e| ToolError::io(path, &e))?;
        Ok(format!("Renamed {} to {}", self.relative(&from), self.relative(&to)))
    }

    pub async fn create_folder(&self, path: &str) -> Result<String, ToolError> {
        let abs = self.resolve_entry(path)?;
        if fs::metadata(&abs).await.is_ok() {
            return Err(ToolError::failed(format!("{path} already exists")));
        }
        fs::create_dir_all(&abs)
            .await
            .map_err(|e| ToolError::io(path, &e))?;
        Ok(format!("Created folder {}/", self.relative(&abs)))
    }

    /// Path and content of the focused entry
    pub async fn read_active(&self) -> Result<(String, String), ToolError> {
        let path = self
            .active_file()
            .await
            .ok_or_else(|| ToolError::failed("No file is currently open"))?;
        let content = self.read(&path).await?;
        Ok((path, content))
    }

    /// Append to an existing file, starting on a new line
    pub async fn append(&self, path: &str, content: &str) -> Result<String, ToolError> {
        let mut existing = self.read(path).await?;
        if !existing.is_empty() && !existing.ends_with('\n') {
            existing.push('\n');
        }
        existing.push_str(content);
        let abs = self.resolve_entry(path)?;
        fs::write(&abs, existing)
            .await
            .map_err(|e| ToolError::io(path, &e))?;
        Ok(format!("Appended {} to {}", format_size(content.len() as u64), self.relative(&abs)))
    }

    /// Insert `content` before 1-indexed `line`; `line_count + 1` appends
    pub async fn insert_at_line(&self, path: &str, line: usize, content: &str) -> Result<String, ToolError> {
        let existing = self.read(path).await?;
        let mut lines: Vec<&str> = existing.lines().collect();
        let max = lines.len() + 1;
        if line == 0 || line > max {
            return Err(ToolError::InvalidArguments(format!(
                "line must be between 1 and {max}, got {line}"
            )));
        }
        let tail = lines.split_off(line - 1);
        lines.extend(content.lines());
        lines.extend(tail);
        let mut updated = lines.join("\n");
        if existing.ends_with('\n') || existing.is_empty() {
            updated.push('\n');
        }
        let abs = self.resolve_entry(path)?;
        fs::write(&abs, updated)
            .await
            .map_err(|e| ToolError::io(path, &e))?;
        Ok(format!("Inserted text at line {line} of {}", self.relative(&abs)))
    }
}

/// Sorted walk that skips hidden entries only; ignore files are not honored
fn vault_walker(base: &Path) -> WalkBuilder {
    let mut walker = WalkBuilder::new(base);
    walker
        .hidden(true)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .ignore(false)
        .parents(false)
        .sort_by_file_name(|a, b| a.cmp(b));
    walker
}
