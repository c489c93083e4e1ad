use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use pipeline::{NotifierDocument, TemplateSource};

/// A validated notifier document plus the template text it points at.
#[derive(Debug)]
pub struct LoadedConfig {
    pub document: NotifierDocument,
    pub template_source: String,
    /// Directory relative template and secret paths are resolved against.
    pub base_dir: PathBuf,
}

/// Reads and validates the notifier document at `path`, then loads its
/// template (inline `content`, or a `uri` relative to the document).
pub fn load(path: &Path) -> Result<LoadedConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read notifier config '{}'", path.display()))?;
    let document = NotifierDocument::from_yaml(&text)
        .with_context(|| format!("invalid notifier config '{}'", path.display()))?;

    let base_dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();

    let template_source = match document.template_source()? {
        TemplateSource::Inline(content) => content,
        TemplateSource::Uri(uri) => {
            let location = uri.strip_prefix("file://").unwrap_or(&uri);
            let template_path = base_dir.join(location);
            std::fs::read_to_string(&template_path).with_context(|| {
                format!("failed to read issue template '{}'", template_path.display())
            })?
        }
    };

    Ok(LoadedConfig {
        document,
        template_source,
        base_dir,
    })
}
