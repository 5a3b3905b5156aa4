use anyhow::Context;
use inference::Stage;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "gif", "tif", "tiff", "webp"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledImage {
    pub path: PathBuf,
    pub stage: Stage,
}

/// Lowercase with spaces, underscores and hyphens removed, so
/// `very_mild_dementia` and `Very mild Dementia` compare equal.
fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, ' ' | '_' | '-'))
        .flat_map(char::to_lowercase)
        .collect()
}

/// The stage a class directory holds, if its name is one of the labels.
pub fn stage_for_dir(name: &str) -> Option<Stage> {
    let wanted = normalize_name(name);
    Stage::ALL
        .into_iter()
        .find(|stage| normalize_name(stage.as_str()) == wanted)
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

/// Collect `<root>/<label>/<image>` files, sorted by path.
///
/// Directories that match no label are skipped with a warning; files that
/// are not images are ignored.
pub fn discover(root: &Path) -> anyhow::Result<Vec<LabeledImage>> {
    anyhow::ensure!(root.is_dir(), "{} is not a directory", root.display());

    let root_str = root
        .to_str()
        .with_context(|| format!("{} is not valid UTF-8", root.display()))?;
    let pattern = format!("{}/*/*", glob::Pattern::escape(root_str));

    let mut images = Vec::new();
    let mut skipped = BTreeSet::new();

    for entry in glob::glob(&pattern)? {
        let path = entry?;
        if !path.is_file() || !is_image(&path) {
            continue;
        }

        let dir_name = path
            .parent()
            .and_then(Path::file_name)
            .and_then(|name| name.to_str())
            .unwrap_or_default();

        match stage_for_dir(dir_name) {
            Some(stage) => images.push(LabeledImage { path, stage }),
            None => {
                skipped.insert(dir_name.to_string());
            }
        }
    }

    for dir in &skipped {
        tracing::warn!(directory = %dir, "Directory does not match any label; skipped");
    }

    images.sort_by(|a, b| a.path.cmp(&b.path));
    tracing::info!(root = %root.display(), images = images.len(), "Dataset discovered");
    Ok(images)
}
