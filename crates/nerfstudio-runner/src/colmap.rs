//! Post-processing of COLMAP sparse reconstructions
//!
//! COLMAP may split a scene into several models (`sparse/0`, `sparse/1`, ...).
//! Training reads `sparse/0`, so after processing the model with the most
//! registered images should be moved into that slot.

use crate::error::{Error, Result};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const SWAP_DIR_NAME: &str = "_temp_model_swap";

/// Result of scanning a sparse directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSelection {
    /// Model with the most registered images
    pub largest: PathBuf,
    /// Registered images in the largest model
    pub registered_images: u64,
    /// Model that should end up in slot `1`
    pub other: Option<PathBuf>,
    /// Number of models that could be read
    pub model_count: usize,
}

/// Number of registered images in a model directory
///
/// Reads the count header of `images.bin`, or counts image records in
/// `images.txt` when only the text export exists.
pub fn registered_image_count(model_dir: &Path) -> Result<u64> {
    let bin = model_dir.join("images.bin");
    if bin.is_file() {
        let mut header = [0u8; 8];
        fs::File::open(&bin)?.read_exact(&mut header)?;
        return Ok(u64::from_le_bytes(header));
    }

    let txt = model_dir.join("images.txt");
    if txt.is_file() {
        return Ok(count_text_images(&fs::read_to_string(&txt)?));
    }

    Err(Error::ModelSelection(format!(
        "no images.bin or images.txt in {}",
        model_dir.display()
    )))
}

/// Each image is a header line followed by a (possibly empty) points line
fn count_text_images(contents: &str) -> u64 {
    let mut count = 0;
    let mut lines = contents.lines().filter(|l| !l.starts_with('#'));
    while let Some(line) = lines.next() {
        if line.trim().is_empty() {
            continue;
        }
        count += 1;
        lines.next();
    }
    count
}

/// Find the model with the most registered images under `sparse_dir`
///
/// Returns `Ok(None)` when no model could be read. Ties go to the model that
/// sorts first. With more than two models, `other` is simply the first
/// non-largest one.
pub fn select_largest_model(sparse_dir: &Path) -> Result<Option<ModelSelection>> {
    if !sparse_dir.is_dir() {
        return Err(Error::ModelSelection(format!(
            "COLMAP model path not found: {}",
            sparse_dir.display()
        )));
    }

    let mut candidates: Vec<PathBuf> = fs::read_dir(sparse_dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.is_dir())
        .collect();
    candidates.sort();

    let mut models = Vec::new();
    for dir in candidates {
        match registered_image_count(&dir) {
            Ok(count) => models.push((dir, count)),
            Err(e) => warn!("Could not load model from {}: {}", dir.display(), e),
        }
    }

    let Some(largest_idx) = models
        .iter()
        .enumerate()
        .fold(None, |best: Option<usize>, (i, (_, count))| match best {
            Some(b) if models[b].1 >= *count => Some(b),
            _ => Some(i),
        })
    else {
        warn!("No valid COLMAP models found in {}", sparse_dir.display());
        return Ok(None);
    };

    let (largest, registered_images) = models[largest_idx].clone();
    info!(
        "Found {} model(s), selected {} with {} registered images",
        models.len(),
        largest.display(),
        registered_images
    );

    if models.len() > 2 {
        warn!("More than two models found, only the largest and one other are reorganized");
    }
    let other = models
        .iter()
        .enumerate()
        .find(|(i, _)| *i != largest_idx)
        .map(|(_, (dir, _))| dir.clone());

    Ok(Some(ModelSelection {
        largest,
        registered_images,
        other,
        model_count: models.len(),
    }))
}

/// Move `largest` into slot `0` and `other` into slot `1`
pub fn move_models(sparse_dir: &Path, largest: &Path, other: Option<&Path>) -> Result<()> {
    let slot0 = sparse_dir.join("0");
    let slot1 = sparse_dir.join("1");

    if largest == slot0 && other.is_none_or(|o| o == slot1) {
        info!("Models are already in the desired configuration");
        return Ok(());
    }

    if largest == slot1 && other == Some(slot0.as_path()) {
        info!("Swapping {} and {}", slot0.display(), slot1.display());
        let swap = sparse_dir.join(SWAP_DIR_NAME);
        fs::rename(&slot0, &swap)?;
        fs::rename(&slot1, &slot0)?;
        fs::rename(&swap, &slot1)?;
        return Ok(());
    }

    if largest != slot0 {
        warn!("Complex model layout, moving the largest model to {}", slot0.display());
        replace_dir(largest, &slot0)?;

        match other {
            Some(other) if other == slot0 => {
                warn!("{} was replaced by the largest model", other.display());
            }
            Some(other) if other != slot1 => replace_dir(other, &slot1)?,
            Some(_) => {}
            None => info!("No other model to move to {}", slot1.display()),
        }
    }

    Ok(())
}

fn replace_dir(from: &Path, to: &Path) -> io::Result<()> {
    if to.exists() {
        fs::remove_dir_all(to)?;
    }
    fs::rename(from, to)?;
    info!("Moved {} to {}", from.display(), to.display());
    Ok(())
}

/// Select the largest model and reorganize `sparse_dir` around it
pub fn select_best_model(sparse_dir: &Path) -> Result<Option<ModelSelection>> {
    let selection = select_largest_model(sparse_dir)?;
    if let Some(selection) = &selection {
        move_models(sparse_dir, &selection.largest, selection.other.as_deref())?;
    }
    Ok(selection)
}
