//! Choosing the `.config` that seeds the new kernel build.
//!
//! After new sources are merged, the selected kernel directory has no
//! configuration. Any older kernel directory that still carries a `.config`
//! is a candidate; the operator picks one, newest first.

mod prompt;

pub use prompt::{Prompt, StdinPrompt};

use std::cmp::Reverse;
use std::path::{Path, PathBuf};

use crate::error::SelectionError;
use crate::inventory::{KernelInventory, SelectedKernel};
use crate::version::KernelVersion;

/// Prefix a directory name must start with to offer its `.config`.
const CANDIDATE_PREFIX: &str = "linux-";

/// File name of a kernel configuration inside a source tree.
pub const CONFIG_FILE: &str = ".config";

/// Lists and chooses prior kernel configurations.
#[derive(Debug, Clone)]
pub struct ConfigSelector {
    inventory: KernelInventory,
    exclude: String,
}

impl ConfigSelector {
    /// Selector over `kernel_root` that never offers `selected`'s own `.config`.
    pub fn new(kernel_root: impl Into<PathBuf>, selected: &SelectedKernel) -> Self {
        Self::excluding(kernel_root, selected.name())
    }

    /// Selector over `kernel_root` that skips the directory named `exclude`.
    pub fn excluding(kernel_root: impl Into<PathBuf>, exclude: &str) -> Self {
        Self {
            inventory: KernelInventory::new(kernel_root),
            exclude: exclude.to_string(),
        }
    }

    pub fn kernel_root(&self) -> &Path {
        self.inventory.kernel_root()
    }

    /// Full paths of every candidate `.config`, newest kernel first.
    ///
    /// An empty result is not an error here; [`ConfigSelector::choose`]
    /// rejects it.
    pub fn find_candidate_configs(&self) -> Result<Vec<PathBuf>, SelectionError> {
        let mut candidates = Vec::new();
        for name in self.inventory.kernel_dir_names()? {
            if !name.starts_with(CANDIDATE_PREFIX) || name == self.exclude {
                continue;
            }
            let config = self.kernel_root().join(&name).join(CONFIG_FILE);
            if config.is_file() {
                candidates.push((KernelVersion::parse(&name)?, config));
            }
        }

        candidates.sort_by_key(|(version, _)| Reverse(*version));
        Ok(candidates.into_iter().map(|(_, path)| path).collect())
    }

    /// Print the numbered candidates and return the one the operator picks.
    pub fn choose(
        &self,
        candidates: &[PathBuf],
        prompt: &mut dyn Prompt,
    ) -> Result<PathBuf, SelectionError> {
        if candidates.is_empty() {
            return Err(SelectionError::NoCandidates {
                root: self.kernel_root().to_path_buf(),
            });
        }

        println!("Select kernel to copy {CONFIG_FILE} from:");
        for (idx, path) in candidates.iter().enumerate() {
            println!("{} - {}", idx, path.display());
        }

        let answer = prompt.prompt(&format!("Choice? [0-{}]:", candidates.len() - 1))?;
        let answer = answer.trim();
        let index: usize = answer.parse().map_err(|_| SelectionError::InvalidChoice {
            input: answer.to_string(),
        })?;

        candidates
            .get(index)
            .cloned()
            .ok_or(SelectionError::OutOfRange {
                index,
                len: candidates.len(),
            })
    }

    /// [`find_candidate_configs`](Self::find_candidate_configs) followed by
    /// [`choose`](Self::choose).
    pub fn select(&self, prompt: &mut dyn Prompt) -> Result<PathBuf, SelectionError> {
        let candidates = self.find_candidate_configs()?;
        self.choose(&candidates, prompt)
    }
}
