//! Post-merge kernel maintenance for Gentoo.
//!
//! After `emerge` installs new kernel sources and `eselect kernel` points
//! `/usr/src/linux` at them, this crate takes the system the rest of the way:
//!
//! - **Seed** - copy a `.config` from an older kernel ([`seed`])
//! - **Build and install** - kernel, modules, initramfs, out-of-tree drivers ([`update`])
//! - **Clean up** - remove kernels older than the fallback ([`inventory`], [`cleanup`])
//! - **Boot** - regenerate the GRUB configuration ([`update`])
//!
//! # Architecture
//!
//! ```text
//! version      KernelVersion: linux-4.14.8-gentoo-r1 -> (4, 14, 8, Some(1))
//!    │
//!    ├── inventory   SelectedKernel, installed versions, retention
//!    │      │
//!    │      └── seed        candidate .config files, operator choice
//!    │
//!    └── cleanup     package, module tree, sources, boot artifacts
//!
//! update       KernelUpdater: SeedConfig → ... → RefreshBootloader
//!    ├── process     CommandRunner (spawns make/genkernel/emerge/grub-mkconfig)
//!    └── settings    roots, commands, failure policy
//! ```
//!
//! Nothing in the library reads global state: roots come from
//! [`settings::Settings`], commands go through a [`process::CommandRunner`],
//! and operator input through a [`seed::Prompt`].

pub mod cleanup;
pub mod error;
pub mod inventory;
pub mod preflight;
pub mod process;
pub mod seed;
pub mod settings;
pub mod update;
pub mod version;

pub use cleanup::{CleanupEngine, CleanupReport};
pub use error::{InventoryError, ParseVersionError, SelectionError, UpdateError};
pub use inventory::{KernelInventory, SelectedKernel};
pub use process::{CommandRunner, SystemRunner};
pub use seed::{ConfigSelector, Prompt, StdinPrompt};
pub use settings::Settings;
pub use update::{FailurePolicy, KernelUpdater, UpdateReport, UpdateStage};
pub use version::KernelVersion;
