//! Workspace commands
//!
//! Implements the user-facing operations on a workspace and the tooth
//! authoring helpers. Workspace operations take the execution
//! [`Context`](crate::context::Context).

pub mod freeze;
pub mod init;
pub mod install;
pub mod list;
pub mod pack;
pub mod uninstall;

pub use freeze::{freeze, freeze_to_file, FreezeError};
pub use init::{init_manifest, InitError};
pub use install::{decide_action, install_specifiers, InstallAction, InstallOptions, InstallReport, PlanError};
pub use list::{list_installed, list_upgradable, ListError, Upgradable};
pub use pack::{pack_tooth, PackError, PACKED_EXTENSION};
pub use uninstall::{uninstall_teeth, UninstallError};
