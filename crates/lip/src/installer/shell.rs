//! Lifecycle command execution

use super::InstallError;
use crate::context::{Context, Verbosity};
use std::process::{Command, Stdio};
use tracing::debug;

fn shell_command(command: &str) -> Command {
    if cfg!(windows) {
        let mut cmd = Command::new("cmd");
        cmd.arg("/C").arg(command);
        cmd
    } else {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        cmd
    }
}

/// Run commands in order through the platform shell, in the workspace
///
/// Output goes to the terminal unless the context is quiet. The first
/// command that fails stops the sequence.
pub fn run_commands(ctx: &Context, commands: &[String]) -> Result<(), InstallError> {
    for command in commands {
        debug!("Running command: {}", command);

        let mut cmd = shell_command(command);
        cmd.current_dir(ctx.workspace_dir()).envs(ctx.command_env());
        if ctx.verbosity() == Verbosity::Quiet {
            cmd.stdout(Stdio::null()).stderr(Stdio::null());
        }

        let status = cmd.status().map_err(|source| InstallError::CommandSpawn {
            command: command.clone(),
            source,
        })?;

        if !status.success() {
            return Err(InstallError::CommandFailed {
                command: command.clone(),
                status: status.to_string(),
            });
        }
    }

    Ok(())
}
