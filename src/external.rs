use std::io;
use std::path::Path;
use std::process::Command;

/// Token in an external command line replaced by the current file path.
pub const PATH_PLACEHOLDER: &str = "%";

/// Runs programs on behalf of the `!` command.
///
/// Only failing to start the program is an error. What the program does
/// with its exit code is its own business.
pub trait Launcher {
    fn run(&mut self, argv: &[String]) -> io::Result<()>;
}

/// Spawns the program with inherited stdio and waits for it to exit.
pub struct Shell;

impl Launcher for Shell {
    fn run(&mut self, argv: &[String]) -> io::Result<()> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty command line"))?;
        let status = Command::new(program).args(args).status()?;
        if !status.success() {
            log::warn!("'{}' exited with {}", argv.join(" "), status);
        }
        Ok(())
    }
}

/// Replace every placeholder token with `path`.
pub fn substitute(argv: &[String], path: &Path) -> Vec<String> {
    let path = path.to_string_lossy();
    argv.iter()
        .map(|arg| {
            if arg == PATH_PLACEHOLDER {
                path.to_string()
            } else {
                arg.clone()
            }
        })
        .collect()
}
