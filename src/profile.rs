//! Start-up scripts run before the shell reads its real input.

use crate::error::ShellError;
use crate::interpreter::{Interpreter, RunStatus};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Read from the home directory.
pub const USER_PROFILE: &str = ".dbshell_profile";

/// Read from the working directory, after the user profile.
pub const LOCAL_PROFILE: &str = ".dbshellrc";

/// The scripts to run at start-up, in order.
///
/// An explicit `conffile` replaces the search and is returned even when it
/// does not exist, so that the failure gets reported. Searched profiles are
/// only returned when they exist.
pub fn startup_scripts(conffile: Option<PathBuf>, home: Option<&Path>, cwd: &Path) -> Vec<PathBuf> {
    if let Some(path) = conffile {
        return vec![path];
    }
    home.map(|home| home.join(USER_PROFILE))
        .into_iter()
        .chain(std::iter::once(cwd.join(LOCAL_PROFILE)))
        .filter(|path| path.is_file())
        .collect()
}

/// Runs `scripts` one after another until one of them does not complete.
pub fn run_startup(interp: &mut Interpreter, scripts: &[PathBuf]) -> Result<RunStatus, ShellError> {
    for path in scripts {
        debug!(path = %path.display(), "running start-up script");
        match interp.run_script(path)? {
            RunStatus::Completed => {}
            other => return Ok(other),
        }
    }
    Ok(RunStatus::Completed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_conffile_replaces_search() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(LOCAL_PROFILE), "").unwrap();
        let scripts = startup_scripts(Some("missing.sql".into()), None, dir.path());
        assert_eq!(scripts, vec![PathBuf::from("missing.sql")]);
    }

    #[test]
    fn test_existing_profiles_in_order() {
        let home = tempfile::tempdir().unwrap();
        let cwd = tempfile::tempdir().unwrap();
        assert!(startup_scripts(None, Some(home.path()), cwd.path()).is_empty());

        fs::write(home.path().join(USER_PROFILE), "").unwrap();
        fs::write(cwd.path().join(LOCAL_PROFILE), "").unwrap();
        assert_eq!(
            startup_scripts(None, Some(home.path()), cwd.path()),
            vec![home.path().join(USER_PROFILE), cwd.path().join(LOCAL_PROFILE)]
        );
    }

    #[test]
    fn test_no_home() {
        let cwd = tempfile::tempdir().unwrap();
        fs::write(cwd.path().join(LOCAL_PROFILE), "").unwrap();
        assert_eq!(
            startup_scripts(None, None, cwd.path()),
            vec![cwd.path().join(LOCAL_PROFILE)]
        );
    }
}
