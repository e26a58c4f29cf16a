use std::path::{Path, PathBuf};

/// Marks the root of a generated application.
const APP_MARKER: &str = "config/application.rb";

/// Resolve the application root to operate on.
///
/// Priority:
/// 1. `--root` flag / `BASELINE_ROOT` env var (passed in as `explicit`)
/// 2. Walk upward from `cwd` looking for `config/application.rb`
/// 3. Fall back to `cwd`
pub fn resolve_root(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    find_app_root(&cwd).unwrap_or(cwd)
}

fn find_app_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(APP_MARKER).is_file())
        .map(Path::to_path_buf)
}
