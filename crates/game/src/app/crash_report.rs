use std::error::Error;
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Writes `crash-<unix secs>.txt` under `dir` with the full error source chain.
pub(crate) fn write(
    dir: &Path,
    game_title: &str,
    err: &(dyn Error + 'static),
    at: SystemTime,
) -> io::Result<PathBuf> {
    let secs = at
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0);
    fs::create_dir_all(dir)?;
    let path = dir.join(format!("crash-{secs}.txt"));
    fs::write(&path, render(game_title, err, secs))?;
    Ok(path)
}

fn render(game_title: &str, err: &(dyn Error + 'static), secs: u64) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "game: {game_title}");
    let _ = writeln!(out, "version: {}", env!("CARGO_PKG_VERSION"));
    let _ = writeln!(out, "time: {secs}");
    let _ = writeln!(out, "error: {err}");
    let mut source = err.source();
    while let Some(cause) = source {
        let _ = writeln!(out, "caused by: {cause}");
        source = cause.source();
    }
    out
}
