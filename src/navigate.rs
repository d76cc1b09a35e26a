//! Opening the payment portal in the user's browser.
//!
//! Honors `$BROWSER` first, then falls back to platform defaults (`open` on
//! macOS, `xdg-open` on Linux, `cmd /C start` on Windows).

use anyhow::{Context, Result};
use std::process::Command;

pub fn open_in_browser(url: &str) -> Result<()> {
    if let Ok(browser) = std::env::var("BROWSER") {
        Command::new(&browser)
            .arg(url)
            .spawn()
            .with_context(|| format!("failed to launch browser '{browser}'"))?;
        return Ok(());
    }

    #[cfg(target_os = "macos")]
    let spawned = Command::new("open").arg(url).spawn();

    #[cfg(target_os = "linux")]
    let spawned = Command::new("xdg-open").arg(url).spawn();

    #[cfg(target_os = "windows")]
    let spawned = Command::new("cmd").args(["/C", "start", url]).spawn();

    spawned.context("failed to open the portal URL in a browser")?;
    Ok(())
}
