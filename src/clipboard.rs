//! Best-effort clipboard access.
//!
//! A dedicated thread processes copy requests sequentially and keeps each
//! clipboard instance alive for a couple of seconds so clipboard managers on
//! Linux have time to read the contents. Failures never block the wizard;
//! callers log and move on.

use anyhow::Result;
use std::sync::mpsc as std_mpsc;
use std::sync::OnceLock;
use std::time::Duration;

static CLIPBOARD_SENDER: OnceLock<std_mpsc::Sender<String>> = OnceLock::new();

/// How long each clipboard instance is held alive after a copy.
const HOLD_DURATION: Duration = Duration::from_secs(2);

fn init_clipboard_manager() -> Result<&'static std_mpsc::Sender<String>> {
    CLIPBOARD_SENDER.get_or_init(|| {
        let (tx, rx) = std_mpsc::channel::<String>();

        std::thread::spawn(move || {
            use arboard::Clipboard;

            for text in rx {
                match Clipboard::new() {
                    Ok(mut clipboard) => {
                        if clipboard.set_text(&text).is_ok() {
                            std::thread::sleep(HOLD_DURATION);
                        } else {
                            tracing::warn!("clipboard write failed");
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "clipboard unavailable"),
                }
            }
        });

        tx
    });

    CLIPBOARD_SENDER
        .get()
        .ok_or_else(|| anyhow::anyhow!("failed to initialize clipboard manager"))
}

/// Queue `text` for copying. Returns immediately; the actual write happens on
/// the manager thread.
pub fn copy_to_clipboard(text: &str) -> Result<()> {
    let sender = init_clipboard_manager()?;
    sender
        .send(text.to_string())
        .map_err(|_| anyhow::anyhow!("clipboard manager channel closed"))?;
    Ok(())
}
