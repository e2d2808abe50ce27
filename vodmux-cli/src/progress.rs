use std::sync::Mutex;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use vodmux_engine::DownloadObserver;

/// Observer that renders segment progress as an indicatif bar and mirrors
/// status lines to the log.
pub struct CliObserver {
    bar: Mutex<Option<ProgressBar>>,
    enabled: bool,
}

impl CliObserver {
    pub fn new(enabled: bool) -> Self {
        Self {
            bar: Mutex::new(None),
            enabled,
        }
    }
}

impl DownloadObserver for CliObserver {
    fn on_progress(&self, attempted: usize, total: usize) {
        if !self.enabled {
            return;
        }
        let mut guard = self.bar.lock().unwrap();
        let bar = guard.get_or_insert_with(|| {
            let bar = ProgressBar::new(total as u64);
            bar.set_style(
                ProgressStyle::with_template(
                    "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} segments",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
            bar
        });
        bar.set_length(total as u64);
        bar.set_position(attempted as u64);
        if attempted >= total {
            bar.finish();
        }
    }

    fn on_status(&self, message: &str) {
        let guard = self.bar.lock().unwrap();
        match guard.as_ref() {
            Some(bar) if !bar.is_finished() => bar.println(message),
            _ => info!("{message}"),
        }
    }
}
