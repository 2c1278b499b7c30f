use cosmic::app::Settings;
use cosmic::cosmic_config::CosmicConfigEntry;
use cosmic::iced::Limits;

mod application;
mod components;
mod localize;
mod message;
mod pages;

use frontdesk::board;
use frontdesk::config;
use frontdesk::core;
use frontdesk::sync;

use application::{Flags, FrontDesk};
use config::{APP_ID, BoardConfig, CONFIG_VERSION};

/// Journal logger that keeps this crate at info (debug when toggled) and
/// everything else at warn.
struct FilteredJournal {
    inner: systemd_journal_logger::JournalLog,
}

impl log::Log for FilteredJournal {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        if metadata.target().starts_with("frontdesk") {
            let max = if frontdesk::debug_logging() { log::LevelFilter::Debug } else { log::LevelFilter::Info };
            metadata.level() <= max
        } else {
            metadata.level() <= log::LevelFilter::Warn
        }
    }

    fn log(&self, record: &log::Record) {
        if self.enabled(record.metadata()) {
            self.inner.log(record);
        }
    }

    fn flush(&self) {
        self.inner.flush();
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cosmic_cfg = cosmic::cosmic_config::Config::new(APP_ID, CONFIG_VERSION)
        .map_err(|e| format!("Failed to open config: {:?}", e))?;
    let config = BoardConfig::get_entry(&cosmic_cfg).unwrap_or_else(|(errs, cfg)| {
        for e in errs {
            eprintln!("Config entry ignored: {:?}", e);
        }
        cfg
    });

    // Logs go to the systemd user journal (`journalctl --user -t frontdesk -f`).
    frontdesk::set_debug_logging(config.debug_logging);
    let journal = systemd_journal_logger::JournalLog::new()?
        .with_syslog_identifier("frontdesk".to_string());
    log::set_boxed_logger(Box::new(FilteredJournal { inner: journal }))?;
    // Global max must be Debug so crate debug logs can pass through when toggled
    log::set_max_level(log::LevelFilter::Debug);

    localize::localize();

    log::info!(
        "Starting with {} backend, {:?} sync",
        config.backend.label(),
        config.sync_mode
    );

    let mut settings = Settings::default();
    settings = settings.size_limits(Limits::NONE.min_width(640.0).min_height(400.0));

    let flags = Flags { config, cosmic_config: cosmic_cfg };
    cosmic::app::run::<FrontDesk>(settings, flags)?;

    Ok(())
}
