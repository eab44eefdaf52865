#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Terminal plumbing for the `collision_map` binary.
//!
//! Bars are created through [`IndicatifProgress::add`] and handed to the
//! pipeline as [`ProgressCallback`] trait objects. Log records go through
//! `indicatif-log-bridge`, so a warning printed mid-join does not tear the
//! bars.

use std::sync::Arc;
use std::time::Duration;

use collision_map_spatial::progress::ProgressCallback;
use indicatif::{ProgressBar, ProgressStyle};
use indicatif_log_bridge::LogWrapper;
use log::LevelFilter;

pub use indicatif::MultiProgress;

const SPINNER_TEMPLATE: &str = "{spinner:.cyan} {msg}";
const STAGES_TEMPLATE: &str = "{msg:<28} {wide_bar:.green/dim} stage {pos}/{len} [{elapsed}]";
const POINTS_TEMPLATE: &str = "  {msg:<26} {wide_bar:.cyan/dim} {human_pos}/{human_len} [{eta}]";

/// What a bar counts once the pipeline reports a total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarKind {
    /// Stages of one analysis run.
    Stages,
    /// Points tested by a spatial join.
    Points,
}

impl BarKind {
    const fn template(self) -> &'static str {
        match self {
            Self::Stages => STAGES_TEMPLATE,
            Self::Points => POINTS_TEMPLATE,
        }
    }

    fn counting_style(self) -> ProgressStyle {
        ProgressStyle::with_template(self.template())
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ")
    }
}

/// A bar that spins until [`ProgressCallback::set_total`] gives it a length.
pub struct IndicatifProgress {
    bar: ProgressBar,
    kind: BarKind,
}

impl IndicatifProgress {
    /// Adds a spinner showing `message` to `multi`.
    #[must_use]
    pub fn add(multi: &MultiProgress, kind: BarKind, message: &str) -> Arc<dyn ProgressCallback> {
        let bar = multi.add(ProgressBar::new_spinner());
        bar.set_style(
            ProgressStyle::with_template(SPINNER_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.enable_steady_tick(Duration::from_millis(100));
        bar.set_message(message.to_string());

        Arc::new(Self { bar, kind })
    }
}

impl ProgressCallback for IndicatifProgress {
    fn set_total(&self, total: u64) {
        self.bar.set_style(self.kind.counting_style());
        self.bar.set_length(total);
        self.bar.set_position(0);
    }

    fn inc(&self, delta: u64) {
        self.bar.inc(delta);
    }

    fn set_message(&self, msg: String) {
        self.bar.set_message(msg);
    }

    fn finish(&self, msg: String) {
        self.bar.finish_with_message(msg);
    }

    fn finish_and_clear(&self) {
        self.bar.finish_and_clear();
    }
}

/// Installs `pretty_env_logger` behind `indicatif-log-bridge` and returns the
/// [`MultiProgress`] every bar must be added to.
///
/// Records at `default_level` and above are shown; `RUST_LOG` filters, when
/// set, are applied on top. A second call keeps the first logger.
#[must_use]
pub fn init_logger(default_level: LevelFilter) -> MultiProgress {
    let multi = MultiProgress::new();

    let mut builder = pretty_env_logger::formatted_builder();
    builder.filter_level(default_level);
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    let logger = builder.build();
    let level = logger.filter();

    if LogWrapper::new(multi.clone(), logger).try_init().is_ok() {
        log::set_max_level(level);
    }

    multi
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hidden(kind: BarKind) -> IndicatifProgress {
        IndicatifProgress {
            bar: ProgressBar::hidden(),
            kind,
        }
    }

    #[test]
    fn templates_parse() {
        assert!(ProgressStyle::with_template(SPINNER_TEMPLATE).is_ok());
        for kind in [BarKind::Stages, BarKind::Points] {
            assert!(ProgressStyle::with_template(kind.template()).is_ok());
        }
    }

    #[test]
    fn set_total_restarts_the_count() {
        let progress = hidden(BarKind::Points);
        progress.inc(7);
        progress.set_total(20);
        assert_eq!(progress.bar.length(), Some(20));
        assert_eq!(progress.bar.position(), 0);

        progress.inc(5);
        assert_eq!(progress.bar.position(), 5);
    }

    #[test]
    fn finish_keeps_the_final_message() {
        let progress = hidden(BarKind::Stages);
        progress.set_total(3);
        progress.finish("done".to_string());
        assert!(progress.bar.is_finished());
        assert_eq!(progress.bar.message(), "done");
    }
}
