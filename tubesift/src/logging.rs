use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use tubesift_core::config::Verbosity;
use tubesift_core::targets;

/// Filter directives for the chosen verbosity categories. Warnings and errors
/// are always shown, as are run banners.
pub fn directives(verbosity: &[Verbosity]) -> String {
    if verbosity.contains(&Verbosity::All) {
        return "info".to_string();
    }

    let mut directives = vec!["warn".to_string(), format!("{}=info", targets::RUN)];
    for category in verbosity {
        let target = match category {
            Verbosity::Videos => targets::VIDEOS,
            Verbosity::Credentials => targets::CREDENTIALS,
            Verbosity::Func => targets::FUNC,
            Verbosity::All | Verbosity::None => continue,
        };
        directives.push(format!("{target}=info"));
    }
    directives.join(",")
}

/// `RUST_LOG` when set and valid, the verbosity categories otherwise.
pub fn filter(verbosity: &[Verbosity]) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives(verbosity)))
}

/// Installs the global subscriber. A second call is a no-op.
pub fn init(verbosity: &[Verbosity], fancy: bool) {
    let _ = tracing_subscriber::registry()
        .with(filter(verbosity))
        .with(fmt::layer().with_ansi(fancy).with_target(false))
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn all_shows_everything_at_info() {
        assert_eq!(directives(&[Verbosity::All, Verbosity::Func]), "info");
    }

    #[test]
    fn none_keeps_only_warnings_and_banners() {
        assert_eq!(directives(&[Verbosity::None]), "warn,tubesift::run=info");
    }

    #[test]
    fn categories_enable_their_targets() {
        assert_eq!(
            directives(&[Verbosity::Videos, Verbosity::Func]),
            "warn,tubesift::run=info,tubesift::videos=info,tubesift::func=info"
        );
    }

    #[test]
    #[serial]
    fn rust_log_takes_precedence() {
        std::env::set_var("RUST_LOG", "debug");
        let from_env = filter(&[Verbosity::None]).to_string();
        std::env::remove_var("RUST_LOG");

        assert_eq!(from_env, "debug");
        let from_settings = filter(&[Verbosity::Credentials]).to_string();
        assert!(from_settings.contains("tubesift::credentials=info"), "got {from_settings}");
    }
}
