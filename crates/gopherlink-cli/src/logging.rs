//! Log setup; everything goes to stderr so stdout stays machine readable

use tracing::Level;

/// Level from `--log-level`, falling back to `--verbose`
pub fn parse_level(log_level: Option<&str>, verbose: bool) -> Level {
    match log_level.map(|l| l.to_lowercase()).as_deref() {
        Some("trace") => Level::TRACE,
        Some("debug") => Level::DEBUG,
        Some("info") => Level::INFO,
        Some("warn") => Level::WARN,
        Some("error") => Level::ERROR,
        _ if verbose => Level::DEBUG,
        _ => Level::WARN,
    }
}

pub fn init_logging(log_level: Option<&str>, verbose: bool) {
    use tracing_subscriber::fmt;

    let level = parse_level(log_level, verbose);
    let detailed = level >= Level::DEBUG;
    let _ = fmt()
        .with_max_level(level)
        .with_target(detailed)
        .with_file(detailed)
        .with_line_number(detailed)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_level_wins() {
        assert_eq!(parse_level(Some("ERROR"), true), Level::ERROR);
        assert_eq!(parse_level(Some("trace"), false), Level::TRACE);
    }

    #[test]
    fn test_verbose_and_default() {
        assert_eq!(parse_level(None, true), Level::DEBUG);
        assert_eq!(parse_level(None, false), Level::WARN);
        assert_eq!(parse_level(Some("loud"), false), Level::WARN);
    }
}
