use std::env;
use std::sync::LazyLock;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
enum Level {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
}

impl Level {
    fn from_str(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "error" | "err" => Self::Error,
            "warn" | "warning" => Self::Warn,
            "info" => Self::Info,
            "debug" | "trace" => Self::Debug,
            _ => Self::Error,
        }
    }
}

static PGN_REPLAY_LOG: LazyLock<Level> = LazyLock::new(|| {
    env::var("PGN_REPLAY_LOG")
        .map(|s| Level::from_str(&s))
        .unwrap_or(Level::Error)
});

macro_rules! log {
    ($level:expr, $prefix:expr, $msg:expr) => {
        if *PGN_REPLAY_LOG >= $level {
            eprintln!(concat!($prefix, ": {}"), $msg.as_ref());
        }
    };
}

pub fn error(msg: impl AsRef<str>) {
    log!(Level::Error, "ERROR", msg);
}

pub fn warn(msg: impl AsRef<str>) {
    log!(Level::Warn, "WARN", msg);
}

pub fn info(msg: impl AsRef<str>) {
    log!(Level::Info, "INFO", msg);
}

pub fn debug(msg: impl AsRef<str>) {
    log!(Level::Debug, "DEBUG", msg);
}

#[cfg(test)]
mod tests {
    use super::Level;

    #[test]
    fn test_level_from_str_accepts_aliases() {
        assert_eq!(Level::from_str("err"), Level::Error);
        assert_eq!(Level::from_str("WARNING"), Level::Warn);
        assert_eq!(Level::from_str(" info "), Level::Info);
        assert_eq!(Level::from_str("trace"), Level::Debug);
    }

    #[test]
    fn test_level_from_str_unknown_falls_back_to_error() {
        assert_eq!(Level::from_str("verbose"), Level::Error);
        assert_eq!(Level::from_str(""), Level::Error);
    }

    #[test]
    fn test_levels_are_ordered_by_verbosity() {
        assert!(Level::Debug > Level::Info);
        assert!(Level::Info > Level::Warn);
        assert!(Level::Warn > Level::Error);
    }
}
