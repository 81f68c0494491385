use std::sync::atomic::{AtomicBool, Ordering};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Global flag to control per-link route debug logging
pub static ROUTE_DEBUG_ENABLED: AtomicBool = AtomicBool::new(false);

/// Set route debug logging on/off
pub fn set_route_debug(enabled: bool) {
    ROUTE_DEBUG_ENABLED.store(enabled, Ordering::Relaxed);
    tracing::info!("🔧 Route debug logging {}", if enabled { "ENABLED" } else { "DISABLED" });
}

/// Check if route debug logging is enabled
pub fn is_route_debug_enabled() -> bool {
    ROUTE_DEBUG_ENABLED.load(Ordering::Relaxed)
}

/// Route debug macro - only logs if route debug is enabled.
///
/// Emits at info so the flag alone is enough to see the lines.
#[macro_export]
macro_rules! route_debug {
    ($($arg:tt)*) => {
        if $crate::log::ROUTE_DEBUG_ENABLED.load(std::sync::atomic::Ordering::Relaxed) {
            tracing::info!("ROUTE_DEBUG {}", format_args!($($arg)*));
        }
    };
}

/// Install the global subscriber. `RUST_LOG` overrides the default filter.
///
/// Calling it twice is harmless; the second install is ignored.
pub fn init_logging(verbose: bool) {
    let default_filter = if verbose {
        "audio_isolator_lib=debug,audio_isolator=debug"
    } else {
        "info"
    };
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    /// Run `body` under the same filter `init_logging(false)` installs
    fn capture_at_default_level(body: impl FnOnce()) -> String {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::registry()
            .with(tracing_subscriber::EnvFilter::new("info"))
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(move || writer.clone()),
            );
        tracing::subscriber::with_default(subscriber, body);
        captured.text()
    }

    #[test]
    #[serial]
    fn test_route_debug_toggle() {
        set_route_debug(true);
        assert!(is_route_debug_enabled());
        set_route_debug(false);
        assert!(!is_route_debug_enabled());
    }

    #[test]
    #[serial]
    fn test_route_debug_lines_pass_default_filter() {
        let output = capture_at_default_level(|| {
            set_route_debug(true);
            crate::route_debug!("Linking port {} -> {}", 11, 31);
            set_route_debug(false);
        });
        assert!(output.contains("ROUTE_DEBUG Linking port 11 -> 31"), "{}", output);
    }

    #[test]
    #[serial]
    fn test_route_debug_silent_when_disabled() {
        set_route_debug(false);
        let output = capture_at_default_level(|| {
            crate::route_debug!("Linking port {} -> {}", 11, 31);
        });
        assert!(!output.contains("Linking port"), "{}", output);
    }

    #[test]
    fn test_init_logging_twice() {
        init_logging(false);
        init_logging(true);
    }
}
