use slog::{o, Drain, Logger};
use slog_async::Async;
use slog_term::{FullFormat, PlainSyncDecorator, TermDecorator};

/// Configuration for setting up the logger
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub async_buffer_size: usize,
    pub use_color: bool,
    /// Drop records below this level
    pub min_level: slog::Level,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            async_buffer_size: 1024,
            use_color: true,
            min_level: slog::Level::Info,
        }
    }
}

impl LoggerConfig {
    /// Debug records included when `verbose` is set
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.min_level = if verbose {
            slog::Level::Debug
        } else {
            slog::Level::Info
        };
        self
    }

    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }
}

/// Sets up a terminal logger writing to stderr
pub fn setup_logger(config: LoggerConfig) -> Logger {
    let decorator = {
        let builder = TermDecorator::new().stderr();
        let builder = if config.use_color {
            builder.force_color()
        } else {
            builder
        };
        builder.build()
    };

    let drain = FullFormat::new(decorator).build().fuse();
    let drain = drain.filter_level(config.min_level).fuse();

    let drain = Async::new(drain)
        .chan_size(config.async_buffer_size)
        .build()
        .fuse();

    Logger::root(drain, o!("version" => env!("CARGO_PKG_VERSION")))
}

/// Synchronous logger over any writer
pub fn setup_plain_logger<W>(writer: W, min_level: slog::Level) -> Logger
where
    W: std::io::Write + Send + 'static,
{
    let decorator = PlainSyncDecorator::new(writer);
    let drain = FullFormat::new(decorator).build().fuse();
    let drain = drain.filter_level(min_level).fuse();
    Logger::root(drain, o!("version" => env!("CARGO_PKG_VERSION")))
}
