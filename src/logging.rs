use colored::*;
use std::fmt;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::{FormatEvent, FormatFields, Writer};
use tracing_subscriber::fmt::FmtContext;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

/// Target used for payload dumps of the `print-data` event handler.
pub const EVENT_PRINTER_TARGET: &str = "event_printer";

/// A custom tracing event formatter for colorizing log output based on level.
///
/// The whole line is colored by severity, with no timestamps or level
/// names. Worker processes set a prefix (the runner name) so their lines
/// can be told apart on the coordinator's stderr.
pub struct ColorizedFormatter {
    prefix: Option<String>,
}

impl ColorizedFormatter {
    pub fn new(prefix: Option<String>) -> Self {
        Self { prefix }
    }
}

impl<S, N> FormatEvent<S, N> for ColorizedFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        // Buffer the fields so the color applies to the entire line
        let mut buffer = String::new();
        if let Some(prefix) = &self.prefix {
            buffer.push_str(&format!("[{}] ", prefix));
        }
        let mut buf_writer = Writer::new(&mut buffer);
        ctx.format_fields(buf_writer.by_ref(), event)?;

        let colored_output = match *event.metadata().level() {
            Level::INFO => buffer.white(),
            Level::WARN => buffer.yellow(),
            Level::ERROR => buffer.red(),
            Level::DEBUG => buffer.blue(),
            Level::TRACE => buffer.purple(),
        };

        writeln!(writer, "{}", colored_output)
    }
}

/// Build the log filter: `RUST_LOG` wins, otherwise warnings and payload
/// dumps, or everything at info with `verbose`.
pub fn build_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let default = if verbose {
            "info".to_string()
        } else {
            format!("warn,{}=info", EVENT_PRINTER_TARGET)
        };
        EnvFilter::new(default)
    })
}

/// Install the global subscriber writing to stderr.
///
/// Stdout is reserved for reports and, in workers, the outcome message.
pub fn init(verbose: bool, prefix: Option<String>) {
    tracing_subscriber::fmt()
        .with_env_filter(build_filter(verbose))
        .with_writer(std::io::stderr)
        .event_format(ColorizedFormatter::new(prefix))
        .init();
}
