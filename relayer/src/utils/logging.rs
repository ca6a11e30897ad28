use std::collections::BTreeMap;

use chrono::Utc;
use serde_json::{Map, Value};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_error::ErrorLayer;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::layer::Context;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

const DEFAULT_FILTER: &str = "relayer=info";

/// Fields recorded on a span, kept in the span extensions so formatters can read them.
#[derive(Debug, Clone, Default)]
pub struct SpanFields(pub BTreeMap<String, String>);

impl SpanFields {
    /// The pipeline lane an event belongs to: the queue of a worker or the protocol of a publisher.
    fn lane(&self) -> Option<&str> {
        self.0.get("q").or_else(|| self.0.get("protocol")).map(String::as_str)
    }
}

impl Visit for SpanFields {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.0.insert(field.name().to_string(), format!("{:?}", value).trim_matches('"').to_string());
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.0.insert(field.name().to_string(), value.to_string());
    }
}

pub struct SpanFieldsLayer;

impl<S> Layer<S> for SpanFieldsLayer
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
{
    fn on_new_span(&self, attrs: &tracing::span::Attributes<'_>, id: &tracing::span::Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else { return };
        let mut fields = SpanFields::default();
        if let Some(parent) = span.parent() {
            let extensions = parent.extensions();
            if let Some(inherited) = extensions.get::<SpanFields>() {
                fields = inherited.clone();
            }
        }
        attrs.record(&mut fields);
        span.extensions_mut().insert(fields);
    }

    fn on_record(&self, id: &tracing::span::Id, values: &tracing::span::Record<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else { return };
        let mut extensions = span.extensions_mut();
        let mut fields = extensions.remove::<SpanFields>().unwrap_or_default();
        values.record(&mut fields);
        extensions.insert(fields);
    }
}

#[derive(Default)]
struct EventFields {
    message: String,
    fields: Vec<(String, String)>,
}

impl Visit for EventFields {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let value = format!("{:?}", value).trim_matches('"').to_string();
        if field.name() == "message" {
            self.message = value;
        } else {
            self.fields.push((field.name().to_string(), value));
        }
    }
}

/// Console formatter: `time | level | lane | component | message (fields)`.
pub struct PrettyFormatter;

impl<S, N> FormatEvent<S, N> for PrettyFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(&self, ctx: &FmtContext<'_, S, N>, mut writer: Writer<'_>, event: &Event<'_>) -> std::fmt::Result {
        let meta = event.metadata();
        let level_color = match *meta.level() {
            Level::TRACE => "\x1b[90m",
            Level::DEBUG => "\x1b[34m",
            Level::INFO => "\x1b[32m",
            Level::WARN => "\x1b[33m",
            Level::ERROR => "\x1b[31m",
        };
        let (dim, lane_color, reset) = ("\x1b[90m", "\x1b[92m", "\x1b[0m");

        let mut lane = "-".to_string();
        if let Some(span) = ctx.lookup_current() {
            let extensions = span.extensions();
            if let Some(fields) = extensions.get::<SpanFields>() {
                lane = fields.lane().unwrap_or("-").to_string();
            }
        }

        let mut visitor = EventFields::default();
        event.record(&mut visitor);

        write!(writer, "\x1b[96m{}{reset} {dim}|{reset} ", Utc::now().format("%y-%m-%d %H:%M:%S"))?;
        write!(writer, "{level_color}{:<5}{reset} {dim}|{reset} ", *meta.level())?;
        write!(writer, "{lane_color}{:<16}{reset} {dim}|{reset} ", lane)?;
        write!(writer, "{lane_color}{:<10}{reset} {dim}|{reset} ", component_name(meta.target()))?;
        write!(writer, "\x1b[97m{}{reset}", visitor.message)?;

        let fields: Vec<String> = visitor
            .fields
            .iter()
            .filter(|(name, _)| name != "q")
            .map(|(name, value)| format!("{dim}{name}={value}{reset}"))
            .collect();
        if !fields.is_empty() {
            write!(writer, " ({})", fields.join(", "))?;
        }
        writeln!(writer)
    }
}

/// One JSON object per line, span fields merged under `fields`.
pub struct JsonEventFormatter;

impl<S, N> FormatEvent<S, N> for JsonEventFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(&self, ctx: &FmtContext<'_, S, N>, mut writer: Writer<'_>, event: &Event<'_>) -> std::fmt::Result {
        let meta = event.metadata();
        let mut visitor = EventFields::default();
        event.record(&mut visitor);

        let mut root = Map::new();
        root.insert("timestamp".into(), Value::String(Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)));
        root.insert("level".into(), Value::String(meta.level().to_string()));
        root.insert("target".into(), Value::String(meta.target().to_string()));
        root.insert("component".into(), Value::String(component_name(meta.target()).to_string()));
        if let (Some(file), Some(line)) = (meta.file(), meta.line()) {
            root.insert("location".into(), Value::String(format!("{file}:{line}")));
        }
        root.insert("message".into(), Value::String(visitor.message));

        let mut fields = Map::new();
        if let Some(span) = ctx.lookup_current() {
            fields.insert("span_name".into(), Value::String(span.metadata().name().to_string()));
            let extensions = span.extensions();
            if let Some(span_fields) = extensions.get::<SpanFields>() {
                for (key, value) in &span_fields.0 {
                    fields.insert(key.clone(), Value::String(value.clone()));
                }
            }
        }
        for (key, value) in visitor.fields {
            fields.insert(key, Value::String(value));
        }
        if !fields.is_empty() {
            root.insert("fields".into(), Value::Object(fields));
        }

        let line = serde_json::to_string(&Value::Object(root)).map_err(|_| std::fmt::Error)?;
        writeln!(writer, "{}", line)
    }
}

/// Initialize the tracing subscriber with
/// - PrettyFormatter for console readability (when LOG_FORMAT != "json")
/// - JsonEventFormatter for json logging (when LOG_FORMAT = "json")
///
/// This will also install color_eyre to handle the panic in the application
pub fn init_logging() {
    color_eyre::install().expect("Unable to install color_eyre");

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::builder()
            .with_default_directive(Level::INFO.into())
            .parse(DEFAULT_FILTER)
            .expect("Invalid default log filter")
    });

    let registry = Registry::default().with(env_filter).with(SpanFieldsLayer);
    if std::env::var("LOG_FORMAT").is_ok_and(|format| format == "json") {
        let subscriber = registry.with(fmt::layer().event_format(JsonEventFormatter)).with(ErrorLayer::default());
        tracing::subscriber::set_global_default(subscriber).expect("Failed to set global default subscriber");
    } else {
        let subscriber = registry.with(fmt::layer().event_format(PrettyFormatter)).with(ErrorLayer::default());
        tracing::subscriber::set_global_default(subscriber).expect("Failed to set global default subscriber");
    }
}

/// Short display name of the crate an event comes from.
fn component_name(target: &str) -> &'static str {
    if target.starts_with("relayer_http_prover_service") {
        "HTTP_PROVER"
    } else if target.starts_with("relayer_ethereum_settlement_client") {
        "ETHEREUM"
    } else if target.starts_with("relayer::publisher") {
        "PUBLISHER"
    } else if target.starts_with("relayer::scheduler") {
        "SCHEDULER"
    } else if target.starts_with("relayer") {
        "-"
    } else {
        "EXTERNAL"
    }
}
