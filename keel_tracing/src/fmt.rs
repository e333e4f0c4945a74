use crate::{FormatFlavor, PolicyTime, TracingConfig, Verbosity};
use std::collections::BTreeMap;
use tracing_core::Subscriber;
use tracing_subscriber::Layer;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::fmt::format::Format as EventFormatter;
use tracing_subscriber::fmt::writer::MakeWriter;
use tracing_subscriber::fmt::{FormatFields, Layer as FmtLayer, layer as make_fmt_layer};
use tracing_subscriber::layer::Filter;
use tracing_subscriber::registry::LookupSpan;

/// Creates a [formatted `Layer`](FmtLayer) based on the given
/// [config](TracingConfig), writing through the given writer.
///
/// The layer applies the per-target verbosity of the config and lets
/// everything else through: the root verbosity is enforced process-wide by
/// the [`LogLevel`](crate::LogLevel) layer, so that it can change at runtime.
/// Timestamps follow the process-wide [`TimePolicy`](keel_core::TimePolicy).
pub fn make_layer<S, W>(config: impl AsRef<TracingConfig>, writer: W) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let config = config.as_ref();
    let targets = make_targets(config);

    match config.flavor() {
        FormatFlavor::Full => make_full_layer(config, targets, writer),
        FormatFlavor::Compact => make_compact_layer(config, targets, writer),
        FormatFlavor::Pretty => make_pretty_layer(config, targets, writer),
        FormatFlavor::Json => make_json_layer(config, targets, writer),
    }
}

/// Creates the default [`Full`](tracing_subscriber::fmt::format::Full) event
/// formatting layer.
fn make_full_layer<S, W>(
    config: &TracingConfig,
    targets: Targets,
    writer: W,
) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    Targets: Filter<S>,
{
    let base_layer = preconfigure_base_layer(
        make_fmt_layer().with_timer(PolicyTime).with_writer(writer),
        config,
    );

    if config.show_timestamp() {
        Box::new(base_layer.with_filter(targets))
    } else {
        Box::new(base_layer.without_time().with_filter(targets))
    }
}

/// Creates the [`Compact`](tracing_subscriber::fmt::format::Compact) event
/// formatting layer.
fn make_compact_layer<S, W>(
    config: &TracingConfig,
    targets: Targets,
    writer: W,
) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    Targets: Filter<S>,
{
    let base_layer = preconfigure_base_layer(
        make_fmt_layer()
            .compact()
            .with_timer(PolicyTime)
            .with_writer(writer),
        config,
    );

    if config.show_timestamp() {
        Box::new(base_layer.with_filter(targets))
    } else {
        Box::new(base_layer.without_time().with_filter(targets))
    }
}

/// Creates the multi-line [`Pretty`](tracing_subscriber::fmt::format::Pretty)
/// event formatting layer.
fn make_pretty_layer<S, W>(
    config: &TracingConfig,
    targets: Targets,
    writer: W,
) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    Targets: Filter<S>,
{
    let base_layer = preconfigure_base_layer(
        make_fmt_layer()
            .pretty()
            .with_timer(PolicyTime)
            .with_writer(writer),
        config,
    );

    if config.show_timestamp() {
        Box::new(base_layer.with_filter(targets))
    } else {
        Box::new(base_layer.without_time().with_filter(targets))
    }
}

/// Creates the [`Json`](tracing_subscriber::fmt::format::Json) event formatting
/// layer.
fn make_json_layer<S, W>(
    config: &TracingConfig,
    targets: Targets,
    writer: W,
) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    Targets: Filter<S>,
{
    let base_layer = preconfigure_base_layer(
        make_fmt_layer()
            .json()
            .flatten_event(true)
            .with_timer(PolicyTime)
            .with_writer(writer),
        config,
    );

    if config.show_timestamp() {
        Box::new(base_layer.with_filter(targets))
    } else {
        Box::new(base_layer.without_time().with_filter(targets))
    }
}

/// Takes a generic base [formatted `Layer`](FmtLayer) and applies
/// transformations to it, as chosen in the given [`config`](TracingConfig).
fn preconfigure_base_layer<S, N, L, T, W>(
    layer: FmtLayer<S, N, EventFormatter<L, T>, W>,
    config: &TracingConfig,
) -> FmtLayer<S, N, EventFormatter<L, T>, W>
where
    N: for<'writer> FormatFields<'writer> + 'static,
{
    layer
        .with_ansi(config.colors())
        .with_target(config.show_target())
        .with_file(config.show_file())
        .with_line_number(config.show_line_number())
        .with_level(config.show_level())
        .with_thread_ids(config.show_thread_id())
        .with_thread_names(config.show_thread_name())
}

/// Creates [per-target filter](Targets) based on the choices in the given
/// [`config`](TracingConfig).
fn make_targets(config: &TracingConfig) -> Targets {
    let mut targets = Targets::new();

    targets = targets.with_default(Verbosity::Trace);
    targets = add_custom_targets(targets, config.targets());

    targets
}

/// Composes custom targets, as configured in [`TracingConfig`].
fn add_custom_targets(targets: Targets, custom_targets: &BTreeMap<String, Verbosity>) -> Targets {
    targets.with_targets(custom_targets)
}
