// SPDX-License-Identifier: MIT

//! Diagnostic output, enabled by `APPIMAGE_EXEC_DEBUG`.
//!
//! Every line goes to standard output with the `APPIMAGE_EXEC>> ` prefix so it
//! can be told apart from the host program's own output.  The subscriber is
//! installed at load time regardless; the variable is checked on each event,
//! so a program that sets it just before calling exec still gets output.

use std::sync::Once;

use tracing::{Event, Metadata, Subscriber, subscriber::Interest};
use tracing_subscriber::{
    Layer as _,
    fmt::{FmtContext, FormatEvent, FormatFields, MakeWriter, format::Writer},
    layer::{Context, Filter, SubscriberExt as _},
    registry::LookupSpan,
};

use crate::config;

pub const PREFIX: &str = "APPIMAGE_EXEC>> ";

static INIT: Once = Once::new();

/// Install the stdout subscriber.  Only the first call has any effect.
pub fn init() {
    INIT.call_once(|| {
        // Another dispatcher may already be installed; keep it.
        let _ = tracing::subscriber::set_global_default(subscriber(std::io::stdout));
    });
}

fn subscriber<W>(make_writer: W) -> impl Subscriber + Send + Sync + 'static
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::registry().with(
        tracing_subscriber::fmt::layer()
            .with_writer(make_writer)
            .event_format(PrefixFormat)
            .with_filter(DebugToggle),
    )
}

/// Passes events only while `APPIMAGE_EXEC_DEBUG` is non-empty.
struct DebugToggle;

impl<S> Filter<S> for DebugToggle {
    fn enabled(&self, _meta: &Metadata<'_>, _cx: &Context<'_, S>) -> bool {
        config::debug_enabled()
    }

    // The answer changes with the environment, so it must not be cached per
    // callsite.
    fn callsite_enabled(&self, _meta: &'static Metadata<'static>) -> Interest {
        Interest::sometimes()
    }
}

/// Message fields only, behind the fixed prefix.
struct PrefixFormat;

impl<S, N> FormatEvent<S, N> for PrefixFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        writer.write_str(PREFIX)?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}
