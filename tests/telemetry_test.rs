//! Integration tests for telemetry initialization and span helpers.

use std::sync::{Arc, Mutex};

use pipeline_desk::config::PipelineSettings;
use pipeline_desk::gateway::memory::MemoryGateway;
use pipeline_desk::panel::Panel;
use pipeline_desk::telemetry::{TelemetryConfig, init_telemetry, queue};
use tracing::Subscriber;
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id, Record};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::{Context, SubscriberExt as _};
use tracing_subscriber::registry::LookupSpan;

#[test]
fn telemetry_initializes_without_endpoint() {
    // A global subscriber can only be set once per process; a second
    // init returns Err, which is fine here.
    let config = TelemetryConfig {
        endpoint: None,
        service_name: "pipeline-desk-test".to_string(),
        log_level: "debug".to_string(),
    };
    let _guard = init_telemetry(config);
}

#[test]
fn fetch_span_records_ticket() {
    let span = queue::start_fetch_span("queue");
    queue::record_ticket(&span, 7);
}

#[test]
fn action_span_records_affected() {
    let span = queue::start_action_span("bulk_cancel", 3);
    queue::record_affected(&span, 2);
}

#[test]
fn metrics_instruments_build_without_a_provider() {
    pipeline_desk::telemetry::metrics::actions().add(1, &[]);
    pipeline_desk::telemetry::metrics::fetch_duration_ms().record(1.5, &[]);
}

/// Collects `(view, seq)` for every fetch span once its ticket is recorded.
#[derive(Clone, Default)]
struct FetchTickets(Arc<Mutex<Vec<(String, u64)>>>);

#[derive(Default)]
struct FetchFields {
    view: Option<String>,
    seq: Option<u64>,
}

impl Visit for FetchFields {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "fetch.view" {
            self.view = Some(value.to_string());
        }
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        if field.name() == "fetch.seq" {
            self.seq = Some(value);
        }
    }

    fn record_debug(&mut self, _field: &Field, _value: &dyn std::fmt::Debug) {}
}

impl<S> Layer<S> for FetchTickets
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        if attrs.metadata().name() != "desk.fetch" {
            return;
        }
        let mut fields = FetchFields::default();
        attrs.record(&mut fields);
        if let Some(span) = ctx.span(id) {
            span.extensions_mut().insert(fields);
        }
    }

    fn on_record(&self, id: &Id, values: &Record<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else { return };
        let mut extensions = span.extensions_mut();
        let Some(fields) = extensions.get_mut::<FetchFields>() else {
            return;
        };
        values.record(fields);
        if let (Some(view), Some(seq)) = (&fields.view, fields.seq) {
            self.0.lock().unwrap().push((view.clone(), seq));
        }
    }
}

#[tokio::test]
async fn panel_fetch_spans_carry_their_ticket() {
    let tickets = FetchTickets::default();
    let _default =
        tracing::subscriber::set_default(tracing_subscriber::registry().with(tickets.clone()));

    let panel = Panel::new(Arc::new(MemoryGateway::new()), &PipelineSettings::default());
    panel.refresh_queue().await;
    panel.refresh_queue().await;
    panel.refresh_pending().await;

    let seen = tickets.0.lock().unwrap().clone();
    assert_eq!(
        seen,
        vec![
            ("queue".to_string(), 1),
            ("queue".to_string(), 2),
            ("pending".to_string(), 1),
        ]
    );
}
