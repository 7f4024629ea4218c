/*!

Threshold-filtered logging for the indexing core.

Messages are logged *at* a numeric threshold (a verbosity level) and are emitted only when
that threshold is at most the global logging threshold. A message with threshold 0 is
always emitted. The level macros are

 - `critical!`, `error!`, `warning!`, `info!`, `debug!`, `trace!`

with syntax `level!(threshold, "format string", args...)`; omitting the threshold means 0.
The logger initializes itself on first use; the only knobs are
[`set_global_logging_threshold`] and [`get_global_logging_threshold`].

The backing implementation is the `tracing` crate. An event's fields are collected once
into an [`EventFields`] record; the filtering layer consults its threshold, and the
formatter renders its message, criticality, and any extra fields without leaking the
threshold bookkeeping into the output. A malformed `threshold` field is treated as 0
(the event is emitted): losing one log line's filtering is preferable to aborting a
saturation run over a diagnostic.

*/
mod macros;

use std::sync::atomic::{AtomicU8, Ordering};

use once_cell::sync::Lazy;
use tracing::{
  field::{Field, Visit},
  Event,
  Subscriber,
};
use tracing_subscriber::{
  field::RecordFields,
  fmt,
  fmt::{format::Writer, FormatFields},
  layer::{Context, SubscriberExt},
  registry::LookupSpan,
  Layer,
  Registry,
};

pub use macros::*;

/// Used for implicit initialization.
static INIT_LOGGER: Lazy<()> = Lazy::new(|| {
  let subscriber = Registry::default()
      .with(ThresholdFilter)
      .with(
        fmt::layer()
            .fmt_fields(IndexEventFormatter)
            .with_target(false)
            .without_time()
            .with_writer(std::io::stdout),
      );

  tracing::subscriber::set_global_default(subscriber).expect("Failed to set subscriber");
});

/// This does not need to be called directly. Initializes the logging system.
pub fn init_logger() {
  Lazy::force(&INIT_LOGGER);
}

static GLOBAL_LOGGING_THRESHOLD: AtomicU8 = AtomicU8::new(3); // Default threshold

/// Sets the global threshold. Messages logged at a greater threshold are not emitted.
pub fn set_global_logging_threshold(new_threshold: u8) {
  GLOBAL_LOGGING_THRESHOLD.store(new_threshold, Ordering::SeqCst);
}

/// Retrieves the global threshold.
pub fn get_global_logging_threshold() -> u8 {
  GLOBAL_LOGGING_THRESHOLD.load(Ordering::SeqCst)
}

/// Everything one log event carries, collected in a single visitation pass. Both the
/// filter and the formatter work from this record, so the two never disagree about how
/// a field was interpreted.
#[derive(Default)]
struct EventFields {
  threshold: Option<u8>,
  critical : bool,
  message  : String,
  /// Any further fields, rendered `name: value` in arrival order.
  extras   : Vec<String>,
}

impl EventFields {
  fn of_event(event: &Event<'_>) -> EventFields {
    let mut collected = EventFields::default();
    event.record(&mut collected);
    collected
  }

  fn of_fields<R: RecordFields>(fields: R) -> EventFields {
    let mut collected = EventFields::default();
    fields.record(&mut collected);
    collected
  }

  /// An absent or malformed threshold counts as 0, i.e. always emitted.
  fn emitted_at(&self, limit: u8) -> bool {
    self.threshold.unwrap_or(0) <= limit
  }
}

impl Visit for EventFields {
  fn record_u64(&mut self, field: &Field, value: u64) {
    match field.name() {
      "threshold" => {
        self.threshold = Some(value.min(u8::MAX as u64) as u8);
      }
      name => self.extras.push(format!("{}: {}", name, value)),
    }
  }

  fn record_i64(&mut self, field: &Field, value: i64) {
    if value >= 0 {
      self.record_u64(field, value as u64);
    } else if field.name() == "threshold" {
      // A negative threshold is nonsense; emit the event rather than lose it.
      self.threshold = Some(0);
    } else {
      self.extras.push(format!("{}: {}", field.name(), value));
    }
  }

  fn record_bool(&mut self, field: &Field, value: bool) {
    match field.name() {
      "critical" => self.critical = value,
      name       => self.extras.push(format!("{}: {}", name, value)),
    }
  }

  fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
    match field.name() {
      "message"   => self.message = format!("{:?}", value),
      // Bookkeeping fields that arrived with an unexpected type; already defaulted.
      "threshold" | "critical" => {}
      name        => self.extras.push(format!("{}: {:?}", name, value)),
    }
  }
}

/// A layer that only passes through events logged at or below the global logging
/// threshold.
struct ThresholdFilter;

impl<S> Layer<S> for ThresholdFilter
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
{
  fn event_enabled(&self, event: &Event<'_>, _ctx: Context<'_, S>) -> bool {
    EventFields::of_event(event).emitted_at(get_global_logging_threshold())
  }
}

/// Renders `[CRITICAL] message (extra, extra)`, swallowing the threshold bookkeeping.
struct IndexEventFormatter;

impl<'writer> FormatFields<'writer> for IndexEventFormatter {
  fn format_fields<R: RecordFields>(&self, mut writer: Writer<'writer>, fields: R) -> std::fmt::Result {
    let collected = EventFields::of_fields(fields);

    if collected.critical {
      write!(writer, "[CRITICAL] ")?;
    }
    write!(writer, "{}", collected.message)?;
    if !collected.extras.is_empty() {
      write!(writer, " ({})", collected.extras.join(", "))?;
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn threshold_gates_messages() {
    let count = 42;

    set_global_logging_threshold(3);

    info!(2, "indexed {} literals", count);          // Emitted
    debug!(4, "NOT emitted: {} literals", count);    // Not emitted
    warning!("always emitted (threshold 0)");        // Emitted
    error!(5, "NOT emitted at threshold 5");         // Not emitted

    set_global_logging_threshold(5);
    info!(5, "emitted after raising the threshold"); // Emitted
  }

  #[test]
  fn absent_threshold_always_emits() {
    let collected = EventFields::default();
    assert!(collected.emitted_at(0));

    let gated = EventFields { threshold: Some(4), ..EventFields::default() };
    assert!(gated.emitted_at(4));
    assert!(!gated.emitted_at(3));
  }
}
