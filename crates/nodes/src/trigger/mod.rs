//! Trigger handlers: entry points seeded by external events.
//!
//! Triggers have no inbound data ports. The engine seeds a trigger's
//! input with the run request's event payload; when none is present the
//! trigger emits its documented sample so editor test-runs produce
//! realistic data.

mod error_trigger;
mod event;
mod manual;
mod schedule;

pub use error_trigger::ErrorTrigger;
pub use event::{EmailTrigger, FormTrigger, WebhookTrigger};
pub use manual::ManualTrigger;
pub use schedule::ScheduleTrigger;
