//! Console run notifications.

use kirac_core::events::{RunSignal, SignalHandler};
use kirac_types::formatting::{format_chaos, format_compact, format_duration, format_kills};

pub struct ConsoleNotifier {
    min_notify_value: f64,
}

impl ConsoleNotifier {
    pub fn new(min_notify_value: f64) -> Self {
        Self { min_notify_value }
    }
}

impl SignalHandler for ConsoleNotifier {
    fn handle_signals(&mut self, signals: &[RunSignal]) {
        for signal in signals {
            match signal {
                RunSignal::RunOpened { area, timestamp, .. } => {
                    println!("[{}] entering {area}", timestamp.format("%H:%M:%S"));
                }
                RunSignal::RunProcessed {
                    name,
                    gained,
                    xp,
                    kills,
                    first_event,
                    last_event,
                    ..
                } => {
                    if *gained < self.min_notify_value {
                        tracing::info!("run in {name} below notify threshold ({gained}c)");
                        continue;
                    }
                    let duration = (*last_event - *first_event).num_seconds();
                    println!(
                        "{name} done in {} | {} | {} xp | {} kills",
                        format_duration(duration),
                        format_chaos(*gained),
                        format_compact(*xp),
                        format_kills(*kills),
                    );
                }
            }
        }
    }
}
