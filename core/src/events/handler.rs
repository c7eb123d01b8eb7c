use super::signal::RunSignal;

/// Receives run signals after each scheduled unit completes.
pub trait SignalHandler: Send {
    fn handle_signals(&mut self, signals: &[RunSignal]);
}
