use tokio::sync::mpsc;

/// Outbound FIFO of operator-facing status lines, `"<VD>|input|<text>"` where
/// `VD = verbose*10 + debug` (two-digit decimal). Unbounded: telemetry must never
/// apply backpressure to the components producing it.
pub type TelemetrySender = mpsc::UnboundedSender<String>;
pub type TelemetryReceiver = mpsc::UnboundedReceiver<String>;

pub fn channel() -> (TelemetrySender, TelemetryReceiver) {
    mpsc::unbounded_channel()
}

fn format_line(verbose: u8, debug: u8, text: &str) -> String {
    let vd = u32::from(verbose) * 10 + u32::from(debug);
    format!("{vd:02}|input|{text}")
}

/// Sends a telemetry line and mirrors it into `tracing` at a level derived from its
/// verbosity/debug pair, so operators get both the legacy wire format and structured
/// logs from the same call site.
pub fn emit(tx: &TelemetrySender, verbose: u8, debug: u8, text: impl AsRef<str>) {
    let text = text.as_ref();
    let vd = u32::from(verbose) * 10 + u32::from(debug);
    match vd {
        0..=9 => tracing::info!(target: "input", "{text}"),
        10..=39 => tracing::debug!(target: "input", "{text}"),
        _ => tracing::trace!(target: "input", "{text}"),
    }
    let _ = tx.send(format_line(verbose, debug, text));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_two_digit_vd() {
        assert_eq!(format_line(0, 2, "hi"), "02|input|hi");
        assert_eq!(format_line(3, 0, "hi"), "30|input|hi");
    }

    #[tokio::test]
    async fn emit_sends_on_channel() {
        let (tx, mut rx) = channel();
        emit(&tx, 0, 2, "No more input. Sent 0 lines");
        let line = rx.recv().await.unwrap();
        assert_eq!(line, "02|input|No more input. Sent 0 lines");
    }
}
