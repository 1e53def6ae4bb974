use zkpay_panel_core::{ClockPort, PanelError, TimestampMs};

#[derive(Debug, Clone, Default)]
pub struct SystemClockAdapter;

impl ClockPort for SystemClockAdapter {
    fn now_ms(&self) -> Result<TimestampMs, PanelError> {
        let now = web_time::SystemTime::now()
            .duration_since(web_time::UNIX_EPOCH)
            .map_err(|e| PanelError::Transport(format!("time error: {e}")))?;
        Ok(TimestampMs(now.as_millis() as u64))
    }
}
