//! Replay summary and cart rendering.

use serde::Serialize;

use rapidscan_core::CartSnapshot;
use rapidscan_pipeline::ScanNotification;

/// Counts of what happened during a replay.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayStats {
    pub frames: usize,
    /// Frames the device did not decode because it was in standby.
    pub frames_in_standby: usize,
    pub accepted: usize,
    pub repeated: usize,
    pub transition_failures: usize,
    /// Notifications missed because the tally fell behind.
    pub missed_notifications: u64,
}

impl ReplayStats {
    pub fn record(&mut self, notification: &ScanNotification) {
        match notification {
            ScanNotification::Accepted(_) => self.accepted += 1,
            ScanNotification::Repeated(_) => self.repeated += 1,
            ScanNotification::TransitionFailed { .. } => self.transition_failures += 1,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayReport {
    pub stats: ReplayStats,
    pub cart: CartSnapshot,
}

impl ReplayReport {
    /// Plain-text cart table with the checkout header.
    pub fn render_table(&self) -> String {
        let mut out = format!("Checkout ({} items)\n", self.cart.total_quantity);

        let payload_width = self
            .cart
            .lines
            .iter()
            .map(|l| l.payload().chars().count())
            .max()
            .unwrap_or(0)
            .max("Payload".len());

        out.push_str(&format!(
            "{:>3}  {:<width$}  {:<10}  {:>5}\n",
            "#",
            "Payload",
            "Symbology",
            "Qty",
            width = payload_width
        ));
        for (idx, line) in self.cart.lines.iter().enumerate() {
            out.push_str(&format!(
                "{:>3}  {:<width$}  {:<10}  {:>5}\n",
                idx + 1,
                line.payload(),
                line.scan.symbology,
                line.quantity,
                width = payload_width
            ));
        }

        out.push_str(&format!(
            "\n{} frames, {} accepted, {} repeated, {} in standby, {} transition failures\n",
            self.stats.frames,
            self.stats.accepted,
            self.stats.repeated,
            self.stats.frames_in_standby,
            self.stats.transition_failures
        ));
        out
    }
}
