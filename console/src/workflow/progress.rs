//! Transfer progress helpers

use tokio::sync::mpsc;

use crate::http::api::TransferProgress;
use crate::view::{ConsoleView, Panel};
use crate::workflow::fsm::{TransferEvent, TransferFsm};

/// `loaded / total` as a whole percentage, rounded down and clamped to 0..=100
pub fn progress_percent(loaded: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let percent = (u128::from(loaded) * 100) / u128::from(total);
    percent.min(100) as u8
}

/// Feed transport progress through the FSM into the view until the sender
/// side closes. Only changes are rendered.
pub async fn drain_progress(
    mut rx: mpsc::UnboundedReceiver<TransferProgress>,
    fsm: &mut TransferFsm,
    view: &dyn ConsoleView,
    panel: Panel,
) {
    let mut shown = fsm.percent();
    while let Some(update) = rx.recv().await {
        let _ = fsm.process(TransferEvent::Progress(progress_percent(
            update.loaded,
            update.total,
        )));
        let percent = fsm.percent();
        if percent != shown {
            if let Some(p) = percent {
                view.set_progress(panel, p);
            }
            shown = percent;
        }
    }
}
