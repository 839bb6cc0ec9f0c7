// Freeze - hold a smoothed curve on screen while analysis continues

use std::sync::Arc;

use crate::analysis::ResponseCurve;

/// Display-only hold of one smoothed curve
#[derive(Debug, Default)]
pub struct FreezeController {
    held: Option<Arc<ResponseCurve>>,
}

impl FreezeController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_engaged(&self) -> bool {
        self.held.is_some()
    }

    /// Engage with `live` as the held curve, or release
    ///
    /// Engaging while already engaged keeps the first capture.
    pub fn set(&mut self, engaged: bool, live: &Arc<ResponseCurve>) {
        match (engaged, self.held.is_some()) {
            (true, false) => self.held = Some(Arc::clone(live)),
            (false, true) => self.held = None,
            _ => {}
        }
    }

    /// Curve the display should draw
    pub fn display_curve(&self, live: &Arc<ResponseCurve>) -> Arc<ResponseCurve> {
        match &self.held {
            Some(held) => Arc::clone(held),
            None => Arc::clone(live),
        }
    }
}
