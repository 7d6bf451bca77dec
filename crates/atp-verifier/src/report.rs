/// Outcome of verifying a single document. Fatal problems are returned as
/// an `Err(EngineError)` from the verify call itself; anything collected
/// here is non-fatal by construction: timestamp drift, missing optional
/// fields, reduced confidence from the absence of an Explorer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VerificationReport {
    pub warnings: Vec<String>,
}

impl VerificationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}
