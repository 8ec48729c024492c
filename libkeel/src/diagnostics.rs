//! Sink for recoverable errors. A fatal condition aborts the link via
//! `Result`; conditions we can limp past are recorded here so the driver can
//! fail the link at the end while still reporting everything it found.

#[derive(Default, Debug)]
pub struct Diagnostics {
    errors: Vec<String>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn error(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::error!(target: "keel", "{message}");
        self.errors.push(message);
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn messages(&self) -> &[String] {
        &self.errors
    }
}
