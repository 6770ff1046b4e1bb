use tokio_util::sync::CancellationToken;

/// `{requestId, cancelHandle}`. Process-local; submitting a new registration
/// with an existing id aborts the prior one and replaces it (spec.md §3, §4.4
/// "in-flight registry").
#[derive(Clone)]
pub struct StreamRegistration {
    pub request_id: String,
    pub cancel: CancellationToken,
}

impl StreamRegistration {
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_is_observable() {
        let reg = StreamRegistration::new("r1");
        assert!(!reg.is_cancelled());
        reg.cancel();
        assert!(reg.is_cancelled());
    }
}
