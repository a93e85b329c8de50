use std::cell::RefCell;

use crate::engine::errors::EngineResult;
use crate::engine::identity::IdentityResolver;

/// Deterministic in-memory resolver: `(integration, cloud id)` maps to
/// `user-<integration>-<cloud id>`. Every call is recorded.
#[derive(Default)]
pub struct RecordingResolver {
    pub calls: RefCell<Vec<(String, String, String)>>,
}

impl RecordingResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id_for(integration_id: &str, cloud_id: &str) -> String {
        format!("user-{integration_id}-{cloud_id}")
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }
}

impl IdentityResolver for RecordingResolver {
    fn resolve(&self, integration_id: &str, cloud_id: &str, display_name: &str) -> EngineResult<String> {
        self.calls.borrow_mut().push((
            integration_id.to_string(),
            cloud_id.to_string(),
            display_name.to_string(),
        ));
        Ok(Self::id_for(integration_id, cloud_id))
    }
}
