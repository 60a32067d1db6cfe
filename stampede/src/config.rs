use crate::scheduler::Stage;
use std::time::Duration;

// Raw, as-supplied run configuration. Threshold expressions are kept as
// strings here and parsed during startup validation so that every
// configuration mistake surfaces before a single worker spawns.
#[doc(hidden)]
#[derive(Clone, Debug)]
pub struct RunConfig {
    pub name: String,
    pub stages: Vec<Stage>,
    pub thresholds: Vec<(String, String)>,
    pub timeout: Option<Duration>,
}

impl RunConfig {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            stages: vec![],
            thresholds: vec![],
            timeout: None,
        }
    }
}
