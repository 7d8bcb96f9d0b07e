use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Serialize, Deserialize, Debug)]
pub struct MachineSnapshot {
    pub state: String,
    pub last_fault: Option<String>,
    pub peripherals: HashMap<String, serde_json::Value>,
}
