pub mod capabilities_cmd;
pub mod history_cmd;
pub mod run_cmd;
pub mod scenarios_cmd;
pub mod stats_cmd;
