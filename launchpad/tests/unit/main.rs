//! Integration tests for launchpad

mod test_api;
mod test_fsm;
mod test_pipeline;
mod test_registry;
mod test_store;
