// Shared between test binaries; not every binary uses every helper.
#![allow(dead_code)]

pub mod mock_relay;
pub mod mock_upstream;
