use lazy_static::lazy_static;
use tracing_subscriber::EnvFilter;

pub mod api;

mod core;
pub use crate::core::{
    event::{Event, NodeDeceased, NodeJoined, NodeRecovered, NodeSuspected},
    host::{HostId, HostRecord, HOST_RECORD_LEN},
    join::{decode_snapshot, encode_snapshot},
    member::{Incarnation, MemberState, MembershipEntry, MembershipList, Notification},
    node::SwimNode,
    transport::TransportLayer,
};

pub mod error;
pub use error::{Error, Result};

pub mod utils;

#[cfg(any(test, feature = "test-util"))]
#[path = "./test-utils/mod.rs"]
#[doc(hidden)]
mod test_utils;

lazy_static! {
    static ref TRACING: () = {
        // a subscriber installed by the host application takes precedence
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .try_init();
    };
}

fn init_tracing() {
    lazy_static::initialize(&TRACING);
}
