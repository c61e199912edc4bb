//! Entropy transfer from a TRNG device into the kernel pool.
//!
//! Endpoints are opened and locked per cycle rather than held open, so
//! other users of the TRNG or of the pool device are only blocked for the
//! span of a single read or write.

mod buffer;
mod device;
mod feeder;
mod mock;

pub use buffer::TransferBuffer;
pub use device::{
    DeviceError, DeviceSink, DeviceSource, EntropySink, EntropySource, DEFAULT_SINK_PATH,
};
pub use feeder::{feed, EntropyPipe, TransferSummary};
pub use mock::{MockSink, MockSource};
