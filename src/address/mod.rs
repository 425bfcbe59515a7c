#[allow(clippy::module_inception)]
pub mod address;

pub use address::{AddressCodec, DeviceAddress};
