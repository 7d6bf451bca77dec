pub mod fingerprint;
pub mod keypair;
pub mod sign;

pub use fingerprint::fingerprint_of;
pub use keypair::KeyPair;
pub use sign::{sign, verify};
