mod bitmap256;
mod error;
mod key;

#[cfg(test)]
mod test;

pub use bitmap256::Bitmap256;
pub use error::{err, Error, ErrorKind, Result};
pub use key::{NodeId, VecKey};
