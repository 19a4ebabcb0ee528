mod claims;
mod codec;

pub use claims::VerificationClaims;
pub use codec::TokenCodec;
