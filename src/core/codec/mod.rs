//! Just enough OpenPGP framing to classify a payload without decrypting it.

pub mod armor;
pub mod packet;
