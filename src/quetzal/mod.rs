//! Quetzal save-game format: an IFF container (`FORM...IFZS`) carrying a
//! header chunk, a differentially-compressed memory chunk, and a stack chunk.

pub mod chunks;
pub mod compressed_memory;
pub mod iff;
pub mod restore;
pub mod save;
