pub mod api;
pub mod reveal;

pub use api::{ClientError, ConsultClient};
pub use reveal::{Frame, Reveal, Tick, play};
