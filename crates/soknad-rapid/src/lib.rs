//! Message-bus ("rapid") layer: packet validation, outbound melding
//! construction, and inbound mottak listeners that turn validated packets
//! into domain hendelser.
//!
//! The rapid convention: every melding is a flat JSON object with an
//! `@event_name` discriminator. A behov is published with an `@behov` type
//! list and correlation keys; the answering service echoes the packet back
//! with a `@løsning` map keyed by behov type.

pub mod error;
pub mod melding;
pub mod mottak;
pub mod packet;
pub mod publisher;

pub use error::{Error, Result};
pub use mottak::{MottakSentral, MottattHendelse};
pub use packet::{Packet, PacketSchema};
pub use publisher::{InMemoryRapid, LoggingRapid, RapidPublisher};
