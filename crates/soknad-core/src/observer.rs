//! Domain events published to the outside world.
//!
//! Instead of mutable observer-registration lists, every aggregate pushes
//! its transitions onto an explicit outbound queue owned by [`crate::Person`].
//! The mediator drains the queue after a successful dispatch — synchronously,
//! in emission order, strictly after the in-memory mutation — and publishes
//! each event on the rapid.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  innsending::{InnsendingTilstand, InnsendingType},
  soknad::TilstandType,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PersonEvent {
  SoknadEndretTilstand {
    soknad_id: Uuid,
    forrige:   TilstandType,
    gjeldende: TilstandType,
  },
  InnsendingEndretTilstand {
    soknad_id:       Uuid,
    innsending_id:   Uuid,
    innsending_type: InnsendingType,
    forrige:         InnsendingTilstand,
    gjeldende:       InnsendingTilstand,
  },
  SoknadInnsendt {
    soknad_id:          Uuid,
    innsendt_tidspunkt: DateTime<Utc>,
  },
  SoknadSlettet {
    soknad_id: Uuid,
  },
}
