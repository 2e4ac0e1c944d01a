//! Outbound publishing.

use std::sync::Mutex;

use serde_json::Value;

use crate::Result;

/// Where outbound meldinger go. `nokkel` is the partition key (the ident),
/// so all meldinger for one person stay ordered.
pub trait RapidPublisher: Send + Sync {
  fn publiser(
    &self,
    nokkel: &str,
    melding: &Value,
  ) -> impl Future<Output = Result<()>> + Send;
}

/// Publishes by logging the full melding. Stands in for the real bus
/// producer in local runs.
#[derive(Debug, Default, Clone)]
pub struct LoggingRapid;

impl RapidPublisher for LoggingRapid {
  async fn publiser(&self, nokkel: &str, melding: &Value) -> Result<()> {
    tracing::info!(
      nokkel,
      event_name = melding
        .get("@event_name")
        .and_then(serde_json::Value::as_str)
        .unwrap_or("?"),
      %melding,
      "published melding",
    );
    Ok(())
  }
}

/// Captures meldinger in memory — the test double.
#[derive(Debug, Default)]
pub struct InMemoryRapid {
  meldinger: Mutex<Vec<(String, Value)>>,
}

impl InMemoryRapid {
  pub fn ny() -> Self { Self::default() }

  pub fn meldinger(&self) -> Vec<(String, Value)> {
    self.meldinger.lock().map(|m| m.clone()).unwrap_or_default()
  }

  /// Event names in publish order, for assertions.
  pub fn event_names(&self) -> Vec<String> {
    self
      .meldinger()
      .iter()
      .filter_map(|(_, m)| m.get("@event_name")?.as_str().map(str::to_string))
      .collect()
  }
}

impl RapidPublisher for InMemoryRapid {
  async fn publiser(&self, nokkel: &str, melding: &Value) -> Result<()> {
    if let Ok(mut meldinger) = self.meldinger.lock() {
      meldinger.push((nokkel.to_string(), melding.clone()));
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[tokio::test]
  async fn in_memory_rapid_captures_in_order() {
    let rapid = InMemoryRapid::ny();
    rapid
      .publiser("a", &json!({ "@event_name": "første" }))
      .await
      .unwrap();
    rapid
      .publiser("a", &json!({ "@event_name": "andre" }))
      .await
      .unwrap();

    assert_eq!(rapid.event_names(), vec!["første", "andre"]);
    assert_eq!(rapid.meldinger()[0].0, "a");
  }
}
