/*!
# Sparkplug DevKit - Stubs et Utilitaires pour Tests du Node

Bibliothèque facilitant les tests de la session Sparkplug avec:
- Transport MQTT simulé (sans broker) qui enregistre last will, publications et abonnements
- Source de métriques scriptée et horloge manuelle
- Harness reliant le tout à une `Session`
- Helpers pour décoder les payloads publiés et construire des NCMD
*/

pub mod mqtt_stub;
pub mod payload_helpers;
pub mod test_utils;

pub use mqtt_stub::{MockCall, MockMessage, MockTransport};
pub use payload_helpers::{CommandBuilder, PayloadExt};
pub use test_utils::{ManualClock, MockSession, ScriptedMetrics, TestHarness};
