//! Attack event definitions.

use serde::Serialize;

use super::RecordKind;

pub const DEFAULT_ATTACKER: &str = "Player";
pub const DEFAULT_DEFENDER: &str = "Dummy";
pub const UNKNOWN_ATTACK: &str = "Unknown Attack";

/// An attack, either a start record (outcome unknown) or a result record.
///
/// The outcome fields are fixed when the value is built. Later outcome
/// information for the same logical attack arrives as a separate event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttackEvent {
    pub attacker: String,
    pub defender: String,
    /// Free-form label, e.g. "Sword Slash".
    pub attack_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    hit: Option<bool>,
    outcome_known: bool,
    record_kind: RecordKind,
}

impl AttackEvent {
    /// Create an attack with every field given.
    pub fn new(
        attacker: impl Into<String>,
        defender: impl Into<String>,
        attack_type: impl Into<String>,
        hit: Option<bool>,
    ) -> Self {
        Self {
            attacker: attacker.into(),
            defender: defender.into(),
            attack_type: attack_type.into(),
            hit,
            outcome_known: hit.is_some(),
            record_kind: if hit.is_some() {
                RecordKind::Result
            } else {
                RecordKind::Start
            },
        }
    }

    /// An attack reported without outcome.
    pub fn start(attack_type: impl Into<String>) -> Self {
        Self::new(DEFAULT_ATTACKER, DEFAULT_DEFENDER, attack_type, None)
    }

    /// An attack reported with an explicit outcome.
    pub fn result(attack_type: impl Into<String>, hit: bool) -> Self {
        Self::new(DEFAULT_ATTACKER, DEFAULT_DEFENDER, attack_type, Some(hit))
    }

    /// Set the attacker.
    pub fn with_attacker(mut self, attacker: impl Into<String>) -> Self {
        self.attacker = attacker.into();
        self
    }

    /// Set the defender.
    pub fn with_defender(mut self, defender: impl Into<String>) -> Self {
        self.defender = defender.into();
        self
    }

    pub fn hit(&self) -> Option<bool> {
        self.hit
    }

    pub fn outcome_known(&self) -> bool {
        self.outcome_known
    }

    pub fn record_kind(&self) -> RecordKind {
        self.record_kind
    }

    /// Check if this attack explicitly landed.
    pub fn is_hit(&self) -> bool {
        self.hit == Some(true)
    }

    /// Check if this attack explicitly missed.
    pub fn is_miss(&self) -> bool {
        self.hit == Some(false)
    }
}

impl Default for AttackEvent {
    fn default() -> Self {
        Self::start(UNKNOWN_ATTACK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_attack() {
        let attack = AttackEvent::default();
        assert_eq!(attack.attacker, "Player");
        assert_eq!(attack.defender, "Dummy");
        assert_eq!(attack.attack_type, "Unknown Attack");
        assert_eq!(attack.record_kind(), RecordKind::Start);
        assert!(!attack.outcome_known());
    }

    #[test]
    fn test_result_record() {
        let attack = AttackEvent::result("Arrow Shot", false).with_defender("Goblin");
        assert_eq!(attack.record_kind(), RecordKind::Result);
        assert!(attack.outcome_known());
        assert!(attack.is_miss());
        assert!(!attack.is_hit());
        assert_eq!(attack.defender, "Goblin");
    }

    #[test]
    fn test_builders_keep_record_kind() {
        let attack = AttackEvent::start("Axe Swing")
            .with_attacker("Knight")
            .with_defender("Troll");
        assert_eq!(attack.record_kind(), RecordKind::Start);
        assert_eq!(attack.hit(), None);
    }
}
