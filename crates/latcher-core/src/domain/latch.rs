//! The latching state machine.
//!
//! [`LatchEngine`] receives every key transition read from a physical device
//! and decides what the virtual output device should see. The protocol:
//!
//! ```text
//! hold trigger ──► press K ──► release K ──► release trigger
//!                  (K latched: stays asserted on the virtual device)
//!
//! tap trigger with no new latch ──► every latched key is released
//! ```
//!
//! The engine is deterministic and performs no I/O: every call returns a
//! [`Decision`] listing the sink actions to apply (forward the raw event,
//! synthesize a transition, or nothing at all – a swallow) plus whether the
//! observable state changed. The caller applies the actions to the sink as
//! one write-group and, on a state change, publishes a snapshot.
//!
//! Rule precedence for [`LatchEngine::apply_key_event`]:
//!
//! 1. **Capture**: while capture is armed, the next key DOWN (any code)
//!    becomes the new trigger and the event is fully consumed. HELD/UP leave
//!    capture armed and fall through to the rules below.
//! 2. **Trigger key**: DOWN opens a composition span; UP closes it and, if
//!    the span latched nothing, releases every latched key. The trigger is
//!    never written to the sink.
//! 3. **New latch**: a non-trigger DOWN while the trigger is held latches the
//!    key and asserts it synthetically.
//! 4. **Latched-key gate**: transitions of an already-latched key are
//!    swallowed, except a physical UP while the trigger is up, which releases
//!    the latch.
//! 5. **Passthrough**: everything else is forwarded unchanged.

use std::collections::BTreeSet;

use tracing::trace;

use crate::domain::event::{KeyCode, KeyInput, KeyValue};

/// An output-side action the caller applies to the virtual device sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkAction {
    /// Forward the raw event unchanged.
    ForwardRaw,
    /// Synthesize a discrete key transition.
    EmitKey { code: KeyCode, value: KeyValue },
}

/// The outcome of feeding one key event through the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Decision {
    /// Sink actions to apply, in order, as a single write-group.
    pub actions: Vec<SinkAction>,
    /// `true` when observers should receive a fresh snapshot.
    pub state_changed: bool,
}

impl Decision {
    /// An event consumed without output or state change.
    fn swallow() -> Self {
        Self::default()
    }

    fn changed(actions: Vec<SinkAction>) -> Self {
        Self {
            actions,
            state_changed: true,
        }
    }
}

/// The latching state machine.
///
/// Invariants, maintained across every transition:
/// - `latched ⊇ new_latches`;
/// - `trigger_held` is `true` only strictly between a trigger DOWN and its
///   matching UP;
/// - a code is never simultaneously the trigger code and a latched code.
#[derive(Debug, Default)]
pub struct LatchEngine {
    trigger_code: Option<KeyCode>,
    trigger_held: bool,
    /// Codes currently asserted via synthetic DOWN, awaiting release.
    /// Ordered so snapshots and release order are deterministic.
    latched: BTreeSet<KeyCode>,
    /// Codes latched during the current trigger-held span; cleared on every
    /// trigger DOWN.
    new_latches: BTreeSet<KeyCode>,
    capture_armed: bool,
}

impl LatchEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms trigger capture: the next key DOWN on any device becomes the
    /// trigger binding.
    pub fn arm_trigger_capture(&mut self) {
        self.capture_armed = true;
    }

    pub fn capture_armed(&self) -> bool {
        self.capture_armed
    }

    pub fn trigger_code(&self) -> Option<KeyCode> {
        self.trigger_code
    }

    pub fn trigger_held(&self) -> bool {
        self.trigger_held
    }

    /// Currently latched codes in ascending order.
    pub fn latched_keys(&self) -> Vec<KeyCode> {
        self.latched.iter().copied().collect()
    }

    /// Feeds one key transition through the latching rules.
    pub fn apply_key_event(&mut self, input: KeyInput) -> Decision {
        let KeyInput { code, value } = input;

        // 1. Capture: consumes exactly one DOWN; other values fall through
        //    with capture still armed.
        if self.capture_armed && value == KeyValue::Down {
            return self.capture_trigger(code);
        }

        // 2. Trigger key. Never reaches the sink.
        if self.trigger_code == Some(code) {
            return self.apply_trigger(value);
        }

        // 3. New latch: non-trigger DOWN while the trigger is held. A re-press
        //    of an already-latched code re-asserts it and marks the span as
        //    having latched, so the trigger UP will not release everything.
        if self.trigger_held && value == KeyValue::Down {
            self.latched.insert(code);
            self.new_latches.insert(code);
            trace!(code, "key latched");
            return Decision::changed(vec![SinkAction::EmitKey {
                code,
                value: KeyValue::Down,
            }]);
        }

        // 4. Latched-key gate.
        if self.latched.contains(&code) {
            if self.trigger_held {
                // Swallow unconditionally: no duplicate asserts or repeats
                // while a latch is being composed.
                return Decision::swallow();
            }
            if value == KeyValue::Up {
                self.latched.remove(&code);
                trace!(code, "key unlatched");
                return Decision::changed(vec![SinkAction::EmitKey {
                    code,
                    value: KeyValue::Up,
                }]);
            }
            // A stray physical press on an already-latched key is a no-op
            // until its matching release arrives.
            return Decision::swallow();
        }

        // 5. Passthrough.
        Decision {
            actions: vec![SinkAction::ForwardRaw],
            state_changed: false,
        }
    }

    /// Releases every latched key: one synthetic UP per code, ascending.
    pub fn release_all(&mut self) -> Decision {
        if self.latched.is_empty() {
            return Decision::swallow();
        }
        let actions = self
            .latched
            .iter()
            .map(|&code| SinkAction::EmitKey {
                code,
                value: KeyValue::Up,
            })
            .collect();
        trace!(count = self.latched.len(), "releasing all latched keys");
        self.latched.clear();
        self.new_latches.clear();
        Decision::changed(actions)
    }

    // ── Private transition helpers ────────────────────────────────────────────

    fn capture_trigger(&mut self, code: KeyCode) -> Decision {
        let mut actions = Vec::new();
        // A latched code becoming the trigger would be stuck forever: its UP
        // would be consumed by the trigger branch. Release it first.
        if self.latched.remove(&code) {
            self.new_latches.remove(&code);
            actions.push(SinkAction::EmitKey {
                code,
                value: KeyValue::Up,
            });
        }
        self.trigger_code = Some(code);
        self.capture_armed = false;
        trace!(code, "trigger captured");
        Decision::changed(actions)
    }

    fn apply_trigger(&mut self, value: KeyValue) -> Decision {
        match value {
            KeyValue::Down => {
                self.trigger_held = true;
                self.new_latches.clear();
                Decision::changed(Vec::new())
            }
            KeyValue::Up => {
                self.trigger_held = false;
                if self.new_latches.is_empty() {
                    // Tap with no new latch: the global release gesture.
                    let mut decision = self.release_all();
                    decision.state_changed = true;
                    decision
                } else {
                    Decision::changed(Vec::new())
                }
            }
            // Auto-repeat of the held trigger: ignored entirely.
            KeyValue::Held => Decision::swallow(),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const T: KeyCode = 58; // trigger under test (CapsLock)
    const K: KeyCode = 30;
    const L: KeyCode = 31;

    fn down(code: KeyCode) -> KeyInput {
        KeyInput::new(code, KeyValue::Down)
    }

    fn up(code: KeyCode) -> KeyInput {
        KeyInput::new(code, KeyValue::Up)
    }

    fn held(code: KeyCode) -> KeyInput {
        KeyInput::new(code, KeyValue::Held)
    }

    fn emit(code: KeyCode, value: KeyValue) -> SinkAction {
        SinkAction::EmitKey { code, value }
    }

    /// Engine with `T` already bound as trigger via the capture path.
    fn engine_with_trigger() -> LatchEngine {
        let mut engine = LatchEngine::new();
        engine.arm_trigger_capture();
        engine.apply_key_event(down(T));
        engine
    }

    /// Engine with `T` bound and `K` latched (trigger released again).
    fn engine_with_latched_key() -> LatchEngine {
        let mut engine = engine_with_trigger();
        engine.apply_key_event(down(T));
        engine.apply_key_event(down(K));
        engine.apply_key_event(up(K));
        engine.apply_key_event(up(T));
        engine
    }

    // ── Passthrough ───────────────────────────────────────────────────────────

    #[test]
    fn test_unrelated_key_passes_through_at_every_value() {
        // Arrange
        let mut engine = engine_with_trigger();

        // Act / Assert – DOWN, HELD, and UP of a key that is neither the
        // trigger nor latched are all forwarded unchanged.
        for input in [down(K), held(K), up(K)] {
            let decision = engine.apply_key_event(input);
            assert_eq!(decision.actions, vec![SinkAction::ForwardRaw]);
            assert!(!decision.state_changed);
        }
    }

    #[test]
    fn test_keys_pass_through_when_no_trigger_is_bound() {
        let mut engine = LatchEngine::new();
        let decision = engine.apply_key_event(down(K));
        assert_eq!(decision.actions, vec![SinkAction::ForwardRaw]);
    }

    // ── Trigger capture ───────────────────────────────────────────────────────

    #[test]
    fn test_capture_consumes_exactly_one_down() {
        // Arrange
        let mut engine = LatchEngine::new();
        engine.arm_trigger_capture();

        // Act
        let decision = engine.apply_key_event(down(T));

        // Assert – the DOWN is fully consumed, the binding is set, capture
        // is disarmed.
        assert!(decision.actions.is_empty());
        assert!(decision.state_changed);
        assert_eq!(engine.trigger_code(), Some(T));
        assert!(!engine.capture_armed());
    }

    #[test]
    fn test_capture_ignores_up_and_held_and_stays_armed() {
        let mut engine = LatchEngine::new();
        engine.arm_trigger_capture();

        engine.apply_key_event(up(K));
        engine.apply_key_event(held(K));

        assert!(engine.capture_armed());
        assert_eq!(engine.trigger_code(), None);
    }

    #[test]
    fn test_capture_rebinds_trigger_to_new_code() {
        let mut engine = engine_with_trigger();

        engine.arm_trigger_capture();
        engine.apply_key_event(down(K));

        assert_eq!(engine.trigger_code(), Some(K));
        // The old trigger code now behaves as an ordinary key.
        let decision = engine.apply_key_event(down(T));
        assert_eq!(decision.actions, vec![SinkAction::ForwardRaw]);
    }

    #[test]
    fn test_capturing_a_latched_code_releases_it_first() {
        // Arrange – K is latched.
        let mut engine = engine_with_latched_key();

        // Act – bind K as the new trigger.
        engine.arm_trigger_capture();
        let decision = engine.apply_key_event(down(K));

        // Assert – the latch is released on the way in, so no code is ever
        // both trigger and latched.
        assert_eq!(decision.actions, vec![emit(K, KeyValue::Up)]);
        assert_eq!(engine.trigger_code(), Some(K));
        assert!(engine.latched_keys().is_empty());
    }

    // ── Trigger key handling ──────────────────────────────────────────────────

    #[test]
    fn test_trigger_is_never_written_to_the_sink() {
        let mut engine = engine_with_trigger();

        for input in [down(T), held(T), up(T), down(T), up(T)] {
            let decision = engine.apply_key_event(input);
            assert!(
                !decision.actions.contains(&SinkAction::ForwardRaw),
                "trigger event must not be forwarded"
            );
            assert!(
                !decision
                    .actions
                    .iter()
                    .any(|a| matches!(a, SinkAction::EmitKey { code, .. } if *code == T)),
                "trigger code must never be synthesized"
            );
        }
    }

    #[test]
    fn test_trigger_down_opens_span_and_clears_new_latches() {
        let mut engine = engine_with_trigger();

        let decision = engine.apply_key_event(down(T));

        assert!(engine.trigger_held());
        assert!(decision.state_changed);
        assert!(decision.actions.is_empty());
    }

    #[test]
    fn test_trigger_held_repeat_is_ignored() {
        let mut engine = engine_with_trigger();
        engine.apply_key_event(down(T));

        let decision = engine.apply_key_event(held(T));

        assert_eq!(decision, Decision::swallow());
        assert!(engine.trigger_held());
    }

    // ── Latch composition ─────────────────────────────────────────────────────

    #[test]
    fn test_compose_sequence_latches_key_and_keeps_it_after_trigger_release() {
        // Arrange
        let mut engine = engine_with_trigger();

        // Act – DOWN(T), DOWN(K), UP(K), UP(T)
        let d1 = engine.apply_key_event(down(T));
        assert!(engine.trigger_held());

        let d2 = engine.apply_key_event(down(K));
        let d3 = engine.apply_key_event(up(K));
        let d4 = engine.apply_key_event(up(T));

        // Assert – one synthetic DOWN(K), the physical UP(K) swallowed while
        // composing, and no release on trigger UP because a new latch exists.
        assert!(d1.actions.is_empty());
        assert_eq!(d2.actions, vec![emit(K, KeyValue::Down)]);
        assert!(d2.state_changed);
        assert_eq!(d3, Decision::swallow());
        assert!(d4.actions.is_empty());
        assert!(d4.state_changed);
        assert!(!engine.trigger_held());
        assert_eq!(engine.latched_keys(), vec![K]);
    }

    #[test]
    fn test_held_repeat_of_latched_key_while_composing_is_swallowed() {
        let mut engine = engine_with_trigger();
        engine.apply_key_event(down(T));
        engine.apply_key_event(down(K));

        assert_eq!(engine.apply_key_event(held(K)), Decision::swallow());
        assert_eq!(engine.latched_keys(), vec![K]);
    }

    #[test]
    fn test_re_press_of_latched_key_while_composing_reasserts_it() {
        let mut engine = engine_with_trigger();
        engine.apply_key_event(down(T));
        engine.apply_key_event(down(K));
        engine.apply_key_event(up(K));

        let decision = engine.apply_key_event(down(K));

        assert_eq!(decision.actions, vec![emit(K, KeyValue::Down)]);
        assert_eq!(engine.latched_keys(), vec![K]);
    }

    #[test]
    fn test_multiple_keys_latch_within_one_span() {
        let mut engine = engine_with_trigger();
        engine.apply_key_event(down(T));
        engine.apply_key_event(down(K));
        engine.apply_key_event(down(L));
        engine.apply_key_event(up(T));

        assert_eq!(engine.latched_keys(), vec![K, L]);
    }

    // ── Latched-key gate after composition ────────────────────────────────────

    #[test]
    fn test_stray_down_on_latched_key_is_swallowed() {
        let mut engine = engine_with_latched_key();

        let decision = engine.apply_key_event(down(K));

        assert_eq!(decision, Decision::swallow());
        assert_eq!(engine.latched_keys(), vec![K]);
    }

    #[test]
    fn test_up_on_latched_key_releases_it_with_one_synthetic_up() {
        let mut engine = engine_with_latched_key();

        let decision = engine.apply_key_event(up(K));

        assert_eq!(decision.actions, vec![emit(K, KeyValue::Up)]);
        assert!(decision.state_changed);
        assert!(engine.latched_keys().is_empty());
    }

    #[test]
    fn test_latch_is_released_exactly_once_per_cycle() {
        let mut engine = engine_with_latched_key();

        // First UP releases; a second physical UP finds the key unlatched
        // and passes through as an ordinary event.
        let first = engine.apply_key_event(up(K));
        let second = engine.apply_key_event(up(K));

        assert_eq!(first.actions, vec![emit(K, KeyValue::Up)]);
        assert_eq!(second.actions, vec![SinkAction::ForwardRaw]);
    }

    // ── Global release gesture ────────────────────────────────────────────────

    #[test]
    fn test_trigger_tap_with_no_new_latch_releases_everything() {
        // Arrange – K latched in a previous span.
        let mut engine = engine_with_latched_key();

        // Act – tap the trigger alone.
        engine.apply_key_event(down(T));
        let decision = engine.apply_key_event(up(T));

        // Assert – one synthetic UP for the latched key, set now empty.
        assert_eq!(decision.actions, vec![emit(K, KeyValue::Up)]);
        assert!(decision.state_changed);
        assert!(engine.latched_keys().is_empty());
    }

    #[test]
    fn test_trigger_tap_releases_latches_from_all_prior_spans() {
        let mut engine = engine_with_trigger();
        // Two spans, one latch each.
        for code in [K, L] {
            engine.apply_key_event(down(T));
            engine.apply_key_event(down(code));
            engine.apply_key_event(up(code));
            engine.apply_key_event(up(T));
        }
        assert_eq!(engine.latched_keys(), vec![K, L]);

        engine.apply_key_event(down(T));
        let decision = engine.apply_key_event(up(T));

        assert_eq!(
            decision.actions,
            vec![emit(K, KeyValue::Up), emit(L, KeyValue::Up)]
        );
        assert!(engine.latched_keys().is_empty());
    }

    #[test]
    fn test_re_pressing_latched_key_in_new_span_counts_as_new_latch() {
        // Arrange – K latched in an earlier span.
        let mut engine = engine_with_latched_key();

        // Act – hold the trigger and press K again.
        engine.apply_key_event(down(T));
        engine.apply_key_event(down(K));
        let decision = engine.apply_key_event(up(T));

        // Assert – the span latched something, so nothing is released.
        assert!(decision.actions.is_empty());
        assert_eq!(engine.latched_keys(), vec![K]);
    }

    #[test]
    fn test_trigger_up_with_new_latch_in_span_keeps_prior_latches() {
        // Arrange – K latched earlier.
        let mut engine = engine_with_latched_key();

        // Act – compose L in a fresh span.
        engine.apply_key_event(down(T));
        engine.apply_key_event(down(L));
        let decision = engine.apply_key_event(up(T));

        // Assert – nothing released: the span latched something new.
        assert!(decision.actions.is_empty());
        assert_eq!(engine.latched_keys(), vec![K, L]);
    }

    #[test]
    fn test_empty_tap_with_nothing_latched_emits_nothing() {
        let mut engine = engine_with_trigger();

        engine.apply_key_event(down(T));
        let decision = engine.apply_key_event(up(T));

        assert!(decision.actions.is_empty());
        assert!(decision.state_changed);
    }

    // ── release_all ───────────────────────────────────────────────────────────

    #[test]
    fn test_release_all_emits_one_up_per_latched_key_in_order() {
        let mut engine = engine_with_trigger();
        engine.apply_key_event(down(T));
        engine.apply_key_event(down(L));
        engine.apply_key_event(down(K));
        engine.apply_key_event(up(T));

        let decision = engine.release_all();

        assert_eq!(
            decision.actions,
            vec![emit(K, KeyValue::Up), emit(L, KeyValue::Up)]
        );
        assert!(decision.state_changed);
        assert!(engine.latched_keys().is_empty());
    }

    #[test]
    fn test_release_all_with_nothing_latched_is_a_no_op() {
        let mut engine = engine_with_trigger();
        assert_eq!(engine.release_all(), Decision::swallow());
    }

    // ── Invariants ────────────────────────────────────────────────────────────

    #[test]
    fn test_trigger_held_is_false_outside_a_span() {
        let mut engine = engine_with_trigger();
        assert!(!engine.trigger_held());
        engine.apply_key_event(down(T));
        assert!(engine.trigger_held());
        engine.apply_key_event(up(T));
        assert!(!engine.trigger_held());
    }

    #[test]
    fn test_trigger_code_is_never_in_latched_set() {
        let mut engine = engine_with_latched_key();
        engine.arm_trigger_capture();
        engine.apply_key_event(down(K));

        assert_eq!(engine.trigger_code(), Some(K));
        assert!(!engine.latched_keys().contains(&K));
    }
}
