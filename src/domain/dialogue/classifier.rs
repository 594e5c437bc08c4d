//! Turn classification: what an inbound message means for the funnel.
//!
//! Classification is pure. It never mutates the session; the engine applies
//! the resulting [`Decision`].
//!
//! Precedence, first match wins:
//!
//! 1. human-request keywords (any step)
//! 2. the current step's completion condition (→ `next`)
//! 3. `match_keywords` of a different reachable step (`next`, then branches)
//! 4. FAQ entries in order
//! 5. the phase's holding reply
//! 6. off-script

use crate::domain::conversation::{ConversationState, PostalCode};
use crate::domain::foundation::text;
use crate::domain::pricing::PriceCatalog;
use crate::domain::script::{
    first_match, FlowStep, Phase, ScriptConfigError, ScriptVersion, StepKey, StepRef,
};

/// Plans offered when the catalog has none for the selected product.
pub const DEFAULT_PLANS: [&str; 2] = ["60", "120"];

/// Keywords that mean "let me talk to a person".
pub const DEFAULT_HUMAN_KEYWORDS: [&str; 6] = [
    "humano",
    "persona",
    "asesor",
    "administrador",
    "operador",
    "hablar con alguien",
];

/// Data a completion condition pulled out of the message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capture {
    Plan {
        plan: String,
        price: Option<String>,
    },
    Address {
        address: String,
        postal_code: Option<PostalCode>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvanceTrigger {
    Completion,
    Keyword(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    HumanRequested {
        keyword: String,
    },
    Advance {
        to: StepRef,
        trigger: AdvanceTrigger,
        capture: Option<Capture>,
    },
    Faq {
        index: usize,
        trigger_step: Option<StepKey>,
    },
    Hold {
        reply: String,
    },
    OffScript,
}

/// The decision plus any script defects met on the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub decision: Decision,
    pub issues: Vec<ScriptConfigError>,
}

/// Everything classification reads.
pub struct TurnInput<'a> {
    pub state: &'a ConversationState,
    pub version: &'a ScriptVersion,
    pub catalog: &'a PriceCatalog,
    pub text: &'a str,
    pub human_keywords: &'a [String],
}

pub fn classify(input: &TurnInput<'_>) -> Classification {
    let normalized = text::normalize(input.text);
    let mut issues = Vec::new();

    if let Some(keyword) = text::find_keyword(&normalized, input.human_keywords) {
        return Classification {
            decision: Decision::HumanRequested {
                keyword: keyword.to_string(),
            },
            issues,
        };
    }

    let current = match input.state.current_step() {
        StepRef::Step(key) => match input.version.step(key) {
            Some(step) => Some((key, step)),
            None => {
                issues.push(ScriptConfigError::UnknownStep {
                    version: input.version.name().to_string(),
                    step: key.to_string(),
                });
                None
            }
        },
        StepRef::Completed => None,
    };

    if let Some((key, step)) = current {
        if let Some(decision) = advance(input, &normalized, key, step, &mut issues) {
            return Classification { decision, issues };
        }
    }

    if let Some(index) = first_match(input.version.faq(), &normalized) {
        let trigger_step = input.version.faq()[index]
            .trigger_step
            .as_ref()
            .and_then(|target| {
                if input.version.step(target).is_some() {
                    Some(target.clone())
                } else {
                    issues.push(ScriptConfigError::DanglingFaqTrigger {
                        version: input.version.name().to_string(),
                        index,
                        step: target.to_string(),
                    });
                    None
                }
            });
        return Classification {
            decision: Decision::Faq {
                index,
                trigger_step,
            },
            issues,
        };
    }

    if let Some((_, step)) = current {
        if let Some(reply) = step.phase.holding_reply(&normalized) {
            return Classification {
                decision: Decision::Hold {
                    reply: reply.to_string(),
                },
                issues,
            };
        }
    }

    Classification {
        decision: Decision::OffScript,
        issues,
    }
}

fn advance(
    input: &TurnInput<'_>,
    normalized: &str,
    key: &StepKey,
    step: &FlowStep,
    issues: &mut Vec<ScriptConfigError>,
) -> Option<Decision> {
    let version = input.version;

    if let (Some(capture), Some(next)) = (completion(input, normalized, &step.phase), &step.next) {
        if version.resolves(next) {
            return Some(Decision::Advance {
                to: next.clone(),
                trigger: AdvanceTrigger::Completion,
                capture: capture.into_capture(),
            });
        }
        issues.push(ScriptConfigError::DanglingNext {
            version: version.name().to_string(),
            step: key.to_string(),
            target: next.to_string(),
        });
    }

    for (position, target) in step.reachable().into_iter().enumerate() {
        let StepRef::Step(target_key) = &target else {
            continue;
        };
        if target_key == key {
            continue;
        }
        let Some(target_step) = version.step(target_key) else {
            // The completion check above already reported a dangling `next`.
            let is_next = position == 0 && step.next.is_some();
            if !is_next {
                issues.push(ScriptConfigError::DanglingBranch {
                    version: version.name().to_string(),
                    step: key.to_string(),
                    target: target_key.to_string(),
                });
            } else if !issues.iter().any(|i| matches!(i, ScriptConfigError::DanglingNext { .. })) {
                issues.push(ScriptConfigError::DanglingNext {
                    version: version.name().to_string(),
                    step: key.to_string(),
                    target: target_key.to_string(),
                });
            }
            continue;
        };
        if let Some(keyword) = text::find_keyword(normalized, &target_step.match_keywords) {
            return Some(Decision::Advance {
                to: target,
                trigger: AdvanceTrigger::Keyword(keyword.to_string()),
                capture: None,
            });
        }
    }

    None
}

/// Outcome of a satisfied completion condition.
enum Completed {
    Plain,
    With(Capture),
}

impl Completed {
    fn into_capture(self) -> Option<Capture> {
        match self {
            Completed::Plain => None,
            Completed::With(capture) => Some(capture),
        }
    }
}

fn completion(input: &TurnInput<'_>, normalized: &str, phase: &Phase) -> Option<Completed> {
    let satisfied = match phase {
        Phase::Greeting => true,
        Phase::WaitingWeight { goal_words } => {
            !text::digit_runs(normalized).is_empty() || text::contains_any(normalized, goal_words)
        }
        Phase::WaitingChoice | Phase::WaitingAdminApproval { .. } => false,
        Phase::WaitingConfirmation {
            affirmatives,
            doubts,
        } => {
            text::contains_any(normalized, affirmatives)
                && !text::contains_any(normalized, doubts)
        }
        Phase::WaitingPlanChoice => {
            return plan_choice(input, normalized).map(Completed::With);
        }
        Phase::WaitingData { min_address_len } => {
            let address = input.text.trim();
            let looks_like_address = address.chars().any(|c| c.is_ascii_digit())
                || address.chars().count() > *min_address_len;
            if !looks_like_address {
                return None;
            }
            return Some(Completed::With(Capture::Address {
                address: address.to_string(),
                postal_code: PostalCode::extract(address),
            }));
        }
        Phase::WaitingAcceptance { required, .. } => required.iter().all(|word| {
            let word = text::normalize(word.trim());
            word.is_empty() || normalized.contains(&word)
        }),
    };
    satisfied.then_some(Completed::Plain)
}

/// The single plan named in the text, with its catalog price.
fn plan_choice(input: &TurnInput<'_>, normalized: &str) -> Option<Capture> {
    let product = input.state.order().and_then(|o| o.product.as_deref());
    let mut plans: Vec<String> = product
        .map(|p| input.catalog.plans(p))
        .unwrap_or_default()
        .into_iter()
        .map(str::to_string)
        .collect();
    if plans.is_empty() {
        plans = DEFAULT_PLANS.iter().map(|p| p.to_string()).collect();
    }

    let runs = text::digit_runs(normalized);
    let named: Vec<&String> = plans
        .iter()
        .filter(|plan| {
            if plan.chars().all(|c| c.is_ascii_digit()) {
                runs.contains(&plan.as_str())
            } else {
                normalized.contains(&text::normalize(plan))
            }
        })
        .collect();

    match named.as_slice() {
        [plan] => Some(Capture::Plan {
            plan: (*plan).clone(),
            price: product
                .and_then(|p| input.catalog.price(p, plan))
                .map(str::to_string),
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::ChatId;
    use crate::domain::script::{default_version, FaqEntry, ScriptDocument, ScriptVersionName};
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    fn key(s: &str) -> StepKey {
        StepKey::new(s).unwrap()
    }

    fn session_at(version: &ScriptVersion, step: &str) -> ConversationState {
        let mut state = ConversationState::new(
            ChatId::new("chat-1").unwrap(),
            version.name().clone(),
            version.entry_step().clone(),
        );
        state.move_to(step.parse().unwrap());
        state
    }

    fn humans() -> Vec<String> {
        DEFAULT_HUMAN_KEYWORDS.iter().map(|k| k.to_string()).collect()
    }

    fn classify_at(
        version: &ScriptVersion,
        state: &ConversationState,
        text: &str,
    ) -> Classification {
        let catalog = PriceCatalog::with_defaults();
        let human_keywords = humans();
        classify(&TurnInput {
            state,
            version,
            catalog: &catalog,
            text,
            human_keywords: &human_keywords,
        })
    }

    #[test]
    fn number_completes_weight_step() {
        let v1 = default_version().unwrap();
        let state = session_at(&v1, "waiting_weight");
        let out = classify_at(&v1, &state, "60");
        assert_eq!(
            out.decision,
            Decision::Advance {
                to: "recommendation".parse().unwrap(),
                trigger: AdvanceTrigger::Completion,
                capture: None,
            }
        );
        assert!(out.issues.is_empty());
    }

    #[test]
    fn human_request_wins_at_any_step() {
        let v1 = default_version().unwrap();
        for step in ["greeting", "waiting_weight", "closing", "completed"] {
            let state = session_at(&v1, step);
            let out = classify_at(&v1, &state, "Quiero hablar con una PERSONA");
            assert!(matches!(out.decision, Decision::HumanRequested { .. }));
        }
    }

    #[test]
    fn branch_keyword_routes_from_choice_step() {
        let v1 = default_version().unwrap();
        let state = session_at(&v1, "recommendation");
        let out = classify_at(&v1, &state, "Prefiero las semillas");
        assert_eq!(
            out.decision,
            Decision::Advance {
                to: "preference_semillas".parse().unwrap(),
                trigger: AdvanceTrigger::Keyword("semilla".into()),
                capture: None,
            }
        );
    }

    #[test]
    fn doubt_blocks_confirmation_and_falls_to_faq() {
        let v1 = default_version().unwrap();
        let state = session_at(&v1, "closing");
        let out = classify_at(&v1, &state, "si, pero como es el pago?");
        assert_eq!(
            out.decision,
            Decision::Faq {
                index: 1,
                trigger_step: None
            }
        );
    }

    #[test]
    fn plan_choice_captures_catalog_price() {
        let v1 = default_version().unwrap();
        let mut state = session_at(&v1, "price_capsulas");
        state.select_product("Cápsulas");
        let out = classify_at(&v1, &state, "el de 120 días");
        assert_eq!(
            out.decision,
            Decision::Advance {
                to: "closing".parse().unwrap(),
                trigger: AdvanceTrigger::Completion,
                capture: Some(Capture::Plan {
                    plan: "120".into(),
                    price: Some("66.900".into()),
                }),
            }
        );
    }

    #[test]
    fn naming_both_plans_is_ambiguous() {
        let v1 = default_version().unwrap();
        let mut state = session_at(&v1, "price_semillas");
        state.select_product("Semillas");
        let out = classify_at(&v1, &state, "60 o 120?");
        assert!(!matches!(out.decision, Decision::Advance { .. }));
    }

    #[test]
    fn address_completes_data_step_with_postal_code() {
        let v1 = default_version().unwrap();
        let state = session_at(&v1, "data_request");
        let out = classify_at(&v1, &state, "Juan Pérez, Mitre 450, Rosario, CP 2000");
        match out.decision {
            Decision::Advance {
                capture: Some(Capture::Address { postal_code, .. }),
                ..
            } => assert_eq!(postal_code.unwrap().code, "2000"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn acceptance_needs_every_word_and_nudges_get_a_reminder() {
        let v1 = default_version().unwrap();
        let state = session_at(&v1, "legal_acceptance");
        let accepted = classify_at(&v1, &state, "Leí y acepto las condiciones de envío");
        assert!(matches!(
            accepted.decision,
            Decision::Advance { to: StepRef::Completed, .. }
        ));

        let nudge = classify_at(&v1, &state, "dale");
        assert!(matches!(nudge.decision, Decision::Hold { .. }));
    }

    #[test]
    fn completed_sessions_still_get_faq_answers() {
        let v1 = default_version().unwrap();
        let state = session_at(&v1, "completed");
        let out = classify_at(&v1, &state, "cuando llega el envio?");
        assert!(matches!(out.decision, Decision::Faq { index: 0, .. }));
        assert_eq!(classify_at(&v1, &state, "gracias!").decision, Decision::OffScript);
    }

    #[test]
    fn faq_trigger_moves_to_existing_step() {
        let v1 = default_version().unwrap();
        let state = session_at(&v1, "recommendation");
        let out = classify_at(&v1, &state, "cuanto sale?");
        assert_eq!(
            out.decision,
            Decision::Faq {
                index: 3,
                trigger_step: Some(key("price_capsulas")),
            }
        );
    }

    fn dangling_version() -> ScriptVersion {
        let mut flow = BTreeMap::new();
        flow.insert(
            key("waiting_weight"),
            FlowStep::new(Phase::weight(), "¿Cuántos kilos?")
                .with_next(StepRef::Step(key("ghost"))),
        );
        let mut doc = ScriptDocument::new(key("waiting_weight"), flow);
        doc.faq.push(FaqEntry::new(&["envio"], "Correo Argentino"));
        ScriptVersion::load(ScriptVersionName::new("broken").unwrap(), doc)
    }

    #[test]
    fn dangling_next_keeps_session_and_reports_once() {
        let version = dangling_version();
        let state = session_at(&version, "waiting_weight");
        let out = classify_at(&version, &state, "quiero bajar 10 kilos");
        assert_eq!(out.decision, Decision::OffScript);
        assert_eq!(
            out.issues,
            vec![ScriptConfigError::DanglingNext {
                version: "broken".into(),
                step: "waiting_weight".into(),
                target: "ghost".into(),
            }]
        );
    }

    #[test]
    fn unknown_current_step_is_reported() {
        let version = dangling_version();
        let state = session_at(&version, "nowhere");
        let out = classify_at(&version, &state, "hola");
        assert!(matches!(out.issues[0], ScriptConfigError::UnknownStep { .. }));
        assert_eq!(out.decision, Decision::OffScript);
    }

    proptest! {
        #[test]
        fn classification_is_deterministic(text in "[a-zA-Z0-9 ?áé]{0,40}") {
            let v1 = default_version().unwrap();
            for step in ["greeting", "recommendation", "closing", "completed"] {
                let state = session_at(&v1, step);
                let first = classify_at(&v1, &state, &text);
                let second = classify_at(&v1, &state, &text);
                prop_assert_eq!(first, second);
            }
        }
    }
}
