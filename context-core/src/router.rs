//! The smart router: a stateless classifier mapping a new memory's shape to
//! a target tier, per the priority order in spec §4.5.

use crate::model::{MemoryType, Tier};

/// A placement decision plus a diagnostic-only confidence value (spec
/// §4.5: "Each decision carries a confidence value used only for
/// diagnostics").
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteDecision {
    pub tier: Tier,
    pub confidence: f32,
}

/// Route a new memory to a tier. `explicit_tier` wins outright; then tag
/// hints; then an explicit ttl; then type; then the legacy `code`
/// heuristic; default tier 2.
pub fn route(
    memory_type: &MemoryType,
    tags: &[String],
    ttl: Option<u64>,
    explicit_tier: Option<Tier>,
    content: &str,
) -> RouteDecision {
    if let Some(tier) = explicit_tier {
        return RouteDecision {
            tier,
            confidence: 1.0,
        };
    }

    if has_tag(tags, &["temp", "temporary"]) {
        return RouteDecision {
            tier: Tier::Working,
            confidence: 0.95,
        };
    }
    if has_tag(tags, &["global", "universal"]) {
        return RouteDecision {
            tier: Tier::Semantic,
            confidence: 0.95,
        };
    }
    if has_tag(tags, &["project", "local"]) {
        return RouteDecision {
            tier: Tier::Project,
            confidence: 0.95,
        };
    }

    if ttl.is_some_and(|t| t > 0) {
        return RouteDecision {
            tier: Tier::Working,
            confidence: 0.9,
        };
    }

    match memory_type {
        MemoryType::Scratchpad => {
            return RouteDecision {
                tier: Tier::Working,
                confidence: 0.85,
            }
        }
        MemoryType::CodePattern | MemoryType::Convention | MemoryType::Relationship => {
            return RouteDecision {
                tier: Tier::Semantic,
                confidence: 0.85,
            }
        }
        MemoryType::Decision | MemoryType::BugFix => {
            return RouteDecision {
                tier: Tier::Project,
                confidence: 0.85,
            }
        }
        MemoryType::Legacy(_) => {}
    }

    if memory_type.is_legacy_working() {
        return RouteDecision {
            tier: Tier::Working,
            confidence: 0.8,
        };
    }
    if memory_type.is_legacy_project() {
        return RouteDecision {
            tier: Tier::Project,
            confidence: 0.8,
        };
    }
    if memory_type.is_legacy_code() {
        return RouteDecision {
            tier: route_legacy_code(content),
            confidence: 0.6,
        };
    }

    RouteDecision {
        tier: Tier::Project,
        confidence: 0.5,
    }
}

fn has_tag(tags: &[String], candidates: &[&str]) -> bool {
    tags.iter()
        .any(|t| candidates.iter().any(|c| t.eq_ignore_ascii_case(c)))
}

/// Heuristic for the legacy `code` type (spec §4.5 item 5): reusable,
/// generic-looking snippets go to tier 3; everything else (business logic
/// tied to this project) goes to tier 2.
fn route_legacy_code(content: &str) -> Tier {
    if looks_like_reusable_pattern(content) && looks_generic(content) {
        Tier::Semantic
    } else {
        Tier::Project
    }
}

const DECLARATION_MARKERS: &[&str] = &[
    "function ", "fn ", "class ", "interface ", "type ", "def ", "const ", "/// ", "/**",
];

fn looks_like_reusable_pattern(content: &str) -> bool {
    DECLARATION_MARKERS.iter().any(|m| content.contains(m))
}

/// Tokens that suggest the snippet is tied to this project's business
/// domain rather than being a generic, reusable pattern. A handful of
/// matches outweighs the "looks like a declaration" signal.
const DOMAIN_HINT_WORDS: &[&str] = &[
    "invoice", "customer", "checkout", "subscription", "tenant", "order", "billing", "account",
    "user_id", "userid", "payment",
];

fn looks_generic(content: &str) -> bool {
    let lower = content.to_ascii_lowercase();
    let hits = DOMAIN_HINT_WORDS.iter().filter(|w| lower.contains(*w)).count();
    hits < 2
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decide(memory_type: MemoryType) -> RouteDecision {
        route(&memory_type, &[], None, None, "")
    }

    #[test]
    fn explicit_tier_wins_outright() {
        let d = route(
            &MemoryType::Scratchpad,
            &["global".to_string()],
            Some(60),
            Some(Tier::Project),
            "",
        );
        assert_eq!(d.tier, Tier::Project);
        assert_eq!(d.confidence, 1.0);
    }

    #[test]
    fn temp_tag_beats_type() {
        let d = route(&MemoryType::Decision, &["temp".into()], None, None, "");
        assert_eq!(d.tier, Tier::Working);
    }

    #[test]
    fn ttl_without_tag_routes_tier1() {
        let d = route(&MemoryType::Decision, &[], Some(30), None, "");
        assert_eq!(d.tier, Tier::Working);
    }

    #[test]
    fn type_routing_matches_table() {
        assert_eq!(decide(MemoryType::Scratchpad).tier, Tier::Working);
        assert_eq!(decide(MemoryType::CodePattern).tier, Tier::Semantic);
        assert_eq!(decide(MemoryType::Convention).tier, Tier::Semantic);
        assert_eq!(decide(MemoryType::Decision).tier, Tier::Project);
        assert_eq!(decide(MemoryType::BugFix).tier, Tier::Project);
    }

    #[test]
    fn legacy_types_route_per_table() {
        assert_eq!(decide(MemoryType::parse("thought")).tier, Tier::Working);
        assert_eq!(decide(MemoryType::parse("observation")).tier, Tier::Working);
        assert_eq!(decide(MemoryType::parse("documentation")).tier, Tier::Project);
        assert_eq!(decide(MemoryType::parse("error")).tier, Tier::Project);
    }

    #[test]
    fn legacy_code_generic_pattern_routes_tier3() {
        let content = "/// Reusable retry helper\nfunction withRetry(fn, times) { }";
        let d = route(&MemoryType::parse("code"), &[], None, None, content);
        assert_eq!(d.tier, Tier::Semantic);
    }

    #[test]
    fn legacy_code_domain_specific_routes_tier2() {
        let content =
            "function chargeInvoiceForCustomer(customer, invoice) { billing.charge(invoice); }";
        let d = route(&MemoryType::parse("code"), &[], None, None, content);
        assert_eq!(d.tier, Tier::Project);
    }

    #[test]
    fn unknown_defaults_to_tier2() {
        let d = decide(MemoryType::parse("weird-type"));
        assert_eq!(d.tier, Tier::Project);
    }
}
