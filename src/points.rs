use crate::taxonomy::{ActionType, DealSizeRange, ImpactLevel, StakeholderLevel};
use serde::{Deserialize, Serialize};

/// Optional modifiers that scale an action's points. They never change the
/// action's competency category.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ScoringContext {
    pub deal_size: Option<DealSizeRange>,
    pub stakeholder_level: Option<StakeholderLevel>,
    pub duration_minutes: Option<i64>,
}

/// Result of scoring one action. `multiplier` is the composed product rounded
/// to 2 decimals for storage/display; `total_points` is computed from the
/// unrounded product, so the two do not always reconcile exactly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointBreakdown {
    pub base_points: i64,
    pub multiplier: f64,
    pub total_points: i64,
}

/// Pure and total: every (type, impact, context) combination scores.
pub fn compute(action: ActionType, impact: ImpactLevel, ctx: &ScoringContext) -> PointBreakdown {
    let base = action.base_points();
    let mut product = impact.multiplier();

    if let Some(deal) = ctx.deal_size {
        product *= deal.multiplier();
    }
    if let Some(level) = ctx.stakeholder_level {
        product *= level.multiplier();
    }
    if let Some(minutes) = ctx.duration_minutes {
        product *= efficiency_bonus(action, minutes);
    }

    PointBreakdown {
        base_points: base,
        multiplier: round_2dp(product),
        total_points: (base as f64 * product).round() as i64,
    }
}

// At most one bonus fires per event: the duration gate is type-specific.
fn efficiency_bonus(action: ActionType, minutes: i64) -> f64 {
    match action {
        ActionType::CustomerMeeting if minutes < 30 => 1.1,
        ActionType::ProposalCreation if minutes < 120 => 1.1,
        _ => 1.0,
    }
}

fn round_2dp(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::{CompetencyCategory, ImpactLevel};

    #[test]
    fn bare_score_is_base_times_impact() {
        for action in ActionType::ALL {
            for impact in [
                ImpactLevel::Low,
                ImpactLevel::Medium,
                ImpactLevel::High,
                ImpactLevel::Critical,
            ] {
                let got = compute(action, impact, &ScoringContext::default());
                let want = (action.base_points() as f64 * impact.multiplier()).round() as i64;
                assert_eq!(got.total_points, want, "{action} at {impact}");
                assert_eq!(got.base_points, action.base_points());
            }
        }
    }

    #[test]
    fn modifiers_compose_multiplicatively() {
        let got = compute(
            ActionType::DealClosure,
            ImpactLevel::Critical,
            &ScoringContext {
                deal_size: Some(DealSizeRange::Over250K),
                stakeholder_level: Some(StakeholderLevel::Executive),
                duration_minutes: None,
            },
        );
        assert_eq!(got.base_points, 1000);
        assert_eq!(got.multiplier, 5.4);
        assert_eq!(got.total_points, 5400);
    }

    #[test]
    fn short_meeting_earns_efficiency_bonus() {
        let quick = compute(
            ActionType::CustomerMeeting,
            ImpactLevel::Low,
            &ScoringContext {
                duration_minutes: Some(25),
                ..Default::default()
            },
        );
        assert_eq!(quick.total_points, 110);
        assert_eq!(quick.multiplier, 1.1);

        let long = compute(
            ActionType::CustomerMeeting,
            ImpactLevel::Low,
            &ScoringContext {
                duration_minutes: Some(45),
                ..Default::default()
            },
        );
        assert_eq!(long.total_points, 100);
    }

    #[test]
    fn proposal_bonus_gates_at_two_hours() {
        let fast = compute(
            ActionType::ProposalCreation,
            ImpactLevel::Medium,
            &ScoringContext {
                duration_minutes: Some(90),
                ..Default::default()
            },
        );
        // 300 * 1.5 * 1.1 = 495
        assert_eq!(fast.total_points, 495);

        let slow = compute(
            ActionType::ProposalCreation,
            ImpactLevel::Medium,
            &ScoringContext {
                duration_minutes: Some(150),
                ..Default::default()
            },
        );
        assert_eq!(slow.total_points, 450);
    }

    #[test]
    fn duration_never_applies_to_other_types() {
        let got = compute(
            ActionType::ReferralGeneration,
            ImpactLevel::Low,
            &ScoringContext {
                duration_minutes: Some(5),
                ..Default::default()
            },
        );
        assert_eq!(got.total_points, 400);
    }

    #[test]
    fn effective_multiplier_never_drops_below_impact_base() {
        let ctx = ScoringContext {
            deal_size: Some(DealSizeRange::Under10K),
            stakeholder_level: Some(StakeholderLevel::IndividualContributor),
            duration_minutes: Some(600),
        };
        for action in ActionType::ALL {
            for impact in [ImpactLevel::Low, ImpactLevel::Critical] {
                let got = compute(action, impact, &ctx);
                assert!(got.multiplier >= impact.multiplier());
            }
        }
    }

    #[test]
    fn category_helper_matches_taxonomy() {
        assert_eq!(
            ActionType::DealClosure.default_category(),
            CompetencyCategory::SalesExecution
        );
    }
}
