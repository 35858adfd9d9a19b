use serde::Serialize;

use super::stage::Stage;

/// Result of asking whether a card may move between two columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionCheck {
    pub allowed: bool,
    pub requires_capture: bool,
}

/// Any move to a different stage is allowed, backwards included. Dropping on the
/// current stage is a no-op. Entering `Selected` needs the offered package.
pub fn can_transition(current: Stage, target: Stage) -> TransitionCheck {
    TransitionCheck {
        allowed: current != target,
        requires_capture: target.requires_capture() && current != target,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_move_to_another_stage_is_allowed() {
        for current in Stage::ordered() {
            for target in Stage::ordered() {
                let check = can_transition(current, target);
                assert_eq!(check.allowed, current != target, "{current} -> {target}");
            }
        }
    }

    #[test]
    fn capture_required_only_when_entering_selected() {
        for current in Stage::ordered() {
            for target in Stage::ordered() {
                let expected = target == Stage::Selected && current != Stage::Selected;
                assert_eq!(
                    can_transition(current, target).requires_capture,
                    expected,
                    "{current} -> {target}"
                );
            }
        }
    }

    #[test]
    fn applied_to_interview_commits_directly() {
        assert_eq!(
            can_transition(Stage::Applied, Stage::Interview),
            TransitionCheck {
                allowed: true,
                requires_capture: false,
            }
        );
    }

    #[test]
    fn backward_moves_are_permitted() {
        let check = can_transition(Stage::Interview, Stage::Shortlisted);
        assert!(check.allowed);
        assert!(!check.requires_capture);

        let reopened = can_transition(Stage::Rejected, Stage::Selected);
        assert!(reopened.allowed);
        assert!(reopened.requires_capture);
    }
}
