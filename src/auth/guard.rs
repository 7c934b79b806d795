use crate::profiles::repo::Role;

/// Session lifecycle as seen by a navigable region.
///
/// `Resolving` exists for consumers that restore a session asynchronously;
/// a guard must hold rather than redirect while in it. An authenticated
/// identity without a profile row has no role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Resolving,
    Unauthenticated,
    Authenticated { role: Option<Role> },
}

/// What a guarded region should do for the current session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardOutcome {
    /// Session still resolving: render a neutral placeholder, no redirect.
    Wait,
    /// Send to the login entry point.
    ToLogin,
    /// Role mismatch: send to that role's own home, never an error page.
    ToHome(Role),
    /// Render the guarded region.
    Allow,
}

/// Evaluated on every navigation; never cached across navigations.
pub fn evaluate(required: Role, session: &SessionState) -> GuardOutcome {
    match session {
        SessionState::Resolving => GuardOutcome::Wait,
        SessionState::Unauthenticated => GuardOutcome::ToLogin,
        SessionState::Authenticated { role: None } => GuardOutcome::ToLogin,
        SessionState::Authenticated { role: Some(role) } => {
            if *role == required {
                GuardOutcome::Allow
            } else {
                GuardOutcome::ToHome(*role)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolving_session_waits_without_redirect() {
        assert_eq!(evaluate(Role::Admin, &SessionState::Resolving), GuardOutcome::Wait);
        assert_eq!(evaluate(Role::Student, &SessionState::Resolving), GuardOutcome::Wait);
    }

    #[test]
    fn unauthenticated_goes_to_login() {
        assert_eq!(
            evaluate(Role::Admin, &SessionState::Unauthenticated),
            GuardOutcome::ToLogin
        );
    }

    #[test]
    fn missing_profile_role_goes_to_login_not_student() {
        assert_eq!(
            evaluate(Role::Student, &SessionState::Authenticated { role: None }),
            GuardOutcome::ToLogin
        );
    }

    #[test]
    fn role_mismatch_redirects_to_own_home() {
        let student = SessionState::Authenticated {
            role: Some(Role::Student),
        };
        assert_eq!(
            evaluate(Role::Admin, &student),
            GuardOutcome::ToHome(Role::Student)
        );

        let admin = SessionState::Authenticated {
            role: Some(Role::Admin),
        };
        assert_eq!(
            evaluate(Role::Student, &admin),
            GuardOutcome::ToHome(Role::Admin)
        );
    }

    #[test]
    fn matching_role_is_allowed() {
        let admin = SessionState::Authenticated {
            role: Some(Role::Admin),
        };
        assert_eq!(evaluate(Role::Admin, &admin), GuardOutcome::Allow);
    }

    // Unauthenticated /admin lands on login; after signing in as a student,
    // /admin lands on /dashboard. Admin content is never rendered.
    #[test]
    fn student_never_reaches_admin_region() {
        let mut session = SessionState::Unauthenticated;
        assert_eq!(evaluate(Role::Admin, &session), GuardOutcome::ToLogin);

        session = SessionState::Authenticated {
            role: Some(Role::Student),
        };
        match evaluate(Role::Admin, &session) {
            GuardOutcome::ToHome(role) => assert_eq!(role.home_path(), "/dashboard"),
            other => panic!("expected redirect home, got {:?}", other),
        }
    }
}
