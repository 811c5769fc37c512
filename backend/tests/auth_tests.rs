//! Authentication and authorization tests
//!
//! Property-based and unit tests for:
//! - Role gate enforcement
//! - Email and password rules

use proptest::prelude::*;
use shared::models::Role;
use shared::{validate_email, validate_password};

// ============================================================================
// Property Test Strategies
// ============================================================================

/// Generate valid email addresses
fn email_strategy() -> impl Strategy<Value = String> {
    "[a-z]{5,10}@[a-z]{3,8}\\.(com|org|net|co\\.id)"
}

/// Generate valid passwords (8+ chars)
fn password_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9!@#$%]{8,20}"
}

fn role_strategy() -> impl Strategy<Value = Role> {
    prop_oneof![
        Just(Role::Admin),
        Just(Role::Warehouse),
        Just(Role::Technician),
    ]
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// A role always satisfies a gate that lists it
    #[test]
    fn test_role_satisfies_own_gate(role in role_strategy()) {
        prop_assert!(role.satisfies(&[role]));
    }

    /// Admin passes any gate; others only gates that list them
    #[test]
    fn test_gate_enforcement(
        role in role_strategy(),
        allowed in prop::collection::vec(role_strategy(), 0..3)
    ) {
        let expected = role == Role::Admin || allowed.contains(&role);
        prop_assert_eq!(role.satisfies(&allowed), expected);
    }

    /// Role names survive the token claim round trip
    #[test]
    fn test_role_claim_round_trip(role in role_strategy()) {
        prop_assert_eq!(Role::parse(role.as_str()), Some(role));
    }

    #[test]
    fn test_email_format(email in email_strategy()) {
        prop_assert!(validate_email(&email).is_ok());
    }

    #[test]
    fn test_password_strength(password in password_strategy()) {
        prop_assert!(validate_password(&password).is_ok());
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_receiving_gate() {
        let receiving = [Role::Warehouse];
        assert!(Role::Warehouse.satisfies(&receiving));
        assert!(Role::Admin.satisfies(&receiving));
        assert!(!Role::Technician.satisfies(&receiving));
    }

    #[test]
    fn test_technician_gate() {
        let mobile = [Role::Technician];
        assert!(Role::Technician.satisfies(&mobile));
        assert!(!Role::Warehouse.satisfies(&mobile));
    }

    #[test]
    fn test_admin_only_gate() {
        let admin_only = [Role::Admin];
        assert!(Role::Admin.satisfies(&admin_only));
        assert!(!Role::Warehouse.satisfies(&admin_only));
        assert!(!Role::Technician.satisfies(&admin_only));
    }

    #[test]
    fn test_unknown_role_rejected() {
        assert_eq!(Role::parse("owner"), None);
        assert_eq!(Role::parse("Admin"), None);
    }

    #[test]
    fn test_short_password_rejected() {
        assert_eq!(
            validate_password("short"),
            Err("Password must be at least 8 characters")
        );
    }

    #[test]
    fn test_invalid_emails() {
        for email in ["", "tech", "tech@", "a@b"] {
            assert!(validate_email(email).is_err(), "{email} should be invalid");
        }
    }
}
