//! Demo accounts and their policies.

use claim_flow::{InMemoryPolicyDirectory, Policy, UserProfile};

struct DemoAccount {
    name: &'static str,
    email: &'static str,
    password: &'static str,
}

const ACCOUNTS: &[DemoAccount] = &[
    DemoAccount {
        name: "Demo User One",
        email: "demo1@company.com",
        password: "demo123",
    },
    DemoAccount {
        name: "Demo User Two",
        email: "demo2@company.com",
        password: "demo456",
    },
];

/// Profile for matching credentials. Email is case-insensitive, password is not.
pub fn authenticate(email: &str, password: &str) -> Option<UserProfile> {
    ACCOUNTS
        .iter()
        .find(|account| {
            account.email.eq_ignore_ascii_case(email.trim()) && account.password == password
        })
        .map(|account| UserProfile::new(account.name, account.email))
}

fn policy(
    number: &str,
    policy_type: &str,
    premium: &str,
    coverage: &str,
    vehicle: Option<&str>,
    property: Option<&str>,
    expiry: &str,
) -> Policy {
    Policy {
        policy_number: number.to_string(),
        policy_type: policy_type.to_string(),
        status: "Active".to_string(),
        premium: premium.to_string(),
        coverage: coverage.to_string(),
        vehicle: vehicle.map(str::to_string),
        property: property.map(str::to_string),
        expiry_date: expiry.to_string(),
    }
}

pub fn policy_directory() -> InMemoryPolicyDirectory {
    InMemoryPolicyDirectory::new()
        .with_policies(
            "demo1@company.com",
            vec![
                policy(
                    "POL-2024-001",
                    "Auto Insurance",
                    "$1,200/year",
                    "Full Coverage",
                    Some("2020 Toyota Camry"),
                    None,
                    "2024-12-31",
                ),
                policy(
                    "POL-2024-002",
                    "Home Insurance",
                    "$800/year",
                    "Comprehensive",
                    None,
                    Some("123 Main St, City"),
                    "2024-11-30",
                ),
                policy(
                    "POL-2026-003",
                    "Bike Insurance",
                    "$120/year",
                    "Comprehensive",
                    None,
                    Some("123 Main St, City"),
                    "2026-12-31",
                ),
            ],
        )
        .with_policies(
            "demo2@company.com",
            vec![policy(
                "POL-2024-003",
                "Auto Insurance",
                "$1,500/year",
                "Full Coverage",
                Some("2022 Honda Accord"),
                None,
                "2025-01-15",
            )],
        )
}
