use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::LookupError;
use crate::storage::UserProfile;

/// Read-only policy reference data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    pub policy_number: String,
    #[serde(rename = "type")]
    pub policy_type: String,
    pub status: String,
    pub premium: String,
    pub coverage: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property: Option<String>,
    pub expiry_date: String,
}

impl Policy {
    /// Multi-line summary shown when a claim names this policy
    pub fn summary(&self) -> String {
        let mut lines = vec![
            format!("Type: {}", self.policy_type),
            format!("Status: {}", self.status),
            format!("Premium: {}", self.premium),
            format!("Coverage: {}", self.coverage),
        ];
        if let Some(vehicle) = &self.vehicle {
            lines.push(format!("Vehicle: {vehicle}"));
        }
        if let Some(property) = &self.property {
            lines.push(format!("Property: {property}"));
        }
        lines.push(format!("Expiry: {}", self.expiry_date));
        lines.join("\n")
    }

    /// Whether `input` names this policy: exact match ignoring case, or a
    /// fragment longer than three characters
    pub fn matches(&self, input: &str) -> bool {
        let input = input.trim().to_uppercase();
        let number = self.policy_number.to_uppercase();
        input == number || (input.len() > 3 && number.contains(&input))
    }
}

/// Policy service seen from the flow controller
#[async_trait]
pub trait PolicyLookup: Send + Sync {
    /// The user's policy named by `number`, if any
    async fn find(&self, user: &UserProfile, number: &str) -> Result<Option<Policy>, LookupError>;

    async fn list(&self, user: &UserProfile) -> Result<Vec<Policy>, LookupError>;
}

/// In-memory policy directory keyed by user email
#[derive(Debug, Clone, Default)]
pub struct InMemoryPolicyDirectory {
    policies: HashMap<String, Vec<Policy>>,
}

impl InMemoryPolicyDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policies(mut self, email: impl Into<String>, policies: Vec<Policy>) -> Self {
        self.policies.entry(email.into()).or_default().extend(policies);
        self
    }
}

#[async_trait]
impl PolicyLookup for InMemoryPolicyDirectory {
    async fn find(&self, user: &UserProfile, number: &str) -> Result<Option<Policy>, LookupError> {
        let Some(policies) = self.policies.get(&user.email) else {
            return Ok(None);
        };
        let exact = policies
            .iter()
            .find(|policy| policy.policy_number.eq_ignore_ascii_case(number.trim()));
        Ok(exact
            .or_else(|| policies.iter().find(|policy| policy.matches(number)))
            .cloned())
    }

    async fn list(&self, user: &UserProfile) -> Result<Vec<Policy>, LookupError> {
        Ok(self.policies.get(&user.email).cloned().unwrap_or_default())
    }
}
