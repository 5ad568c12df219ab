//! Policy Domains
//!
//! The policy areas the advisor is pitched at. A topic only changes the
//! headings and guidance shown to the user; retrieval is the same for all.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyTopic {
    #[default]
    HrGuidelines,
    DataSecurity,
    HealthSafety,
}

impl PolicyTopic {
    pub const ALL: [PolicyTopic; 3] = [
        PolicyTopic::HrGuidelines,
        PolicyTopic::DataSecurity,
        PolicyTopic::HealthSafety,
    ];

    /// Short display name
    pub fn label(&self) -> &'static str {
        match self {
            PolicyTopic::HrGuidelines => "HR Guidelines",
            PolicyTopic::DataSecurity => "Data Security",
            PolicyTopic::HealthSafety => "Health & Safety",
        }
    }

    pub fn heading(&self) -> &'static str {
        match self {
            PolicyTopic::HrGuidelines => "👥 Human Resources & Workplace Policies",
            PolicyTopic::DataSecurity => "🔒 Data-Security Protocols",
            PolicyTopic::HealthSafety => "⚕️ Health & Safety Regulations",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            PolicyTopic::HrGuidelines => {
                "Upload your HR policy docs (employee handbooks, codes of conduct, appraisal processes) \
                 and ask about recruitment rules, leave entitlements, disciplinary procedures, etc."
            }
            PolicyTopic::DataSecurity => {
                "Upload data-security standards, GDPR policies, ISO27001 docs, and get instant guidance \
                 on encryption requirements, breach protocols, access controls, and more."
            }
            PolicyTopic::HealthSafety => {
                "Upload your H&S manuals, risk assessments, COSHH regs, and ask about fire safety, \
                 first aid procedures, PPE requirements, and all that."
            }
        }
    }

    /// Stable identifier accepted on the command line
    pub fn slug(&self) -> &'static str {
        match self {
            PolicyTopic::HrGuidelines => "hr-guidelines",
            PolicyTopic::DataSecurity => "data-security",
            PolicyTopic::HealthSafety => "health-safety",
        }
    }
}

impl fmt::Display for PolicyTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for PolicyTopic {
    type Err = String;

    /// Accepts the slug or the label, case-insensitively
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        PolicyTopic::ALL
            .into_iter()
            .find(|t| t.slug() == wanted || t.label().to_lowercase() == wanted)
            .ok_or_else(|| {
                let known: Vec<&str> = PolicyTopic::ALL.iter().map(|t| t.slug()).collect();
                format!("unknown policy topic '{}' (expected one of: {})", s, known.join(", "))
            })
    }
}
