use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Loggable sales activity kinds. Base points are fixed per type and never
/// recomputed for already-persisted events, so changing a value here only
/// affects events logged afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    CustomerMeeting,
    ProspectQualification,
    ValuePropositionDelivery,
    RoiPresentation,
    ProposalCreation,
    CaseStudyDevelopment,
    ReferralGeneration,
    DealClosure,
}

impl ActionType {
    pub const ALL: [ActionType; 8] = [
        ActionType::CustomerMeeting,
        ActionType::ProspectQualification,
        ActionType::ValuePropositionDelivery,
        ActionType::RoiPresentation,
        ActionType::ProposalCreation,
        ActionType::CaseStudyDevelopment,
        ActionType::ReferralGeneration,
        ActionType::DealClosure,
    ];

    pub fn base_points(self) -> i64 {
        match self {
            ActionType::CustomerMeeting => 100,
            ActionType::ProspectQualification => 150,
            ActionType::ValuePropositionDelivery => 200,
            ActionType::RoiPresentation => 250,
            ActionType::ProposalCreation => 300,
            ActionType::CaseStudyDevelopment => 350,
            ActionType::ReferralGeneration => 400,
            ActionType::DealClosure => 1000,
        }
    }

    pub fn default_category(self) -> CompetencyCategory {
        match self {
            ActionType::CustomerMeeting | ActionType::ProspectQualification => {
                CompetencyCategory::CustomerAnalysis
            }
            ActionType::ValuePropositionDelivery
            | ActionType::RoiPresentation
            | ActionType::CaseStudyDevelopment => CompetencyCategory::ValueCommunication,
            ActionType::ProposalCreation
            | ActionType::ReferralGeneration
            | ActionType::DealClosure => CompetencyCategory::SalesExecution,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ActionType::CustomerMeeting => "customer_meeting",
            ActionType::ProspectQualification => "prospect_qualification",
            ActionType::ValuePropositionDelivery => "value_proposition_delivery",
            ActionType::RoiPresentation => "roi_presentation",
            ActionType::ProposalCreation => "proposal_creation",
            ActionType::CaseStudyDevelopment => "case_study_development",
            ActionType::ReferralGeneration => "referral_generation",
            ActionType::DealClosure => "deal_closure",
        }
    }
}

impl FromStr for ActionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown action type: {s}"))
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-assessed significance of an action.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpactLevel {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl ImpactLevel {
    pub fn multiplier(self) -> f64 {
        match self {
            ImpactLevel::Low => 1.0,
            ImpactLevel::Medium => 1.5,
            ImpactLevel::High => 2.0,
            ImpactLevel::Critical => 3.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ImpactLevel::Low => "low",
            ImpactLevel::Medium => "medium",
            ImpactLevel::High => "high",
            ImpactLevel::Critical => "critical",
        }
    }
}

impl FromStr for ImpactLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(ImpactLevel::Low),
            "medium" => Ok(ImpactLevel::Medium),
            "high" => Ok(ImpactLevel::High),
            "critical" => Ok(ImpactLevel::Critical),
            _ => Err(format!("unknown impact level: {s}")),
        }
    }
}

impl fmt::Display for ImpactLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The three skill domains an action is attributed to. Aggregation output
/// always carries all three, in this declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CompetencyCategory {
    CustomerAnalysis,
    ValueCommunication,
    SalesExecution,
}

impl CompetencyCategory {
    pub const ALL: [CompetencyCategory; 3] = [
        CompetencyCategory::CustomerAnalysis,
        CompetencyCategory::ValueCommunication,
        CompetencyCategory::SalesExecution,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CompetencyCategory::CustomerAnalysis => "customerAnalysis",
            CompetencyCategory::ValueCommunication => "valueCommunication",
            CompetencyCategory::SalesExecution => "salesExecution",
        }
    }
}

impl FromStr for CompetencyCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CompetencyCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown competency category: {s}"))
    }
}

impl fmt::Display for CompetencyCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deal size bands scale points upward only; they never reclassify an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DealSizeRange {
    #[serde(rename = "Under $10K")]
    Under10K,
    #[serde(rename = "$10K-50K")]
    From10KTo50K,
    #[serde(rename = "$50K-250K")]
    From50KTo250K,
    #[serde(rename = "$250K+")]
    Over250K,
}

impl DealSizeRange {
    pub fn multiplier(self) -> f64 {
        match self {
            DealSizeRange::Under10K => 1.0,
            DealSizeRange::From10KTo50K => 1.1,
            DealSizeRange::From50KTo250K => 1.3,
            DealSizeRange::Over250K => 1.5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DealSizeRange::Under10K => "Under $10K",
            DealSizeRange::From10KTo50K => "$10K-50K",
            DealSizeRange::From50KTo250K => "$50K-250K",
            DealSizeRange::Over250K => "$250K+",
        }
    }
}

impl FromStr for DealSizeRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Under $10K" | "under-10k" => Ok(DealSizeRange::Under10K),
            "$10K-50K" | "10k-50k" => Ok(DealSizeRange::From10KTo50K),
            "$50K-250K" | "50k-250k" => Ok(DealSizeRange::From50KTo250K),
            "$250K+" | "250k-plus" => Ok(DealSizeRange::Over250K),
            _ => Err(format!("unknown deal size range: {s}")),
        }
    }
}

impl fmt::Display for DealSizeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Audience seniority. Only Director and Executive scale points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StakeholderLevel {
    #[serde(rename = "Individual Contributor")]
    IndividualContributor,
    Manager,
    Director,
    Executive,
}

impl StakeholderLevel {
    pub fn multiplier(self) -> f64 {
        match self {
            StakeholderLevel::IndividualContributor | StakeholderLevel::Manager => 1.0,
            StakeholderLevel::Director => 1.1,
            StakeholderLevel::Executive => 1.2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StakeholderLevel::IndividualContributor => "Individual Contributor",
            StakeholderLevel::Manager => "Manager",
            StakeholderLevel::Director => "Director",
            StakeholderLevel::Executive => "Executive",
        }
    }
}

impl FromStr for StakeholderLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Individual Contributor" | "ic" => Ok(StakeholderLevel::IndividualContributor),
            "Manager" | "manager" => Ok(StakeholderLevel::Manager),
            "Director" | "director" => Ok(StakeholderLevel::Director),
            "Executive" | "executive" => Ok(StakeholderLevel::Executive),
            _ => Err(format!("unknown stakeholder level: {s}")),
        }
    }
}

impl fmt::Display for StakeholderLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
