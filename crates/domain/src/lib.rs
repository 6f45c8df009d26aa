//! Core data model types for the tender recommendation service.
//!
//! These types represent the shape of tenders, company profiles, user
//! interactions, and match explanations that flow between the embedding,
//! scoring, feedback, and matching layers. Everything here is plain data:
//! validation lives next to the types, behavior lives downstream.

pub mod error;
pub mod interaction;
pub mod profile;
pub mod reasons;
pub mod tender;
pub mod text;

pub use crate::error::DomainError;
pub use crate::interaction::{Interaction, InteractionSnapshot, InteractionType};
pub use crate::profile::{
    CompanyProfile, CompanyProfileUpdate, CompanySize, ProfileOptions, ScoringWeights,
    YearsInOperation,
};
pub use crate::reasons::{MatchReason, ReasonTag};
pub use crate::tender::{Budget, ExtractedData, PopularityCounters, Tender, TenderStatus};
