pub mod challenge_service;

pub use challenge_service::{ChallengeService, ChallengeSettings, IssuedChallenge, VerifyOutcome};
