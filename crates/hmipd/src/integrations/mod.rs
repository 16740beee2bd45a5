#[cfg(feature = "integration_homematicip")]
pub mod homematicip;
