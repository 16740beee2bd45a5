mod access_point;
mod binary_sensor;
mod button;
mod client;
mod config;
mod entity;
mod error;
#[cfg(test)]
mod fixtures;
// Private module - allowed by clippy.toml allow-private-module-inception
#[allow(clippy::module_inception)]
mod homematicip;
mod light;
mod lock;
mod model;
mod platforms;
mod sensor;
mod switch;
mod weather;

use anyhow::Context;
pub use config::Config as HomematicipConfig;
pub use homematicip::HomematicipIntegration;
use linkme::distributed_slice;

use crate::engine;

#[distributed_slice(engine::INTEGRATION_REGISTRY)]
fn init_homematicip(ctx: &engine::IntegrationContext) -> engine::IntegrationFactoryResult {
    let hmip_config = if let Some(c) = &ctx.config.integrations.homematicip {
        c
    } else {
        return Ok(None);
    };

    let runner =
        client::CloudRunner::new(hmip_config).context("Failed to create HomematicIP client")?;
    Ok(Some(Box::new(HomematicipIntegration::new(runner, hmip_config))))
}
