use super::client::Action;
use super::entity::EntityContext;
use super::entity::GenericEntity;
use super::entity::HmipEntity;
use super::entity::channels_of_type;
use super::model::Model;
use crate::engine::EntityCommand;
use crate::engine::EntityValue;
use crate::engine::Platform;
use crate::engine::SwitchState;

const CHANNEL_TYPES: &[&str] = &[
    "SWITCH_CHANNEL",
    "SWITCH_MEASURING_CHANNEL",
    "MULTI_MODE_INPUT_SWITCH_CHANNEL",
];

const GROUP_TYPES: &[&str] = &["SWITCHING", "EXTENDED_LINKED_SWITCHING"];

pub(super) fn entities(model: &Model) -> Vec<Box<dyn HmipEntity>> {
    let mut entities: Vec<Box<dyn HmipEntity>> = Vec::new();

    for (device, channel) in channels_of_type(model, CHANNEL_TYPES) {
        let multi_channel = device.functional_channels.len() > 2;
        entities.push(Box::new(Switch {
            base: GenericEntity::for_channel("Switch", device, channel)
                .multi_channel(multi_channel),
        }));
    }

    for group in model.groups.values() {
        if GROUP_TYPES.contains(&group.group_type.as_str()) {
            entities.push(Box::new(GroupSwitch {
                base: GenericEntity::for_group("GroupSwitch", group, "Group"),
            }));
        }
    }

    entities
}

/// A switching channel of a device.
pub struct Switch {
    base: GenericEntity,
}

impl HmipEntity for Switch {
    fn base(&self) -> &GenericEntity {
        &self.base
    }

    fn platform(&self) -> Platform {
        Platform::Switch
    }

    fn value(&self, ctx: &EntityContext<'_>) -> EntityValue {
        let on = self
            .base
            .channel(ctx.model)
            .and_then(|c| c.bool("on"))
            .unwrap_or(false);
        EntityValue::Switch(SwitchState { on })
    }

    fn action(&self, _model: &Model, command: &EntityCommand) -> Option<Action> {
        let on = match command {
            EntityCommand::TurnOn { .. } => true,
            EntityCommand::TurnOff => false,
            _ => return None,
        };
        let device = self.base.device_id()?;
        Some(Action::SetSwitchState {
            device_id: device.to_string(),
            channel_index: self.base.channel_index()?,
            on,
        })
    }
}

/// A switching group. Groups stay available while members are unreachable.
pub struct GroupSwitch {
    base: GenericEntity,
}

impl HmipEntity for GroupSwitch {
    fn base(&self) -> &GenericEntity {
        &self.base
    }

    fn platform(&self) -> Platform {
        Platform::Switch
    }

    fn available(&self, _ctx: &EntityContext<'_>) -> bool {
        true
    }

    fn value(&self, ctx: &EntityContext<'_>) -> EntityValue {
        let on = self
            .base
            .group(ctx.model)
            .and_then(|g| g.bool("on"))
            .unwrap_or(false);
        EntityValue::Switch(SwitchState { on })
    }

    fn action(&self, _model: &Model, command: &EntityCommand) -> Option<Action> {
        let on = match command {
            EntityCommand::TurnOn { .. } => true,
            EntityCommand::TurnOff => false,
            _ => return None,
        };
        Some(Action::SetGroupSwitchState {
            group_id: self.base.group_id()?.to_string(),
            on,
        })
    }
}
