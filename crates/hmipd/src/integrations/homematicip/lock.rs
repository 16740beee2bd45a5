use super::client::Action;
use super::client::LockTarget;
use super::entity::Attributes;
use super::entity::EntityContext;
use super::entity::GenericEntity;
use super::entity::HmipEntity;
use super::entity::channels_of_type;
use super::model::Model;
use crate::engine::EntityCommand;
use crate::engine::EntityValue;
use crate::engine::LockState;
use crate::engine::Platform;

const CHANNEL_TYPES: &[&str] = &["DOOR_LOCK_CHANNEL"];

/// Lock drive settings exposed as attributes when the device reports them.
const LOCK_ATTRIBUTES: &[(&str, &str)] = &[
    ("autoRelockDelay", "auto_relock_delay"),
    ("doorHandleType", "door_handle_type"),
    ("doorLockDirection", "door_lock_direction"),
    ("doorLockNeutralPosition", "door_lock_neutral_position"),
    ("doorLockTurns", "door_lock_turns"),
];

pub(super) fn entities(model: &Model) -> Vec<Box<dyn HmipEntity>> {
    channels_of_type(model, CHANNEL_TYPES)
        .map(|(device, channel)| {
            Box::new(DoorLockDrive {
                base: GenericEntity::for_channel("DoorLockDrive", device, channel),
            }) as Box<dyn HmipEntity>
        })
        .collect()
}

pub struct DoorLockDrive {
    base: GenericEntity,
}

impl HmipEntity for DoorLockDrive {
    fn base(&self) -> &GenericEntity {
        &self.base
    }

    fn platform(&self) -> Platform {
        Platform::Lock
    }

    fn value(&self, ctx: &EntityContext<'_>) -> EntityValue {
        let channel = self.base.channel(ctx.model);
        let lock_state = channel.and_then(|c| c.str("lockState"));
        let motor_state = channel.and_then(|c| c.str("motorState"));

        EntityValue::Lock(LockState {
            locked: lock_state.map(|s| s == "LOCKED" && motor_state == Some("STOPPED")),
            locking: motor_state == Some("CLOSING"),
            unlocking: motor_state == Some("OPENING"),
        })
    }

    fn attributes(&self, ctx: &EntityContext<'_>) -> Attributes {
        let mut attrs = self.base.attributes(ctx);
        if let Some(channel) = self.base.channel(ctx.model) {
            for (key, attr) in LOCK_ATTRIBUTES {
                match channel.attr(key) {
                    Some(value) if !value.is_null() => {
                        attrs.insert(attr.to_string(), value.clone());
                    }
                    _ => {}
                }
            }
        }
        attrs
    }

    fn action(&self, _model: &Model, command: &EntityCommand) -> Option<Action> {
        let target = match command {
            EntityCommand::Lock => LockTarget::Locked,
            EntityCommand::Unlock => LockTarget::Unlocked,
            EntityCommand::Open => LockTarget::Open,
            _ => return None,
        };
        Some(Action::SetLockState {
            device_id: self.base.device_id()?.to_string(),
            channel_index: self.base.channel_index()?,
            target,
        })
    }
}
