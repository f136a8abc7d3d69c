pub mod action;
pub mod command;
pub mod dispatch;
pub mod engine;
pub mod identity;
pub mod permissions;
pub mod templates;

use std::sync::Arc;

use tracing::{debug, info};

use crate::component::ComponentRegistry;
use crate::config::{Config, DispatcherKind};
use crate::generator::ReplyRewriter;
use crate::moderation::action::RemoveUserAction;
use crate::moderation::command::ModCommand;
use crate::moderation::dispatch::{
    AdminApiBus, GroupCommandDispatcher, HttpKickDispatcher, RemovalDispatcher,
};
use crate::moderation::identity::{GroupMemberLookup, PersonLookup};
use crate::platform::onebot::OneBotClient;

/// Builds the plugin's enabled components into the registry. A disabled
/// plugin or disabled component flags simply contribute nothing.
pub fn register_components(
    config: &Config,
    client: Arc<OneBotClient>,
    rewriter: Arc<dyn ReplyRewriter>,
    registry: &mut ComponentRegistry,
) {
    if !config.plugin.enabled {
        info!("Plugin disabled by [plugin].enabled; no components registered");
        return;
    }

    let lookup: Arc<dyn PersonLookup> = Arc::new(GroupMemberLookup::new(client.clone()));

    let bus_dispatcher: Arc<dyn RemovalDispatcher> =
        Arc::new(GroupCommandDispatcher::new(Arc::new(AdminApiBus::new(
            client.clone(),
            config.removal.reject_add_request,
        ))));
    let http_dispatcher: Arc<dyn RemovalDispatcher> =
        Arc::new(HttpKickDispatcher::new(client));

    // [removal].dispatcher selects the strategy for the bus-era surfaces;
    // /kick is definitionally the direct-HTTP variant.
    let configured: Arc<dyn RemovalDispatcher> = match config.removal.dispatcher {
        DispatcherKind::Command => bus_dispatcher,
        DispatcherKind::Http => http_dispatcher.clone(),
    };

    if config.components.enable_smart_remove {
        debug!(
            "smart_remove knobs: strict_mode={}, keyword_sensitivity={:?}",
            config.smart_remove.strict_mode, config.smart_remove.keyword_sensitivity
        );
        registry.register_action(Arc::new(RemoveUserAction::new(
            config,
            lookup.clone(),
            configured.clone(),
            rewriter,
        )));
    }
    if config.components.enable_remove_command {
        registry.register_command(Arc::new(ModCommand::remove_user(
            config,
            lookup,
            configured,
        )));
    }
    if config.components.enable_kick_command {
        registry.register_command(Arc::new(ModCommand::kick(config, http_dispatcher)));
    }
}
