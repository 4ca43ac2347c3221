use futures::FutureExt;
use futures::future::LocalBoxFuture;
use serde_json::Value;
use tracing::{debug, error, info};

use crate::dashboard::DashboardView;
use crate::model::{
    Instance, InstanceAction, InstanceCommand, Intent, PushMessage, StatusUpdate, WorklogEntry,
};
use crate::transport::{CommandChannel, InstanceGateway, TransportError};

const CREATED: &str = "Created";
const REMOVED: &str = "Removed";

pub type GatewayCall = LocalBoxFuture<'static, GatewayReply>;

#[derive(Debug)]
pub enum GatewayReply {
    Loaded(Result<Vec<Instance>, TransportError>),
    Created(Result<Value, TransportError>),
    Deleted {
        id: String,
        result: Result<Value, TransportError>,
    },
}

pub struct Coordinator<G, C, V> {
    gateway: G,
    channel: C,
    view: V,
    instances: Vec<Instance>,
}

impl<G, C, V> Coordinator<G, C, V>
where
    G: InstanceGateway + Clone + 'static,
    C: CommandChannel,
    V: DashboardView,
{
    pub fn new(gateway: G, channel: C, view: V) -> Self {
        Self {
            gateway,
            channel,
            view,
            instances: Vec::new(),
        }
    }

    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }

    pub fn instance(&self, id: &str) -> Option<&Instance> {
        self.instances.iter().find(|instance| instance.id == id)
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut V {
        &mut self.view
    }

    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    // Backend calls are driven by the event loop; replies come back through `complete`.

    pub fn initialize(&mut self) -> GatewayCall {
        self.view.set_status("Loading instances…".to_string());
        let gateway = self.gateway.clone();
        async move { GatewayReply::Loaded(gateway.fetch_instances().await) }.boxed_local()
    }

    /// Nothing is inserted here: the instance shows up only when the matching
    /// "Created" push message arrives. There is no correlation id, so if that
    /// message is lost the instance stays invisible until a reload.
    pub fn request_create(&mut self) -> GatewayCall {
        self.view.set_status("Creating instance…".to_string());
        let gateway = self.gateway.clone();
        async move { GatewayReply::Created(gateway.create_instance().await) }.boxed_local()
    }

    pub fn request_delete(&mut self, id: &str) -> GatewayCall {
        self.view.set_status(format!("Deleting {id}…"));
        let gateway = self.gateway.clone();
        let id = id.to_string();
        async move {
            let result = gateway.delete_instance(&id).await;
            GatewayReply::Deleted { id, result }
        }
        .boxed_local()
    }

    pub fn dispatch_action(&mut self, id: &str, action: InstanceAction) -> Option<GatewayCall> {
        match action {
            InstanceAction::Delete => Some(self.request_delete(id)),
            InstanceAction::Start | InstanceAction::Stop => {
                if self.instance(id).is_none() {
                    debug!("{action} requested for untracked instance {id}");
                }
                self.channel.send_command(&InstanceCommand {
                    id: id.to_string(),
                    action,
                });
                self.view.set_status(format!("Requested {action} for {id}"));
                None
            }
        }
    }

    pub fn handle_intent(&mut self, intent: Intent) -> Option<GatewayCall> {
        match intent {
            Intent::Create => Some(self.request_create()),
            Intent::Reload => Some(self.initialize()),
            Intent::Action { id, action } => self.dispatch_action(&id, action),
        }
    }

    pub fn complete(&mut self, reply: GatewayReply) {
        match reply {
            GatewayReply::Loaded(Ok(instances)) => {
                info!("loaded {} instances", instances.len());
                self.instances = instances;
                self.view.render_instances(&self.instances);
                self.view
                    .set_status(format!("Loaded {} instances", self.instances.len()));
            }
            GatewayReply::Loaded(Err(error)) => {
                error!("error loading instances: {error}");
                self.view
                    .set_status(format!("Failed loading instances: {error}"));
            }
            GatewayReply::Created(Ok(_)) => {
                info!("create requested");
                self.view
                    .set_status("Create requested, waiting for server event".to_string());
            }
            GatewayReply::Created(Err(error)) => {
                error!("error creating instance: {error}");
                self.view.set_status(format!("Create failed: {error}"));
            }
            GatewayReply::Deleted { id, result: Ok(_) } => {
                info!("delete requested for {id}");
                self.view.set_status(format!("Delete requested for {id}"));
            }
            GatewayReply::Deleted {
                id,
                result: Err(error),
            } => {
                error!("error deleting instance {id}: {error}");
                self.view
                    .set_status(format!("Delete failed for {id}: {error}"));
            }
        }
    }

    pub fn on_push_message(&mut self, value: Value) {
        debug!("push message: {value}");
        let message = PushMessage::new(value);

        if let Some(id) = message.id() {
            let index = self.instances.iter().position(|instance| instance.id == id);
            match (message.info(), index) {
                (Some(CREATED), None) => {
                    self.instances.push(Instance::announced(id));
                    self.view.render_instances(&self.instances);
                }
                (Some(REMOVED), Some(index)) => {
                    self.instances.remove(index);
                    self.view.remove_instance(&id);
                }
                _ => {}
            }
        }

        self.view.append_worklog(WorklogEntry::from_message(&message));
    }

    // Unknown ids are dropped; broadcasts never create instances.
    pub fn on_channel_broadcast(&mut self, value: Value) {
        debug!("socket message: {value}");
        let Value::Array(entries) = value else {
            debug!("ignoring non-array socket message");
            return;
        };

        for entry in entries {
            let update = match serde_json::from_value::<StatusUpdate>(entry) {
                Ok(update) => update,
                Err(error) => {
                    debug!("skipping malformed status entry: {error}");
                    continue;
                }
            };
            let Some(instance) = self
                .instances
                .iter_mut()
                .find(|instance| instance.id == update.id)
            else {
                continue;
            };
            instance.state = update.state;
            self.view.update_instance_status(&update.id, update.state);
        }
    }
}
