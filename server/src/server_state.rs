use rideshare_data_management::DataManager;

use crate::{config::Config, notify::Notifier};

pub struct ServerState {
    pub data_manager: DataManager,
    // Queue of signup emails, drained by the notification dispatcher.
    pub notifier: Notifier,
    pub config: Config,
}
